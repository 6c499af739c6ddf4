//! Scoped frame acquisition.

use crate::source::{SensorDevice, SensorFrame, StreamHandle};
use std::time::Duration;
use tracing::trace;

/// A polled frame whose pixel buffer is locked for reading.
///
/// Dropping it unlocks the buffer and returns the frame to the device, once,
/// however far the consumer got.
pub struct ScopedFrame<'d, D: SensorDevice> {
    device: &'d mut D,
    stream: StreamHandle,
    frame: Option<D::Frame>,
    pitch: usize,
}

impl<D: SensorDevice> ScopedFrame<'_, D> {
    /// Row pitch in bytes reported by the lock. 0 means no data.
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn stream(&self) -> StreamHandle {
        self.stream
    }

    /// Locked pixel bytes, or `None` when the lock reported no data.
    pub fn pixels(&self) -> Option<&[u8]> {
        if self.pitch == 0 {
            return None;
        }
        self.frame.as_ref().map(SensorFrame::bits)
    }
}

impl<D: SensorDevice> Drop for ScopedFrame<'_, D> {
    fn drop(&mut self) {
        if let Some(mut frame) = self.frame.take() {
            frame.unlock();
            self.device.release_frame(self.stream, frame);
        }
    }
}

/// Poll `stream` without blocking and lock the frame if one is ready.
///
/// Returns `None` when no frame is available this call.
pub fn acquire<D: SensorDevice>(device: &mut D, stream: StreamHandle) -> Option<ScopedFrame<'_, D>> {
    let Some(mut frame) = device.next_frame(stream, Duration::ZERO) else {
        trace!("No {} frame ready", stream.kind());
        return None;
    };
    let pitch = frame.lock();
    Some(ScopedFrame {
        device,
        stream,
        frame: Some(frame),
        pitch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Resolution, StreamKind};
    use crate::testing::{ScriptedFrame, ScriptedSensor};

    fn depth_sensor() -> (ScriptedSensor, StreamHandle) {
        let mut sensor = ScriptedSensor::new(Resolution::new(2, 1));
        let stream = sensor.open_depth();
        (sensor, stream)
    }

    #[test]
    fn unavailable_frame_is_none() {
        let (mut sensor, stream) = depth_sensor();
        sensor.push(StreamKind::Depth, None);
        assert!(acquire(&mut sensor, stream).is_none());
        assert_eq!(sensor.stats().locks, 0);
        assert_eq!(sensor.stats().releases, 0);
    }

    #[test]
    fn zero_pitch_has_no_pixels_but_is_released() {
        let (mut sensor, stream) = depth_sensor();
        sensor.push(StreamKind::Depth, Some(ScriptedFrame::empty()));
        {
            let frame = acquire(&mut sensor, stream).expect("frame");
            assert_eq!(frame.pitch(), 0);
            assert!(frame.pixels().is_none());
        }
        assert_eq!(sensor.stats().unlocks, 1);
        assert_eq!(sensor.stats().releases, 1);
    }

    #[test]
    fn released_exactly_once_after_partial_read() {
        let (mut sensor, stream) = depth_sensor();
        sensor.push(StreamKind::Depth, Some(ScriptedFrame::new(4, vec![1, 2, 3, 4])));
        {
            let frame = acquire(&mut sensor, stream).expect("frame");
            let pixels = frame.pixels().expect("pixels");
            assert_eq!(pixels[0], 1);
        }
        let stats = sensor.stats();
        assert_eq!(stats.locks, 1);
        assert_eq!(stats.unlocks, 1);
        assert_eq!(stats.releases, 1);
        assert_eq!(stats.unlocked_before_release, 1);
    }

    #[test]
    fn polls_with_zero_timeout() {
        let (mut sensor, stream) = depth_sensor();
        sensor.push(StreamKind::Depth, None);
        let _ = acquire(&mut sensor, stream);
        assert_eq!(sensor.stats().last_timeout, Some(Duration::ZERO));
    }
}
