//! Capture session owning the sensor and its two streams.

use crate::cloud::{FillOutcome, PointCloudBuilder};
use crate::source::{
    CaptureError, Resolution, SensorDevice, SensorProvider, StreamHandle, StreamKind,
};
use tracing::info;

/// Frames the device may buffer per stream.
pub const BUFFERED_FRAMES: u32 = 2;

/// An opened depth camera: the device, its depth and color streams, and the
/// point cloud builder fed from them.
pub struct DepthCamera<D: SensorDevice> {
    device: D,
    depth_stream: StreamHandle,
    color_stream: StreamHandle,
    builder: PointCloudBuilder<D::Transform>,
}

impl<D: SensorDevice> DepthCamera<D> {
    /// Find the single attached sensor and open it.
    pub fn connect<P>(provider: &P) -> Result<Self, CaptureError>
    where
        P: SensorProvider<Device = D>,
    {
        match provider.sensor_count()? {
            0 => Err(CaptureError::DeviceNotFound),
            1 => Self::open(provider.create_sensor(0)?),
            n => Err(CaptureError::MultipleDevices(n)),
        }
    }

    /// Open the depth and color streams of `device` at the working resolution.
    pub fn open(device: D) -> Result<Self, CaptureError> {
        Self::open_at(device, Resolution::WORKING)
    }

    pub(crate) fn open_at(mut device: D, resolution: Resolution) -> Result<Self, CaptureError> {
        let depth_stream = device.open_stream(StreamKind::Depth, resolution, BUFFERED_FRAMES)?;
        let color_stream = device.open_stream(StreamKind::Color, resolution, BUFFERED_FRAMES)?;
        info!(
            "Opened depth and color streams at {}x{}",
            resolution.width, resolution.height
        );

        let builder = PointCloudBuilder::new(resolution, device.coordinate_transform());
        Ok(Self {
            device,
            depth_stream,
            color_stream,
            builder,
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.builder.resolution()
    }

    pub fn point_count(&self) -> usize {
        self.builder.point_count()
    }

    /// Depth pass for this frame. Must run before [`Self::fill_colors`].
    pub fn fill_depth_and_positions(&mut self, dest: &mut [[f32; 3]]) -> FillOutcome {
        self.builder
            .fill_depth_and_positions(&mut self.device, self.depth_stream, dest)
    }

    /// Color pass for this frame.
    pub fn fill_colors(&mut self, dest: &mut [[f32; 3]]) -> FillOutcome {
        self.builder
            .fill_colors(&mut self.device, self.color_stream, dest)
    }

    pub fn device(&self) -> &D {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedFrame, ScriptedSensor};
    use std::cell::Cell;

    struct Provider {
        count: usize,
        created: Cell<usize>,
    }

    impl SensorProvider for Provider {
        type Device = ScriptedSensor;

        fn sensor_count(&self) -> Result<usize, CaptureError> {
            Ok(self.count)
        }

        fn create_sensor(&self, index: usize) -> Result<ScriptedSensor, CaptureError> {
            assert_eq!(index, 0);
            self.created.set(self.created.get() + 1);
            Ok(ScriptedSensor::new(Resolution::WORKING))
        }
    }

    fn provider(count: usize) -> Provider {
        Provider {
            count,
            created: Cell::new(0),
        }
    }

    #[test]
    fn no_sensor_is_fatal() {
        let p = provider(0);
        assert!(matches!(DepthCamera::connect(&p), Err(CaptureError::DeviceNotFound)));
        assert_eq!(p.created.get(), 0);
    }

    #[test]
    fn several_sensors_are_rejected() {
        let p = provider(3);
        assert!(matches!(DepthCamera::connect(&p), Err(CaptureError::MultipleDevices(3))));
    }

    #[test]
    fn opens_both_streams_at_working_resolution() {
        let camera = DepthCamera::connect(&provider(1)).expect("camera");
        assert_eq!(camera.point_count(), 640 * 480);
        assert_eq!(
            camera.device().opened(),
            &[
                (StreamKind::Depth, Resolution::WORKING, BUFFERED_FRAMES),
                (StreamKind::Color, Resolution::WORKING, BUFFERED_FRAMES),
            ]
        );
    }

    #[test]
    fn second_frame_missing_keeps_first_frame_positions() {
        let res = Resolution::new(2, 1);
        let mut sensor = ScriptedSensor::new(res);
        sensor.push(StreamKind::Depth, Some(ScriptedFrame::depth_mm(2, &[1000, 2000])));
        sensor.push(StreamKind::Depth, None);
        sensor.push(StreamKind::Color, Some(ScriptedFrame::rgb(2, &[[255, 0, 0], [0, 255, 0]])));
        sensor.push(StreamKind::Color, Some(ScriptedFrame::rgb(2, &[[0, 0, 255], [0, 0, 255]])));
        let mut camera = DepthCamera::open_at(sensor, res).expect("camera");

        let mut positions = vec![[0.0f32; 3]; 2];
        let mut colors = vec![[0.0f32; 3]; 2];
        assert!(camera.fill_depth_and_positions(&mut positions).is_filled());
        assert!(camera.fill_colors(&mut colors).is_filled());
        let frame_one = positions.clone();

        assert_eq!(camera.fill_depth_and_positions(&mut positions), FillOutcome::Unavailable);
        assert!(camera.fill_colors(&mut colors).is_filled());
        assert_eq!(positions, frame_one);
        assert_eq!(colors, vec![[0.0, 0.0, 1.0], [0.0, 0.0, 1.0]]);
    }
}
