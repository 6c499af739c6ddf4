//! Procedural depth camera.
//!
//! Renders a tilted back wall with a sphere swinging in front of it, and a
//! matching BGRA gradient for the color stream. Frame buffers are pooled and
//! reused once the consumer releases them.

use crate::mapper::pack_depth;
use crate::source::{
    CaptureError, Resolution, SensorDevice, SensorFrame, SensorProvider, StreamHandle, StreamKind,
};
use crate::transform::NominalTransform;
use image::{Rgba, RgbaImage};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Depth of the back wall at the top row, in millimeters.
const WALL_DEPTH_MM: f32 = 2600.0;
/// Depth of the front of the sphere, in millimeters.
const SPHERE_DEPTH_MM: f32 = 1500.0;
/// Columns on the left edge with no depth reading.
const SHADOW_BAND_PX: u32 = 8;

/// Missed-poll simulation for the synthetic sensor.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticConfig {
    /// Report no depth frame on every Nth poll. 0 disables.
    pub drop_depth_every: u32,
    /// Report no color frame on every Nth poll. 0 disables.
    pub drop_color_every: u32,
}

/// Provides exactly one [`SyntheticSensor`].
#[derive(Debug, Clone, Default)]
pub struct SyntheticProvider {
    config: SyntheticConfig,
}

impl SyntheticProvider {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }
}

impl SensorProvider for SyntheticProvider {
    type Device = SyntheticSensor;

    fn sensor_count(&self) -> Result<usize, CaptureError> {
        Ok(1)
    }

    fn create_sensor(&self, index: usize) -> Result<SyntheticSensor, CaptureError> {
        if index != 0 {
            return Err(CaptureError::InitFailed(format!("no synthetic sensor at index {index}")));
        }
        Ok(SyntheticSensor::new(self.config))
    }
}

/// A frame buffer handed out by [`SyntheticSensor`].
pub struct SyntheticFrame {
    bytes: Vec<u8>,
    pitch: usize,
    locked: bool,
}

impl SensorFrame for SyntheticFrame {
    fn lock(&mut self) -> usize {
        self.locked = true;
        self.pitch
    }

    fn bits(&self) -> &[u8] {
        if self.locked { self.bytes.as_slice() } else { &[] }
    }

    fn unlock(&mut self) {
        self.locked = false;
    }
}

struct OpenStream {
    handle: StreamHandle,
    polls: u64,
    frames: u64,
}

/// Depth camera that synthesizes its frames.
pub struct SyntheticSensor {
    config: SyntheticConfig,
    resolution: Resolution,
    streams: Vec<OpenStream>,
    spare: Vec<Vec<u8>>,
    start_time: Instant,
}

impl SyntheticSensor {
    pub fn new(config: SyntheticConfig) -> Self {
        info!(
            "Synthetic sensor initialized (drop depth every {}, color every {})",
            config.drop_depth_every, config.drop_color_every
        );
        Self {
            config,
            resolution: Resolution::WORKING,
            streams: Vec::new(),
            spare: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Frames delivered so far on `stream`.
    pub fn frames_delivered(&self, stream: StreamHandle) -> u64 {
        self.streams
            .iter()
            .find(|s| s.handle == stream)
            .map_or(0, |s| s.frames)
    }

    fn drop_every(&self, kind: StreamKind) -> u32 {
        match kind {
            StreamKind::Depth => self.config.drop_depth_every,
            StreamKind::Color => self.config.drop_color_every,
        }
    }

    fn take_buffer(&mut self, len: usize) -> Vec<u8> {
        let mut bytes = self.spare.pop().unwrap_or_default();
        bytes.resize(len, 0);
        bytes
    }

    fn render_depth(&self, phase: f32, out: &mut [u8]) {
        let Resolution { width, height } = self.resolution;
        let center_x = width as f32 * (0.5 + 0.25 * phase.sin());
        let center_y = height as f32 * 0.5;
        let radius = height as f32 / 5.0;

        for y in 0..height {
            for x in 0..width {
                let dx = x as f32 - center_x;
                let dy = y as f32 - center_y;
                let d2 = dx * dx + dy * dy;

                let raw = if x < SHADOW_BAND_PX {
                    0
                } else if d2 < radius * radius {
                    let bulge = (radius * radius - d2).sqrt() * 4.0;
                    // player index 1 on the sphere
                    pack_depth((SPHERE_DEPTH_MM - bulge) as u16) | 1
                } else {
                    pack_depth((WALL_DEPTH_MM + y as f32 * 2.0) as u16)
                };

                let i = (y * width + x) as usize * 2;
                out[i..i + 2].copy_from_slice(&raw.to_le_bytes());
            }
        }
    }

    fn render_color(&self, phase: f32, out: &mut [u8]) {
        let Resolution { width, height } = self.resolution;
        let blue = (128.0 + 127.0 * phase.cos()) as u8;
        let image = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                blue,
                255,
            ])
        });

        for (bgra, rgba) in out.chunks_exact_mut(4).zip(image.pixels()) {
            let [r, g, b, a] = rgba.0;
            bgra.copy_from_slice(&[b, g, r, a]);
        }
    }
}

impl SensorDevice for SyntheticSensor {
    type Frame = SyntheticFrame;
    type Transform = NominalTransform;

    fn open_stream(
        &mut self,
        kind: StreamKind,
        resolution: Resolution,
        buffered_frames: u32,
    ) -> Result<StreamHandle, CaptureError> {
        if resolution != self.resolution {
            return Err(CaptureError::StreamOpenFailed {
                kind,
                reason: format!("unsupported resolution {}x{}", resolution.width, resolution.height),
            });
        }

        let handle = StreamHandle::new(self.streams.len() as u32 + 1, kind);
        self.streams.push(OpenStream {
            handle,
            polls: 0,
            frames: 0,
        });
        self.spare.reserve(buffered_frames as usize);
        info!(
            "Opened synthetic {} stream {} ({} buffered frames)",
            kind,
            handle.id(),
            buffered_frames
        );
        Ok(handle)
    }

    fn next_frame(&mut self, stream: StreamHandle, _timeout: Duration) -> Option<SyntheticFrame> {
        let drop_every = self.drop_every(stream.kind()) as u64;
        let open = self.streams.iter_mut().find(|s| s.handle == stream)?;
        open.polls += 1;
        if drop_every > 0 && open.polls % drop_every == 0 {
            trace!("Simulated missed {} poll {}", stream.kind(), open.polls);
            return None;
        }
        open.frames += 1;
        let frame_number = open.frames;

        let kind = stream.kind();
        let pitch = self.resolution.width as usize * kind.bytes_per_pixel();
        let mut bytes = self.take_buffer(pitch * self.resolution.height as usize);
        let phase = frame_number as f32 * 0.05;
        match kind {
            StreamKind::Depth => self.render_depth(phase, &mut bytes),
            StreamKind::Color => self.render_color(phase, &mut bytes),
        }

        debug!(
            "Synthesized {} frame {} at {:.3}s",
            kind,
            frame_number,
            self.start_time.elapsed().as_secs_f64()
        );
        Some(SyntheticFrame {
            bytes,
            pitch,
            locked: false,
        })
    }

    fn release_frame(&mut self, _stream: StreamHandle, frame: SyntheticFrame) {
        self.spare.push(frame.bytes);
    }

    fn coordinate_transform(&self) -> NominalTransform {
        NominalTransform::new(self.resolution)
    }
}
