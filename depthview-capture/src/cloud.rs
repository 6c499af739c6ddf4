//! Point cloud assembly from depth and color frames.
//!
//! A frame is built in two passes. The depth pass writes one camera-space
//! position per depth pixel and records where that pixel lands in the color
//! image. The color pass then looks each of those pixel coordinates up in the
//! color frame. Both passes visit the grid in row-major order, so entry `i` of
//! either destination is depth pixel `i = y * width + x`.

use crate::mapper::map_depth_sample;
use crate::reader::acquire;
use crate::source::{DepthTransform, Resolution, SensorDevice, StreamHandle, StreamKind};
use glam::IVec2;
use tracing::{debug, trace, warn};

/// Color written for points with no valid color pixel.
pub const NO_COLOR: [f32; 3] = [0.0; 3];

/// What a fill pass did to its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// Every point was rewritten.
    Filled(usize),
    /// No frame was ready. The destination is untouched.
    Unavailable,
    /// A frame arrived without usable data. The destination is untouched.
    NoData,
}

impl FillOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, FillOutcome::Filled(_))
    }
}

/// Builds position and color buffers for one sensor.
///
/// The pixel map written by the depth pass is kept between passes and between
/// frames. A color pass that runs after a skipped depth pass reads the map
/// left by the last depth pass that had data.
pub struct PointCloudBuilder<T> {
    resolution: Resolution,
    transform: T,
    pixel_map: Vec<IVec2>,
}

impl<T: DepthTransform> PointCloudBuilder<T> {
    pub fn new(resolution: Resolution, transform: T) -> Self {
        Self {
            resolution,
            transform,
            pixel_map: vec![IVec2::splat(-1); resolution.pixel_count()],
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn point_count(&self) -> usize {
        self.resolution.pixel_count()
    }

    /// Color-image pixel of every depth pixel, from the last depth pass with data.
    pub fn pixel_map(&self) -> &[IVec2] {
        &self.pixel_map
    }

    /// Poll `stream` for a depth frame and write its positions into `dest`.
    pub fn fill_depth_and_positions<D>(
        &mut self,
        device: &mut D,
        stream: StreamHandle,
        dest: &mut [[f32; 3]],
    ) -> FillOutcome
    where
        D: SensorDevice,
    {
        let Some(frame) = acquire(device, stream) else {
            return FillOutcome::Unavailable;
        };
        let Some(bytes) = frame.pixels() else {
            trace!("Depth frame locked with pitch 0");
            return FillOutcome::NoData;
        };
        self.write_positions(bytes, dest)
    }

    /// Poll `stream` for a color frame and write per-point colors into `dest`.
    pub fn fill_colors<D>(
        &self,
        device: &mut D,
        stream: StreamHandle,
        dest: &mut [[f32; 3]],
    ) -> FillOutcome
    where
        D: SensorDevice,
    {
        let Some(frame) = acquire(device, stream) else {
            return FillOutcome::Unavailable;
        };
        let Some(bytes) = frame.pixels() else {
            trace!("Color frame locked with pitch 0");
            return FillOutcome::NoData;
        };
        self.write_colors(bytes, dest)
    }

    /// Depth pass over raw little-endian depth samples, one per pixel.
    pub fn write_positions(&mut self, depth: &[u8], dest: &mut [[f32; 3]]) -> FillOutcome {
        let count = self.point_count();
        if !self.fits(StreamKind::Depth, depth.len(), dest.len()) {
            return FillOutcome::NoData;
        }

        let mut samples = depth
            .chunks_exact(StreamKind::Depth.bytes_per_pixel())
            .map(|b| u16::from_le_bytes([b[0], b[1]]));
        for y in 0..self.resolution.height {
            for x in 0..self.resolution.width {
                let i = (y * self.resolution.width + x) as usize;
                let raw = samples.next().unwrap_or_default();
                let sample = map_depth_sample(&self.transform, x, y, raw);
                dest[i] = sample.position.to_array();
                self.pixel_map[i] = sample.color_pixel;
            }
        }

        debug!("Wrote {} positions", count);
        FillOutcome::Filled(count)
    }

    /// Color pass over a BGRA frame, using the current pixel map.
    pub fn write_colors(&self, color: &[u8], dest: &mut [[f32; 3]]) -> FillOutcome {
        let count = self.point_count();
        if !self.fits(StreamKind::Color, color.len(), dest.len()) {
            return FillOutcome::NoData;
        }

        for (out, &pixel) in dest.iter_mut().zip(&self.pixel_map) {
            *out = self.sample_color(color, pixel);
        }

        debug!("Wrote {} colors", count);
        FillOutcome::Filled(count)
    }

    /// Normalized RGB at `pixel`, or black when it lies outside the frame.
    pub fn sample_color(&self, color: &[u8], pixel: IVec2) -> [f32; 3] {
        if !self.resolution.contains(pixel) {
            return NO_COLOR;
        }
        let offset = (pixel.x as usize + self.resolution.width as usize * pixel.y as usize) * 4;
        match color.get(offset..offset + 4) {
            Some(bgra) => [
                bgra[2] as f32 / 255.0,
                bgra[1] as f32 / 255.0,
                bgra[0] as f32 / 255.0,
            ],
            None => NO_COLOR,
        }
    }

    fn fits(&self, kind: StreamKind, frame_len: usize, dest_len: usize) -> bool {
        let count = self.point_count();
        let expected = count * kind.bytes_per_pixel();
        if frame_len < expected {
            warn!("Short {} frame: {} bytes, expected {}", kind, frame_len, expected);
            return false;
        }
        if dest_len < count {
            warn!("{} destination holds {} points, expected {}", kind, dest_len, count);
            return false;
        }
        true
    }
}
