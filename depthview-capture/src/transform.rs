//! Nominal depth camera intrinsics.

use crate::mapper::decode_depth;
use crate::source::{DepthTransform, Resolution};
use glam::{IVec2, Vec4};

/// Inverse focal length of the depth camera at 320x240, in 1/pixels.
pub const INVERSE_FOCAL_LENGTH_320X240: f32 = 3.501e-3;

/// Distance between the depth and color cameras along x, in meters.
pub const COLOR_BASELINE_M: f32 = 0.025;

/// Depth transform built from the nominal factory intrinsics instead of
/// per-device calibration.
#[derive(Debug, Clone, Copy)]
pub struct NominalTransform {
    resolution: Resolution,
}

impl NominalTransform {
    pub fn new(resolution: Resolution) -> Self {
        Self { resolution }
    }

    fn focal_length_px(&self) -> f32 {
        (self.resolution.width as f32 / 320.0) / INVERSE_FOCAL_LENGTH_320X240
    }
}

impl DepthTransform for NominalTransform {
    fn depth_to_camera_space(&self, x: u32, y: u32, packed_depth: u16) -> Vec4 {
        let width = self.resolution.width as f32;
        let height = self.resolution.height as f32;
        let z = decode_depth(packed_depth) as f32 / 1000.0;

        let sx = (x as f32 - width / 2.0) * (320.0 / width) * INVERSE_FOCAL_LENGTH_320X240 * z;
        let sy = -(y as f32 - height / 2.0) * (240.0 / height) * INVERSE_FOCAL_LENGTH_320X240 * z;
        Vec4::new(sx, sy, z, 1.0)
    }

    fn depth_to_color_pixel(&self, x: u32, y: u32, packed_depth: u16) -> IVec2 {
        let depth_mm = decode_depth(packed_depth);
        if depth_mm == 0 {
            return IVec2::splat(-1);
        }
        let z = depth_mm as f32 / 1000.0;
        let parallax = (COLOR_BASELINE_M * self.focal_length_px() / z).round() as i32;
        IVec2::new(x as i32 - parallax, y as i32)
    }
}
