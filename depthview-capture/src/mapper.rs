//! Per-sample depth decoding and back-projection.

use crate::source::DepthTransform;
use glam::{IVec2, Vec3};

/// Low bits of a raw depth sample that hold the player index.
pub const PLAYER_INDEX_BITS: u32 = 3;

/// Millimeter depth encoded in a raw sample.
pub fn decode_depth(raw: u16) -> u16 {
    raw >> PLAYER_INDEX_BITS
}

/// Re-pack a millimeter depth into the form the transform service expects.
pub fn pack_depth(depth_mm: u16) -> u16 {
    depth_mm << PLAYER_INDEX_BITS
}

/// A depth sample converted to camera space, plus where it lands in the color image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappedSample {
    pub position: Vec3,
    pub color_pixel: IVec2,
}

/// Convert the raw depth reading at grid position `(x, y)`.
///
/// Pure: identical inputs give bit-identical outputs. `color_pixel` is passed
/// through unchecked; out-of-frame coordinates are resolved by the color pass.
pub fn map_depth_sample<T: DepthTransform + ?Sized>(
    transform: &T,
    x: u32,
    y: u32,
    raw: u16,
) -> MappedSample {
    let packed = pack_depth(decode_depth(raw));
    let h = transform.depth_to_camera_space(x, y, packed);
    MappedSample {
        position: Vec3::new(h.x / h.w, h.y / h.w, h.z / h.w),
        color_pixel: transform.depth_to_color_pixel(x, y, packed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Resolution;
    use crate::transform::NominalTransform;
    use glam::Vec4;

    struct HalfW;

    impl DepthTransform for HalfW {
        fn depth_to_camera_space(&self, x: u32, y: u32, packed_depth: u16) -> Vec4 {
            Vec4::new(x as f32, y as f32, decode_depth(packed_depth) as f32, 0.5)
        }

        fn depth_to_color_pixel(&self, x: u32, y: u32, _packed_depth: u16) -> IVec2 {
            IVec2::new(x as i32 - 5, y as i32)
        }
    }

    #[test]
    fn decode_strips_player_index() {
        assert_eq!(decode_depth((1000 << 3) | 0b101), 1000);
        assert_eq!(pack_depth(decode_depth((1000 << 3) | 0b101)), 1000 << 3);
        assert_eq!(decode_depth(u16::MAX), 8191);
    }

    #[test]
    fn divides_by_homogeneous_w() {
        let sample = map_depth_sample(&HalfW, 3, 4, 10 << 3);
        assert_eq!(sample.position, Vec3::new(6.0, 8.0, 20.0));
    }

    #[test]
    fn out_of_frame_color_pixel_is_passed_through() {
        let sample = map_depth_sample(&HalfW, 2, 0, 10 << 3);
        assert_eq!(sample.color_pixel, IVec2::new(-3, 0));
    }

    #[test]
    fn mapping_is_pure() {
        let transform = NominalTransform::new(Resolution::WORKING);
        for &(x, y, raw) in &[(0, 0, 0u16), (320, 240, 1500 << 3), (639, 479, u16::MAX)] {
            let a = map_depth_sample(&transform, x, y, raw);
            let b = map_depth_sample(&transform, x, y, raw);
            assert_eq!(a.position.to_array().map(f32::to_bits), b.position.to_array().map(f32::to_bits));
            assert_eq!(a.color_pixel, b.color_pixel);
        }
    }

    #[test]
    fn positive_depth_gives_non_negative_z() {
        let transform = NominalTransform::new(Resolution::WORKING);
        for &(x, y) in &[(0, 0), (639, 0), (0, 479), (639, 479), (320, 240)] {
            for mm in [1u16, 400, 1000, 4000, 8191] {
                let sample = map_depth_sample(&transform, x, y, pack_depth(mm));
                assert!(sample.position.z > 0.0, "z at ({x},{y}) {mm}mm");
            }
        }
    }
}
