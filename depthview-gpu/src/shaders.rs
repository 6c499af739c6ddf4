//! Shader source code embedded at compile time.

/// Point cloud shader - `vs_main` reads position (location 0) and color
/// (location 1) from two vertex buffers, `fs_main` writes the color.
pub const POINT_CLOUD: &str = include_str!("../shaders/point_cloud.wgsl");
