//! Depthview Capture - depth camera frames to point cloud buffers
//!
//! This crate turns the depth and color streams of a depth camera into two
//! index-aligned arrays: camera-space positions and normalized colors.
//!
//! - [`source`]: the device boundary (streams, frames, coordinate transforms)
//! - [`reader`]: non-blocking, scoped frame acquisition
//! - [`mapper`]: per-sample depth decoding and back-projection
//! - [`cloud`]: the depth and color passes over a whole frame
//! - [`session`]: an opened sensor with both streams
//! - [`synthetic`]: a procedural sensor
//!
//! ## Example
//!
//! ```ignore
//! use depthview_capture::{DepthCamera, SyntheticProvider};
//!
//! let mut camera = DepthCamera::connect(&SyntheticProvider::default())?;
//! let mut positions = vec![[0.0; 3]; camera.point_count()];
//! let mut colors = vec![[0.0; 3]; camera.point_count()];
//! camera.fill_depth_and_positions(&mut positions);
//! camera.fill_colors(&mut colors);
//! ```

pub mod cloud;
pub mod mapper;
pub mod reader;
pub mod session;
pub mod source;
pub mod synthetic;
pub mod transform;

#[cfg(test)]
mod testing;

pub use cloud::{FillOutcome, PointCloudBuilder, NO_COLOR};
pub use mapper::{decode_depth, map_depth_sample, pack_depth, MappedSample};
pub use reader::{acquire, ScopedFrame};
pub use session::{DepthCamera, BUFFERED_FRAMES};
pub use source::{
    CaptureError, DepthTransform, Resolution, SensorDevice, SensorFrame, SensorProvider,
    StreamHandle, StreamKind,
};
pub use synthetic::{SyntheticConfig, SyntheticProvider, SyntheticSensor};
pub use transform::NominalTransform;
