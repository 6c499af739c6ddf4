//! Capture device interface.
//!
//! These traits are the boundary to the sensor driver: stream opening,
//! non-blocking frame polling, frame buffer locking and release, and the
//! device's coordinate transform service.

use glam::{IVec2, Vec4};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while bringing up a capture device.
///
/// All of these are fatal at startup. Missed frames during streaming are not
/// errors and never show up here.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("No depth sensor found")]
    DeviceNotFound,

    #[error("Expected exactly one depth sensor, found {0}")]
    MultipleDevices(usize),

    #[error("Failed to initialize sensor: {0}")]
    InitFailed(String),

    #[error("Failed to open {kind} stream: {reason}")]
    StreamOpenFailed { kind: StreamKind, reason: String },
}

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// The fixed working resolution of both streams.
    pub const WORKING: Resolution = Resolution::new(640, 480);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels in one frame.
    pub const fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether `pixel` lies inside `[0, width) x [0, height)`.
    pub fn contains(&self, pixel: IVec2) -> bool {
        pixel.x >= 0 && pixel.y >= 0 && (pixel.x as u32) < self.width && (pixel.y as u32) < self.height
    }
}

/// Which sensor a stream reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// 16-bit packed depth, 2 bytes per pixel.
    Depth,
    /// BGRA color, 4 bytes per pixel.
    Color,
}

impl StreamKind {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            StreamKind::Depth => 2,
            StreamKind::Color => 4,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Depth => f.write_str("depth"),
            StreamKind::Color => f.write_str("color"),
        }
    }
}

/// Opaque handle to an opened device stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle {
    id: u32,
    kind: StreamKind,
}

impl StreamHandle {
    pub fn new(id: u32, kind: StreamKind) -> Self {
        Self { id, kind }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }
}

/// A frame handed out by [`SensorDevice::next_frame`].
///
/// The pixel buffer is only valid between `lock` and `unlock`.
pub trait SensorFrame {
    /// Lock the pixel buffer for reading and return its row pitch in bytes.
    ///
    /// A pitch of 0 means the frame carries no data.
    fn lock(&mut self) -> usize;

    /// The locked pixel bytes.
    fn bits(&self) -> &[u8];

    /// Unlock the pixel buffer.
    fn unlock(&mut self);
}

/// The device's depth-to-camera-space and depth-to-color-pixel lookups at the
/// working resolution.
///
/// `packed_depth` is the millimeter depth shifted left by the player index
/// bits, which is the form the device expects.
pub trait DepthTransform {
    /// Back-project a depth pixel into camera space. The result is homogeneous.
    fn depth_to_camera_space(&self, x: u32, y: u32, packed_depth: u16) -> Vec4;

    /// Color-image pixel seen at the same point. May lie outside the frame.
    fn depth_to_color_pixel(&self, x: u32, y: u32, packed_depth: u16) -> IVec2;
}

/// A depth camera with a depth stream and a color stream.
pub trait SensorDevice {
    type Frame: SensorFrame;
    type Transform: DepthTransform;

    /// Open a stream at `resolution`, buffering up to `buffered_frames` frames.
    fn open_stream(
        &mut self,
        kind: StreamKind,
        resolution: Resolution,
        buffered_frames: u32,
    ) -> Result<StreamHandle, CaptureError>;

    /// Poll the next frame of `stream`. A zero timeout never blocks.
    fn next_frame(&mut self, stream: StreamHandle, timeout: Duration) -> Option<Self::Frame>;

    /// Give a frame back to the device.
    fn release_frame(&mut self, stream: StreamHandle, frame: Self::Frame);

    /// The coordinate transform service for this device.
    fn coordinate_transform(&self) -> Self::Transform;
}

/// Enumerates attached sensors.
pub trait SensorProvider {
    type Device: SensorDevice;

    fn sensor_count(&self) -> Result<usize, CaptureError>;

    /// Create and initialize the sensor at `index` for depth and color capture.
    fn create_sensor(&self, index: usize) -> Result<Self::Device, CaptureError>;
}
