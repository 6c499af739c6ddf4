//! Scripted sensor used by the unit tests.

use crate::mapper::pack_depth;
use crate::source::{
    CaptureError, DepthTransform, Resolution, SensorDevice, SensorFrame, StreamHandle, StreamKind,
};
use crate::transform::NominalTransform;
use glam::{IVec2, Vec4};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

pub(crate) struct ScriptedFrame {
    pitch: usize,
    bytes: Vec<u8>,
    locked: bool,
    locks: usize,
    unlocks: usize,
}

impl ScriptedFrame {
    pub(crate) fn new(pitch: usize, bytes: Vec<u8>) -> Self {
        Self {
            pitch,
            bytes,
            locked: false,
            locks: 0,
            unlocks: 0,
        }
    }

    /// A frame whose lock reports pitch 0.
    pub(crate) fn empty() -> Self {
        Self::new(0, Vec::new())
    }

    /// Depth frame from millimeter values, player index bits left clear.
    pub(crate) fn depth_mm(width: usize, depths: &[u16]) -> Self {
        let bytes = depths
            .iter()
            .flat_map(|&mm| pack_depth(mm).to_le_bytes())
            .collect();
        Self::new(width * 2, bytes)
    }

    /// Color frame from RGB triples, stored as BGRA.
    pub(crate) fn rgb(width: usize, pixels: &[[u8; 3]]) -> Self {
        let bytes = pixels
            .iter()
            .flat_map(|&[r, g, b]| [b, g, r, 255])
            .collect();
        Self::new(width * 4, bytes)
    }
}

impl SensorFrame for ScriptedFrame {
    fn lock(&mut self) -> usize {
        self.locked = true;
        self.locks += 1;
        self.pitch
    }

    fn bits(&self) -> &[u8] {
        &self.bytes
    }

    fn unlock(&mut self) {
        self.locked = false;
        self.unlocks += 1;
    }
}

/// Camera space from the nominal intrinsics, color pixel equal to the depth
/// pixel plus a fixed offset.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AlignedTransform {
    nominal: NominalTransform,
    offset: IVec2,
}

impl DepthTransform for AlignedTransform {
    fn depth_to_camera_space(&self, x: u32, y: u32, packed_depth: u16) -> Vec4 {
        self.nominal.depth_to_camera_space(x, y, packed_depth)
    }

    fn depth_to_color_pixel(&self, x: u32, y: u32, _packed_depth: u16) -> IVec2 {
        IVec2::new(x as i32, y as i32) + self.offset
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SensorStats {
    pub locks: usize,
    pub unlocks: usize,
    pub releases: usize,
    pub unlocked_before_release: usize,
    pub last_timeout: Option<Duration>,
}

pub(crate) struct ScriptedSensor {
    resolution: Resolution,
    color_offset: IVec2,
    queues: HashMap<StreamKind, VecDeque<Option<ScriptedFrame>>>,
    opened: Vec<(StreamKind, Resolution, u32)>,
    stats: SensorStats,
}

impl ScriptedSensor {
    pub(crate) fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            color_offset: IVec2::ZERO,
            queues: HashMap::new(),
            opened: Vec::new(),
            stats: SensorStats::default(),
        }
    }

    pub(crate) fn with_color_offset(mut self, offset: IVec2) -> Self {
        self.color_offset = offset;
        self
    }

    pub(crate) fn open_depth(&mut self) -> StreamHandle {
        StreamHandle::new(1, StreamKind::Depth)
    }

    pub(crate) fn open_color(&mut self) -> StreamHandle {
        StreamHandle::new(2, StreamKind::Color)
    }

    /// Queue the result of the next poll on `kind`. `None` means unavailable.
    pub(crate) fn push(&mut self, kind: StreamKind, frame: Option<ScriptedFrame>) {
        self.queues.entry(kind).or_default().push_back(frame);
    }

    pub(crate) fn stats(&self) -> SensorStats {
        self.stats
    }

    pub(crate) fn opened(&self) -> &[(StreamKind, Resolution, u32)] {
        &self.opened
    }
}

impl SensorDevice for ScriptedSensor {
    type Frame = ScriptedFrame;
    type Transform = AlignedTransform;

    fn open_stream(
        &mut self,
        kind: StreamKind,
        resolution: Resolution,
        buffered_frames: u32,
    ) -> Result<StreamHandle, CaptureError> {
        self.opened.push((kind, resolution, buffered_frames));
        Ok(match kind {
            StreamKind::Depth => self.open_depth(),
            StreamKind::Color => self.open_color(),
        })
    }

    fn next_frame(&mut self, stream: StreamHandle, timeout: Duration) -> Option<ScriptedFrame> {
        self.stats.last_timeout = Some(timeout);
        self.queues.get_mut(&stream.kind())?.pop_front().flatten()
    }

    fn release_frame(&mut self, _stream: StreamHandle, frame: ScriptedFrame) {
        self.stats.locks += frame.locks;
        self.stats.unlocks += frame.unlocks;
        self.stats.releases += 1;
        if !frame.locked {
            self.stats.unlocked_before_release += 1;
        }
    }

    fn coordinate_transform(&self) -> AlignedTransform {
        AlignedTransform {
            nominal: NominalTransform::new(self.resolution),
            offset: self.color_offset,
        }
    }
}
