//! Device buffers for point cloud positions and colors.
//!
//! Each attribute has a persistent CPU-writable staging buffer and a
//! device-local vertex buffer of the same size. A frame maps the staging
//! buffer, fills it, unmaps it, and records a copy into the vertex buffer ahead
//! of the draw. Staging contents survive between frames, so a fill that finds
//! no new data leaves last frame's points in place.

use crate::builder::{BufferBuildError, BufferBuilder, BufferUsage};
use crate::resource_registry::{Handle, ResourceRegistry};
use std::sync::mpsc::{self, TryRecvError};
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Bytes per point in either buffer: three `f32`s.
pub const POINT_STRIDE: u64 = std::mem::size_of::<[f32; 3]>() as u64;

const MAP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum BufferMapError {
    #[error("Point cloud buffer not found in registry")]
    BufferNotFound,
    #[error("Failed to map buffer: {0}")]
    Map(wgpu::BufferAsyncError),
    #[error("Timed out waiting for buffer mapping")]
    Timeout,
    #[error("Buffer mapping callback was dropped")]
    CallbackDropped,
    #[error("Mapped range is not a [f32; 3] array: {0}")]
    Layout(bytemuck::PodCastError),
}

struct AttributeBuffers {
    staging: Handle<wgpu::Buffer>,
    vertex: Handle<wgpu::Buffer>,
}

impl AttributeBuffers {
    fn new(
        device: &wgpu::Device,
        registry: &mut ResourceRegistry,
        name: &str,
        size: u64,
    ) -> Result<Self, BufferBuildError> {
        let staging = BufferBuilder::new(device)
            .label(format!("{name} Staging Buffer"))
            .size(size)
            .usage(BufferUsage::Staging)
            .build(registry)?;
        let vertex = BufferBuilder::new(device)
            .label(format!("{name} Vertex Buffer"))
            .size(size)
            .usage(BufferUsage::Vertex)
            .build(registry)?;
        Ok(Self { staging, vertex })
    }
}

/// Unmaps on drop, including when the map is still pending.
struct MapGuard<'a> {
    buffer: &'a wgpu::Buffer,
    armed: bool,
}

impl Drop for MapGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.buffer.unmap();
        }
    }
}

/// Position and color buffers for a fixed number of points.
///
/// Allocated once; never resized.
pub struct PointCloudBuffers {
    point_count: u32,
    byte_size: u64,
    positions: AttributeBuffers,
    colors: AttributeBuffers,
}

impl PointCloudBuffers {
    pub fn new(
        device: &wgpu::Device,
        registry: &mut ResourceRegistry,
        point_count: u32,
    ) -> Result<Self, BufferBuildError> {
        let byte_size = point_count as u64 * POINT_STRIDE;
        let positions = AttributeBuffers::new(device, registry, "Position", byte_size)?;
        let colors = AttributeBuffers::new(device, registry, "Color", byte_size)?;
        Ok(Self {
            point_count,
            byte_size,
            positions,
            colors,
        })
    }

    pub fn point_count(&self) -> u32 {
        self.point_count
    }

    /// Size of each buffer in bytes.
    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn position_buffer(&self) -> Handle<wgpu::Buffer> {
        self.positions.vertex
    }

    pub fn color_buffer(&self) -> Handle<wgpu::Buffer> {
        self.colors.vertex
    }

    /// Map the position staging buffer for writing and hand it to `fill`.
    ///
    /// The buffer is unmapped when this returns, whatever `fill` did.
    pub fn with_mapped_position<R>(
        &self,
        device: &wgpu::Device,
        registry: &ResourceRegistry,
        fill: impl FnOnce(&mut [[f32; 3]]) -> R,
    ) -> Result<R, BufferMapError> {
        let staging = registry
            .get(self.positions.staging)
            .ok_or(BufferMapError::BufferNotFound)?;
        with_mapped(device, staging, fill)
    }

    /// Map the color staging buffer for writing and hand it to `fill`.
    pub fn with_mapped_color<R>(
        &self,
        device: &wgpu::Device,
        registry: &ResourceRegistry,
        fill: impl FnOnce(&mut [[f32; 3]]) -> R,
    ) -> Result<R, BufferMapError> {
        let staging = registry
            .get(self.colors.staging)
            .ok_or(BufferMapError::BufferNotFound)?;
        with_mapped(device, staging, fill)
    }

    /// Record staging-to-vertex copies for both attributes.
    ///
    /// Must be recorded after the fills and before the draw that reads them.
    pub fn record_upload(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        registry: &ResourceRegistry,
    ) -> Result<(), BufferMapError> {
        for attribute in [&self.positions, &self.colors] {
            let staging = registry
                .get(attribute.staging)
                .ok_or(BufferMapError::BufferNotFound)?;
            let vertex = registry
                .get(attribute.vertex)
                .ok_or(BufferMapError::BufferNotFound)?;
            encoder.copy_buffer_to_buffer(staging, 0, vertex, 0, self.byte_size);
        }
        Ok(())
    }

    /// Layouts for binding positions at slot 0 (location 0) and colors at
    /// slot 1 (location 1).
    pub fn vertex_layouts() -> [wgpu::VertexBufferLayout<'static>; 2] {
        const POSITION: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
        const COLOR: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];
        [
            wgpu::VertexBufferLayout {
                array_stride: POINT_STRIDE,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &POSITION,
            },
            wgpu::VertexBufferLayout {
                array_stride: POINT_STRIDE,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &COLOR,
            },
        ]
    }
}

fn with_mapped<R>(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
    fill: impl FnOnce(&mut [[f32; 3]]) -> R,
) -> Result<R, BufferMapError> {
    let slice = buffer.slice(..);
    let (sender, receiver) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Write, move |result| {
        let _ = sender.send(result);
    });
    let mut guard = MapGuard {
        buffer,
        armed: true,
    };

    let start = Instant::now();
    loop {
        let _ = device.poll(wgpu::PollType::Poll);
        match receiver.try_recv() {
            Ok(Ok(())) => break,
            Ok(Err(e)) => {
                guard.armed = false;
                warn!("Buffer map failed: {e}");
                return Err(BufferMapError::Map(e));
            }
            Err(TryRecvError::Disconnected) => return Err(BufferMapError::CallbackDropped),
            Err(TryRecvError::Empty) => {}
        }
        if start.elapsed() > MAP_TIMEOUT {
            return Err(BufferMapError::Timeout);
        }
        std::thread::sleep(Duration::from_micros(100));
    }
    trace!("Mapped {:?} after {:?}", buffer.size(), start.elapsed());

    let mut view = slice.get_mapped_range_mut();
    let points = bytemuck::try_cast_slice_mut::<u8, [f32; 3]>(&mut view)
        .map_err(BufferMapError::Layout)?;
    Ok(fill(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::try_test_device;

    #[test]
    fn zero_points_is_rejected() {
        let Some((device, _queue)) = try_test_device() else {
            return;
        };
        let mut registry = ResourceRegistry::new();
        assert!(matches!(
            PointCloudBuffers::new(&device, &mut registry, 0),
            Err(BufferBuildError::UnalignedSize(0))
        ));
    }

    #[test]
    fn allocates_four_buffers_of_twelve_bytes_per_point() {
        let Some((device, _queue)) = try_test_device() else {
            return;
        };
        let mut registry = ResourceRegistry::new();
        let buffers = PointCloudBuffers::new(&device, &mut registry, 640 * 480).unwrap();
        assert_eq!(buffers.byte_size(), 640 * 480 * 3 * 4);
        assert_eq!(registry.len::<wgpu::Buffer>(), 4);
        let vertex = registry.get(buffers.position_buffer()).unwrap();
        assert_eq!(vertex.size(), buffers.byte_size());
        assert!(vertex.usage().contains(wgpu::BufferUsages::VERTEX));
    }

    #[test]
    fn mapping_is_released_after_fill() {
        let Some((device, _queue)) = try_test_device() else {
            return;
        };
        let mut registry = ResourceRegistry::new();
        let buffers = PointCloudBuffers::new(&device, &mut registry, 4).unwrap();

        let len = buffers
            .with_mapped_color(&device, &registry, |points| points.len())
            .unwrap();
        assert_eq!(len, 4);
        let staging = registry.get(buffers.colors.staging).unwrap();
        assert_eq!(staging.map_state(), wgpu::MapState::Unmapped);
    }

    #[test]
    fn skipped_fill_keeps_previous_contents() {
        let Some((device, queue)) = try_test_device() else {
            return;
        };
        let mut registry = ResourceRegistry::new();
        let buffers = PointCloudBuffers::new(&device, &mut registry, 2).unwrap();

        let frame_one = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        buffers
            .with_mapped_position(&device, &registry, |points| points.copy_from_slice(&frame_one))
            .unwrap();

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        buffers.record_upload(&mut encoder, &registry).unwrap();
        queue.submit(Some(encoder.finish()));

        // a frame whose fill found nothing to write
        buffers
            .with_mapped_position(&device, &registry, |_points| ())
            .unwrap();

        let contents = buffers
            .with_mapped_position(&device, &registry, |points| points.to_vec())
            .unwrap();
        assert_eq!(contents, frame_one);
    }

    #[test]
    fn layouts_use_locations_zero_and_one() {
        let [positions, colors] = PointCloudBuffers::vertex_layouts();
        assert_eq!(positions.array_stride, 12);
        assert_eq!(positions.attributes[0].shader_location, 0);
        assert_eq!(colors.attributes[0].shader_location, 1);
        assert_eq!(colors.attributes[0].format, wgpu::VertexFormat::Float32x3);
    }
}
