//! High-level builder APIs for creating GPU resources
//!
//! These builders provide a simpler, more ergonomic API compared to
//! directly using wgpu descriptors.

use crate::resource_registry::{Handle, ResourceRegistry};

/// Buffer usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex buffer filled by copies from a staging buffer
    Vertex,
    /// Uniform buffer updated through the queue
    Uniform,
    /// CPU-writable staging buffer, copied into device-local buffers
    Staging,
}

impl BufferUsage {
    fn to_wgpu(self) -> wgpu::BufferUsages {
        match self {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            BufferUsage::Staging => wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC,
        }
    }
}

/// Builder for creating GPU buffers
pub struct BufferBuilder<'a> {
    device: &'a wgpu::Device,
    label: Option<String>,
    size: Option<u64>,
    data: Option<&'a [u8]>,
    usage: BufferUsage,
}

impl<'a> BufferBuilder<'a> {
    pub(crate) fn new(device: &'a wgpu::Device) -> Self {
        Self {
            device,
            label: None,
            size: None,
            data: None,
            usage: BufferUsage::Vertex,
        }
    }

    /// Set the buffer label
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set buffer size (for empty buffers)
    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set buffer data from a slice of Pod types
    pub fn with_pod_data<T: bytemuck::Pod>(mut self, data: &'a [T]) -> Self {
        self.data = Some(bytemuck::cast_slice(data));
        self
    }

    /// Set buffer usage
    pub fn usage(mut self, usage: BufferUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Build the buffer and register it in the registry
    pub fn build(
        self,
        registry: &mut ResourceRegistry,
    ) -> Result<Handle<wgpu::Buffer>, BufferBuildError> {
        use wgpu::util::DeviceExt;

        let buffer = if let Some(data) = self.data {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: self.label.as_deref(),
                contents: data,
                usage: self.usage.to_wgpu(),
            })
        } else if let Some(size) = self.size {
            if size == 0 || size % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
                return Err(BufferBuildError::UnalignedSize(size));
            }
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: self.label.as_deref(),
                size,
                usage: self.usage.to_wgpu(),
                mapped_at_creation: false,
            })
        } else {
            return Err(BufferBuildError::MissingSizeOrData);
        };

        Ok(registry.insert(buffer))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BufferBuildError {
    #[error("Buffer must have either size or data")]
    MissingSizeOrData,
    #[error("Buffer size {0} is zero or not a multiple of the copy alignment")]
    UnalignedSize(u64),
}

/// Builder for a single uniform-buffer bind group and its layout
pub struct UniformBindGroupBuilder<'a> {
    device: &'a wgpu::Device,
    label: Option<String>,
    buffer: Option<Handle<wgpu::Buffer>>,
    visibility: wgpu::ShaderStages,
    min_binding_size: Option<wgpu::BufferSize>,
}

impl<'a> UniformBindGroupBuilder<'a> {
    pub fn new(device: &'a wgpu::Device) -> Self {
        Self {
            device,
            label: None,
            buffer: None,
            visibility: wgpu::ShaderStages::VERTEX,
            min_binding_size: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Bind `buffer` at binding 0, sized for one `T`
    pub fn uniform<T>(mut self, buffer: Handle<wgpu::Buffer>) -> Self {
        self.buffer = Some(buffer);
        self.min_binding_size = wgpu::BufferSize::new(std::mem::size_of::<T>() as u64);
        self
    }

    pub fn visibility(mut self, visibility: wgpu::ShaderStages) -> Self {
        self.visibility = visibility;
        self
    }

    /// Build the layout and bind group and register both
    pub fn build(
        self,
        registry: &mut ResourceRegistry,
    ) -> Result<(Handle<wgpu::BindGroupLayout>, Handle<wgpu::BindGroup>), BindGroupBuildError> {
        let buffer_handle = self.buffer.ok_or(BindGroupBuildError::MissingBuffer)?;

        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: self.label.as_deref(),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: self.visibility,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: self.min_binding_size,
                    },
                    count: None,
                }],
            });

        let buffer = registry
            .get(buffer_handle)
            .ok_or(BindGroupBuildError::BufferNotFound)?;
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: self.label.as_deref(),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        Ok((registry.insert(layout), registry.insert(bind_group)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BindGroupBuildError {
    #[error("Uniform buffer is required")]
    MissingBuffer,
    #[error("Uniform buffer not found in registry")]
    BufferNotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_is_map_write_copy_src() {
        let usage = BufferUsage::Staging.to_wgpu();
        assert_eq!(usage, wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC);
    }

    #[test]
    fn vertex_accepts_copies() {
        assert!(BufferUsage::Vertex.to_wgpu().contains(wgpu::BufferUsages::COPY_DST));
    }
}
