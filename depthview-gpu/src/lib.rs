//! wgpu plumbing for depthview: device setup, a handle-based resource
//! registry, small builders, and the double-buffered point cloud storage.

mod builder;
mod pipeline;
mod point_buffers;
mod resource_registry;
pub mod shaders;
mod surface;
mod types;

pub use builder::{
    BindGroupBuildError, BufferBuildError, BufferBuilder, BufferUsage, UniformBindGroupBuilder,
};
pub use pipeline::{PipelineBuildError, RenderPipelineBuilder};
pub use point_buffers::{BufferMapError, POINT_STRIDE, PointCloudBuffers};
pub use resource_registry::{Handle, Resource, ResourceRegistry};
pub use surface::{DepthTarget, SurfaceWrapper};
pub use types::CameraUniforms;
pub use wgpu;

use tracing::info;
use wgpu::Instance;

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("Request Adapter Error: {0}")]
    RequestAdapterError(#[from] wgpu::RequestAdapterError),
    #[error("Request Device Error: {0}")]
    RequestDeviceError(#[from] wgpu::RequestDeviceError),
    #[error("Surface Error: {0}")]
    SurfaceError(#[from] wgpu::SurfaceError),
    #[error("Create surface error: {0}")]
    CreateSurfaceError(#[from] wgpu::CreateSurfaceError),
    #[error("Surface is not supported by the selected adapter")]
    UnsupportedSurface,
}

/// Owns the wgpu instance, adapter, device and queue.
pub struct Renderer {
    instance: Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl Renderer {
    /// Headless renderer on the default adapter.
    pub async fn new() -> Result<Self, RendererError> {
        let instance = Instance::new(&wgpu::InstanceDescriptor::from_env_or_default());
        Self::from_instance(instance, None).await
    }

    /// Renderer whose adapter can present to `target`, plus the configured
    /// surface for it.
    pub async fn with_window(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<(Self, SurfaceWrapper), RendererError> {
        let instance = Instance::new(&wgpu::InstanceDescriptor::from_env_or_default());
        let surface = instance.create_surface(target)?;
        let renderer = Self::from_instance(instance, Some(&surface)).await?;
        let surface = renderer.configure_surface(surface, width, height)?;
        Ok((renderer, surface))
    }

    async fn from_instance(
        instance: Instance,
        compatible_surface: Option<&wgpu::Surface<'static>>,
    ) -> Result<Self, RendererError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                compatible_surface,
                ..Default::default()
            })
            .await?;
        info!("Using adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Renderer"),
                ..Default::default()
            })
            .await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Configure `surface` with the adapter's preferred settings.
    pub fn configure_surface(
        &self,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
    ) -> Result<SurfaceWrapper, RendererError> {
        let config = surface
            .get_default_config(&self.adapter, width.max(1), height.max(1))
            .ok_or(RendererError::UnsupportedSurface)?;
        surface.configure(&self.device, &config);
        Ok(SurfaceWrapper::new(surface, config))
    }

    /// Start building a buffer on this renderer's device.
    pub fn create_buffer(&self) -> BufferBuilder<'_> {
        BufferBuilder::new(&self.device)
    }

    /// Compile WGSL and register the module.
    pub fn create_shader(
        &self,
        registry: &mut ResourceRegistry,
        label: &str,
        source: &str,
    ) -> Handle<wgpu::ShaderModule> {
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        registry.insert(module)
    }
}
