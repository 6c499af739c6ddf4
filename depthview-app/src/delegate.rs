//! Point cloud render delegate fed live from a depth camera.

use depthview_capture::{DepthCamera, FillOutcome, SensorDevice};
use depthview_gpu::wgpu;
use depthview_gpu::{
    BufferUsage, CameraUniforms, Handle, PointCloudBuffers, RenderPipelineBuilder, Renderer,
    ResourceRegistry, UniformBindGroupBuilder, shaders,
};
use depthview_window::{RenderContext, RenderDelegate};
use std::error::Error;
use tracing::{error, info, trace, warn};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Draws one point per depth pixel, refilled from the sensor every frame.
pub struct PointCloudDelegate<D: SensorDevice> {
    camera: DepthCamera<D>,
    buffers: PointCloudBuffers,
    camera_buffer_handle: Handle<wgpu::Buffer>,
    bind_group_handle: Handle<wgpu::BindGroup>,
    pipeline_handle: Handle<wgpu::RenderPipeline>,
    frames: u64,
}

impl<D: SensorDevice> PointCloudDelegate<D> {
    fn log_outcome(&self, pass: &str, outcome: FillOutcome) {
        match outcome {
            FillOutcome::Filled(points) => trace!(frame = self.frames, points, "{pass} filled"),
            FillOutcome::Unavailable => trace!(frame = self.frames, "{pass} unavailable"),
            FillOutcome::NoData => trace!(frame = self.frames, "{pass} had no data"),
        }
    }
}

impl<D: SensorDevice> RenderDelegate for PointCloudDelegate<D> {
    type InitData = DepthCamera<D>;

    fn create(
        renderer: &Renderer,
        registry: &mut ResourceRegistry,
        surface_format: wgpu::TextureFormat,
        camera: Self::InitData,
    ) -> Result<Self, Box<dyn Error>> {
        let device = renderer.device();
        let point_count = u32::try_from(camera.point_count())?;
        let buffers = PointCloudBuffers::new(device, registry, point_count)?;
        info!(
            "Allocated {} points ({} bytes per attribute)",
            point_count,
            buffers.byte_size()
        );

        let camera_buffer_handle = renderer
            .create_buffer()
            .label("Camera Buffer")
            .with_pod_data(&[CameraUniforms::default()])
            .usage(BufferUsage::Uniform)
            .build(registry)?;

        let (bind_group_layout_handle, bind_group_handle) = UniformBindGroupBuilder::new(device)
            .label("Camera Bind Group")
            .uniform::<CameraUniforms>(camera_buffer_handle)
            .build(registry)?;

        let shader = renderer.create_shader(registry, "point_cloud", shaders::POINT_CLOUD);
        let [positions, colors] = PointCloudBuffers::vertex_layouts();

        let pipeline_handle = RenderPipelineBuilder::new(device)
            .with_label("Point Cloud Pipeline")
            .with_vertex_shader(shader)
            .with_fragment_shader(shader)
            .with_bind_group_layout(bind_group_layout_handle)
            .with_vertex_buffer(positions)
            .with_vertex_buffer(colors)
            .with_primitive(wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::PointList,
                ..Default::default()
            })
            .with_fragment_target(Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            }))
            .with_depth_stencil(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            })
            .build(registry)?;

        Ok(Self {
            camera,
            buffers,
            camera_buffer_handle,
            bind_group_handle,
            pipeline_handle,
            frames: 0,
        })
    }

    fn depth_format(&self) -> Option<wgpu::TextureFormat> {
        Some(DEPTH_FORMAT)
    }

    fn prepare(&mut self, renderer: &Renderer, registry: &ResourceRegistry) {
        self.frames += 1;
        let device = renderer.device();

        // Depth first: the color pass reads the pixel map it leaves behind.
        let camera = &mut self.camera;
        match self
            .buffers
            .with_mapped_position(device, registry, |dest| camera.fill_depth_and_positions(dest))
        {
            Ok(outcome) => self.log_outcome("depth", outcome),
            Err(e) => warn!("Skipping depth fill: {e}"),
        }

        let camera = &mut self.camera;
        match self
            .buffers
            .with_mapped_color(device, registry, |dest| camera.fill_colors(dest))
        {
            Ok(outcome) => self.log_outcome("color", outcome),
            Err(e) => warn!("Skipping color fill: {e}"),
        }
    }

    fn update(&mut self, queue: &wgpu::Queue, registry: &ResourceRegistry, camera: &CameraUniforms) {
        let Some(camera_buffer) = registry.get(self.camera_buffer_handle) else {
            warn!("Camera buffer missing from registry");
            return;
        };
        queue.write_buffer(camera_buffer, 0, bytemuck::bytes_of(camera));
    }

    fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        ctx: RenderContext,
        registry: &ResourceRegistry,
    ) {
        if let Err(e) = self.buffers.record_upload(encoder, registry) {
            error!("Failed to record point upload: {e}");
            return;
        }

        let (Some(pipeline), Some(bind_group), Some(positions), Some(colors)) = (
            registry.get(self.pipeline_handle),
            registry.get(self.bind_group_handle),
            registry.get(self.buffers.position_buffer()),
            registry.get(self.buffers.color_buffer()),
        ) else {
            error!("Point cloud resources missing from registry");
            return;
        };

        let depth_stencil_attachment =
            ctx.depth_view
                .map(|depth_view| wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Point Cloud Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: ctx.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, bind_group, &[]);
        render_pass.set_vertex_buffer(0, positions.slice(..));
        render_pass.set_vertex_buffer(1, colors.slice(..));
        render_pass.draw(0..self.buffers.point_count(), 0..1);
    }
}
