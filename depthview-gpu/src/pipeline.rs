use crate::resource_registry::{Handle, ResourceRegistry};

/// Builder for creating render pipelines
pub struct RenderPipelineBuilder<'a> {
    device: &'a wgpu::Device,
    vertex_shader: Option<Handle<wgpu::ShaderModule>>,
    fragment_shader: Option<Handle<wgpu::ShaderModule>>,
    label: Option<String>,
    bind_group_layouts: Vec<Handle<wgpu::BindGroupLayout>>,
    vertex_buffers: Vec<wgpu::VertexBufferLayout<'static>>,
    primitive: Option<wgpu::PrimitiveState>,
    depth_stencil: Option<wgpu::DepthStencilState>,
    fragment_targets: Vec<Option<wgpu::ColorTargetState>>,
}

impl<'a> RenderPipelineBuilder<'a> {
    pub fn new(device: &'a wgpu::Device) -> Self {
        Self {
            device,
            vertex_shader: None,
            fragment_shader: None,
            label: None,
            bind_group_layouts: Vec::new(),
            vertex_buffers: Vec::new(),
            primitive: None,
            depth_stencil: None,
            fragment_targets: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_vertex_shader(mut self, shader: Handle<wgpu::ShaderModule>) -> Self {
        self.vertex_shader = Some(shader);
        self
    }

    pub fn with_fragment_shader(mut self, shader: Handle<wgpu::ShaderModule>) -> Self {
        self.fragment_shader = Some(shader);
        self
    }

    /// Append a bind group layout; group indices follow insertion order
    pub fn with_bind_group_layout(mut self, layout: Handle<wgpu::BindGroupLayout>) -> Self {
        self.bind_group_layouts.push(layout);
        self
    }

    pub fn with_vertex_buffer(mut self, buffer: wgpu::VertexBufferLayout<'static>) -> Self {
        self.vertex_buffers.push(buffer);
        self
    }

    pub fn with_primitive(mut self, primitive: wgpu::PrimitiveState) -> Self {
        self.primitive = Some(primitive);
        self
    }

    pub fn with_depth_stencil(mut self, depth_stencil: wgpu::DepthStencilState) -> Self {
        self.depth_stencil = Some(depth_stencil);
        self
    }

    pub fn with_fragment_target(mut self, target: Option<wgpu::ColorTargetState>) -> Self {
        self.fragment_targets.push(target);
        self
    }

    /// Build the render pipeline and register it in the registry
    pub fn build(
        self,
        registry: &mut ResourceRegistry,
    ) -> Result<Handle<wgpu::RenderPipeline>, PipelineBuildError> {
        let vertex_handle = self
            .vertex_shader
            .ok_or(PipelineBuildError::MissingVertexShader)?;
        let vertex_shader = registry
            .get(vertex_handle)
            .ok_or(PipelineBuildError::ShaderNotFound)?;

        let fragment_shader = if let Some(h) = self.fragment_shader {
            Some(registry.get(h).ok_or(PipelineBuildError::ShaderNotFound)?)
        } else {
            None
        };

        let bind_group_layouts = self
            .bind_group_layouts
            .iter()
            .map(|&h| registry.get(h).ok_or(PipelineBuildError::BindGroupLayoutNotFound))
            .collect::<Result<Vec<_>, _>>()?;

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: self.label.as_deref(),
                bind_group_layouts: &bind_group_layouts,
                push_constant_ranges: &[],
            });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: self.label.as_deref(),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: vertex_shader,
                    entry_point: Some("vs_main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &self.vertex_buffers,
                },
                primitive: self.primitive.unwrap_or_else(|| wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::PointList,
                    ..Default::default()
                }),
                depth_stencil: self.depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                fragment: fragment_shader.map(|shader| wgpu::FragmentState {
                    module: shader,
                    entry_point: Some("fs_main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &self.fragment_targets,
                }),
                multiview: None,
                cache: None,
            });

        let handle = registry.insert(pipeline);
        Ok(handle)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineBuildError {
    #[error("Vertex shader is required")]
    MissingVertexShader,
    #[error("Shader module not found in registry")]
    ShaderNotFound,
    #[error("Bind group layout not found in registry")]
    BindGroupLayoutNotFound,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::point_buffers::PointCloudBuffers;
    use pollster::FutureExt;

    /// Headless device, or `None` on machines without an adapter.
    pub(crate) fn try_test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
        async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::from_env_or_default());
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions::default())
                .await
                .ok()?;
            adapter
                .request_device(&wgpu::DeviceDescriptor::default())
                .await
                .ok()
        }
        .block_on()
    }

    fn create_test_shader_module(device: &wgpu::Device) -> wgpu::ShaderModule {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("test_shader"),
            source: wgpu::ShaderSource::Wgsl(
                r#"
                @vertex
                fn vs_main(@location(0) pos: vec3<f32>, @location(1) color: vec3<f32>) -> @builtin(position) vec4<f32> {
                    return vec4<f32>(pos + color * 0.0, 1.0);
                }

                @fragment
                fn fs_main() -> @location(0) vec4<f32> {
                    return vec4<f32>(1.0, 0.0, 0.0, 1.0);
                }
                "#
                .into(),
            ),
        })
    }

    #[test]
    fn missing_vertex_shader() {
        let Some((device, _queue)) = try_test_device() else {
            return;
        };
        let mut registry = ResourceRegistry::default();

        let result = RenderPipelineBuilder::new(&device).build(&mut registry);
        assert!(matches!(result, Err(PipelineBuildError::MissingVertexShader)));
    }

    #[test]
    fn shader_not_found() {
        let Some((device, _queue)) = try_test_device() else {
            return;
        };
        let mut registry = ResourceRegistry::default();

        let result = RenderPipelineBuilder::new(&device)
            .with_vertex_shader(Handle::<wgpu::ShaderModule>::next())
            .build(&mut registry);
        assert!(matches!(result, Err(PipelineBuildError::ShaderNotFound)));
    }

    #[test]
    fn point_list_with_split_position_and_color_buffers() {
        let Some((device, _queue)) = try_test_device() else {
            return;
        };
        let mut registry = ResourceRegistry::default();

        let shader = registry.insert(create_test_shader_module(&device));
        let [positions, colors] = PointCloudBuffers::vertex_layouts();
        let pipeline_handle = RenderPipelineBuilder::new(&device)
            .with_label("test_pipeline")
            .with_vertex_shader(shader)
            .with_fragment_shader(shader)
            .with_vertex_buffer(positions)
            .with_vertex_buffer(colors)
            .with_depth_stencil(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            })
            .with_fragment_target(Some(wgpu::ColorTargetState {
                format: wgpu::TextureFormat::Rgba8Unorm,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            }))
            .build(&mut registry)
            .expect("Failed to build pipeline");

        assert!(registry.get(pipeline_handle).is_some());
    }
}
