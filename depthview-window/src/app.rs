use crate::camera::{OrbitController, Projection};
use depthview_gpu::wgpu;
use depthview_gpu::{CameraUniforms, Renderer, ResourceRegistry, SurfaceWrapper};
use std::error::Error;
use std::sync::Arc;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

const WINDOW_WIDTH: u32 = 640;
const WINDOW_HEIGHT: u32 = 480;

/// Context passed to the render delegate for rendering.
pub struct RenderContext<'a> {
    pub color_view: &'a wgpu::TextureView,
    pub depth_view: Option<&'a wgpu::TextureView>,
}

/// What the window shell drives once per frame.
pub trait RenderDelegate: Sized {
    /// Data needed to construct the delegate.
    type InitData;

    /// Create GPU resources for rendering.
    fn create(
        renderer: &Renderer,
        registry: &mut ResourceRegistry,
        surface_format: wgpu::TextureFormat,
        init_data: Self::InitData,
    ) -> Result<Self, Box<dyn Error>>;

    /// Return depth format if depth testing is needed. Default is None (no depth).
    fn depth_format(&self) -> Option<wgpu::TextureFormat> {
        None
    }

    /// Refresh CPU-side data for this frame, before any commands are encoded.
    fn prepare(&mut self, _renderer: &Renderer, _registry: &ResourceRegistry) {}

    /// Update GPU resources (e.g., camera uniforms).
    fn update(&mut self, queue: &wgpu::Queue, registry: &ResourceRegistry, camera: &CameraUniforms);

    /// Record render commands.
    fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        ctx: RenderContext,
        registry: &ResourceRegistry,
    );
}

/// Install the global `tracing` subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    #[cfg(feature = "tracy")]
    {
        use tracing_subscriber::Layer;
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;
        tracing_subscriber::registry()
            .with(tracing_tracy::TracyLayer::default())
            .with(
                tracing_subscriber::fmt::layer().with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "info".into()),
                ),
            )
            .init();
    }

    #[cfg(not(feature = "tracy"))]
    {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_target(false)
            .init();
    }
}

/// Open a window and drive `D` until the window closes.
pub fn run_with_delegate<D: RenderDelegate + 'static>(
    title: &str,
    init_data: D::InitData,
) -> Result<(), Box<dyn Error>>
where
    D::InitData: 'static,
{
    let event_loop = EventLoop::new().map_err(|e| format!("Failed to create event loop: {e}"))?;
    let mut app = App::<D>::new(title.to_string(), init_data);
    let run_result = event_loop.run_app(&mut app);
    let app_result = app.finish();
    run_result?;
    app_result
}

struct App<D: RenderDelegate> {
    title: String,
    init_data: Option<D::InitData>,
    state: Option<ViewerState<D>>,
    error: Option<String>,
}

impl<D: RenderDelegate> App<D> {
    fn new(title: String, init_data: D::InitData) -> Self {
        Self {
            title,
            init_data: Some(init_data),
            state: None,
            error: None,
        }
    }

    fn finish(self) -> Result<(), Box<dyn Error>> {
        if let Some(err) = self.error {
            Err(err.into())
        } else {
            Ok(())
        }
    }
}

impl<D: RenderDelegate + 'static> ApplicationHandler for App<D> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() || self.error.is_some() {
            return;
        }
        let Some(init_data) = self.init_data.take() else {
            return;
        };

        match ViewerState::<D>::new(event_loop, &self.title, init_data) {
            Ok(state) => self.state = Some(state),
            Err(err) => {
                error!("Failed to initialize viewer: {err}");
                self.error = Some(err.to_string());
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if state.window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size),
            WindowEvent::RedrawRequested => {
                let _frame_span = tracing::info_span!("frame").entered();
                match state.render() {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.window.inner_size();
                        state.resize(size);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        error!("GPU Out of Memory - exiting");
                        event_loop.exit();
                    }
                    Err(e) => error!("Render error: {:?}", e),
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.as_ref() {
            state.window.request_redraw();
        }
    }
}

struct ViewerState<D: RenderDelegate> {
    window: Arc<Window>,
    renderer: Renderer,
    surface: SurfaceWrapper,
    registry: ResourceRegistry,
    delegate: D,
    controller: OrbitController,
    projection: Projection,
}

impl<D: RenderDelegate> ViewerState<D> {
    fn new(
        event_loop: &ActiveEventLoop,
        title: &str,
        init_data: D::InitData,
    ) -> Result<Self, Box<dyn Error>> {
        let window_attributes = Window::default_attributes()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT));
        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let size = window.inner_size();

        let (renderer, mut surface) = pollster::block_on(Renderer::with_window(
            window.clone(),
            size.width,
            size.height,
        ))?;
        info!(
            "Surface {}x{} {:?}",
            surface.width(),
            surface.height(),
            surface.format()
        );

        let mut registry = ResourceRegistry::default();
        let delegate = D::create(&renderer, &mut registry, surface.format(), init_data)?;

        if let Some(depth_format) = delegate.depth_format() {
            surface.enable_depth(renderer.device(), depth_format);
        }

        Ok(Self {
            window,
            renderer,
            projection: Projection::new(surface.width(), surface.height()),
            surface,
            registry,
            delegate,
            controller: OrbitController::new(),
        })
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.surface
            .resize(self.renderer.device(), new_size.width, new_size.height);
        self.projection.resize(new_size.width, new_size.height);
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        self.delegate.prepare(&self.renderer, &self.registry);

        let pose = self.controller.advance();
        let uniforms =
            CameraUniforms::from_matrices(pose.view_matrix(), self.projection.matrix(), pose.eye);
        self.delegate
            .update(self.renderer.queue(), &self.registry, &uniforms);

        let surface_texture = self.surface.get_current_texture()?;
        let surface_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder =
            self.renderer
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Frame Encoder"),
                });

        let ctx = RenderContext {
            color_view: &surface_view,
            depth_view: self.surface.depth_view(),
        };
        self.delegate.render(&mut encoder, ctx, &self.registry);

        self.renderer.queue().submit(Some(encoder.finish()));
        surface_texture.present();
        Ok(())
    }
}
