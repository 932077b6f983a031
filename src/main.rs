//! Veldt - infinite grass viewer

use std::path::Path;
use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window, WindowId},
};

use veldt::core::{
    camera::Camera,
    camera_controller::FpsCameraController,
    input::InputState,
    logging,
    time::FrameTimer,
    types::{Result, Vec2, Vec3},
};
use veldt::grass::{FrameOutcome, GrassConfig, GrassRenderer};
use veldt::render::context::GpuContext;
use veldt::terrain::{TerrainGenerator, TerrainMesh, TerrainParams, TerrainPipeline};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Terrain mesh extent in meters; comfortably covers the default draw
/// distance from the starting area
const TERRAIN_SIZE: f32 = 900.0;
const TERRAIN_RESOLUTION: u32 = 600;

struct RenderState {
    gpu: GpuContext,
    depth_view: wgpu::TextureView,
    terrain_mesh: TerrainMesh,
    terrain_pipeline: TerrainPipeline,
    grass: GrassRenderer,
}

impl RenderState {
    fn new(window: Arc<Window>) -> Result<Self> {
        let gpu = pollster::block_on(GpuContext::new(window))?;
        let (width, height) = gpu.size();
        let depth_view = create_depth_view(&gpu.device, width, height);

        let config_path = Path::new("grass.json");
        let config = if config_path.exists() {
            GrassConfig::load(config_path).unwrap_or_else(|e| {
                log::warn!("failed to load {}: {e}; using defaults", config_path.display());
                GrassConfig::default()
            })
        } else {
            GrassConfig::default()
        };

        let generator = TerrainGenerator::new(TerrainParams::default());
        log::info!("building {TERRAIN_SIZE}m terrain mesh ({TERRAIN_RESOLUTION}x{TERRAIN_RESOLUTION})");
        let terrain_mesh = TerrainMesh::new(&gpu.device, &generator, Vec2::ZERO, TERRAIN_SIZE, TERRAIN_RESOLUTION);
        let terrain_pipeline = TerrainPipeline::new(&gpu.device, gpu.format(), DEPTH_FORMAT);

        let grass = GrassRenderer::new(&gpu.device, config, gpu.format(), DEPTH_FORMAT);

        Ok(Self {
            gpu,
            depth_view,
            terrain_mesh,
            terrain_pipeline,
            grass,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
        self.depth_view = create_depth_view(&self.gpu.device, width.max(1), height.max(1));
    }
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("main_depth"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

struct App {
    window: Option<Arc<Window>>,
    state: Option<RenderState>,
    camera: Camera,
    controller: FpsCameraController,
    input: InputState,
    timer: FrameTimer,
    elapsed: f32,
}

impl App {
    fn new() -> Self {
        let mut camera = Camera::new(Vec3::new(0.0, 30.0, 0.0), 60.0, 16.0 / 9.0);
        camera.far = 2000.0;

        Self {
            window: None,
            state: None,
            camera,
            controller: FpsCameraController::new(12.0, 2.0),
            input: InputState::new(),
            timer: FrameTimer::new(),
            elapsed: 0.0,
        }
    }

    fn set_cursor_captured(&mut self, captured: bool) {
        let Some(window) = &self.window else { return };
        if captured {
            let grabbed = window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined))
                .is_ok();
            window.set_cursor_visible(!grabbed);
            self.input.set_mouse_captured(grabbed);
        } else {
            let _ = window.set_cursor_grab(CursorGrabMode::None);
            window.set_cursor_visible(true);
            self.input.set_mouse_captured(false);
        }
    }

    fn render(&mut self) {
        self.timer.tick();
        let dt = self.timer.delta_seconds();
        self.elapsed += dt;

        self.controller.update(&mut self.camera, &self.input, dt);

        let Some(state) = &mut self.state else { return };

        let frame = match state.gpu.get_current_texture() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("surface lost: {e}");
                let (w, h) = state.gpu.size();
                state.resize(w, h);
                return;
            }
        };
        let surface_view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = state
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        // Grass data + culling passes, encoded before the main pass
        let geometry = [state.terrain_mesh.data_geometry()];
        let outcome = state.grass.prepare(
            &state.gpu.device,
            &state.gpu.queue,
            &mut encoder,
            &self.camera,
            self.elapsed,
            &geometry,
        );

        let sun = Vec3::new(0.4, 0.8, 0.25);
        state.terrain_pipeline.update(&state.gpu.queue, &self.camera, sun);

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.45,
                            g: 0.62,
                            b: 0.82,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &state.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            state.terrain_pipeline.draw(&mut pass, &state.terrain_mesh);
            if matches!(outcome, FrameOutcome::Rendered { .. }) {
                state.grass.draw(&mut pass);
            }
        }

        state.gpu.queue.submit(Some(encoder.finish()));
        frame.present();

        // Optional diagnostics; resolving the count blocks on the GPU
        if state.grass.config().preview_visible_count {
            if let (FrameOutcome::Rendered { grid, .. }, Some(count)) =
                (outcome, state.grass.resolve_visible_count(&state.gpu.device))
            {
                if self.timer.frame_count() % 30 == 0 {
                    log::info!(
                        "dispatch size: {}x{} = {} cells, visible grass: {count}",
                        grid.size.x,
                        grid.size.y,
                        grid.cell_count(),
                    );
                }
            }
        }

        if self.timer.frame_count() % 300 == 0 {
            log::debug!("fps: {:.1}", self.timer.fps());
        }

        self.input.end_frame();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title("Veldt")
            .with_inner_size(winit::dpi::PhysicalSize::new(1280, 720));

        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        match RenderState::new(window.clone()) {
            Ok(state) => {
                let size = window.inner_size();
                self.camera.set_aspect(size.width as f32, size.height.max(1) as f32);
                self.state = Some(state);
                self.window = Some(window);
            }
            Err(e) => {
                log::error!("failed to initialize renderer: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.input.process_event(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    state.resize(size.width, size.height);
                }
                self.camera.set_aspect(size.width.max(1) as f32, size.height.max(1) as f32);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed {
                    match event.physical_key {
                        PhysicalKey::Code(KeyCode::Escape) => self.set_cursor_captured(false),
                        PhysicalKey::Code(KeyCode::KeyP) => {
                            if let Some(state) = &mut self.state {
                                let config = state.grass.config_mut();
                                config.preview_visible_count = !config.preview_visible_count;
                                log::info!(
                                    "visible-count preview: {}",
                                    config.preview_visible_count
                                );
                            }
                        }
                        _ => {}
                    }
                }
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.set_cursor_captured(true),
            WindowEvent::RedrawRequested => self.render(),
            _ => {}
        }
    }

    fn device_event(&mut self, _loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.input.is_mouse_captured() {
                self.input.process_mouse_motion(delta.0, delta.1);
            }
        }
    }

    fn about_to_wait(&mut self, _loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn run() -> Result<()> {
    let event_loop = EventLoop::new()
        .map_err(|e| veldt::core::Error::Window(format!("failed to create event loop: {e}")))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop
        .run_app(&mut app)
        .map_err(|e| veldt::core::Error::Window(format!("event loop error: {e}")))?;

    Ok(())
}

fn main() {
    logging::init();

    if let Err(e) = run() {
        log::error!("fatal: {e}");
        std::process::exit(1);
    }
}
