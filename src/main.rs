// =============================================================================
// TESSERA DEMO - clear the window through whichever backend comes up first
// =============================================================================
//
// FRAME FLOW:
// 1. Resize the swapchain if the window changed
// 2. Acquire the next swapchain texture
// 3. Record: begin → clear pass → end
// 4. Execute the command list
// 5. Present
//
// Usage: tessera-demo [path/to/tessera.toml]
//
// =============================================================================

use anyhow::{Context, Result};
use glam::Vec4;
use std::sync::Arc;
use std::time::Instant;
use tessera::config::Config;
use tessera::{
    BackendRegistry, ColorAttachmentInfo, ColorF, CommandList, Device, Instance, Size2D, Surface, SurfaceInfo, Swapchain,
};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

fn main() -> Result<()> {
    init_logging();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load_from_path(&path)?,
        None => Config::load(),
    };
    log::info!("Starting {}", config.app.name);
    log::info!("Window: {}x{}", config.window.width, config.window.height);
    log::info!("Backend order: {:?}", config.graphics.backends);

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Everything created from the window, in drop order.
struct Gpu {
    command_list: Box<dyn CommandList>,
    swapchain: Box<dyn Swapchain>,
    device: Box<dyn Device>,
    _surface: Box<dyn Surface>,
    _instance: Box<dyn Instance>,
}

impl Gpu {
    fn new(config: &Config, window: &Window) -> Result<Self> {
        let mut registry = BackendRegistry::new();
        config.register_backends(&mut registry)?;

        let instance = registry.create_instance(&config.instance_info())?;
        let surface_info = SurfaceInfo::from_window(window)?;
        let surface = instance.create_surface(&surface_info)?;
        let device = instance.create_device(Some(surface.as_ref()), None)?;
        log::info!("Running on {} ({})", device.backend(), device.adapter().name);

        let size = window.inner_size();
        let swapchain_info = config.swapchain_info(surface.as_ref(), Size2D::new(size.width, size.height))?;
        let swapchain = device.create_swapchain(&swapchain_info)?;
        let command_list = device.create_command_list()?;

        Ok(Self {
            command_list,
            swapchain,
            device,
            _surface: surface,
            _instance: instance,
        })
    }
}

struct App {
    config: Config,
    window: Option<Arc<Window>>,
    gpu: Option<Gpu>,
    needs_resize: bool,
    is_minimized: bool,
    frame_count: u32,
    last_fps_update: Instant,
    started: Instant,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            window: None,
            gpu: None,
            needs_resize: false,
            is_minimized: false,
            frame_count: 0,
            last_fps_update: Instant::now(),
            started: Instant::now(),
        }
    }

    fn render_frame(&mut self) -> Result<bool> {
        if self.is_minimized {
            return Ok(false);
        }
        let window = self.window.as_ref().context("Window not created")?;
        let gpu = self.gpu.as_mut().context("GPU not initialized")?;

        if self.needs_resize {
            let size = window.inner_size();
            if size.width == 0 || size.height == 0 {
                self.is_minimized = true;
                return Ok(false);
            }
            gpu.device.wait_idle()?;
            gpu.swapchain.resize(Size2D::new(size.width, size.height))?;
            self.needs_resize = false;
        }

        // Breathe toward white so a frozen frame is easy to spot.
        let base: Vec4 = self.config.clear_color().into();
        let pulse = (self.started.elapsed().as_secs_f32().sin() * 0.5 + 0.5) * 0.25;
        let clear_color = ColorF::from(base.lerp(Vec4::ONE, pulse));
        let target = gpu.swapchain.get_next_texture()?;
        let list = gpu.command_list.as_mut();
        list.begin()?;
        list.begin_render_pass(&[ColorAttachmentInfo::clear(target, clear_color)])?;
        list.end_render_pass()?;
        list.end()?;

        gpu.device.execute_command_list(list)?;
        gpu.swapchain.present()?;
        Ok(true)
    }

    fn update_fps(&mut self) {
        self.frame_count += 1;
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_fps_update).as_secs_f32();
        if elapsed < 1.0 {
            return;
        }

        if let (Some(window), Some(gpu)) = (&self.window, &self.gpu) {
            window.set_title(&format!(
                "{} - {} - {:.0} FPS",
                self.config.window.title,
                gpu.device.backend(),
                self.frame_count as f32 / elapsed
            ));
        }
        self.frame_count = 0;
        self.last_fps_update = now;
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));
        let window = match event_loop.create_window(attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                event_loop.exit();
                return;
            }
        };

        match Gpu::new(&self.config, &window) {
            Ok(gpu) => self.gpu = Some(gpu),
            Err(e) => {
                log::error!("Failed to initialize graphics: {:?}", e);
                event_loop.exit();
                return;
            }
        }
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: winit::window::WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                if let Some(gpu) = &self.gpu {
                    if let Err(e) = gpu.device.wait_idle() {
                        log::warn!("wait_idle failed during shutdown: {}", e);
                    }
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                self.is_minimized = size.width == 0 || size.height == 0;
                if !self.is_minimized {
                    self.needs_resize = true;
                }
            }
            WindowEvent::RedrawRequested => match self.render_frame() {
                Ok(true) => self.update_fps(),
                Ok(false) => {}
                Err(e) => {
                    log::error!("Render error: {:?}", e);
                    event_loop.exit();
                }
            },
            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};
                if event.state.is_pressed() && event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        if let Some(gpu) = &self.gpu {
            let _ = gpu.device.wait_idle();
        }
        // Graphics objects go before the window they render into.
        self.gpu = None;
        log::info!("Cleanup complete");
    }
}
