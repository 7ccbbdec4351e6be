// =============================================================================
// FRAMES IN FLIGHT - Vulkan frame orchestration demo
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  winit event loop (App)                                         │
// │    └── FrameOrchestrator (slots, resize state machine)          │
// │          └── VulkanBackend (FrameBackend impl)                  │
// │                └── Device, surface, swapchain, attachments      │
// └─────────────────────────────────────────────────────────────────┘
//
// FRAME FLOW:
// 1. Wait for the slot's previous submission (fence)
// 2. Acquire swapchain image
// 3. Record clear + blit into the slot's command buffer
// 4. Submit, present, advance to the next slot
//
// =============================================================================

mod backend;
mod config;
mod error;
mod frame;

use anyhow::{Context, Result};
use ash::vk;
use backend::{PresentSurface, VulkanBackend, VulkanDevice};
use config::Config;
use frame::{FrameOrchestrator, FrameStats, FrameStatus, OrchestratorSettings};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Fullscreen, Window, WindowAttributes},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    let (config, source) = Config::load();

    init_logging(&config)?;
    source.report();
    log::debug!("Config: {:?}", config);
    log::info!("Starting frames-in-flight renderer");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.fullscreen { "fullscreen" } else { "windowed" }
    );
    log::info!("Present mode: {}", config.graphics.present_mode);

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}

/// Initialize logging, optionally into the configured log file
fn init_logging(config: &Config) -> Result<()> {
    use env_logger::{Builder, Target};
    use log::LevelFilter;

    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info);
    // RUST_LOG still overrides the default level
    builder.parse_default_env();

    if config.debug.log_to_file {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&config.debug.log_file)
            .with_context(|| format!("Failed to open log file {}", config.debug.log_file))?;
        writeln!(file, "=== Frames in Flight Log ===")?;
        writeln!(file, "Started: {:?}", std::time::SystemTime::now())?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

fn drawable_extent(window: &Window) -> vk::Extent2D {
    let size = window.inner_size();
    vk::Extent2D {
        width: size.width,
        height: size.height,
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Teardown order is explicit in `Drop`: orchestrator (swapchain-sized
/// resources, slots), then backend (surface), then the window.
struct App {
    config: Config,
    window: Option<Arc<Window>>,
    backend: Option<VulkanBackend>,
    orchestrator: Option<FrameOrchestrator<VulkanBackend>>,
    stats: FrameStats,
    is_fullscreen: bool,
}

impl App {
    fn new(config: Config) -> Self {
        let is_fullscreen = config.window.fullscreen;
        Self {
            config,
            window: None,
            backend: None,
            orchestrator: None,
            stats: FrameStats::new(Instant::now()),
            is_fullscreen,
        }
    }

    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    fn init_vulkan(&mut self, window: &Window) -> Result<()> {
        log::info!("Initializing Vulkan...");

        let display = window
            .display_handle()
            .context("Failed to get display handle")?
            .as_raw();
        let window_handle = window
            .window_handle()
            .context("Failed to get window handle")?
            .as_raw();

        // ─── STEP 1: Instance ─────────────────────────────────────────────
        let enable_validation = cfg!(debug_assertions) && self.config.debug.validation_layers;
        let (entry, instance) =
            VulkanDevice::create_instance(&self.config.window.title, display, enable_validation)?;

        // ─── STEP 2: Surface (needed to pick a GPU that can present) ──────
        let surface = match PresentSurface::new(&entry, &instance, display, window_handle) {
            Ok(surface) => surface,
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                return Err(e);
            }
        };

        // ─── STEP 3: Device ───────────────────────────────────────────────
        // The device takes ownership of the instance. On failure the instance
        // leaks, which is moot since the app exits.
        let device = VulkanDevice::new(entry, instance, &surface, enable_validation)?;

        let backend = VulkanBackend::new(
            device,
            surface,
            self.config.present_mode(),
            self.config.graphics.clear_color,
        );

        // ─── STEP 4: Frame slots + swapchain-sized resources ─────────────
        let settings = OrchestratorSettings {
            frames_in_flight: self.config.frames_in_flight(),
            fence_timeout: self.config.fence_timeout(),
        };
        let orchestrator = FrameOrchestrator::new(&backend, settings, drawable_extent(window))
            .context("Failed to create frame resources")?;

        self.backend = Some(backend);
        self.orchestrator = Some(orchestrator);

        log::info!("Vulkan initialized successfully!");
        Ok(())
    }

    // =========================================================================
    // RENDERING
    // =========================================================================

    /// Returns false when rendering hit an unrecoverable error.
    fn redraw(&mut self) -> bool {
        let (Some(window), Some(backend), Some(orchestrator)) =
            (&self.window, &self.backend, &mut self.orchestrator)
        else {
            return true;
        };

        match orchestrator.render_frame(backend, drawable_extent(window)) {
            Ok(FrameStatus::Rendered {
                frame_index,
                image_index,
                suboptimal,
            }) => {
                if suboptimal {
                    log::trace!("Frame on slot {} used suboptimal image {}", frame_index, image_index);
                }
                self.update_fps();
                true
            }
            Ok(FrameStatus::Recreated) | Ok(FrameStatus::Skipped) => true,
            Err(e) => {
                log::error!("Render error: {}", e);
                false
            }
        }
    }

    // =========================================================================
    // FULLSCREEN TOGGLE
    // =========================================================================

    fn toggle_fullscreen(&mut self) {
        if let Some(ref window) = self.window {
            self.is_fullscreen = !self.is_fullscreen;

            if self.is_fullscreen {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                log::info!("Entered fullscreen mode");
            } else {
                window.set_fullscreen(None);
                log::info!("Exited fullscreen mode");
            }

            if let Some(orchestrator) = self.orchestrator.as_mut() {
                orchestrator.notify_resized();
            }
        }
    }

    // =========================================================================
    // FPS TRACKING
    // =========================================================================

    fn update_fps(&mut self) {
        let Some(sample) = self.stats.frame_rendered(Instant::now()) else {
            return;
        };
        if !self.config.debug.show_fps {
            return;
        }

        if let Some(ref window) = self.window {
            let mode = if self.is_fullscreen { "fullscreen" } else { "windowed" };
            window.set_title(&format!(
                "{} - {:.0} FPS ({:.2}ms) [{}]",
                self.config.window.title, sample.fps, sample.frame_time_ms, mode
            ));
        }
    }

    fn shutdown(&mut self) {
        if let (Some(backend), Some(orchestrator)) = (&self.backend, &mut self.orchestrator) {
            if let Err(e) = orchestrator.wait_idle(backend) {
                log::warn!("wait_idle during shutdown failed: {}", e);
            }
        }
        // Swapchain before surface, surface before instance
        self.orchestrator = None;
        self.backend = None;
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let mut window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        if self.config.window.fullscreen {
            window_attributes = window_attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.init_vulkan(&window) {
            log::error!("Failed to initialize Vulkan: {:?}", e);
            event_loop.exit();
            return;
        }

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.shutdown();
                event_loop.exit();
            }

            // Only flags the change. Recreation happens at the start of the
            // next frame, and not at all while the window has no area.
            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                if let Some(orchestrator) = self.orchestrator.as_mut() {
                    orchestrator.notify_resized();
                }
            }

            WindowEvent::RedrawRequested => {
                if !self.redraw() {
                    self.shutdown();
                    event_loop.exit();
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed() {
                    if let PhysicalKey::Code(key) = event.physical_key {
                        match key {
                            KeyCode::Escape => {
                                log::info!("ESC pressed, exiting...");
                                self.shutdown();
                                event_loop.exit();
                            }
                            KeyCode::F11 => {
                                self.toggle_fullscreen();
                            }
                            _ => {}
                        }
                    }
                }
            }

            _ => {}
        }
    }

    /// Continuous redraws; frame pacing comes from the fences and present mode.
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

// =============================================================================
// CLEANUP
// =============================================================================

impl Drop for App {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");
        self.shutdown();
        self.window = None;
        log::info!("Cleanup complete");
    }
}
