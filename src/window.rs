// Window - winit window driven by a pumped event loop
//
// The render loop owns the event loop and pumps it itself, so it can poll
// once per frame and block outright while the window is minimized.
//
// ESC quits, F11 toggles borderless fullscreen.

use anyhow::{Context, Result};
use ash::vk;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Fullscreen, Window, WindowAttributes, WindowId},
};

use crate::config::WindowConfig;
use crate::renderer::RenderSurface;

pub struct AppWindow {
    window: Arc<Window>,
    event_loop: EventLoop<()>,
    state: WindowState,
}

impl AppWindow {
    /// Create the event loop and pump it until the window exists
    pub fn new(config: &WindowConfig) -> Result<Self> {
        let mut event_loop = EventLoop::new().context("Failed to create event loop")?;
        let mut state = WindowState::new(config.clone());

        // Desktop platforms deliver `resumed` on the first pump
        let window = loop {
            if let PumpStatus::Exit(code) = event_loop.pump_app_events(Some(Duration::ZERO), &mut state) {
                anyhow::bail!("Event loop exited with code {} before a window was created", code);
            }
            if let Some(e) = state.creation_error.take() {
                return Err(e);
            }
            if let Some(window) = &state.window {
                break Arc::clone(window);
            }
        };

        log::info!(
            "Window: {}x{} ({})",
            config.width,
            config.height,
            if config.fullscreen { "fullscreen" } else { "windowed" }
        );

        Ok(Self {
            window,
            event_loop,
            state,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Process pending events without blocking
    pub fn poll_events(&mut self) {
        self.pump(Some(Duration::ZERO));
    }

    /// Block until at least one event arrives, then process it
    pub fn wait_events(&mut self) {
        self.pump(None);
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.state) {
            log::debug!("Event loop exited with code {}", code);
            self.state.close_requested = true;
        }
    }

    pub fn should_close(&self) -> bool {
        self.state.close_requested
    }

    /// Keys currently held down
    pub fn pressed_keys(&self) -> &HashSet<KeyCode> {
        &self.state.pressed_keys
    }

    pub fn is_fullscreen(&self) -> bool {
        self.state.is_fullscreen
    }

    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }
}

impl RenderSurface for AppWindow {
    fn extent(&self) -> vk::Extent2D {
        let size = self.window.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }

    fn was_resized(&self) -> bool {
        self.state.resized
    }

    fn reset_resized_flag(&mut self) {
        self.state.resized = false;
    }

    fn wait_events(&mut self) {
        AppWindow::wait_events(self);
    }

    fn should_close(&self) -> bool {
        AppWindow::should_close(self)
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

struct WindowState {
    config: WindowConfig,
    window: Option<Arc<Window>>,
    creation_error: Option<anyhow::Error>,
    resized: bool,
    close_requested: bool,
    is_fullscreen: bool,
    pressed_keys: HashSet<KeyCode>,
}

impl WindowState {
    fn new(config: WindowConfig) -> Self {
        let is_fullscreen = config.fullscreen;
        Self {
            config,
            window: None,
            creation_error: None,
            resized: false,
            close_requested: false,
            is_fullscreen,
            pressed_keys: HashSet::new(),
        }
    }

    fn toggle_fullscreen(&mut self) {
        if let Some(ref window) = self.window {
            self.is_fullscreen = !self.is_fullscreen;

            if self.is_fullscreen {
                // Enter fullscreen (use current monitor)
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                log::info!("Entered fullscreen mode");
            } else {
                window.set_fullscreen(None);
                log::info!("Exited fullscreen mode");
            }

            self.resized = true;
        }
    }

    fn request_close(&mut self, event_loop: &ActiveEventLoop) {
        self.close_requested = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let mut window_attributes = WindowAttributes::default()
            .with_title(&self.config.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.width,
                self.config.height,
            ));

        if self.config.fullscreen {
            window_attributes = window_attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        match event_loop.create_window(window_attributes) {
            Ok(window) => self.window = Some(Arc::new(window)),
            Err(e) => {
                self.creation_error = Some(anyhow::Error::new(e).context("Failed to create window"));
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.request_close(event_loop);
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                self.resized = true;
            }

            WindowEvent::Focused(false) => {
                // Key releases are not delivered to unfocused windows
                self.pressed_keys.clear();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(key) = event.physical_key else {
                    return;
                };

                if !event.state.is_pressed() {
                    self.pressed_keys.remove(&key);
                    return;
                }
                self.pressed_keys.insert(key);

                if event.repeat {
                    return;
                }
                match key {
                    KeyCode::Escape => {
                        log::info!("ESC pressed, exiting...");
                        self.request_close(event_loop);
                    }
                    KeyCode::F11 => self.toggle_fullscreen(),
                    _ => {}
                }
            }

            _ => {}
        }
    }
}
