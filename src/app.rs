// =============================================================================
// APPLICATION - window, device, renderer and a scene to draw
// =============================================================================
//
// FRAME FLOW:
// 1. Poll window events
// 2. Move the viewer from keyboard input, point the camera at it
// 3. begin_frame (acquire image, open command buffer)
// 4. Render systems record draws inside the swap chain render pass
// 5. end_frame (submit, present, rebuild swap chain if needed)
//
// =============================================================================

use anyhow::Result;
use glam::Vec3;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::backend::VulkanDevice;
use crate::camera::Camera;
use crate::config::Config;
use crate::game_object::{GameObjectId, GameObjects};
use crate::model::{cube_builder, Model};
use crate::movement::KeyboardMovementController;
use crate::render_system::{FrameInfo, SimpleRenderSystem};
use crate::renderer::{FrameSettings, Renderer};
use crate::window::AppWindow;

/// Field order matters for Drop: GPU objects go before the device, and the
/// device (which owns the surface) goes before the window.
pub struct App {
    config: Config,
    game_objects: GameObjects,
    /// Camera rig, has no model so nothing draws it
    viewer: GameObjectId,
    render_system: SimpleRenderSystem,
    renderer: Renderer<Arc<VulkanDevice>>,
    device: Arc<VulkanDevice>,
    window: AppWindow,
    fps: FpsCounter,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let mut window = AppWindow::new(&config.window)?;
        let device = VulkanDevice::new(&config, window.window())?;

        let renderer = Renderer::new(
            Arc::clone(&device),
            &mut window,
            FrameSettings::from_config(&config),
        )?;

        let render_system = SimpleRenderSystem::new(
            Arc::clone(&device),
            renderer.swapchain_render_pass(),
            &config.shaders,
        )?;

        let mut game_objects = GameObjects::new();
        load_game_objects(&device, &mut game_objects)?;
        let viewer = game_objects.create().id();

        log::info!("Application ready with {} game objects", game_objects.len());

        Ok(Self {
            config,
            game_objects,
            viewer,
            render_system,
            renderer,
            device,
            window,
            fps: FpsCounter::new(Instant::now()),
        })
    }

    /// Run until the window closes, then wait for the GPU to go idle
    pub fn run(&mut self) -> Result<()> {
        let mut camera = Camera::new();
        camera.set_view_target(
            Vec3::new(-1.0, -2.0, 2.0),
            Vec3::new(0.0, 0.0, 2.5),
            Vec3::new(0.0, -1.0, 0.0),
        );

        let controller = KeyboardMovementController::default();
        let mut current_time = Instant::now();

        while !self.window.should_close() {
            self.window.poll_events();

            let now = Instant::now();
            let frame_time = now.duration_since(current_time).as_secs_f32();
            current_time = now;

            if let Some(viewer) = self.game_objects.get_mut(self.viewer) {
                controller.move_in_plane_xz(self.window.pressed_keys(), frame_time, viewer);
                camera.set_view_yxz(viewer.transform.translation, viewer.transform.rotation);
            }

            let aspect = self.renderer.aspect_ratio();
            camera.set_perspective_projection(50f32.to_radians(), aspect, 0.1, 10.0);

            if let Some(command_buffer) = self.renderer.begin_frame(&mut self.window)? {
                let frame_info = FrameInfo {
                    frame_index: self.renderer.frame_index(),
                    frame_time,
                    command_buffer,
                    camera: &camera,
                };

                self.renderer.begin_swapchain_render_pass(command_buffer);
                self.render_system.render_game_objects(&frame_info, &self.game_objects);
                self.renderer.end_swapchain_render_pass(command_buffer);
                self.renderer.end_frame(&mut self.window)?;

                self.update_fps();
            }
        }

        self.device.wait_idle()?;
        log::info!("Render loop finished");
        Ok(())
    }

    fn update_fps(&mut self) {
        if !self.config.debug.show_fps {
            return;
        }

        if let Some(sample) = self.fps.frame_rendered(Instant::now()) {
            let mode = if self.window.is_fullscreen() { "fullscreen" } else { "windowed" };
            self.window.set_title(&format!(
                "{} - {:.0} FPS ({:.2}ms) [{}]",
                self.config.window.title,
                sample.fps,
                sample.frame_time * 1000.0,
                mode
            ));
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");
        // Command buffers and buffers may still be in use after an error
        if let Err(e) = self.device.wait_idle() {
            log::error!("wait_idle failed during shutdown: {:#}", e);
        }
    }
}

fn load_game_objects(device: &Arc<VulkanDevice>, game_objects: &mut GameObjects) -> Result<()> {
    let cube_model = Arc::new(Model::new(Arc::clone(device), &cube_builder(Vec3::ZERO))?);

    let cube = game_objects.create();
    cube.model = Some(cube_model);
    cube.transform.translation = Vec3::new(0.0, 0.0, 2.5);
    cube.transform.scale = Vec3::splat(0.5);
    Ok(())
}

// =============================================================================
// FPS TRACKING
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsSample {
    pub fps: f32,
    /// Seconds spent on the last frame
    pub frame_time: f32,
}

/// Counts rendered frames and reports a rate about once per second
#[derive(Debug)]
pub struct FpsCounter {
    frame_count: u32,
    last_update: Instant,
    last_frame: Instant,
}

impl FpsCounter {
    const UPDATE_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(now: Instant) -> Self {
        Self {
            frame_count: 0,
            last_update: now,
            last_frame: now,
        }
    }

    pub fn frame_rendered(&mut self, now: Instant) -> Option<FpsSample> {
        let frame_time = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.frame_count += 1;

        let elapsed = now.duration_since(self.last_update);
        if elapsed < Self::UPDATE_INTERVAL {
            return None;
        }

        let sample = FpsSample {
            fps: self.frame_count as f32 / elapsed.as_secs_f32(),
            frame_time,
        };
        self.frame_count = 0;
        self.last_update = now;
        Some(sample)
    }
}
