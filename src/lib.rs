// =============================================================================
// EMBER RENDERER - minimal Vulkan renderer around a frame lifecycle controller
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  App (window, scene, render loop)                               │
// │    └── Renderer (frame state machine, swap chain rebuilds)      │
// │          └── Swapchain (images, depth, render pass, sync)       │
// │                └── VulkanDevice (instance, queues, pool)        │
// │  Render systems record draws into the frame's command buffer    │
// └─────────────────────────────────────────────────────────────────┘
//
// =============================================================================

pub mod app;
pub mod backend;
pub mod camera;
pub mod config;
pub mod game_object;
pub mod model;
pub mod movement;
pub mod render_system;
pub mod renderer;
pub mod window;

pub use app::App;
pub use config::Config;
pub use renderer::{FrameError, Renderer};
