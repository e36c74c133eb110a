//! Platform abstraction layer for the cell grid renderer.
//!
//! This crate provides platform-specific functionality:
//! - Window management via winit, with minimize tracking
//! - Keyboard and mouse-motion input state
//! - Vulkan surface creation from raw window handles

mod input;
mod window;

pub use input::{InputState, KeyCode};
pub use window::{Surface, Window, get_required_extensions};

// Re-export winit types that users might need
pub use winit::event::WindowEvent;
pub use winit::event_loop::EventLoop;
