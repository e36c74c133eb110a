//! Vulkan renderer for the cell grid.
//!
//! Builds on `cellgrid_rhi` to turn simulation geometry into frames:
//! - [`Renderer`] - owns the Vulkan stack and drives the frame loop
//! - [`RenderTarget`] - swapchain, depth buffer, render pass, framebuffers
//! - [`VertexPool`] - chunked staging/device buffers for cell geometry
//! - [`TransformUbo`] - per-frame camera matrices

mod depth_buffer;
mod render_target;
mod renderer;
mod ubo;
mod vertex_pool;

pub use depth_buffer::DepthBuffer;
pub use render_target::RenderTarget;
pub use renderer::Renderer;
pub use ubo::TransformUbo;
pub use vertex_pool::VertexPool;

pub use cellgrid_rhi::sync::MAX_FRAMES_IN_FLIGHT;
