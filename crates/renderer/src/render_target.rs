//! Swapchain-backed render target.
//!
//! Owns the swapchain, the depth buffer, the render pass, and one
//! framebuffer per swapchain image, and keeps them consistent through
//! resizes. [`RenderTarget::recreate`] is the single entry point for the
//! out-of-date/suboptimal/resized paths; it reports whether the surface
//! format changed so the caller can rebuild the pipeline.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use cellgrid_rhi::device::Device;
use cellgrid_rhi::instance::Instance;
use cellgrid_rhi::physical_device::find_depth_format;
use cellgrid_rhi::swapchain::Swapchain;
use cellgrid_rhi::{RhiError, RhiResult};

use crate::depth_buffer::DepthBuffer;

/// Everything a frame renders into.
pub struct RenderTarget {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// The swapchain and its image views.
    swapchain: Swapchain,
    /// Depth attachment matching the swapchain extent.
    depth_buffer: DepthBuffer,
    /// Render pass over one color and one depth attachment.
    render_pass: vk::RenderPass,
    /// One framebuffer per swapchain image.
    framebuffers: Vec<vk::Framebuffer>,
}

impl RenderTarget {
    /// Creates the swapchain, depth buffer, render pass, and
    /// framebuffers for a window of the given size.
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan object creation fails or no depth
    /// format is supported.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        let swapchain = Swapchain::new(instance, device.clone(), surface, width, height)?;
        let extent = swapchain.extent();

        let depth_format = find_depth_format(instance.handle(), device.physical_device())?;
        let depth_buffer =
            DepthBuffer::new(device.clone(), extent.width, extent.height, depth_format)?;

        let render_pass = create_render_pass(&device, swapchain.format(), depth_format)?;
        let framebuffers =
            create_framebuffers(&device, &swapchain, &depth_buffer, render_pass)?;

        info!(
            "Render target created: {}x{}, color {:?}, depth {:?}",
            extent.width,
            extent.height,
            swapchain.format(),
            depth_format
        );

        Ok(Self {
            device,
            swapchain,
            depth_buffer,
            render_pass,
            framebuffers,
        })
    }

    /// Rebuilds everything for a new window size.
    ///
    /// Waits for device idle, recreates the swapchain (reusing the old
    /// handle), then the depth buffer and framebuffers at the new
    /// extent. The render pass is rebuilt only when the surface format
    /// changed.
    ///
    /// # Returns
    ///
    /// `true` when the surface format changed; the caller must rebuild
    /// any pipeline created against the old render pass.
    ///
    /// # Errors
    ///
    /// Returns an error if recreation fails.
    pub fn recreate(
        &mut self,
        instance: &Instance,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> Result<bool, RhiError> {
        // Framebuffers reference the old image views; drop them first
        self.device.wait_idle()?;
        self.destroy_framebuffers();

        let old_format = self.swapchain.format();
        self.swapchain.recreate(instance, surface, width, height)?;
        let extent = self.swapchain.extent();

        let depth_format = self.depth_buffer.format();
        self.depth_buffer = DepthBuffer::new(
            self.device.clone(),
            extent.width,
            extent.height,
            depth_format,
        )?;

        let format_changed = self.swapchain.format() != old_format;
        if format_changed {
            info!(
                "Surface format changed {:?} -> {:?}, rebuilding render pass",
                old_format,
                self.swapchain.format()
            );
            unsafe {
                self.device
                    .handle()
                    .destroy_render_pass(self.render_pass, None);
            }
            self.render_pass =
                create_render_pass(&self.device, self.swapchain.format(), depth_format)?;
        }

        self.framebuffers = create_framebuffers(
            &self.device,
            &self.swapchain,
            &self.depth_buffer,
            self.render_pass,
        )?;

        Ok(format_changed)
    }

    /// Returns the swapchain.
    #[inline]
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Returns the render pass handle.
    #[inline]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Returns the current extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Returns the framebuffer for a swapchain image index.
    #[inline]
    pub fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize]
    }

    fn destroy_framebuffers(&mut self) {
        for &framebuffer in &self.framebuffers {
            unsafe {
                self.device.handle().destroy_framebuffer(framebuffer, None);
            }
        }
        self.framebuffers.clear();
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        self.destroy_framebuffers();
        unsafe {
            self.device
                .handle()
                .destroy_render_pass(self.render_pass, None);
        }
        debug!("Render target destroyed");
    }
}

/// Builds the single-subpass render pass: clear color and depth, store
/// color for presentation.
fn create_render_pass(
    device: &Device,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> RhiResult<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription {
            format: color_format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        },
        vk::AttachmentDescription {
            format: depth_format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ..Default::default()
        },
    ];

    let color_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };

    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .depth_stencil_attachment(&depth_ref)];

    let dependencies = [vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        src_access_mask: vk::AccessFlags::empty(),
        dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ..Default::default()
    }];

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    let render_pass = unsafe { device.handle().create_render_pass(&create_info, None)? };
    debug!(
        "Created render pass (color {:?}, depth {:?})",
        color_format, depth_format
    );
    Ok(render_pass)
}

/// One framebuffer per swapchain image, each pairing a color view with
/// the shared depth view.
fn create_framebuffers(
    device: &Device,
    swapchain: &Swapchain,
    depth_buffer: &DepthBuffer,
    render_pass: vk::RenderPass,
) -> RhiResult<Vec<vk::Framebuffer>> {
    let extent = swapchain.extent();
    let mut framebuffers = Vec::with_capacity(swapchain.image_views().len());

    for &color_view in swapchain.image_views() {
        let attachments = [color_view, depth_buffer.image_view()];

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.handle().create_framebuffer(&create_info, None)? };
        framebuffers.push(framebuffer);
    }

    debug!("Created {} framebuffers", framebuffers.len());
    Ok(framebuffers)
}
