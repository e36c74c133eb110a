//! Synchronization primitives for Vulkan.
//!
//! This module wraps the Vulkan synchronization objects the frame loop
//! needs:
//! - [`Semaphore`] - GPU-to-GPU synchronization (between queue operations)
//! - [`Fence`] - GPU-to-CPU synchronization (for host waiting)
//! - [`FrameSync`] - the per-frame trio: image-available semaphore,
//!   render-finished semaphore, in-flight fence
//!
//! The in-flight fence is created signaled so the first frame's wait does
//! not block. [`Fence::wait_all`] waits for every in-flight frame at once,
//! which is required before destroying buffers older frames may still
//! reference.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Number of frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Vulkan semaphore wrapper.
///
/// Used for GPU-to-GPU synchronization between queue operations, e.g.
/// waiting for image acquisition before rendering, or for rendering
/// completion before presentation.
pub struct Semaphore {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan semaphore handle.
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new semaphore in the unsignaled state.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Vulkan fence wrapper.
///
/// Used for GPU-to-CPU synchronization; the host waits on the fence to
/// learn that a submitted frame has finished executing.
pub struct Fence {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan fence handle.
    fence: vk::Fence,
}

impl Fence {
    /// Creates a new fence.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `signaled` - If true, creates the fence already signaled. Frame
    ///   fences start signaled so the first wait returns immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if fence creation fails.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);

        let fence = unsafe { device.handle().create_fence(&create_info, None)? };

        debug!(
            "Created fence ({})",
            if signaled { "signaled" } else { "unsignaled" }
        );

        Ok(Self { device, fence })
    }

    /// Returns the Vulkan fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Waits for the fence to become signaled.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Timeout in nanoseconds. Use `u64::MAX` for an
    ///   unbounded wait.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait times out or fails.
    pub fn wait(&self, timeout: u64) -> Result<(), RhiError> {
        let fences = [self.fence];
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&fences, true, timeout)?
        };
        Ok(())
    }

    /// Waits until every given fence is signaled.
    ///
    /// Used before reallocating resources that any in-flight frame might
    /// still reference; a signaled fence is left signaled.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait times out or fails.
    pub fn wait_all(device: &Device, fences: &[vk::Fence], timeout: u64) -> Result<(), RhiError> {
        if fences.is_empty() {
            return Ok(());
        }
        unsafe { device.handle().wait_for_fences(fences, true, timeout)? };
        Ok(())
    }

    /// Resets the fence to the unsignaled state.
    ///
    /// The fence must not be in use by any queue operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset fails.
    pub fn reset(&self) -> Result<(), RhiError> {
        let fences = [self.fence];
        unsafe { self.device.handle().reset_fences(&fences)? };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

/// Per-frame synchronization primitives.
///
/// # Usage Pattern
///
/// ```text
/// 1. Wait for in_flight_fence (CPU waits for this slot's previous frame)
/// 2. Acquire swapchain image (signals image_available_semaphore)
/// 3. Reset in_flight_fence (only after a successful acquire)
/// 4. Submit command buffer:
///    - Wait on image_available_semaphore
///    - Signal render_finished_semaphore
///    - Signal in_flight_fence on completion
/// 5. Present (waits on render_finished_semaphore)
/// ```
pub struct FrameSync {
    /// Semaphore signaled when a swapchain image is available.
    image_available_semaphore: Semaphore,
    /// Semaphore signaled when rendering is complete.
    render_finished_semaphore: Semaphore,
    /// Fence used to wait for frame completion before reusing resources.
    in_flight_fence: Fence,
}

impl FrameSync {
    /// Creates a new set of frame synchronization primitives.
    ///
    /// The in-flight fence starts signaled so the first frame can proceed
    /// without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if any synchronization object creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let image_available_semaphore = Semaphore::new(device.clone())?;
        let render_finished_semaphore = Semaphore::new(device.clone())?;
        let in_flight_fence = Fence::new(device, true)?;

        Ok(Self {
            image_available_semaphore,
            render_finished_semaphore,
            in_flight_fence,
        })
    }

    /// Returns a reference to the in-flight fence.
    #[inline]
    pub fn in_flight_fence(&self) -> &Fence {
        &self.in_flight_fence
    }

    /// Returns the raw handle for the image available semaphore.
    #[inline]
    pub fn image_available_handle(&self) -> vk::Semaphore {
        self.image_available_semaphore.handle()
    }

    /// Returns the raw handle for the render finished semaphore.
    #[inline]
    pub fn render_finished_handle(&self) -> vk::Semaphore {
        self.render_finished_semaphore.handle()
    }

    /// Returns the raw handle for the in-flight fence.
    #[inline]
    pub fn in_flight_fence_handle(&self) -> vk::Fence {
        self.in_flight_fence.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_frames_in_flight_constant() {
        assert!(MAX_FRAMES_IN_FLIGHT >= 1);
        assert!(MAX_FRAMES_IN_FLIGHT <= 4);
    }

    #[test]
    fn test_semaphore_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
    }

    #[test]
    fn test_fence_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Fence>();
    }

    #[test]
    fn test_frame_sync_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FrameSync>();
    }
}
