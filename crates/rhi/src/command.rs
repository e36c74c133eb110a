//! Command pool and command buffer management.
//!
//! # Overview
//!
//! - [`CommandPool`] owns a VkCommandPool for a single queue family
//! - [`CommandBuffer`] wraps a VkCommandBuffer allocated from a pool
//!
//! Command buffers are allocated with the RESET_COMMAND_BUFFER pool flag so
//! the frame loop can reset and re-record the same buffer every frame. The
//! pool owns the underlying memory; dropping a [`CommandBuffer`] does not
//! free it.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::buffer::Buffer;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Vulkan command pool wrapper.
///
/// Command buffers allocated from the same pool must be recorded from a
/// single thread at a time.
pub struct CommandPool {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan command pool handle.
    pool: vk::CommandPool,
}

impl CommandPool {
    /// Creates a command pool for the given queue family.
    ///
    /// The pool is created with `RESET_COMMAND_BUFFER` so individual
    /// buffers can be reset without resetting the whole pool.
    ///
    /// # Errors
    ///
    /// Returns an error if command pool creation fails.
    pub fn new(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let pool = unsafe { device.handle().create_command_pool(&create_info, None)? };

        debug!(
            "Created command pool for queue family {}",
            queue_family_index
        );

        Ok(Self { device, pool })
    }

    /// Returns the Vulkan command pool handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Returns the logical device this pool was created from.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_command_pool(self.pool, None);
        }
        debug!("Command pool destroyed");
    }
}

/// Vulkan command buffer wrapper.
///
/// Does not own the underlying handle; the pool frees all of its buffers
/// when it is destroyed.
pub struct CommandBuffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan command buffer handle.
    buffer: vk::CommandBuffer,
}

impl CommandBuffer {
    /// Allocates a primary command buffer from the given pool.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails.
    pub fn new(device: Arc<Device>, pool: &CommandPool) -> RhiResult<Self> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool.handle())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe { device.handle().allocate_command_buffers(&allocate_info)? };

        Ok(Self {
            device,
            buffer: buffers[0],
        })
    }

    /// Returns the Vulkan command buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    /// Begins recording for reuse across frames.
    ///
    /// The buffer must be in the initial state (freshly allocated or
    /// reset).
    ///
    /// # Errors
    ///
    /// Returns an error if the begin fails.
    pub fn begin(&self) -> Result<(), RhiError> {
        let begin_info = vk::CommandBufferBeginInfo::default();
        unsafe {
            self.device
                .handle()
                .begin_command_buffer(self.buffer, &begin_info)?;
        }
        Ok(())
    }

    /// Ends recording.
    ///
    /// # Errors
    ///
    /// Returns an error if the recording is invalid.
    pub fn end(&self) -> Result<(), RhiError> {
        unsafe { self.device.handle().end_command_buffer(self.buffer)? };
        Ok(())
    }

    /// Resets the buffer back to the initial state.
    ///
    /// The buffer must not be pending execution; wait on the frame fence
    /// first.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset fails.
    pub fn reset(&self) -> Result<(), RhiError> {
        unsafe {
            self.device
                .handle()
                .reset_command_buffer(self.buffer, vk::CommandBufferResetFlags::empty())?;
        }
        Ok(())
    }

    /// Records a buffer-to-buffer copy of `size` bytes from offset 0.
    ///
    /// Used to move staged vertex data into device-local memory. Must be
    /// called between [`begin`](Self::begin) and [`end`](Self::end), and
    /// outside a render pass.
    pub fn copy_buffer(&self, src: &Buffer, dst: &Buffer, size: vk::DeviceSize) {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe {
            self.device
                .handle()
                .cmd_copy_buffer(self.buffer, src.handle(), dst.handle(), &[region]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_pool_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CommandPool>();
    }
}
