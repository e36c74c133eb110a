//! Chunked vertex buffer pool.
//!
//! Geometry arrives as chunks, each no larger than the device's
//! per-allocation ceiling. The pool keeps one slot per chunk: a
//! persistently mapped staging buffer the CPU writes into, and a
//! device-local vertex buffer the GPU draws from, filled by a transfer
//! recorded at the start of the frame's command buffer.
//!
//! The pool never grows in place. When the chunk list stops fitting, the
//! caller waits for every in-flight frame and the pool is rebuilt from
//! scratch; shrinking geometry reuses the existing slots.

use std::sync::Arc;

use ash::vk;
use bytemuck;
use tracing::{debug, info};

use cellgrid_rhi::buffer::{Buffer, BufferUsage};
use cellgrid_rhi::command::CommandBuffer;
use cellgrid_rhi::device::Device;
use cellgrid_rhi::RhiResult;
use cellgrid_sim::VertexChunk;

/// One staging/device buffer pair sized for one geometry chunk.
struct PoolSlot {
    /// Host-visible staging buffer, written every geometry change.
    staging: Buffer,
    /// Device-local vertex buffer the draw binds.
    vertex: Buffer,
    /// Capacity of both buffers in bytes.
    capacity_bytes: vk::DeviceSize,
    /// Vertices written by the most recent update.
    live_vertex_count: u32,
    /// Bytes written by the most recent update.
    live_size_bytes: vk::DeviceSize,
}

/// Pool of per-chunk buffer slots.
pub struct VertexPool {
    device: Arc<Device>,
    slots: Vec<PoolSlot>,
}

/// Whether a slot layout can hold a chunk list.
///
/// True when there are more chunks than slots, or any chunk needs more
/// bytes than its slot has. Fewer chunks than slots is fine; shrink
/// never reallocates.
pub fn needs_reallocation(slot_capacities: &[vk::DeviceSize], chunk_sizes: &[u64]) -> bool {
    if chunk_sizes.len() > slot_capacities.len() {
        return true;
    }
    chunk_sizes
        .iter()
        .zip(slot_capacities)
        .any(|(&chunk, &slot)| chunk > slot)
}

impl VertexPool {
    /// Creates an empty pool.
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            slots: Vec::new(),
        }
    }

    /// Whether the current slots can hold `chunks` without rebuilding.
    pub fn needs_reallocation(&self, chunks: &[VertexChunk<'_>]) -> bool {
        let capacities: Vec<vk::DeviceSize> =
            self.slots.iter().map(|s| s.capacity_bytes).collect();
        let sizes: Vec<u64> = chunks.iter().map(|c| c.max_size_bytes).collect();
        needs_reallocation(&capacities, &sizes)
    }

    /// Rebuilds the pool for `chunks` if the current slots don't fit.
    ///
    /// All-or-nothing: every slot is destroyed and recreated. The caller
    /// must have waited on all in-flight frame fences first; destroyed
    /// buffers must not be referenced by any pending command buffer.
    ///
    /// # Returns
    ///
    /// `true` when the pool was rebuilt.
    ///
    /// # Errors
    ///
    /// Returns an error if buffer creation fails.
    pub fn ensure_capacity(&mut self, chunks: &[VertexChunk<'_>]) -> RhiResult<bool> {
        if !self.needs_reallocation(chunks) {
            return Ok(false);
        }

        info!(
            "Rebuilding vertex pool: {} slot(s) -> {} chunk(s)",
            self.slots.len(),
            chunks.len()
        );

        self.slots.clear();
        self.slots.reserve(chunks.len());

        for chunk in chunks {
            let capacity_bytes = chunk.max_size_bytes as vk::DeviceSize;
            let staging = Buffer::new(self.device.clone(), BufferUsage::Staging, capacity_bytes)?;
            let vertex = Buffer::new(self.device.clone(), BufferUsage::Vertex, capacity_bytes)?;

            self.slots.push(PoolSlot {
                staging,
                vertex,
                capacity_bytes,
                live_vertex_count: 0,
                live_size_bytes: 0,
            });
        }

        Ok(true)
    }

    /// Copies each chunk's vertices into its staging slot and records
    /// the live counts.
    ///
    /// Slots beyond the chunk list are marked empty so their stale
    /// contents are neither transferred nor drawn.
    ///
    /// # Errors
    ///
    /// Returns an error if a staging write fails; the pool must have
    /// capacity for every chunk (call
    /// [`ensure_capacity`](Self::ensure_capacity) first).
    pub fn write_chunks(&mut self, chunks: &[VertexChunk<'_>]) -> RhiResult<()> {
        for (slot, chunk) in self.slots.iter_mut().zip(chunks) {
            slot.staging
                .write_data(0, bytemuck::cast_slice(chunk.vertices))?;
            slot.live_vertex_count = chunk.vertex_count() as u32;
            slot.live_size_bytes = chunk.data_size_bytes() as vk::DeviceSize;
        }

        for slot in self.slots.iter_mut().skip(chunks.len()) {
            slot.live_vertex_count = 0;
            slot.live_size_bytes = 0;
        }

        debug!(
            "Staged {} chunk(s), {} total vertices",
            chunks.len(),
            self.slots
                .iter()
                .map(|s| s.live_vertex_count as u64)
                .sum::<u64>()
        );

        Ok(())
    }

    /// Records one staging-to-device copy per live slot.
    ///
    /// Must be recorded outside a render pass, before any draw that
    /// binds the vertex buffers.
    pub fn record_transfers(&self, cmd: &CommandBuffer) {
        for slot in &self.slots {
            if slot.live_size_bytes > 0 {
                cmd.copy_buffer(&slot.staging, &slot.vertex, slot.live_size_bytes);
            }
        }
    }

    /// Iterates `(vertex_buffer, live_vertex_count)` for slots with
    /// anything to draw.
    pub fn live_slots(&self) -> impl Iterator<Item = (vk::Buffer, u32)> + '_ {
        self.slots
            .iter()
            .filter(|s| s.live_vertex_count > 0)
            .map(|s| (s.vertex.handle(), s.live_vertex_count))
    }

    /// Number of slots currently allocated.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pool_with_no_chunks_needs_nothing() {
        assert!(!needs_reallocation(&[], &[]));
    }

    #[test]
    fn test_first_chunks_force_reallocation() {
        assert!(needs_reallocation(&[], &[4096]));
    }

    #[test]
    fn test_growth_in_chunk_count_forces_reallocation() {
        // 1 slot -> 3 chunks
        assert!(needs_reallocation(&[4096], &[4096, 4096, 4096]));
    }

    #[test]
    fn test_shrink_does_not_reallocate() {
        assert!(!needs_reallocation(&[4096, 4096, 4096], &[4096]));
    }

    #[test]
    fn test_matching_layout_does_not_reallocate() {
        assert!(!needs_reallocation(&[4096, 4096], &[4096, 4096]));
    }

    #[test]
    fn test_oversized_chunk_forces_reallocation() {
        assert!(needs_reallocation(&[4096, 4096], &[4096, 8192]));
    }

    #[test]
    fn test_smaller_chunks_fit_existing_slots() {
        assert!(!needs_reallocation(&[8192, 8192], &[4096, 1024]));
    }
}
