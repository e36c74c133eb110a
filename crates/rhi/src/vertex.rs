//! Vertex data structures and input descriptions.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Vertex format for cell geometry: position, normal, and flat color.
///
/// # Memory Layout
///
/// `#[repr(C)]` for a predictable layout:
/// - Offset 0: position (12 bytes)
/// - Offset 12: normal (12 bytes)
/// - Offset 24: color (12 bytes)
/// - Total size: 36 bytes
///
/// # Shader Locations
///
/// - location 0: position (vec3)
/// - location 1: normal (vec3)
/// - location 2: color (vec3)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CellVertex {
    /// 3D position in world space.
    pub position: Vec3,
    /// Surface normal vector (should be normalized).
    pub normal: Vec3,
    /// RGB color.
    pub color: Vec3,
}

impl CellVertex {
    /// Creates a new vertex.
    #[inline]
    pub const fn new(position: Vec3, normal: Vec3, color: Vec3) -> Self {
        Self {
            position,
            normal,
            color,
        }
    }

    /// Returns the size of the vertex in bytes.
    #[inline]
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }

    /// Get the vertex input binding description.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Get the vertex attribute descriptions.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            // Position at location 0
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            // Normal at location 1
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 12,
            },
            // Color at location 2
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 24,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_vertex_size() {
        // 3 x Vec3 = 3 x 12 = 36 bytes
        assert_eq!(std::mem::size_of::<CellVertex>(), 36);
        assert_eq!(CellVertex::size(), 36);
    }

    #[test]
    fn test_cell_vertex_binding_description() {
        let binding = CellVertex::binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 36);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn test_cell_vertex_attribute_offsets() {
        use std::mem::offset_of;

        let attrs = CellVertex::attribute_descriptions();
        assert_eq!(attrs.len(), 3);

        assert_eq!(attrs[0].offset as usize, offset_of!(CellVertex, position));
        assert_eq!(attrs[1].offset as usize, offset_of!(CellVertex, normal));
        assert_eq!(attrs[2].offset as usize, offset_of!(CellVertex, color));

        for (location, attr) in attrs.iter().enumerate() {
            assert_eq!(attr.binding, 0);
            assert_eq!(attr.location, location as u32);
            assert_eq!(attr.format, vk::Format::R32G32B32_SFLOAT);
        }
    }

    #[test]
    fn test_cell_vertex_pod_round_trip() {
        let vertex = CellVertex::new(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.2, 0.9, 0.3),
        );

        let bytes: &[u8] = bytemuck::bytes_of(&vertex);
        assert_eq!(bytes.len(), 36);

        let back: &CellVertex = bytemuck::from_bytes(bytes);
        assert_eq!(*back, vertex);
    }
}
