//! Uniform buffer object layout for the cell pass.
//!
//! Must match the shader's uniform block exactly. `#[repr(C)]` for a
//! predictable layout; `Pod`/`Zeroable` for safe byte casting into the
//! mapped buffer.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use cellgrid_scene::FlyCamera;

/// Per-frame transform data, binding 0 of the vertex stage.
///
/// # Memory Layout
///
/// - Offset 0: model matrix (64 bytes)
/// - Offset 64: view matrix (64 bytes)
/// - Offset 128: projection matrix (64 bytes)
/// - Total size: 192 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct TransformUbo {
    /// Model matrix (identity; the grid is generated in world space).
    pub model: Mat4,
    /// View matrix (world to view space).
    pub view: Mat4,
    /// Projection matrix, Y-flipped for Vulkan clip space.
    pub projection: Mat4,
}

impl TransformUbo {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Packs the camera's matrices for the GPU.
    ///
    /// The camera produces GL-convention matrices; the Vulkan Y-flip is
    /// applied here so it happens exactly once, at write time.
    pub fn from_camera(camera: &FlyCamera) -> Self {
        let mut projection = camera.projection_matrix();
        projection.y_axis.y *= -1.0;

        Self {
            model: Mat4::IDENTITY,
            view: camera.view_matrix(),
            projection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_transform_ubo_size() {
        // 3 Mat4 = 3 * 64 = 192 bytes
        assert_eq!(TransformUbo::SIZE, 192);
    }

    #[test]
    fn test_transform_ubo_alignment() {
        assert_eq!(std::mem::align_of::<TransformUbo>(), 16);
    }

    #[test]
    fn test_from_camera_flips_projection_y() {
        let camera = FlyCamera::new(Vec3::new(0.0, 0.0, 10.0), 16.0 / 9.0);
        let ubo = TransformUbo::from_camera(&camera);

        let unflipped = camera.projection_matrix();
        assert_eq!(ubo.projection.y_axis.y, -unflipped.y_axis.y);
        assert_eq!(ubo.projection.x_axis.x, unflipped.x_axis.x);
        assert_eq!(ubo.model, Mat4::IDENTITY);
        assert_eq!(ubo.view, camera.view_matrix());
    }

    #[test]
    fn test_transform_ubo_bytes() {
        let ubo = TransformUbo::default();
        let bytes: &[u8] = bytemuck::bytes_of(&ubo);
        assert_eq!(bytes.len(), TransformUbo::SIZE);
    }
}
