//! Free-flying camera for inspecting the grid.

use glam::{Mat4, Vec2, Vec3};

/// Maximum pitch in radians, just shy of straight up/down.
const PITCH_LIMIT: f32 = 89.0 * std::f32::consts::PI / 180.0;

/// A fly camera driven by yaw/pitch angles and a world position.
///
/// Movement is expressed relative to the current view direction; the app
/// layer translates key state into [`FlyCamera::apply_movement`] calls and
/// mouse deltas into [`FlyCamera::apply_look`] calls.
///
/// The projection matrix is produced in GL clip-space conventions; the
/// Vulkan Y-flip is applied when the matrices are packed for the GPU, not
/// here.
#[derive(Clone, Debug)]
pub struct FlyCamera {
    /// Camera position in world space.
    pub position: Vec3,
    /// Rotation around the Y axis, in radians. Zero looks down -Z.
    pub yaw: f32,
    /// Rotation above/below the horizon, in radians.
    pub pitch: f32,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Viewport aspect ratio (width / height).
    pub aspect: f32,
    /// Near clip plane distance.
    pub near: f32,
    /// Far clip plane distance.
    pub far: f32,
    /// Movement speed in world units per second.
    pub move_speed: f32,
    /// Look sensitivity in radians per pixel of mouse delta.
    pub look_sensitivity: f32,

    home_position: Vec3,
}

impl FlyCamera {
    /// Creates a camera at `position` looking down -Z.
    ///
    /// `position` is remembered as the home pose for [`FlyCamera::reset`].
    pub fn new(position: Vec3, aspect: f32) -> Self {
        Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
            fov_y: 45.0_f32.to_radians(),
            aspect,
            near: 0.1,
            far: 1000.0,
            move_speed: 10.0,
            look_sensitivity: 0.002,
            home_position: position,
        }
    }

    /// Returns the camera to its home position and orientation.
    pub fn reset(&mut self) {
        self.position = self.home_position;
        self.yaw = 0.0;
        self.pitch = 0.0;
    }

    /// Updates the aspect ratio after a window resize.
    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    /// Moves the camera along its local axes.
    ///
    /// `direction` is in camera space: +X strafes right, +Y moves up,
    /// -Z moves forward. The vector is normalized so diagonal movement is
    /// not faster.
    pub fn apply_movement(&mut self, direction: Vec3, delta_secs: f32) {
        if direction.length_squared() <= f32::EPSILON {
            return;
        }
        let direction = direction.normalize();

        let forward = self.forward();
        let right = forward.cross(Vec3::Y).normalize();

        let world = right * direction.x + Vec3::Y * direction.y + forward * -direction.z;
        self.position += world * self.move_speed * delta_secs;
    }

    /// Turns the camera by a mouse delta in pixels.
    ///
    /// Pitch is clamped just short of vertical to keep the view basis
    /// well-defined.
    pub fn apply_look(&mut self, delta: Vec2) {
        self.yaw -= delta.x * self.look_sensitivity;
        self.pitch = (self.pitch - delta.y * self.look_sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// The unit vector the camera is looking along.
    pub fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(-sin_yaw * cos_pitch, sin_pitch, -cos_yaw * cos_pitch)
    }

    /// The view matrix for the current pose.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), Vec3::Y)
    }

    /// The perspective projection matrix, without the Vulkan Y-flip.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pose_looks_down_negative_z() {
        let camera = FlyCamera::new(Vec3::ZERO, 16.0 / 9.0);
        let forward = camera.forward();
        assert!((forward - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = FlyCamera::new(Vec3::ZERO, 1.0);
        camera.apply_look(Vec2::new(0.0, -100_000.0));
        assert!(camera.pitch <= PITCH_LIMIT);
        camera.apply_look(Vec2::new(0.0, 100_000.0));
        assert!(camera.pitch >= -PITCH_LIMIT);
    }

    #[test]
    fn test_reset_restores_home_pose() {
        let home = Vec3::new(5.0, 2.0, 30.0);
        let mut camera = FlyCamera::new(home, 1.0);
        camera.apply_movement(Vec3::new(1.0, 0.0, -1.0), 0.5);
        camera.apply_look(Vec2::new(40.0, -25.0));
        assert_ne!(camera.position, home);

        camera.reset();
        assert_eq!(camera.position, home);
        assert_eq!(camera.yaw, 0.0);
        assert_eq!(camera.pitch, 0.0);
    }

    #[test]
    fn test_movement_is_speed_scaled() {
        let mut camera = FlyCamera::new(Vec3::ZERO, 1.0);
        camera.move_speed = 4.0;
        camera.apply_movement(Vec3::new(0.0, 0.0, -1.0), 0.5);
        // Forward for 0.5s at 4 u/s is 2 units down -Z
        assert!((camera.position - Vec3::new(0.0, 0.0, -2.0)).length() < 1e-5);
    }

    #[test]
    fn test_zero_movement_is_a_no_op() {
        let mut camera = FlyCamera::new(Vec3::new(1.0, 2.0, 3.0), 1.0);
        camera.apply_movement(Vec3::ZERO, 1.0);
        assert_eq!(camera.position, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_set_aspect_rejects_degenerate_values() {
        let mut camera = FlyCamera::new(Vec3::ZERO, 1.5);
        camera.set_aspect(0.0);
        assert_eq!(camera.aspect, 1.5);
        camera.set_aspect(f32::NAN);
        assert_eq!(camera.aspect, 1.5);
        camera.set_aspect(2.0);
        assert_eq!(camera.aspect, 2.0);
    }
}
