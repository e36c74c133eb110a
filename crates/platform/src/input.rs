//! Keyboard and mouse-motion state tracking.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;

/// Tracks the current state of keyboard input and mouse motion.
#[derive(Debug, Default)]
pub struct InputState {
    /// Currently pressed keys
    pressed_keys: HashSet<KeyCode>,
    /// Keys that were just pressed this frame
    just_pressed_keys: HashSet<KeyCode>,
    /// Mouse movement delta since last frame
    mouse_delta: (f32, f32),
    last_mouse_position: Option<(f32, f32)>,
}

impl InputState {
    /// Create a new input state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call at the beginning of each frame to clear per-frame state.
    pub fn begin_frame(&mut self) {
        self.just_pressed_keys.clear();
        self.mouse_delta = (0.0, 0.0);
    }

    /// Handle a key press event.
    pub fn on_key_pressed(&mut self, key: KeyCode) {
        if self.pressed_keys.insert(key) {
            self.just_pressed_keys.insert(key);
        }
    }

    /// Handle a key release event.
    pub fn on_key_released(&mut self, key: KeyCode) {
        self.pressed_keys.remove(&key);
    }

    /// Handle mouse movement.
    pub fn on_mouse_moved(&mut self, x: f32, y: f32) {
        if let Some((last_x, last_y)) = self.last_mouse_position {
            self.mouse_delta = (x - last_x, y - last_y);
        }
        self.last_mouse_position = Some((x, y));
    }

    /// Check if a key is currently held down.
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    /// Check if a key was just pressed this frame.
    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    /// Get the mouse movement delta since last frame.
    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_just_pressed_cleared_per_frame() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::Space);
        assert!(input.is_key_just_pressed(KeyCode::Space));
        input.begin_frame();
        assert!(!input.is_key_just_pressed(KeyCode::Space));
        assert!(input.is_key_pressed(KeyCode::Space));
    }

    #[test]
    fn test_held_key_does_not_repeat_just_pressed() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyR);
        input.begin_frame();
        input.on_key_pressed(KeyCode::KeyR);
        assert!(!input.is_key_just_pressed(KeyCode::KeyR));
    }

    #[test]
    fn test_mouse_delta_from_motion() {
        let mut input = InputState::new();
        input.on_mouse_moved(100.0, 100.0);
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
        input.on_mouse_moved(104.0, 97.0);
        assert_eq!(input.mouse_delta(), (4.0, -3.0));
    }
}
