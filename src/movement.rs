// Keyboard movement - fly a game object around the XZ plane
//
// Usually drives the viewer object that the camera follows.

use glam::Vec3;
use std::collections::HashSet;
use std::f32::consts::TAU;
use winit::keyboard::KeyCode;

use crate::game_object::GameObject;

#[derive(Debug, Clone, Copy)]
pub struct KeyMappings {
    pub move_left: KeyCode,
    pub move_right: KeyCode,
    pub move_forward: KeyCode,
    pub move_backward: KeyCode,
    pub move_up: KeyCode,
    pub move_down: KeyCode,
    pub look_left: KeyCode,
    pub look_right: KeyCode,
    pub look_up: KeyCode,
    pub look_down: KeyCode,
}

impl Default for KeyMappings {
    fn default() -> Self {
        Self {
            move_left: KeyCode::KeyA,
            move_right: KeyCode::KeyD,
            move_forward: KeyCode::KeyW,
            move_backward: KeyCode::KeyS,
            move_up: KeyCode::KeyE,
            move_down: KeyCode::KeyQ,
            look_left: KeyCode::ArrowLeft,
            look_right: KeyCode::ArrowRight,
            look_up: KeyCode::ArrowUp,
            look_down: KeyCode::ArrowDown,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KeyboardMovementController {
    pub keys: KeyMappings,
    /// Units per second
    pub move_speed: f32,
    /// Radians per second
    pub look_speed: f32,
}

impl Default for KeyboardMovementController {
    fn default() -> Self {
        Self {
            keys: KeyMappings::default(),
            move_speed: 3.0,
            look_speed: 1.5,
        }
    }
}

/// Pitch stays short of straight up/down so yaw remains meaningful
const PITCH_LIMIT: f32 = 1.5;

impl KeyboardMovementController {
    pub fn move_in_plane_xz(&self, pressed: &HashSet<KeyCode>, dt: f32, object: &mut GameObject) {
        let held = |key: KeyCode| if pressed.contains(&key) { 1.0 } else { 0.0 };
        let k = &self.keys;

        let rotate = Vec3::new(
            held(k.look_up) - held(k.look_down),
            held(k.look_right) - held(k.look_left),
            0.0,
        );
        let transform = &mut object.transform;
        if rotate.length_squared() > f32::EPSILON {
            transform.rotation += self.look_speed * dt * rotate.normalize();
        }
        transform.rotation.x = transform.rotation.x.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        transform.rotation.y = transform.rotation.y.rem_euclid(TAU);

        let yaw = transform.rotation.y;
        let forward = Vec3::new(yaw.sin(), 0.0, yaw.cos());
        let right = Vec3::new(forward.z, 0.0, -forward.x);
        let up = Vec3::new(0.0, -1.0, 0.0);

        let direction = forward * (held(k.move_forward) - held(k.move_backward))
            + right * (held(k.move_right) - held(k.move_left))
            + up * (held(k.move_up) - held(k.move_down));
        if direction.length_squared() > f32::EPSILON {
            transform.translation += self.move_speed * dt * direction.normalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_object::GameObjects;

    fn pressed(keys: &[KeyCode]) -> HashSet<KeyCode> {
        keys.iter().copied().collect()
    }

    #[test]
    fn no_keys_leaves_object_alone() {
        let mut objects = GameObjects::new();
        let viewer = objects.create();
        KeyboardMovementController::default().move_in_plane_xz(&pressed(&[]), 0.5, viewer);

        assert_eq!(viewer.transform.translation, Vec3::ZERO);
        assert_eq!(viewer.transform.rotation, Vec3::ZERO);
    }

    #[test]
    fn forward_follows_yaw() {
        let mut objects = GameObjects::new();
        let viewer = objects.create();
        viewer.transform.rotation.y = std::f32::consts::FRAC_PI_2;

        let controller = KeyboardMovementController::default();
        controller.move_in_plane_xz(&pressed(&[KeyCode::KeyW]), 1.0, viewer);

        assert!(viewer.transform.translation.abs_diff_eq(Vec3::new(3.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn diagonal_movement_is_normalized() {
        let mut objects = GameObjects::new();
        let viewer = objects.create();

        let controller = KeyboardMovementController::default();
        controller.move_in_plane_xz(&pressed(&[KeyCode::KeyW, KeyCode::KeyD]), 1.0, viewer);

        let moved = viewer.transform.translation;
        assert!((moved.length() - controller.move_speed).abs() < 1e-5);
        assert!(moved.x > 0.0 && moved.z > 0.0);
    }

    #[test]
    fn up_moves_towards_negative_y() {
        let mut objects = GameObjects::new();
        let viewer = objects.create();
        KeyboardMovementController::default().move_in_plane_xz(&pressed(&[KeyCode::KeyE]), 1.0, viewer);
        assert!(viewer.transform.translation.y < 0.0);
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut objects = GameObjects::new();
        let viewer = objects.create();
        let keys = pressed(&[KeyCode::KeyA, KeyCode::KeyD, KeyCode::ArrowUp, KeyCode::ArrowDown]);
        KeyboardMovementController::default().move_in_plane_xz(&keys, 1.0, viewer);

        assert_eq!(viewer.transform.translation, Vec3::ZERO);
        assert_eq!(viewer.transform.rotation, Vec3::ZERO);
    }

    #[test]
    fn pitch_is_clamped_and_yaw_wraps() {
        let mut objects = GameObjects::new();
        let viewer = objects.create();
        let controller = KeyboardMovementController::default();

        controller.move_in_plane_xz(&pressed(&[KeyCode::ArrowUp]), 10.0, viewer);
        assert_eq!(viewer.transform.rotation.x, PITCH_LIMIT);

        controller.move_in_plane_xz(&pressed(&[KeyCode::ArrowLeft]), 1.0, viewer);
        let yaw = viewer.transform.rotation.y;
        assert!((0.0..TAU).contains(&yaw));
        assert!((yaw - (TAU - controller.look_speed)).abs() < 1e-5);
    }
}
