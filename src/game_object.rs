// Game objects - things with a transform that render systems draw
//
// Objects live in a GameObjects arena which hands out sequential ids.

use glam::{EulerRot, Mat4, Quat, Vec3};
use std::sync::Arc;

use crate::model::Model;

pub type GameObjectId = u32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformComponent {
    pub translation: Vec3,
    pub scale: Vec3,
    /// Tait-Bryan angles in radians, applied Y (yaw), then X (pitch), then Z (roll)
    pub rotation: Vec3,
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Vec3::ZERO,
        }
    }
}

impl TransformComponent {
    /// translate * Ry * Rx * Rz * scale
    pub fn mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation_quat(), self.translation)
    }

    pub fn rotation_quat(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.rotation.y, self.rotation.x, self.rotation.z)
    }
}

pub struct GameObject {
    id: GameObjectId,
    pub model: Option<Arc<Model>>,
    pub color: Vec3,
    pub transform: TransformComponent,
}

impl GameObject {
    pub fn id(&self) -> GameObjectId {
        self.id
    }
}

/// Owns every game object; ids are indices in creation order
#[derive(Default)]
pub struct GameObjects {
    objects: Vec<GameObject>,
}

impl GameObjects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self) -> &mut GameObject {
        let id = self.objects.len() as GameObjectId;
        self.objects.push(GameObject {
            id,
            model: None,
            color: Vec3::ZERO,
            transform: TransformComponent::default(),
        });
        &mut self.objects[id as usize]
    }

    pub fn get(&self, id: GameObjectId) -> Option<&GameObject> {
        self.objects.get(id as usize)
    }

    pub fn get_mut(&mut self, id: GameObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(id as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.iter()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn default_transform_is_identity() {
        assert_eq!(TransformComponent::default().mat4(), Mat4::IDENTITY);
    }

    #[test]
    fn scale_is_applied_before_translation() {
        let transform = TransformComponent {
            translation: Vec3::new(1.0, 2.0, 3.0),
            scale: Vec3::splat(2.0),
            rotation: Vec3::ZERO,
        };
        let p = transform.mat4().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!(p.abs_diff_eq(Vec3::new(3.0, 2.0, 3.0), 1e-6));
    }

    #[test]
    fn yaw_turns_x_towards_negative_z() {
        let transform = TransformComponent {
            rotation: Vec3::new(0.0, FRAC_PI_2, 0.0),
            ..Default::default()
        };
        let p = transform.mat4().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1e-6));
    }

    #[test]
    fn rotation_order_is_yaw_then_pitch_then_roll() {
        let rotation = Vec3::new(0.3, 0.7, -0.2);
        let transform = TransformComponent {
            rotation,
            ..Default::default()
        };
        let expected = Mat4::from_rotation_y(rotation.y)
            * Mat4::from_rotation_x(rotation.x)
            * Mat4::from_rotation_z(rotation.z);
        assert!(transform.mat4().abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn arena_hands_out_sequential_ids() {
        let mut objects = GameObjects::new();
        assert!(objects.is_empty());

        let first = objects.create().id();
        let second = objects.create().id();
        let third = objects.create().id();

        assert_eq!((first, second, third), (0, 1, 2));
        assert_eq!(objects.len(), 3);
        assert_eq!(objects.get(second).map(GameObject::id), Some(1));
        assert!(objects.get(3).is_none());
    }

    #[test]
    fn objects_are_mutable_through_the_arena() {
        let mut objects = GameObjects::new();
        let id = objects.create().id();

        objects.get_mut(id).unwrap().transform.translation = Vec3::new(0.0, 0.0, 2.5);
        objects.get_mut(id).unwrap().color = Vec3::new(0.1, 0.8, 0.1);

        let obj = objects.get(id).unwrap();
        assert_eq!(obj.transform.translation.z, 2.5);
        assert_eq!(obj.color, Vec3::new(0.1, 0.8, 0.1));
        assert!(obj.model.is_none());
    }
}
