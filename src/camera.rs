// Camera - view and projection matrices
//
// Vulkan conventions: depth in 0..1, +x right, +y down, +z into the screen.

use glam::{Mat4, Vec3, Vec4};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    projection: Mat4,
    view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Box projection. `top` < `bottom` keeps y pointing down.
    pub fn set_orthographic_projection(
        &mut self,
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    ) {
        self.projection = Mat4::from_cols(
            Vec4::new(2.0 / (right - left), 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 / (bottom - top), 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0 / (far - near), 0.0),
            Vec4::new(
                -(right + left) / (right - left),
                -(bottom + top) / (bottom - top),
                -near / (far - near),
                1.0,
            ),
        );
    }

    /// `fov_y` in radians
    pub fn set_perspective_projection(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        assert!(aspect.abs() > f32::EPSILON, "aspect ratio must be non-zero");
        let tan_half_fov_y = (fov_y / 2.0).tan();

        self.projection = Mat4::from_cols(
            Vec4::new(1.0 / (aspect * tan_half_fov_y), 0.0, 0.0, 0.0),
            Vec4::new(0.0, 1.0 / tan_half_fov_y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, far / (far - near), 1.0),
            Vec4::new(0.0, 0.0, -(far * near) / (far - near), 0.0),
        );
    }

    /// Look along `direction` from `position`
    pub fn set_view_direction(&mut self, position: Vec3, direction: Vec3, up: Vec3) {
        let w = direction.normalize();
        let u = w.cross(up).normalize();
        let v = w.cross(u);
        self.view = view_from_basis(u, v, w, position);
    }

    pub fn set_view_target(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.set_view_direction(position, target - position, up);
    }

    /// View from a position and YXZ Tait-Bryan rotation, the inverse of the
    /// same transform applied to a game object
    pub fn set_view_yxz(&mut self, position: Vec3, rotation: Vec3) {
        let (s1, c1) = rotation.y.sin_cos();
        let (s2, c2) = rotation.x.sin_cos();
        let (s3, c3) = rotation.z.sin_cos();

        let u = Vec3::new(c1 * c3 + s1 * s2 * s3, c2 * s3, c1 * s2 * s3 - c3 * s1);
        let v = Vec3::new(c3 * s1 * s2 - c1 * s3, c2 * c3, c1 * c3 * s2 + s1 * s3);
        let w = Vec3::new(c2 * s1, -s2, c1 * c2);
        self.view = view_from_basis(u, v, w, position);
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn projection_view(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Rows of the rotation are the camera axes; translation moves `position` to the origin
fn view_from_basis(u: Vec3, v: Vec3, w: Vec3, position: Vec3) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(u.x, v.x, w.x, 0.0),
        Vec4::new(u.y, v.y, w.y, 0.0),
        Vec4::new(u.z, v.z, w.z, 0.0),
        Vec4::new(-u.dot(position), -v.dot(position), -w.dot(position), 1.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_object::TransformComponent;

    const DOWN_IS_UP: Vec3 = Vec3::new(0.0, -1.0, 0.0);

    #[test]
    fn perspective_maps_near_and_far_to_unit_depth_range() {
        let mut camera = Camera::new();
        camera.set_perspective_projection(50f32.to_radians(), 1.5, 0.1, 10.0);

        let near = camera.projection().project_point3(Vec3::new(0.0, 0.0, 0.1));
        let far = camera.projection().project_point3(Vec3::new(0.0, 0.0, 10.0));
        assert!((near.z - 0.0).abs() < 1e-5);
        assert!((far.z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn perspective_matches_left_handed_glam_projection() {
        let mut camera = Camera::new();
        camera.set_perspective_projection(1.0, 4.0 / 3.0, 0.5, 50.0);
        let expected = Mat4::perspective_lh(1.0, 4.0 / 3.0, 0.5, 50.0);
        assert!(camera.projection().abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn orthographic_maps_box_to_clip_volume() {
        let mut camera = Camera::new();
        camera.set_orthographic_projection(-2.0, 2.0, -1.0, 1.0, 0.0, 10.0);

        let corner = camera.projection().transform_point3(Vec3::new(2.0, 1.0, 10.0));
        assert!(corner.abs_diff_eq(Vec3::new(1.0, 1.0, 1.0), 1e-6));

        let corner = camera.projection().transform_point3(Vec3::new(-2.0, -1.0, 0.0));
        assert!(corner.abs_diff_eq(Vec3::new(-1.0, -1.0, 0.0), 1e-6));
    }

    #[test]
    #[should_panic(expected = "aspect ratio must be non-zero")]
    fn zero_aspect_is_rejected() {
        Camera::new().set_perspective_projection(1.0, 0.0, 0.1, 10.0);
    }

    #[test]
    fn looking_down_positive_z_is_identity() {
        let mut camera = Camera::new();
        camera.set_view_direction(Vec3::ZERO, Vec3::Z, DOWN_IS_UP);
        assert!(camera.view().abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn view_target_puts_target_straight_ahead() {
        let mut camera = Camera::new();
        let position = Vec3::new(-1.0, -2.0, 2.0);
        let target = Vec3::new(0.0, 0.0, 2.5);
        camera.set_view_target(position, target, DOWN_IS_UP);

        let eye = camera.view().transform_point3(position);
        let ahead = camera.view().transform_point3(target);
        assert!(eye.abs_diff_eq(Vec3::ZERO, 1e-5));
        assert!(ahead.x.abs() < 1e-5 && ahead.y.abs() < 1e-5);
        assert!((ahead.z - (target - position).length()).abs() < 1e-5);
    }

    #[test]
    fn yxz_view_inverts_object_transform() {
        let transform = TransformComponent {
            translation: Vec3::new(0.5, -1.0, 3.0),
            rotation: Vec3::new(0.2, -0.9, 0.4),
            ..Default::default()
        };

        let mut camera = Camera::new();
        camera.set_view_yxz(transform.translation, transform.rotation);

        let product = camera.view() * transform.mat4();
        assert!(product.abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn projection_view_applies_view_first() {
        let mut camera = Camera::new();
        camera.set_perspective_projection(1.0, 1.0, 0.1, 10.0);
        camera.set_view_yxz(Vec3::new(0.0, 0.0, -2.0), Vec3::ZERO);

        assert_eq!(camera.projection_view(), camera.projection() * camera.view());
    }
}
