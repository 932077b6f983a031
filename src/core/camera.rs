//! Camera for 3D rendering

use crate::core::types::{Vec2, Vec3, Mat4, Quat};

/// Camera with position, rotation, and projection parameters
pub struct Camera {
    /// World position
    pub position: Vec3,
    /// Rotation as quaternion
    pub rotation: Quat,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
}

impl Camera {
    /// Create a new camera
    pub fn new(position: Vec3, fov_y_degrees: f32, aspect: f32) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near: 0.1,
            far: 1000.0,
        }
    }

    /// Get view matrix (world to camera space)
    pub fn view_matrix(&self) -> Mat4 {
        let rotation_matrix = Mat4::from_quat(self.rotation.conjugate());
        let translation_matrix = Mat4::from_translation(-self.position);
        rotation_matrix * translation_matrix
    }

    /// Get projection matrix (camera to clip space)
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    /// Get combined view-projection matrix
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Get forward direction (negative Z in camera space)
    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::Z
    }

    /// Get right direction (positive X in camera space)
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Get up direction (positive Y in camera space)
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// World-space point seen through normalized viewport coordinates.
    ///
    /// `viewport` is (0,0) bottom-left to (1,1) top-right. `depth` is the
    /// view-space distance along the camera's forward axis, so
    /// `viewport_to_world(v, near)` lands on the near plane.
    pub fn viewport_to_world(&self, viewport: Vec2, depth: f32) -> Vec3 {
        let ndc = viewport * 2.0 - Vec2::ONE;
        let tan_half_fov = (self.fov_y * 0.5).tan();
        let view_dir = Vec3::new(
            ndc.x * tan_half_fov * self.aspect,
            ndc.y * tan_half_fov,
            -1.0,
        );
        self.position + self.rotation * (view_dir * depth)
    }

    /// The four frustum corners at a given view-space depth,
    /// in viewport order (0,0), (1,0), (0,1), (1,1).
    pub fn frustum_corners(&self, depth: f32) -> [Vec3; 4] {
        [
            self.viewport_to_world(Vec2::new(0.0, 0.0), depth),
            self.viewport_to_world(Vec2::new(1.0, 0.0), depth),
            self.viewport_to_world(Vec2::new(0.0, 1.0), depth),
            self.viewport_to_world(Vec2::new(1.0, 1.0), depth),
        ]
    }

    /// Set rotation from euler angles (yaw, pitch in radians)
    pub fn set_rotation_euler(&mut self, yaw: f32, pitch: f32) {
        self.rotation = Quat::from_euler(glam::EulerRot::YXZ, yaw, pitch, 0.0);
    }

    /// Update aspect ratio (call on window resize)
    pub fn set_aspect(&mut self, width: f32, height: f32) {
        self.aspect = width / height;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 2.0, 5.0), 60.0, 16.0 / 9.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directions() {
        let camera = Camera::default();

        // Default camera looks down -Z
        let forward = camera.forward();
        assert!((forward.z - (-1.0)).abs() < 0.001);

        let right = camera.right();
        assert!((right.x - 1.0).abs() < 0.001);

        let up = camera.up();
        assert!((up.y - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_view_matrix_translation() {
        let mut camera = Camera::default();
        camera.position = Vec3::new(10.0, 0.0, 0.0);

        let view = camera.view_matrix();
        // View matrix should translate world origin to (-10, 0, 0) in camera space
        let origin_in_camera = view.transform_point3(Vec3::ZERO);
        assert!((origin_in_camera.x - (-10.0)).abs() < 0.001);
    }

    #[test]
    fn test_viewport_center_lies_on_forward_axis() {
        let mut camera = Camera::default();
        camera.position = Vec3::ZERO;

        let p = camera.viewport_to_world(Vec2::splat(0.5), 10.0);
        // Center of the viewport at depth 10 is 10 units down the forward axis
        assert!((p - camera.forward() * 10.0).length() < 0.001);
    }

    #[test]
    fn test_viewport_depth_is_view_space_z() {
        let camera = Camera::default();

        // A corner point at depth d must sit at view-space z = -d
        let p = camera.viewport_to_world(Vec2::new(1.0, 1.0), 25.0);
        let view_p = camera.view_matrix().transform_point3(p);
        assert!((view_p.z - (-25.0)).abs() < 0.001);
    }

    #[test]
    fn test_frustum_corners_widen_with_depth() {
        let mut camera = Camera::default();
        camera.position = Vec3::ZERO;

        let near = camera.frustum_corners(1.0);
        let far = camera.frustum_corners(100.0);
        let near_w = (near[1] - near[0]).length();
        let far_w = (far[1] - far[0]).length();
        assert!(far_w > near_w * 50.0);
    }
}
