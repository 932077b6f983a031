//! Camera-following bounds and data-texture center math.
//!
//! Pure functions, recomputed every frame; nothing here is persisted.

use crate::core::camera::Camera;
use crate::core::types::{Vec2, Vec3};
use crate::math::Aabb;

/// Safety margin added to the camera bounds, guarding against edge-pixel
/// sampling artifacts at the bounds boundary.
pub const BOUNDS_MARGIN: f32 = 1.0;

/// World-space box covered by grass this frame.
///
/// The four near-plane frustum corners plus the four corners projected out
/// to `draw_distance`, wrapped in an AABB and expanded by [`BOUNDS_MARGIN`].
pub fn camera_bounds(camera: &Camera, draw_distance: f32) -> Aabb {
    let near = camera.frustum_corners(camera.near);
    let far = camera.frustum_corners(draw_distance);

    let points = [
        near[0], near[1], near[2], near[3],
        far[0], far[1], far[2], far[3],
    ];

    Aabb::from_points(&points).expanded(BOUNDS_MARGIN)
}

/// Data-texture center, snapped to the threshold grid.
///
/// `floor(camera.xz / threshold) * threshold`: the result only changes when
/// the camera's horizontal position crosses a threshold-cell boundary, which
/// bounds how often the data textures are re-rendered.
pub fn center_position(camera_position: Vec3, threshold: f32) -> Vec2 {
    if threshold <= 0.0 {
        return Vec2::new(camera_position.x, camera_position.z);
    }
    Vec2::new(
        (camera_position.x / threshold).floor() * threshold,
        (camera_position.z / threshold).floor() * threshold,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_camera() -> Camera {
        let mut camera = Camera::new(Vec3::new(12.0, 8.0, -4.0), 60.0, 16.0 / 9.0);
        camera.set_rotation_euler(0.7, -0.3);
        camera
    }

    #[test]
    fn test_bounds_contain_all_frustum_points() {
        let camera = test_camera();
        let draw_distance = 300.0;
        let bounds = camera_bounds(&camera, draw_distance);

        for corner in camera.frustum_corners(camera.near) {
            assert!(bounds.contains_point(corner), "near corner {corner} outside {bounds:?}");
        }
        for corner in camera.frustum_corners(draw_distance) {
            assert!(bounds.contains_point(corner), "far corner {corner} outside {bounds:?}");
        }
    }

    #[test]
    fn test_bounds_margin_applied() {
        let camera = test_camera();
        let bounds = camera_bounds(&camera, 100.0);

        let near = camera.frustum_corners(camera.near);
        let far = camera.frustum_corners(100.0);
        let raw = Aabb::from_points(&[
            near[0], near[1], near[2], near[3],
            far[0], far[1], far[2], far[3],
        ]);

        let grown = bounds.size() - raw.size();
        assert!((grown.x - BOUNDS_MARGIN).abs() < 1e-4);
        assert!((grown.y - BOUNDS_MARGIN).abs() < 1e-4);
        assert!((grown.z - BOUNDS_MARGIN).abs() < 1e-4);
    }

    #[test]
    fn test_center_snaps_to_threshold_grid() {
        let center = center_position(Vec3::new(23.0, 5.0, -7.0), 10.0);
        assert_eq!(center, Vec2::new(20.0, -10.0));
    }

    #[test]
    fn test_center_stable_within_cell() {
        let threshold = 10.0;
        let a = center_position(Vec3::new(20.0, 0.0, 30.0), threshold);
        let b = center_position(Vec3::new(29.999, 50.0, 39.999), threshold);
        assert_eq!(a, b);
    }

    #[test]
    fn test_center_changes_across_cell_boundary() {
        let threshold = 10.0;
        let a = center_position(Vec3::new(29.999, 0.0, 0.0), threshold);
        let b = center_position(Vec3::new(30.001, 0.0, 0.0), threshold);
        assert_ne!(a, b);
        assert_eq!(b.x - a.x, threshold);
    }

    #[test]
    fn test_center_negative_coordinates() {
        let center = center_position(Vec3::new(-0.5, 0.0, -19.5), 10.0);
        assert_eq!(center, Vec2::new(-10.0, -20.0));
    }

    #[test]
    fn test_center_degenerate_threshold_passes_through() {
        let center = center_position(Vec3::new(3.5, 1.0, -2.5), 0.0);
        assert_eq!(center, Vec2::new(3.5, -2.5));
    }
}
