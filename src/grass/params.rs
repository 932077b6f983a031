//! GPU-ready uniform structs for the grass passes.
//!
//! Layouts must match the WGSL structs exactly; WGSL vec3 has 16-byte
//! alignment so vec3-ish data travels as vec4 with explicit padding.

use bytemuck::{Pod, Zeroable};

use crate::core::types::{Mat4, Vec2, Vec3};
use crate::math::Aabb;

/// Uniform for the culling/density compute kernel.
/// Must match `CullParams` in grass_cull.wgsl (160 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CullParams {
    /// Main camera view-projection (`_VPMatrix`), for frustum rejection
    pub vp_matrix: [[f32; 4]; 4],
    /// Camera bounds min corner (`_BoundsMin`), w unused
    pub bounds_min: [f32; 4],
    /// Camera bounds max corner (`_BoundsMax`), w unused
    pub bounds_max: [f32; 4],
    /// Camera world position (`_CameraPosition`), w unused
    pub camera_position: [f32; 4],
    /// Snapped data-texture center (`_CenterPos`)
    pub center_pos: [f32; 2],
    /// Grid origin in cell units (`_GridStartIndex`)
    pub grid_start_index: [f32; 2],
    /// Grid dimensions in cells (`_GridSize`)
    pub grid_size: [f32; 2],
    /// `_DrawDistance`
    pub draw_distance: f32,
    /// `_FullDensityDistance`
    pub full_density_distance: f32,
    /// `_Spacing`
    pub spacing: f32,
    /// `_TextureUpdateThreshold`
    pub texture_update_threshold: f32,
    pub _pad: [f32; 2],
    // Total: 160 bytes
}

impl CullParams {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vp_matrix: Mat4,
        bounds: &Aabb,
        camera_position: Vec3,
        center_pos: Vec2,
        grid_start_index: Vec2,
        grid_size: Vec2,
        draw_distance: f32,
        full_density_distance: f32,
        spacing: f32,
        texture_update_threshold: f32,
    ) -> Self {
        Self {
            vp_matrix: vp_matrix.to_cols_array_2d(),
            bounds_min: bounds.min.extend(0.0).to_array(),
            bounds_max: bounds.max.extend(0.0).to_array(),
            camera_position: camera_position.extend(0.0).to_array(),
            center_pos: center_pos.to_array(),
            grid_start_index: grid_start_index.to_array(),
            grid_size: grid_size.to_array(),
            draw_distance,
            full_density_distance,
            spacing,
            texture_update_threshold,
            _pad: [0.0; 2],
        }
    }
}

/// Uniform for the data-texture override pipelines.
/// Must match `DataParams` in grass_data.wgsl (80 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct DataParams {
    /// Orthographic top-down view-projection of the data camera
    pub view_proj: [[f32; 4]; 4],
    /// Vertical bounds range (`_BoundsYMinMax`) normalizing height into [0,1]
    pub bounds_y_min_max: [f32; 2],
    pub _pad: [f32; 2],
    // Total: 80 bytes
}

/// Uniform for the instanced blade draw.
/// Must match `DrawParams` in grass_blade.wgsl (112 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct DrawParams {
    /// Main camera view-projection
    pub view_proj: [[f32; 4]; 4],
    /// Camera world position (`_CameraPosition`), w unused
    pub camera_position: [f32; 4],
    /// Snapped data-texture center (`_CenterPos`)
    pub center_pos: [f32; 2],
    /// `_DrawDistance`
    pub draw_distance: f32,
    /// `_TextureUpdateThreshold`
    pub texture_update_threshold: f32,
    /// Elapsed seconds, drives sway animation
    pub time: f32,
    pub _pad: [f32; 3],
    // Total: 112 bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cull_params_size() {
        assert_eq!(std::mem::size_of::<CullParams>(), 160);
        assert_eq!(std::mem::size_of::<CullParams>() % 16, 0);
    }

    #[test]
    fn test_data_params_size() {
        assert_eq!(std::mem::size_of::<DataParams>(), 80);
        assert_eq!(std::mem::size_of::<DataParams>() % 16, 0);
    }

    #[test]
    fn test_draw_params_size() {
        assert_eq!(std::mem::size_of::<DrawParams>(), 112);
        assert_eq!(std::mem::size_of::<DrawParams>() % 16, 0);
    }

    #[test]
    fn test_bytemuck_cast() {
        let p = CullParams::zeroed();
        assert_eq!(bytemuck::bytes_of(&p).len(), 160);
    }

    #[test]
    fn test_cull_params_fields_land_where_expected() {
        let bounds = Aabb::new(Vec3::new(-1.0, 0.0, -2.0), Vec3::new(3.0, 4.0, 5.0));
        let p = CullParams::new(
            Mat4::IDENTITY,
            &bounds,
            Vec3::new(9.0, 8.0, 7.0),
            Vec2::new(10.0, 20.0),
            Vec2::new(-2.0, -4.0),
            Vec2::new(602.0, 602.0),
            300.0,
            50.0,
            0.5,
            10.0,
        );
        assert_eq!(p.bounds_min[0], -1.0);
        assert_eq!(p.bounds_max[2], 5.0);
        assert_eq!(p.camera_position[1], 8.0);
        assert_eq!(p.grid_size, [602.0, 602.0]);
        assert_eq!(p.spacing, 0.5);
    }
}
