//! Orthographic data-texture pass.
//!
//! Renders the scene as seen from directly above the snapped center into
//! four camera-aligned data textures: height (+depth), mask, color, and
//! slope. The culling kernel reads height and mask; the blade shader reads
//! the published color and slope maps.

use crate::core::types::{Mat4, Vec2, Vec3};
use crate::grass::params::DataParams;
use crate::math::Aabb;
use crate::render::mesh::SceneVertex;
use crate::render::target::{TargetCache, TargetDesc};

/// Resolution of every data texture
pub const DATA_TEXTURE_SIZE: u32 = 2048;

/// Data sub-passes a geometry batch can opt into (the height pass is
/// selected by layer bits instead)
pub mod data_passes {
    pub const MASK: u32 = 1 << 0;
    pub const COLOR: u32 = 1 << 1;
    pub const SLOPE: u32 = 1 << 2;
    pub const ALL: u32 = MASK | COLOR | SLOPE;
}

/// A geometry batch the data pass can rasterize
pub struct DataGeometry<'a> {
    pub vertex_buffer: &'a wgpu::Buffer,
    pub index_buffer: &'a wgpu::Buffer,
    pub index_count: u32,
    /// Layer bits, matched against the configured height-layer mask
    pub layers: u32,
    /// Which of the mask/color/slope variants this batch participates in
    pub passes: u32,
}

/// Horizontal half-extent of the data region in world units
pub fn data_extent(draw_distance: f32, texture_update_threshold: f32) -> f32 {
    draw_distance + texture_update_threshold
}

/// View and projection of the orthographic data camera: positioned above
/// `center` at the bounds top, looking straight down, spanning `extent` on
/// both horizontal axes and the bounds height range in depth.
pub fn data_matrices(bounds: &Aabb, center: Vec2, extent: f32) -> (Mat4, Mat4) {
    let eye = Vec3::new(center.x, bounds.max.y, center.y);
    let view = Mat4::look_at_rh(eye, eye - Vec3::Y, -Vec3::Z);
    let proj = Mat4::orthographic_rh(-extent, extent, -extent, extent, 0.0, bounds.size().y);
    (view, proj)
}

/// Where a world position lands in the data textures.
///
/// Single shared convention, mirrored exactly by grass_cull.wgsl and
/// grass_blade.wgsl: `uv = 0.5 + 0.5 * (world.xz - center) / extent`.
pub fn world_to_data_uv(world: Vec3, center: Vec2, extent: f32) -> Vec2 {
    let rel = (Vec2::new(world.x, world.z) - center) / extent;
    Vec2::splat(0.5) + rel * 0.5
}

/// The data-texture pass: owns the four targets and the override pipelines.
pub struct GrassDataPass {
    height: TargetCache,
    height_depth: TargetCache,
    mask: TargetCache,
    color: TargetCache,
    slope: TargetCache,

    params_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,

    height_pipeline: wgpu::RenderPipeline,
    mask_pipeline: wgpu::RenderPipeline,
    color_pipeline: wgpu::RenderPipeline,
    slope_pipeline: wgpu::RenderPipeline,
}

impl GrassDataPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("grass_data_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../shaders/grass_data.wgsl").into()),
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_data_params"),
            size: std::mem::size_of::<DataParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grass_data_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grass_data_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grass_data_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let make_pipeline = |label: &str, entry: &str, format: wgpu::TextureFormat, depth: bool| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[SceneVertex::layout()],
                    compilation_options: Default::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: depth.then(|| wgpu::DepthStencilState {
                    format: wgpu::TextureFormat::Depth32Float,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(entry),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                multiview_mask: None,
                cache: None,
            })
        };

        let height_pipeline =
            make_pipeline("grass_height_pipeline", "fs_height", wgpu::TextureFormat::Rg32Float, true);
        let mask_pipeline =
            make_pipeline("grass_mask_pipeline", "fs_mask", wgpu::TextureFormat::R32Float, false);
        let color_pipeline =
            make_pipeline("grass_color_pipeline", "fs_color", wgpu::TextureFormat::Rgba16Float, false);
        let slope_pipeline =
            make_pipeline("grass_slope_pipeline", "fs_slope", wgpu::TextureFormat::Rgba16Float, false);

        Self {
            height: TargetCache::new("grass_height_rt"),
            height_depth: TargetCache::new("grass_height_depth_rt"),
            mask: TargetCache::new("grass_mask_rt"),
            color: TargetCache::new("grass_color_rt"),
            slope: TargetCache::new("grass_slope_rt"),
            params_buffer,
            bind_group,
            height_pipeline,
            mask_pipeline,
            color_pipeline,
            slope_pipeline,
        }
    }

    /// Reallocate any target whose descriptor changed (a no-op in the steady
    /// state; the fixed resolution means this only fires on first use)
    fn ensure_targets(&mut self, device: &wgpu::Device) {
        let size = DATA_TEXTURE_SIZE;
        self.height.ensure(device, TargetDesc::attachment(size, size, wgpu::TextureFormat::Rg32Float));
        self.height_depth.ensure(device, TargetDesc {
            width: size,
            height: size,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        });
        self.mask.ensure(device, TargetDesc::attachment(size, size, wgpu::TextureFormat::R32Float));
        self.color.ensure(device, TargetDesc::attachment(size, size, wgpu::TextureFormat::Rgba16Float));
        self.slope.ensure(device, TargetDesc::attachment(size, size, wgpu::TextureFormat::Rgba16Float));
    }

    /// Render the four data textures for this frame.
    ///
    /// One sub-pass per target, each with its own clear: height (+depth,
    /// cleared black/far) over `height_layers`-matching geometry, then
    /// mask/color/slope over the batches that opt into each variant.
    #[allow(clippy::too_many_arguments)]
    pub fn execute(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        bounds: &Aabb,
        center: Vec2,
        draw_distance: f32,
        texture_update_threshold: f32,
        height_layers: u32,
        geometry: &[DataGeometry<'_>],
    ) {
        self.ensure_targets(device);

        let extent = data_extent(draw_distance, texture_update_threshold);
        let (view, proj) = data_matrices(bounds, center, extent);
        let params = DataParams {
            view_proj: (proj * view).to_cols_array_2d(),
            bounds_y_min_max: [bounds.min.y, bounds.max.y],
            _pad: [0.0; 2],
        };
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        let (Some(height_view), Some(depth_view), Some(mask_view), Some(color_view), Some(slope_view)) = (
            self.height.view(),
            self.height_depth.view(),
            self.mask.view(),
            self.color.view(),
            self.slope.view(),
        ) else {
            return;
        };

        self.encode_height_pass(encoder, height_view, depth_view, height_layers, geometry);
        self.encode_variant_pass(encoder, "grass_mask_pass", &self.mask_pipeline,
            mask_view, data_passes::MASK, geometry);
        self.encode_variant_pass(encoder, "grass_color_pass", &self.color_pipeline,
            color_view, data_passes::COLOR, geometry);
        self.encode_variant_pass(encoder, "grass_slope_pass", &self.slope_pipeline,
            slope_view, data_passes::SLOPE, geometry);
    }

    fn encode_height_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        height_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        height_layers: u32,
        geometry: &[DataGeometry<'_>],
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("grass_height_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: height_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_pipeline(&self.height_pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        for geom in geometry.iter().filter(|g| g.layers & height_layers != 0) {
            pass.set_vertex_buffer(0, geom.vertex_buffer.slice(..));
            pass.set_index_buffer(geom.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..geom.index_count, 0, 0..1);
        }
    }

    fn encode_variant_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        pipeline: &wgpu::RenderPipeline,
        target: &wgpu::TextureView,
        pass_bit: u32,
        geometry: &[DataGeometry<'_>],
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        for geom in geometry.iter().filter(|g| g.passes & pass_bit != 0) {
            pass.set_vertex_buffer(0, geom.vertex_buffer.slice(..));
            pass.set_index_buffer(geom.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..geom.index_count, 0, 0..1);
        }
    }

    /// Height map, consumed by the culling kernel
    pub fn height_view(&self) -> Option<&wgpu::TextureView> {
        self.height.view()
    }

    /// Mask map, consumed by the culling kernel
    pub fn mask_view(&self) -> Option<&wgpu::TextureView> {
        self.mask.view()
    }

    /// Published color map, consumed by the blade shader
    pub fn color_view(&self) -> Option<&wgpu::TextureView> {
        self.color.view()
    }

    /// Published slope map, consumed by the blade shader
    pub fn slope_view(&self) -> Option<&wgpu::TextureView> {
        self.slope.view()
    }

    /// Release all data targets
    pub fn release(&mut self) {
        self.height.release();
        self.height_depth.release();
        self.mask.release();
        self.color.release();
        self.slope.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_extent() {
        assert_eq!(data_extent(300.0, 10.0), 310.0);
    }

    #[test]
    fn test_uv_center_maps_to_half() {
        let center = Vec2::new(40.0, -20.0);
        let uv = world_to_data_uv(Vec3::new(40.0, 7.0, -20.0), center, 310.0);
        assert!((uv - Vec2::splat(0.5)).length() < 1e-6);
    }

    #[test]
    fn test_uv_corners() {
        let center = Vec2::ZERO;
        let e = 100.0;
        let uv = world_to_data_uv(Vec3::new(e, 0.0, e), center, e);
        assert!((uv - Vec2::ONE).length() < 1e-6);
        let uv = world_to_data_uv(Vec3::new(-e, 0.0, -e), center, e);
        assert!(uv.length() < 1e-6);
    }

    #[test]
    fn test_uv_agrees_with_matrices() {
        // The analytic mapping must match what the rasterizer does with the
        // actual ortho matrices: uv = (0.5 + 0.5*ndc.x, 0.5 - 0.5*ndc.y).
        let bounds = Aabb::new(Vec3::new(-50.0, 2.0, -80.0), Vec3::new(90.0, 42.0, 60.0));
        let center = Vec2::new(10.0, -10.0);
        let extent = 310.0;
        let (view, proj) = data_matrices(&bounds, center, extent);
        let vp = proj * view;

        for world in [
            Vec3::new(10.0, 5.0, -10.0),
            Vec3::new(120.0, 30.0, 45.0),
            Vec3::new(-200.0, 2.0, 150.0),
            Vec3::new(10.0 + extent, 10.0, -10.0 - extent),
        ] {
            let clip = vp * world.extend(1.0);
            let ndc = clip / clip.w;
            let raster_uv = Vec2::new(0.5 + 0.5 * ndc.x, 0.5 - 0.5 * ndc.y);
            let analytic = world_to_data_uv(world, center, extent);
            assert!(
                (raster_uv - analytic).length() < 1e-4,
                "world {world}: raster {raster_uv} vs analytic {analytic}"
            );
        }
    }

    #[test]
    fn test_depth_range_covers_bounds_height() {
        let bounds = Aabb::new(Vec3::new(-10.0, 0.0, -10.0), Vec3::new(10.0, 50.0, 10.0));
        let (view, proj) = data_matrices(&bounds, Vec2::ZERO, 100.0);
        let vp = proj * view;

        // Top of the bounds sits at the near plane, bottom at the far plane
        let top = vp * Vec3::new(0.0, 50.0, 0.0).extend(1.0);
        let bottom = vp * Vec3::new(0.0, 0.0, 0.0).extend(1.0);
        assert!(top.z / top.w < 1e-4);
        assert!((bottom.z / bottom.w - 1.0).abs() < 1e-4);
    }
}
