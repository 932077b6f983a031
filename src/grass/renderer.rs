//! Indirect draw orchestrator.
//!
//! Owns the blade mesh, the indirect-args buffer, and the draw pipeline;
//! drives the data and culling passes and issues exactly one indirect
//! instanced draw per rendered frame. Frames are atomic: a missing
//! dependency or degenerate configuration skips the whole frame, which is a
//! valid outcome, not an error.

use wgpu::util::DeviceExt;

use crate::core::camera::Camera;
use crate::grass::blade::{BladeMeshCache, BladeVertex};
use crate::grass::bounds::{camera_bounds, center_position};
use crate::grass::config::GrassConfig;
use crate::grass::culling_pass::{GrassCullingPass, GrassGrid};
use crate::grass::data_pass::{DataGeometry, GrassDataPass};
use crate::grass::params::{CullParams, DrawParams};
use crate::grass::readback::VisibleCountReadback;
use crate::math::Aabb;

/// Byte offset of the instance-count word inside the indirect-args record.
/// Only the GPU-side counter copy ever writes it.
pub const INSTANCE_COUNT_BYTE_OFFSET: u64 = 4;

/// Size of the 5-u32 indexed indirect-args record
pub const INDIRECT_ARGS_SIZE: u64 = 20;

/// Why a frame produced no grass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// GPU pipelines were never attached
    MissingPipelines,
    /// Data textures are not allocated
    MissingDataTextures,
    /// `spacing == 0`
    ZeroSpacing,
}

/// Result of the per-frame preparation: either work was encoded and a draw
/// will follow, or the frame was skipped in full
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameOutcome {
    Rendered { grid: GrassGrid, bounds: Aabb },
    Skipped(SkipReason),
}

/// GPU pipelines and passes the renderer drives. Kept separate so a
/// renderer without them degrades to a per-frame no-op.
pub struct GrassPipelines {
    data_pass: GrassDataPass,
    culling_pass: GrassCullingPass,
    draw_pipeline: wgpu::RenderPipeline,
    frame_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl GrassPipelines {
    pub fn new(
        device: &wgpu::Device,
        config: &GrassConfig,
        surface_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        let data_pass = GrassDataPass::new(device);
        let culling_pass = GrassCullingPass::new(device, config.capacity_blades());

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("grass_blade_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../shaders/grass_blade.wgsl").into()),
        });

        // Group 0: per-frame uniforms + the culled position buffer
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grass_blade_frame_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        // Group 1: published color/slope maps + sampler
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grass_blade_texture_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grass_blade_pipeline_layout"),
            bind_group_layouts: &[&frame_layout, &texture_layout],
            immediate_size: 0,
        });

        let draw_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("grass_blade_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[BladeVertex::layout()],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                // Blades are double-sided
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview_mask: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("grass_blade_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            data_pass,
            culling_pass,
            draw_pipeline,
            frame_layout,
            texture_layout,
            sampler,
        }
    }
}

/// Uploaded blade mesh (the index count lives in the args buffer)
struct BladeGpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
}

/// The grass renderer: per-frame orchestration and the indirect draw.
pub struct GrassRenderer {
    config: GrassConfig,
    pipelines: Option<GrassPipelines>,
    blade_cache: BladeMeshCache,
    blade_gpu: Option<BladeGpuMesh>,
    args_buffer: wgpu::Buffer,
    draw_params_buffer: wgpu::Buffer,
    frame_bind_group: Option<wgpu::BindGroup>,
    texture_bind_group: Option<wgpu::BindGroup>,
    readback: VisibleCountReadback,
}

impl GrassRenderer {
    /// Create a renderer with its GPU pipelines attached
    pub fn new(
        device: &wgpu::Device,
        config: GrassConfig,
        surface_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        let pipelines = GrassPipelines::new(device, &config, surface_format, depth_format);
        let mut renderer = Self::without_pipelines(device, config);
        renderer.pipelines = Some(pipelines);
        renderer
    }

    /// Create a renderer with no GPU pipelines. Every frame degrades to a
    /// guarded no-op until pipelines are attached; mirrors a missing
    /// material/compute reference in the authoring setup.
    pub fn without_pipelines(device: &wgpu::Device, config: GrassConfig) -> Self {
        // Zero-initialized by wgpu; the instance-count word at offset 4 is
        // never touched from the CPU after this point
        let args_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_indirect_args"),
            size: INDIRECT_ARGS_SIZE,
            usage: wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let draw_params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_draw_params"),
            size: std::mem::size_of::<DrawParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let readback = VisibleCountReadback::new(device);

        Self {
            config,
            pipelines: None,
            blade_cache: BladeMeshCache::new(),
            blade_gpu: None,
            args_buffer,
            draw_params_buffer,
            frame_bind_group: None,
            texture_bind_group: None,
            readback,
        }
    }

    pub fn config(&self) -> &GrassConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut GrassConfig {
        &mut self.config
    }

    /// Encode this frame's grass work: data textures, culling dispatch, and
    /// the args/uniform updates the draw call depends on.
    ///
    /// Returns `FrameOutcome::Skipped` (and encodes nothing) when a
    /// dependency is missing or the configuration is degenerate.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        camera: &Camera,
        time: f32,
        geometry: &[DataGeometry<'_>],
    ) -> FrameOutcome {
        self.frame_bind_group = None;
        self.texture_bind_group = None;

        let Some(pipelines) = &mut self.pipelines else {
            return FrameOutcome::Skipped(SkipReason::MissingPipelines);
        };
        if self.config.spacing == 0.0 {
            return FrameOutcome::Skipped(SkipReason::ZeroSpacing);
        }

        let bounds = camera_bounds(camera, self.config.draw_distance);
        let center = center_position(camera.position, self.config.texture_update_threshold);

        // Blade mesh: rebuilt only when the subdivision count changed
        let (mesh, rebuilt) = self.blade_cache.get(self.config.blade_subdivision);
        if rebuilt || self.blade_gpu.is_none() {
            self.blade_gpu = Some(BladeGpuMesh {
                vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("grass_blade_vertices"),
                    contents: bytemuck::cast_slice(&mesh.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                index_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("grass_blade_indices"),
                    contents: bytemuck::cast_slice(&mesh.indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
            });
        }
        let index_count = mesh.index_count();

        // Refresh the args record from mesh metadata. Word 0 is the index
        // count; words 2..5 are first_index/base_vertex/first_instance. The
        // instance-count word at byte 4 is deliberately skipped: only the
        // GPU-side counter copy writes it.
        queue.write_buffer(&self.args_buffer, 0, bytemuck::bytes_of(&index_count));
        queue.write_buffer(&self.args_buffer, 8, bytemuck::cast_slice(&[0u32, 0, 0]));

        // Position buffer follows the configured capacity
        pipelines
            .culling_pass
            .ensure_capacity(device, self.config.capacity_blades());

        // 1. Data textures
        pipelines.data_pass.execute(
            device,
            queue,
            encoder,
            &bounds,
            center,
            self.config.draw_distance,
            self.config.texture_update_threshold,
            self.config.height_layers,
            geometry,
        );

        let (Some(height_view), Some(mask_view), Some(color_view), Some(slope_view)) = (
            pipelines.data_pass.height_view(),
            pipelines.data_pass.mask_view(),
            pipelines.data_pass.color_view(),
            pipelines.data_pass.slope_view(),
        ) else {
            return FrameOutcome::Skipped(SkipReason::MissingDataTextures);
        };

        // 2. Culling dispatch: reset -> cull -> clamp -> counter copy
        let grid = GrassGrid::from_bounds(&bounds, self.config.spacing);
        let cull_params = CullParams::new(
            camera.view_projection(),
            &bounds,
            camera.position,
            center,
            grid.start_as_vec2(),
            grid.size_as_vec2(),
            self.config.draw_distance,
            self.config.full_density_distance,
            self.config.spacing,
            self.config.texture_update_threshold,
        );
        let debug_buffer = self.config.preview_visible_count.then(|| self.readback.buffer());
        pipelines.culling_pass.encode(
            device,
            queue,
            encoder,
            &cull_params,
            &grid,
            height_view,
            mask_view,
            &self.args_buffer,
            debug_buffer,
        );
        if self.config.preview_visible_count {
            self.readback.schedule(encoder);
        }

        // 3. Draw-side uniforms and bind groups
        let draw_params = DrawParams {
            view_proj: camera.view_projection().to_cols_array_2d(),
            camera_position: camera.position.extend(0.0).to_array(),
            center_pos: center.to_array(),
            draw_distance: self.config.draw_distance,
            texture_update_threshold: self.config.texture_update_threshold,
            time,
            _pad: [0.0; 3],
        };
        queue.write_buffer(&self.draw_params_buffer, 0, bytemuck::bytes_of(&draw_params));

        self.frame_bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grass_blade_frame_bind_group"),
            layout: &pipelines.frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.draw_params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: pipelines.culling_pass.positions_buffer().as_entire_binding(),
                },
            ],
        }));
        self.texture_bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grass_blade_texture_bind_group"),
            layout: &pipelines.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(color_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(slope_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&pipelines.sampler),
                },
            ],
        }));

        FrameOutcome::Rendered { grid, bounds }
    }

    /// Issue the indirect instanced draw inside the main render pass.
    /// A no-op unless `prepare` returned `Rendered` this frame.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        let (Some(pipelines), Some(blade), Some(frame_bg), Some(texture_bg)) = (
            &self.pipelines,
            &self.blade_gpu,
            &self.frame_bind_group,
            &self.texture_bind_group,
        ) else {
            return;
        };

        pass.set_pipeline(&pipelines.draw_pipeline);
        pass.set_bind_group(0, frame_bg, &[]);
        pass.set_bind_group(1, texture_bg, &[]);
        pass.set_vertex_buffer(0, blade.vertex_buffer.slice(..));
        pass.set_index_buffer(blade.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed_indirect(&self.args_buffer, 0);
    }

    /// Resolve the scheduled visible-count readback, if any. Blocks on the
    /// GPU; only meaningful with `preview_visible_count` enabled.
    pub fn resolve_visible_count(&mut self, device: &wgpu::Device) -> Option<u32> {
        match self.readback.resolve(device) {
            Ok(count) => count,
            Err(e) => {
                log::warn!("visible-count readback failed: {e}");
                None
            }
        }
    }

    /// Drop all transient GPU state (data targets, bind groups). Buffers
    /// and pipelines owned by the renderer are released when it is dropped.
    pub fn release(&mut self) {
        self.frame_bind_group = None;
        self.texture_bind_group = None;
        self.blade_gpu = None;
        if let Some(pipelines) = &mut self.pipelines {
            pipelines.data_pass.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_record_layout() {
        // 5-u32 record. The instance-count word sits at byte 4 and is
        // GPU-owned: the CPU-side refreshes in `prepare` write the ranges
        // [0, 4) and [8, 20) only.
        assert_eq!(INDIRECT_ARGS_SIZE, 20);
        assert_eq!(INSTANCE_COUNT_BYTE_OFFSET, 4);
        assert_eq!(
            std::mem::size_of::<wgpu::util::DrawIndexedIndirectArgs>() as u64,
            INDIRECT_ARGS_SIZE
        );
    }
}
