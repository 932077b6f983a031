//! Terrain grid mesh and its forward render pipeline

use bytemuck::{Pod, Zeroable};
use rayon::prelude::*;
use wgpu::util::DeviceExt;

use crate::core::camera::Camera;
use crate::core::types::{Vec2, Vec3};
use crate::grass::data_pass::{data_passes, DataGeometry};
use crate::render::mesh::SceneVertex;
use crate::terrain::generator::TerrainGenerator;

/// Layer bit the terrain occupies (rasterized into the grass height map)
pub const TERRAIN_LAYER: u32 = 1 << 0;

/// Build a `resolution`x`resolution`-vertex grid centered on `center`,
/// `size` meters across, sampling height/normal/color from the generator.
pub fn build_terrain_mesh(
    generator: &TerrainGenerator,
    center: Vec2,
    size: f32,
    resolution: u32,
) -> (Vec<SceneVertex>, Vec<u32>) {
    assert!(resolution >= 2);
    let step = size / (resolution - 1) as f32;
    let origin = center - Vec2::splat(size * 0.5);

    let vertices: Vec<SceneVertex> = (0..resolution)
        .into_par_iter()
        .flat_map_iter(|row| {
            (0..resolution).map(move |col| {
                let x = origin.x + col as f32 * step;
                let z = origin.y + row as f32 * step;
                let height = generator.height_at(x, z);
                let normal = generator.normal_at(x, z);
                let color = generator.color_at(x, z);
                SceneVertex {
                    position: [x, height, z],
                    normal: normal.to_array(),
                    color: color.to_array(),
                }
            })
        })
        .collect();

    let quads = resolution - 1;
    let mut indices = Vec::with_capacity((quads * quads * 6) as usize);
    for row in 0..quads {
        for col in 0..quads {
            let i = row * resolution + col;
            indices.extend_from_slice(&[i, i + resolution, i + 1]);
            indices.extend_from_slice(&[i + 1, i + resolution, i + resolution + 1]);
        }
    }

    (vertices, indices)
}

/// Uploaded terrain mesh
pub struct TerrainMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl TerrainMesh {
    pub fn new(
        device: &wgpu::Device,
        generator: &TerrainGenerator,
        center: Vec2,
        size: f32,
        resolution: u32,
    ) -> Self {
        let (vertices, indices) = build_terrain_mesh(generator, center, size, resolution);

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("terrain_vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("terrain_indices"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        }
    }

    /// How the grass data pass sees the terrain: on the terrain layer,
    /// participating in every data variant
    pub fn data_geometry(&self) -> DataGeometry<'_> {
        DataGeometry {
            vertex_buffer: &self.vertex_buffer,
            index_buffer: &self.index_buffer,
            index_count: self.index_count,
            layers: TERRAIN_LAYER,
            passes: data_passes::ALL,
        }
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Scene uniforms for the forward terrain pass.
/// Must match `SceneParams` in terrain.wgsl (96 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct SceneParams {
    pub view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub sun_direction: [f32; 4],
}

/// Forward pipeline drawing the terrain into the main pass
pub struct TerrainPipeline {
    pipeline: wgpu::RenderPipeline,
    params_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl TerrainPipeline {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("terrain_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../shaders/terrain.wgsl").into()),
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("terrain_params"),
            size: std::mem::size_of::<SceneParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("terrain_layout"),
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
            label: Some("terrain_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("terrain_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("terrain_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[SceneVertex::layout()],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
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

        Self {
            pipeline,
            params_buffer,
            bind_group,
        }
    }

    /// Push this frame's camera and lighting
    pub fn update(&self, queue: &wgpu::Queue, camera: &Camera, sun_direction: Vec3) {
        let params = SceneParams {
            view_proj: camera.view_projection().to_cols_array_2d(),
            camera_position: camera.position.extend(0.0).to_array(),
            sun_direction: sun_direction.normalize().extend(0.0).to_array(),
        };
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
    }

    /// Draw the terrain inside the main render pass
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, mesh: &TerrainMesh) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..mesh.index_count, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::generator::TerrainParams;

    #[test]
    fn test_mesh_counts() {
        let generator = TerrainGenerator::new(TerrainParams::default());
        let (vertices, indices) = build_terrain_mesh(&generator, Vec2::ZERO, 100.0, 17);
        assert_eq!(vertices.len(), 17 * 17);
        assert_eq!(indices.len(), 16 * 16 * 6);
    }

    #[test]
    fn test_mesh_indices_in_range() {
        let generator = TerrainGenerator::new(TerrainParams::default());
        let (vertices, indices) = build_terrain_mesh(&generator, Vec2::ZERO, 64.0, 9);
        let n = vertices.len() as u32;
        assert!(indices.iter().all(|&i| i < n));
    }

    #[test]
    fn test_mesh_heights_match_generator() {
        let generator = TerrainGenerator::new(TerrainParams::default());
        let (vertices, _) = build_terrain_mesh(&generator, Vec2::new(50.0, -30.0), 40.0, 5);
        for v in &vertices {
            let expected = generator.height_at(v.position[0], v.position[2]);
            assert_eq!(v.position[1], expected);
        }
    }

    #[test]
    fn test_mesh_spans_requested_region() {
        let generator = TerrainGenerator::new(TerrainParams::default());
        let (vertices, _) = build_terrain_mesh(&generator, Vec2::ZERO, 200.0, 11);
        let min_x = vertices.iter().map(|v| v.position[0]).fold(f32::MAX, f32::min);
        let max_x = vertices.iter().map(|v| v.position[0]).fold(f32::MIN, f32::max);
        assert!((min_x + 100.0).abs() < 1e-3);
        assert!((max_x - 100.0).abs() < 1e-3);
    }
}
