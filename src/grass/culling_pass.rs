//! Compute culling/density pass.
//!
//! Walks a spacing-sized grid over the camera bounds and appends one
//! candidate blade position per surviving cell into the GPU position
//! buffer. The append counter is reset before the dispatch and copied
//! GPU-to-GPU into the indirect-args instance-count slot afterwards, so the
//! CPU never observes (or stalls on) the count.

use crate::core::types::{UVec2, Vec2};
use crate::grass::params::CullParams;
use crate::grass::renderer::INSTANCE_COUNT_BYTE_OFFSET;
use crate::math::Aabb;

/// Thread-group tiling of the cull kernel (8x8 per group)
pub const WORKGROUP_SIZE: u32 = 8;

/// Bytes per appended position record (tightly packed 3 floats)
pub const POSITION_STRIDE: u64 = 12;

/// Grid the cull kernel is dispatched over
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GrassGrid {
    /// Cell-space origin: `floor(bounds_min.xz / spacing)`
    pub start_index: [i32; 2],
    /// Cell counts: `ceil(bounds_size.xz / spacing)`
    pub size: UVec2,
}

impl GrassGrid {
    pub fn from_bounds(bounds: &Aabb, spacing: f32) -> Self {
        let size = bounds.size();
        Self {
            start_index: [
                (bounds.min.x / spacing).floor() as i32,
                (bounds.min.z / spacing).floor() as i32,
            ],
            size: UVec2::new(
                (size.x / spacing).ceil() as u32,
                (size.z / spacing).ceil() as u32,
            ),
        }
    }

    /// Total cells considered this frame
    pub fn cell_count(&self) -> u64 {
        self.size.x as u64 * self.size.y as u64
    }

    /// Workgroup counts for the 8x8-tiled dispatch
    pub fn dispatch_groups(&self) -> (u32, u32) {
        (
            (self.size.x + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE,
            (self.size.y + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE,
        )
    }

    pub fn start_as_vec2(&self) -> Vec2 {
        Vec2::new(self.start_index[0] as f32, self.start_index[1] as f32)
    }

    pub fn size_as_vec2(&self) -> Vec2 {
        Vec2::new(self.size.x as f32, self.size.y as f32)
    }
}

/// The culling/density compute pass. Owns the position and counter buffers.
pub struct GrassCullingPass {
    cull_pipeline: wgpu::ComputePipeline,
    finalize_pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    positions_buffer: wgpu::Buffer,
    counter_buffer: wgpu::Buffer,
    capacity_blades: u64,
}

impl GrassCullingPass {
    pub fn new(device: &wgpu::Device, initial_capacity_blades: u64) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("grass_cull_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../shaders/grass_cull.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grass_cull_layout"),
            entries: &[
                // Cull params
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Position append buffer
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Append counter (atomic)
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Height map
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Mask map
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grass_cull_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let cull_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("grass_cull_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let finalize_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("grass_cull_finalize_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("finalize"),
            compilation_options: Default::default(),
            cache: None,
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_cull_params"),
            size: std::mem::size_of::<CullParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let capacity = initial_capacity_blades.max(1);
        let positions_buffer = Self::create_positions_buffer(device, capacity);

        let counter_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_counter"),
            size: std::mem::size_of::<u32>() as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            cull_pipeline,
            finalize_pipeline,
            bind_group_layout,
            params_buffer,
            positions_buffer,
            counter_buffer,
            capacity_blades: capacity,
        }
    }

    fn create_positions_buffer(device: &wgpu::Device, capacity_blades: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_positions"),
            size: capacity_blades * POSITION_STRIDE,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        })
    }

    /// Release and recreate the position buffer iff the configured capacity
    /// changed. Returns true when a reallocation happened.
    pub fn ensure_capacity(&mut self, device: &wgpu::Device, capacity_blades: u64) -> bool {
        let capacity = capacity_blades.max(1);
        if capacity == self.capacity_blades {
            return false;
        }
        log::debug!(
            "grass position buffer capacity {} -> {} blades",
            self.capacity_blades, capacity
        );
        self.positions_buffer = Self::create_positions_buffer(device, capacity);
        self.capacity_blades = capacity;
        true
    }

    /// Encode this frame's culling work.
    ///
    /// Command order is load-bearing: counter reset, cull dispatch, counter
    /// clamp, then the copy into the args buffer the draw call reads.
    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        params: &CullParams,
        grid: &GrassGrid,
        height_view: &wgpu::TextureView,
        mask_view: &wgpu::TextureView,
        args_buffer: &wgpu::Buffer,
        debug_buffer: Option<&wgpu::Buffer>,
    ) {
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(params));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grass_cull_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.positions_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.counter_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(height_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(mask_view),
                },
            ],
        });

        encoder.clear_buffer(&self.counter_buffer, 0, None);

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("grass_cull_pass"),
                timestamp_writes: None,
            });
            pass.set_bind_group(0, &bind_group, &[]);

            pass.set_pipeline(&self.cull_pipeline);
            let (groups_x, groups_y) = grid.dispatch_groups();
            pass.dispatch_workgroups(groups_x, groups_y, 1);

            // Clamp the counter to capacity so the indirect draw never
            // observes a count beyond the buffer (overflow truncates)
            pass.set_pipeline(&self.finalize_pipeline);
            pass.dispatch_workgroups(1, 1, 1);
        }

        encoder.copy_buffer_to_buffer(
            &self.counter_buffer,
            0,
            args_buffer,
            INSTANCE_COUNT_BYTE_OFFSET,
            std::mem::size_of::<u32>() as u64,
        );

        if let Some(debug) = debug_buffer {
            encoder.copy_buffer_to_buffer(
                &self.counter_buffer,
                0,
                debug,
                0,
                std::mem::size_of::<u32>() as u64,
            );
        }
    }

    /// The position buffer consumed by the blade draw
    pub fn positions_buffer(&self) -> &wgpu::Buffer {
        &self.positions_buffer
    }

    /// The append counter buffer
    pub fn counter_buffer(&self) -> &wgpu::Buffer {
        &self.counter_buffer
    }

    /// Current capacity in blade records
    pub fn capacity_blades(&self) -> u64 {
        self.capacity_blades
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;

    #[test]
    fn test_grid_from_bounds() {
        let bounds = Aabb::new(Vec3::new(-10.2, 0.0, 4.1), Vec3::new(10.2, 20.0, 24.9));
        let grid = GrassGrid::from_bounds(&bounds, 0.5);

        // start = floor(min / spacing), size = ceil(extent / spacing)
        assert_eq!(grid.start_index, [-21, 8]);
        assert_eq!(grid.size, UVec2::new(41, 42));
    }

    #[test]
    fn test_grid_dispatch_groups_round_up() {
        let grid = GrassGrid {
            start_index: [0, 0],
            size: UVec2::new(17, 16),
        };
        assert_eq!(grid.dispatch_groups(), (3, 2));

        let grid = GrassGrid {
            start_index: [0, 0],
            size: UVec2::new(1, 1),
        };
        assert_eq!(grid.dispatch_groups(), (1, 1));
    }

    #[test]
    fn test_grid_exact_multiple() {
        let bounds = Aabb::new(Vec3::ZERO, Vec3::new(4.0, 1.0, 8.0));
        let grid = GrassGrid::from_bounds(&bounds, 0.5);
        assert_eq!(grid.size, UVec2::new(8, 16));
        assert_eq!(grid.dispatch_groups(), (1, 2));
    }

    #[test]
    fn test_reference_scenario_cell_count() {
        // spacing 0.5, draw distance 300, threshold 10: a square region of
        // full data extent gives ceil(602 / 0.5) = 1204 cells per axis
        let extent = 301.0;
        let bounds = Aabb::new(
            Vec3::new(-extent, 0.0, -extent),
            Vec3::new(extent, 30.0, extent),
        );
        let grid = GrassGrid::from_bounds(&bounds, 0.5);
        assert_eq!(grid.size, UVec2::new(1204, 1204));
        assert_eq!(grid.cell_count(), 1204 * 1204);
        assert_eq!(grid.dispatch_groups(), (151, 151));
    }
}
