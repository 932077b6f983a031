//! Procedural grass blade mesh.
//!
//! A fan-shaped 2D profile: `s` stacked quads topped by a triangle, 0.5
//! units wide, 1 unit tall, later scaled/bent per instance in the blade
//! shader. Counts are `3 + 4s` vertices and `3(1 + 2s)` indices.

use bytemuck::{Pod, Zeroable};

/// Vertex of the blade profile (XY plane, meters)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct BladeVertex {
    pub position: [f32; 2],
}

impl BladeVertex {
    /// Vertex buffer layout for the blade draw pipeline
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<BladeVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: 0,
                shader_location: 0,
            }],
        }
    }
}

/// CPU-side blade mesh
#[derive(Clone, Debug, PartialEq)]
pub struct BladeMeshData {
    pub vertices: Vec<BladeVertex>,
    pub indices: Vec<u32>,
}

impl BladeMeshData {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Build the blade profile for a given subdivision count.
///
/// Each quad spans normalized heights `i/(s+1)` to `(i+1)/(s+1)` at width
/// ±0.25; the tip triangle closes the last section up to height 1. Winding
/// is counter-clockwise viewed from +Z.
pub fn build_blade_mesh(subdivision: u32) -> BladeMeshData {
    let s = subdivision;
    let vertex_count = (3 + 4 * s) as usize;
    let index_count = (3 * (1 + 2 * s)) as usize;

    let mut vertices = Vec::with_capacity(vertex_count);
    let mut indices = Vec::with_capacity(index_count);

    let sections = (s + 1) as f32;

    for i in 0..s {
        let y1 = i as f32 / sections;
        let y2 = (i + 1) as f32 / sections;

        let base = vertices.len() as u32;
        vertices.push(BladeVertex { position: [-0.25, y1] });
        vertices.push(BladeVertex { position: [0.25, y1] });
        vertices.push(BladeVertex { position: [-0.25, y2] });
        vertices.push(BladeVertex { position: [0.25, y2] });

        indices.extend_from_slice(&[base, base + 3, base + 1]);
        indices.extend_from_slice(&[base, base + 2, base + 3]);
    }

    let tip_base = vertices.len() as u32;
    let shoulder = s as f32 / sections;
    vertices.push(BladeVertex { position: [-0.25, shoulder] });
    vertices.push(BladeVertex { position: [0.0, 1.0] });
    vertices.push(BladeVertex { position: [0.25, shoulder] });

    indices.extend_from_slice(&[tip_base, tip_base + 1, tip_base + 2]);

    debug_assert_eq!(vertices.len(), vertex_count);
    debug_assert_eq!(indices.len(), index_count);

    BladeMeshData { vertices, indices }
}

/// Cached blade mesh, rebuilt only when the subdivision count changes.
///
/// The equality check against the last-built value is the sole invalidation
/// trigger.
pub struct BladeMeshCache {
    built: Option<(u32, BladeMeshData)>,
    rebuild_count: u32,
}

impl BladeMeshCache {
    pub fn new() -> Self {
        Self {
            built: None,
            rebuild_count: 0,
        }
    }

    /// The mesh for `subdivision`, building it if the cached one is stale.
    /// Returns the mesh and whether a rebuild happened.
    pub fn get(&mut self, subdivision: u32) -> (&BladeMeshData, bool) {
        let stale = match &self.built {
            Some((cached, _)) => *cached != subdivision,
            None => true,
        };
        if stale {
            self.built = Some((subdivision, build_blade_mesh(subdivision)));
            self.rebuild_count += 1;
        }
        let (_, mesh) = self.built.as_ref().unwrap();
        (mesh, stale)
    }

    /// How many times the mesh has been (re)built
    pub fn rebuild_count(&self) -> u32 {
        self.rebuild_count
    }
}

impl Default for BladeMeshCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_and_index_counts() {
        for s in 0..=12 {
            let mesh = build_blade_mesh(s);
            assert_eq!(mesh.vertices.len() as u32, 3 + 4 * s, "vertices at s={s}");
            assert_eq!(mesh.indices.len() as u32, 3 * (1 + 2 * s), "indices at s={s}");
        }
    }

    #[test]
    fn test_zero_subdivision_is_a_triangle() {
        let mesh = build_blade_mesh(0);
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices[1].position, [0.0, 1.0]);
    }

    #[test]
    fn test_profile_spans_unit_height() {
        let mesh = build_blade_mesh(5);
        let min_y = mesh.vertices.iter().map(|v| v.position[1]).fold(f32::MAX, f32::min);
        let max_y = mesh.vertices.iter().map(|v| v.position[1]).fold(f32::MIN, f32::max);
        assert_eq!(min_y, 0.0);
        assert_eq!(max_y, 1.0);
    }

    #[test]
    fn test_indices_in_range() {
        for s in [0, 1, 3, 7] {
            let mesh = build_blade_mesh(s);
            let n = mesh.vertices.len() as u32;
            assert!(mesh.indices.iter().all(|&i| i < n), "s={s}");
        }
    }

    #[test]
    fn test_build_is_idempotent() {
        let a = build_blade_mesh(5);
        let b = build_blade_mesh(5);
        assert_eq!(a, b);
        assert_eq!(
            bytemuck::cast_slice::<_, u8>(&a.vertices),
            bytemuck::cast_slice::<_, u8>(&b.vertices),
        );
    }

    #[test]
    fn test_cache_rebuilds_only_on_change() {
        let mut cache = BladeMeshCache::new();

        let (_, rebuilt) = cache.get(5);
        assert!(rebuilt);
        assert_eq!(cache.rebuild_count(), 1);

        let (_, rebuilt) = cache.get(5);
        assert!(!rebuilt);
        assert_eq!(cache.rebuild_count(), 1);

        let (mesh, rebuilt) = cache.get(3);
        assert!(rebuilt);
        assert_eq!(mesh.vertices.len() as u32, 3 + 4 * 3);
        assert_eq!(cache.rebuild_count(), 2);
    }

    #[test]
    fn test_winding_consistent() {
        // All triangles share the same orientation (clockwise in the XY
        // profile; the blade pipeline draws double-sided)
        let mesh = build_blade_mesh(4);
        for tri in mesh.indices.chunks(3) {
            let a = mesh.vertices[tri[0] as usize].position;
            let b = mesh.vertices[tri[1] as usize].position;
            let c = mesh.vertices[tri[2] as usize].position;
            let area = (b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1]);
            assert!(area < 0.0, "triangle {tri:?} wound backwards");
        }
    }
}
