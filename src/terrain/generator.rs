//! Noise-based procedural terrain generation

use crate::core::types::Vec3;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

/// Parameters controlling terrain generation
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    pub seed: u32,
    /// Horizontal scale (larger = smoother)
    pub scale: f32,
    /// Vertical scale (max height)
    pub height_scale: f32,
    /// FBM octaves (detail levels)
    pub octaves: u32,
    /// FBM persistence (0.5 typical)
    pub persistence: f32,
    /// FBM lacunarity (2.0 typical)
    pub lacunarity: f32,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            seed: 12345,
            scale: 120.0,
            height_scale: 24.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

/// Procedural terrain generator using fractal Brownian motion (FBM)
pub struct TerrainGenerator {
    params: TerrainParams,
    noise: Fbm<Perlin>,
}

impl TerrainGenerator {
    /// Create a new terrain generator with the given parameters
    pub fn new(params: TerrainParams) -> Self {
        let noise = Fbm::<Perlin>::new(params.seed)
            .set_octaves(params.octaves as usize)
            .set_persistence(params.persistence as f64)
            .set_lacunarity(params.lacunarity as f64);

        Self { params, noise }
    }

    /// Get terrain parameters
    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// Get terrain height at world position (x, z)
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let nx = (x / self.params.scale) as f64;
        let nz = (z / self.params.scale) as f64;

        // Noise value in [-1, 1], mapped to [0, height_scale]
        let noise_value = self.noise.get([nx, nz]);
        let normalized = (noise_value + 1.0) / 2.0;
        (normalized * self.params.height_scale as f64) as f32
    }

    /// Surface normal at (x, z) via central differences
    pub fn normal_at(&self, x: f32, z: f32) -> Vec3 {
        let eps = 0.5;
        let dx = self.height_at(x + eps, z) - self.height_at(x - eps, z);
        let dz = self.height_at(x, z + eps) - self.height_at(x, z - eps);
        Vec3::new(-dx, 2.0 * eps, -dz).normalize()
    }

    /// Base color at (x, z): greens on the flats shading into rock on
    /// steeper ground
    pub fn color_at(&self, x: f32, z: f32) -> Vec3 {
        let h = self.height_at(x, z) / self.params.height_scale.max(1e-3);
        let flatness = self.normal_at(x, z).y;

        let meadow = Vec3::new(0.18, 0.42, 0.12);
        let dry = Vec3::new(0.38, 0.42, 0.14);
        let rock = Vec3::new(0.35, 0.32, 0.28);

        let grass = meadow.lerp(dry, h.clamp(0.0, 1.0));
        grass.lerp(rock, (1.0 - flatness).clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_deterministic() {
        let a = TerrainGenerator::new(TerrainParams::default());
        let b = TerrainGenerator::new(TerrainParams::default());
        assert_eq!(a.height_at(12.5, -40.0), b.height_at(12.5, -40.0));
    }

    #[test]
    fn test_height_in_range() {
        let generator = TerrainGenerator::new(TerrainParams::default());
        for i in 0..64 {
            let x = i as f32 * 17.3 - 400.0;
            let z = i as f32 * -9.1 + 200.0;
            let h = generator.height_at(x, z);
            assert!(h >= 0.0 && h <= generator.params().height_scale, "h={h} at ({x},{z})");
        }
    }

    #[test]
    fn test_seed_changes_terrain() {
        let a = TerrainGenerator::new(TerrainParams::default());
        let b = TerrainGenerator::new(TerrainParams {
            seed: 999,
            ..TerrainParams::default()
        });
        let same = (0..16).all(|i| {
            let x = i as f32 * 31.0;
            a.height_at(x, 0.0) == b.height_at(x, 0.0)
        });
        assert!(!same);
    }

    #[test]
    fn test_normal_is_unit_and_upward() {
        let generator = TerrainGenerator::new(TerrainParams::default());
        let n = generator.normal_at(10.0, 20.0);
        assert!((n.length() - 1.0).abs() < 1e-4);
        assert!(n.y > 0.0);
    }

    #[test]
    fn test_color_components_in_unit_range() {
        let generator = TerrainGenerator::new(TerrainParams::default());
        let c = generator.color_at(-80.0, 35.0);
        for v in [c.x, c.y, c.z] {
            assert!((0.0..=1.0).contains(&v));
        }
    }
}
