//! Grass configuration (author-facing settings).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;

/// Author-facing grass configuration.
///
/// Loadable from JSON so a scene can ship its own tuning. Defaults follow
/// the reference tuning: keep `spacing` above ~0.1 and `max_buffer_count`
/// around 2-3 unless the spacing is unusually dense.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GrassConfig {
    /// Spacing between blades in world units. Zero disables rendering.
    pub spacing: f32,
    /// Maximum grass render distance in meters.
    pub draw_distance: f32,
    /// Distance within which density stays at maximum; beyond it blades
    /// thin out until `draw_distance`.
    pub full_density_distance: f32,
    /// Blade mesh subdivision count. 0 gives a plain triangle; more
    /// sections make curvature and sway look better.
    pub blade_subdivision: u32,
    /// Camera movement (in meters, per axis) before the data textures are
    /// re-rendered around a new center.
    pub texture_update_threshold: f32,
    /// Position buffer capacity in millions of blades.
    pub max_buffer_count: f32,
    /// Read back the GPU visible-blade count each frame. Forces a CPU/GPU
    /// sync point; a large performance cost, debug only.
    pub preview_visible_count: bool,
    /// Layer bits of geometry rasterized into the height map.
    pub height_layers: u32,
}

impl Default for GrassConfig {
    fn default() -> Self {
        Self {
            spacing: 0.5,
            draw_distance: 300.0,
            full_density_distance: 50.0,
            blade_subdivision: 5,
            texture_update_threshold: 10.0,
            max_buffer_count: 2.0,
            preview_visible_count: false,
            height_layers: u32::MAX,
        }
    }
}

impl GrassConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Position buffer capacity in blade records.
    ///
    /// `max_buffer_count` is in millions; a degenerate setting of zero (or
    /// below) clamps to a single record rather than a zero-size buffer.
    pub fn capacity_blades(&self) -> u64 {
        ((self.max_buffer_count as f64 * 1_000_000.0) as u64).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = GrassConfig::default();
        assert_eq!(cfg.spacing, 0.5);
        assert_eq!(cfg.draw_distance, 300.0);
        assert!(cfg.full_density_distance < cfg.draw_distance);
        assert_eq!(cfg.texture_update_threshold, 10.0);
        assert!(!cfg.preview_visible_count);
    }

    #[test]
    fn test_capacity_in_millions() {
        let cfg = GrassConfig {
            max_buffer_count: 2.0,
            ..Default::default()
        };
        assert_eq!(cfg.capacity_blades(), 2_000_000);
    }

    #[test]
    fn test_degenerate_capacity_clamps_to_one() {
        let cfg = GrassConfig {
            max_buffer_count: 0.0,
            ..Default::default()
        };
        assert_eq!(cfg.capacity_blades(), 1);

        let cfg = GrassConfig {
            max_buffer_count: -3.0,
            ..Default::default()
        };
        assert_eq!(cfg.capacity_blades(), 1);
    }

    #[test]
    fn test_fractional_capacity() {
        let cfg = GrassConfig {
            max_buffer_count: 0.5,
            ..Default::default()
        };
        assert_eq!(cfg.capacity_blades(), 500_000);
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grass.json");

        let mut cfg = GrassConfig::default();
        cfg.spacing = 0.25;
        cfg.preview_visible_count = true;
        cfg.save(&path).unwrap();

        let loaded = GrassConfig::load(&path).unwrap();
        assert_eq!(loaded.spacing, 0.25);
        assert!(loaded.preview_visible_count);
        assert_eq!(loaded.draw_distance, cfg.draw_distance);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: GrassConfig = serde_json::from_str(r#"{"spacing": 1.0}"#).unwrap();
        assert_eq!(cfg.spacing, 1.0);
        assert_eq!(cfg.blade_subdivision, 5);
    }
}
