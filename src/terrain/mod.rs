//! Procedural terrain for the grass to grow on

pub mod generator;
pub mod mesh;

pub use generator::{TerrainGenerator, TerrainParams};
pub use mesh::{TerrainMesh, TerrainPipeline, TERRAIN_LAYER};
