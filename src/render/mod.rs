//! Rendering system and GPU interfaces

pub mod context;
pub mod mesh;
pub mod target;

pub use context::GpuContext;
pub use mesh::SceneVertex;
pub use target::TargetCache;
