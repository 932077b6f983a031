//! Camera-following procedural grass.
//!
//! No per-blade state survives a frame: the data-texture pass rasterizes
//! terrain attributes around the camera, a compute pass appends visible
//! blade positions into a GPU buffer, and a single indirect instanced draw
//! renders them. See `renderer::GrassRenderer` for the per-frame flow.

pub mod blade;
pub mod bounds;
pub mod config;
pub mod culling_pass;
pub mod data_pass;
pub mod params;
pub mod readback;
pub mod renderer;

pub use blade::{BladeMeshCache, build_blade_mesh};
pub use bounds::{camera_bounds, center_position, BOUNDS_MARGIN};
pub use config::GrassConfig;
pub use culling_pass::{GrassCullingPass, GrassGrid};
pub use data_pass::{DataGeometry, GrassDataPass, data_passes, DATA_TEXTURE_SIZE};
pub use renderer::{FrameOutcome, GrassRenderer, SkipReason};
