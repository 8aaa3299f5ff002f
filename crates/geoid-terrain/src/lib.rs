//! Procedural surface geometry: fractal heightmap noise and the
//! deterministic patch geometry function run by the generation workers.

mod error;
mod heightmap;
mod patch_geometry;

pub use error::GeometryError;
pub use heightmap::{HeightmapParams, HeightmapSampler, MAX_OCTAVES};
pub use patch_geometry::{
    GenerationPayload, MAX_RESOLUTION, PatchGeometry, generate_patch_geometry, index_count,
    validate_resolution, vertex_count,
};
