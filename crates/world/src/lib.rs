//! Voxel terrain storage for Voxterra.
//!
//! This crate owns the terrain: a sparse set of 16³ chunks keyed by integer
//! chunk coordinate, and every way of changing it.
//!
//! ## Key concepts
//!
//! - **Voxel**: a `(value, color)` byte pair sampled at an integer world
//!   position. `value` is a density; terrain is solid where it reaches the
//!   surface level.
//! - **Chunk store**: an arena of chunks plus a coordinate index. Chunks are
//!   created on first write and never freed individually.
//! - **History**: each chunk remembers the original value of every voxel
//!   changed since the last synchronization point, so changes can be sent as
//!   [`ChunkModification`] records or rolled back.
//!
//! ## Usage
//!
//! ```
//! use glam::{IVec3, Vec3};
//! use voxterra_world::{terraform_with_history, ChunkStore, TerraformAction, TerraformBrush, TerraformConfig};
//!
//! let mut store = ChunkStore::new();
//! let brush = TerraformBrush {
//!     center: Vec3::new(4.0, 4.0, 4.0),
//!     radius: 3.0,
//!     speed: 200.0,
//!     dt: 0.016,
//!     action: TerraformAction::Build,
//!     color: 1,
//! };
//! terraform_with_history(&mut store, &brush, &TerraformConfig::default());
//!
//! assert_eq!(store.voxel_value(IVec3::new(4, 4, 4)), 3);
//! assert_eq!(store.collect_modifications().len(), 1);
//! ```

pub mod chunk;
pub mod map_file;
pub mod modification;
pub mod store;
pub mod terraform;
pub mod voxel;

pub use chunk::{AgentRef, Chunk, ChunkHistory, MAX_AGENTS_PER_CHUNK, MAX_HISTORY_ENTRIES};
pub use map_file::{load_map, load_map_file, save_map, save_map_file, MapError, MapHeader, MapLoad, MapView};
pub use modification::{ChunkModification, VoxelModification};
pub use store::{ChunkId, ChunkStore};
pub use terraform::{
    apply_density, terraform_with_history, terraform_without_history, TerraformAction, TerraformBrush,
    TerraformConfig, TerraformReport,
};
pub use voxel::{
    chunk_coord_of, chunk_origin, local_from_index, local_of, voxel_index, world_to_voxel, Voxel, CHUNK_EDGE,
    CHUNK_VOLUME, DEFAULT_SURFACE_LEVEL, HISTORY_SENTINEL,
};
