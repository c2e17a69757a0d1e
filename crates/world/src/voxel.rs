//! Voxel cells and chunk-space coordinate helpers.
//!
//! Voxels are sampled at integer world positions: the voxel with global
//! coordinate `(x, y, z)` describes the density of the terrain at world point
//! `(x, y, z)`. Chunks group `CHUNK_EDGE³` of them.

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Number of voxels along one edge of a chunk.
pub const CHUNK_EDGE: i32 = 16;

/// Number of voxels in a chunk.
pub const CHUNK_VOLUME: usize = (CHUNK_EDGE * CHUNK_EDGE * CHUNK_EDGE) as usize;

/// Pool value meaning "this voxel has no recorded history".
pub const HISTORY_SENTINEL: u8 = 255;

/// Default density at which a voxel counts as solid terrain.
pub const DEFAULT_SURFACE_LEVEL: u8 = 127;

/// A single terrain cell.
///
/// `value` is a density in `0..=254`; 255 is reserved for the history pool
/// sentinel and never written by terraforming. `color` is a packed palette
/// index and carries no meaning to the simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Voxel {
    /// Density / fill amount.
    pub value: u8,
    /// Packed color index.
    pub color: u8,
}

impl Voxel {
    /// Fully empty voxel.
    pub const EMPTY: Self = Self { value: 0, color: 0 };

    /// Largest density terraforming may produce.
    pub const MAX_VALUE: u8 = 254;

    /// Create a voxel.
    #[inline]
    pub const fn new(value: u8, color: u8) -> Self {
        Self { value, color }
    }

    /// True if both density and color are zero.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.value == 0 && self.color == 0
    }

    /// True if this voxel is at or above the given surface level.
    #[inline]
    pub fn is_solid(self, surface_level: u8) -> bool {
        self.value >= surface_level
    }
}

/// Chunk coordinate containing a global voxel coordinate.
#[inline]
pub fn chunk_coord_of(global: IVec3) -> IVec3 {
    IVec3::new(
        global.x.div_euclid(CHUNK_EDGE),
        global.y.div_euclid(CHUNK_EDGE),
        global.z.div_euclid(CHUNK_EDGE),
    )
}

/// Position of a global voxel coordinate inside its chunk (each axis `0..CHUNK_EDGE`).
#[inline]
pub fn local_of(global: IVec3) -> IVec3 {
    IVec3::new(
        global.x.rem_euclid(CHUNK_EDGE),
        global.y.rem_euclid(CHUNK_EDGE),
        global.z.rem_euclid(CHUNK_EDGE),
    )
}

/// Global coordinate of the first voxel of a chunk.
#[inline]
pub fn chunk_origin(chunk_coord: IVec3) -> IVec3 {
    chunk_coord * CHUNK_EDGE
}

/// Flat index of a local coordinate (x fastest, then y, then z).
#[inline]
pub fn voxel_index(local: IVec3) -> usize {
    (local.x + local.y * CHUNK_EDGE + local.z * CHUNK_EDGE * CHUNK_EDGE) as usize
}

/// Inverse of [`voxel_index`].
#[inline]
pub fn local_from_index(index: usize) -> IVec3 {
    let index = index as i32;
    IVec3::new(
        index % CHUNK_EDGE,
        (index / CHUNK_EDGE) % CHUNK_EDGE,
        index / (CHUNK_EDGE * CHUNK_EDGE),
    )
}

/// Nearest voxel sample to a world position.
#[inline]
pub fn world_to_voxel(position: Vec3) -> IVec3 {
    position.round().as_ivec3()
}
