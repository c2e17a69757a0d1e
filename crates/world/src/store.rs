//! Sparse chunk storage.
//!
//! Chunks live in a contiguous arena owned by [`ChunkStore`]; everything else
//! refers to them through [`ChunkId`] handles. A hash index maps chunk
//! coordinates to arena slots.
//!
//! # Lifetime
//!
//! Chunks are created lazily by [`ChunkStore::get_chunk`] and are never
//! destroyed individually. [`ChunkStore::clear`] drops them all at once and
//! advances the store generation, so handles taken before the clear resolve
//! to `None` afterwards instead of aliasing new chunks.

use glam::IVec3;
use rustc_hash::FxHashMap;

use crate::chunk::Chunk;
use crate::voxel::{chunk_coord_of, local_of, voxel_index, Voxel};

/// Handle to a chunk inside a [`ChunkStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId {
    index: u32,
    generation: u32,
}

impl ChunkId {
    /// Arena slot of this chunk.
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// Owner of all terrain chunks.
#[derive(Debug, Default)]
pub struct ChunkStore {
    chunks: Vec<Chunk>,
    index: FxHashMap<IVec3, u32>,
    generation: u32,
    modified: Vec<ChunkId>,
}

impl ChunkStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of allocated chunks.
    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// True if no chunk was allocated.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Iterate chunks in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    /// Handle of the chunk at `coord`, allocating a zeroed chunk if needed.
    pub fn get_chunk_id(&mut self, coord: IVec3) -> ChunkId {
        let generation = self.generation;
        let chunks = &mut self.chunks;
        let index = *self.index.entry(coord).or_insert_with(|| {
            chunks.push(Chunk::new(coord));
            (chunks.len() - 1) as u32
        });
        ChunkId { index, generation }
    }

    /// Chunk at `coord`, allocating a zeroed chunk if needed. Never fails.
    pub fn get_chunk(&mut self, coord: IVec3) -> &mut Chunk {
        let id = self.get_chunk_id(coord);
        &mut self.chunks[id.index()]
    }

    /// Chunk at `coord` if it exists. Never allocates.
    pub fn access_chunk(&self, coord: IVec3) -> Option<&Chunk> {
        self.index.get(&coord).map(|&index| &self.chunks[index as usize])
    }

    /// Mutable chunk at `coord` if it exists. Never allocates.
    pub fn access_chunk_mut(&mut self, coord: IVec3) -> Option<&mut Chunk> {
        let index = *self.index.get(&coord)?;
        Some(&mut self.chunks[index as usize])
    }

    /// Handle of the chunk at `coord` if it exists.
    pub fn chunk_id(&self, coord: IVec3) -> Option<ChunkId> {
        self.index.get(&coord).map(|&index| ChunkId {
            index,
            generation: self.generation,
        })
    }

    /// Resolve a handle. Returns `None` for handles from before the last clear.
    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        if id.generation != self.generation {
            return None;
        }
        self.chunks.get(id.index())
    }

    /// Resolve a handle mutably. Returns `None` for handles from before the last clear.
    pub fn chunk_mut(&mut self, id: ChunkId) -> Option<&mut Chunk> {
        if id.generation != self.generation {
            return None;
        }
        self.chunks.get_mut(id.index())
    }

    /// Voxel at a global coordinate; missing chunks read as empty.
    pub fn voxel(&self, global: IVec3) -> Voxel {
        self.access_chunk(chunk_coord_of(global))
            .map(|chunk| chunk.voxel(voxel_index(local_of(global))))
            .unwrap_or(Voxel::EMPTY)
    }

    /// Density at a global coordinate; missing chunks read as 0.
    #[inline]
    pub fn voxel_value(&self, global: IVec3) -> u8 {
        self.voxel(global).value
    }

    /// Overwrite a voxel at a global coordinate without recording history.
    pub fn set_voxel(&mut self, global: IVec3, voxel: Voxel) {
        self.get_chunk(chunk_coord_of(global))
            .set_voxel(voxel_index(local_of(global)), voxel);
    }

    /// Drop every chunk. Invalidates all outstanding [`ChunkId`]s.
    pub fn clear(&mut self) {
        log::info!("clearing chunk store ({} chunks)", self.chunks.len());
        self.chunks.clear();
        self.index.clear();
        self.modified.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    // ========================================================================
    // Modification tracking
    // ========================================================================

    /// Chunks modified with history since the last reset, in first-touch order.
    pub fn modified_chunks(&self) -> &[ChunkId] {
        &self.modified
    }

    pub(crate) fn mark_modified(&mut self, id: ChunkId) {
        debug_assert!(!self.modified.contains(&id));
        self.modified.push(id);
    }

    /// Forget all recorded history and empty the modified-chunk list.
    ///
    /// Called at each synchronization point once the changes since the previous
    /// one have been collected.
    pub fn reset_modification_tracker(&mut self) {
        let modified = std::mem::take(&mut self.modified);
        for id in modified {
            if let Some(chunk) = self.chunk_mut(id) {
                chunk.history_mut().reset();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_chunk_creates_once() {
        let mut store = ChunkStore::new();
        let a = store.get_chunk_id(IVec3::new(1, 2, 3));
        let b = store.get_chunk_id(IVec3::new(1, 2, 3));
        let c = store.get_chunk_id(IVec3::new(-1, 2, 3));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.len(), 2);
        assert_eq!(store.chunk(a).map(|chunk| chunk.coord()), Some(IVec3::new(1, 2, 3)));
    }

    #[test]
    fn test_access_chunk_does_not_allocate() {
        let mut store = ChunkStore::new();
        assert!(store.access_chunk(IVec3::ZERO).is_none());
        assert!(store.access_chunk_mut(IVec3::ZERO).is_none());
        assert!(store.chunk_id(IVec3::ZERO).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_voxel_across_chunks() {
        let mut store = ChunkStore::new();
        store.set_voxel(IVec3::new(-1, 0, 0), Voxel::new(200, 4));
        store.set_voxel(IVec3::new(16, 0, 0), Voxel::new(100, 5));

        assert_eq!(store.voxel(IVec3::new(-1, 0, 0)), Voxel::new(200, 4));
        assert_eq!(store.voxel_value(IVec3::new(16, 0, 0)), 100);
        assert_eq!(store.voxel_value(IVec3::new(500, 0, 0)), 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let mut store = ChunkStore::new();
        let id = store.get_chunk_id(IVec3::ZERO);
        store.clear();

        assert!(store.chunk(id).is_none());
        let fresh = store.get_chunk_id(IVec3::ZERO);
        assert_ne!(id, fresh);
        assert!(store.chunk(fresh).is_some());
    }
}
