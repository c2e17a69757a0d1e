//! Fixed-size voxel chunks and their modification history.

use glam::IVec3;
use serde::{Deserialize, Serialize};

use crate::voxel::{
    chunk_origin, voxel_index, Voxel, CHUNK_EDGE, CHUNK_VOLUME, HISTORY_SENTINEL,
};

/// Maximum number of agents tracked per chunk.
pub const MAX_AGENTS_PER_CHUNK: usize = 16;

/// Capacity of the per-chunk modification stack.
pub const MAX_HISTORY_ENTRIES: usize = CHUNK_VOLUME / 2;

/// Reference to an agent (player) located inside a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentRef(pub u32);

/// Pre-modification values of a chunk's voxels.
///
/// The pool holds, for each voxel, the value it had before the first
/// modification since the last reset, or [`HISTORY_SENTINEL`] if it is
/// untouched. The color it had is kept alongside and is only meaningful
/// while the value entry is set. The stack lists touched indices in the order they were first
/// modified so a reset only has to visit those.
///
/// Once the stack is full, further first touches are still written to the
/// pool and the history is marked as overflowed; readers and resets then scan
/// the whole pool.
#[derive(Debug, Clone)]
pub struct ChunkHistory {
    pool: Box<[u8]>,
    colors: Box<[u8]>,
    stack: Vec<u16>,
    overflowed: bool,
    made_modification: bool,
}

impl Default for ChunkHistory {
    fn default() -> Self {
        Self {
            pool: vec![HISTORY_SENTINEL; CHUNK_VOLUME].into_boxed_slice(),
            colors: vec![0; CHUNK_VOLUME].into_boxed_slice(),
            stack: Vec::new(),
            overflowed: false,
            made_modification: false,
        }
    }
}

impl ChunkHistory {
    /// Original value recorded for a voxel, if it was modified since the last reset.
    #[inline]
    pub fn original(&self, index: usize) -> Option<u8> {
        match self.pool[index] {
            HISTORY_SENTINEL => None,
            value => Some(value),
        }
    }

    /// Original voxel, color included, if it was modified since the last reset.
    #[inline]
    pub fn original_voxel(&self, index: usize) -> Option<Voxel> {
        self.original(index).map(|value| Voxel::new(value, self.colors[index]))
    }

    /// Whether the chunk was modified since the last reset.
    #[inline]
    pub fn made_modification(&self) -> bool {
        self.made_modification
    }

    /// Number of entries on the modification stack.
    #[inline]
    pub fn modification_count(&self) -> usize {
        self.stack.len()
    }

    /// Whether modifications spilled past the stack capacity.
    #[inline]
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Indices of the modification stack, oldest first.
    pub fn stack(&self) -> &[u16] {
        &self.stack
    }

    /// Every voxel index with a recorded original value.
    pub fn recorded_indices(&self) -> Vec<usize> {
        if self.overflowed {
            (0..CHUNK_VOLUME)
                .filter(|&index| self.pool[index] != HISTORY_SENTINEL)
                .collect()
        } else {
            self.stack.iter().map(|&index| index as usize).collect()
        }
    }

    /// Record the original value and color of a voxel about to be overwritten.
    ///
    /// Does nothing if the voxel already has a recorded original. Returns true
    /// when this is the chunk's first modification since the last reset.
    pub fn record(&mut self, index: usize, original: Voxel) -> bool {
        if self.pool[index] != HISTORY_SENTINEL {
            return false;
        }

        self.pool[index] = original.value.min(Voxel::MAX_VALUE);
        self.colors[index] = original.color;
        if self.stack.len() < MAX_HISTORY_ENTRIES {
            self.stack.push(index as u16);
        } else {
            self.overflowed = true;
        }

        let first = !self.made_modification;
        self.made_modification = true;
        first
    }

    /// Forget all recorded originals.
    pub fn reset(&mut self) {
        if self.overflowed {
            self.pool.fill(HISTORY_SENTINEL);
        } else {
            for &index in &self.stack {
                self.pool[index as usize] = HISTORY_SENTINEL;
            }
        }
        self.stack.clear();
        self.overflowed = false;
        self.made_modification = false;
    }
}

/// A cube of `CHUNK_EDGE³` voxels.
#[derive(Debug, Clone)]
pub struct Chunk {
    coord: IVec3,
    voxels: Box<[Voxel]>,
    agents: Vec<AgentRef>,
    history: ChunkHistory,
}

impl Chunk {
    /// Create a zero-filled chunk at the given chunk coordinate.
    pub fn new(coord: IVec3) -> Self {
        Self {
            coord,
            voxels: vec![Voxel::EMPTY; CHUNK_VOLUME].into_boxed_slice(),
            agents: Vec::with_capacity(MAX_AGENTS_PER_CHUNK),
            history: ChunkHistory::default(),
        }
    }

    /// Chunk coordinate.
    #[inline]
    pub fn coord(&self) -> IVec3 {
        self.coord
    }

    /// Global voxel coordinate of local `(0, 0, 0)`.
    #[inline]
    pub fn origin(&self) -> IVec3 {
        chunk_origin(self.coord)
    }

    /// Voxel at a flat index.
    #[inline]
    pub fn voxel(&self, index: usize) -> Voxel {
        self.voxels[index]
    }

    /// Voxel at a local coordinate (each axis `0..CHUNK_EDGE`).
    #[inline]
    pub fn voxel_at(&self, local: IVec3) -> Voxel {
        debug_assert!(local.cmpge(IVec3::ZERO).all() && local.cmplt(IVec3::splat(CHUNK_EDGE)).all());
        self.voxels[voxel_index(local)]
    }

    /// Overwrite a voxel without touching history.
    #[inline]
    pub fn set_voxel(&mut self, index: usize, voxel: Voxel) {
        self.voxels[index] = voxel;
    }

    /// All voxels in index order.
    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    /// True if every voxel is fully empty.
    pub fn is_empty(&self) -> bool {
        self.voxels.iter().all(|voxel| voxel.is_empty())
    }

    /// Agents currently registered inside this chunk.
    pub fn agents(&self) -> &[AgentRef] {
        &self.agents
    }

    /// Register an agent. Returns false if the list is full.
    pub fn add_agent(&mut self, agent: AgentRef) -> bool {
        if self.agents.contains(&agent) {
            return true;
        }
        if self.agents.len() >= MAX_AGENTS_PER_CHUNK {
            return false;
        }
        self.agents.push(agent);
        true
    }

    /// Unregister an agent. Returns false if it was not registered.
    pub fn remove_agent(&mut self, agent: AgentRef) -> bool {
        match self.agents.iter().position(|&a| a == agent) {
            Some(slot) => {
                self.agents.swap_remove(slot);
                true
            }
            None => false,
        }
    }

    /// Modification history.
    pub fn history(&self) -> &ChunkHistory {
        &self.history
    }

    pub(crate) fn history_mut(&mut self) -> &mut ChunkHistory {
        &mut self.history
    }
}
