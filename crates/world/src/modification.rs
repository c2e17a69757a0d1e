//! Chunk modification records.
//!
//! A [`ChunkModification`] lists, for one chunk, every voxel changed since the
//! last synchronization point together with its value before and after. The
//! server sends these to clients, which use them both to interpolate
//! in-flight terraforming and to reconcile their predicted terrain with the
//! authoritative one.

use glam::IVec3;
use serde::{Deserialize, Serialize};

use crate::store::ChunkStore;
use crate::terraform::apply_density;
use crate::voxel::Voxel;

/// Change of a single voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoxelModification {
    /// Flat index inside the chunk.
    pub index: u16,
    /// Value at the last synchronization point.
    pub initial: u8,
    /// Current value.
    pub final_value: u8,
    /// Current color.
    pub color: u8,
}

/// All voxel changes of one chunk since the last synchronization point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkModification {
    /// Chunk coordinate.
    pub coord: IVec3,
    /// Changed voxels, in first-modification order.
    pub voxels: Vec<VoxelModification>,
}

impl ChunkModification {
    /// Write this modification into a store.
    ///
    /// `progress` blends from the initial (`0.0`) to the final (`1.0`) value,
    /// which lets a client animate terraforming it learned about late. Writes
    /// bypass history. Missing chunks are created.
    pub fn apply(&self, store: &mut ChunkStore, progress: f32) {
        let progress = progress.clamp(0.0, 1.0);
        let chunk = store.get_chunk(self.coord);

        for voxel in &self.voxels {
            let delta = (voxel.final_value as f32 - voxel.initial as f32) * progress;
            let value = apply_density(voxel.initial, delta);
            let color = if value == 0 { 0 } else { voxel.color };
            chunk.set_voxel(voxel.index as usize, Voxel::new(value, color));
        }
    }

    /// True if no voxel in the record changed value.
    pub fn is_noop(&self) -> bool {
        self.voxels.iter().all(|v| v.initial == v.final_value)
    }
}

impl ChunkStore {
    /// Modification records for every chunk changed with history since the
    /// last reset, in first-touch order.
    pub fn collect_modifications(&self) -> Vec<ChunkModification> {
        self.modified_chunks()
            .iter()
            .filter_map(|&id| self.chunk(id))
            .map(|chunk| {
                let history = chunk.history();
                let voxels = history
                    .recorded_indices()
                    .into_iter()
                    .filter_map(|index| {
                        let initial = history.original(index)?;
                        let current = chunk.voxel(index);
                        Some(VoxelModification {
                            index: index as u16,
                            initial,
                            final_value: current.value,
                            color: current.color,
                        })
                    })
                    .collect();

                ChunkModification {
                    coord: chunk.coord(),
                    voxels,
                }
            })
            .collect()
    }

    /// Restore every recorded original value, then reset the tracker.
    ///
    /// Used to roll terrain back to the last synchronization point.
    pub fn revert_modifications(&mut self) {
        let modified = self.modified_chunks().to_vec();
        for id in modified {
            let Some(chunk) = self.chunk_mut(id) else {
                continue;
            };
            for index in chunk.history().recorded_indices() {
                if let Some(original) = chunk.history().original_voxel(index) {
                    chunk.set_voxel(index, original);
                }
            }
        }
        self.reset_modification_tracker();
    }
}
