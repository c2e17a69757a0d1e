//! Terraforming: spherical build/destroy sweeps over the chunk store.
//!
//! Two entry points share one sweep:
//!
//! - [`terraform_without_history`] only acts if the voxel under the brush
//!   center is already solid, and writes values directly.
//! - [`terraform_with_history`] always acts and records the original value of
//!   every voxel it touches, so the change can later be diffed
//!   ([`ChunkStore::collect_modifications`]), reverted, or forgotten
//!   ([`ChunkStore::reset_modification_tracker`]).
//!
//! Each voxel within the brush radius receives
//! `coefficient × (1 − d²/r²) × speed × dt`, where `d` is its voxel distance
//! from the brush center, and the result is rounded and clamped into
//! `0..=254`.

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::store::{ChunkId, ChunkStore};
use crate::voxel::{chunk_coord_of, local_of, voxel_index, world_to_voxel, Voxel, DEFAULT_SURFACE_LEVEL};

/// Direction of a terraform operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerraformAction {
    /// Remove density.
    Destroy,
    /// Add density.
    Build,
}

impl TerraformAction {
    /// Sign applied to the falloff.
    #[inline]
    pub fn coefficient(self) -> f32 {
        match self {
            Self::Destroy => -1.0,
            Self::Build => 1.0,
        }
    }
}

/// One application of a terraform tool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TerraformBrush {
    /// World-space center.
    pub center: Vec3,
    /// Radius in voxels.
    pub radius: f32,
    /// Density change per second at the center.
    pub speed: f32,
    /// Time this application covers (seconds).
    pub dt: f32,
    /// Build or destroy.
    pub action: TerraformAction,
    /// Color written into voxels that gain density.
    pub color: u8,
}

/// Limits for terraform sweeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerraformConfig {
    /// Density at which the brush center counts as terrain (history-less path).
    pub surface_level: u8,
    /// Brush radii are clamped to this many voxels.
    pub max_radius: f32,
    /// Distinct chunks one sweep may touch; voxels beyond are skipped.
    pub max_chunks_per_sweep: usize,
}

impl Default for TerraformConfig {
    fn default() -> Self {
        Self {
            surface_level: DEFAULT_SURFACE_LEVEL,
            max_radius: 16.0,
            max_chunks_per_sweep: 27,
        }
    }
}

/// Summary of one sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerraformReport {
    /// Voxels whose value or color changed.
    pub voxels_changed: usize,
    /// Voxels inside the radius skipped because of the chunk cap.
    pub voxels_skipped: usize,
    /// Chunk coordinates that received at least one change.
    pub changed_chunks: Vec<IVec3>,
}

impl TerraformReport {
    /// True if nothing was written.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.voxels_changed == 0
    }
}

/// Apply a brush without recording history.
///
/// Returns an empty report, without touching any chunk, if the voxel at the
/// brush center is below the surface level.
pub fn terraform_without_history(
    store: &mut ChunkStore,
    brush: &TerraformBrush,
    config: &TerraformConfig,
) -> TerraformReport {
    let center = world_to_voxel(brush.center);
    if store.voxel_value(center) < config.surface_level {
        return TerraformReport::default();
    }
    sweep(store, brush, config, false)
}

/// Apply a brush, recording the original value of every voxel it changes.
pub fn terraform_with_history(
    store: &mut ChunkStore,
    brush: &TerraformBrush,
    config: &TerraformConfig,
) -> TerraformReport {
    sweep(store, brush, config, true)
}

/// New value for a voxel receiving `amount` density.
#[inline]
pub fn apply_density(value: u8, amount: f32) -> u8 {
    (value as f32 + amount)
        .round()
        .clamp(0.0, Voxel::MAX_VALUE as f32) as u8
}

fn sweep(
    store: &mut ChunkStore,
    brush: &TerraformBrush,
    config: &TerraformConfig,
    record_history: bool,
) -> TerraformReport {
    let mut report = TerraformReport::default();

    let radius = brush.radius.min(config.max_radius);
    if !(radius > 0.0) {
        return report;
    }

    let center = world_to_voxel(brush.center);
    let reach = radius.ceil() as i32;
    let radius_sq = radius * radius;
    let scale = brush.action.coefficient() * brush.speed * brush.dt;

    let mut active: Option<(IVec3, ChunkId)> = None;
    let mut touched: Vec<IVec3> = Vec::new();

    for dz in -reach..=reach {
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let offset = IVec3::new(dx, dy, dz);
                let distance_sq = offset.length_squared() as f32;
                if distance_sq > radius_sq {
                    continue;
                }

                let global = center + offset;
                let chunk_coord = chunk_coord_of(global);

                let id = match active {
                    Some((coord, id)) if coord == chunk_coord => id,
                    _ => {
                        if !touched.contains(&chunk_coord) {
                            if touched.len() >= config.max_chunks_per_sweep {
                                report.voxels_skipped += 1;
                                continue;
                            }
                            touched.push(chunk_coord);
                        }
                        let id = store.get_chunk_id(chunk_coord);
                        active = Some((chunk_coord, id));
                        id
                    }
                };

                let proportion = 1.0 - distance_sq / radius_sq;
                let index = voxel_index(local_of(global));

                let Some(chunk) = store.chunk_mut(id) else {
                    continue;
                };
                let old = chunk.voxel(index);
                let value = apply_density(old.value, proportion * scale);

                let color = if value == 0 {
                    0
                } else if value > old.value {
                    brush.color
                } else {
                    old.color
                };

                let new = Voxel::new(value, color);
                if new == old {
                    continue;
                }

                let first_modification = record_history && chunk.history_mut().record(index, old);
                chunk.set_voxel(index, new);

                if first_modification {
                    store.mark_modified(id);
                }

                report.voxels_changed += 1;
                if !report.changed_chunks.contains(&chunk_coord) {
                    report.changed_chunks.push(chunk_coord);
                }
            }
        }
    }

    if report.voxels_skipped > 0 {
        log::debug!(
            "terraform sweep at {:?} skipped {} voxels beyond {} chunks",
            center,
            report.voxels_skipped,
            config.max_chunks_per_sweep
        );
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brush(center: Vec3, radius: f32, speed: f32, dt: f32, action: TerraformAction) -> TerraformBrush {
        TerraformBrush {
            center,
            radius,
            speed,
            dt,
            action,
            color: 9,
        }
    }

    #[test]
    fn test_build_raises_center_by_rounded_amount() {
        let mut store = ChunkStore::new();
        let config = TerraformConfig::default();

        let report = terraform_with_history(
            &mut store,
            &brush(Vec3::new(4.0, 4.0, 4.0), 3.0, 200.0, 0.016, TerraformAction::Build),
            &config,
        );

        // round(1.0 * 200 * 0.016) = round(3.2) = 3
        assert_eq!(store.voxel(IVec3::new(4, 4, 4)), Voxel::new(3, 9));
        assert!(report.voxels_changed > 0);
        assert_eq!(report.changed_chunks, vec![IVec3::ZERO]);
    }

    #[test]
    fn test_values_stay_clamped() {
        let mut store = ChunkStore::new();
        let config = TerraformConfig::default();
        let center = Vec3::new(8.0, 8.0, 8.0);

        for _ in 0..3 {
            terraform_with_history(&mut store, &brush(center, 2.0, 1.0e9, 1.0, TerraformAction::Build), &config);
        }
        assert_eq!(store.voxel_value(IVec3::splat(8)), Voxel::MAX_VALUE);

        for _ in 0..3 {
            terraform_with_history(&mut store, &brush(center, 2.0, 1.0e9, 1.0, TerraformAction::Destroy), &config);
        }
        assert_eq!(store.voxel(IVec3::splat(8)), Voxel::EMPTY);

        let chunk = store.access_chunk(IVec3::ZERO).expect("chunk exists");
        assert!(chunk.voxels().iter().all(|voxel| voxel.value <= Voxel::MAX_VALUE));
    }

    #[test]
    fn test_apply_density_extremes() {
        assert_eq!(apply_density(10, f32::MAX), 254);
        assert_eq!(apply_density(10, -f32::MAX), 0);
        assert_eq!(apply_density(10, 0.4), 10);
        assert_eq!(apply_density(10, 0.6), 11);
    }

    #[test]
    fn test_without_history_requires_solid_center() {
        let mut store = ChunkStore::new();
        let config = TerraformConfig::default();
        let b = brush(Vec3::ZERO, 2.0, 100.0, 1.0, TerraformAction::Destroy);

        let report = terraform_without_history(&mut store, &b, &config);
        assert!(report.is_empty());
        assert!(store.is_empty(), "pre-check must not allocate chunks");

        store.set_voxel(IVec3::ZERO, Voxel::new(200, 1));
        let report = terraform_without_history(&mut store, &b, &config);
        assert!(!report.is_empty());
        assert_eq!(store.voxel_value(IVec3::ZERO), 100);
        assert!(store.modified_chunks().is_empty());
    }

    #[test]
    fn test_sweep_crosses_chunk_boundary() {
        let mut store = ChunkStore::new();
        let config = TerraformConfig::default();

        let report = terraform_with_history(
            &mut store,
            &brush(Vec3::new(0.0, 0.0, 0.0), 2.0, 100.0, 1.0, TerraformAction::Build),
            &config,
        );

        // Center at a chunk corner reaches into all 8 surrounding chunks
        assert_eq!(report.changed_chunks.len(), 8);
        assert_eq!(store.modified_chunks().len(), 8);
        assert!(store.voxel_value(IVec3::new(-1, -1, -1)) > 0);
    }

    #[test]
    fn test_chunk_cap_skips_voxels() {
        let mut store = ChunkStore::new();
        let config = TerraformConfig {
            max_chunks_per_sweep: 1,
            ..Default::default()
        };

        let report = terraform_with_history(
            &mut store,
            &brush(Vec3::ZERO, 2.0, 100.0, 1.0, TerraformAction::Build),
            &config,
        );

        assert_eq!(report.changed_chunks.len(), 1);
        assert!(report.voxels_skipped > 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_history_records_original_once() {
        let mut store = ChunkStore::new();
        let config = TerraformConfig::default();
        store.set_voxel(IVec3::splat(5), Voxel::new(50, 2));
        let b = brush(Vec3::splat(5.0), 1.0, 10.0, 1.0, TerraformAction::Build);

        terraform_with_history(&mut store, &b, &config);
        terraform_with_history(&mut store, &b, &config);

        let chunk = store.access_chunk(IVec3::ZERO).expect("chunk exists");
        let index = voxel_index(IVec3::splat(5));
        assert_eq!(chunk.history().original(index), Some(50));
        assert_eq!(chunk.voxel(index).value, 70);
        assert_eq!(store.modified_chunks().len(), 1);

        let stack = chunk.history().stack();
        let mut unique = stack.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), stack.len(), "indices appear at most once");
    }

    #[test]
    fn test_reset_clears_every_touched_entry() {
        let mut store = ChunkStore::new();
        let config = TerraformConfig::default();

        terraform_with_history(
            &mut store,
            &brush(Vec3::new(15.0, 15.0, 15.0), 4.0, 300.0, 1.0, TerraformAction::Build),
            &config,
        );
        let touched: Vec<(IVec3, Vec<u16>)> = store
            .iter()
            .map(|chunk| (chunk.coord(), chunk.history().stack().to_vec()))
            .collect();
        assert!(touched.iter().any(|(_, stack)| !stack.is_empty()));

        store.reset_modification_tracker();

        assert!(store.modified_chunks().is_empty());
        for (coord, stack) in touched {
            let chunk = store.access_chunk(coord).expect("chunk exists");
            assert_eq!(chunk.history().modification_count(), 0);
            assert!(!chunk.history().made_modification());
            for index in stack {
                assert_eq!(chunk.history().original(index as usize), None);
            }
        }

        // A new cycle registers chunks again
        terraform_with_history(
            &mut store,
            &brush(Vec3::new(15.0, 15.0, 15.0), 1.0, 10.0, 1.0, TerraformAction::Destroy),
            &config,
        );
        assert!(!store.modified_chunks().is_empty());
    }
}
