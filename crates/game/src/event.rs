//! Notifications produced by a simulation tick.

use glam::IVec3;
use serde::{Deserialize, Serialize};
use voxterra_physics::InteractionMode;

use crate::player::PlayerId;
use crate::projectile::{RockDestroyReason, RockId};

/// Something that happened during [`Simulation::tick`](crate::Simulation::tick).
///
/// Events are returned in the order they occurred.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    ModeChanged {
        player: PlayerId,
        from: InteractionMode,
        to: InteractionMode,
    },
    /// A player touched terrain after being airborne.
    Landed { player: PlayerId },
    /// Terraforming changed at least one voxel of a chunk.
    TerrainModified { chunk: IVec3 },
    RockFired { player: PlayerId, rock: RockId },
    RockDestroyed { rock: RockId, reason: RockDestroyReason },
    /// A rock fired by `shooter` struck `target`.
    AgentHit { shooter: PlayerId, target: PlayerId },
    /// An action was refused because the player's queue was full.
    ActionDropped { player: PlayerId },
}
