//! Player entity and state.

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};
use voxterra_physics::{InteractionMode, MovementState};

use crate::action::ActionFlags;
use crate::projectile::RockId;

/// Unique identifier for players.
pub type PlayerId = u32;

/// Terraform tool: primary destroys, secondary builds.
pub const WEAPON_TERRAFORM: usize = 0;
/// Rock launcher: primary fires a rock.
pub const WEAPON_ROCK_LAUNCHER: usize = 1;
pub const WEAPON_COUNT: usize = 2;

/// Rocks one player may have in flight.
pub const MAX_ROCKS_PER_PLAYER: usize = 4;

/// A player in the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,

    pub name: String,

    /// Movement physics state.
    pub movement: MovementState,

    /// Color written into terrain this player builds.
    pub color: u8,

    /// Currently equipped weapon index.
    pub weapon: usize,

    /// Rocks in flight, by slot.
    pub rocks: [Option<RockId>; MAX_ROCKS_PER_PLAYER],

    /// Terraform time held since the last applied terraform.
    pub terraform_dt: f32,

    /// Buttons held on the previous tick, for press detection.
    pub held: ActionFlags,

    /// Chunk this player is registered in.
    pub chunk: Option<IVec3>,
}

impl Player {
    /// Create a player falling in as a meteorite at `spawn_position`.
    pub fn new(id: PlayerId, name: String, spawn_position: Vec3) -> Self {
        Self {
            id,
            name,
            movement: MovementState::new(spawn_position, InteractionMode::Meteorite),
            color: (id % 254 + 1) as u8,
            weapon: WEAPON_TERRAFORM,
            rocks: [None; MAX_ROCKS_PER_PLAYER],
            terraform_dt: 0.0,
            held: ActionFlags::default(),
            chunk: None,
        }
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.movement.position
    }

    #[inline]
    pub fn mode(&self) -> InteractionMode {
        self.movement.mode
    }

    /// Step the weapon index forward or back, wrapping around.
    pub fn cycle_weapon(&mut self, forward: bool) {
        self.weapon = if forward {
            (self.weapon + 1) % WEAPON_COUNT
        } else {
            (self.weapon + WEAPON_COUNT - 1) % WEAPON_COUNT
        };
    }

    /// First empty rock slot.
    pub fn free_rock_slot(&self) -> Option<usize> {
        self.rocks.iter().position(Option::is_none)
    }

    /// Clear a rock slot if it still points at `rock`.
    pub fn release_rock(&mut self, slot: usize, rock: RockId) {
        if let Some(entry) = self.rocks.get_mut(slot) {
            if *entry == Some(rock) {
                *entry = None;
            }
        }
    }

    /// Add `dt` to the terraform accumulator and take it once
    /// `speed × accumulated ≥ 1`, which is the smallest change a voxel can show.
    pub fn accumulate_terraform(&mut self, dt: f32, speed: f32) -> Option<f32> {
        self.terraform_dt += dt;
        if speed * self.terraform_dt < 1.0 {
            return None;
        }
        Some(std::mem::take(&mut self.terraform_dt))
    }
}
