//! Voxterra game logic.
//!
//! This crate contains the deterministic simulation built on the terrain and
//! physics crates:
//!
//! - Player actions, queued per player
//! - Players with their movement state and weapons
//! - Rocks fired by the rock launcher
//! - Terraforming through the terraform tool and rock impacts
//! - Rollback snapshots and terrain sync points
//!
//! # Architecture
//!
//! All state updates are driven by player actions and a fixed timestep.
//! Every tick returns the events it produced.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Game Simulation                         │
//! │  ┌─────────┐    ┌──────────┐    ┌─────────────────────────┐  │
//! │  │ Action  │───►│ Physics  │───►│ Game State              │  │
//! │  │ Queues  │    │ (movement│    │ (players, rocks,        │  │
//! │  └─────────┘    │ collision)    │  terrain history)       │  │
//! │                 └──────────┘    └───────────┬─────────────┘  │
//! │                                             ▼                │
//! │                                      Vec<SimEvent>           │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod action;
pub mod event;
pub mod player;
pub mod projectile;
pub mod simulation;
pub mod snapshot;

// Re-export main types
pub use action::{ActionFlags, ActionQueue, PlayerAction};
pub use event::SimEvent;
pub use player::{Player, PlayerId, MAX_ROCKS_PER_PLAYER, WEAPON_COUNT, WEAPON_ROCK_LAUNCHER, WEAPON_TERRAFORM};
pub use projectile::{Rock, RockArena, RockConfig, RockDestroyReason, RockId};
pub use simulation::{Simulation, SimulationConfig};
pub use snapshot::{SimulationSnapshot, SnapshotError};

// Re-export lower layers for convenience
pub use voxterra_physics::{InteractionMode, MovementConfig, MovementState, SolverConfig};
pub use voxterra_world::{ChunkModification, ChunkStore, TerraformConfig};
