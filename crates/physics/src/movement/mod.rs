//! Agent movement.
//!
//! Each tick the [`MovementController`] turns held buttons into velocity,
//! applies gravity and friction, and moves the agent's collision shape
//! through the terrain with the collide-and-slide solver.
//!
//! Agents are in one of four [`InteractionMode`]s. Spawning agents fall in
//! as meteorites and stand up where they land; standing agents can roll up
//! into a ball through a timed [`ShapeSwitch`]; spectators float through
//! the terrain.
//!
//! All movement is deterministic: the same inputs on the same terrain always
//! produce the same state.

mod config;
mod controller;
mod state;

pub use config::MovementConfig;
pub use controller::{MovementController, MovementOutcome};
pub use state::{InteractionMode, MovementInput, MovementState, ShapeSwitch};
