//! Binary rollback snapshots.
//!
//! A snapshot holds the agent and projectile state of a simulation. Terrain
//! is not included: it is rolled back through the chunk history instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::player::Player;
use crate::projectile::RockArena;

/// Errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

/// Agent and projectile state at one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub frame: u64,
    pub players: Vec<Player>,
    pub rocks: RockArena,
}

/// Encode a snapshot to bytes.
pub fn encode(snapshot: &SimulationSnapshot) -> Result<Vec<u8>, SnapshotError> {
    Ok(bincode::serde::encode_to_vec(snapshot, bincode::config::standard())?)
}

/// Decode a snapshot from bytes.
pub fn decode(data: &[u8]) -> Result<SimulationSnapshot, SnapshotError> {
    let (snapshot, _) = bincode::serde::decode_from_slice(data, bincode::config::standard())?;
    Ok(snapshot)
}
