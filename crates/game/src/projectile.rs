//! Rocks: the rock launcher's projectiles.
//!
//! Rocks live in a fixed-size slot arena. Each rock remembers which player
//! fired it and which of that player's rock slots points back at it, so
//! freeing a rock can clear the owner's slot.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::player::PlayerId;

/// Rock tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RockConfig {
    /// Launch speed along the view direction (units/second).
    pub speed: f32,
    /// Gravity along the rock's `-up` (units/second²).
    pub gravity: f32,
    /// Seconds before an airborne rock expires.
    pub lifetime: f32,
    /// Collision radius against agents.
    pub radius: f32,
    /// Radius of the crater a rock leaves in terrain.
    pub blast_radius: f32,
    /// Density removed at the crater center.
    pub blast_strength: f32,
    /// Arena size shared by all players.
    pub max_rocks: usize,
}

impl Default for RockConfig {
    fn default() -> Self {
        Self {
            speed: 30.0,
            gravity: 10.0,
            lifetime: 5.0,
            radius: 0.3,
            blast_radius: 2.5,
            blast_strength: 300.0,
            max_rocks: 256,
        }
    }
}

/// Handle to a rock slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RockId(pub u32);

/// A rock in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rock {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Gravity pulls along `-up`.
    pub up: Vec3,
    pub owner: PlayerId,
    /// Weapon that fired the rock.
    pub weapon: usize,
    /// Index into the owner's rock slots.
    pub slot: usize,
    /// Seconds since launch.
    pub age: f32,
}

/// Why a rock left the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RockDestroyReason {
    Terrain,
    Agent,
    Expired,
}

/// Fixed-capacity rock storage with a free list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RockArena {
    slots: Vec<Option<Rock>>,
    free: Vec<u32>,
}

impl RockArena {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            free: (0..capacity as u32).rev().collect(),
        }
    }

    /// Store a rock. Returns `None` if every slot is taken.
    pub fn spawn(&mut self, rock: Rock) -> Option<RockId> {
        let index = self.free.pop()?;
        self.slots[index as usize] = Some(rock);
        Some(RockId(index))
    }

    /// Remove a rock, returning it.
    pub fn free(&mut self, id: RockId) -> Option<Rock> {
        let rock = self.slots.get_mut(id.0 as usize)?.take()?;
        self.free.push(id.0);
        Some(rock)
    }

    pub fn get(&self, id: RockId) -> Option<&Rock> {
        self.slots.get(id.0 as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: RockId) -> Option<&mut Rock> {
        self.slots.get_mut(id.0 as usize)?.as_mut()
    }

    /// Live rocks in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (RockId, &Rock)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|rock| (RockId(index as u32), rock)))
    }

    /// Ids of live rocks in slot order.
    pub fn ids(&self) -> Vec<RockId> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rock(owner: PlayerId) -> Rock {
        Rock {
            position: Vec3::ZERO,
            velocity: Vec3::X,
            up: Vec3::Y,
            owner,
            weapon: 1,
            slot: 0,
            age: 0.0,
        }
    }

    #[test]
    fn test_spawn_until_full() {
        let mut arena = RockArena::new(2);
        let a = arena.spawn(rock(1)).expect("slot");
        let b = arena.spawn(rock(2)).expect("slot");

        assert_ne!(a, b);
        assert!(arena.spawn(rock(3)).is_none());
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_free_recycles_slot() {
        let mut arena = RockArena::new(2);
        let a = arena.spawn(rock(1)).expect("slot");
        arena.spawn(rock(2)).expect("slot");

        assert_eq!(arena.free(a).map(|r| r.owner), Some(1));
        assert!(arena.free(a).is_none(), "double free is refused");
        assert!(arena.get(a).is_none());

        let c = arena.spawn(rock(3)).expect("freed slot reused");
        assert_eq!(c, a);
        assert_eq!(arena.get(c).map(|r| r.owner), Some(3));
    }

    #[test]
    fn test_iter_in_slot_order() {
        let mut arena = RockArena::new(4);
        for owner in 0..3 {
            arena.spawn(rock(owner));
        }
        arena.free(RockId(1));

        let owners: Vec<_> = arena.iter().map(|(_, r)| r.owner).collect();
        assert_eq!(owners, vec![0, 2]);
    }
}
