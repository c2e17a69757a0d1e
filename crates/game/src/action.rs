//! Player action records.
//!
//! A [`PlayerAction`] is everything a client sends for one tick: the held
//! buttons as an [`ActionFlags`] bitfield, the look direction, and timing.
//! Actions wait in a bounded [`ActionQueue`] until the simulation consumes
//! them.

use std::collections::VecDeque;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use voxterra_physics::MovementInput;

/// Buttons held during a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionFlags(pub u16);

impl ActionFlags {
    pub const FORWARD: u16 = 1 << 0;
    pub const BACKWARD: u16 = 1 << 1;
    pub const LEFT: u16 = 1 << 2;
    pub const RIGHT: u16 = 1 << 3;
    pub const JUMP: u16 = 1 << 4;
    pub const CROUCH: u16 = 1 << 5;

    /// Fire / destroy terrain.
    pub const TRIGGER_PRIMARY: u16 = 1 << 6;
    /// Build terrain.
    pub const TRIGGER_SECONDARY: u16 = 1 << 7;

    /// Start or reverse the standing ↔ ball switch.
    pub const SWITCH_SHAPE: u16 = 1 << 8;
    /// Enter or leave spectator floating.
    pub const TOGGLE_FLOATING: u16 = 1 << 9;

    pub const NEXT_WEAPON: u16 = 1 << 10;
    pub const PREVIOUS_WEAPON: u16 = 1 << 11;

    const MOVEMENT_MAP: [(u16, u8); 6] = [
        (Self::FORWARD, MovementInput::FORWARD),
        (Self::BACKWARD, MovementInput::BACKWARD),
        (Self::LEFT, MovementInput::LEFT),
        (Self::RIGHT, MovementInput::RIGHT),
        (Self::JUMP, MovementInput::JUMP),
        (Self::CROUCH, MovementInput::CROUCH),
    ];

    /// Create from raw bits.
    #[inline]
    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    #[inline]
    pub fn has(self, flag: u16) -> bool {
        (self.0 & flag) != 0
    }

    #[inline]
    pub fn set(&mut self, flag: u16, value: bool) {
        if value {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }

    /// Flags set in `self` but not in `previous`.
    #[inline]
    pub fn pressed_since(self, previous: ActionFlags) -> ActionFlags {
        Self(self.0 & !previous.0)
    }

    /// Movement buttons only.
    pub fn movement(self) -> MovementInput {
        let mut input = MovementInput::default();
        for (flag, movement) in Self::MOVEMENT_MAP {
            input.set(movement, self.has(flag));
        }
        input
    }
}

/// One tick of input from a player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerAction {
    pub flags: ActionFlags,

    /// Unit look direction.
    pub view_direction: Vec3,

    /// Time step this action covers (seconds).
    pub dt: f32,

    /// Terraform time accumulated by the sender while a trigger was held.
    ///
    /// Zero means the simulation accumulates `dt` itself. A non-zero value
    /// replaces local accumulation, so a replayed action reproduces exactly
    /// the terraform the sender saw.
    pub accumulated_dt: f32,
}

impl PlayerAction {
    /// Action with no buttons held.
    pub fn idle(view_direction: Vec3, dt: f32) -> Self {
        Self {
            flags: ActionFlags::default(),
            view_direction,
            dt,
            accumulated_dt: 0.0,
        }
    }

    /// Action holding the given buttons.
    pub fn new(flags: u16, view_direction: Vec3, dt: f32) -> Self {
        Self {
            flags: ActionFlags(flags),
            ..Self::idle(view_direction, dt)
        }
    }
}

/// Bounded FIFO of pending actions.
#[derive(Debug, Clone)]
pub struct ActionQueue {
    actions: VecDeque<PlayerAction>,
    capacity: usize,
}

impl ActionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            actions: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an action. When the queue is full the action is dropped, a
    /// warning is logged, and false is returned.
    pub fn push(&mut self, action: PlayerAction) -> bool {
        if self.actions.len() >= self.capacity {
            log::warn!("action queue full ({} actions), dropping newest", self.capacity);
            return false;
        }
        self.actions.push_back(action);
        true
    }

    /// Oldest pending action.
    pub fn pop(&mut self) -> Option<PlayerAction> {
        self.actions.pop_front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }
}
