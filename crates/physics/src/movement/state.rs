//! Movement state and input structures.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// How an agent interacts with the terrain.
///
/// Transitions:
///
/// ```text
/// Meteorite --contact--> Standing <--timed switch--> Ball
///                           ^ |
///             request_mode  | v  request_mode
///                         Floating
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionMode {
    /// Spawning: falls ballistically until it hits terrain.
    #[default]
    Meteorite,
    /// Walking on the terrain with an ellipsoid shape.
    Standing,
    /// Rolling; `up` follows the contact normal.
    Ball,
    /// Spectating: no gravity, no collision.
    Floating,
}

/// Timed standing ↔ ball transition.
///
/// The agent keeps its `from` mode until the switch completes; only its
/// collision shape blends in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeSwitch {
    pub from: InteractionMode,
    pub to: InteractionMode,
    pub elapsed: f32,
    pub duration: f32,
}

impl ShapeSwitch {
    pub fn new(from: InteractionMode, to: InteractionMode, duration: f32) -> Self {
        Self {
            from,
            to,
            elapsed: 0.0,
            duration,
        }
    }

    /// Completion in `0.0..=1.0`.
    #[inline]
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Turn around mid-way, keeping the blended shape continuous.
    pub fn reverse(&mut self) {
        std::mem::swap(&mut self.from, &mut self.to);
        self.elapsed = (self.duration - self.elapsed).max(0.0);
    }
}

/// Movement buttons held during a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementInput(pub u8);

impl MovementInput {
    pub const FORWARD: u8 = 1 << 0;
    pub const BACKWARD: u8 = 1 << 1;
    pub const LEFT: u8 = 1 << 2;
    pub const RIGHT: u8 = 1 << 3;
    /// Accelerate along `up`.
    pub const JUMP: u8 = 1 << 4;
    /// Accelerate along `-up`.
    pub const CROUCH: u8 = 1 << 5;

    #[inline]
    pub fn has(self, flag: u8) -> bool {
        (self.0 & flag) != 0
    }

    #[inline]
    pub fn set(&mut self, flag: u8, value: bool) {
        if value {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Complete movement state for an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementState {
    /// Center of the collision shape in world space.
    pub position: Vec3,

    /// Unit look direction.
    pub view_direction: Vec3,

    /// Unit "up" of the agent. Gravity pulls along `-up`.
    pub up: Vec3,

    /// Velocity in world space (units/second).
    pub velocity: Vec3,

    /// Normal of the last terrain contact.
    pub surface_normal: Vec3,

    /// Whether the last update ended in contact with terrain.
    pub grounded: bool,

    pub mode: InteractionMode,

    /// In-progress standing ↔ ball transition.
    pub shape_switch: Option<ShapeSwitch>,
}

impl Default for MovementState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            view_direction: Vec3::NEG_Z,
            up: Vec3::Y,
            velocity: Vec3::ZERO,
            surface_normal: Vec3::Y,
            grounded: false,
            mode: InteractionMode::Meteorite,
            shape_switch: None,
        }
    }
}

impl MovementState {
    /// Create a state at the given position and mode.
    pub fn new(position: Vec3, mode: InteractionMode) -> Self {
        Self {
            position,
            mode,
            ..Default::default()
        }
    }

    /// Set the look direction. Zero vectors are ignored.
    pub fn set_view_direction(&mut self, direction: Vec3) {
        let direction = direction.normalize_or_zero();
        if direction != Vec3::ZERO {
            self.view_direction = direction;
        }
    }

    /// Movement axes `(forward, right)` from the view direction and `up`.
    ///
    /// `right = view × up`, `forward = up × right`. Looking straight along
    /// `up` falls back to an arbitrary axis orthogonal to it.
    pub fn axes(&self) -> (Vec3, Vec3) {
        let mut right = self.view_direction.cross(self.up).normalize_or_zero();
        if right == Vec3::ZERO {
            right = self.up.any_orthonormal_vector();
        }
        let forward = self.up.cross(right).normalize_or_zero();
        (forward, right)
    }

    /// True while a shape switch is running.
    #[inline]
    pub fn is_switching_shape(&self) -> bool {
        self.shape_switch.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axes_follow_view() {
        let state = MovementState::default();
        let (forward, right) = state.axes();
        assert!((forward - Vec3::NEG_Z).length() < 1e-6);
        assert!((right - Vec3::X).length() < 1e-6);
    }

    #[test]
    fn test_axes_looking_up_are_orthogonal() {
        let mut state = MovementState::default();
        state.set_view_direction(Vec3::Y);
        let (forward, right) = state.axes();

        assert!((forward.length() - 1.0).abs() < 1e-5);
        assert!(forward.dot(state.up).abs() < 1e-5);
        assert!(right.dot(state.up).abs() < 1e-5);
    }

    #[test]
    fn test_switch_reverse_keeps_progress_continuous() {
        let mut switch = ShapeSwitch::new(InteractionMode::Standing, InteractionMode::Ball, 0.5);
        switch.elapsed = 0.2;
        let before = switch.progress();

        switch.reverse();
        assert_eq!(switch.from, InteractionMode::Ball);
        assert_eq!(switch.to, InteractionMode::Standing);
        assert!((switch.progress() - (1.0 - before)).abs() < 1e-6);
    }

    #[test]
    fn test_input_flags() {
        let mut input = MovementInput::default();
        assert!(input.is_empty());
        input.set(MovementInput::FORWARD, true);
        input.set(MovementInput::JUMP, true);
        input.set(MovementInput::FORWARD, false);
        assert!(input.has(MovementInput::JUMP));
        assert!(!input.has(MovementInput::FORWARD));
    }
}
