//! Movement configuration constants.
//!
//! All movement parameters are grouped here for easy tuning. Distances are in
//! voxels (one voxel = one world unit), times in seconds.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::state::InteractionMode;

/// Configuration for agent movement physics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementConfig {
    // ========================================================================
    // Shapes
    // ========================================================================
    /// Ellipsoid half extents while standing (and floating).
    pub standing_radii: Vec3,

    /// Sphere radius while rolling as a ball.
    pub ball_radius: f32,

    /// Sphere radius while falling in as a meteorite.
    pub meteorite_radius: f32,

    /// Duration of the standing ↔ ball transition.
    pub shape_switch_duration: f32,

    // ========================================================================
    // Speeds
    // ========================================================================
    /// Input speed while standing.
    pub standing_speed: f32,

    /// Input speed while rolling.
    pub ball_speed: f32,

    /// Input speed while floating.
    pub floating_speed: f32,

    /// Scale from input acceleration to velocity change.
    pub acceleration_coefficient: f32,

    // ========================================================================
    // Forces
    // ========================================================================
    /// Gravity along `-up` (units/second²).
    pub gravity: f32,

    /// Ground friction, as the fraction of velocity removed per second.
    pub friction: f32,

    /// Velocity fraction removed per second while floating.
    pub floating_damping: f32,

    /// A standing agent on a surface whose normal has at least this dot
    /// product with `up` ignores gravity. 0.7 ≈ 45 degrees.
    pub incline_threshold: f32,

    /// Extra distance swept against the surface normal while grounded, so a
    /// grounded agent keeps its contact on flat terrain.
    pub ground_probe: f32,

    /// Longest time step simulated in one update.
    pub max_delta_time: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            // Shapes
            standing_radii: Vec3::new(0.5, 1.0, 0.5),
            ball_radius: 0.6,
            meteorite_radius: 0.8,
            shape_switch_duration: 0.5,

            // Speeds
            standing_speed: 10.0,
            ball_speed: 14.0,
            floating_speed: 20.0,
            acceleration_coefficient: 600.0,

            // Forces
            gravity: 20.0,
            friction: 10.0,
            floating_damping: 4.0,
            incline_threshold: 0.7,
            ground_probe: 0.05,
            max_delta_time: 0.066, // ~15 FPS minimum
        }
    }
}

impl MovementConfig {
    /// Faster, floatier movement.
    pub fn arcade() -> Self {
        Self {
            standing_speed: 14.0,
            ball_speed: 20.0,
            floating_speed: 30.0,
            gravity: 14.0,
            friction: 6.0,
            shape_switch_duration: 0.25,
            ..Default::default()
        }
    }

    /// Input speed for a mode. Meteorites take no input.
    pub fn speed(&self, mode: InteractionMode) -> f32 {
        match mode {
            InteractionMode::Meteorite => 0.0,
            InteractionMode::Standing => self.standing_speed,
            InteractionMode::Ball => self.ball_speed,
            InteractionMode::Floating => self.floating_speed,
        }
    }

    /// Collision half extents for a mode.
    pub fn radii(&self, mode: InteractionMode) -> Vec3 {
        match mode {
            InteractionMode::Meteorite => Vec3::splat(self.meteorite_radius),
            InteractionMode::Standing | InteractionMode::Floating => self.standing_radii,
            InteractionMode::Ball => Vec3::splat(self.ball_radius),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arcade_is_faster() {
        let default = MovementConfig::default();
        let arcade = MovementConfig::arcade();
        assert!(arcade.standing_speed > default.standing_speed);
        assert_eq!(arcade.incline_threshold, default.incline_threshold);
    }

    #[test]
    fn test_meteorite_takes_no_input() {
        let config = MovementConfig::default();
        assert_eq!(config.speed(InteractionMode::Meteorite), 0.0);
        assert_eq!(config.radii(InteractionMode::Ball), Vec3::splat(config.ball_radius));
    }
}
