//! Voxterra terrain physics.
//!
//! Collision and movement for agents walking on deformable voxel terrain.
//! Nothing here stores geometry: every query rebuilds the triangles it needs
//! from the chunk store, so terraforming is visible to the very next query.
//!
//! # Architecture
//!
//! - **Collision**: marching-cubes triangle extraction, the ellipsoid
//!   collide-and-slide solver, and terrain raycasts
//! - **Movement**: per-mode agent state machine built on the solver

pub mod collision;
pub mod movement;

pub use collision::{
    check_ray_terrain_collision, collide_and_slide, extract_triangles, Contact, Ellipsoid, RayHit, SlideResult,
    SolverConfig, Triangle, TriangleBuffer,
};
pub use movement::{
    InteractionMode, MovementConfig, MovementController, MovementInput, MovementOutcome, MovementState, ShapeSwitch,
};
