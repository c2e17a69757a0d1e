//! Terrain collision.
//!
//! Collision geometry is never stored. Every query extracts the triangles it
//! needs from the chunk store with marching cubes, uses them, and drops them.
//!
//! # Key Types
//!
//! - [`TriangleBuffer`]: capacity-bounded scratch list of extracted triangles
//! - [`Ellipsoid`]: agent shape, and the mapping into ellipsoid space
//! - [`SlideResult`]: output of [`collide_and_slide`]
//! - [`RayHit`]: output of [`check_ray_terrain_collision`]

mod extract;
mod solver;
mod tables;
mod triangle;

pub use extract::{extract_triangles, polygonise_cell};
pub use solver::{
    check_ray_terrain_collision, collide_and_slide, Contact, Ellipsoid, RayHit, SlideResult, SolverConfig,
};
pub use tables::{CORNER_OFFSETS, EDGE_CORNERS};
pub use triangle::{estimate_capacity, Triangle, TriangleBuffer};
