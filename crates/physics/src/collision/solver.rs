//! Ellipsoid collide-and-slide against extracted terrain.
//!
//! The agent is an axis-aligned ellipsoid. All contact math runs in
//! *ellipsoid space*, where positions are divided component-wise by the
//! ellipsoid radii so the agent becomes a unit sphere and the swept test
//! reduces to sphere-vs-triangle.
//!
//! Each iteration:
//!
//! 1. Extract triangles around the swept bounds and rescale them.
//! 2. Find the earliest contact over all front-facing triangles: plane
//!    interior first, then the three vertices and three edges.
//! 3. No contact: move the full distance and stop.
//! 4. Already penetrating a triangle: push out along its normal and retry.
//! 5. Otherwise stop just short of the contact, project the remaining motion
//!    onto the sliding plane and retry with what is left.
//!
//! The loop runs at most [`SolverConfig::max_depth`] times.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use voxterra_world::{ChunkStore, DEFAULT_SURFACE_LEVEL};

use super::extract::extract_triangles;
use super::triangle::{estimate_capacity, Triangle, TriangleBuffer};

/// Radius of the sphere swept by ray queries.
const RAY_RADIUS: f32 = 0.05;

/// Longest ray segment extracted in one go.
const RAY_SEGMENT: f32 = 4.0;

/// Below this, quadratic and linear coefficients count as zero.
const TINY: f32 = 1.0e-9;

/// Solver tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Distance kept between the agent and the surface after a contact, in
    /// ellipsoid space. Also the velocity below which sliding stops.
    pub epsilon: f32,

    /// Maximum slide iterations per solve.
    pub max_depth: u32,

    /// Upper bound on triangles extracted per iteration.
    pub max_triangles: usize,

    /// Density at which terrain is solid.
    pub surface_level: u8,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.005,
            max_depth: 5,
            max_triangles: 16384,
            surface_level: DEFAULT_SURFACE_LEVEL,
        }
    }
}

/// Axis-aligned ellipsoid collision shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    /// Half extents along x, y and z.
    pub radii: Vec3,
}

impl Ellipsoid {
    pub fn new(radii: Vec3) -> Self {
        Self { radii }
    }

    pub fn sphere(radius: f32) -> Self {
        Self::new(Vec3::splat(radius))
    }

    /// World point or vector into ellipsoid space.
    #[inline]
    pub fn to_space(&self, world: Vec3) -> Vec3 {
        world / self.radii
    }

    /// Ellipsoid-space point or vector back into world space.
    #[inline]
    pub fn to_world(&self, local: Vec3) -> Vec3 {
        local * self.radii
    }

    /// Ellipsoid-space normal back into a unit world-space normal.
    #[inline]
    pub fn normal_to_world(&self, local: Vec3) -> Vec3 {
        (local / self.radii).normalize_or_zero()
    }
}

/// Contact reported by the solver, in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Point on the terrain that was touched.
    pub point: Vec3,
    /// Unit normal of the sliding plane, pointing toward the agent.
    pub normal: Vec3,
}

/// Outcome of [`collide_and_slide`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlideResult {
    /// Final world position of the ellipsoid center.
    pub position: Vec3,
    /// Last contact of the solve, if any.
    pub contact: Option<Contact>,
    /// Iterations run.
    pub iterations: u32,
    /// The iteration cap was reached before the motion was consumed.
    pub depth_capped: bool,
    /// The agent started an iteration embedded in a triangle and was pushed out.
    pub under_terrain: bool,
}

/// Result of [`check_ray_terrain_collision`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// World point on the terrain.
    pub point: Vec3,
    /// Unit surface normal at the hit.
    pub normal: Vec3,
    /// Distance travelled from the ray origin.
    pub distance: f32,
}

/// Nearest contact found in one iteration, in ellipsoid space.
#[derive(Debug, Clone, Copy)]
struct Collision {
    /// Fraction of the velocity travelled before touching; 0 when embedded.
    t: f32,
    /// Ordering key: travelled distance, or a negative depth when embedded.
    distance: f32,
    point: Vec3,
    plane_normal: Vec3,
    /// Signed distance of the center to the triangle plane when embedded.
    embedded_at: Option<f32>,
}

/// Move an ellipsoid through the terrain, sliding along whatever it hits.
pub fn collide_and_slide(
    store: &ChunkStore,
    ellipsoid: &Ellipsoid,
    world_position: Vec3,
    world_velocity: Vec3,
    config: &SolverConfig,
) -> SlideResult {
    let eps = config.epsilon;
    let mut result = SlideResult {
        position: world_position,
        contact: None,
        iterations: 0,
        depth_capped: false,
        under_terrain: false,
    };

    let mut position = ellipsoid.to_space(world_position);
    let mut velocity = ellipsoid.to_space(world_velocity);
    if velocity == Vec3::ZERO {
        return result;
    }

    let mut buffer = TriangleBuffer::default();

    loop {
        if result.iterations >= config.max_depth {
            result.depth_capped = true;
            log::warn!(
                "collide-and-slide hit depth cap {} at {:?}",
                config.max_depth,
                ellipsoid.to_world(position)
            );
            break;
        }
        result.iterations += 1;

        gather_triangles(store, ellipsoid, position, velocity, config, &mut buffer);
        let Some(hit) = nearest_collision(&buffer, ellipsoid.radii, position, velocity) else {
            position += velocity;
            break;
        };

        if let Some(signed_distance) = hit.embedded_at {
            // Push out to just above the plane and retry the same motion
            position += hit.plane_normal * (1.0 + eps - signed_distance);
            result.under_terrain = true;
            result.contact = Some(Contact {
                point: ellipsoid.to_world(hit.point),
                normal: ellipsoid.normal_to_world(hit.plane_normal),
            });
            log::trace!("solver pushed out of terrain by {}", 1.0 + eps - signed_distance);
            continue;
        }

        let destination = position + velocity;
        let mut new_base = position;
        let mut contact_point = hit.point;

        if hit.distance >= eps {
            let direction = velocity.normalize_or_zero();
            new_base = position + direction * (hit.distance - eps);
            contact_point -= direction * eps;
        }

        let slide_normal = (new_base - contact_point).normalize_or_zero();
        if slide_normal == Vec3::ZERO {
            position = new_base;
            break;
        }

        let plane_offset = (destination - contact_point).dot(slide_normal);
        let new_destination = destination - slide_normal * plane_offset;
        let new_velocity = new_destination - contact_point;

        position = new_base;
        result.contact = Some(Contact {
            point: ellipsoid.to_world(hit.point),
            normal: ellipsoid.normal_to_world(slide_normal),
        });
        log::trace!(
            "solver iteration {}: contact at t={:.4}, remaining {:.4}",
            result.iterations,
            hit.t,
            new_velocity.length()
        );

        if new_velocity.length_squared() < eps * eps {
            break;
        }
        velocity = new_velocity;
    }

    result.position = ellipsoid.to_world(position);
    result
}

/// Sweep a tiny sphere from `origin` along `direction` for at most
/// `max_distance` and report the first terrain contact.
pub fn check_ray_terrain_collision(
    store: &ChunkStore,
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    config: &SolverConfig,
) -> Option<RayHit> {
    let direction = direction.normalize_or_zero();
    if direction == Vec3::ZERO || !(max_distance > 0.0) {
        return None;
    }

    let ellipsoid = Ellipsoid::sphere(RAY_RADIUS);
    let mut buffer = TriangleBuffer::default();
    let mut travelled = 0.0;

    while travelled < max_distance {
        let length = (max_distance - travelled).min(RAY_SEGMENT);
        let start = origin + direction * travelled;
        let position = ellipsoid.to_space(start);
        let velocity = ellipsoid.to_space(direction * length);

        gather_triangles(store, &ellipsoid, position, velocity, config, &mut buffer);
        if let Some(hit) = nearest_collision(&buffer, ellipsoid.radii, position, velocity) {
            let center = position + velocity * hit.t;
            let normal = match hit.embedded_at {
                Some(_) => hit.plane_normal,
                None => (center - hit.point).normalize_or_zero(),
            };
            return Some(RayHit {
                point: ellipsoid.to_world(hit.point),
                normal: ellipsoid.normal_to_world(normal),
                distance: travelled + length * hit.t,
            });
        }
        travelled += length;
    }
    None
}

/// Extract the triangles around a swept ellipsoid into `buffer`, rescaled
/// into ellipsoid space.
fn gather_triangles(
    store: &ChunkStore,
    ellipsoid: &Ellipsoid,
    position: Vec3,
    velocity: Vec3,
    config: &SolverConfig,
    buffer: &mut TriangleBuffer,
) {
    let world_position = ellipsoid.to_world(position);
    let world_velocity = ellipsoid.to_world(velocity);
    let center = world_position + world_velocity * 0.5;
    let half_extent = ellipsoid.radii.abs() + world_velocity.abs() * 0.5 + Vec3::ONE;

    let capacity = estimate_capacity(half_extent).min(config.max_triangles);
    buffer.reset(capacity);
    extract_triangles(store, center, half_extent, config.surface_level, buffer);

    if buffer.truncated() {
        log::trace!("solver triangle buffer truncated at {}", capacity);
    }
}

fn nearest_collision(buffer: &TriangleBuffer, radii: Vec3, position: Vec3, velocity: Vec3) -> Option<Collision> {
    let mut nearest: Option<Collision> = None;
    for triangle in buffer.iter() {
        let Some(candidate) = sweep_triangle(&triangle.scaled_down(radii), position, velocity) else {
            continue;
        };
        if nearest.map_or(true, |best| candidate.distance < best.distance) {
            nearest = Some(candidate);
        }
    }
    nearest
}

/// Swept unit sphere against one ellipsoid-space triangle.
fn sweep_triangle(triangle: &Triangle, position: Vec3, velocity: Vec3) -> Option<Collision> {
    let normal = triangle.normal()?;
    let normal_velocity = normal.dot(velocity);
    if normal_velocity > 0.0 {
        return None;
    }

    let signed_distance = normal.dot(position - triangle.a);

    // Sphere already cuts the plane inside the triangle
    if signed_distance.abs() < 1.0 {
        let projected = position - normal * signed_distance;
        if point_in_triangle(projected, triangle) {
            return Some(Collision {
                t: 0.0,
                distance: signed_distance - 1.0,
                point: projected,
                plane_normal: normal,
                embedded_at: Some(signed_distance),
            });
        }
    }

    let (t0, embedded_in_plane) = if normal_velocity.abs() < TINY {
        if signed_distance.abs() >= 1.0 {
            return None;
        }
        (0.0, true)
    } else {
        let mut t0 = (1.0 - signed_distance) / normal_velocity;
        let mut t1 = (-1.0 - signed_distance) / normal_velocity;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        if t0 > 1.0 || t1 < 0.0 {
            return None;
        }
        (t0.clamp(0.0, 1.0), false)
    };

    let mut hit: Option<(f32, Vec3)> = None;

    if !embedded_in_plane {
        let plane_point = position - normal + velocity * t0;
        if point_in_triangle(plane_point, triangle) {
            hit = Some((t0, plane_point));
        }
    }

    if hit.is_none() {
        let mut t = 1.0;
        let speed_sq = velocity.length_squared();

        for vertex in [triangle.a, triangle.b, triangle.c] {
            let b = 2.0 * velocity.dot(position - vertex);
            let c = (vertex - position).length_squared() - 1.0;
            if let Some(root) = lowest_root(speed_sq, b, c, t) {
                t = root;
                hit = Some((root, vertex));
            }
        }

        for (from, to) in [(triangle.a, triangle.b), (triangle.b, triangle.c), (triangle.c, triangle.a)] {
            let edge = to - from;
            let base_to_vertex = from - position;
            let edge_sq = edge.length_squared();
            let edge_dot_velocity = edge.dot(velocity);
            let edge_dot_base = edge.dot(base_to_vertex);

            let a = edge_sq * -speed_sq + edge_dot_velocity * edge_dot_velocity;
            let b = edge_sq * (2.0 * velocity.dot(base_to_vertex)) - 2.0 * edge_dot_velocity * edge_dot_base;
            let c = edge_sq * (1.0 - base_to_vertex.length_squared()) + edge_dot_base * edge_dot_base;

            if let Some(root) = lowest_root(a, b, c, t) {
                let f = (edge_dot_velocity * root - edge_dot_base) / edge_sq;
                if (0.0..=1.0).contains(&f) {
                    t = root;
                    hit = Some((root, from + edge * f));
                }
            }
        }
    }

    let (t, point) = hit?;
    Some(Collision {
        t,
        distance: t * velocity.length(),
        point,
        plane_normal: normal,
        embedded_at: None,
    })
}

/// Smallest root of `a·x² + b·x + c` in `[0, max)`.
///
/// Only the entering root counts: a negative first root means the shapes
/// already overlap, which the plane test handles separately.
fn lowest_root(a: f32, b: f32, c: f32, max: f32) -> Option<f32> {
    if a.abs() < TINY {
        if b.abs() < TINY {
            return None;
        }
        let root = -c / b;
        return (root >= 0.0 && root < max).then_some(root);
    }

    let determinant = b * b - 4.0 * a * c;
    if determinant < 0.0 {
        return None;
    }
    let sqrt = determinant.sqrt();
    let r1 = (-b - sqrt) / (2.0 * a);
    let r2 = (-b + sqrt) / (2.0 * a);
    let root = r1.min(r2);
    (root >= 0.0 && root < max).then_some(root)
}

/// Barycentric containment test for a point on the triangle's plane.
fn point_in_triangle(point: Vec3, triangle: &Triangle) -> bool {
    let v0 = triangle.c - triangle.a;
    let v1 = triangle.b - triangle.a;
    let v2 = point - triangle.a;

    let dot00 = v0.dot(v0);
    let dot01 = v0.dot(v1);
    let dot02 = v0.dot(v2);
    let dot11 = v1.dot(v1);
    let dot12 = v1.dot(v2);

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom.abs() < TINY {
        return false;
    }
    let inv = 1.0 / denom;
    let u = (dot11 * dot02 - dot01 * dot12) * inv;
    let v = (dot00 * dot12 - dot01 * dot02) * inv;

    const SLACK: f32 = -1.0e-5;
    u >= SLACK && v >= SLACK && u + v <= 1.0 - SLACK
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec3;
    use voxterra_world::Voxel;

    /// Solid slab filling `y <= 0` over a 48×48 area; the surface sits at y = 0.5.
    fn flat_ground() -> ChunkStore {
        let mut store = ChunkStore::new();
        for x in -24..24 {
            for z in -24..24 {
                for y in -3..=0 {
                    store.set_voxel(IVec3::new(x, y, z), Voxel::new(254, 1));
                }
            }
        }
        store
    }

    const GROUND: f32 = 0.5;

    #[test]
    fn test_zero_velocity_returns_input() {
        let store = flat_ground();
        let start = Vec3::new(1.0, 3.0, 2.0);
        let result = collide_and_slide(&store, &Ellipsoid::sphere(1.0), start, Vec3::ZERO, &SolverConfig::default());

        assert_eq!(result.position, start);
        assert!(result.contact.is_none());
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_free_motion() {
        let store = ChunkStore::new();
        let start = Vec3::new(0.0, 10.0, 0.0);
        let velocity = Vec3::new(1.0, 0.0, 2.0);
        let result = collide_and_slide(&store, &Ellipsoid::sphere(1.0), start, velocity, &SolverConfig::default());

        assert!((result.position - (start + velocity)).length() < 1e-5);
        assert!(result.contact.is_none());
        assert_eq!(result.iterations, 1);
    }

    #[test]
    fn test_sub_epsilon_velocity_still_moves() {
        let store = ChunkStore::new();
        let config = SolverConfig::default();
        let start = Vec3::new(0.0, 10.0, 0.0);
        let velocity = Vec3::new(config.epsilon * 0.8, 0.0, 0.0);
        let result = collide_and_slide(&store, &Ellipsoid::sphere(1.0), start, velocity, &config);

        assert!((result.position - (start + velocity)).length() < 1e-7, "got {:?}", result.position);
        assert!(result.contact.is_none());
        assert_eq!(result.iterations, 1);
    }

    #[test]
    fn test_drop_onto_plane_stops_within_epsilon() {
        let store = flat_ground();
        let config = SolverConfig::default();
        let radius = 1.0;
        let start = Vec3::new(0.3, 4.0, 0.2);

        let result = collide_and_slide(
            &store,
            &Ellipsoid::sphere(radius),
            start,
            Vec3::new(0.0, -10.0, 0.0),
            &config,
        );

        let contact = result.contact.expect("should touch the ground");
        assert!(
            (contact.normal - Vec3::Y).length() < 1e-3,
            "normal should be the plane normal, got {:?}",
            contact.normal
        );
        let gap = result.position.y - radius - GROUND;
        assert!(gap >= -1e-4 && gap <= config.epsilon * radius + 1e-3, "gap {gap}");
        assert!((result.position.x - start.x).abs() < 1e-4);
        assert!(!result.under_terrain);
    }

    #[test]
    fn test_slide_keeps_tangential_motion() {
        let store = flat_ground();
        let start = Vec3::new(0.0, 1.6, 0.0);
        let velocity = Vec3::new(2.0, -1.0, 0.0);
        let result = collide_and_slide(&store, &Ellipsoid::sphere(1.0), start, velocity, &SolverConfig::default());

        assert!(result.contact.is_some());
        assert!(result.position.x > 1.5, "should slide along x, got {:?}", result.position);
        assert!(result.position.y >= 1.0 + GROUND - 1e-3);
    }

    #[test]
    fn test_ellipsoid_rests_on_its_half_height() {
        let store = flat_ground();
        let ellipsoid = Ellipsoid::new(Vec3::new(0.5, 1.5, 0.5));
        let result = collide_and_slide(
            &store,
            &ellipsoid,
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(0.0, -8.0, 0.0),
            &SolverConfig::default(),
        );

        assert!((result.position.y - (GROUND + 1.5)).abs() < 0.02, "got {}", result.position.y);
    }

    #[test]
    fn test_terminates_within_depth_cap() {
        let store = flat_ground();
        let config = SolverConfig {
            max_depth: 2,
            ..Default::default()
        };
        let result = collide_and_slide(
            &store,
            &Ellipsoid::sphere(1.0),
            Vec3::new(0.0, 1.6, 0.0),
            Vec3::new(3.0, -3.0, 1.0),
            &config,
        );

        assert!(result.iterations <= config.max_depth);
        assert!(result.position.is_finite());
    }

    /// Floor at y = 0.5 with walls whose faces sit at x = 3.5 and z = 3.5.
    fn walled_corner() -> ChunkStore {
        let mut store = ChunkStore::new();
        for x in -8..8 {
            for z in -8..8 {
                for y in -3..=6 {
                    if y <= 0 || x >= 4 || z >= 4 {
                        store.set_voxel(IVec3::new(x, y, z), Voxel::new(254, 1));
                    }
                }
            }
        }
        store
    }

    #[test]
    fn test_corner_sweeps_terminate_within_depth_cap() {
        let store = walled_corner();
        let ellipsoid = Ellipsoid::sphere(0.8);
        let velocities = [
            Vec3::new(4.0, -1.0, 4.0),
            Vec3::new(6.0, 0.0, 2.0),
            Vec3::new(2.0, -3.0, 6.0),
            Vec3::new(5.0, -5.0, 5.0),
            Vec3::new(9.0, -0.5, 0.5),
        ];

        let mut capped = 0;
        let mut solves = 0;
        for max_depth in [2, 5] {
            let config = SolverConfig {
                max_depth,
                ..Default::default()
            };
            for x in [0.5, 1.5, 2.5] {
                for z in [0.5, 1.5, 2.5] {
                    for y in [1.6, 2.5] {
                        for velocity in velocities {
                            let start = Vec3::new(x, y, z);
                            let result = collide_and_slide(&store, &ellipsoid, start, velocity, &config);
                            solves += 1;

                            assert!(result.iterations <= max_depth, "{start:?} {velocity:?}");
                            assert!(result.position.is_finite(), "{start:?} {velocity:?}");
                            assert!(result.contact.is_some(), "{start:?} {velocity:?} should reach a wall");
                            if result.depth_capped {
                                capped += 1;
                            }
                        }
                    }
                }
            }
        }

        assert!(capped > 0, "no sweep reached the depth cap in {solves} solves");
    }

    #[test]
    fn test_embedded_sphere_is_pushed_out() {
        let store = flat_ground();
        let result = collide_and_slide(
            &store,
            &Ellipsoid::sphere(1.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.5, -0.1, 0.0),
            &SolverConfig::default(),
        );

        assert!(result.under_terrain);
        assert!(result.position.y >= 1.0 + GROUND - 1e-3, "got {:?}", result.position);
        let contact = result.contact.expect("contact");
        assert!(contact.normal.y > 0.99);
    }

    #[test]
    fn test_degenerate_triangles_are_ignored() {
        let flat = Triangle::new(Vec3::ZERO, Vec3::X, Vec3::X * 2.0);
        assert!(sweep_triangle(&flat, Vec3::new(0.5, 0.5, 0.0), Vec3::new(0.0, -1.0, 0.0)).is_none());
    }

    #[test]
    fn test_solve_is_deterministic() {
        let store = flat_ground();
        let run = || {
            collide_and_slide(
                &store,
                &Ellipsoid::new(Vec3::new(0.6, 1.2, 0.6)),
                Vec3::new(0.37, 3.1, -0.8),
                Vec3::new(1.3, -4.0, 0.7),
                &SolverConfig::default(),
            )
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_ray_hits_ground() {
        let store = flat_ground();
        let hit = check_ray_terrain_collision(
            &store,
            Vec3::new(0.2, 10.0, 0.1),
            Vec3::NEG_Y,
            20.0,
            &SolverConfig::default(),
        )
        .expect("ray should hit");

        assert!((hit.point.y - GROUND).abs() < 0.01, "got {:?}", hit.point);
        assert!((hit.distance - (10.0 - GROUND - RAY_RADIUS)).abs() < 0.01, "got {}", hit.distance);
        assert!(hit.normal.y > 0.99);
    }

    #[test]
    fn test_ray_misses_when_short_or_upward() {
        let store = flat_ground();
        let config = SolverConfig::default();
        let origin = Vec3::new(0.0, 10.0, 0.0);

        assert!(check_ray_terrain_collision(&store, origin, Vec3::NEG_Y, 5.0, &config).is_none());
        assert!(check_ray_terrain_collision(&store, origin, Vec3::Y, 50.0, &config).is_none());
        assert!(check_ray_terrain_collision(&store, origin, Vec3::ZERO, 50.0, &config).is_none());
    }

    #[test]
    fn test_lowest_root() {
        // (x - 0.25)(x - 0.75)
        let root = lowest_root(1.0, -1.0, 0.1875, 1.0).expect("root");
        assert!((root - 0.25).abs() < 1e-6);
        assert!(lowest_root(1.0, -1.0, 0.1875, 0.2).is_none());
        assert!(lowest_root(1.0, 0.0, 1.0, 1.0).is_none());
    }
}
