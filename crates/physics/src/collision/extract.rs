//! Marching-cubes extraction of collision triangles from the chunk store.
//!
//! Cells are unit cubes between integer voxel samples. A cell is extracted
//! only if the chunk owning its minimum corner exists; corners that fall in a
//! missing neighbor chunk read as density 0. Nothing is cached, so the result
//! always reflects the current voxel state.

use glam::{IVec3, Vec3};
use voxterra_world::{chunk_coord_of, ChunkStore};

use super::tables::{CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE, TRI_TABLE};
use super::triangle::{Triangle, TriangleBuffer};

/// Polygonise one cell.
///
/// `corners` are world positions of the eight cell corners and `values`
/// their densities, both in [`CORNER_OFFSETS`] order. Returns the number of
/// triangles pushed into `out`, which may be fewer than the cell produces if
/// the buffer fills up.
pub fn polygonise_cell(corners: &[Vec3; 8], values: &[u8; 8], iso: u8, out: &mut TriangleBuffer) -> usize {
    let mut cube_index = 0usize;
    for (i, &value) in values.iter().enumerate() {
        if value < iso {
            cube_index |= 1 << i;
        }
    }

    let crossed = EDGE_TABLE[cube_index];
    if crossed == 0 {
        return 0;
    }

    let mut vertices = [Vec3::ZERO; 12];
    for (edge, &[a, b]) in EDGE_CORNERS.iter().enumerate() {
        if crossed & (1 << edge) != 0 {
            vertices[edge] = interpolate_edge(corners[a], corners[b], values[a], values[b], iso);
        }
    }

    let mut emitted = 0;
    for tri in TRI_TABLE[cube_index].chunks_exact(3) {
        if tri[0] < 0 {
            break;
        }
        let triangle = Triangle::new(
            vertices[tri[0] as usize],
            vertices[tri[1] as usize],
            vertices[tri[2] as usize],
        );
        if !out.push(triangle) {
            break;
        }
        emitted += 1;
    }
    emitted
}

/// Iso crossing on the edge between two corners.
///
/// Endpoints are ordered by value first so the result does not depend on
/// which cell (and therefore which direction) the edge was visited from.
fn interpolate_edge(p0: Vec3, p1: Vec3, v0: u8, v1: u8, iso: u8) -> Vec3 {
    let (p_low, p_high, v_low, v_high) = if v0 <= v1 { (p0, p1, v0, v1) } else { (p1, p0, v1, v0) };

    if v_high == v_low {
        return (p_low + p_high) * 0.5;
    }
    let t = (iso as f32 - v_low as f32) / (v_high as f32 - v_low as f32);
    p_low + (p_high - p_low) * t.clamp(0.0, 1.0)
}

/// Extract every triangle in the axis-aligned box `center ± half_extent`.
///
/// Returns the number of triangles pushed into `buffer`. The buffer is not
/// cleared first.
pub fn extract_triangles(
    store: &ChunkStore,
    center: Vec3,
    half_extent: Vec3,
    iso: u8,
    buffer: &mut TriangleBuffer,
) -> usize {
    let half_extent = half_extent.abs();
    let min = (center - half_extent).floor().as_ivec3();
    let max = (center + half_extent).floor().as_ivec3();

    let mut emitted = 0;
    let mut corners = [Vec3::ZERO; 8];
    let mut values = [0u8; 8];

    for z in min.z..=max.z {
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                let cell = IVec3::new(x, y, z);
                if store.access_chunk(chunk_coord_of(cell)).is_none() {
                    continue;
                }

                for (i, offset) in CORNER_OFFSETS.iter().enumerate() {
                    let sample = cell + *offset;
                    corners[i] = sample.as_vec3();
                    values[i] = store.voxel_value(sample);
                }

                emitted += polygonise_cell(&corners, &values, iso, buffer);
                if buffer.truncated() {
                    return emitted;
                }
            }
        }
    }
    emitted
}
