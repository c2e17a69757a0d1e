//! Transient collision triangles.

use glam::Vec3;

/// Average triangles emitted per marching-cubes cell, used for buffer sizing.
const TRIANGLES_PER_CELL: usize = 5;

/// A world-space triangle extracted from the terrain.
///
/// Wound so that [`Triangle::normal`] points out of the solid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { a, b, c }
    }

    /// Unit normal, or `None` for a zero-area triangle.
    pub fn normal(&self) -> Option<Vec3> {
        let n = (self.b - self.a).cross(self.c - self.a);
        let len_sq = n.length_squared();
        if len_sq <= f32::EPSILON * f32::EPSILON {
            return None;
        }
        Some(n / len_sq.sqrt())
    }

    /// Same triangle with every vertex divided component-wise by `radii`.
    pub fn scaled_down(&self, radii: Vec3) -> Self {
        Self::new(self.a / radii, self.b / radii, self.c / radii)
    }

    /// Vertex centroid.
    pub fn centroid(&self) -> Vec3 {
        (self.a + self.b + self.c) / 3.0
    }
}

/// Capacity-bounded triangle list.
///
/// Pushing past the capacity drops the triangle and marks the buffer as
/// truncated.
#[derive(Debug, Clone, Default)]
pub struct TriangleBuffer {
    triangles: Vec<Triangle>,
    capacity: usize,
    truncated: bool,
}

impl TriangleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            triangles: Vec::with_capacity(capacity),
            capacity,
            truncated: false,
        }
    }

    /// Empty the buffer and set a new capacity, keeping the allocation.
    pub fn reset(&mut self, capacity: usize) {
        self.triangles.clear();
        self.capacity = capacity;
        self.truncated = false;
    }

    /// Append a triangle. Returns false if the buffer is full.
    #[inline]
    pub fn push(&mut self, triangle: Triangle) -> bool {
        if self.triangles.len() >= self.capacity {
            self.truncated = true;
            return false;
        }
        self.triangles.push(triangle);
        true
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a push was refused since the last reset.
    #[inline]
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn as_slice(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triangle> {
        self.triangles.iter()
    }
}

/// Triangle capacity for extracting a box of the given half extent.
pub fn estimate_capacity(half_extent: Vec3) -> usize {
    let cells = (half_extent.abs() * 2.0).ceil() + Vec3::ONE;
    let volume = cells.x as usize * cells.y as usize * cells.z as usize;
    volume.saturating_mul(TRIANGLES_PER_CELL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_follows_winding() {
        let tri = Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Y);
        assert_eq!(tri.normal(), Some(Vec3::Z));

        let flipped = Triangle::new(Vec3::ZERO, Vec3::Y, Vec3::X);
        assert_eq!(flipped.normal(), Some(Vec3::NEG_Z));
    }

    #[test]
    fn test_degenerate_has_no_normal() {
        let tri = Triangle::new(Vec3::ONE, Vec3::ONE, Vec3::new(2.0, 2.0, 2.0));
        assert!(tri.normal().is_none());
    }

    #[test]
    fn test_buffer_truncates() {
        let mut buffer = TriangleBuffer::new(2);
        let tri = Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Y);
        assert!(buffer.push(tri));
        assert!(buffer.push(tri));
        assert!(!buffer.push(tri));
        assert_eq!(buffer.len(), 2);
        assert!(buffer.truncated());

        buffer.reset(8);
        assert!(buffer.is_empty());
        assert!(!buffer.truncated());
        assert_eq!(buffer.capacity(), 8);
    }

    #[test]
    fn test_capacity_grows_with_volume() {
        assert_eq!(estimate_capacity(Vec3::ZERO), TRIANGLES_PER_CELL);
        assert_eq!(estimate_capacity(Vec3::splat(1.0)), 27 * TRIANGLES_PER_CELL);
        assert!(estimate_capacity(Vec3::splat(4.0)) > estimate_capacity(Vec3::splat(2.0)));
    }
}
