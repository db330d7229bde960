//! Welded vertex storage shared by the faces and edges of a [`Shell`].
//!
//! Coordinates are quantized before hashing so that positions agreeing to
//! within the weld resolution map to the same pool slot.
//!
//! [`Shell`]: crate::shell::Shell

use crate::float_types::{QUANTIZATION_FACTOR, Real};
use nalgebra::Point3;
use std::collections::HashMap;

/// A position rounded onto the weld grid, usable as a hash key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuantizedPoint(pub i64, pub i64, pub i64);

/// Round a position onto the weld grid.
pub fn quantize_point(p: &Point3<Real>) -> QuantizedPoint {
    QuantizedPoint(
        (p.x * QUANTIZATION_FACTOR).round() as i64,
        (p.y * QUANTIZATION_FACTOR).round() as i64,
        (p.z * QUANTIZATION_FACTOR).round() as i64,
    )
}

/// Vertex pool with coordinate-welding insertion.
///
/// Indices are stable: vertices are never removed, only orphaned. A vertex
/// unused by any face or edge is simply dead weight until the owning shell
/// is dropped, which keeps every index captured during an operation valid
/// for its whole duration.
#[derive(Debug, Clone, Default)]
pub struct VertexPool {
    positions: Vec<Point3<Real>>,
    index: HashMap<QuantizedPoint, usize>,
}

impl VertexPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots in the pool, including orphaned ones.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Insert a position, welding onto an existing vertex when one sits on
    /// the same grid cell. Returns the pool index.
    pub fn insert(&mut self, p: Point3<Real>) -> usize {
        let key = quantize_point(&p);
        if let Some(&i) = self.index.get(&key) {
            return i;
        }
        let i = self.positions.len();
        self.positions.push(p);
        self.index.insert(key, i);
        i
    }

    /// Look up a position without inserting it.
    pub fn find(&self, p: &Point3<Real>) -> Option<usize> {
        self.index.get(&quantize_point(p)).copied()
    }

    /// Position stored at `i`.
    pub fn position(&self, i: usize) -> Point3<Real> {
        self.positions[i]
    }

    /// Iterate over `(index, position)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Point3<Real>)> {
        self.positions.iter().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welds_coincident_positions() {
        let mut pool = VertexPool::new();
        let a = pool.insert(Point3::new(1.0, 2.0, 3.0));
        let b = pool.insert(Point3::new(1.0 + 1e-12, 2.0, 3.0));
        let c = pool.insert(Point3::new(1.1, 2.0, 3.0));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn find_does_not_insert() {
        let mut pool = VertexPool::new();
        assert!(pool.find(&Point3::new(0.0, 0.0, 0.0)).is_none());
        let i = pool.insert(Point3::new(0.0, 0.0, 0.0));
        assert_eq!(pool.find(&Point3::new(0.0, 0.0, 0.0)), Some(i));
    }
}
