//! `Shell`: the flat (non-recursive) geometry a definition owns.
//!
//! A shell holds a welded vertex pool, an undirected edge table and a face
//! list. Every consecutive vertex pair along a face loop has an edge
//! record; standalone edges (bound to no face) are allowed, as are edges
//! transiently bound to any number of faces while an operation mutates the
//! shell.

use crate::errors::ValidationError;
use crate::float_types::Real;
use nalgebra::{Matrix4, Point3};
use std::collections::{BTreeSet, HashMap, HashSet};

pub mod face;
pub mod plane;
pub mod vertex;

pub use face::{Attributes, Face, PointFace};
pub use plane::Plane;
pub use vertex::VertexPool;

/// Canonical undirected edge key: smaller pool index first.
pub type EdgeKey = (usize, usize);

/// Order an index pair into an [`EdgeKey`].
pub fn edge_key(a: usize, b: usize) -> EdgeKey {
    if a < b { (a, b) } else { (b, a) }
}

#[derive(Debug, Clone, Default)]
pub struct Shell {
    pub pool: VertexPool,
    /// Edge records, canonically keyed. A `BTreeSet` keeps iteration order
    /// deterministic, which the pair-alternation tie-break relies on.
    edges: BTreeSet<EdgeKey>,
    pub faces: Vec<Face>,
}

impl Shell {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Construction

    /// Register an edge record between two pool vertices.
    pub fn add_edge(&mut self, a: usize, b: usize) {
        if a != b {
            self.edges.insert(edge_key(a, b));
        }
    }

    /// Insert a standalone line segment, welding endpoints into the pool.
    pub fn add_line(&mut self, p0: Point3<Real>, p1: Point3<Real>) {
        let a = self.pool.insert(p0);
        let b = self.pool.insert(p1);
        self.add_edge(a, b);
    }

    /// Add a face from boundary points. Vertices are welded into the pool
    /// and an edge record is created for every boundary pair.
    pub fn add_face(
        &mut self,
        outer: &[Point3<Real>],
        holes: &[Vec<Point3<Real>>],
        attributes: Attributes,
    ) -> Result<usize, ValidationError> {
        for p in outer.iter().chain(holes.iter().flatten()) {
            if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
                return Err(ValidationError::InvalidCoordinate(*p));
            }
        }
        if outer.len() < 3 {
            return Err(ValidationError::TooFewPoints(
                outer.first().copied().unwrap_or_else(Point3::origin),
            ));
        }
        let plane = Plane::from_loop(outer)
            .ok_or(ValidationError::DegenerateFace(outer[0]))?;

        let weld = |points: &[Point3<Real>], pool: &mut VertexPool| -> Vec<usize> {
            let mut loop_: Vec<usize> = points.iter().map(|p| pool.insert(*p)).collect();
            loop_.dedup();
            if loop_.len() > 1 && loop_.first() == loop_.last() {
                loop_.pop();
            }
            loop_
        };
        let outer_loop = weld(outer, &mut self.pool);
        if outer_loop.len() < 3 {
            return Err(ValidationError::TooFewPoints(outer[0]));
        }
        let hole_loops: Vec<Vec<usize>> = holes
            .iter()
            .map(|h| weld(h, &mut self.pool))
            .filter(|h| h.len() >= 3)
            .collect();

        Ok(self.insert_face(Face {
            outer: outer_loop,
            holes: hole_loops,
            plane,
            attributes,
        }))
    }

    /// Push an already-indexed face and register its boundary edges.
    pub fn insert_face(&mut self, face: Face) -> usize {
        for (a, b) in face.edge_pairs() {
            self.add_edge(a, b);
        }
        self.faces.push(face);
        self.faces.len() - 1
    }

    // ------------------------------------------------------------------
    // Adjacency

    /// Edge records in deterministic order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeKey> + '_ {
        self.edges.iter().copied()
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.edges.contains(&edge_key(a, b))
    }

    /// Adjacent-face count per edge record. Records nothing walks count 0.
    pub fn edge_face_counts(&self) -> HashMap<EdgeKey, u32> {
        let mut counts: HashMap<EdgeKey, u32> =
            self.edges.iter().map(|&e| (e, 0)).collect();
        for face in &self.faces {
            for (a, b) in face.edge_pairs() {
                *counts.entry(edge_key(a, b)).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Indices of faces whose boundary walks the undirected pair.
    pub fn faces_using_edge(&self, a: usize, b: usize) -> Vec<usize> {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.uses_edge(a, b))
            .map(|(i, _)| i)
            .collect()
    }

    /// Whether every edge record binds an even number of faces. This is the
    /// solidity criterion: two solids touching along a shared edge give
    /// that edge four faces and still count as closed.
    pub fn is_manifold(&self) -> bool {
        !self.edge_face_counts().values().any(|&c| c % 2 == 1)
    }

    /// Edge records bound to exactly one face.
    pub fn naked_edges(&self) -> Vec<EdgeKey> {
        let counts = self.edge_face_counts();
        self.edges
            .iter()
            .copied()
            .filter(|e| counts.get(e) == Some(&1))
            .collect()
    }

    // ------------------------------------------------------------------
    // Mutation

    /// Erase faces by index. Their edge records stay behind; the purge pass
    /// collects the ones nothing binds anymore.
    pub fn erase_faces(&mut self, indices: &BTreeSet<usize>) {
        let mut i = 0;
        self.faces.retain(|_| {
            let keep = !indices.contains(&i);
            i += 1;
            keep
        });
    }

    /// Delete edge records no face walks.
    pub fn purge_free_edges(&mut self) {
        let counts = self.edge_face_counts();
        self.edges.retain(|e| counts.get(e).copied().unwrap_or(0) > 0);
    }

    /// Reverse the orientation of every face.
    pub fn reverse_all_faces(&mut self) {
        for face in &mut self.faces {
            face.reverse();
        }
    }

    /// Split the edge `(a, b)` at the existing pool vertex `m`: every face
    /// loop walking the pair has `m` inserted between the endpoints, and
    /// the edge record is replaced by two.
    pub fn split_edge(&mut self, a: usize, b: usize, m: usize) {
        if m == a || m == b || !self.has_edge(a, b) {
            return;
        }
        for face in &mut self.faces {
            let split = |loop_: &mut Vec<usize>| {
                let n = loop_.len();
                let mut insert_at = Vec::new();
                for i in 0..n {
                    let (p, q) = (loop_[i], loop_[(i + 1) % n]);
                    if (p == a && q == b) || (p == b && q == a) {
                        insert_at.push(i + 1);
                    }
                }
                for (k, at) in insert_at.into_iter().enumerate() {
                    loop_.insert(at + k, m);
                }
            };
            split(&mut face.outer);
            for hole in &mut face.holes {
                split(hole);
            }
        }
        self.edges.remove(&edge_key(a, b));
        self.add_edge(a, m);
        self.add_edge(m, b);
    }

    /// Remove a seam edge, merging the two faces it separates into one
    /// region. Used on coplanar intersection artifacts; when the pair no
    /// longer separates two distinct faces only the record is dropped.
    pub fn erase_edge_merging_faces(&mut self, key: EdgeKey) {
        let (a, b) = key;
        self.edges.remove(&key);
        let using = self.faces_using_edge(a, b);
        if using.len() != 2 {
            return;
        }
        let (i, j) = (using[0], using[1]);
        let fj = self.faces[j].clone();
        let merged = {
            let fi = &self.faces[i];
            merge_loops(fi, &fj, a, b)
        };
        let Some((outer, mut holes)) = merged else {
            self.edges.insert(key);
            return;
        };
        holes.extend(self.faces[i].holes.iter().cloned());
        holes.extend(fj.holes.iter().cloned());
        let plane = self.faces[i].plane.clone();
        let attributes = self.faces[i].attributes.clone();
        let mut doomed = BTreeSet::new();
        doomed.insert(i);
        doomed.insert(j);
        self.erase_faces(&doomed);
        self.insert_face(Face {
            outer,
            holes,
            plane,
            attributes,
        });
    }

    // ------------------------------------------------------------------
    // Transform & merge

    /// Apply a rigid transform to every vertex, rebuilding the welded pool
    /// and re-deriving each face's plane from its transformed loop.
    pub fn transform(&mut self, matrix: &Matrix4<Real>) {
        let mut pool = VertexPool::new();
        let mut remap = Vec::with_capacity(self.pool.len());
        for (_, p) in self.pool.iter() {
            let moved = matrix.transform_point(p);
            remap.push(pool.insert(moved));
        }
        for face in &mut self.faces {
            for v in &mut face.outer {
                *v = remap[*v];
            }
            for hole in &mut face.holes {
                for v in hole {
                    *v = remap[*v];
                }
            }
            let pts = Face::loop_points(&face.outer, &pool);
            if let Some(plane) = Plane::from_loop(&pts) {
                face.plane = plane;
            }
        }
        self.edges = self
            .edges
            .iter()
            .map(|&(a, b)| edge_key(remap[a], remap[b]))
            .filter(|&(a, b)| a != b)
            .collect();
        self.pool = pool;
    }

    /// A face's boundary as a multiset of undirected welded-vertex pairs;
    /// two faces with the same signature occupy the same region.
    fn face_signature(face: &Face) -> BTreeSet<EdgeKey> {
        face.edge_pairs()
            .into_iter()
            .map(|(a, b)| edge_key(a, b))
            .collect()
    }

    /// Absorb `other` (transformed by `matrix` into this shell's frame):
    /// vertices weld into the pool, duplicate edge records collapse, and a
    /// face coinciding with an existing one is dropped so coincident
    /// coplanar surfaces merge instead of doubling up.
    pub fn merge(&mut self, other: &Shell, matrix: &Matrix4<Real>) {
        let mut incoming = other.clone();
        incoming.transform(matrix);

        let mut remap = Vec::with_capacity(incoming.pool.len());
        for (_, p) in incoming.pool.iter() {
            remap.push(self.pool.insert(*p));
        }

        let existing: HashSet<BTreeSet<EdgeKey>> =
            self.faces.iter().map(Self::face_signature).collect();

        for face in &incoming.faces {
            let mut face = face.clone();
            for v in &mut face.outer {
                *v = remap[*v];
            }
            for hole in &mut face.holes {
                for v in hole {
                    *v = remap[*v];
                }
            }
            if existing.contains(&Self::face_signature(&face)) {
                continue;
            }
            self.insert_face(face);
        }
        for &(a, b) in &incoming.edges {
            self.add_edge(remap[a], remap[b]);
        }
    }

    // ------------------------------------------------------------------
    // Measurement

    /// Triangulate every face (ear cut in the face plane) into 3D
    /// triangles, each wound to agree with its face normal.
    pub fn triangulate(&self) -> Vec<[Point3<Real>; 3]> {
        use geo::TriangulateEarcut;
        let mut result = Vec::new();
        for face in &self.faces {
            let polygon = face.to_geo(&self.pool);
            let triangulation = polygon.earcut_triangles_raw();
            let verts = triangulation.vertices;
            let (u, v) = face.plane.basis();
            let lift = |x: Real, y: Real| -> Point3<Real> {
                Point3::from(u * x + v * y + face.plane.normal() * face.plane.offset)
            };
            for tri in triangulation.triangle_indices.chunks_exact(3) {
                let a = lift(verts[2 * tri[0]], verts[2 * tri[0] + 1]);
                let b = lift(verts[2 * tri[1]], verts[2 * tri[1] + 1]);
                let c = lift(verts[2 * tri[2]], verts[2 * tri[2] + 1]);
                // Ear cut does not preserve 3D winding.
                if (b - a).cross(&(c - a)).dot(&face.plane.normal()) >= 0.0 {
                    result.push([a, b, c]);
                } else {
                    result.push([a, c, b]);
                }
            }
        }
        result
    }

    /// Signed volume by the divergence theorem; positive for a closed shell
    /// with outward normals.
    pub fn volume(&self) -> Real {
        self.triangulate()
            .iter()
            .map(|[a, b, c]| a.coords.dot(&b.coords.cross(&c.coords)))
            .sum::<Real>()
            / 6.0
    }
}

/// Splice two face boundaries that share the undirected edge `(a, b)` into
/// one loop, dropping the shared edge. Returns `None` when the faces do not
/// walk the pair in opposite directions (inconsistent winding).
fn merge_loops(fi: &Face, fj: &Face, a: usize, b: usize) -> Option<(Vec<usize>, Vec<Vec<usize>>)> {
    let find = |face: &Face| -> Option<(Vec<usize>, bool, bool)> {
        for (li, loop_) in face.loops().enumerate() {
            let n = loop_.len();
            for i in 0..n {
                let (p, q) = (loop_[i], loop_[(i + 1) % n]);
                if (p == a && q == b) || (p == b && q == a) {
                    // Rotate so the loop starts just past the shared pair.
                    let mut rotated = Vec::with_capacity(n);
                    for k in 0..n {
                        rotated.push(loop_[(i + 1 + k) % n]);
                    }
                    return Some((rotated, p == a, li == 0));
                }
            }
        }
        None
    };
    let (loop_i, i_forward, i_outer) = find(fi)?;
    let (loop_j, j_forward, j_outer) = find(fj)?;
    if i_forward == j_forward || !i_outer || !j_outer {
        return None;
    }
    // loop_i = [b, ..., a] (or [a, ..., b]); loop_j runs the pair the other
    // way, so appending its interior continues the boundary seamlessly.
    let mut merged = loop_i;
    merged.extend(loop_j[1..loop_j.len() - 1].iter().copied());
    simplify_loop(&mut merged);
    if merged.len() < 3 {
        return None;
    }
    Some((merged, Vec::new()))
}

/// Drop consecutive duplicates and backtrack spikes (`x, y, x`) left behind
/// when several seam edges between the same two faces collapse.
fn simplify_loop(loop_: &mut Vec<usize>) {
    loop {
        let n = loop_.len();
        if n < 3 {
            return;
        }
        let mut removed = false;
        for i in 0..n {
            if loop_[i] == loop_[(i + 1) % n] {
                loop_.remove(i);
                removed = true;
                break;
            }
            if loop_[(i + n - 1) % n] == loop_[(i + 1) % n] {
                // spike at i
                let hi = (i + 1) % n;
                let lo = i;
                if hi > lo {
                    loop_.remove(hi);
                    loop_.remove(lo);
                } else {
                    loop_.remove(lo);
                    loop_.remove(hi);
                }
                removed = true;
                break;
            }
        }
        if !removed {
            return;
        }
    }
}
