//! Faces: ordered boundary loops over pool vertices, with a derived plane
//! and carried attributes.

use crate::float_types::{EPSILON, Real};
use crate::shell::plane::Plane;
use crate::shell::vertex::VertexPool;
use geo::{Contains, Coord, LineString, Point as GeoPoint, Polygon as GeoPolygon};
use nalgebra::Point3;

/// Material / layer identifiers carried by faces and containers. These must
/// survive every mutation an operation performs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    pub material: Option<String>,
    pub layer: Option<String>,
}

/// Relation of a point to a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointFace {
    /// Not on the face's plane at all.
    NotOnPlane,
    /// On the plane but outside the boundary (or inside a hole).
    Outside,
    /// Coincides with a boundary vertex.
    OnVertex,
    /// On a boundary segment's interior.
    OnEdge,
    /// Strictly interior to the face.
    Inside,
}

impl PointFace {
    /// Whether the point touches the face (interior, edge or vertex).
    pub fn is_on_face(self) -> bool {
        matches!(self, PointFace::Inside | PointFace::OnEdge | PointFace::OnVertex)
    }
}

/// A face: an outer loop plus optional hole loops of vertex-pool indices,
/// with the plane derived from the outer loop's winding.
#[derive(Debug, Clone)]
pub struct Face {
    /// Outer boundary, counter-clockwise when seen from the normal side.
    pub outer: Vec<usize>,
    /// Interior loops bounding holes.
    pub holes: Vec<Vec<usize>>,
    /// Plane derived from the outer loop; kept consistent on reversal.
    pub plane: Plane,
    pub attributes: Attributes,
}

impl Face {
    /// Positions of a loop.
    pub fn loop_points(loop_: &[usize], pool: &VertexPool) -> Vec<Point3<Real>> {
        loop_.iter().map(|&i| pool.position(i)).collect()
    }

    /// All boundary loops, outer first.
    pub fn loops(&self) -> impl Iterator<Item = &Vec<usize>> {
        std::iter::once(&self.outer).chain(self.holes.iter())
    }

    /// Directed vertex-index pairs along every boundary loop.
    pub fn edge_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for loop_ in self.loops() {
            let n = loop_.len();
            for i in 0..n {
                pairs.push((loop_[i], loop_[(i + 1) % n]));
            }
        }
        pairs
    }

    /// Whether any boundary loop walks the undirected pair `(a, b)`.
    pub fn uses_edge(&self, a: usize, b: usize) -> bool {
        self.edge_pairs()
            .iter()
            .any(|&(p, q)| (p == a && q == b) || (p == b && q == a))
    }

    /// Reverse the face's orientation in place: boundary winding and plane flip together.
    pub fn reverse(&mut self) {
        self.outer.reverse();
        for hole in &mut self.holes {
            hole.reverse();
        }
        self.plane.flip();
    }

    /// Mean of the outer-loop vertices. Interior for convex faces without
    /// holes; the sampler falls back to corner probes otherwise.
    pub fn centroid(&self, pool: &VertexPool) -> Point3<Real> {
        let sum = self
            .outer
            .iter()
            .fold(nalgebra::Vector3::zeros(), |acc, &i| acc + pool.position(i).coords);
        Point3::from(sum / self.outer.len() as Real)
    }

    /// Unsigned area of the face (outer area minus holes).
    pub fn area(&self, pool: &VertexPool) -> Real {
        let outer = self.loop_area(&self.outer, pool);
        let holes: Real = self.holes.iter().map(|h| self.loop_area(h, pool)).sum();
        (outer - holes).max(0.0)
    }

    fn loop_area(&self, loop_: &[usize], pool: &VertexPool) -> Real {
        let pts = self.project_loop(loop_, pool);
        let n = pts.len();
        let mut sum = 0.0;
        for i in 0..n {
            let (x0, y0) = pts[i];
            let (x1, y1) = pts[(i + 1) % n];
            sum += x0 * y1 - x1 * y0;
        }
        (sum * 0.5).abs()
    }

    fn project_loop(&self, loop_: &[usize], pool: &VertexPool) -> Vec<(Real, Real)> {
        loop_
            .iter()
            .map(|&i| self.plane.project(&pool.position(i)))
            .collect()
    }

    /// The face's boundary as a `geo` polygon in the plane's 2D basis.
    pub fn to_geo(&self, pool: &VertexPool) -> GeoPolygon<Real> {
        let ring = |loop_: &[usize]| -> LineString<Real> {
            LineString::new(
                self.project_loop(loop_, pool)
                    .into_iter()
                    .map(|(x, y)| Coord { x, y })
                    .collect(),
            )
        };
        GeoPolygon::new(
            ring(&self.outer),
            self.holes.iter().map(|h| ring(h)).collect(),
        )
    }

    /// Classify `point` against this face.
    ///
    /// Categories mirror what the boolean engine needs: a hit on a vertex
    /// or an edge still counts as touching the face, so a ray grazing a
    /// shared edge registers once per adjacent face and is deduplicated by
    /// the caller.
    pub fn classify_point(&self, point: &Point3<Real>, pool: &VertexPool) -> PointFace {
        if !self.plane.contains_point(point, EPSILON) {
            return PointFace::NotOnPlane;
        }
        for loop_ in self.loops() {
            for &i in loop_ {
                if (pool.position(i) - point).norm() <= EPSILON {
                    return PointFace::OnVertex;
                }
            }
        }
        for loop_ in self.loops() {
            let n = loop_.len();
            for i in 0..n {
                let a = pool.position(loop_[i]);
                let b = pool.position(loop_[(i + 1) % n]);
                if point_on_segment(point, &a, &b) {
                    return PointFace::OnEdge;
                }
            }
        }
        let (x, y) = self.plane.project(point);
        if self.to_geo(pool).contains(&GeoPoint::new(x, y)) {
            PointFace::Inside
        } else {
            PointFace::Outside
        }
    }
}

/// Whether `p` lies on the interior of segment `ab` (endpoints excluded by
/// the caller's vertex check).
fn point_on_segment(p: &Point3<Real>, a: &Point3<Real>, b: &Point3<Real>) -> bool {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 < EPSILON * EPSILON {
        return false;
    }
    let t = (p - a).dot(&ab) / len2;
    if !(0.0..=1.0).contains(&t) {
        return false;
    }
    ((a + ab * t) - p).norm() <= EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::plane::Plane;

    fn square_face(pool: &mut VertexPool) -> Face {
        let pts = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ];
        let outer: Vec<usize> = pts.iter().map(|p| pool.insert(*p)).collect();
        let plane = Plane::from_loop(&pts).unwrap();
        Face {
            outer,
            holes: Vec::new(),
            plane,
            attributes: Attributes::default(),
        }
    }

    #[test]
    fn classify_square() {
        let mut pool = VertexPool::new();
        let face = square_face(&mut pool);
        assert_eq!(
            face.classify_point(&Point3::new(1.0, 1.0, 0.0), &pool),
            PointFace::Inside
        );
        assert_eq!(
            face.classify_point(&Point3::new(1.0, 0.0, 0.0), &pool),
            PointFace::OnEdge
        );
        assert_eq!(
            face.classify_point(&Point3::new(2.0, 2.0, 0.0), &pool),
            PointFace::OnVertex
        );
        assert_eq!(
            face.classify_point(&Point3::new(3.0, 1.0, 0.0), &pool),
            PointFace::Outside
        );
        assert_eq!(
            face.classify_point(&Point3::new(1.0, 1.0, 0.5), &pool),
            PointFace::NotOnPlane
        );
    }

    #[test]
    fn classify_respects_holes() {
        let mut pool = VertexPool::new();
        let mut face = square_face(&mut pool);
        let hole_pts = [
            Point3::new(0.5, 0.5, 0.0),
            Point3::new(1.5, 0.5, 0.0),
            Point3::new(1.5, 1.5, 0.0),
            Point3::new(0.5, 1.5, 0.0),
        ];
        face.holes
            .push(hole_pts.iter().map(|p| pool.insert(*p)).collect());
        assert_eq!(
            face.classify_point(&Point3::new(1.0, 1.0, 0.0), &pool),
            PointFace::Outside
        );
        assert_eq!(
            face.classify_point(&Point3::new(0.25, 1.0, 0.0), &pool),
            PointFace::Inside
        );
        assert_eq!(
            face.classify_point(&Point3::new(0.5, 1.0, 0.0), &pool),
            PointFace::OnEdge
        );
    }

    #[test]
    fn reversal_flips_plane() {
        let mut pool = VertexPool::new();
        let mut face = square_face(&mut pool);
        let n = face.plane.normal();
        face.reverse();
        assert!((face.plane.normal() + n).norm() < 1e-12);
        // Classification is orientation-independent.
        assert_eq!(
            face.classify_point(&Point3::new(1.0, 1.0, 0.0), &pool),
            PointFace::Inside
        );
    }
}
