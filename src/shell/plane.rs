//! Planes derived from face loops.

use crate::float_types::{EPSILON, Real};
use nalgebra::{Point3, Vector3};

/// An oriented plane in Hessian normal form: `normal · p = offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    /// Unit normal vector of the plane
    pub normal: Vector3<Real>,
    /// Distance from origin along the normal
    pub offset: Real,
}

impl Plane {
    /// Create a new plane from a normal vector and distance. The normal is
    /// normalized on the way in.
    pub fn from_normal(normal: Vector3<Real>, offset: Real) -> Self {
        Plane {
            normal: normal.normalize(),
            offset,
        }
    }

    /// Create a plane from three points.
    /// The normal direction follows the right-hand rule: (p2-p1) × (p3-p1).
    ///
    /// Returns `None` for collinear or coincident points.
    pub fn from_points(
        p1: &Point3<Real>,
        p2: &Point3<Real>,
        p3: &Point3<Real>,
    ) -> Option<Self> {
        let normal = (p2 - p1).cross(&(p3 - p1));
        if normal.norm_squared() < EPSILON * EPSILON {
            return None;
        }
        let normal = normal.normalize();
        Some(Plane {
            normal,
            offset: normal.dot(&p1.coords),
        })
    }

    /// Create a plane from an ordered boundary loop using Newell's method,
    /// so the normal agrees with the loop's winding even for non-convex
    /// loops whose first three vertices happen to turn the wrong way.
    ///
    /// Returns `None` when the loop encloses no area.
    pub fn from_loop(points: &[Point3<Real>]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        let mut normal = Vector3::zeros();
        for (curr, next) in points.iter().zip(points.iter().cycle().skip(1)) {
            normal += (curr - Point3::origin()).cross(&(next - Point3::origin()));
        }
        if normal.norm_squared() < EPSILON * EPSILON {
            return None;
        }
        let normal = normal.normalize();
        // Anchor on the loop's mean point rather than an arbitrary vertex.
        let mean = points
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords)
            / points.len() as Real;
        Some(Plane {
            normal,
            offset: normal.dot(&mean),
        })
    }

    /// Get the plane normal
    pub const fn normal(&self) -> Vector3<Real> {
        self.normal
    }

    /// Flip the plane (reverse normal and distance)
    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.offset = -self.offset;
    }

    /// Signed distance from `point` to the plane, positive on the normal side.
    pub fn signed_distance(&self, point: &Point3<Real>) -> Real {
        self.normal.dot(&point.coords) - self.offset
    }

    /// Whether `point` lies on the plane to within `tol`.
    pub fn contains_point(&self, point: &Point3<Real>, tol: Real) -> bool {
        self.signed_distance(point).abs() <= tol
    }

    /// Whether `other` is parallel to this plane (either direction).
    pub fn is_parallel(&self, other: &Plane) -> bool {
        self.normal.cross(&other.normal).norm() < EPSILON
    }

    /// Intersect the infinite line `origin + t * direction` with the plane.
    ///
    /// Returns `None` when the line is parallel to the plane (including the
    /// coplanar case, which produces no single intersection point).
    pub fn intersect_line(
        &self,
        origin: &Point3<Real>,
        direction: &Vector3<Real>,
    ) -> Option<Point3<Real>> {
        let denom = self.normal.dot(direction);
        if denom.abs() < EPSILON {
            return None;
        }
        let t = (self.offset - self.normal.dot(&origin.coords)) / denom;
        Some(origin + direction * t)
    }

    /// Intersect two planes into a line `(point, direction)`.
    ///
    /// Returns `None` for parallel planes.
    pub fn intersect_plane(&self, other: &Plane) -> Option<(Point3<Real>, Vector3<Real>)> {
        let dir = self.normal.cross(&other.normal);
        let denom = dir.norm_squared();
        if denom < EPSILON * EPSILON {
            return None;
        }
        // Point on both planes, closest to the origin of the pencil.
        let p = ((other.normal * self.offset - self.normal * other.offset).cross(&dir))
            / denom;
        Some((Point3::from(p), dir.normalize()))
    }

    /// Build an orthonormal basis `(u, v)` spanning the plane, for 2D
    /// projection. The basis is right-handed with the normal.
    pub fn basis(&self) -> (Vector3<Real>, Vector3<Real>) {
        let mut u = if self.normal.z.abs() > self.normal.x.abs()
            || self.normal.z.abs() > self.normal.y.abs()
        {
            // normal is closer to ±Z ⇒ cross with X
            Vector3::x().cross(&self.normal)
        } else {
            // otherwise cross with Z
            Vector3::z().cross(&self.normal)
        };
        u.normalize_mut();
        let v = self.normal.cross(&u);
        (u, v)
    }

    /// Project `point` into the plane's 2D basis coordinates.
    pub fn project(&self, point: &Point3<Real>) -> (Real, Real) {
        let (u, v) = self.basis();
        (u.dot(&point.coords), v.dot(&point.coords))
    }
}
