//! The solid-boolean engine: union, subtract, trim and intersect on
//! containers, preserving the primary operand's identity and attributes.
//!
//! Each operation follows the same protocol: validate both operands,
//! isolate the secondary into a disposable copy, seed the mutual
//! intersection edges, select faces for removal per operator, merge what
//! remains of the secondary into the primary, then clean up seam artifacts
//! and report whether the result is solid. A `None` return means the
//! operation refused to start (a stale handle or a non-solid operand) and
//! nothing was mutated; `Some(false)` means the operation committed its
//! mutations but the result failed the final manifold test. There is no
//! rollback -- the caller owns the transaction boundary.

use crate::float_types::{EPSILON, Real};
use crate::intersect;
use crate::model::{ContainerId, Model};
use crate::shell::vertex::{QuantizedPoint, VertexPool, quantize_point};
use crate::shell::{EdgeKey, Face, PointFace, Shell};
use nalgebra::{Matrix4, Point3, Vector3};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

/// Ray direction for point-in-solid parity casts. Deliberately skew so the
/// ray is unlikely to graze a face edge-on; a single fixed value because
/// the requirement is determinism across calls, not randomness.
fn cast_direction() -> Vector3<Real> {
    Vector3::new(234.0, 1343.0, 345.0)
}

/// The four boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    Union,
    Subtract,
    /// Subtract, but the secondary operand is preserved in the model.
    Trim,
    Intersect,
}

/// Per-operator face-selection policy. One table instead of per-operator
/// code paths.
struct OpPolicy {
    /// Remove primary faces interior (true) or exterior (false) to the secondary.
    primary_interior: bool,
    /// Remove secondary faces interior (true) or exterior (false) to the primary.
    secondary_interior: bool,
    /// Orientation filter for corresponding-face pairs removed from both sides.
    corresponding_same: bool,
    /// Reverse the remaining secondary faces before merging: they become a
    /// newly exposed internal boundary.
    reverse_secondary: bool,
    /// Leave the original secondary container in the model.
    keep_secondary: bool,
}

impl BooleanOp {
    fn policy(self) -> OpPolicy {
        match self {
            BooleanOp::Union => OpPolicy {
                primary_interior: true,
                secondary_interior: true,
                corresponding_same: false,
                reverse_secondary: false,
                keep_secondary: false,
            },
            BooleanOp::Subtract | BooleanOp::Trim => OpPolicy {
                primary_interior: true,
                secondary_interior: false,
                corresponding_same: true,
                reverse_secondary: true,
                keep_secondary: self == BooleanOp::Trim,
            },
            BooleanOp::Intersect => OpPolicy {
                primary_interior: false,
                secondary_interior: false,
                corresponding_same: false,
                reverse_secondary: false,
                keep_secondary: false,
            },
        }
    }
}

impl Model {
    /// Whether the container's own (non-nested) geometry bounds a solid:
    /// every edge must bind an even number of faces. Nested children never
    /// affect the answer. `None` for a stale handle.
    pub fn is_solid(&self, container: ContainerId) -> Option<bool> {
        Some(self.definition_of(container)?.shell.is_manifold())
    }

    /// Ray-parity point-in-solid test. `point` is expressed in the
    /// container's parent frame. Returns `on_boundary` when the point lies
    /// on the solid's skin. With `verify_solid`, a non-solid container
    /// yields `None` instead of a meaningless parity.
    pub fn within(
        &self,
        point: &Point3<Real>,
        container: ContainerId,
        on_boundary: bool,
        verify_solid: bool,
    ) -> Option<bool> {
        if verify_solid && self.is_solid(container)? != true {
            return None;
        }
        let local = self.container(container)?.to_local(point);
        let shell = &self.definition_of(container)?.shell;
        let dir = cast_direction();

        let mut hits: Vec<QuantizedPoint> = Vec::new();
        for face in &shell.faces {
            if face.classify_point(&local, &shell.pool).is_on_face() {
                return Some(on_boundary);
            }
            let Some(hit) = face.plane.intersect_line(&local, &dir) else {
                continue;
            };
            if (hit - local).norm() <= EPSILON {
                continue;
            }
            // Only intersections along the cast direction count.
            if (hit - local).dot(&dir) <= 0.0 {
                continue;
            }
            // Count hits landing on the face, its edges or its vertices; a
            // ray grazing a shared edge registers once per adjacent face.
            if !face.classify_point(&hit, &shell.pool).is_on_face() {
                continue;
            }
            hits.push(quantize_point(&hit));
        }
        // Collapse the duplicate recordings of one grazing hit.
        hits.sort();
        hits.dedup();
        Some(hits.len() % 2 == 1)
    }

    // ------------------------------------------------------------------
    // Operators

    /// Unite `secondary` into `primary`. The secondary container is
    /// consumed; the primary keeps its identity and attributes.
    pub fn union(&mut self, primary: ContainerId, secondary: ContainerId) -> Option<bool> {
        self.boolean(BooleanOp::Union, primary, secondary)
    }

    /// Subtract `secondary` from `primary`. With `keep_secondary` this is a
    /// trim: the secondary stays in the model untouched.
    pub fn subtract(
        &mut self,
        primary: ContainerId,
        secondary: ContainerId,
        keep_secondary: bool,
    ) -> Option<bool> {
        let op = if keep_secondary {
            BooleanOp::Trim
        } else {
            BooleanOp::Subtract
        };
        self.boolean(op, primary, secondary)
    }

    /// Subtract with the secondary preserved.
    pub fn trim(&mut self, primary: ContainerId, secondary: ContainerId) -> Option<bool> {
        self.boolean(BooleanOp::Trim, primary, secondary)
    }

    /// Reduce `primary` to the volume common to both operands.
    pub fn intersect(&mut self, primary: ContainerId, secondary: ContainerId) -> Option<bool> {
        self.boolean(BooleanOp::Intersect, primary, secondary)
    }

    fn boolean(
        &mut self,
        op: BooleanOp,
        primary: ContainerId,
        secondary: ContainerId,
    ) -> Option<bool> {
        let policy = op.policy();

        // Validate before any mutation; a non-solid operand refuses the
        // whole operation with zero side effects.
        if self.is_solid(primary)? != true || self.is_solid(secondary)? != true {
            return None;
        }
        debug!(?op, "boolean operation");

        // The primary must not drag bystander instances of a shared
        // definition along with its mutation.
        self.make_unique(primary);

        // Consume the secondary through a private, disposable copy placed
        // in the parent frame.
        let temp = self.isolate(secondary, policy.keep_secondary)?;

        // Remember pre-existing coplanar seams, keyed in primary-local
        // coordinates so the snapshot survives the merge.
        let to_primary = self.container(primary)?.inverse_transform();
        let mut old_coplanar =
            coplanar_snapshot(&self.definition_of(primary)?.shell, &Matrix4::identity());
        old_coplanar
            .extend(coplanar_snapshot(&self.definition_of(temp)?.shell, &to_primary));

        // Seed the seam into both topologies.
        intersect::add_intersection_edges(self, primary, temp)?;

        // Select faces for removal. All indices are collected against the
        // post-intersection face lists before anything is erased.
        let mut remove_primary = self.find_faces(primary, temp, policy.primary_interior)?;
        let mut remove_secondary =
            self.find_faces(temp, primary, policy.secondary_interior)?;
        let pairs =
            self.corresponding_faces(primary, temp, Some(policy.corresponding_same))?;
        for &(fa, fb) in &pairs {
            remove_primary.insert(fa);
            remove_secondary.insert(fb);
        }
        let primary_def = self.container(primary)?.definition;
        let temp_def = self.container(temp)?.definition;
        self.definition_mut(primary_def)?
            .shell
            .erase_faces(&remove_primary);
        self.definition_mut(temp_def)?
            .shell
            .erase_faces(&remove_secondary);

        if policy.reverse_secondary {
            self.definition_mut(temp_def)?.shell.reverse_all_faces();
        }

        // Absorb the remaining secondary geometry; the disposable copy does
        // not outlive the call.
        self.merge_into(primary, temp, false)?;

        let shell = &mut self.definition_mut(primary_def)?.shell;

        // Purge edge records orphaned by the deleted faces.
        shell.purge_free_edges();

        // Remove coplanar seams introduced by the intersection, keeping the
        // ones that existed before the operation.
        let now = coplanar_edges(shell);
        for key in now {
            if !old_coplanar.contains(&snapshot_key(shell, key, &Matrix4::identity())) {
                shell.erase_edge_merging_faces(key);
            }
        }

        weld_hack(shell);

        self.is_solid(primary)
    }

    // ------------------------------------------------------------------
    // Selection helpers

    /// Faces of `scope` that are interior (or exterior) to `reference`,
    /// probed at an interior sample point. Faces sitting on the reference's
    /// boundary are never selected here; the corresponding-face matcher
    /// deals with those.
    fn find_faces(
        &self,
        scope: ContainerId,
        reference: ContainerId,
        interior: bool,
    ) -> Option<BTreeSet<usize>> {
        let container = self.container(scope)?;
        let shell = &self.definition_of(scope)?.shell;
        let mut selected = BTreeSet::new();
        for (i, face) in shell.faces.iter().enumerate() {
            let Some(point) = interior_point(face, &shell.pool) else {
                continue;
            };
            let global = container.to_parent(&point);
            // Boundary verdicts fold into the non-selected side; solidity
            // is not re-verified since transient non-manifold states are
            // expected here.
            if self.within(&global, reference, !interior, false) == Some(interior) {
                selected.insert(i);
            }
        }
        Some(selected)
    }

    /// Pairs of faces, one from each container, occupying the identical
    /// planar region in the global frame. `orientation`: `Some(true)` keeps
    /// same-direction pairs, `Some(false)` opposite, `None` all.
    fn corresponding_faces(
        &self,
        a: ContainerId,
        b: ContainerId,
        orientation: Option<bool>,
    ) -> Option<Vec<(usize, usize)>> {
        let (ca, cb) = (self.container(a)?, self.container(b)?);
        let sa = &self.definition_of(a)?.shell;
        let sb = &self.definition_of(b)?.shell;

        let global_verts = |shell: &Shell, t: &Matrix4<Real>| -> Vec<HashSet<QuantizedPoint>> {
            shell
                .faces
                .iter()
                .map(|f| {
                    f.loops()
                        .flatten()
                        .map(|&vi| quantize_point(&t.transform_point(&shell.pool.position(vi))))
                        .collect()
                })
                .collect()
        };
        let verts_a = global_verts(sa, &ca.transform);
        let verts_b = global_verts(sb, &cb.transform);

        let mut pairs = Vec::new();
        for (i, fa) in sa.faces.iter().enumerate() {
            let na = ca.transform.transform_vector(&fa.plane.normal());
            for (j, fb) in sb.faces.iter().enumerate() {
                let nb = cb.transform.transform_vector(&fb.plane.normal());
                if na.cross(&nb).norm() >= EPSILON {
                    continue;
                }
                if !verts_a[i].iter().all(|p| verts_b[j].contains(p)) {
                    continue;
                }
                if let Some(same) = orientation {
                    if (na.dot(&nb) > 0.0) != same {
                        continue;
                    }
                }
                pairs.push((i, j));
            }
        }
        Some(pairs)
    }
}

/// A point guaranteed to classify strictly interior to the face, or `None`
/// for a degenerate zero-area face. Exhausting every probe is an algorithm
/// failure: it is logged and the face skipped rather than aborting the
/// operation.
pub(crate) fn interior_point(face: &Face, pool: &VertexPool) -> Option<Point3<Real>> {
    // Invalid zero-area faces sometimes appear while intersecting.
    if face.area(pool) <= EPSILON {
        return None;
    }
    let centroid = face.centroid(pool);
    if face.classify_point(&centroid, pool) == PointFace::Inside {
        return Some(centroid);
    }
    // Probe just inside each corner by blending it with its two loop
    // neighbors; lands inside the face when the corner is convex.
    let n = face.outer.len();
    for i in 0..n {
        let c0 = pool.position(face.outer[i]);
        let c1 = pool.position(face.outer[(i + n - 1) % n]);
        let c2 = pool.position(face.outer[(i + n - 2) % n]);
        let p = lerp(&c0, &c2, 0.05);
        let p = lerp(&p, &c1, 0.05);
        if face.classify_point(&p, pool) == PointFace::Inside {
            return Some(p);
        }
    }
    warn!("failed to find an interior point on a face; skipping it");
    None
}

fn lerp(a: &Point3<Real>, b: &Point3<Real>, t: Real) -> Point3<Real> {
    Point3::from(a.coords * (1.0 - t) + b.coords * t)
}

/// Edges whose two adjacent faces are mutually coplanar: every vertex of
/// one face lies on the other's plane. These are the merge candidates left
/// behind when two coplanar surfaces are stitched by the intersection pass.
pub(crate) fn coplanar_edges(shell: &Shell) -> Vec<EdgeKey> {
    let counts = shell.edge_face_counts();
    shell
        .edges()
        .filter(|key| {
            if counts.get(key) != Some(&2) {
                return false;
            }
            let using = shell.faces_using_edge(key.0, key.1);
            if using.len() != 2 {
                return false;
            }
            let f0 = &shell.faces[using[0]];
            let f1 = &shell.faces[using[1]];
            f0.loops().flatten().all(|&vi| {
                f1.plane
                    .contains_point(&shell.pool.position(vi), EPSILON)
            })
        })
        .collect()
}

/// Frame-independent identity for a coplanar edge: its endpoints quantized
/// in a caller-chosen frame, ordered. Stable across the merge step, unlike
/// pool indices.
fn snapshot_key(
    shell: &Shell,
    key: EdgeKey,
    to_frame: &Matrix4<Real>,
) -> (QuantizedPoint, QuantizedPoint) {
    let a = quantize_point(&to_frame.transform_point(&shell.pool.position(key.0)));
    let b = quantize_point(&to_frame.transform_point(&shell.pool.position(key.1)));
    if a <= b { (a, b) } else { (b, a) }
}

fn coplanar_snapshot(
    shell: &Shell,
    to_frame: &Matrix4<Real>,
) -> HashSet<(QuantizedPoint, QuantizedPoint)> {
    coplanar_edges(shell)
        .into_iter()
        .map(|key| snapshot_key(shell, key, to_frame))
        .collect()
}

/// Best-effort stitch for coincident-but-unwelded edges: re-insert every
/// naked edge as a plain line segment and let the merge pass weld it.
fn weld_hack(shell: &mut Shell) {
    if shell.is_manifold() {
        return;
    }
    let naked = shell.naked_edges();
    let mut lines = Shell::new();
    for (a, b) in naked {
        lines.add_line(shell.pool.position(a), shell.pool.position(b));
    }
    shell.merge(&lines, &Matrix4::identity());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::Attributes;

    #[test]
    fn interior_point_of_an_l_face_avoids_the_notch() {
        let mut shell = Shell::new();
        let pts = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(1.9, 2.0, 0.0),
            Point3::new(1.9, 0.1, 0.0),
            Point3::new(0.0, 0.1, 0.0),
        ];
        let idx = shell.add_face(&pts, &[], Attributes::default()).unwrap();
        let face = &shell.faces[idx];
        // The vertex mean sits outside this thin L; the corner probes must
        // recover.
        let p = interior_point(face, &shell.pool).unwrap();
        assert_eq!(face.classify_point(&p, &shell.pool), PointFace::Inside);
    }

    #[test]
    fn coplanar_edges_found_only_between_coplanar_faces() {
        let mut shell = Shell::new();
        // Two coplanar squares sharing an edge...
        shell
            .add_face(
                &[
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(1.0, 1.0, 0.0),
                    Point3::new(0.0, 1.0, 0.0),
                ],
                &[],
                Attributes::default(),
            )
            .unwrap();
        shell
            .add_face(
                &[
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(2.0, 0.0, 0.0),
                    Point3::new(2.0, 1.0, 0.0),
                    Point3::new(1.0, 1.0, 0.0),
                ],
                &[],
                Attributes::default(),
            )
            .unwrap();
        // ...and a flap folded up from the far edge.
        shell
            .add_face(
                &[
                    Point3::new(2.0, 0.0, 0.0),
                    Point3::new(2.0, 0.0, 1.0),
                    Point3::new(2.0, 1.0, 1.0),
                    Point3::new(2.0, 1.0, 0.0),
                ],
                &[],
                Attributes::default(),
            )
            .unwrap();
        let seams = coplanar_edges(&shell);
        assert_eq!(seams.len(), 1);
        let (a, b) = seams[0];
        let pa = shell.pool.position(a);
        let pb = shell.pool.position(b);
        assert!((pa.x - 1.0).abs() < 1e-12 && (pb.x - 1.0).abs() < 1e-12);
    }

    #[test]
    fn seam_erasure_merges_the_two_squares() {
        let mut shell = Shell::new();
        shell
            .add_face(
                &[
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(1.0, 1.0, 0.0),
                    Point3::new(0.0, 1.0, 0.0),
                ],
                &[],
                Attributes::default(),
            )
            .unwrap();
        shell
            .add_face(
                &[
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(2.0, 0.0, 0.0),
                    Point3::new(2.0, 1.0, 0.0),
                    Point3::new(1.0, 1.0, 0.0),
                ],
                &[],
                Attributes::default(),
            )
            .unwrap();
        let seams = coplanar_edges(&shell);
        shell.erase_edge_merging_faces(seams[0]);
        assert_eq!(shell.faces.len(), 1);
        let merged = &shell.faces[0];
        assert!((merged.area(&shell.pool) - 2.0).abs() < 1e-9);
    }
}
