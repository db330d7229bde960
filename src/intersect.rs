//! The mesh-intersection primitive: insert the planar intersection of two
//! containers' faces as edges into both topologies.
//!
//! The boolean engine only depends on this module's contract: after
//! [`add_intersection_edges`] the seam between the two solids exists as
//! edges (splitting the faces they cross) in *both* shells. The pass is
//! applied once from each solid's perspective, so the result is symmetric
//! regardless of which operand is richer around the seam.
//!
//! Robustness is tolerance-based floating point: faces are re-cut as a
//! small planar arrangement (boundary loops plus constraint segments,
//! noded at mutual crossings, dangling chains pruned) rather than by exact
//! predicates.

use crate::float_types::{EPSILON, QUANTIZATION_FACTOR, Real};
use crate::model::{ContainerId, Model};
use crate::shell::{Face, Shell, VertexPool, edge_key};
use geo::{Contains, InteriorPoint, Intersects, Point as GeoPoint};
use nalgebra::{Matrix4, Point3, Vector3};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Insert the mutual intersection of `a` and `b` as edges into both
/// containers' shells. Returns `None` when either handle is stale.
pub fn add_intersection_edges(model: &mut Model, a: ContainerId, b: ContainerId) -> Option<()> {
    let ta = model.container(a)?.transform;
    let tb = model.container(b)?.transform;
    let shell_a = model.definition_of(a)?.shell.clone();
    let shell_b = model.definition_of(b)?.shell.clone();

    // Double pass: cuts for each solid are computed from that solid's own
    // perspective against the other, then applied to it.
    let b_in_a = ta.try_inverse()? * tb;
    let a_in_b = tb.try_inverse()? * ta;
    let cuts_a = collect_cuts(&shell_a, &shell_b, &b_in_a);
    let cuts_b = collect_cuts(&shell_b, &shell_a, &a_in_b);

    let def_a = model.container(a)?.definition;
    apply_cuts(&mut model.definition_mut(def_a)?.shell, cuts_a);
    let def_b = model.container(b)?.definition;
    apply_cuts(&mut model.definition_mut(def_b)?.shell, cuts_b);
    Some(())
}

/// For every face of `scope`, the segments (in scope-local coordinates)
/// where it crosses a face of `other`.
fn collect_cuts(
    scope: &Shell,
    other: &Shell,
    other_to_scope: &Matrix4<Real>,
) -> BTreeMap<usize, Vec<(Point3<Real>, Point3<Real>)>> {
    let mut moved = other.clone();
    moved.transform(other_to_scope);

    let mut cuts: BTreeMap<usize, Vec<(Point3<Real>, Point3<Real>)>> = BTreeMap::new();
    for (i, fa) in scope.faces.iter().enumerate() {
        for fb in &moved.faces {
            if fa.plane.is_parallel(&fb.plane) {
                continue;
            }
            let Some((origin, dir)) = fa.plane.intersect_plane(&fb.plane) else {
                continue;
            };
            let ia = line_face_intervals(fa, &scope.pool, &origin, &dir);
            if ia.is_empty() {
                continue;
            }
            let ib = line_face_intervals(fb, &moved.pool, &origin, &dir);
            for (t0, t1) in intersect_intervals(&ia, &ib) {
                cuts.entry(i)
                    .or_default()
                    .push((origin + dir * t0, origin + dir * t1));
            }
        }
    }
    cuts
}

fn cross2(a: (Real, Real), b: (Real, Real)) -> Real {
    a.0 * b.1 - a.1 * b.0
}

/// Parameter intervals along the line `origin + t * dir` (which lies in the
/// face's plane) that are covered by the closed face region. Crossings with
/// every boundary segment are collected, then each gap is classified by its
/// midpoint, which stays robust when a boundary edge is collinear with the
/// line.
fn line_face_intervals(
    face: &Face,
    pool: &VertexPool,
    origin: &Point3<Real>,
    dir: &Vector3<Real>,
) -> Vec<(Real, Real)> {
    let (u, v) = face.plane.basis();
    let proj = |p: &Point3<Real>| (u.dot(&p.coords), v.dot(&p.coords));
    let o2 = proj(origin);
    let d2 = (u.dot(dir), v.dot(dir));

    let mut ts: Vec<Real> = Vec::new();
    for loop_ in face.loops() {
        let n = loop_.len();
        for i in 0..n {
            let p3 = pool.position(loop_[i]);
            let q3 = pool.position(loop_[(i + 1) % n]);
            let p2 = proj(&p3);
            let q2 = proj(&q3);
            let r = (q2.0 - p2.0, q2.1 - p2.1);
            let denom = cross2(d2, r);
            if denom.abs() < EPSILON {
                // Parallel segment; collect its span when collinear.
                if cross2(d2, (p2.0 - o2.0, p2.1 - o2.1)).abs() < EPSILON {
                    ts.push((p3 - origin).dot(dir));
                    ts.push((q3 - origin).dot(dir));
                }
                continue;
            }
            let s = cross2(d2, (o2.0 - p2.0, o2.1 - p2.1)) / denom;
            if (-EPSILON..=1.0 + EPSILON).contains(&s) {
                let hit = p3 + (q3 - p3) * s;
                ts.push((hit - origin).dot(dir));
            }
        }
    }
    if ts.len() < 2 {
        return Vec::new();
    }
    ts.sort_by(Real::total_cmp);
    ts.dedup_by(|a, b| (*a - *b).abs() <= EPSILON);

    let polygon = face.to_geo(pool);
    let mut intervals = Vec::new();
    for w in ts.windows(2) {
        let (t0, t1) = (w[0], w[1]);
        if t1 - t0 <= EPSILON {
            continue;
        }
        let mid = origin + dir * ((t0 + t1) * 0.5);
        let m2 = proj(&mid);
        // Closed-region test: a midpoint on the boundary still counts, so
        // a line running along an existing edge is treated as covered.
        if polygon.intersects(&GeoPoint::new(m2.0, m2.1)) {
            intervals.push((t0, t1));
        }
    }
    intervals
}

/// Pairwise overlap of two interval lists along the same line parameter.
fn intersect_intervals(a: &[(Real, Real)], b: &[(Real, Real)]) -> Vec<(Real, Real)> {
    let mut out = Vec::new();
    for &(a0, a1) in a {
        for &(b0, b1) in b {
            let lo = a0.max(b0);
            let hi = a1.min(b1);
            if hi - lo > EPSILON {
                out.push((lo, hi));
            }
        }
    }
    out
}

/// Cut the collected faces, highest index first so the remaining indices
/// stay valid while faces are replaced.
fn apply_cuts(shell: &mut Shell, cuts: BTreeMap<usize, Vec<(Point3<Real>, Point3<Real>)>>) {
    for (&idx, segments) in cuts.iter().rev() {
        cut_face(shell, idx, segments);
    }
}

/// 2D arrangement scratch space for one face. Nodes carry both their
/// in-plane coordinates and the lifted 3D position.
struct Arrangement {
    pts2: Vec<(Real, Real)>,
    pts3: Vec<Point3<Real>>,
    lookup: HashMap<(i64, i64), usize>,
}

impl Arrangement {
    fn new() -> Self {
        Arrangement {
            pts2: Vec::new(),
            pts3: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    fn node(&mut self, p2: (Real, Real), p3: Point3<Real>) -> usize {
        let key = (
            (p2.0 * QUANTIZATION_FACTOR).round() as i64,
            (p2.1 * QUANTIZATION_FACTOR).round() as i64,
        );
        if let Some(&i) = self.lookup.get(&key) {
            return i;
        }
        let i = self.pts2.len();
        self.pts2.push(p2);
        self.pts3.push(p3);
        self.lookup.insert(key, i);
        i
    }
}

/// A traced cycle of the arrangement with its signed area (positive =
/// bounded region, negative = the far side of a ring).
struct Cycle {
    nodes: Vec<usize>,
    area: Real,
}

/// Re-cut one face as a planar arrangement of its boundary loops and the
/// constraint `segments`, replacing it with the bounded regions that remain
/// inside it. Boundary edges split by a constraint endpoint are split
/// globally so neighboring faces stay consistent.
fn cut_face(shell: &mut Shell, idx: usize, segments: &[(Point3<Real>, Point3<Real>)]) {
    let face = shell.faces[idx].clone();
    let plane = face.plane.clone();
    let (u, v) = plane.basis();
    let proj = |p: &Point3<Real>| (u.dot(&p.coords), v.dot(&p.coords));

    let mut arr = Arrangement::new();
    // (node, node, pool pair when this is a boundary segment)
    let mut soup: Vec<(usize, usize, Option<(usize, usize)>)> = Vec::new();
    for loop_ in face.loops() {
        let n = loop_.len();
        for i in 0..n {
            let (pa, pb) = (loop_[i], loop_[(i + 1) % n]);
            let p3 = shell.pool.position(pa);
            let q3 = shell.pool.position(pb);
            let n0 = arr.node(proj(&p3), p3);
            let n1 = arr.node(proj(&q3), q3);
            if n0 != n1 {
                soup.push((n0, n1, Some((pa, pb))));
            }
        }
    }
    for &(s0, s1) in segments {
        let n0 = arr.node(proj(&s0), s0);
        let n1 = arr.node(proj(&s1), s1);
        if n0 != n1 {
            soup.push((n0, n1, None));
        }
    }

    // Node the arrangement: split every segment at other segments'
    // endpoints lying on it and at proper crossings.
    let mut subsegs: Vec<(usize, usize, bool)> = Vec::new();
    let mut boundary_chains: Vec<((usize, usize), Vec<usize>)> = Vec::new();
    for i in 0..soup.len() {
        let (n0, n1, pool_pair) = soup[i];
        let a2 = arr.pts2[n0];
        let b2 = arr.pts2[n1];
        let r = (b2.0 - a2.0, b2.1 - a2.1);
        let len2 = r.0 * r.0 + r.1 * r.1;
        let mut splits: Vec<(Real, usize)> = vec![(0.0, n0), (1.0, n1)];
        for (j, &(m0, m1, _)) in soup.iter().enumerate() {
            if i == j {
                continue;
            }
            // Endpoints of segment j lying on segment i (T junctions).
            for node in [m0, m1] {
                if node == n0 || node == n1 {
                    continue;
                }
                let q2 = arr.pts2[node];
                let t = ((q2.0 - a2.0) * r.0 + (q2.1 - a2.1) * r.1) / len2;
                if !(0.0..=1.0).contains(&t) {
                    continue;
                }
                let foot = (a2.0 + r.0 * t - q2.0, a2.1 + r.1 * t - q2.1);
                if (foot.0 * foot.0 + foot.1 * foot.1).sqrt() <= EPSILON {
                    splits.push((t, node));
                }
            }
            // Proper crossings; the symmetric split lands when j's turn comes.
            let c2 = arr.pts2[m0];
            let e2 = arr.pts2[m1];
            let s = (e2.0 - c2.0, e2.1 - c2.1);
            let denom = cross2(r, s);
            if denom.abs() < EPSILON {
                continue;
            }
            let diff = (c2.0 - a2.0, c2.1 - a2.1);
            let ti = cross2(diff, s) / denom;
            let tj = cross2(diff, r) / denom;
            if ti > EPSILON && ti < 1.0 - EPSILON && tj > EPSILON && tj < 1.0 - EPSILON {
                let p2 = (a2.0 + r.0 * ti, a2.1 + r.1 * ti);
                let p3 = arr.pts3[n0] + (arr.pts3[n1] - arr.pts3[n0]) * ti;
                let node = arr.node(p2, p3);
                splits.push((ti, node));
            }
        }
        splits.sort_by(|x, y| x.0.total_cmp(&y.0));
        splits.dedup_by_key(|x| x.1);
        if let Some(pair) = pool_pair {
            if splits.len() > 2 {
                boundary_chains.push((pair, splits.iter().map(|&(_, n)| n).collect()));
            }
        }
        for w in splits.windows(2) {
            if w[0].1 != w[1].1 {
                subsegs.push((w[0].1, w[1].1, pool_pair.is_some()));
            }
        }
    }

    // Split edges globally where a constraint endpoint landed on a
    // boundary edge, keeping neighbor faces consistent.
    for ((pa, pb), chain) in &boundary_chains {
        let mut cur = *pa;
        for &node in &chain[1..chain.len() - 1] {
            let m = shell.pool.insert(arr.pts3[node]);
            shell.split_edge(cur, *pb, m);
            cur = m;
        }
    }

    // Dedupe: a constraint subsegment coinciding with a boundary
    // subsegment adds nothing.
    let mut seen: HashMap<(usize, usize), usize> = HashMap::new();
    let mut edges: Vec<(usize, usize, bool)> = Vec::new();
    for (n0, n1, boundary) in subsegs {
        let key = edge_key(n0, n1);
        match seen.get(&key) {
            Some(&slot) => {
                if boundary {
                    edges[slot].2 = true;
                }
            },
            None => {
                seen.insert(key, edges.len());
                edges.push((key.0, key.1, boundary));
            },
        }
    }

    // Prune dangling constraint chains: a cut that dead-ends in the
    // interior cannot split anything.
    loop {
        let mut degree: HashMap<usize, u32> = HashMap::new();
        for &(n0, n1, _) in &edges {
            *degree.entry(n0).or_insert(0) += 1;
            *degree.entry(n1).or_insert(0) += 1;
        }
        let before = edges.len();
        edges.retain(|&(n0, n1, boundary)| boundary || (degree[&n0] > 1 && degree[&n1] > 1));
        if edges.len() == before {
            break;
        }
    }
    if edges.iter().all(|&(_, _, boundary)| boundary) {
        // Nothing left to cut; boundary splits (if any) already happened.
        return;
    }

    let cycles = trace_cycles(&arr, &edges);
    let ring_polygon = |nodes: &[usize]| -> geo::Polygon<Real> {
        geo::Polygon::new(
            geo::LineString::new(
                nodes
                    .iter()
                    .map(|&n| geo::Coord {
                        x: arr.pts2[n].0,
                        y: arr.pts2[n].1,
                    })
                    .collect(),
            ),
            Vec::new(),
        )
    };

    // Negative cycles are hole rings (or the unbounded side): each one
    // belongs to the smallest positive region that strictly contains one of
    // its vertices. The whole-boundary negative cycle matches no region and
    // drops out.
    let positives: Vec<&Cycle> = cycles.iter().filter(|c| c.area > EPSILON).collect();
    let mut region_holes: HashMap<usize, Vec<Vec<usize>>> = HashMap::new();
    for cycle in cycles.iter().filter(|c| c.area < -EPSILON) {
        let probe = arr.pts2[cycle.nodes[0]];
        let probe = GeoPoint::new(probe.0, probe.1);
        let mut best: Option<(usize, Real)> = None;
        for (pi, pos) in positives.iter().enumerate() {
            if ring_polygon(&pos.nodes).contains(&probe)
                && best.map_or(true, |(_, area)| pos.area < area)
            {
                best = Some((pi, pos.area));
            }
        }
        if let Some((pi, _)) = best {
            region_holes.entry(pi).or_default().push(cycle.nodes.clone());
        }
    }

    // Keep regions whose interior lies inside the original face (its own
    // holes excluded); lift the 2D rings back through the vertex pool.
    let original = face.to_geo(&shell.pool);
    let mut new_faces: Vec<Face> = Vec::new();
    for (pi, pos) in positives.iter().enumerate() {
        let holes_2d = region_holes.get(&pi).cloned().unwrap_or_default();
        let region = geo::Polygon::new(
            ring_polygon(&pos.nodes).exterior().clone(),
            holes_2d.iter().map(|h| ring_polygon(h).exterior().clone()).collect(),
        );
        let Some(rep) = region.interior_point() else {
            continue;
        };
        if !original.contains(&rep) {
            continue;
        }
        let lift_ring =
            |nodes: &[usize], shell: &mut Shell| -> Vec<usize> {
                nodes.iter().map(|&n| shell.pool.insert(arr.pts3[n])).collect()
            };
        let outer = lift_ring(&pos.nodes, shell);
        let holes = holes_2d
            .iter()
            .map(|h| lift_ring(h, shell))
            .collect();
        new_faces.push(Face {
            outer,
            holes,
            plane: plane.clone(),
            attributes: face.attributes.clone(),
        });
    }
    if new_faces.is_empty() {
        // Tracing found nothing usable; leave the face untouched rather
        // than tearing a hole in the shell.
        return;
    }

    shell.faces.remove(idx);
    for f in new_faces {
        shell.insert_face(f);
    }
}

/// Trace every directed cycle of the arrangement graph, keeping the
/// interior on the left. Bounded regions come out with positive area.
fn trace_cycles(arr: &Arrangement, edges: &[(usize, usize, bool)]) -> Vec<Cycle> {
    let mut out: HashMap<usize, Vec<usize>> = HashMap::new();
    for &(n0, n1, _) in edges {
        out.entry(n0).or_default().push(n1);
        out.entry(n1).or_default().push(n0);
    }
    for (&node, targets) in out.iter_mut() {
        let p = arr.pts2[node];
        targets.sort_by(|&a, &b| {
            let pa = arr.pts2[a];
            let pb = arr.pts2[b];
            let aa = (pa.1 - p.1).atan2(pa.0 - p.0);
            let ab = (pb.1 - p.1).atan2(pb.0 - p.0);
            aa.total_cmp(&ab)
        });
        targets.dedup();
    }

    let mut visited: BTreeSet<(usize, usize)> = BTreeSet::new();
    let mut cycles = Vec::new();
    let mut starts: Vec<(usize, usize)> = Vec::new();
    for &(n0, n1, _) in edges {
        starts.push((n0, n1));
        starts.push((n1, n0));
    }
    for start in starts {
        if visited.contains(&start) {
            continue;
        }
        let mut nodes = Vec::new();
        let mut cur = start;
        loop {
            visited.insert(cur);
            nodes.push(cur.0);
            let (from, to) = cur;
            let targets = &out[&to];
            // The next edge is the one just before the reverse edge in
            // counter-clockwise order around the node.
            let pos = targets.iter().position(|&t| t == from).unwrap_or(0);
            let next = targets[(pos + targets.len() - 1) % targets.len()];
            cur = (to, next);
            if cur == start {
                break;
            }
            if nodes.len() > edges.len() * 2 + 4 {
                nodes.clear();
                break;
            }
        }
        if nodes.len() < 3 {
            continue;
        }
        let mut area = 0.0;
        for i in 0..nodes.len() {
            let p = arr.pts2[nodes[i]];
            let q = arr.pts2[nodes[(i + 1) % nodes.len()]];
            area += p.0 * q.1 - q.0 * p.1;
        }
        cycles.push(Cycle {
            nodes,
            area: area * 0.5,
        });
    }
    cycles
}
