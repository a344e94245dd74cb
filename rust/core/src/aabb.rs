// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! AABB tree over mesh triangles
//!
//! A balanced binary tree built over triangle bounding boxes. Every level
//! splits its triangles at the median centroid along the longest axis of
//! their combined box (ties broken by triangle index, so the build is
//! deterministic). Nodes live in a flat array: the children of node `i` are
//! at `2i + 1` and `2i + 2`.
//!
//! [`IndexedMesh`] pairs a tree with the mesh it was built from and answers:
//! - nearest ray hit, all ray hits, any hit closer than a bound
//! - closest point on the surface

use crate::mesh::TriangleMesh;
use nalgebra::{Point3, Vector3};
use smallvec::{smallvec, SmallVec};
use std::sync::Arc;

/// Hits along one ray closer than this (in world length) are the same
/// surface crossing reported by two facets sharing an edge.
const DUPLICATE_HIT_DISTANCE: f64 = 1e-9;

/// Default relative guard on the Möller–Trumbore determinant.
pub const DEFAULT_PARALLEL_TOLERANCE: f64 = 1e-12;

const NPOS: usize = usize::MAX;
const INNER: usize = usize::MAX - 1;

type TraversalStack = SmallVec<[usize; 64]>;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    /// Inverted box that any point or box extends
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::MAX, f64::MAX, f64::MAX),
            max: Point3::new(f64::MIN, f64::MIN, f64::MIN),
        }
    }

    pub fn from_points(points: &[Point3<f64>]) -> Self {
        let mut bbox = Self::empty();
        for p in points {
            bbox.min = bbox.min.inf(p);
            bbox.max = bbox.max.sup(p);
        }
        bbox
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    pub fn extend_box(&mut self, other: &Aabb) {
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// Index of the axis with the largest extent
    pub fn longest_axis(&self) -> usize {
        let d = self.max - self.min;
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    /// Squared distance from `p` to the box, zero inside
    pub fn squared_exterior_distance(&self, p: &Point3<f64>) -> f64 {
        (0..3)
            .map(|axis| {
                let d = if p[axis] < self.min[axis] {
                    self.min[axis] - p[axis]
                } else if p[axis] > self.max[axis] {
                    p[axis] - self.max[axis]
                } else {
                    0.0
                };
                d * d
            })
            .sum()
    }

    /// Slab test restricted to `[t0, t1]`; returns the entry parameter.
    fn ray_entry(&self, ray: &RayQuery, t0: f64, t1: f64) -> Option<f64> {
        let mut tmin = t0;
        let mut tmax = t1;

        for axis in 0..3 {
            if ray.direction[axis] == 0.0 {
                // Parallel to this slab: inside or never
                if ray.origin[axis] < self.min[axis] || ray.origin[axis] > self.max[axis] {
                    return None;
                }
                continue;
            }

            let ta = (self.min[axis] - ray.origin[axis]) * ray.inv_direction[axis];
            let tb = (self.max[axis] - ray.origin[axis]) * ray.inv_direction[axis];
            let (near, far) = if ta <= tb { (ta, tb) } else { (tb, ta) };

            tmin = tmin.max(near);
            tmax = tmax.min(far);
            if tmin > tmax {
                return None;
            }
        }

        Some(tmin)
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone)]
struct Node {
    /// Facet index for leaves, `INNER` for inner nodes, `NPOS` for unused slots
    idx: usize,
    bbox: Aabb,
}

impl Node {
    fn empty() -> Self {
        Self {
            idx: NPOS,
            bbox: Aabb::empty(),
        }
    }

    #[inline]
    fn is_valid(&self) -> bool {
        self.idx != NPOS
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.is_valid() && self.idx != INNER
    }
}

struct BuildInput {
    facet: usize,
    bbox: Aabb,
    centroid: Point3<f64>,
}

/// Balanced AABB hierarchy over the facets of one mesh
#[derive(Debug, Clone, Default)]
pub struct AabbTree {
    nodes: Vec<Node>,
}

impl AabbTree {
    /// Build the tree over all facets of `mesh`.
    pub fn build(mesh: &TriangleMesh) -> Self {
        if mesh.is_empty() {
            return Self::default();
        }

        let mut input: Vec<BuildInput> = (0..mesh.triangle_count())
            .map(|facet| {
                let tri = mesh.triangle(facet);
                BuildInput {
                    facet,
                    bbox: Aabb::from_points(&tri),
                    centroid: Point3::from((tri[0].coords + tri[1].coords + tri[2].coords) / 3.0),
                }
            })
            .collect();

        let mut tree = Self {
            nodes: vec![Node::empty(); input.len().next_power_of_two() * 2 - 1],
        };
        tree.build_recursive(&mut input, 0);

        tracing::trace!(
            facets = mesh.triangle_count(),
            nodes = tree.nodes.len(),
            "built AABB tree"
        );

        tree
    }

    fn build_recursive(&mut self, input: &mut [BuildInput], node_idx: usize) {
        debug_assert!(!input.is_empty());
        debug_assert!(node_idx < self.nodes.len());

        if let [single] = input {
            self.nodes[node_idx] = Node {
                idx: single.facet,
                bbox: single.bbox,
            };
            return;
        }

        let mut bbox = Aabb::empty();
        for item in input.iter() {
            bbox.extend_box(&item.bbox);
        }
        let axis = bbox.longest_axis();

        // Median split, left half gets the extra element
        let center = (input.len() - 1) / 2;
        input.select_nth_unstable_by(center, |a, b| {
            a.centroid[axis]
                .total_cmp(&b.centroid[axis])
                .then(a.facet.cmp(&b.facet))
        });

        self.nodes[node_idx] = Node { idx: INNER, bbox };

        let (left, right) = input.split_at_mut(center + 1);
        self.build_recursive(left, Self::left_child_idx(node_idx));
        self.build_recursive(right, Self::right_child_idx(node_idx));
    }

    #[inline]
    fn left_child_idx(idx: usize) -> usize {
        idx * 2 + 1
    }

    #[inline]
    fn right_child_idx(idx: usize) -> usize {
        idx * 2 + 2
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of slots in the implicit node array
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Bounds of the whole tree
    pub fn bounds(&self) -> Option<Aabb> {
        self.nodes.first().filter(|n| n.is_valid()).map(|n| n.bbox)
    }

    #[inline]
    fn node(&self, idx: usize) -> Option<&Node> {
        self.nodes.get(idx).filter(|n| n.is_valid())
    }
}

/// Ray prepared for slab tests
struct RayQuery {
    origin: Point3<f64>,
    direction: Vector3<f64>,
    inv_direction: Vector3<f64>,
}

impl RayQuery {
    /// `None` for zero-length or non-finite input
    fn new(origin: &Point3<f64>, direction: &Vector3<f64>) -> Option<Self> {
        let len2 = direction.norm_squared();
        if !(len2 > 0.0 && len2.is_finite()) || !origin.coords.iter().all(|c| c.is_finite()) {
            return None;
        }
        Some(Self {
            origin: *origin,
            direction: *direction,
            inv_direction: direction.map(|d| if d == 0.0 { 0.0 } else { 1.0 / d }),
        })
    }
}

/// Ray/facet intersection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub facet: usize,
    /// Parameter along the query direction
    pub t: f64,
    pub position: Point3<f64>,
    /// Facet normal
    pub normal: Vector3<f64>,
}

/// Result of a closest point query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoint {
    pub facet: usize,
    pub point: Point3<f64>,
    /// Facet normal
    pub normal: Vector3<f64>,
    pub squared_distance: f64,
}

impl ClosestPoint {
    pub fn distance(&self) -> f64 {
        self.squared_distance.sqrt()
    }
}

/// A mesh together with its spatial index.
///
/// Read-only once built; queries never touch the mesh.
#[derive(Debug, Clone)]
pub struct IndexedMesh {
    mesh: Arc<TriangleMesh>,
    tree: AabbTree,
    parallel_tolerance: f64,
}

impl IndexedMesh {
    pub fn new(mesh: Arc<TriangleMesh>) -> Self {
        Self::with_parallel_tolerance(mesh, DEFAULT_PARALLEL_TOLERANCE)
    }

    /// `parallel_tolerance` bounds `|det| / (|e1| |e2| |dir|)` below which a
    /// ray is treated as parallel to a facet.
    pub fn with_parallel_tolerance(mesh: Arc<TriangleMesh>, parallel_tolerance: f64) -> Self {
        let tree = AabbTree::build(&mesh);
        Self {
            mesh,
            tree,
            parallel_tolerance,
        }
    }

    #[inline]
    pub fn mesh(&self) -> &Arc<TriangleMesh> {
        &self.mesh
    }

    #[inline]
    pub fn tree(&self) -> &AabbTree {
        &self.tree
    }

    /// Nearest intersection along the ray, ties resolved to the lower facet index.
    pub fn ray_hit(&self, origin: &Point3<f64>, direction: &Vector3<f64>) -> Option<RayHit> {
        let query = RayQuery::new(origin, direction)?;
        let mut best: Option<(f64, usize)> = None;

        self.for_each_ray_candidate(&query, f64::INFINITY, |facet, t_max| {
            if let Some(t) = self.intersect_facet(&query, facet) {
                let better = match best {
                    None => true,
                    Some((best_t, best_facet)) => t < best_t || (t == best_t && facet < best_facet),
                };
                if better {
                    best = Some((t, facet));
                    *t_max = t;
                }
            }
            true
        });

        best.map(|(t, facet)| self.make_hit(&query, facet, t))
    }

    /// All intersections sorted by distance.
    ///
    /// A crossing through an edge shared by two facets is reported once.
    pub fn ray_hits(&self, origin: &Point3<f64>, direction: &Vector3<f64>) -> Vec<RayHit> {
        let query = match RayQuery::new(origin, direction) {
            Some(q) => q,
            None => return Vec::new(),
        };

        let mut found: Vec<(f64, usize)> = Vec::new();
        self.for_each_ray_candidate(&query, f64::INFINITY, |facet, _| {
            if let Some(t) = self.intersect_facet(&query, facet) {
                found.push((t, facet));
            }
            true
        });

        found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let merge_dt = DUPLICATE_HIT_DISTANCE / query.direction.norm();
        let mut hits: Vec<RayHit> = Vec::with_capacity(found.len());
        for (t, facet) in found {
            if let Some(last) = hits.last() {
                if t - last.t <= merge_dt {
                    continue;
                }
            }
            hits.push(self.make_hit(&query, facet, t));
        }
        hits
    }

    /// Whether anything is hit with `0 < t < max_t`; stops at the first hit.
    pub fn any_hit(&self, origin: &Point3<f64>, direction: &Vector3<f64>, max_t: f64) -> bool {
        let query = match RayQuery::new(origin, direction) {
            Some(q) => q,
            None => return false,
        };

        let mut hit = false;
        self.for_each_ray_candidate(&query, max_t, |facet, _| {
            if let Some(t) = self.intersect_facet(&query, facet) {
                if t < max_t {
                    hit = true;
                    return false;
                }
            }
            true
        });
        hit
    }

    /// Closest point on the surface, ties resolved to the lower facet index.
    ///
    /// Degenerate facets are ignored; `None` if no facet has area.
    pub fn closest_point(&self, point: &Point3<f64>) -> Option<ClosestPoint> {
        if self.tree.is_empty() || !point.coords.iter().all(|c| c.is_finite()) {
            return None;
        }

        let mut best: Option<ClosestPoint> = None;
        let mut best_d2 = f64::INFINITY;
        let mut stack: TraversalStack = smallvec![0];

        while let Some(node_idx) = stack.pop() {
            let node = match self.tree.node(node_idx) {
                Some(n) => n,
                None => continue,
            };
            if node.bbox.squared_exterior_distance(point) > best_d2 {
                continue;
            }

            if node.is_leaf() {
                let facet = node.idx;
                let normal = self.mesh.facet_normal(facet);
                if normal == Vector3::zeros() {
                    continue;
                }
                let [a, b, c] = self.mesh.triangle(facet);
                let cp = closest_point_on_triangle(point, &a, &b, &c);
                let d2 = (cp - point).norm_squared();
                let better = d2 < best_d2
                    || (d2 == best_d2 && best.map_or(true, |b| facet < b.facet));
                if better {
                    best_d2 = d2;
                    best = Some(ClosestPoint {
                        facet,
                        point: cp,
                        normal,
                        squared_distance: d2,
                    });
                }
                continue;
            }

            let left = AabbTree::left_child_idx(node_idx);
            let right = AabbTree::right_child_idx(node_idx);
            let dl = self
                .tree
                .node(left)
                .map_or(f64::INFINITY, |n| n.bbox.squared_exterior_distance(point));
            let dr = self
                .tree
                .node(right)
                .map_or(f64::INFINITY, |n| n.bbox.squared_exterior_distance(point));

            // Nearer child on top of the stack
            if dl <= dr {
                stack.push(right);
                stack.push(left);
            } else {
                stack.push(left);
                stack.push(right);
            }
        }

        best
    }

    /// Squared distance to the surface
    pub fn squared_distance(&self, point: &Point3<f64>) -> Option<f64> {
        self.closest_point(point).map(|cp| cp.squared_distance)
    }

    /// Visit leaves whose boxes the ray enters within `[0, t_max]`. The
    /// visitor may shrink `t_max` and returns `false` to stop.
    fn for_each_ray_candidate(
        &self,
        query: &RayQuery,
        t_max: f64,
        mut visit: impl FnMut(usize, &mut f64) -> bool,
    ) {
        if self.tree.is_empty() {
            return;
        }

        let mut t_max = t_max;
        let mut stack: TraversalStack = smallvec![0];

        while let Some(node_idx) = stack.pop() {
            let node = match self.tree.node(node_idx) {
                Some(n) => n,
                None => continue,
            };
            if node.bbox.ray_entry(query, 0.0, t_max).is_none() {
                continue;
            }

            if node.is_leaf() {
                if !visit(node.idx, &mut t_max) {
                    return;
                }
            } else {
                stack.push(AabbTree::right_child_idx(node_idx));
                stack.push(AabbTree::left_child_idx(node_idx));
            }
        }
    }

    #[inline]
    fn intersect_facet(&self, query: &RayQuery, facet: usize) -> Option<f64> {
        let tri = self.mesh.triangle(facet);
        ray_triangle_intersect(
            &query.origin,
            &query.direction,
            &tri,
            self.parallel_tolerance,
        )
        .map(|(t, _, _)| t)
    }

    #[inline]
    fn make_hit(&self, query: &RayQuery, facet: usize, t: f64) -> RayHit {
        RayHit {
            facet,
            t,
            position: query.origin + query.direction * t,
            normal: self.mesh.facet_normal(facet),
        }
    }
}

/// Möller–Trumbore ray/triangle intersection.
///
/// Returns `(t, u, v)` for hits with `t > 0`. Rays parallel to the facet and
/// degenerate facets report no hit.
pub fn ray_triangle_intersect(
    origin: &Point3<f64>,
    dir: &Vector3<f64>,
    tri: &[Point3<f64>; 3],
    parallel_tolerance: f64,
) -> Option<(f64, f64, f64)> {
    let edge1 = tri[1] - tri[0];
    let edge2 = tri[2] - tri[0];

    let pvec = dir.cross(&edge2);
    let det = edge1.dot(&pvec);

    let scale = edge1.norm() * edge2.norm() * dir.norm();
    if det.abs() <= parallel_tolerance * scale || scale == 0.0 {
        return None;
    }

    let inv_det = 1.0 / det;
    let tvec = origin - tri[0];

    let u = tvec.dot(&pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(&edge1);
    let v = dir.dot(&qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(&qvec) * inv_det;
    if t > 0.0 {
        Some((t, u, v))
    } else {
        None
    }
}

/// Closest point on a triangle (Ericson, Real-Time Collision Detection 5.1.5)
pub fn closest_point_on_triangle(
    p: &Point3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> Point3<f64> {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Axis-aligned unit cube centered at the origin, outward facing
    fn cube() -> Arc<TriangleMesh> {
        let v = vec![
            Point3::new(-0.5, -0.5, -0.5),
            Point3::new(0.5, -0.5, -0.5),
            Point3::new(0.5, 0.5, -0.5),
            Point3::new(-0.5, 0.5, -0.5),
            Point3::new(-0.5, -0.5, 0.5),
            Point3::new(0.5, -0.5, 0.5),
            Point3::new(0.5, 0.5, 0.5),
            Point3::new(-0.5, 0.5, 0.5),
        ];
        let f = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
            [0, 1, 5],
            [0, 5, 4],
            [3, 7, 6],
            [3, 6, 2],
        ];
        Arc::new(TriangleMesh::new(v, f))
    }

    fn brute_force_closest(mesh: &TriangleMesh, p: &Point3<f64>) -> f64 {
        (0..mesh.triangle_count())
            .map(|i| {
                let [a, b, c] = mesh.triangle(i);
                (closest_point_on_triangle(p, &a, &b, &c) - p).norm_squared()
            })
            .fold(f64::INFINITY, f64::min)
    }

    #[test]
    fn test_tree_layout() {
        let mesh = cube();
        let tree = AabbTree::build(&mesh);
        // 12 facets -> 16 leaves slots -> 31 nodes
        assert_eq!(tree.node_count(), 31);
        let bounds = tree.bounds().unwrap();
        assert_eq!(bounds.min, Point3::new(-0.5, -0.5, -0.5));
        assert_eq!(bounds.max, Point3::new(0.5, 0.5, 0.5));

        let leaves = tree.nodes.iter().filter(|n| n.is_leaf()).count();
        assert_eq!(leaves, 12);
    }

    #[test]
    fn test_empty_mesh_answers_nothing() {
        let index = IndexedMesh::new(Arc::new(TriangleMesh::default()));
        assert!(index.tree().is_empty());
        let o = Point3::new(0.0, 0.0, 5.0);
        let d = Vector3::new(0.0, 0.0, -1.0);
        assert!(index.ray_hit(&o, &d).is_none());
        assert!(index.ray_hits(&o, &d).is_empty());
        assert!(!index.any_hit(&o, &d, f64::INFINITY));
        assert!(index.closest_point(&o).is_none());
    }

    #[test]
    fn test_nearest_hit() {
        let index = IndexedMesh::new(cube());
        let hit = index
            .ray_hit(&Point3::new(0.1, 0.2, 5.0), &Vector3::new(0.0, 0.0, -1.0))
            .unwrap();
        assert_relative_eq!(hit.t, 4.5, epsilon = 1e-12);
        assert_relative_eq!(hit.position, Point3::new(0.1, 0.2, 0.5), epsilon = 1e-12);
        assert_relative_eq!(hit.normal, Vector3::z(), epsilon = 1e-6);
    }

    #[test]
    fn test_parametric_distance_scales_with_direction() {
        let index = IndexedMesh::new(cube());
        let hit = index
            .ray_hit(&Point3::new(0.1, 0.2, 5.0), &Vector3::new(0.0, 0.0, -2.0))
            .unwrap();
        assert_relative_eq!(hit.t, 2.25, epsilon = 1e-12);
    }

    #[test]
    fn test_all_hits_sorted_and_deduplicated() {
        let index = IndexedMesh::new(cube());
        // Passes through the diagonal edge shared by both top facets
        let hits = index.ray_hits(&Point3::new(0.0, 0.0, 5.0), &Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(hits.len(), 2);
        assert!(hits[0].t < hits[1].t);
        assert_relative_eq!(hits[0].normal, Vector3::z(), epsilon = 1e-6);
        assert_relative_eq!(hits[1].normal, -Vector3::z(), epsilon = 1e-6);
    }

    #[test]
    fn test_any_hit_respects_bound() {
        let index = IndexedMesh::new(cube());
        let o = Point3::new(0.1, 0.2, 5.0);
        let d = Vector3::new(0.0, 0.0, -1.0);
        assert!(index.any_hit(&o, &d, f64::INFINITY));
        assert!(index.any_hit(&o, &d, 4.6));
        assert!(!index.any_hit(&o, &d, 4.4));
    }

    #[test]
    fn test_degenerate_rays() {
        let index = IndexedMesh::new(cube());
        let o = Point3::new(0.1, 0.2, 5.0);
        assert!(index.ray_hit(&o, &Vector3::zeros()).is_none());
        assert!(index
            .ray_hit(&o, &Vector3::new(f64::NAN, 0.0, -1.0))
            .is_none());
        // Pointing away
        assert!(index.ray_hit(&o, &Vector3::new(0.0, 0.0, 1.0)).is_none());
        // Parallel to the top face, above it
        assert!(index
            .ray_hit(&Point3::new(-5.0, 0.0, 0.75), &Vector3::new(1.0, 0.0, 0.0))
            .is_none());
    }

    #[test]
    fn test_ray_from_inside_hits_exit_face() {
        let index = IndexedMesh::new(cube());
        let hits = index.ray_hits(&Point3::new(0.1, 0.1, 0.0), &Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(hits.len(), 1);
        assert_relative_eq!(hits[0].position.z, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_facet_is_ignored() {
        let mesh = Arc::new(TriangleMesh::new(
            vec![
                Point3::new(-1.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 0.0, 0.0),
            ],
            vec![[0, 1, 2]],
        ));
        let index = IndexedMesh::new(mesh);
        assert!(index
            .ray_hit(&Point3::new(0.0, 0.0, 1.0), &Vector3::new(0.0, 0.0, -1.0))
            .is_none());
        assert!(index.closest_point(&Point3::new(0.0, 1.0, 0.0)).is_none());
    }

    #[test]
    fn test_closest_point_matches_brute_force() {
        let mesh = cube();
        let index = IndexedMesh::new(mesh.clone());

        for p in [
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.1, 0.1, 0.2),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(-0.3, 3.0, -0.2),
        ] {
            let cp = index.closest_point(&p).unwrap();
            assert_relative_eq!(cp.squared_distance, brute_force_closest(&mesh, &p), epsilon = 1e-12);
        }

        let cp = index.closest_point(&Point3::new(2.0, 0.1, 0.0)).unwrap();
        assert_relative_eq!(cp.point, Point3::new(0.5, 0.1, 0.0), epsilon = 1e-12);
        assert_relative_eq!(cp.normal, Vector3::x(), epsilon = 1e-6);
        assert_relative_eq!(cp.distance(), 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_build_is_order_independent() {
        let mesh = cube();
        let mut reversed: Vec<[u32; 3]> = mesh.indices().to_vec();
        reversed.reverse();
        let other = Arc::new(TriangleMesh::new(mesh.vertices().to_vec(), reversed));

        let a = IndexedMesh::new(mesh);
        let b = IndexedMesh::new(other);
        let o = Point3::new(0.3, -0.2, 4.0);
        let d = Vector3::new(0.0, 0.0, -1.0);
        assert_relative_eq!(a.ray_hit(&o, &d).unwrap().position, b.ray_hit(&o, &d).unwrap().position);
        let p = Point3::new(0.2, 0.9, 0.1);
        assert_relative_eq!(
            a.squared_distance(&p).unwrap(),
            b.squared_distance(&p).unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_closest_point_on_triangle_regions() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);

        assert_eq!(closest_point_on_triangle(&Point3::new(-1.0, -1.0, 0.0), &a, &b, &c), a);
        assert_eq!(closest_point_on_triangle(&Point3::new(2.0, -0.5, 0.0), &a, &b, &c), b);
        assert_relative_eq!(
            closest_point_on_triangle(&Point3::new(0.25, 0.25, 3.0), &a, &b, &c),
            Point3::new(0.25, 0.25, 0.0)
        );
        assert_relative_eq!(
            closest_point_on_triangle(&Point3::new(1.0, 1.0, 0.0), &a, &b, &c),
            Point3::new(0.5, 0.5, 0.0)
        );
    }
}
