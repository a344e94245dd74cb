// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cached plane cross-sections of a mesh
//!
//! [`MeshClipper`] cuts a mesh (optionally minus a negative mesh, optionally
//! bounded by a second limiting plane) with a world-space plane and keeps
//! the result until one of its inputs changes. The result is a list of
//! [`CutIsland`]s, each with a filled model and an outline model ready for
//! an external renderer.
//!
//! The cut is computed in a 2D frame attached to the plane in mesh space:
//! the frame rotation takes +Z onto the local plane normal, the frame
//! origin sits on the plane.

use crate::contour::contour_ribbon;
use crate::polygon::{self, contour_centroid, BoundingBox2, ExPolygon};
use crate::slicing::{chain_segments, slice_mesh, Segment2};
use crate::triangulation::triangulate_expolygon;
use meshcut_core::{ClippingPlane, RenderMesh, TriangleMesh};
use nalgebra::{Matrix4, Point2, Point3, UnitQuaternion, Vector2, Vector3};
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Matrices closer than this (per element) count as the same transformation
const TRANSFORMATION_EPSILON: f64 = 1e-12;

/// In-plane component of a limiting plane normal below which it is
/// considered parallel to the cut
const PARALLEL_LIMIT: f64 = 1e-9;

/// Tunable constants of the cut pipeline
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClipperConfig {
    /// Segment endpoints closer than this are joined (mesh units)
    pub chain_tolerance: f64,
    /// Longest gap an open chain may have and still be closed (mesh units)
    pub gap_closing_distance: f64,
    /// Vertices this close to the plane lie on it (mesh units)
    pub plane_tolerance: f64,
    /// Islands and holes with a smaller area are dropped
    pub min_island_area: f64,
    /// Shift of the fill model along the plane normal (world units); the
    /// outline is shifted twice as far
    pub z_fighting_offset: f64,
}

impl Default for ClipperConfig {
    fn default() -> Self {
        Self {
            chain_tolerance: 1e-6,
            gap_closing_distance: 1e-3,
            plane_tolerance: 1e-9,
            min_island_area: 1e-10,
            z_fighting_offset: 0.001,
        }
    }
}

/// Receiver of cut geometry
pub trait CutRenderer {
    /// Draw one island model; positions are in world space.
    fn draw(&mut self, island: usize, model: &RenderMesh, color: [f32; 4]);
}

/// One connected region of the cross-section
#[derive(Debug, Clone)]
pub struct CutIsland {
    expoly: ExPolygon,
    bbox: BoundingBox2,
    fill: Option<RenderMesh>,
    contour: RenderMesh,
    disabled: bool,
    hash: u64,
}

impl CutIsland {
    /// Region in the cut's 2D frame
    #[inline]
    pub fn polygon(&self) -> &ExPolygon {
        &self.expoly
    }

    #[inline]
    pub fn bbox(&self) -> &BoundingBox2 {
        &self.bbox
    }

    /// Filled model, `None` when filling is off or triangulation failed
    #[inline]
    pub fn fill(&self) -> Option<&RenderMesh> {
        self.fill.as_ref()
    }

    /// Outline model, empty when the contour width is zero
    #[inline]
    pub fn contour(&self) -> &RenderMesh {
        &self.contour
    }

    #[inline]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Content hash of the polygon vertices
    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }
}

/// All islands for one input combination
#[derive(Debug, Clone)]
pub struct ClipResult {
    islands: Vec<CutIsland>,
    trafo: Matrix4<f64>,
}

impl ClipResult {
    fn empty() -> Self {
        Self {
            islands: Vec::new(),
            trafo: Matrix4::identity(),
        }
    }

    #[inline]
    pub fn islands(&self) -> &[CutIsland] {
        &self.islands
    }

    /// Maps `(x, y, 0)` in the cut's 2D frame to world space
    #[inline]
    pub fn trafo(&self) -> &Matrix4<f64> {
        &self.trafo
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.islands.is_empty()
    }

    /// Islands that are neither disabled nor listed in `ignore_idxs`
    fn visible<'a>(
        &'a self,
        ignore_idxs: Option<&'a [usize]>,
    ) -> impl Iterator<Item = (usize, &'a CutIsland)> + 'a {
        self.islands
            .iter()
            .enumerate()
            .filter(move |(idx, island)| {
                !island.disabled && !ignore_idxs.map_or(false, |ignore| ignore.contains(idx))
            })
    }
}

/// 2D frame of the cut plane in mesh space
struct CutFrame {
    /// Frame to mesh rotation, +Z onto the plane normal
    rotation: UnitQuaternion<f64>,
    normal: Vector3<f64>,
    height: f64,
    to_world: Matrix4<f64>,
}

impl CutFrame {
    fn new(trafo: &Matrix4<f64>, local_plane: &ClippingPlane) -> Self {
        let normal = local_plane.normal();
        let rotation = UnitQuaternion::rotation_between(&Vector3::z(), &normal).unwrap_or_else(
            || UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI),
        );
        let height = local_plane.offset();
        let to_world = trafo
            * rotation.to_homogeneous()
            * Matrix4::new_translation(&Vector3::new(0.0, 0.0, height));

        Self {
            rotation,
            normal,
            height,
            to_world,
        }
    }

    #[inline]
    fn project(&self, p: &Point3<f64>) -> Point2<f64> {
        self.rotation.inverse_transform_point(p).xy()
    }

    #[inline]
    fn lift(&self, p: &Point2<f64>) -> Point3<f64> {
        self.to_world.transform_point(&Point3::new(p.x, p.y, 0.0))
    }

    /// Average world length of a unit step in the frame's X and Y
    fn in_plane_scale(&self) -> f64 {
        let scale = (self.to_world.transform_vector(&Vector3::x()).norm()
            + self.to_world.transform_vector(&Vector3::y()).norm())
            * 0.5;
        if scale > f64::EPSILON {
            scale
        } else {
            1.0
        }
    }

    /// Whether the plane misses the box spanned by `min`/`max`
    fn misses_box(&self, min: &Point3<f64>, max: &Point3<f64>, tolerance: f64) -> bool {
        let mut above = false;
        let mut below = false;
        for i in 0..8 {
            let corner = Point3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            );
            let s = self.normal.dot(&corner.coords) - self.height;
            above |= s >= -tolerance;
            below |= s <= tolerance;
        }
        !(above && below)
    }
}

/// Plane cross-section of a mesh with lazy, dirty-tracked recomputation.
///
/// Setters only record their input; the cut is recomputed on the next
/// query. A setter leaves the cached result alone when the value did not
/// change (planes by value, meshes by `Arc` identity, transformations
/// element-wise).
///
/// The meshes are shared immutable handles; the clipper never modifies them.
#[derive(Debug, Clone)]
pub struct MeshClipper {
    mesh: Option<Arc<TriangleMesh>>,
    negative_mesh: Option<Arc<TriangleMesh>>,
    plane: ClippingPlane,
    limiting_plane: ClippingPlane,
    trafo: Matrix4<f64>,
    fill_cut: bool,
    contour_width: f64,
    config: ClipperConfig,
    result: Option<ClipResult>,
    revision: u64,
}

impl Default for MeshClipper {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshClipper {
    pub fn new() -> Self {
        Self::with_config(ClipperConfig::default())
    }

    pub fn with_config(config: ClipperConfig) -> Self {
        Self {
            mesh: None,
            negative_mesh: None,
            plane: ClippingPlane::clips_nothing(),
            limiting_plane: ClippingPlane::clips_nothing(),
            trafo: Matrix4::identity(),
            fill_cut: true,
            contour_width: 0.0,
            config,
            result: None,
            revision: 0,
        }
    }

    #[inline]
    pub fn config(&self) -> &ClipperConfig {
        &self.config
    }

    #[inline]
    pub fn plane(&self) -> &ClippingPlane {
        &self.plane
    }

    #[inline]
    pub fn limiting_plane(&self) -> &ClippingPlane {
        &self.limiting_plane
    }

    #[inline]
    pub fn transformation(&self) -> &Matrix4<f64> {
        &self.trafo
    }

    /// Number of recomputations so far
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether a result is cached for the current inputs
    #[inline]
    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    pub fn set_plane(&mut self, plane: &ClippingPlane) {
        if self.plane != *plane {
            self.plane = *plane;
            self.invalidate();
        }
    }

    /// Second plane bounding the cut, e.g. the far face of a thin slab
    pub fn set_limiting_plane(&mut self, plane: &ClippingPlane) {
        if self.limiting_plane != *plane {
            self.limiting_plane = *plane;
            self.invalidate();
        }
    }

    pub fn set_mesh(&mut self, mesh: Arc<TriangleMesh>) {
        if !same_mesh(&self.mesh, Some(&mesh)) {
            self.mesh = Some(mesh);
            self.invalidate();
        }
    }

    /// Mesh whose cross-section is subtracted from the main one
    pub fn set_negative_mesh(&mut self, mesh: Option<Arc<TriangleMesh>>) {
        if !same_mesh(&self.negative_mesh, mesh.as_ref()) {
            self.negative_mesh = mesh;
            self.invalidate();
        }
    }

    /// Mesh to world transformation shared by both meshes
    pub fn set_transformation(&mut self, trafo: &Matrix4<f64>) {
        let changed = self
            .trafo
            .iter()
            .zip(trafo.iter())
            .any(|(a, b)| (a - b).abs() > TRANSFORMATION_EPSILON);
        if changed {
            self.trafo = *trafo;
            self.invalidate();
        }
    }

    /// Choose whether the cut is filled and how wide its outline is (world
    /// units, zero for none).
    pub fn set_behaviour(&mut self, fill_cut: bool, contour_width: f64) {
        let contour_width = if contour_width.is_finite() {
            contour_width.max(0.0)
        } else {
            0.0
        };
        if self.fill_cut != fill_cut || self.contour_width != contour_width {
            self.fill_cut = fill_cut;
            self.contour_width = contour_width;
            self.invalidate();
        }
    }

    /// Drop the cached result
    #[inline]
    pub fn invalidate(&mut self) {
        self.result = None;
    }

    /// Hide or show one island without recomputing the cut.
    ///
    /// Returns `false` when there is no such island.
    pub fn set_island_disabled(&mut self, idx: usize, disabled: bool) -> bool {
        match self.ensure_result().islands.get_mut(idx) {
            Some(island) => {
                island.disabled = disabled;
                true
            }
            None => false,
        }
    }

    pub fn clip_result(&mut self) -> &ClipResult {
        self.ensure_result()
    }

    pub fn islands(&mut self) -> &[CutIsland] {
        &self.ensure_result().islands
    }

    /// Hand the filled model of every visible island to `renderer`.
    pub fn render_cut(
        &mut self,
        renderer: &mut dyn CutRenderer,
        color: [f32; 4],
        ignore_idxs: Option<&[usize]>,
    ) {
        let result = self.ensure_result();
        for (idx, island) in result.visible(ignore_idxs) {
            if let Some(fill) = &island.fill {
                renderer.draw(idx, fill, color);
            }
        }
    }

    /// Hand the outline model of every visible island to `renderer`.
    pub fn render_contour(
        &mut self,
        renderer: &mut dyn CutRenderer,
        color: [f32; 4],
        ignore_idxs: Option<&[usize]>,
    ) {
        let result = self.ensure_result();
        for (idx, island) in result.visible(ignore_idxs) {
            if !island.contour.is_empty() {
                renderer.draw(idx, &island.contour, color);
            }
        }
    }

    /// Index of the island containing the projection of a world point onto
    /// the cut plane. Points inside holes belong to no island.
    pub fn is_projection_inside_cut(&mut self, point: &Point3<f64>) -> Option<usize> {
        let result = self.ensure_result();
        if result.islands.is_empty() {
            return None;
        }

        let inverse = result.trafo.try_inverse()?;
        let p = inverse.transform_point(point).xy();
        result
            .islands
            .iter()
            .position(|island| island.bbox.contains(&p) && island.expoly.contains(&p))
    }

    pub fn has_valid_contour(&mut self) -> bool {
        self.ensure_result()
            .islands
            .iter()
            .any(|island| island.expoly.outer.len() >= 3)
    }

    /// Number of islands in the cut
    pub fn get_number_of_contours(&mut self) -> usize {
        self.ensure_result().islands.len()
    }

    /// One world-space point inside every island, for labels and markers.
    ///
    /// Prefers points a little away from the boundary: steps in from edge
    /// midpoints by 10, 1 and 0.1 units, falling back to the centroid.
    pub fn point_per_contour(&mut self) -> Vec<Point3<f64>> {
        let result = self.ensure_result();
        result
            .islands
            .iter()
            .map(|island| {
                let p = interior_point(&island.expoly);
                result.trafo.transform_point(&Point3::new(p.x, p.y, 0.0))
            })
            .collect()
    }

    fn ensure_result(&mut self) -> &mut ClipResult {
        let result = match self.result.take() {
            Some(result) => result,
            None => self.recalculate(),
        };
        self.result.insert(result)
    }

    fn recalculate(&mut self) -> ClipResult {
        self.revision += 1;

        let mesh = match &self.mesh {
            Some(mesh) if !mesh.is_empty() && self.plane.is_active() => Arc::clone(mesh),
            _ => return ClipResult::empty(),
        };

        let local_plane = match self.plane.transformed(&self.trafo) {
            Some(plane) => plane,
            None => {
                tracing::debug!("cut skipped, transformation collapses the plane normal");
                return ClipResult::empty();
            }
        };
        let frame = CutFrame::new(&self.trafo, &local_plane);

        let mut expolys = self.cut_mesh(&mesh, &frame);

        if !expolys.is_empty() {
            if let Some(negative) = &self.negative_mesh {
                let negative = self.cut_mesh(negative, &frame);
                expolys = polygon::difference(&expolys, &negative, self.config.min_island_area);
            }
        }

        if !expolys.is_empty() && self.limiting_plane.is_active() {
            expolys = self.apply_limiting_plane(expolys, &frame);
        }

        let contour_width = self.contour_width / frame.in_plane_scale();
        let mut islands: Vec<CutIsland> = expolys
            .into_iter()
            .map(|expoly| self.make_island(expoly, &frame, contour_width))
            .collect();
        islands.sort_by_key(|island| island.hash);

        tracing::debug!(
            islands = islands.len(),
            revision = self.revision,
            "cross-section recomputed"
        );

        ClipResult {
            islands,
            trafo: frame.to_world,
        }
    }

    /// Cross-section of one mesh as polygons in the frame
    fn cut_mesh(&self, mesh: &TriangleMesh, frame: &CutFrame) -> Vec<ExPolygon> {
        if let Some((min, max)) = mesh.bounds() {
            if frame.misses_box(&min, &max, self.config.plane_tolerance) {
                return Vec::new();
            }
        }

        let segments: Vec<Segment2> = slice_mesh(
            mesh,
            &frame.normal,
            frame.height,
            self.config.plane_tolerance,
        )
        .iter()
        .map(|[a, b]| [frame.project(a), frame.project(b)])
        .collect();

        let loops = chain_segments(
            &segments,
            self.config.chain_tolerance,
            self.config.gap_closing_distance,
        );
        polygon::union_to_expolygons(&loops, self.config.min_island_area)
    }

    /// Remove the part of the cut on the clipped side of the limiting plane
    fn apply_limiting_plane(&self, expolys: Vec<ExPolygon>, frame: &CutFrame) -> Vec<ExPolygon> {
        let local = match self.limiting_plane.transformed(&self.trafo) {
            Some(plane) => plane,
            None => return expolys,
        };

        // In frame coordinates the cut is z = height; clipped where u.p > c
        let n = frame.rotation.inverse_transform_vector(&local.normal());
        let in_plane = Vector2::new(n.x, n.y);
        let c = local.offset() - n.z * frame.height;

        let len = in_plane.norm();
        if len <= PARALLEL_LIMIT {
            return if c < 0.0 { Vec::new() } else { expolys };
        }
        let u = in_plane / len;
        let c = c / len;

        let bbox = match expolys
            .iter()
            .filter_map(ExPolygon::bounds)
            .reduce(|a, b| a.merge(&b))
        {
            Some(bbox) => bbox,
            None => return expolys,
        };
        let reach = bbox.diagonal() + bbox.center().coords.norm() + c.abs() + 1.0;

        let w = Vector2::new(-u.y, u.x);
        let origin = Point2::from(u * c);
        let clipped_side = ExPolygon::new(vec![
            origin - w * reach,
            origin - w * reach + u * (2.0 * reach),
            origin + w * reach + u * (2.0 * reach),
            origin + w * reach,
        ]);

        polygon::difference(&expolys, &[clipped_side], self.config.min_island_area)
    }

    fn make_island(&self, expoly: ExPolygon, frame: &CutFrame, contour_width: f64) -> CutIsland {
        let bbox = expoly.bounds().unwrap_or(BoundingBox2 {
            min: Point2::origin(),
            max: Point2::origin(),
        });
        let hash = island_hash(&expoly);
        let normal = self.plane.normal();

        let fill = if self.fill_cut {
            match triangulate_expolygon(&expoly) {
                Ok((vertices, indices)) => Some(lift_to_world(
                    frame,
                    &vertices,
                    indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]),
                    &normal,
                    self.config.z_fighting_offset,
                )),
                Err(e) => {
                    tracing::debug!(error = %e, "cut fill skipped, rendering contour only");
                    None
                }
            }
        } else {
            None
        };

        let contour = if contour_width > 0.0 {
            let ribbon = contour_ribbon(&expoly, contour_width);
            lift_to_world(
                frame,
                &ribbon.vertices,
                ribbon.triangles.iter().copied(),
                &normal,
                2.0 * self.config.z_fighting_offset,
            )
        } else {
            RenderMesh::new()
        };

        CutIsland {
            expoly,
            bbox,
            fill,
            contour,
            disabled: false,
            hash,
        }
    }
}

fn same_mesh(current: &Option<Arc<TriangleMesh>>, new: Option<&Arc<TriangleMesh>>) -> bool {
    match (current, new) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Build a world-space model from frame vertices, shifted along `normal`
fn lift_to_world(
    frame: &CutFrame,
    vertices: &[Point2<f64>],
    triangles: impl Iterator<Item = [usize; 3]>,
    normal: &Vector3<f64>,
    offset: f64,
) -> RenderMesh {
    let shift = normal * offset;
    let mut mesh = RenderMesh::with_capacity(vertices.len(), vertices.len() * 3);
    for v in vertices {
        mesh.add_vertex(frame.lift(v) + shift, *normal);
    }
    for [a, b, c] in triangles {
        mesh.add_triangle(a as u32, b as u32, c as u32);
    }
    mesh
}

/// Hash of the polygon's vertex bits
fn island_hash(expoly: &ExPolygon) -> u64 {
    let mut hasher = FxHasher::default();
    for ring in expoly.rings() {
        ring.len().hash(&mut hasher);
        for p in ring {
            p.x.to_bits().hash(&mut hasher);
            p.y.to_bits().hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// A point inside the polygon (outside its holes), preferring points away
/// from the boundary
fn interior_point(expoly: &ExPolygon) -> Point2<f64> {
    let outer = &expoly.outer;
    let mut i = 1;
    while i < outer.len() {
        let a = outer[i - 1];
        let b = outer[i];
        if let Some(dir) = (b - a).try_normalize(0.0) {
            // Left of a counter-clockwise edge is inside
            let inward = Vector2::new(-dir.y, dir.x);
            let mid = nalgebra::center(&a, &b);
            for f in [10.0, 1.0, 0.1] {
                let p = mid + inward * f;
                if expoly.contains(&p) {
                    return p;
                }
            }
        }
        i += 5;
    }
    contour_centroid(outer).unwrap_or_else(Point2::origin)
}
