// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D polygons with holes and boolean operations
//!
//! Cross-section loops come out of the slicer as an unordered set of closed,
//! oriented rings. They are resolved into [`ExPolygon`]s (one outer ring
//! plus holes) with a non-zero union through the i_overlay crate, which also
//! performs the negative mesh difference and the limiting plane clip.

use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;
use nalgebra::Point2;

type Path = Vec<[f64; 2]>;

/// Polygon with holes.
///
/// The outer ring is counter-clockwise, holes are clockwise.
#[derive(Debug, Clone, PartialEq)]
pub struct ExPolygon {
    pub outer: Vec<Point2<f64>>,
    pub holes: Vec<Vec<Point2<f64>>>,
}

impl ExPolygon {
    pub fn new(outer: Vec<Point2<f64>>) -> Self {
        Self {
            outer: ensure_ccw(&outer),
            holes: Vec::new(),
        }
    }

    pub fn with_holes(outer: Vec<Point2<f64>>, holes: Vec<Vec<Point2<f64>>>) -> Self {
        Self {
            outer: ensure_ccw(&outer),
            holes: holes.iter().map(|h| ensure_cw(h)).collect(),
        }
    }

    /// Enclosed area, holes excluded
    pub fn area(&self) -> f64 {
        compute_signed_area(&self.outer).abs()
            - self
                .holes
                .iter()
                .map(|h| compute_signed_area(h).abs())
                .sum::<f64>()
    }

    /// Inside the outer ring and outside every hole
    pub fn contains(&self, point: &Point2<f64>) -> bool {
        point_in_contour(point, &self.outer) && !self.holes.iter().any(|h| point_in_contour(point, h))
    }

    pub fn bounds(&self) -> Option<BoundingBox2> {
        contour_bounds(&self.outer).map(|(min, max)| BoundingBox2 { min, max })
    }

    /// Outer ring followed by the holes
    pub fn rings(&self) -> impl Iterator<Item = &[Point2<f64>]> {
        std::iter::once(self.outer.as_slice()).chain(self.holes.iter().map(Vec::as_slice))
    }

    pub fn vertex_count(&self) -> usize {
        self.rings().map(<[_]>::len).sum()
    }
}

/// Axis-aligned 2D box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox2 {
    pub min: Point2<f64>,
    pub max: Point2<f64>,
}

impl BoundingBox2 {
    pub fn merge(&self, other: &BoundingBox2) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    pub fn contains(&self, p: &Point2<f64>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn center(&self) -> Point2<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn diagonal(&self) -> f64 {
        (self.max - self.min).norm()
    }
}

/// Resolve a set of closed rings into polygons with holes (non-zero winding).
///
/// Counter-clockwise rings add material and clockwise rings remove it, so
/// overlapping outer rings merge and a clockwise ring inside an outer one
/// becomes a hole. Results whose outer ring has an area not above
/// `min_area` are dropped, as are holes that small.
pub fn union_to_expolygons(rings: &[Vec<Point2<f64>>], min_area: f64) -> Vec<ExPolygon> {
    let subject: Vec<Path> = rings
        .iter()
        .filter(|r| r.len() >= 3)
        .map(|r| contour_to_path(r))
        .collect();

    if subject.is_empty() {
        return Vec::new();
    }

    let clip: Vec<Path> = Vec::new();
    let shapes = subject.overlay(&clip, OverlayRule::Union, FillRule::NonZero);
    shapes_to_expolygons(&shapes, min_area)
}

/// `subject - clip`
pub fn difference(subject: &[ExPolygon], clip: &[ExPolygon], min_area: f64) -> Vec<ExPolygon> {
    if subject.is_empty() || clip.is_empty() {
        return subject.to_vec();
    }
    overlay(subject, clip, OverlayRule::Difference, min_area)
}

fn overlay(
    subject: &[ExPolygon],
    clip: &[ExPolygon],
    rule: OverlayRule,
    min_area: f64,
) -> Vec<ExPolygon> {
    let subject = expolygons_to_paths(subject);
    let clip = expolygons_to_paths(clip);
    let shapes = subject.overlay(&clip, rule, FillRule::EvenOdd);
    shapes_to_expolygons(&shapes, min_area)
}

/// Check if a contour is valid (enough points, area above `min_area`)
pub fn is_valid_contour(contour: &[Point2<f64>], min_area: f64) -> bool {
    contour.len() >= 3 && compute_signed_area(contour).abs() > min_area
}

/// Compute the signed area of a 2D contour
/// Positive = counter-clockwise, Negative = clockwise
pub fn compute_signed_area(contour: &[Point2<f64>]) -> f64 {
    if contour.len() < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    let n = contour.len();

    for i in 0..n {
        let j = (i + 1) % n;
        area += contour[i].x * contour[j].y;
        area -= contour[j].x * contour[i].y;
    }

    area * 0.5
}

/// Area centroid of a ring; vertex average for degenerate rings
pub fn contour_centroid(contour: &[Point2<f64>]) -> Option<Point2<f64>> {
    if contour.is_empty() {
        return None;
    }

    let area = compute_signed_area(contour);
    if area.abs() <= f64::EPSILON {
        let sum = contour.iter().fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords);
        return Some(Point2::from(sum / contour.len() as f64));
    }

    let n = contour.len();
    let (mut cx, mut cy) = (0.0, 0.0);
    for i in 0..n {
        let p = &contour[i];
        let q = &contour[(i + 1) % n];
        let cross = p.x * q.y - q.x * p.y;
        cx += (p.x + q.x) * cross;
        cy += (p.y + q.y) * cross;
    }
    let k = 1.0 / (6.0 * area);
    Some(Point2::new(cx * k, cy * k))
}

/// Ensure contour has counter-clockwise winding (positive area)
pub fn ensure_ccw(contour: &[Point2<f64>]) -> Vec<Point2<f64>> {
    if compute_signed_area(contour) < 0.0 {
        contour.iter().rev().cloned().collect()
    } else {
        contour.to_vec()
    }
}

/// Ensure contour has clockwise winding (for holes)
pub fn ensure_cw(contour: &[Point2<f64>]) -> Vec<Point2<f64>> {
    if compute_signed_area(contour) > 0.0 {
        contour.iter().rev().cloned().collect()
    } else {
        contour.to_vec()
    }
}

/// Check if a point is inside a contour using ray casting
pub fn point_in_contour(point: &Point2<f64>, contour: &[Point2<f64>]) -> bool {
    if contour.len() < 3 {
        return false;
    }

    let mut inside = false;
    let n = contour.len();

    let mut j = n - 1;
    for i in 0..n {
        let pi = &contour[i];
        let pj = &contour[j];

        if ((pi.y > point.y) != (pj.y > point.y))
            && (point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x)
        {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Compute bounding box of a contour
pub fn contour_bounds(contour: &[Point2<f64>]) -> Option<(Point2<f64>, Point2<f64>)> {
    let first = contour.first()?;
    let mut min = *first;
    let mut max = *first;

    for p in contour.iter().skip(1) {
        min = min.inf(p);
        max = max.sup(p);
    }

    Some((min, max))
}

// ============================================================================
// Internal Helper Functions
// ============================================================================

fn expolygons_to_paths(polygons: &[ExPolygon]) -> Vec<Path> {
    polygons
        .iter()
        .flat_map(|p| p.rings().map(contour_to_path))
        .collect()
}

/// Convert a Point2 contour to i_overlay path format
fn contour_to_path(contour: &[Point2<f64>]) -> Path {
    contour.iter().map(|p| [p.x, p.y]).collect()
}

fn path_to_contour(path: &[[f64; 2]]) -> Vec<Point2<f64>> {
    path.iter().map(|p| Point2::new(p[0], p[1])).collect()
}

/// Convert i_overlay result shapes into polygons with holes
///
/// i_overlay returns Vec<Vec<Vec<[f64; 2]>>> where:
/// - Outer Vec: list of shapes
/// - Middle Vec: list of contours per shape (first is outer, rest are holes)
/// - Inner Vec: list of points per contour
fn shapes_to_expolygons(shapes: &[Vec<Path>], min_area: f64) -> Vec<ExPolygon> {
    shapes
        .iter()
        .filter_map(|shape| {
            let (outer, holes) = shape.split_first()?;
            let outer = path_to_contour(outer);
            if !is_valid_contour(&outer, min_area) {
                return None;
            }

            let holes = holes
                .iter()
                .map(|h| path_to_contour(h))
                .filter(|h| is_valid_contour(h, min_area))
                .collect();

            Some(ExPolygon::with_holes(outer, holes))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn square(min: f64, max: f64) -> Vec<Point2<f64>> {
        vec![
            Point2::new(min, min),
            Point2::new(max, min),
            Point2::new(max, max),
            Point2::new(min, max),
        ]
    }

    #[test]
    fn test_compute_signed_area() {
        let ccw = square(0.0, 1.0);
        assert!((compute_signed_area(&ccw) - 1.0).abs() < EPS);

        let cw: Vec<_> = ccw.iter().rev().cloned().collect();
        assert!((compute_signed_area(&cw) + 1.0).abs() < EPS);
        assert!(compute_signed_area(&ensure_ccw(&cw)) > 0.0);
        assert!(compute_signed_area(&ensure_cw(&ccw)) < 0.0);
    }

    #[test]
    fn test_union_classifies_holes() {
        let outer = square(0.0, 10.0);
        let inner = ensure_cw(&square(3.0, 7.0));

        let result = union_to_expolygons(&[inner, outer], 1e-10);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].holes.len(), 1);
        assert!((result[0].area() - 84.0).abs() < 1e-6);
        assert!(compute_signed_area(&result[0].outer) > 0.0);
        assert!(compute_signed_area(&result[0].holes[0]) < 0.0);
    }

    #[test]
    fn test_union_merges_overlapping_rings() {
        let a = square(0.0, 2.0);
        let b: Vec<_> = a.iter().map(|p| Point2::new(p.x + 1.0, p.y)).collect();

        let result = union_to_expolygons(&[a, b], 1e-10);
        assert_eq!(result.len(), 1);
        assert!(result[0].holes.is_empty());
        assert!((result[0].area() - 6.0).abs() < 1e-6);
        assert!(result[0].contains(&Point2::new(1.5, 1.0)));
    }

    #[test]
    fn test_union_disjoint_and_nested_islands() {
        // Ring inside a hole is a separate island
        let rings = vec![
            square(0.0, 10.0),
            ensure_cw(&square(2.0, 8.0)),
            square(4.0, 6.0),
            square(20.0, 21.0),
        ];
        let mut result = union_to_expolygons(&rings, 1e-10);
        result.sort_by(|a, b| a.area().total_cmp(&b.area()));
        assert_eq!(result.len(), 3);
        assert!((result[0].area() - 1.0).abs() < 1e-6);
        assert!((result[1].area() - 4.0).abs() < 1e-6);
        assert!((result[2].area() - 64.0).abs() < 1e-6);
    }

    #[test]
    fn test_union_drops_degenerate_rings() {
        let sliver = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
        ];
        assert!(union_to_expolygons(&[sliver], 1e-10).is_empty());
        assert!(union_to_expolygons(&[], 1e-10).is_empty());
    }

    #[test]
    fn test_difference_makes_hole() {
        let subject = vec![ExPolygon::new(square(0.0, 10.0))];
        let clip = vec![ExPolygon::new(square(4.0, 6.0))];

        let result = difference(&subject, &clip, 1e-10);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].holes.len(), 1);
        assert!((result[0].area() - 96.0).abs() < 1e-6);
        assert!(!result[0].contains(&Point2::new(5.0, 5.0)));
        assert!(result[0].contains(&Point2::new(1.0, 1.0)));
    }

    #[test]
    fn test_difference_removes_everything() {
        let subject = vec![ExPolygon::new(square(1.0, 2.0))];
        let clip = vec![ExPolygon::new(square(0.0, 10.0))];
        assert!(difference(&subject, &clip, 1e-10).is_empty());
        assert_eq!(difference(&subject, &[], 1e-10), subject);
    }

    #[test]
    fn test_point_in_contour() {
        let contour = square(0.0, 10.0);
        assert!(point_in_contour(&Point2::new(5.0, 5.0), &contour));
        assert!(!point_in_contour(&Point2::new(15.0, 5.0), &contour));
        assert!(!point_in_contour(&Point2::new(-1.0, 5.0), &contour));
    }

    #[test]
    fn test_centroid_and_bounds() {
        let poly = ExPolygon::new(square(2.0, 4.0));
        let c = contour_centroid(&poly.outer).unwrap();
        assert!((c - Point2::new(3.0, 3.0)).norm() < EPS);

        let bbox = poly.bounds().unwrap();
        assert_eq!(bbox.min, Point2::new(2.0, 2.0));
        assert_eq!(bbox.max, Point2::new(4.0, 4.0));
        assert!(bbox.contains(&c));
        assert!((bbox.diagonal() - 8f64.sqrt()).abs() < EPS);
    }

    #[test]
    fn test_is_valid_contour() {
        assert!(is_valid_contour(&square(0.0, 1.0), 1e-10));
        let degenerate = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
        ];
        assert!(!is_valid_contour(&degenerate, 1e-10));
        assert!(!is_valid_contour(&degenerate[..2], 1e-10));
    }
}
