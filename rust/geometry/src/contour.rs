// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outline ribbons around cut islands
//!
//! Every ring of a polygon is offset by half the width to both sides with
//! mitered corners, and the two offset rings are stitched into a closed
//! quad strip.

use crate::polygon::ExPolygon;
use nalgebra::{Point2, Vector2};

/// Longest miter, in half-widths, before the corner is clamped
const MITER_LIMIT: f64 = 4.0;

/// Triangulated outline in the polygon's 2D frame
#[derive(Debug, Clone, Default)]
pub struct Ribbon {
    pub vertices: Vec<Point2<f64>>,
    pub triangles: Vec<[usize; 3]>,
}

impl Ribbon {
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn area(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let a = self.vertices[t[0]];
                let ab = self.vertices[t[1]] - a;
                let ac = self.vertices[t[2]] - a;
                (ab.x * ac.y - ab.y * ac.x).abs() * 0.5
            })
            .sum()
    }
}

/// Build an outline of total `width` centered on every ring of `polygon`.
pub fn contour_ribbon(polygon: &ExPolygon, width: f64) -> Ribbon {
    let mut ribbon = Ribbon::default();
    if !(width > 0.0) {
        return ribbon;
    }

    for ring in polygon.rings() {
        append_ring(&mut ribbon, ring, width * 0.5);
    }
    ribbon
}

fn append_ring(ribbon: &mut Ribbon, ring: &[Point2<f64>], half_width: f64) {
    let mut points: Vec<Point2<f64>> = Vec::with_capacity(ring.len());
    for p in ring {
        if points.last().map_or(true, |last| last != p) {
            points.push(*p);
        }
    }
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }

    let n = points.len();
    if n < 3 {
        return;
    }

    let base = ribbon.vertices.len();
    for i in 0..n {
        let prev = points[(i + n - 1) % n];
        let cur = points[i];
        let next = points[(i + 1) % n];

        let offset = miter_offset(cur - prev, next - cur) * half_width;
        ribbon.vertices.push(cur + offset);
        ribbon.vertices.push(cur - offset);
    }

    for i in 0..n {
        let a = base + 2 * i;
        let b = a + 1;
        let c = base + 2 * ((i + 1) % n);
        let d = c + 1;
        ribbon.triangles.push([a, b, d]);
        ribbon.triangles.push([a, d, c]);
    }
}

/// Left offset direction at a corner, scaled so that both adjacent edges
/// move by one unit.
fn miter_offset(incoming: Vector2<f64>, outgoing: Vector2<f64>) -> Vector2<f64> {
    let n0 = left_normal(&incoming);
    let n1 = left_normal(&outgoing);

    let sum = n0 + n1;
    let len = sum.norm();
    if len <= 1e-12 {
        // Edge folds back onto itself
        return n0;
    }

    let miter = sum / len;
    let cos_half = miter.dot(&n1);
    let scale = if cos_half > 1.0 / MITER_LIMIT {
        1.0 / cos_half
    } else {
        MITER_LIMIT
    };
    miter * scale
}

#[inline]
fn left_normal(v: &Vector2<f64>) -> Vector2<f64> {
    Vector2::new(-v.y, v.x)
        .try_normalize(0.0)
        .unwrap_or_else(Vector2::zeros)
}
