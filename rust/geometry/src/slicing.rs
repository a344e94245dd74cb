// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Plane/mesh intersection
//!
//! [`slice_mesh`] produces the unordered segment soup where a plane crosses
//! the triangles of a mesh, [`chain_segments`] links that soup into closed
//! loops.
//!
//! Segments are directed: seen from the plane normal, the material of an
//! outward-oriented mesh lies to their left. Outer loops therefore come out
//! counter-clockwise and cavity loops clockwise, which lets overlapping
//! shells be merged by winding number.
//!
//! Vertices within the plane tolerance count as lying on the plane:
//! - a triangle with vertices strictly on both sides yields one segment
//!   between its two edge crossings
//! - a triangle with one vertex on the plane and the other two on opposite
//!   sides yields a segment from that vertex to the opposite edge
//! - an edge lying in the plane is emitted once, and only if the two faces
//!   sharing it lie on opposite sides (so a face flush with the plane cuts
//!   nothing)
//! - a triangle lying in the plane yields nothing

use meshcut_core::TriangleMesh;
use nalgebra::{Point2, Point3, Vector3};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

const ABOVE: u8 = 1;
const BELOW: u8 = 2;

/// Segment endpoints in mesh space
pub type Segment3 = [Point3<f64>; 2];

/// Segment endpoints in the cut plane's 2D frame
pub type Segment2 = [Point2<f64>; 2];

/// Intersect every triangle of `mesh` with the plane `dot(normal, p) = offset`.
///
/// `normal` does not need to be unit length, `tolerance` is then measured in
/// the same scale.
pub fn slice_mesh(
    mesh: &TriangleMesh,
    normal: &Vector3<f64>,
    offset: f64,
    tolerance: f64,
) -> Vec<Segment3> {
    if mesh.is_empty() {
        return Vec::new();
    }

    // One classification per vertex keeps shared vertices consistent
    let distances: Vec<f64> = (0..mesh.vertex_count())
        .map(|i| normal.dot(&mesh.vertex(i).coords) - offset)
        .collect();
    let side = |d: f64| -> i8 {
        if d > tolerance {
            1
        } else if d < -tolerance {
            -1
        } else {
            0
        }
    };

    let mut segments = Vec::new();
    // Edge -> side mask and summed winding along `b - a`
    let mut coplanar_edges: FxHashMap<(u32, u32), (u8, f64)> = FxHashMap::default();

    for (facet, tri) in mesh.indices().iter().enumerate() {
        let sides = tri.map(|i| side(distances[i as usize]));
        if sides.iter().all(|&s| s > 0) || sides.iter().all(|&s| s < 0) {
            continue;
        }

        // Material lies to the left of this direction, seen from +normal
        let heading = normal.cross(&mesh.facet_normal(facet));
        let on_plane: SmallVec<[usize; 3]> = (0..3).filter(|&k| sides[k] == 0).collect();

        match on_plane.len() {
            0 => {
                let mut crossings: SmallVec<[Point3<f64>; 2]> = SmallVec::new();
                for k in 0..3 {
                    let (a, b) = (tri[k], tri[(k + 1) % 3]);
                    if sides[k] != sides[(k + 1) % 3] {
                        crossings.push(edge_crossing(mesh, &distances, a, b));
                    }
                }
                if let [p, q] = crossings[..] {
                    push_segment(&mut segments, p, q, &heading);
                }
            }
            1 => {
                let k = on_plane[0];
                let (a, b) = (tri[(k + 1) % 3], tri[(k + 2) % 3]);
                if sides[(k + 1) % 3] != sides[(k + 2) % 3] {
                    let q = edge_crossing(mesh, &distances, a, b);
                    push_segment(&mut segments, mesh.vertex(tri[k] as usize), q, &heading);
                }
            }
            2 => {
                let (a, b) = (tri[on_plane[0]], tri[on_plane[1]]);
                let other = 3 - on_plane[0] - on_plane[1];
                let key = (a.min(b), a.max(b));
                let mask = if sides[other] > 0 { ABOVE } else { BELOW };
                let along = mesh.vertex(key.1 as usize) - mesh.vertex(key.0 as usize);
                let entry = coplanar_edges.entry(key).or_insert((0, 0.0));
                entry.0 |= mask;
                entry.1 += heading.dot(&along);
            }
            _ => {}
        }
    }

    let mut edges: Vec<((u32, u32), f64)> = coplanar_edges
        .into_iter()
        .filter(|&(_, (mask, _))| mask == ABOVE | BELOW)
        .map(|(key, (_, winding))| (key, winding))
        .collect();
    edges.sort_unstable_by_key(|&(key, _)| key);
    for ((a, b), winding) in edges {
        let (pa, pb) = (mesh.vertex(a as usize), mesh.vertex(b as usize));
        if winding < 0.0 {
            push_segment(&mut segments, pb, pa, &Vector3::zeros());
        } else {
            push_segment(&mut segments, pa, pb, &Vector3::zeros());
        }
    }

    segments
}

/// Point where the plane crosses edge `a-b`. Endpoints are ordered by index
/// so both faces sharing the edge compute the same bits.
#[inline]
fn edge_crossing(mesh: &TriangleMesh, distances: &[f64], a: u32, b: u32) -> Point3<f64> {
    let (a, b) = if a < b { (a, b) } else { (b, a) };
    let (da, db) = (distances[a as usize], distances[b as usize]);
    let pa = mesh.vertex(a as usize);
    let pb = mesh.vertex(b as usize);
    pa + (pb - pa) * (da / (da - db))
}

/// Push `p -> q`, flipped when it runs against `heading`. A zero heading
/// (degenerate facet) keeps the given order.
#[inline]
fn push_segment(
    segments: &mut Vec<Segment3>,
    p: Point3<f64>,
    q: Point3<f64>,
    heading: &Vector3<f64>,
) {
    if p == q {
        return;
    }
    if heading.dot(&(q - p)) < 0.0 {
        segments.push([q, p]);
    } else {
        segments.push([p, q]);
    }
}

/// Key for endpoint lookup with tolerance-based hashing.
fn point_key(p: &Point2<f64>, tolerance: f64) -> (i64, i64) {
    let scale = 1.0 / tolerance;
    ((p.x * scale).round() as i64, (p.y * scale).round() as i64)
}

/// Chain 2D segments into closed loops.
///
/// Loops follow the direction of the segments they are built from.
/// Endpoints closer than `tolerance` are merged. A chain that cannot be
/// closed through shared endpoints is closed with a straight edge if its
/// end-to-start gap is at most `gap_closing_distance`, and dropped
/// otherwise. Loops with fewer than three points are dropped.
pub fn chain_segments(
    segments: &[Segment2],
    tolerance: f64,
    gap_closing_distance: f64,
) -> Vec<Vec<Point2<f64>>> {
    if segments.is_empty() {
        return Vec::new();
    }

    // point_key -> list of (segment_index, is_end_point)
    let mut adjacency: FxHashMap<(i64, i64), SmallVec<[(usize, bool); 2]>> =
        FxHashMap::default();
    let mut degenerate = vec![false; segments.len()];
    for (i, [p0, p1]) in segments.iter().enumerate() {
        let k0 = point_key(p0, tolerance);
        let k1 = point_key(p1, tolerance);
        if k0 == k1 {
            degenerate[i] = true;
            continue;
        }
        adjacency.entry(k0).or_default().push((i, false));
        adjacency.entry(k1).or_default().push((i, true));
    }

    let mut used = degenerate;
    // Prefer a segment continuing in the walk direction, fall back to any
    // unused one so inconsistently oriented input still chains.
    let next_from =
        |key: (i64, i64), backwards: bool, used: &mut [bool]| -> Option<Point2<f64>> {
            let neighbors = adjacency.get(&key)?;
            let &(seg_idx, is_end) = neighbors
                .iter()
                .find(|&&(s, is_end)| !used[s] && is_end == backwards)
                .or_else(|| neighbors.iter().find(|(s, _)| !used[*s]))?;
            used[seg_idx] = true;
            let [s0, s1] = segments[seg_idx];
            Some(if is_end { s0 } else { s1 })
        };

    let mut loops = Vec::new();
    let mut dropped = 0usize;

    for start_idx in 0..segments.len() {
        if used[start_idx] {
            continue;
        }
        used[start_idx] = true;

        let [p0, p1] = segments[start_idx];
        let start_key = point_key(&p0, tolerance);
        let mut chain = vec![p0, p1];
        let mut closed = false;

        let mut current = p1;
        while let Some(next) = next_from(point_key(&current, tolerance), false, &mut used) {
            if point_key(&next, tolerance) == start_key {
                closed = true;
                break;
            }
            chain.push(next);
            current = next;
        }

        if !closed {
            // Walk back from the start to collect the rest of the open chain
            let mut head = Vec::new();
            let mut current = p0;
            while let Some(prev) = next_from(point_key(&current, tolerance), true, &mut used) {
                head.push(prev);
                current = prev;
            }
            head.reverse();
            head.extend(chain);
            chain = head;

            let gap = chain
                .first()
                .zip(chain.last())
                .map_or(f64::INFINITY, |(a, b)| (a - b).norm());
            if gap > gap_closing_distance {
                dropped += 1;
                continue;
            }
            if gap <= tolerance {
                chain.pop();
            }
        }

        if chain.len() >= 3 {
            loops.push(chain);
        }
    }

    if dropped > 0 {
        tracing::debug!(dropped, "open cut chains discarded");
    }

    loops
}
