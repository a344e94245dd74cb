// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clipping plane value type

use nalgebra::{Matrix4, Point3, Vector3};

/// Plane used to discard geometry on one side of it.
///
/// Stored as `[nx, ny, nz, offset]` with a unit normal. The signed distance of
/// a point is `offset - dot(normal, p)`; points with negative distance are
/// clipped. An offset of `+inf` is the "clips nothing" sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClippingPlane {
    data: [f64; 4],
}

impl ClippingPlane {
    /// Create a plane from a (not necessarily unit) normal and an offset.
    ///
    /// A zero normal cannot describe a plane and yields [`ClippingPlane::clips_nothing`].
    pub fn new(normal: Vector3<f64>, offset: f64) -> Self {
        match normal.try_normalize(0.0) {
            Some(n) => Self {
                data: [n.x, n.y, n.z, offset],
            },
            None => Self::clips_nothing(),
        }
    }

    /// Sentinel plane that never clips anything
    pub fn clips_nothing() -> Self {
        Self {
            data: [0.0, 0.0, 1.0, f64::INFINITY],
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.data[3] != f64::INFINITY
    }

    #[inline]
    pub fn normal(&self) -> Vector3<f64> {
        Vector3::new(self.data[0], self.data[1], self.data[2])
    }

    #[inline]
    pub fn offset(&self) -> f64 {
        self.data[3]
    }

    #[inline]
    pub fn set_offset(&mut self, offset: f64) {
        self.data[3] = offset;
    }

    /// Raw `[nx, ny, nz, offset]`
    #[inline]
    pub fn data(&self) -> [f64; 4] {
        self.data
    }

    /// Signed distance, negative on the clipped side
    #[inline]
    pub fn distance(&self, point: &Point3<f64>) -> f64 {
        self.data[3] - self.normal().dot(&point.coords)
    }

    #[inline]
    pub fn is_point_clipped(&self, point: &Point3<f64>) -> bool {
        self.distance(point) < 0.0
    }

    pub fn invert_normal(&mut self) {
        self.data[0] = -self.data[0];
        self.data[1] = -self.data[1];
        self.data[2] = -self.data[2];
    }

    /// Same plane position as a half-space facing the other way
    pub fn inverted_normal(&self) -> Self {
        Self::new(-self.normal(), -self.offset())
    }

    /// Express this (world space) plane in the frame of `frame_to_world`.
    ///
    /// Distances keep their sign but are scaled by the frame's scaling along
    /// the normal. Returns `None` when the matrix collapses the normal.
    pub fn transformed(&self, frame_to_world: &Matrix4<f64>) -> Option<Self> {
        if !self.is_active() {
            return Some(*self);
        }

        let linear = frame_to_world.fixed_view::<3, 3>(0, 0);
        let translation = frame_to_world.fixed_view::<3, 1>(0, 3);
        let n = self.normal();

        let local_normal = linear.transpose() * n;
        let len = local_normal.norm();
        if len <= f64::EPSILON {
            return None;
        }

        let local_offset = (self.offset() - n.dot(&translation)) / len;
        Some(Self::new(local_normal / len, local_offset))
    }
}

impl Default for ClippingPlane {
    fn default() -> Self {
        Self::clips_nothing()
    }
}
