// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-instance picking handle
//!
//! A scene places the same mesh many times. Every placement gets its own
//! [`PickRaycaster`] carrying an id, a transform and an active flag, while
//! the raycaster (and so its spatial index) is shared.

use crate::raycaster::MeshRaycaster;
use meshcut_core::{Camera, ClippingPlane};
use nalgebra::{Matrix4, Point2, Point3, Vector3};
use std::sync::Arc;

/// Hit reported by [`PickRaycaster::hit`], in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub id: i32,
    pub facet: usize,
    pub position: Point3<f64>,
    /// Unit facet normal
    pub normal: Vector3<f64>,
}

#[derive(Debug, Clone)]
pub struct PickRaycaster {
    id: i32,
    active: bool,
    use_back_faces: bool,
    raycaster: Arc<MeshRaycaster>,
    transform: Matrix4<f64>,
}

impl PickRaycaster {
    pub fn new(id: i32, raycaster: Arc<MeshRaycaster>) -> Self {
        Self::with_transform(id, raycaster, Matrix4::identity())
    }

    pub fn with_transform(id: i32, raycaster: Arc<MeshRaycaster>, transform: Matrix4<f64>) -> Self {
        Self {
            id,
            active: true,
            use_back_faces: true,
            raycaster,
            transform,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    #[inline]
    pub fn get_id(&self) -> i32 {
        self.id
    }

    #[inline]
    pub fn transform(&self) -> &Matrix4<f64> {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Matrix4<f64>) {
        self.transform = transform;
    }

    #[inline]
    pub fn raycaster(&self) -> &Arc<MeshRaycaster> {
        &self.raycaster
    }

    #[inline]
    pub fn use_back_faces(&self) -> bool {
        self.use_back_faces
    }

    /// When disabled, hits on facets turned away from the camera are ignored.
    pub fn set_use_back_faces(&mut self, use_back_faces: bool) {
        self.use_back_faces = use_back_faces;
    }

    /// Nearest visible hit under the mouse. Inactive instances never report
    /// a hit.
    pub fn hit(
        &self,
        mouse_pos: &Point2<f64>,
        camera: &Camera,
        clipping_plane: Option<&ClippingPlane>,
    ) -> Option<PickHit> {
        if !self.active {
            return None;
        }

        let local = self
            .raycaster
            .closest_hit(mouse_pos, &self.transform, camera, clipping_plane)?;

        let position = self.transform.transform_point(&local.position);
        let normal = world_normal(&self.transform, &local.normal)?;

        if !self.use_back_faces && normal.dot(&(position - camera.eye_position())) > 0.0 {
            return None;
        }

        Some(PickHit {
            id: self.id,
            facet: local.facet,
            position,
            normal,
        })
    }
}

/// Normals map through the inverse transpose of the linear part.
fn world_normal(transform: &Matrix4<f64>, normal: &Vector3<f64>) -> Option<Vector3<f64>> {
    let linear = transform.fixed_view::<3, 3>(0, 0).into_owned();
    let inverse = linear.try_inverse()?;
    (inverse.transpose() * normal).try_normalize(0.0)
}
