// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ray, visibility and closest point queries against one mesh
//!
//! Queries take a mesh-to-world transformation and work in mesh space
//! internally; clipping planes and the sinking threshold are evaluated in
//! world space. The AABB tree is built on first use and kept for the life of
//! the raycaster.

use meshcut_core::{Camera, ClippingPlane, ClosestPoint, IndexedMesh, Ray, RayHit, TriangleMesh};
use nalgebra::{Matrix4, Point2, Point3, Vector3};
use std::sync::{Arc, OnceLock};

/// Tunable constants of the ray queries
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RaycasterConfig {
    /// Relative Möller–Trumbore determinant below which a ray counts as
    /// parallel to a facet
    pub parallel_tolerance: f64,
    /// Occluders closer to a point than this fraction of its distance from
    /// the eye do not hide it
    pub visibility_tolerance: f64,
    /// World Z below which hits are ignored in sinking mode
    pub sinking_z_threshold: f64,
    /// Reject a hit when an odd number of hits follows it, i.e. the ray
    /// starts inside the (clipped) mesh
    pub reject_inside_hits: bool,
}

impl Default for RaycasterConfig {
    fn default() -> Self {
        Self {
            parallel_tolerance: meshcut_core::aabb::DEFAULT_PARALLEL_TOLERANCE,
            visibility_tolerance: 1e-4,
            sinking_z_threshold: -0.001,
            reject_inside_hits: true,
        }
    }
}

/// Point on the mesh surface in mesh coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub position: Point3<f64>,
    /// Facet normal
    pub normal: Vector3<f64>,
    pub facet: usize,
}

impl From<RayHit> for SurfacePoint {
    fn from(hit: RayHit) -> Self {
        Self {
            position: hit.position,
            normal: hit.normal,
            facet: hit.facet,
        }
    }
}

/// Raycaster over one shared, immutable mesh
#[derive(Debug)]
pub struct MeshRaycaster {
    mesh: Arc<TriangleMesh>,
    index: OnceLock<IndexedMesh>,
    config: RaycasterConfig,
}

impl MeshRaycaster {
    pub fn new(mesh: Arc<TriangleMesh>) -> Self {
        Self::with_config(mesh, RaycasterConfig::default())
    }

    pub fn with_config(mesh: Arc<TriangleMesh>, config: RaycasterConfig) -> Self {
        Self {
            mesh,
            index: OnceLock::new(),
            config,
        }
    }

    #[inline]
    pub fn mesh(&self) -> &Arc<TriangleMesh> {
        &self.mesh
    }

    #[inline]
    pub fn config(&self) -> &RaycasterConfig {
        &self.config
    }

    /// Spatial index, built on first call
    pub fn index(&self) -> &IndexedMesh {
        self.index.get_or_init(|| {
            IndexedMesh::with_parallel_tolerance(
                Arc::clone(&self.mesh),
                self.config.parallel_tolerance,
            )
        })
    }

    /// Pick ray through `mouse_pos` expressed in mesh space.
    pub fn line_from_screen(
        &self,
        mouse_pos: &Point2<f64>,
        trafo: &Matrix4<f64>,
        camera: &Camera,
    ) -> Option<Ray> {
        let inverse = invert(trafo)?;
        let ray = camera.ray_from_screen(mouse_pos)?;
        Some(ray.transformed(&inverse))
    }

    /// First visible hit under the mouse, in mesh space.
    ///
    /// Hits on the clipped side of `clipping_plane` are skipped, as are hits
    /// below the sinking threshold when `sinking` is set. When the first
    /// remaining hit is followed by an odd number of hits, the ray enters
    /// the mesh through the cut and nothing is returned.
    pub fn unproject_on_mesh(
        &self,
        mouse_pos: &Point2<f64>,
        trafo: &Matrix4<f64>,
        camera: &Camera,
        clipping_plane: Option<&ClippingPlane>,
        sinking: bool,
    ) -> Option<SurfacePoint> {
        let ray = self.line_from_screen(mouse_pos, trafo, camera)?;
        let hits = self.index().ray_hits(&ray.origin, &ray.direction);

        let plane = clipping_plane.filter(|p| p.is_active());
        let first = hits.iter().position(|hit| {
            let world = trafo.transform_point(&hit.position);
            let clipped = plane.map_or(false, |p| p.is_point_clipped(&world));
            let sunk = sinking && world.z < self.config.sinking_z_threshold;
            !clipped && !sunk
        })?;

        if self.config.reject_inside_hits && (hits.len() - first) % 2 != 0 {
            return None;
        }

        Some(hits[first].into())
    }

    /// Picking variant of [`MeshRaycaster::unproject_on_mesh`] without
    /// sinking.
    pub fn closest_hit(
        &self,
        mouse_pos: &Point2<f64>,
        trafo: &Matrix4<f64>,
        camera: &Camera,
        clipping_plane: Option<&ClippingPlane>,
    ) -> Option<SurfacePoint> {
        self.unproject_on_mesh(mouse_pos, trafo, camera, clipping_plane, false)
    }

    /// Whether the infinite world-space line through `point` along
    /// `direction` touches the mesh.
    pub fn intersects_line(
        &self,
        point: &Point3<f64>,
        direction: &Vector3<f64>,
        trafo: &Matrix4<f64>,
    ) -> bool {
        let inverse = match invert(trafo) {
            Some(inverse) => inverse,
            None => return false,
        };
        let ray = Ray::new(*point, *direction).transformed(&inverse);
        let index = self.index();
        index.any_hit(&ray.origin, &ray.direction, f64::INFINITY)
            || index.any_hit(&ray.origin, &-ray.direction, f64::INFINITY)
    }

    /// Indices of the world-space `points` the camera can see.
    ///
    /// A point is hidden when it is clipped, or when a facet (not itself
    /// clipped) lies between the eye and the point. The result keeps the
    /// input order.
    pub fn get_unobscured_idxs(
        &self,
        trafo: &Matrix4<f64>,
        camera: &Camera,
        points: &[Point3<f64>],
        clipping_plane: Option<&ClippingPlane>,
    ) -> Vec<usize> {
        let inverse = match invert(trafo) {
            Some(inverse) => inverse,
            None => return Vec::new(),
        };
        let plane = clipping_plane.filter(|p| p.is_active());
        let eye = inverse.transform_point(&camera.eye_position());
        let max_t = 1.0 - self.config.visibility_tolerance;
        let index = self.index();

        points
            .iter()
            .enumerate()
            .filter(|(_, point)| !plane.map_or(false, |p| p.is_point_clipped(point)))
            .filter(|(_, point)| {
                let direction = inverse.transform_point(point) - eye;
                if direction.norm_squared() == 0.0 {
                    return true;
                }

                match plane {
                    None => !index.any_hit(&eye, &direction, max_t),
                    Some(plane) => !index.ray_hits(&eye, &direction).iter().any(|hit| {
                        hit.t < max_t
                            && !plane.is_point_clipped(&trafo.transform_point(&hit.position))
                    }),
                }
            })
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Closest surface point to a mesh-space point
    pub fn get_closest_point(&self, point: &Point3<f64>) -> Option<ClosestPoint> {
        self.index().closest_point(point)
    }

    /// Facet closest to a mesh-space point
    pub fn get_closest_facet(&self, point: &Point3<f64>) -> Option<usize> {
        self.get_closest_point(point).map(|cp| cp.facet)
    }
}

fn invert(trafo: &Matrix4<f64>) -> Option<Matrix4<f64>> {
    let inverse = trafo.try_inverse();
    if inverse.is_none() {
        tracing::debug!("query skipped, transformation is not invertible");
    }
    inverse
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cube() -> Arc<TriangleMesh> {
        let v: Vec<Point3<f32>> = vec![
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

    fn top_camera() -> Camera {
        Camera::perspective(
            Point3::new(0.0, 0.0, 10.0),
            Point3::origin(),
            Vector3::y(),
            std::f64::consts::FRAC_PI_4,
            0.1,
            100.0,
            [0.0, 0.0, 800.0, 600.0],
        )
    }

    /// Screen point whose ray misses the facet diagonals of the cube
    fn off_center() -> Point2<f64> {
        Point2::new(420.0, 290.0)
    }

    #[test]
    fn test_index_is_lazy() {
        let raycaster = MeshRaycaster::new(cube());
        assert!(raycaster.index.get().is_none());
        assert!(raycaster.get_closest_facet(&Point3::new(0.0, 0.0, 2.0)).is_some());
        assert!(raycaster.index.get().is_some());
    }

    #[test]
    fn test_line_from_screen_is_in_mesh_space() {
        let raycaster = MeshRaycaster::new(cube());
        let trafo = Matrix4::new_translation(&Vector3::new(3.0, 0.0, 0.0));
        let ray = raycaster
            .line_from_screen(&Point2::new(400.0, 300.0), &trafo, &top_camera())
            .unwrap();
        assert_relative_eq!(ray.origin.x, -3.0, epsilon = 1e-9);
        assert_relative_eq!(ray.direction.normalize(), -Vector3::z(), epsilon = 1e-9);
    }

    #[test]
    fn test_closest_hit_on_top_face() {
        let raycaster = MeshRaycaster::new(cube());
        let hit = raycaster
            .closest_hit(&off_center(), &Matrix4::identity(), &top_camera(), None)
            .unwrap();
        assert_relative_eq!(hit.position.z, 0.5, epsilon = 1e-9);
        assert_relative_eq!(hit.normal, Vector3::z(), epsilon = 1e-6);
    }

    #[test]
    fn test_clipped_hits_are_skipped() {
        let raycaster = MeshRaycaster::new(cube());
        let camera = top_camera();
        let mouse = off_center();
        // Keeps z <= 0: the top face is clipped and the ray would enter
        // through the cut, so nothing is picked
        let plane = ClippingPlane::new(Vector3::z(), 0.0);
        assert!(raycaster
            .closest_hit(&mouse, &Matrix4::identity(), &camera, Some(&plane))
            .is_none());

        // Without the inside test the bottom face is reported
        let lenient = MeshRaycaster::with_config(
            cube(),
            RaycasterConfig {
                reject_inside_hits: false,
                ..RaycasterConfig::default()
            },
        );
        let hit = lenient
            .closest_hit(&mouse, &Matrix4::identity(), &camera, Some(&plane))
            .unwrap();
        assert_relative_eq!(hit.position.z, -0.5, epsilon = 1e-9);

        // An inactive plane clips nothing
        let none = ClippingPlane::clips_nothing();
        assert!(raycaster
            .closest_hit(&mouse, &Matrix4::identity(), &camera, Some(&none))
            .is_some());
    }

    #[test]
    fn test_sinking_threshold() {
        let raycaster = MeshRaycaster::with_config(
            cube(),
            RaycasterConfig {
                reject_inside_hits: false,
                ..RaycasterConfig::default()
            },
        );
        let camera = top_camera();
        let mouse = off_center();
        // Top face at world z = -0.5, fully sunk
        let trafo = Matrix4::new_translation(&Vector3::new(0.0, 0.0, -1.0));

        assert!(raycaster
            .unproject_on_mesh(&mouse, &trafo, &camera, None, false)
            .is_some());
        assert!(raycaster
            .unproject_on_mesh(&mouse, &trafo, &camera, None, true)
            .is_none());
    }

    #[test]
    fn test_intersects_line_both_directions() {
        let raycaster = MeshRaycaster::new(cube());
        let trafo = Matrix4::identity();
        let up = Vector3::z();
        assert!(raycaster.intersects_line(&Point3::new(0.1, -0.1, 5.0), &up, &trafo));
        assert!(raycaster.intersects_line(&Point3::new(0.1, -0.1, -5.0), &up, &trafo));
        assert!(!raycaster.intersects_line(&Point3::new(2.0, -0.1, 5.0), &up, &trafo));
        assert!(!raycaster.intersects_line(&Point3::new(0.1, -0.1, 5.0), &Vector3::zeros(), &trafo));
    }

    #[test]
    fn test_singular_transformation() {
        let raycaster = MeshRaycaster::new(cube());
        let flat = Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 1.0, 0.0));
        let camera = top_camera();
        assert!(raycaster
            .closest_hit(&off_center(), &flat, &camera, None)
            .is_none());
        assert!(!raycaster.intersects_line(&Point3::origin(), &Vector3::z(), &flat));
        assert!(raycaster
            .get_unobscured_idxs(&flat, &camera, &[Point3::origin()], None)
            .is_empty());
    }

    #[test]
    fn test_occlusion_by_cube() {
        let raycaster = MeshRaycaster::new(cube());
        let camera = top_camera();
        let points = [
            Point3::new(0.0, 0.0, 2.0),
            Point3::new(0.1, -0.2, -2.0),
            Point3::new(3.0, 0.0, -2.0),
            // Exactly on the top face
            Point3::new(0.1, 0.2, 0.5),
        ];
        let visible = raycaster.get_unobscured_idxs(&Matrix4::identity(), &camera, &points, None);
        assert_eq!(visible, vec![0, 2, 3]);
    }

    #[test]
    fn test_closest_point_and_facet() {
        let raycaster = MeshRaycaster::new(cube());
        let cp = raycaster.get_closest_point(&Point3::new(0.1, 0.2, 3.0)).unwrap();
        assert_relative_eq!(cp.point, Point3::new(0.1, 0.2, 0.5), epsilon = 1e-9);
        assert_relative_eq!(cp.normal, Vector3::z(), epsilon = 1e-6);
        assert!(cp.facet == 2 || cp.facet == 3);
        assert_eq!(raycaster.get_closest_facet(&Point3::new(0.1, 0.2, 3.0)), Some(cp.facet));
    }
}
