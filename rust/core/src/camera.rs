// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Camera parameters and screen-space unprojection

use nalgebra::{Matrix4, Point2, Point3, Vector3, Vector4};

/// Half-line `origin + t * direction`, `t >= 0`.
///
/// `direction` is not required to be unit length; `t` is measured in
/// multiples of it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f64>,
    pub direction: Vector3<f64>,
}

impl Ray {
    #[inline]
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Self {
        Self { origin, direction }
    }

    #[inline]
    pub fn point_at(&self, t: f64) -> Point3<f64> {
        self.origin + self.direction * t
    }

    /// Map the ray through an affine matrix, keeping the `t` parametrization.
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Self {
        Self {
            origin: matrix.transform_point(&self.origin),
            direction: matrix.transform_vector(&self.direction),
        }
    }
}

/// Camera as seen by the query engine: view and projection matrices plus
/// the viewport rectangle `[x, y, width, height]` in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    view: Matrix4<f64>,
    projection: Matrix4<f64>,
    viewport: [f64; 4],
}

impl Camera {
    pub fn new(view: Matrix4<f64>, projection: Matrix4<f64>, viewport: [f64; 4]) -> Self {
        Self {
            view,
            projection,
            viewport,
        }
    }

    /// Perspective camera looking from `eye` at `target`
    ///
    /// `fovy` is the vertical field of view in radians; the aspect ratio is
    /// taken from the viewport.
    pub fn perspective(
        eye: Point3<f64>,
        target: Point3<f64>,
        up: Vector3<f64>,
        fovy: f64,
        near: f64,
        far: f64,
        viewport: [f64; 4],
    ) -> Self {
        let aspect = viewport[2] / viewport[3].max(1.0);
        Self {
            view: Matrix4::look_at_rh(&eye, &target, &up),
            projection: Matrix4::new_perspective(aspect, fovy, near, far),
            viewport,
        }
    }

    /// Orthographic camera showing `2 * half_height` world units vertically
    pub fn orthographic(
        eye: Point3<f64>,
        target: Point3<f64>,
        up: Vector3<f64>,
        half_height: f64,
        near: f64,
        far: f64,
        viewport: [f64; 4],
    ) -> Self {
        let aspect = viewport[2] / viewport[3].max(1.0);
        let half_width = half_height * aspect;
        Self {
            view: Matrix4::look_at_rh(&eye, &target, &up),
            projection: Matrix4::new_orthographic(
                -half_width,
                half_width,
                -half_height,
                half_height,
                near,
                far,
            ),
            viewport,
        }
    }

    #[inline]
    pub fn view_matrix(&self) -> &Matrix4<f64> {
        &self.view
    }

    #[inline]
    pub fn projection_matrix(&self) -> &Matrix4<f64> {
        &self.projection
    }

    #[inline]
    pub fn viewport(&self) -> [f64; 4] {
        self.viewport
    }

    /// Camera position in world space
    pub fn eye_position(&self) -> Point3<f64> {
        match self.view.try_inverse() {
            Some(inv) => inv.transform_point(&Point3::origin()),
            None => Point3::origin(),
        }
    }

    /// Unit viewing direction in world space
    pub fn forward(&self) -> Vector3<f64> {
        // View space looks down -Z; row 2 of the rotation is the camera Z axis
        -Vector3::new(self.view[(2, 0)], self.view[(2, 1)], self.view[(2, 2)]).normalize()
    }

    /// Map a window point (pixels, Y up, depth in `[0, 1]`) back to world space.
    pub fn unproject(&self, window: &Point3<f64>) -> Option<Point3<f64>> {
        let [vx, vy, vw, vh] = self.viewport;
        if vw <= 0.0 || vh <= 0.0 {
            return None;
        }

        let ndc = Vector4::new(
            (window.x - vx) / vw * 2.0 - 1.0,
            (window.y - vy) / vh * 2.0 - 1.0,
            window.z * 2.0 - 1.0,
            1.0,
        );

        let inv = (self.projection * self.view).try_inverse()?;
        let world = inv * ndc;
        if world.w.abs() <= f64::EPSILON {
            return None;
        }

        Some(Point3::new(
            world.x / world.w,
            world.y / world.w,
            world.z / world.w,
        ))
    }

    /// World-space ray through a mouse position (pixels, Y down) from the
    /// near plane towards the far plane.
    pub fn ray_from_screen(&self, mouse_pos: &Point2<f64>) -> Option<Ray> {
        let window_y = self.viewport[3] - mouse_pos.y;
        let near = self.unproject(&Point3::new(mouse_pos.x, window_y, 0.0))?;
        let far = self.unproject(&Point3::new(mouse_pos.x, window_y, 1.0))?;
        Some(Ray::new(near, far - near))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn top_down_camera() -> Camera {
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

    #[test]
    fn test_eye_and_forward() {
        let camera = top_down_camera();
        assert_relative_eq!(camera.eye_position(), Point3::new(0.0, 0.0, 10.0), epsilon = 1e-9);
        assert_relative_eq!(camera.forward(), Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-9);
    }

    #[test]
    fn test_center_ray_points_at_target() {
        let camera = top_down_camera();
        let ray = camera.ray_from_screen(&Point2::new(400.0, 300.0)).unwrap();
        let dir = ray.direction.normalize();
        assert_relative_eq!(dir, Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-9);
        assert_relative_eq!(ray.origin.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(ray.origin.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_mouse_y_is_flipped() {
        let camera = top_down_camera();
        // Upper half of the screen maps to +Y when looking down with +Y up
        let ray = camera.ray_from_screen(&Point2::new(400.0, 100.0)).unwrap();
        assert!(ray.direction.y > 0.0);
    }

    #[test]
    fn test_orthographic_rays_are_parallel() {
        let camera = Camera::orthographic(
            Point3::new(0.0, 0.0, 10.0),
            Point3::origin(),
            Vector3::y(),
            5.0,
            0.1,
            100.0,
            [0.0, 0.0, 100.0, 100.0],
        );
        let a = camera.ray_from_screen(&Point2::new(10.0, 10.0)).unwrap();
        let b = camera.ray_from_screen(&Point2::new(90.0, 70.0)).unwrap();
        assert_relative_eq!(a.direction.normalize(), b.direction.normalize(), epsilon = 1e-9);
        // Top-left pixel lands near the top-left of the 10x10 view
        assert_relative_eq!(a.origin.x, -4.0, epsilon = 1e-9);
        assert_relative_eq!(a.origin.y, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_viewport_unprojects_nothing() {
        let camera = Camera::new(Matrix4::identity(), Matrix4::identity(), [0.0, 0.0, 0.0, 0.0]);
        assert!(camera.ray_from_screen(&Point2::new(1.0, 1.0)).is_none());
    }

    #[test]
    fn test_ray_transformed() {
        let ray = Ray::new(Point3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 2.0, 0.0));
        let moved = ray.transformed(&Matrix4::new_translation(&Vector3::new(0.0, 0.0, 3.0)));
        assert_eq!(moved.origin, Point3::new(1.0, 0.0, 3.0));
        assert_eq!(moved.direction, Vector3::new(0.0, 2.0, 0.0));
        assert_eq!(moved.point_at(0.5), Point3::new(1.0, 1.0, 3.0));
    }
}
