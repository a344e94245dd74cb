// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # MeshCut Geometry
//!
//! Cross-sections and interactive queries on top of [`meshcut_core`]:
//!
//! - [`MeshClipper`] cuts a mesh with a plane, builds filled and outlined
//!   cut islands and caches them until an input changes
//! - [`MeshRaycaster`] answers pick, visibility and closest point queries
//! - [`PickRaycaster`] places a shared raycaster in a scene with an id and
//!   a transform
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use meshcut_geometry::{ClippingPlane, MeshClipper, Vector3};
//!
//! let mut clipper = MeshClipper::new();
//! clipper.set_mesh(mesh.clone());
//! clipper.set_plane(&ClippingPlane::new(Vector3::z(), 0.0));
//! clipper.render_cut(&mut renderer, [1.0, 0.5, 0.0, 1.0], None);
//! ```

pub mod clipper;
pub mod contour;
pub mod pick;
pub mod polygon;
pub mod raycaster;
pub mod slicing;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point2, Point3, UnitQuaternion, Vector2, Vector3};

pub use meshcut_core::{
    Camera, ClippingPlane, ClosestPoint, Error, IndexedMesh, Ray, RayHit, RenderMesh, Result,
    TriangleMesh,
};

pub use clipper::{ClipResult, ClipperConfig, CutIsland, CutRenderer, MeshClipper};
pub use contour::{contour_ribbon, Ribbon};
pub use pick::{PickHit, PickRaycaster};
pub use polygon::{BoundingBox2, ExPolygon};
pub use raycaster::{MeshRaycaster, RaycasterConfig, SurfacePoint};
pub use triangulation::triangulate_polygon;
