// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # MeshCut Core
//!
//! Primitives shared by the cut and query engine:
//!
//! - **Meshes**: [`TriangleMesh`] (immutable indexed input, shared through
//!   `Arc`) and [`RenderMesh`] (flat `f32` buffers handed to a renderer)
//! - **Clipping planes**: [`ClippingPlane`], a unit normal plus offset with a
//!   "clips nothing" sentinel
//! - **Cameras**: [`Camera`] and [`Ray`] for screen-space unprojection
//! - **Spatial index**: [`AabbTree`] / [`IndexedMesh`], a balanced AABB
//!   hierarchy answering ray and closest-point queries
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use meshcut_core::{IndexedMesh, TriangleMesh, Point3, Vector3};
//! use std::sync::Arc;
//!
//! let mesh = Arc::new(TriangleMesh::new(vertices, indices));
//! let index = IndexedMesh::new(mesh);
//!
//! if let Some(hit) = index.ray_hit(&Point3::new(0.0, 0.0, 5.0), &Vector3::new(0.0, 0.0, -1.0)) {
//!     println!("hit facet {} at t={}", hit.facet, hit.t);
//! }
//! ```
//!
//! All computations run in `f64`; meshes are stored in `f32` to match GPU
//! buffers.

pub mod aabb;
pub mod camera;
pub mod error;
pub mod mesh;
pub mod plane;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point2, Point3, UnitQuaternion, Vector2, Vector3};

pub use aabb::{Aabb, AabbTree, ClosestPoint, IndexedMesh, RayHit};
pub use camera::{Camera, Ray};
pub use error::{Error, Result};
pub use mesh::{RenderMesh, TriangleMesh};
pub use plane::ClippingPlane;
