// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh data structures
//!
//! [`TriangleMesh`] is the immutable indexed input owned by the caller and
//! shared with raycasters and clippers through `Arc`. [`RenderMesh`] is the
//! flat buffer layout produced for an external renderer.

use crate::error::{Error, Result};
use nalgebra::{Point3, Vector3};

/// Indexed triangle set with per-facet normals.
///
/// Never mutated once built; query objects only borrow it.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    vertices: Vec<Point3<f32>>,
    indices: Vec<[u32; 3]>,
    normals: Vec<Vector3<f32>>,
}

impl TriangleMesh {
    /// Build a mesh, dropping triangles that reference missing vertices.
    pub fn new(vertices: Vec<Point3<f32>>, indices: Vec<[u32; 3]>) -> Self {
        let vertex_count = vertices.len();
        let total = indices.len();
        let indices: Vec<[u32; 3]> = indices
            .into_iter()
            .filter(|tri| tri.iter().all(|&i| (i as usize) < vertex_count))
            .collect();

        if indices.len() != total {
            tracing::warn!(
                dropped = total - indices.len(),
                "triangles referencing missing vertices were dropped"
            );
        }

        Self::from_parts(vertices, indices)
    }

    /// Build a mesh, rejecting out-of-range indices.
    pub fn try_new(vertices: Vec<Point3<f32>>, indices: Vec<[u32; 3]>) -> Result<Self> {
        if let Some(bad) = indices
            .iter()
            .position(|tri| tri.iter().any(|&i| i as usize >= vertices.len()))
        {
            return Err(Error::InvalidMesh(format!(
                "triangle {} references a vertex outside 0..{}",
                bad,
                vertices.len()
            )));
        }
        Ok(Self::from_parts(vertices, indices))
    }

    /// Build from flat `[x, y, z, ...]` / `[i0, i1, i2, ...]` buffers.
    pub fn from_buffers(positions: &[f32], indices: &[u32]) -> Result<Self> {
        if positions.len() % 3 != 0 || indices.len() % 3 != 0 {
            return Err(Error::InvalidMesh(
                "buffer lengths must be multiples of 3".to_string(),
            ));
        }
        let vertices = positions
            .chunks_exact(3)
            .map(|c| Point3::new(c[0], c[1], c[2]))
            .collect();
        let triangles = indices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        Self::try_new(vertices, triangles)
    }

    fn from_parts(vertices: Vec<Point3<f32>>, indices: Vec<[u32; 3]>) -> Self {
        let normals = indices
            .iter()
            .map(|tri| {
                let a = vertices[tri[0] as usize].cast::<f64>();
                let b = vertices[tri[1] as usize].cast::<f64>();
                let c = vertices[tri[2] as usize].cast::<f64>();
                // Degenerate facets keep a zero normal
                (b - a)
                    .cross(&(c - a))
                    .try_normalize(0.0)
                    .unwrap_or_else(Vector3::zeros)
                    .cast::<f32>()
            })
            .collect();

        Self {
            vertices,
            indices,
            normals,
        }
    }

    #[inline]
    pub fn vertices(&self) -> &[Point3<f32>] {
        &self.vertices
    }

    #[inline]
    pub fn indices(&self) -> &[[u32; 3]] {
        &self.indices
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// A mesh without triangles answers every query with "nothing".
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Vertex position in `f64`.
    #[inline]
    pub fn vertex(&self, idx: usize) -> Point3<f64> {
        self.vertices[idx].cast::<f64>()
    }

    /// The three corners of a facet in `f64`.
    #[inline]
    pub fn triangle(&self, facet: usize) -> [Point3<f64>; 3] {
        let [a, b, c] = self.indices[facet];
        [
            self.vertex(a as usize),
            self.vertex(b as usize),
            self.vertex(c as usize),
        ]
    }

    /// Unit facet normal, zero for degenerate facets.
    #[inline]
    pub fn facet_normal(&self, facet: usize) -> Vector3<f64> {
        self.normals[facet].cast::<f64>()
    }

    /// Bounds of the referenced vertices, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        if self.is_empty() {
            return None;
        }

        let mut min = Point3::new(f64::MAX, f64::MAX, f64::MAX);
        let mut max = Point3::new(f64::MIN, f64::MIN, f64::MIN);

        for &idx in self.indices.iter().flatten() {
            let p = self.vertex(idx as usize);
            min = min.inf(&p);
            max = max.sup(&p);
        }

        Some((min, max))
    }
}

/// Renderable triangle buffers (P3N3 layout)
#[derive(Debug, Clone, PartialEq)]
pub struct RenderMesh {
    /// Vertex positions (x, y, z)
    pub positions: Vec<f32>,
    /// Vertex normals (nx, ny, nz)
    pub normals: Vec<f32>,
    /// Triangle indices (i0, i1, i2)
    pub indices: Vec<u32>,
}

impl RenderMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            normals: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Create a mesh with capacity
    pub fn with_capacity(vertex_count: usize, index_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_count * 3),
            normals: Vec::with_capacity(vertex_count * 3),
            indices: Vec::with_capacity(index_count),
        }
    }

    /// Add a vertex with normal, returning its index
    #[inline]
    pub fn add_vertex(&mut self, position: Point3<f64>, normal: Vector3<f64>) -> u32 {
        let idx = self.vertex_count() as u32;

        self.positions.push(position.x as f32);
        self.positions.push(position.y as f32);
        self.positions.push(position.z as f32);

        self.normals.push(normal.x as f32);
        self.normals.push(normal.y as f32);
        self.normals.push(normal.z as f32);

        idx
    }

    /// Add a triangle
    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.push(i0);
        self.indices.push(i1);
        self.indices.push(i2);
    }

    /// Merge another mesh into this one
    #[inline]
    pub fn merge(&mut self, other: &RenderMesh) {
        if other.is_empty() {
            return;
        }

        let vertex_offset = self.vertex_count() as u32;

        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.indices
            .extend(other.indices.iter().map(|&i| i + vertex_offset));
    }

    /// Get vertex count
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Get triangle count
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check if mesh is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Total area of all triangles, computed in `f64`
    pub fn area(&self) -> f64 {
        let position = |i: u32| {
            let base = i as usize * 3;
            Point3::new(
                self.positions[base] as f64,
                self.positions[base + 1] as f64,
                self.positions[base + 2] as f64,
            )
        };

        self.indices
            .chunks_exact(3)
            .map(|tri| {
                let a = position(tri[0]);
                let b = position(tri[1]);
                let c = position(tri[2]);
                (b - a).cross(&(c - a)).norm() * 0.5
            })
            .sum()
    }
}

impl Default for RenderMesh {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> TriangleMesh {
        TriangleMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn test_facet_normals() {
        let mesh = unit_square();
        assert_eq!(mesh.triangle_count(), 2);
        assert!((mesh.facet_normal(0).z - 1.0).abs() < 1e-9);
        assert!((mesh.facet_normal(1).z - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_facet_has_zero_normal() {
        let mesh = TriangleMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        assert_eq!(mesh.facet_normal(0), Vector3::zeros());
    }

    #[test]
    fn test_out_of_range_indices() {
        let vertices = vec![Point3::new(0.0, 0.0, 0.0); 3];
        assert!(TriangleMesh::try_new(vertices.clone(), vec![[0, 1, 3]]).is_err());

        let mesh = TriangleMesh::new(vertices, vec![[0, 1, 2], [0, 1, 7]]);
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn test_from_buffers() {
        let mesh = TriangleMesh::from_buffers(
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            &[0, 1, 2],
        )
        .unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);

        assert!(TriangleMesh::from_buffers(&[0.0, 1.0], &[0, 1, 2]).is_err());
    }

    #[test]
    fn test_bounds() {
        let mesh = unit_square();
        let (min, max) = mesh.bounds().unwrap();
        assert_eq!(min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(max, Point3::new(1.0, 1.0, 0.0));

        assert!(TriangleMesh::default().bounds().is_none());
    }

    #[test]
    fn test_render_mesh_merge() {
        let mut mesh1 = RenderMesh::new();
        mesh1.add_vertex(Point3::new(0.0, 0.0, 0.0), Vector3::z());
        mesh1.add_vertex(Point3::new(1.0, 0.0, 0.0), Vector3::z());
        mesh1.add_vertex(Point3::new(0.0, 1.0, 0.0), Vector3::z());
        mesh1.add_triangle(0, 1, 2);

        let mut mesh2 = RenderMesh::new();
        mesh2.add_vertex(Point3::new(0.0, 0.0, 1.0), Vector3::y());
        mesh2.add_vertex(Point3::new(2.0, 0.0, 1.0), Vector3::y());
        mesh2.add_vertex(Point3::new(0.0, 2.0, 1.0), Vector3::y());
        mesh2.add_triangle(0, 1, 2);

        mesh1.merge(&mesh2);
        assert_eq!(mesh1.vertex_count(), 6);
        assert_eq!(mesh1.triangle_count(), 2);
        assert_eq!(&mesh1.indices[3..], &[3, 4, 5]);
        assert!((mesh1.area() - 2.5).abs() < 1e-6);
    }
}
