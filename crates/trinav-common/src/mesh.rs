//! Triangle soup input for navigation mesh construction

use crate::{Error, Result};
use glam::Vec3;

#[cfg(feature = "std")]
use std::fs::File;
#[cfg(feature = "std")]
use std::io::{BufRead, BufReader};
#[cfg(feature = "std")]
use std::path::Path;

/// Vertex and index buffers describing walkable triangles.
///
/// Triangles are expected to be wound clockwise when viewed from above
/// (upward facing for a Y-up OBJ export).
#[derive(Debug, Clone, Default)]
pub struct TriMesh {
    /// The vertices of the mesh as a flat array of [x, y, z] coordinates
    pub vertices: Vec<f32>,
    /// The indices of the mesh, 3 per triangle
    pub indices: Vec<i32>,
}

impl TriMesh {
    /// Creates a new empty triangle mesh
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vert_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn tri_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Builds a flat grid of `cols` x `rows` quads on the y = `height` plane,
    /// two triangles per quad, starting at `origin` (x, z).
    ///
    /// Vertex `(i, j)` sits at `origin + (i * cell_size, j * cell_size)`.
    pub fn grid(cols: usize, rows: usize, cell_size: f32, origin: (f32, f32), height: f32) -> Self {
        let mut mesh = Self::new();
        if cols == 0 || rows == 0 {
            return mesh;
        }

        for i in 0..=cols {
            for j in 0..=rows {
                mesh.vertices.push(origin.0 + i as f32 * cell_size);
                mesh.vertices.push(height);
                mesh.vertices.push(origin.1 + j as f32 * cell_size);
            }
        }

        let stride = (rows + 1) as i32;
        let vert = |i: usize, j: usize| i as i32 * stride + j as i32;
        for i in 0..cols {
            for j in 0..rows {
                let a = vert(i, j);
                let b = vert(i, j + 1);
                let c = vert(i + 1, j);
                let d = vert(i + 1, j + 1);
                mesh.indices.extend_from_slice(&[a, b, c]);
                mesh.indices.extend_from_slice(&[b, d, c]);
            }
        }
        mesh
    }

    /// Appends another mesh, offsetting its indices.
    pub fn append(&mut self, other: &TriMesh) {
        let base = self.vert_count() as i32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    /// Reverses the winding of every triangle.
    pub fn flip_winding(&mut self) {
        for tri in self.indices.chunks_exact_mut(3) {
            tri.swap(1, 2);
        }
    }

    /// Loads a mesh from an OBJ file
    #[cfg(feature = "std")]
    pub fn from_obj<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut mesh = Self::new();
        for line in reader.lines() {
            let line = line?;
            mesh.parse_obj_line(&line)?;
        }
        Ok(mesh)
    }

    /// Parses OBJ content from a string
    ///
    /// # Example
    ///
    /// ```
    /// use trinav_common::TriMesh;
    ///
    /// let obj_content = r#"
    /// v 0.0 0.0 0.0
    /// v 0.0 0.0 1.0
    /// v 1.0 0.0 0.0
    /// f 1 2 3
    /// "#;
    ///
    /// let mesh = TriMesh::from_obj_str(obj_content).unwrap();
    /// assert_eq!(mesh.vert_count(), 3);
    /// assert_eq!(mesh.tri_count(), 1);
    /// ```
    pub fn from_obj_str(content: &str) -> Result<Self> {
        let mut mesh = Self::new();
        for line in content.lines() {
            mesh.parse_obj_line(line)?;
        }
        Ok(mesh)
    }

    fn parse_obj_line(&mut self, line: &str) -> Result<()> {
        let mut tokens = line.split_whitespace();

        match tokens.next() {
            Some("v") => {
                for axis in ["x", "y", "z"] {
                    let value = tokens
                        .next()
                        .ok_or_else(|| {
                            Error::InvalidMesh(format!("Invalid vertex: missing {axis} coordinate"))
                        })?
                        .parse::<f32>()
                        .map_err(|_| {
                            Error::InvalidMesh(format!(
                                "Invalid vertex: {axis} coordinate is not a number"
                            ))
                        })?;
                    self.vertices.push(value);
                }
            }
            Some("f") => {
                let mut face = Vec::with_capacity(4);
                for token in tokens {
                    let index_str = token.split('/').next().unwrap_or_default();
                    let index = index_str.parse::<i32>().map_err(|_| {
                        Error::InvalidMesh("Invalid face: vertex index is not a number".to_string())
                    })?;
                    // OBJ indices are 1-based, negative values are relative to the end
                    let index = if index < 0 {
                        self.vert_count() as i32 + index
                    } else {
                        index - 1
                    };
                    face.push(index);
                }

                if face.len() < 3 {
                    return Err(Error::InvalidMesh(
                        "Invalid face: less than 3 vertices".to_string(),
                    ));
                }

                // Fan triangulation for polygons
                for i in 1..(face.len() - 1) {
                    self.indices
                        .extend_from_slice(&[face[0], face[i], face[i + 1]]);
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Calculates the axis-aligned bounding box of the mesh
    pub fn calculate_bounds(&self) -> (Vec3, Vec3) {
        if self.vertices.len() < 3 {
            return (Vec3::ZERO, Vec3::ZERO);
        }

        let mut bmin = Vec3::splat(f32::MAX);
        let mut bmax = Vec3::splat(f32::MIN);
        for v in self.vertices.chunks_exact(3) {
            let p = Vec3::new(v[0], v[1], v[2]);
            bmin = bmin.min(p);
            bmax = bmax.max(p);
        }
        (bmin, bmax)
    }
}
