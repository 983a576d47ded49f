use crate::error::Error;
use itertools::Itertools;
use nalgebra::{Matrix3, Point3};
use serde::{Deserialize, Serialize};

pub mod partition;
pub mod procedural;

/// Vertex indices of a four-node tetrahedron.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tet4Connectivity(pub [usize; 4]);

impl Tet4Connectivity {
    pub fn vertex_indices(&self) -> &[usize; 4] {
        &self.0
    }
}

/// Index-based data structure for conforming tetrahedral meshes (i.e. no hanging nodes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TetMesh {
    vertices: Vec<Point3<f64>>,
    connectivity: Vec<Tet4Connectivity>,
}

impl TetMesh {
    /// Construct a mesh from vertices and connectivity.
    ///
    /// The connectivity is not checked here; use [`TetMesh::validate`] before handing the mesh
    /// to code that indexes vertices through it.
    pub fn from_vertices_and_connectivity(vertices: Vec<Point3<f64>>, connectivity: Vec<Tet4Connectivity>) -> Self {
        Self { vertices, connectivity }
    }

    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    pub fn connectivity(&self) -> &[Tet4Connectivity] {
        &self.connectivity
    }

    pub fn num_cells(&self) -> usize {
        self.connectivity.len()
    }

    /// The vertex coordinates of the given cell.
    ///
    /// Panics if the cell index or its vertex indices are out of bounds.
    pub fn cell_vertices(&self, cell_index: usize) -> [Point3<f64>; 4] {
        let Tet4Connectivity(indices) = self.connectivity[cell_index];
        indices.map(|index| self.vertices[index])
    }

    pub fn cell_centroid(&self, cell_index: usize) -> Point3<f64> {
        let [a, b, c, d] = self.cell_vertices(cell_index);
        Point3::from((a.coords + b.coords + c.coords + d.coords) / 4.0)
    }

    /// The axis-aligned bounding box `(min, max)` of all vertices, or `None` for an empty mesh.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = *self.vertices.first()?;
        Some(self.vertices.iter().fold((first, first), |(min, max), v| {
            (min.coords.inf(&v.coords).into(), max.coords.sup(&v.coords).into())
        }))
    }

    /// Checks that the mesh is usable for finite element computations.
    ///
    /// The mesh must contain at least one cell and finite vertex coordinates, every cell must
    /// reference existing and distinct vertices, and no cell may be degenerate. A cell counts
    /// as degenerate when its volume is negligible compared to the cube of its longest edge.
    pub fn validate(&self) -> Result<(), Error> {
        if self.connectivity.is_empty() {
            return Err(Error::MeshInvalid("mesh contains no tetrahedra".to_string()));
        }

        if let Some(index) = self
            .vertices
            .iter()
            .position(|v| v.coords.iter().any(|x| !x.is_finite()))
        {
            return Err(Error::MeshInvalid(format!("vertex {} has non-finite coordinates", index)));
        }

        for (cell_index, Tet4Connectivity(indices)) in self.connectivity.iter().enumerate() {
            if let Some(&index) = indices.iter().find(|&&index| index >= self.vertices.len()) {
                return Err(Error::MeshInvalid(format!(
                    "cell {} references vertex {}, but the mesh has only {} vertices",
                    cell_index,
                    index,
                    self.vertices.len()
                )));
            }

            let volume = self.signed_volume(cell_index).abs();
            let max_edge = max_edge_length(&self.cell_vertices(cell_index));
            if volume <= 1e-12 * max_edge.powi(3) {
                return Err(Error::MeshInvalid(format!(
                    "cell {} is degenerate (volume {:e})",
                    cell_index, volume
                )));
            }
        }

        Ok(())
    }

    /// Signed volume of the given cell, positive if the vertices are positively oriented.
    pub fn signed_volume(&self, cell_index: usize) -> f64 {
        let [a, b, c, d] = self.cell_vertices(cell_index);
        Matrix3::from_columns(&[b - a, c - a, d - a]).determinant() / 6.0
    }
}

fn max_edge_length(vertices: &[Point3<f64>; 4]) -> f64 {
    vertices
        .iter()
        .tuple_combinations()
        .map(|(a, b)| (a - b).norm())
        .fold(0.0, f64::max)
}
