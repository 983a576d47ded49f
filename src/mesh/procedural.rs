//! Basic procedural mesh generation routines.
use crate::mesh::{Tet4Connectivity, TetMesh};
use nalgebra::{Point3, Vector3};

/// Axis orderings of the six Kuhn tetrahedra of a cube.
const KUHN_AXIS_ORDERS: [[usize; 3]; 6] = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

/// Generates a uniform tetrahedral mesh of the unit box `[0, 1]^3`.
///
/// The box is divided into `cells_per_dim^3` cubes and each cube is split into six
/// tetrahedra, so the mesh has `6 * cells_per_dim^3` cells.
pub fn create_unit_box_uniform_tet_mesh(cells_per_dim: usize) -> TetMesh {
    create_rectangular_uniform_tet_mesh(1.0, [1, 1, 1], cells_per_dim, &Vector3::zeros())
}

/// Generates an axis-aligned rectangular uniform tetrahedral mesh given a unit length,
/// dimensions as multipliers of the unit length and the number of cubes per unit length.
///
/// The resulting box is `origin + [0, u * ux] x [0, u * uy] x [0, u * uz]`. Every cube is
/// split into the six Kuhn tetrahedra sharing the cube diagonal from its lowest to its highest
/// corner. Neighboring cubes are split compatibly, so the mesh is conforming.
pub fn create_rectangular_uniform_tet_mesh(
    unit_length: f64,
    units: [usize; 3],
    cells_per_unit: usize,
    origin: &Vector3<f64>,
) -> TetMesh {
    let num_cubes = units.map(|u| u * cells_per_unit);
    if num_cubes.contains(&0) {
        return TetMesh::from_vertices_and_connectivity(Vec::new(), Vec::new());
    }

    let cell_size = unit_length / cells_per_unit as f64;
    let [nx, ny, nz] = num_cubes.map(|n| n + 1);
    let to_global_vertex_index = |[i, j, k]: [usize; 3]| (k * ny + j) * nx + i;

    let mut vertices = Vec::with_capacity(nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let offset = Vector3::new(i as f64, j as f64, k as f64) * cell_size;
                vertices.push(Point3::from(origin + offset));
            }
        }
    }

    let mut cells = Vec::with_capacity(6 * num_cubes.iter().product::<usize>());
    for k in 0..num_cubes[2] {
        for j in 0..num_cubes[1] {
            for i in 0..num_cubes[0] {
                for axis_order in KUHN_AXIS_ORDERS {
                    // Walk from the lowest corner to the highest, one axis at a time
                    let mut corner = [i, j, k];
                    let mut tet = [to_global_vertex_index(corner); 4];
                    for (step, &axis) in axis_order.iter().enumerate() {
                        corner[axis] += 1;
                        tet[step + 1] = to_global_vertex_index(corner);
                    }
                    cells.push(Tet4Connectivity(tet));
                }
            }
        }
    }

    TetMesh::from_vertices_and_connectivity(vertices, cells)
}
