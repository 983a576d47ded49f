use fisher_kolmogorov::discretization::{Discretization, DistributedMesh};
use fisher_kolmogorov::mesh::procedural::create_unit_box_uniform_tet_mesh;
use fk_parallel::Communicator;

mod config;

/// Discretization of the unit box with `cells_per_dim^3` cubes.
fn unit_box_discretization(comm: &Communicator, cells_per_dim: usize, degree: usize) -> Discretization {
    let mesh = DistributedMesh::new(comm, create_unit_box_uniform_tet_mesh(cells_per_dim)).unwrap();
    Discretization::new(mesh, degree).unwrap()
}
