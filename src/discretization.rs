//! The partitioned mesh, the finite element space and the degree of freedom layout of a run.
use crate::dofs::DofHandler;
use crate::element::LagrangeTetrahedron;
use crate::error::Error;
use crate::io::msh::load_msh_from_file;
use crate::mesh::partition::partition_cells;
use crate::mesh::TetMesh;
use fk_parallel::Communicator;
use fk_quadrature::simplex::tetrahedron_gauss;
use fk_quadrature::Rule3d;
use std::path::Path;
use std::sync::Arc;

/// A tetrahedral mesh whose cells are partitioned over the ranks of a communicator.
///
/// Every rank holds the full mesh and the cell partition, and works on the cells assigned to
/// its own rank.
#[derive(Debug, Clone)]
pub struct DistributedMesh {
    comm: Communicator,
    mesh: Arc<TetMesh>,
    cell_subdomains: Vec<usize>,
    locally_owned_cells: Vec<usize>,
}

impl DistributedMesh {
    /// Validates and partitions an in-memory mesh.
    pub fn new(comm: &Communicator, mesh: impl Into<Arc<TetMesh>>) -> Result<Self, Error> {
        let mesh = mesh.into();
        mesh.validate()?;
        let cell_subdomains = partition_cells(&mesh, comm.size());
        let locally_owned_cells = cell_subdomains
            .iter()
            .enumerate()
            .filter(|(_, subdomain)| **subdomain == comm.rank())
            .map(|(cell, _)| cell)
            .collect();
        Ok(Self {
            comm: comm.clone(),
            mesh,
            cell_subdomains,
            locally_owned_cells,
        })
    }

    /// Reads a Gmsh mesh file and partitions it.
    pub fn from_msh_file(comm: &Communicator, path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::new(comm, load_msh_from_file(path)?)
    }

    pub fn communicator(&self) -> &Communicator {
        &self.comm
    }

    pub fn mesh(&self) -> &TetMesh {
        &self.mesh
    }

    pub fn n_global_cells(&self) -> usize {
        self.mesh.num_cells()
    }

    /// Cells assigned to this rank, in ascending order.
    pub fn locally_owned_cells(&self) -> &[usize] {
        &self.locally_owned_cells
    }

    /// The rank that owns the given cell.
    pub fn subdomain_of(&self, cell: usize) -> usize {
        self.cell_subdomains[cell]
    }
}

/// The `P_r` Lagrange space on tetrahedra with the quadrature rules used on it.
#[derive(Debug, Clone)]
pub struct FiniteElementSpace {
    element: LagrangeTetrahedron,
    quadrature: Rule3d,
    error_quadrature: Rule3d,
}

impl FiniteElementSpace {
    /// Builds the space of the given degree.
    ///
    /// Assembly uses a Gauss rule with `r + 1` points per axis, exact for the degree `2r`
    /// mass integrand, and error evaluation uses one point more.
    pub fn new(degree: usize) -> Result<Self, Error> {
        if degree == 0 {
            return Err(Error::ConfigInvalid("Degree must be at least 1".to_string()));
        }
        let rule = |points_per_axis| {
            tetrahedron_gauss(points_per_axis).expect("Internal error: rule with positive number of points must exist")
        };
        Ok(Self {
            element: LagrangeTetrahedron::new(degree),
            quadrature: rule(degree + 1),
            error_quadrature: rule(degree + 2),
        })
    }

    pub fn element(&self) -> &LagrangeTetrahedron {
        &self.element
    }

    pub fn degree(&self) -> usize {
        self.element.degree()
    }

    pub fn quadrature(&self) -> &Rule3d {
        &self.quadrature
    }

    pub fn error_quadrature(&self) -> &Rule3d {
        &self.error_quadrature
    }
}

/// Everything that describes the discrete function space of a run.
#[derive(Debug, Clone)]
pub struct Discretization {
    pub mesh: DistributedMesh,
    pub space: FiniteElementSpace,
    pub dofs: DofHandler,
}

impl Discretization {
    /// Builds the space on the mesh and numbers its degrees of freedom. Collective.
    pub fn new(mesh: DistributedMesh, degree: usize) -> Result<Self, Error> {
        let space = FiniteElementSpace::new(degree)?;
        let dofs = DofHandler::distribute(&mesh, &space);
        Ok(Self { mesh, space, dofs })
    }

    pub fn communicator(&self) -> &Communicator {
        self.mesh.communicator()
    }
}
