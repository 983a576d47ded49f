//! A distributed finite element solver for the Fisher-Kolmogorov equation
//! <div>$$
//!   \frac{\partial u}{\partial t} - \nabla \cdot (D \nabla u) - \alpha u (1 - u) = f
//! $$</div>
//! on tetrahedral meshes, with natural boundary conditions.
//!
//! Ranks are threads of one process, see [`fk_parallel::Universe`]. Each rank owns a part of
//! the mesh cells and of the degrees of freedom, assembles its cells and takes part in the
//! collective operations of the distributed linear algebra in [`fk_sparse`].
//!
//! The entry point is [`problem::FisherKolmogorov`], which is set up from [`config::Parameters`],
//! [`coefficients::Coefficients`] and a [`mesh::TetMesh`].

pub mod assembly;
pub mod coefficients;
pub mod config;
pub mod discretization;
pub mod dofs;
pub mod element;
pub mod error;
pub mod estimate;
pub mod io;
pub mod mesh;
pub mod problem;

pub use error::Error;

pub extern crate nalgebra;
pub extern crate vtkio;
