//! Reading meshes and writing simulation output.
pub mod msh;
pub mod vtk;
