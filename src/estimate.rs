//! Error norms of finite element solutions against exact solutions.
use crate::coefficients::ExactSolution;
use crate::discretization::Discretization;
use crate::element::{CellValues, TetrahedronGeometry};
use fk_sparse::GhostedVector;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NormType {
    L1,
    L2,
    Linfty,
    H1Seminorm,
    H1,
}

/// Computes the norm of `u_h - u(·, t)` over the whole domain. Collective.
///
/// Integrals are computed cell by cell with a quadrature rule one order above the one used for
/// assembly, and the maximum norm is taken over the quadrature points of that rule.
/// Contributions of all ranks are combined: squares are summed for the `L2`-type norms, values
/// are summed for `L1`, and the maximum is taken for `Linfty`.
pub fn compute_error(
    discretization: &Discretization,
    solution: &GhostedVector,
    exact: &dyn ExactSolution,
    t: f64,
    norm: NormType,
) -> f64 {
    let mesh = &discretization.mesh;
    let dofs = &discretization.dofs;
    let space = &discretization.space;
    let mut cell_values = CellValues::new(space.element(), space.error_quadrature());
    let mut u_cell = vec![0.0; dofs.dofs_per_cell()];

    let mut local = 0.0f64;
    for (local_cell, &cell) in mesh.locally_owned_cells().iter().enumerate() {
        let geometry = TetrahedronGeometry::from_vertices(&mesh.mesh().cell_vertices(cell))
            .expect("Internal error: validated mesh cannot contain degenerate cells");
        cell_values.reinit(&geometry);
        solution.gather(dofs.cell_dofs(local_cell), &mut u_cell);

        for q in 0..cell_values.num_quadrature_points() {
            let x = cell_values.quadrature_point(q);
            let w = cell_values.jxw(q);
            let value_error = || cell_values.interpolate(&u_cell, q) - exact.value(x, t);
            let gradient_error = || (cell_values.interpolate_gradient(&u_cell, q) - exact.gradient(x, t)).norm_squared();
            match norm {
                NormType::L1 => local += value_error().abs() * w,
                NormType::L2 => local += value_error().powi(2) * w,
                NormType::Linfty => local = local.max(value_error().abs()),
                NormType::H1Seminorm => local += gradient_error() * w,
                NormType::H1 => local += (value_error().powi(2) + gradient_error()) * w,
            }
        }
    }

    let comm = discretization.communicator();
    match norm {
        NormType::L1 => comm.all_reduce_sum(local),
        NormType::Linfty => comm.all_reduce_max(local),
        NormType::L2 | NormType::H1Seminorm | NormType::H1 => comm.all_reduce_sum(local).sqrt(),
    }
}
