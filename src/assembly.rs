//! Assembly of the Newton system of one time step.
//!
//! The semi-discrete Fisher-Kolmogorov equation is advanced with the theta-method. For the
//! step from `t_n` to `t_{n+1} = t_n + Δt` the nonlinear residual
//! <div>$$
//!   F(u) = \frac{u - u^n}{\Delta t}
//!     + \theta \left[ A(u) - f(t_{n+1}) \right]
//!     + (1 - \theta) \left[ A(u^n) - f(t_n) \right],
//!   \qquad A(u) = -\nabla \cdot (D \nabla u) - \alpha u (1 - u),
//! $$</div>
//! is tested against every basis function, with natural boundary conditions. `θ = 1` is the
//! implicit Euler method and `θ = 1/2` the Crank-Nicolson method.
use crate::coefficients::Coefficients;
use crate::discretization::{Discretization, FiniteElementSpace};
use crate::element::{CellValues, TetrahedronGeometry};
use fk_sparse::{DistributedCsrMatrix, DistributedSparsityPattern, DistributedVector, GhostedVector};
use nalgebra::{DMatrix, DVector};

/// The coupling of degrees of freedom through shared cells. Collective.
pub fn create_sparsity_pattern(discretization: &Discretization) -> DistributedSparsityPattern {
    let dofs = &discretization.dofs;
    let mut pattern = DistributedSparsityPattern::new(dofs.partitioner().clone());
    for local_cell in 0..dofs.n_locally_owned_cells() {
        pattern.add_cell_entries(dofs.cell_dofs(local_cell));
    }
    pattern.compress();
    pattern
}

/// Time level data of the step being assembled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStep {
    /// Time at the start of the step.
    pub t_old: f64,
    pub deltat: f64,
    pub theta: f64,
}

impl TimeStep {
    pub fn t_new(&self) -> f64 {
        self.t_old + self.deltat
    }
}

/// Assembles the Jacobian `J = ∂F/∂u` and the negative residual `-F(u)`.
///
/// Holds the per-cell scratch data, which is reset for every cell.
#[derive(Debug, Clone)]
pub struct ThetaMethodAssembler {
    alpha: f64,
    cell_values: CellValues,
    element_matrix: DMatrix<f64>,
    element_residual: DVector<f64>,
    u_cell: Vec<f64>,
    u_old_cell: Vec<f64>,
}

impl ThetaMethodAssembler {
    /// An assembler for the space with reaction rate `alpha`.
    pub fn new(space: &FiniteElementSpace, alpha: f64) -> Self {
        let cell_values = CellValues::new(space.element(), space.quadrature());
        let n = cell_values.num_nodes();
        Self {
            alpha,
            cell_values,
            element_matrix: DMatrix::zeros(n, n),
            element_residual: DVector::zeros(n),
            u_cell: vec![0.0; n],
            u_old_cell: vec![0.0; n],
        }
    }

    /// Assembles the system at the iterate `solution`, with `solution_old` the solution at the
    /// start of the step. Collective.
    ///
    /// Only locally owned cells contribute. The reaction term is linearized around the
    /// current iterate. Both outputs are overwritten and compressed, so afterwards every rank
    /// holds the complete rows of its owned degrees of freedom.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        &mut self,
        discretization: &Discretization,
        coefficients: &Coefficients,
        step: &TimeStep,
        solution: &GhostedVector,
        solution_old: &GhostedVector,
        jacobian: &mut DistributedCsrMatrix,
        residual: &mut DistributedVector,
    ) {
        jacobian.set_zero();
        residual.fill(0.0);

        let mesh = &discretization.mesh;
        let dofs = &discretization.dofs;
        for (local_cell, &cell) in mesh.locally_owned_cells().iter().enumerate() {
            let geometry = TetrahedronGeometry::from_vertices(&mesh.mesh().cell_vertices(cell))
                .expect("Internal error: validated mesh cannot contain degenerate cells");
            let cell_dofs = dofs.cell_dofs(local_cell);
            self.cell_values.reinit(&geometry);
            solution.gather(cell_dofs, &mut self.u_cell);
            solution_old.gather(cell_dofs, &mut self.u_old_cell);

            self.assemble_cell(coefficients, step);

            jacobian.add_block(cell_dofs, &self.element_matrix);
            residual.add(cell_dofs, self.element_residual.as_slice());
        }

        jacobian.compress_add();
        residual.compress_add();
    }

    fn assemble_cell(&mut self, coefficients: &Coefficients, step: &TimeStep) {
        let Self {
            alpha,
            cell_values,
            element_matrix,
            element_residual,
            u_cell,
            u_old_cell,
        } = self;
        let alpha = *alpha;
        let theta = step.theta;
        let inv_dt = 1.0 / step.deltat;
        let t_new = step.t_new();

        element_matrix.fill(0.0);
        element_residual.fill(0.0);

        for q in 0..cell_values.num_quadrature_points() {
            let w = cell_values.jxw(q);
            let x = cell_values.quadrature_point(q);
            let phi = cell_values.values(q);
            let grad_phi = cell_values.gradients(q);
            let d = coefficients.diffusion.value(x);

            let u = cell_values.interpolate(u_cell, q);
            let grad_u = cell_values.interpolate_gradient(u_cell, q);
            let u_old = cell_values.interpolate(u_old_cell, q);
            let f_new = coefficients.forcing.value(x, t_new);

            // Part of the residual that does not depend on the test function index
            let d_grad_u = d * grad_u;
            let reaction = alpha * u * (1.0 - u);
            let reaction_derivative = alpha * (1.0 - 2.0 * u);

            let old_terms = (theta < 1.0).then(|| {
                let grad_u_old = cell_values.interpolate_gradient(u_old_cell, q);
                let f_old = coefficients.forcing.value(x, step.t_old);
                (d * grad_u_old, alpha * u_old * (1.0 - u_old), f_old)
            });

            for i in 0..phi.len() {
                let d_grad_phi_i = d * grad_phi[i];
                for j in 0..phi.len() {
                    let mass = phi[i] * phi[j] * inv_dt;
                    let stiffness = d_grad_phi_i.dot(&grad_phi[j]);
                    let reaction_term = reaction_derivative * phi[i] * phi[j];
                    element_matrix[(i, j)] += (mass + theta * (stiffness - reaction_term)) * w;
                }

                let mut r_i = -(u - u_old) * inv_dt * phi[i]
                    - theta * (d_grad_u.dot(&grad_phi[i]) - reaction * phi[i] - f_new * phi[i]);
                if let Some((d_grad_u_old, reaction_old, f_old)) = &old_terms {
                    r_i -= (1.0 - theta) * (d_grad_u_old.dot(&grad_phi[i]) - reaction_old * phi[i] - f_old * phi[i]);
                }
                element_residual[i] += r_i * w;
            }
        }
    }
}
