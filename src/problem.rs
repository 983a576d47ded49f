//! The Fisher-Kolmogorov time-dependent problem and its solvers.
use crate::assembly::{create_sparsity_pattern, ThetaMethodAssembler, TimeStep};
use crate::coefficients::{Coefficients, ExactSolution};
use crate::config::Parameters;
use crate::discretization::{Discretization, DistributedMesh, FiniteElementSpace};
use crate::dofs::DofHandler;
use crate::error::Error;
use crate::estimate::{compute_error, NormType};
use crate::io::msh::load_msh_from_file;
use crate::io::vtk::write_time_step;
use crate::mesh::TetMesh;
use fk_optimize::newton::{newton, NewtonOutcome, NewtonSettings, NonlinearSystem};
use fk_parallel::Communicator;
use fk_sparse::cg::{AbsoluteResidualCriterion, CgOutput, ConjugateGradient};
use fk_sparse::{DistributedCsrMatrix, DistributedVector, GhostedVector, SsorPreconditioner};
use log::warn;

/// Logs at info level on the root rank only.
macro_rules! root_info {
    ($comm:expr, $($arg:tt)+) => {
        if $comm.is_root() {
            log::info!($($arg)+);
        }
    };
}

const SEPARATOR: &str = "-----------------------------------------------";
const BANNER: &str = "===============================================";

/// Relaxation parameter of the SSOR preconditioner.
const SSOR_OMEGA: f64 = 1.0;

/// Record of one completed time step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSummary {
    pub time_step: usize,
    pub time: f64,
    pub newton: NewtonOutcome,
}

/// Record of a complete run of [`FisherKolmogorov::solve`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationSummary {
    pub steps: Vec<StepSummary>,
}

impl SimulationSummary {
    /// Time at the end of the last step, or zero if no step was taken.
    pub fn final_time(&self) -> f64 {
        self.steps.last().map_or(0.0, |step| step.time)
    }

    pub fn all_converged(&self) -> bool {
        self.steps.iter().all(|step| step.newton.converged)
    }
}

/// The Fisher-Kolmogorov problem on one rank.
///
/// Holds the discretization, the distributed linear system and the solution vectors. All
/// methods that communicate are collective and must be called by every rank in the same
/// order.
pub struct FisherKolmogorov {
    parameters: Parameters,
    coefficients: Coefficients,
    discretization: Discretization,
    assembler: ThetaMethodAssembler,

    jacobian: DistributedCsrMatrix,
    residual: DistributedVector,
    delta: DistributedVector,
    solution_owned: DistributedVector,
    solution: GhostedVector,
    solution_old: GhostedVector,

    time: f64,
    time_old: f64,
    time_step: usize,
}

impl FisherKolmogorov {
    /// Builds the discretization and the linear system on the given mesh. Collective.
    pub fn setup(
        comm: &Communicator,
        parameters: Parameters,
        coefficients: Coefficients,
        mesh: TetMesh,
    ) -> Result<Self, Error> {
        parameters.validate()?;

        root_info!(comm, "Initializing the mesh");
        let mesh = DistributedMesh::new(comm, mesh)?;
        root_info!(comm, "  Number of elements = {}", mesh.n_global_cells());
        root_info!(comm, "{}", SEPARATOR);

        root_info!(comm, "Initializing the finite element space");
        let space = FiniteElementSpace::new(parameters.mesh.degree)?;
        root_info!(comm, "  Degree                     = {}", space.degree());
        root_info!(comm, "  DoFs per cell              = {}", space.element().num_nodes());
        root_info!(comm, "  Quadrature points per cell = {}", space.quadrature().0.len());
        root_info!(comm, "{}", SEPARATOR);

        root_info!(comm, "Initializing the DoF handler");
        let dofs = DofHandler::distribute(&mesh, &space);
        root_info!(comm, "  Number of DoFs = {}", dofs.n_dofs());
        root_info!(comm, "{}", SEPARATOR);
        let discretization = Discretization { mesh, space, dofs };

        root_info!(comm, "Initializing the linear system");
        root_info!(comm, "  Initializing the sparsity pattern");
        let pattern = create_sparsity_pattern(&discretization);
        root_info!(comm, "  Initializing the matrices");
        let jacobian = DistributedCsrMatrix::new(&pattern);
        root_info!(comm, "  Initializing the system right-hand side");
        let partitioner = discretization.dofs.partitioner();
        let residual = DistributedVector::new(partitioner.clone());
        root_info!(comm, "  Initializing the solution vector");
        let delta = DistributedVector::new(partitioner.clone());
        let solution_owned = DistributedVector::new(partitioner.clone());
        let solution = GhostedVector::new(partitioner.clone());
        let solution_old = GhostedVector::new(partitioner.clone());

        let assembler = ThetaMethodAssembler::new(&discretization.space, parameters.physics.alpha);

        Ok(Self {
            parameters,
            coefficients,
            discretization,
            assembler,
            jacobian,
            residual,
            delta,
            solution_owned,
            solution,
            solution_old,
            time: 0.0,
            time_old: 0.0,
            time_step: 0,
        })
    }

    /// Sets up the shipped brain model on the mesh named by the `Mesh file` parameter.
    /// Collective.
    pub fn from_parameters(comm: &Communicator, parameters: Parameters) -> Result<Self, Error> {
        let mesh_file = parameters
            .mesh
            .mesh_file
            .clone()
            .ok_or_else(|| Error::ConfigInvalid("no mesh file given".to_string()))?;
        let mesh = load_msh_from_file(mesh_file)?;
        let coefficients = Coefficients::from_parameters(&parameters);
        Self::setup(comm, parameters, coefficients, mesh)
    }

    pub fn communicator(&self) -> &Communicator {
        self.discretization.communicator()
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn discretization(&self) -> &Discretization {
        &self.discretization
    }

    /// Current time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Index of the current time step; zero before the first step.
    pub fn time_step(&self) -> usize {
        self.time_step
    }

    /// The owned entries of the current iterate.
    pub fn solution_owned(&self) -> &DistributedVector {
        &self.solution_owned
    }

    /// The current iterate including ghost entries.
    pub fn solution(&self) -> &GhostedVector {
        &self.solution
    }

    /// The solution at the start of the current time step.
    pub fn solution_old(&self) -> &GhostedVector {
        &self.solution_old
    }

    pub fn jacobian(&self) -> &DistributedCsrMatrix {
        &self.jacobian
    }

    /// The negative residual `-F(u)` of the last assembly.
    pub fn residual(&self) -> &DistributedVector {
        &self.residual
    }

    /// Interpolates the initial condition and resets the time to zero. Collective.
    pub fn apply_initial_condition(&mut self) {
        self.time = 0.0;
        self.time_old = 0.0;
        self.time_step = 0;
        self.discretization
            .dofs
            .interpolate(self.coefficients.initial_condition.as_ref(), &mut self.solution_owned);
        self.solution.update_from(&self.solution_owned);
        self.solution_old.copy_from(&self.solution);
    }

    /// Starts the next time step: stores the current solution as the old one and advances
    /// the time by `deltat`.
    pub fn advance_time(&mut self) {
        self.time_old = self.time;
        self.time += self.parameters.time.deltat;
        self.time_step += 1;
        self.solution_old.copy_from(&self.solution);
    }

    /// Assembles the Jacobian and the negative residual at the current iterate. Collective.
    pub fn assemble_system(&mut self) {
        let step = TimeStep {
            t_old: self.time_old,
            deltat: self.parameters.time.deltat,
            theta: self.parameters.time.theta,
        };
        self.assembler.assemble(
            &self.discretization,
            &self.coefficients,
            &step,
            &self.solution,
            &self.solution_old,
            &mut self.jacobian,
            &mut self.residual,
        );
    }

    /// Solves `J δ = r` for the Newton increment with SSOR-preconditioned CG. Collective.
    ///
    /// The increment starts from zero. The solve stops once the residual norm is at most
    /// `CG tolerance factor * ||r||`.
    pub fn solve_linear_system(&mut self) -> Result<CgOutput, Error> {
        let comm = self.discretization.communicator();
        let solver_parameters = &self.parameters.solver;
        let tolerance = solver_parameters.cg_tolerance_factor * self.residual.l2_norm();

        let preconditioner = SsorPreconditioner::new(&self.jacobian, SSOR_OMEGA);
        if comm.all_reduce_or(preconditioner.is_err()) {
            let row = preconditioner.err().map(|err| err.row);
            return Err(Error::ZeroDiagonal { row });
        }
        let preconditioner = preconditioner.expect("Internal error: checked above");

        self.delta.fill(0.0);
        let output = ConjugateGradient::new(comm)
            .with_operator(&self.jacobian)
            .with_preconditioner(&preconditioner)
            .with_stopping_criterion(AbsoluteResidualCriterion::new(tolerance))
            .with_max_iter(solver_parameters.max_cg_iterations)
            .solve_with_guess(self.residual.owned_values(), self.delta.owned_values_mut())?;

        root_info!(comm, "  {} CG iterations", output.num_iterations);
        Ok(output)
    }

    /// Solves the nonlinear system of the current time step with Newton's method. Collective.
    ///
    /// Reaching the iteration cap is not an error here; it is recorded in the outcome.
    pub fn solve_newton(&mut self) -> Result<NewtonOutcome, Error> {
        let settings = NewtonSettings {
            max_iterations: self.parameters.solver.max_newton_iterations,
            tolerance: self.parameters.solver.newton_tolerance,
        };
        newton(&mut NewtonStep { problem: self }, &settings)
    }

    /// Writes the current solution as output of the given time step. Collective.
    pub fn output(&self, time_step: usize) -> Result<(), Error> {
        let output = &self.parameters.output;
        if !output.enabled {
            return Ok(());
        }
        write_time_step(&output.directory, time_step, &self.discretization, &self.solution)
    }

    /// Runs the simulation from the initial condition to the final time. Collective.
    ///
    /// Steps of size `deltat` are taken while `t < T - deltat / 2`. A time step whose Newton
    /// iteration does not converge is reported and the run continues, unless
    /// `Abort on Newton failure` is set. Output failures are reported and otherwise ignored.
    pub fn solve(&mut self) -> Result<SimulationSummary, Error> {
        let comm = self.communicator().clone();
        root_info!(comm, "{}", BANNER);

        root_info!(comm, "Applying the initial condition");
        self.apply_initial_condition();
        self.write_output_or_warn(0);
        root_info!(comm, "{}", SEPARATOR);

        let final_time = self.parameters.time.final_time;
        let deltat = self.parameters.time.deltat;
        let mut summary = SimulationSummary::default();
        while self.time < final_time - 0.5 * deltat {
            self.advance_time();
            root_info!(comm, "n = {:>3}, t = {:>5.6}", self.time_step, self.time);

            let outcome = self.solve_newton()?;
            if !outcome.converged {
                let error = Error::NewtonNonConvergence {
                    time_step: self.time_step,
                    iterations: outcome.updates,
                    residual_norm: outcome.residual_norm,
                };
                if self.parameters.solver.abort_on_newton_failure {
                    return Err(error);
                }
                if comm.is_root() {
                    warn!("{}", error);
                }
            }

            self.write_output_or_warn(self.time_step);
            root_info!(comm, "");

            summary.steps.push(StepSummary {
                time_step: self.time_step,
                time: self.time,
                newton: outcome,
            });
        }

        Ok(summary)
    }

    fn write_output_or_warn(&self, time_step: usize) {
        if let Err(err) = self.output(time_step) {
            warn!("Rank {}: {}", self.communicator().rank(), err);
        }
    }

    /// Norm of the difference between the current solution and `exact` at the current time.
    /// Collective.
    pub fn compute_error(&self, norm: NormType, exact: &dyn ExactSolution) -> f64 {
        compute_error(&self.discretization, &self.solution, exact, self.time, norm)
    }
}

/// Newton's method on the nonlinear system of the current time step.
struct NewtonStep<'a> {
    problem: &'a mut FisherKolmogorov,
}

impl NonlinearSystem for NewtonStep<'_> {
    type Error = Error;

    fn assemble(&mut self) -> Result<f64, Error> {
        self.problem.assemble_system();
        Ok(self.problem.residual.l2_norm())
    }

    fn solve_and_update(&mut self) -> Result<(), Error> {
        let problem = &mut *self.problem;
        problem.solve_linear_system()?;
        problem.solution_owned += &problem.delta;
        problem.solution.update_from(&problem.solution_owned);
        Ok(())
    }

    fn report(&mut self, iteration: usize, residual_norm: f64) {
        let solver = &self.problem.parameters.solver;
        let converged = if residual_norm <= solver.newton_tolerance {
            " < tolerance"
        } else {
            ""
        };
        root_info!(
            self.problem.communicator(),
            "  Newton iteration {}/{} - ||r|| = {}{}",
            iteration,
            solver.max_newton_iterations,
            format_scientific(residual_norm),
            converged
        );
    }
}

/// Formats like C's `%.6e`, with a sign and at least two exponent digits.
fn format_scientific(value: f64) -> String {
    let formatted = format!("{:.6e}", value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        // inf and NaN
        None => formatted,
    }
}
