//! Preconditioned Conjugate Gradient for distributed symmetric positive definite systems.
//!
//! Vectors passed to the solver hold the owned entries of the calling rank. Operators and
//! preconditioners perform whatever communication they need, and inner products are reduced
//! over the communicator, so every rank must call [`ConjugateGradient::solve_with_guess`]
//! collectively.
use core::fmt;
use fk_parallel::Communicator;
use nalgebra::DVector;
use std::error::Error;

/// Error raised while applying an operator or a preconditioner.
pub type OperatorError = Box<dyn Error + Send + Sync>;

pub trait LinearOperator {
    /// Computes `y = A x` for the owned entries `x` and `y`.
    fn apply(&self, y: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), OperatorError>;
}

impl<'a, A> LinearOperator for &'a A
where
    A: ?Sized + LinearOperator,
{
    fn apply(&self, y: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), OperatorError> {
        <A as LinearOperator>::apply(self, y, x)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityOperator;

impl LinearOperator for IdentityOperator {
    fn apply(&self, y: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), OperatorError> {
        y.copy_from(x);
        Ok(())
    }
}

pub trait CgStoppingCriterion {
    /// Decides convergence from the global norm of the right-hand side and the global norm of
    /// the residual recurrence after `iteration` updates.
    fn has_converged(&self, b_norm: f64, iteration: usize, residual_norm: f64) -> bool;
}

/// Absolute residual tolerance ||r|| <= tol.
#[derive(Debug, Clone, Copy)]
pub struct AbsoluteResidualCriterion {
    tol: f64,
}

impl AbsoluteResidualCriterion {
    pub fn new(tol: f64) -> Self {
        Self { tol }
    }
}

impl CgStoppingCriterion for AbsoluteResidualCriterion {
    fn has_converged(&self, _b_norm: f64, _iteration: usize, residual_norm: f64) -> bool {
        residual_norm <= self.tol
    }
}

/// Relative residual tolerance ||r|| <= tol * ||b||.
///
/// Note that we use the *approximate* residual given by Conjugate-Gradient. For ill-conditioned
/// problems, it is possible that CG's residual converges, but the real residual does not.
#[derive(Debug, Clone, Copy)]
pub struct RelativeResidualCriterion {
    tol: f64,
}

impl RelativeResidualCriterion {
    pub fn new(tol: f64) -> Self {
        Self { tol }
    }
}

impl Default for RelativeResidualCriterion {
    fn default() -> Self {
        Self::new(1e-8)
    }
}

impl CgStoppingCriterion for RelativeResidualCriterion {
    fn has_converged(&self, b_norm: f64, _iteration: usize, residual_norm: f64) -> bool {
        residual_norm <= self.tol * b_norm
    }
}

#[derive(Debug, Clone)]
#[allow(non_snake_case)]
pub struct CgWorkspace {
    r: DVector<f64>,
    z: DVector<f64>,
    p: DVector<f64>,
    Ap: DVector<f64>,
}

#[allow(non_snake_case)]
struct Buffers<'a> {
    r: &'a mut DVector<f64>,
    z: &'a mut DVector<f64>,
    p: &'a mut DVector<f64>,
    Ap: &'a mut DVector<f64>,
}

impl Default for CgWorkspace {
    fn default() -> Self {
        Self {
            r: DVector::zeros(0),
            z: DVector::zeros(0),
            p: DVector::zeros(0),
            Ap: DVector::zeros(0),
        }
    }
}

impl CgWorkspace {
    fn prepare_buffers(&mut self, dim: usize) -> Buffers {
        for buffer in [&mut self.r, &mut self.z, &mut self.p, &mut self.Ap] {
            buffer.resize_vertically_mut(dim, 0.0);
        }
        Buffers {
            r: &mut self.r,
            z: &mut self.z,
            p: &mut self.p,
            Ap: &mut self.Ap,
        }
    }
}

#[derive(Debug)]
pub struct ConjugateGradient<A, P, Criterion> {
    comm: Communicator,
    workspace: CgWorkspace,
    operator: A,
    preconditioner: P,
    stopping_criterion: Criterion,
    max_iter: Option<usize>,
}

impl ConjugateGradient<(), IdentityOperator, ()> {
    /// A solver whose inner products are reduced over `comm`.
    pub fn new(comm: &Communicator) -> Self {
        Self {
            comm: comm.clone(),
            workspace: CgWorkspace::default(),
            operator: (),
            preconditioner: IdentityOperator,
            stopping_criterion: (),
            max_iter: None,
        }
    }
}

impl<P, Criterion> ConjugateGradient<(), P, Criterion> {
    pub fn with_operator<A>(self, operator: A) -> ConjugateGradient<A, P, Criterion> {
        ConjugateGradient {
            comm: self.comm,
            workspace: self.workspace,
            operator,
            preconditioner: self.preconditioner,
            stopping_criterion: self.stopping_criterion,
            max_iter: self.max_iter,
        }
    }
}

impl<A, P, Criterion> ConjugateGradient<A, P, Criterion> {
    pub fn with_preconditioner<P2>(self, preconditioner: P2) -> ConjugateGradient<A, P2, Criterion> {
        ConjugateGradient {
            comm: self.comm,
            workspace: self.workspace,
            operator: self.operator,
            preconditioner,
            stopping_criterion: self.stopping_criterion,
            max_iter: self.max_iter,
        }
    }

    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self {
            max_iter: Some(max_iter),
            ..self
        }
    }
}

impl<A, P> ConjugateGradient<A, P, ()> {
    pub fn with_stopping_criterion<Criterion>(self, stopping_criterion: Criterion) -> ConjugateGradient<A, P, Criterion> {
        ConjugateGradient {
            comm: self.comm,
            workspace: self.workspace,
            operator: self.operator,
            preconditioner: self.preconditioner,
            stopping_criterion,
            max_iter: self.max_iter,
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum SolveErrorKind {
    OperatorError(OperatorError),
    PreconditionerError(OperatorError),
    IndefiniteOperator,
    IndefinitePreconditioner,
    MaxIterationsReached { max_iter: usize },
}

impl fmt::Display for SolveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperatorError(err) => write!(f, "Error applying operator: {}", err),
            Self::PreconditionerError(err) => write!(f, "Error applying preconditioner: {}", err),
            Self::IndefiniteOperator => write!(f, "Operator appears to be indefinite"),
            Self::IndefinitePreconditioner => write!(f, "Indefinite preconditioner"),
            Self::MaxIterationsReached { max_iter } => {
                write!(f, "Max iterations ({}) reached", max_iter)
            }
        }
    }
}

#[non_exhaustive]
#[derive(Debug)]
pub struct SolveError {
    pub output: CgOutput,
    pub kind: SolveErrorKind,
}

impl SolveError {
    fn new(output: CgOutput, kind: SolveErrorKind) -> Self {
        Self { output, kind }
    }
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CG solve failed after {} iterations with residual norm {:e}: {}",
            self.output.num_iterations, self.output.residual_norm, self.kind
        )
    }
}

impl std::error::Error for SolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            SolveErrorKind::OperatorError(err) | SolveErrorKind::PreconditionerError(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct CgOutput {
    /// Number of iterations of the solver.
    ///
    /// Corresponds to the number of updates made to the (initial) solution vector.
    pub num_iterations: usize,
    /// Global norm of the last residual recurrence.
    pub residual_norm: f64,
}

impl<A, P, Criterion> ConjugateGradient<A, P, Criterion>
where
    A: LinearOperator,
    P: LinearOperator,
    Criterion: CgStoppingCriterion,
{
    fn global_dot(&self, x: &DVector<f64>, y: &DVector<f64>) -> f64 {
        self.comm.all_reduce_sum(x.dot(y))
    }

    /// Solves `A x = b` starting from the current contents of `x`. Collective.
    pub fn solve_with_guess(&mut self, b: &DVector<f64>, x: &mut DVector<f64>) -> Result<CgOutput, SolveError> {
        assert_eq!(b.len(), x.len());
        let mut workspace = std::mem::take(&mut self.workspace);
        let result = self.solve_with_buffers(workspace.prepare_buffers(x.len()), b, x);
        self.workspace = workspace;

        if let Ok(output) = &result {
            log::trace!(
                "CG converged after {} iterations with residual norm {:e}",
                output.num_iterations,
                output.residual_norm
            );
        }
        result
    }

    #[allow(non_snake_case)]
    fn solve_with_buffers(
        &self,
        buffers: Buffers,
        b: &DVector<f64>,
        x: &mut DVector<f64>,
    ) -> Result<CgOutput, SolveError> {
        use SolveErrorKind::*;
        let Buffers { r, z, p, Ap } = buffers;

        let mut output = CgOutput {
            num_iterations: 0,
            residual_norm: 0.0,
        };

        // r = b - Ax
        if let Err(err) = self.operator.apply(r, x) {
            return Err(SolveError::new(output, OperatorError(err)));
        }
        r.zip_apply(b, |Ax_i, b_i| *Ax_i = b_i - *Ax_i);

        // z = Pr
        if let Err(err) = self.preconditioner.apply(z, r) {
            return Err(SolveError::new(output, PreconditionerError(err)));
        }

        // p = z
        p.copy_from(z);

        let mut zTr = self.global_dot(z, r);
        let b_norm = self.global_dot(b, b).sqrt();

        if b_norm == 0.0 {
            x.fill(0.0);
            return Ok(output);
        }

        loop {
            output.residual_norm = self.global_dot(r, r).sqrt();
            if self
                .stopping_criterion
                .has_converged(b_norm, output.num_iterations, output.residual_norm)
            {
                break;
            } else if let Some(max_iter) = self.max_iter {
                if output.num_iterations >= max_iter {
                    return Err(SolveError::new(output, MaxIterationsReached { max_iter }));
                }
            }

            // Ap = A * p
            if let Err(err) = self.operator.apply(Ap, p) {
                return Err(SolveError::new(output, OperatorError(err)));
            }
            let pAp = self.global_dot(p, Ap);

            if pAp <= 0.0 {
                return Err(SolveError::new(output, IndefiniteOperator));
            }
            if zTr <= 0.0 {
                return Err(SolveError::new(output, IndefinitePreconditioner));
            }

            let alpha = zTr / pAp;
            // x <- x + alpha * p
            x.axpy(alpha, p, 1.0);
            // r <- r - alpha * Ap
            r.axpy(-alpha, Ap, 1.0);

            // Number of iterations corresponds to number of updates to the x vector
            output.num_iterations += 1;

            // z <- P r
            if let Err(err) = self.preconditioner.apply(z, r) {
                return Err(SolveError::new(output, PreconditionerError(err)));
            }
            let zTr_next = self.global_dot(z, r);
            let beta = zTr_next / zTr;

            // p <- z + beta * p
            p.axpy(1.0, z, beta);

            zTr = zTr_next;
        }

        Ok(output)
    }
}
