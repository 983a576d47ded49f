use log::debug;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// A nonlinear system `R(u) = 0` whose iterate, residual and Jacobian are stored by the
/// implementor.
pub trait NonlinearSystem {
    type Error;

    /// Assembles the residual and the Jacobian at the current iterate and returns the norm
    /// of the residual.
    fn assemble(&mut self) -> Result<f64, Self::Error>;

    /// Solves the Jacobian system for the Newton increment and applies it to the iterate.
    fn solve_and_update(&mut self) -> Result<(), Self::Error>;

    /// Called once per assembly with the number of updates applied so far and the residual norm.
    fn report(&mut self, _iteration: usize, _residual_norm: f64) {}
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NewtonSettings {
    pub max_iterations: usize,
    pub tolerance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewtonOutcome {
    /// Number of increments applied to the iterate.
    pub updates: usize,
    /// The last assembled residual norm.
    pub residual_norm: f64,
    /// Residual norms in order of assembly.
    pub residual_history: Vec<f64>,
    /// Whether the last assembled residual norm is within the tolerance.
    pub converged: bool,
}

#[derive(Debug)]
pub enum NewtonError {
    /// The procedure failed because the maximum number of iterations was reached.
    MaximumIterationsReached { max_iterations: usize, residual_norm: f64 },
}

impl Display for NewtonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            NewtonError::MaximumIterationsReached {
                max_iterations,
                residual_norm,
            } => write!(
                f,
                "Failed to converge within maximum number of iterations ({}), residual norm {:e}.",
                max_iterations, residual_norm
            ),
        }
    }
}

impl Error for NewtonError {}

impl NewtonOutcome {
    /// Turns an unconverged outcome into an error.
    pub fn into_result(self, settings: &NewtonSettings) -> Result<Self, NewtonError> {
        if self.converged {
            Ok(self)
        } else {
            Err(NewtonError::MaximumIterationsReached {
                max_iterations: settings.max_iterations,
                residual_norm: self.residual_norm,
            })
        }
    }
}

/// Attempts to solve the nonlinear system `R(u) = 0` with Newton's method.
///
/// The residual is assembled at the start of every iteration and the iteration stops as soon
/// as its norm is at most the tolerance, so a converged solve performs one more assembly than
/// updates. At most `max_iterations` updates are applied. Reaching the limit is not an error
/// here; the returned outcome records whether the last assembled residual converged.
///
/// Errors from assembly or from the linear solve abort the iteration and are propagated.
pub fn newton<S>(system: &mut S, settings: &NewtonSettings) -> Result<NewtonOutcome, S::Error>
where
    S: NonlinearSystem,
{
    let mut outcome = NewtonOutcome {
        updates: 0,
        residual_norm: f64::INFINITY,
        residual_history: Vec::new(),
        converged: false,
    };

    // Written so that a NaN residual norm keeps iterating instead of passing as converged
    while outcome.updates < settings.max_iterations && !(outcome.residual_norm <= settings.tolerance) {
        let residual_norm = system.assemble()?;
        outcome.residual_norm = residual_norm;
        outcome.residual_history.push(residual_norm);
        system.report(outcome.updates, residual_norm);

        if residual_norm <= settings.tolerance {
            break;
        }

        system.solve_and_update()?;
        outcome.updates += 1;
        debug!("Newton update {} applied, residual norm before update {:e}", outcome.updates, residual_norm);
    }

    outcome.converged = outcome.residual_norm <= settings.tolerance;
    Ok(outcome)
}
