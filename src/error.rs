//! Error type of the solver library.
use fk_sparse::cg::SolveError;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// A parameter is missing, malformed or outside its admissible range.
    ConfigInvalid(String),
    /// A file could not be read.
    MeshIo { path: PathBuf, source: std::io::Error },
    /// The mesh is not a valid conforming tetrahedral mesh.
    MeshInvalid(String),
    /// The Jacobian has a zero or missing diagonal entry, so it cannot be preconditioned.
    ///
    /// `row` is the offending global row if it is owned by the reporting rank.
    ZeroDiagonal { row: Option<usize> },
    /// The linear solver did not reach its tolerance within the iteration cap.
    CgNonConvergence(SolveError),
    /// Newton's method did not reach its tolerance within the iteration cap.
    NewtonNonConvergence {
        time_step: usize,
        iterations: usize,
        residual_norm: f64,
    },
    /// Writing output files failed.
    Output { path: PathBuf, source: std::io::Error },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigInvalid(message) => write!(f, "Invalid configuration: {}", message),
            Self::MeshIo { path, source } => {
                write!(f, "Failed to read mesh file {}: {}", path.display(), source)
            }
            Self::MeshInvalid(message) => write!(f, "Invalid mesh: {}", message),
            Self::ZeroDiagonal { row: Some(row) } => {
                write!(f, "Jacobian row {} has a zero or missing diagonal entry", row)
            }
            Self::ZeroDiagonal { row: None } => {
                write!(f, "Jacobian has a zero or missing diagonal entry on another rank")
            }
            Self::CgNonConvergence(err) => write!(f, "Linear solver failed: {}", err),
            Self::NewtonNonConvergence {
                time_step,
                iterations,
                residual_norm,
            } => write!(
                f,
                "Newton's method did not converge in time step {} after {} iterations (||r|| = {:e})",
                time_step, iterations, residual_norm
            ),
            Self::Output { path, source } => {
                write!(f, "Failed to write output file {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MeshIo { source, .. } | Self::Output { source, .. } => Some(source),
            Self::CgNonConvergence(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SolveError> for Error {
    fn from(err: SolveError) -> Self {
        Self::CgNonConvergence(err)
    }
}
