use crate::cg::{LinearOperator, OperatorError};
use crate::matrix::DistributedCsrMatrix;
use nalgebra::DVector;
use std::fmt;

/// Raised when a preconditioner cannot be built from a matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroDiagonalError {
    /// Global index of the offending row.
    pub row: usize,
}

impl fmt::Display for ZeroDiagonalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {} has a zero or missing diagonal entry", self.row)
    }
}

impl std::error::Error for ZeroDiagonalError {}

/// Symmetric successive over-relaxation applied to the block of each rank's owned rows and
/// columns.
///
/// With `A_loc = L + D + U` the owned-owned block of the matrix, application computes
/// <div>$$
///   z = \frac{2 - \omega}{\omega} \left(\frac{D}{\omega} + U\right)^{-1} \frac{D}{\omega} \left(\frac{D}{\omega} + L\right)^{-1} r.
/// $$</div>
/// Couplings to ghost columns are ignored, so on more than one rank the preconditioner is the
/// block Jacobi method with SSOR on each block. Application needs no communication.
#[derive(Debug)]
pub struct SsorPreconditioner<'a> {
    matrix: &'a DistributedCsrMatrix,
    diagonal: DVector<f64>,
    /// Position of the diagonal entry within the stored entries of each row.
    diagonal_positions: Vec<usize>,
    omega: f64,
}

impl<'a> SsorPreconditioner<'a> {
    /// # Panics
    ///
    /// Panics unless `0 < omega < 2`.
    pub fn new(matrix: &'a DistributedCsrMatrix, omega: f64) -> Result<Self, ZeroDiagonalError> {
        assert!(omega > 0.0 && omega < 2.0, "SSOR relaxation parameter must lie in (0, 2)");
        let local = matrix.local_matrix();
        let row_offset = matrix.row_partitioner().owned_range().start;

        let mut diagonal = DVector::zeros(local.nrows());
        let mut diagonal_positions = Vec::with_capacity(local.nrows());
        for i in 0..local.nrows() {
            let row = local.row(i);
            let position = row
                .col_indices()
                .binary_search(&i)
                .map_err(|_| ZeroDiagonalError { row: row_offset + i })?;
            let value = row.values()[position];
            if value == 0.0 {
                return Err(ZeroDiagonalError { row: row_offset + i });
            }
            diagonal[i] = value;
            diagonal_positions.push(position);
        }

        Ok(Self {
            matrix,
            diagonal,
            diagonal_positions,
            omega,
        })
    }
}

impl<'a> LinearOperator for SsorPreconditioner<'a> {
    fn apply(&self, z: &mut DVector<f64>, r: &DVector<f64>) -> Result<(), OperatorError> {
        let local = self.matrix.local_matrix();
        let n = self.diagonal.len();
        let omega = self.omega;
        assert_eq!(r.len(), n);
        assert_eq!(z.len(), n);

        // Forward sweep, (D / omega + L) y = r
        for i in 0..n {
            let row = local.row(i);
            let (cols, values) = (row.col_indices(), row.values());
            let lower = (0..self.diagonal_positions[i]).map(|k| values[k] * z[cols[k]]);
            let sum: f64 = lower.sum();
            z[i] = (r[i] - sum) * omega / self.diagonal[i];
        }

        // Scaling, w = (2 - omega) / omega * (D / omega) y
        let scale = (2.0 - omega) / (omega * omega);
        z.zip_apply(&self.diagonal, |z_i, d_i| *z_i *= scale * d_i);

        // Backward sweep, (D / omega + U) z = w. Ghost columns follow the owned ones.
        for i in (0..n).rev() {
            let row = local.row(i);
            let (cols, values) = (row.col_indices(), row.values());
            let mut sum = 0.0;
            for k in self.diagonal_positions[i] + 1..cols.len() {
                if cols[k] >= n {
                    break;
                }
                sum += values[k] * z[cols[k]];
            }
            z[i] = (z[i] - sum) * omega / self.diagonal[i];
        }

        Ok(())
    }
}
