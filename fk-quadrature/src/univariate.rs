//! Quadrature rules for the one-dimensional domain `[-1, 1]`.

use crate::{Error, Rule1d};
use nalgebra::{DMatrix, SymmetricEigen};

/// Gauss quadrature for the reference interval [-1, 1].
///
/// Returns the [Gauss quadrature rule] with the given number of points. Given `n` points,
/// the rule integrates polynomials of order up to `2 n - 1` exactly.
///
/// [Gauss quadrature rule]: https://en.wikipedia.org/wiki/Gaussian_quadrature
pub fn gauss(num_points: usize) -> Result<Rule1d, Error> {
    gauss_jacobi(num_points, 0, 0)
}

/// Gauss-Jacobi quadrature for the weight $(1 - x)^\alpha (1 + x)^\beta$ on [-1, 1].
///
/// Given `n` points, the rule satisfies
/// <div>$$
///   \int_{-1}^1 (1 - x)^\alpha (1 + x)^\beta p(x) \, \mathrm{d}x = \sum_i w_i \, p(x_i)
/// $$</div>
/// for every polynomial $p$ of degree at most `2 n - 1`. Points are returned in ascending order.
///
/// The rule is computed with the Golub-Welsch algorithm: the points are the eigenvalues of the
/// symmetric tridiagonal Jacobi matrix of the three-term recurrence of the Jacobi polynomials,
/// and the weights follow from the first components of the normalized eigenvectors.
///
/// Returns an error if zero points are requested.
pub fn gauss_jacobi(num_points: usize, alpha: u32, beta: u32) -> Result<Rule1d, Error> {
    let n = num_points;
    if n == 0 {
        return Err(Error::NoRuleAvailable);
    }

    let a = f64::from(alpha);
    let b = f64::from(beta);
    let ab = a + b;

    let mut jacobi_matrix = DMatrix::zeros(n, n);
    for k in 0..n {
        let k_f = k as f64;
        jacobi_matrix[(k, k)] = if k == 0 {
            (b - a) / (ab + 2.0)
        } else {
            (b * b - a * a) / ((2.0 * k_f + ab) * (2.0 * k_f + ab + 2.0))
        };

        if k + 1 < n {
            let m = k_f + 1.0;
            // For m = 1 a factor (1 + a + b) cancels between numerator and denominator
            let off_diagonal_squared = if k == 0 {
                4.0 * (1.0 + a) * (1.0 + b) / ((2.0 + ab).powi(2) * (3.0 + ab))
            } else {
                4.0 * m * (m + a) * (m + b) * (m + ab)
                    / ((2.0 * m + ab).powi(2) * (2.0 * m + ab + 1.0) * (2.0 * m + ab - 1.0))
            };
            let off_diagonal = off_diagonal_squared.sqrt();
            jacobi_matrix[(k, k + 1)] = off_diagonal;
            jacobi_matrix[(k + 1, k)] = off_diagonal;
        }
    }

    let mu_0 = jacobi_weight_integral(alpha, beta);
    let eigen = SymmetricEigen::new(jacobi_matrix);

    let mut pairs: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let v0 = eigen.eigenvectors[(0, i)];
            (eigen.eigenvalues[i], mu_0 * v0 * v0)
        })
        .collect();
    pairs.sort_by(|(x1, _), (x2, _)| x1.total_cmp(x2));

    let weights = pairs.iter().map(|&(_, w)| w).collect();
    let points = pairs.iter().map(|&(x, _)| [x]).collect();
    Ok((weights, points))
}

/// Computes $\int_{-1}^1 (1 - x)^\alpha (1 + x)^\beta \, \mathrm{d}x = 2^{\alpha + \beta + 1} \alpha! \beta! / (\alpha + \beta + 1)!$.
fn jacobi_weight_integral(alpha: u32, beta: u32) -> f64 {
    let factorial = |k: u32| (1..=k).map(f64::from).product::<f64>();
    2.0f64.powi((alpha + beta + 1) as i32) * factorial(alpha) * factorial(beta) / factorial(alpha + beta + 1)
}
