//! Quadrature rules for the reference tetrahedron.
//!
//! The reference tetrahedron has vertices `(0, 0, 0)`, `(1, 0, 0)`, `(0, 1, 0)` and `(0, 0, 1)`.

use crate::univariate::gauss_jacobi;
use crate::{Error, Rule1d, Rule3d};

/// Collapsed-coordinate Gauss rule for the reference tetrahedron.
///
/// The unit cube $(a, b, c) \in [0, 1]^3$ is mapped onto the tetrahedron by the Duffy transform
/// <div>$$
///   \xi_1 = a, \quad \xi_2 = b (1 - a), \quad \xi_3 = c (1 - a)(1 - b),
/// $$</div>
/// whose Jacobian determinant $(1 - a)^2 (1 - b)$ is absorbed into Gauss-Jacobi rules in the
/// $a$ and $b$ directions. With `n` points per axis the rule has `n^3` points with positive
/// weights and integrates polynomials of total degree up to `2 n - 1` exactly.
///
/// Returns an error if zero points per axis are requested.
pub fn tetrahedron_gauss(points_per_axis: usize) -> Result<Rule3d, Error> {
    let n = points_per_axis;
    let rule_a = unit_interval_rule(gauss_jacobi(n, 2, 0)?, 2);
    let rule_b = unit_interval_rule(gauss_jacobi(n, 1, 0)?, 1);
    let rule_c = unit_interval_rule(gauss_jacobi(n, 0, 0)?, 0);

    let mut weights = Vec::with_capacity(n * n * n);
    let mut points = Vec::with_capacity(n * n * n);
    for &(w_a, a) in &rule_a {
        for &(w_b, b) in &rule_b {
            for &(w_c, c) in &rule_c {
                weights.push(w_a * w_b * w_c);
                points.push([a, b * (1.0 - a), c * (1.0 - a) * (1.0 - b)]);
            }
        }
    }

    Ok((weights, points))
}

/// Maps a Gauss-Jacobi rule for the weight $(1 - x)^e$ on [-1, 1] onto [0, 1] with weight $(1 - t)^e$.
fn unit_interval_rule((weights, points): Rule1d, exponent: i32) -> Vec<(f64, f64)> {
    let scale = 0.5f64.powi(exponent + 1);
    weights
        .into_iter()
        .zip(points)
        .map(|(w, [x])| (scale * w, 0.5 * (1.0 + x)))
        .collect()
}
