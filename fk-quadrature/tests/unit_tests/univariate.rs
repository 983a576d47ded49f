use fk_quadrature::integrate;
use fk_quadrature::univariate::{gauss, gauss_jacobi};

use matrixcompare::assert_scalar_eq;

#[test]
fn gauss_rules_satisfy_expected_accuracy() {
    for n in 1..=30 {
        let expected_polynomial_degree = 2 * n - 1;
        let rule = gauss(n).unwrap();

        // Also test that weights are positive
        assert!(rule.0.iter().all(|&w| w > 0.0));

        for alpha in 0..=expected_polynomial_degree as i32 {
            let monomial = |x: f64| x.powi(alpha);
            let monomial_integral = (1.0 - (-1.0f64).powi(alpha + 1)) / (alpha as f64 + 1.0);
            let estimated_integral = integrate(&rule, |x| monomial(x[0]));

            assert_scalar_eq!(estimated_integral, monomial_integral, comp = abs, tol = 1e-13);
        }
    }
}

#[test]
fn gauss_jacobi_rules_integrate_weighted_monomials() {
    // With the substitution t = (1 + x) / 2 we have
    //  int_{-1}^1 (1 - x)^a t^k dx = 2^{a + 1} int_0^1 (1 - t)^a t^k dt = 2^{a + 1} a! k! / (a + k + 1)!
    let factorial = |k: u32| (1..=k).map(f64::from).product::<f64>();
    for a in 0..=2u32 {
        for n in 1..=10 {
            let rule = gauss_jacobi(n, a, 0).unwrap();
            assert_eq!(rule.0.len(), n);
            assert!(rule.0.iter().all(|&w| w > 0.0));
            assert!(rule.1.windows(2).all(|pair| pair[0][0] < pair[1][0]));

            for k in 0..(2 * n as u32) {
                let expected = 2.0f64.powi(a as i32 + 1) * factorial(a) * factorial(k) / factorial(a + k + 1);
                let estimated = integrate(&rule, |x| (0.5 * (1.0 + x[0])).powi(k as i32));
                assert_scalar_eq!(estimated, expected, comp = abs, tol = 1e-13);
            }
        }
    }
}

#[test]
fn zero_points_is_an_error() {
    assert!(gauss(0).is_err());
    assert!(gauss_jacobi(0, 2, 0).is_err());
}
