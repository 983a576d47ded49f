use fk_quadrature::integrate;
use fk_quadrature::simplex::tetrahedron_gauss;

use matrixcompare::assert_scalar_eq;
use proptest::prelude::*;

fn factorial(k: u32) -> f64 {
    (1..=k).map(f64::from).product()
}

/// Exact integral of x^a y^b z^c over the unit tetrahedron.
fn monomial_integral(a: u32, b: u32, c: u32) -> f64 {
    factorial(a) * factorial(b) * factorial(c) / factorial(a + b + c + 3)
}

#[test]
fn tetrahedron_weights_sum_to_volume() {
    for n in 1..=6 {
        let rule = tetrahedron_gauss(n).unwrap();
        assert_eq!(rule.0.len(), n * n * n);
        let volume: f64 = rule.0.iter().sum();
        assert_scalar_eq!(volume, 1.0 / 6.0, comp = abs, tol = 1e-14);
    }
}

#[test]
fn tetrahedron_points_are_inside_reference_element() {
    for n in 1..=6 {
        let (weights, points) = tetrahedron_gauss(n).unwrap();
        assert!(weights.iter().all(|&w| w > 0.0));
        for [x, y, z] in points {
            assert!(x > 0.0 && y > 0.0 && z > 0.0);
            assert!(x + y + z < 1.0);
        }
    }
}

#[test]
fn tetrahedron_rules_are_exact_up_to_expected_degree() {
    for n in 1..=5u32 {
        let rule = tetrahedron_gauss(n as usize).unwrap();
        let degree = 2 * n - 1;
        for a in 0..=degree {
            for b in 0..=(degree - a) {
                for c in 0..=(degree - a - b) {
                    let estimated = integrate(&rule, |&[x, y, z]| x.powi(a as i32) * y.powi(b as i32) * z.powi(c as i32));
                    assert_scalar_eq!(estimated, monomial_integral(a, b, c), comp = abs, tol = 1e-14);
                }
            }
        }
    }
}

proptest! {
    #[test]
    fn tetrahedron_rule_integrates_affine_functions(n in 1..6usize, c0 in -5.0..5.0f64, c1 in -5.0..5.0f64, c2 in -5.0..5.0f64, c3 in -5.0..5.0f64) {
        let rule = tetrahedron_gauss(n).unwrap();
        let estimated = integrate(&rule, |&[x, y, z]| c0 + c1 * x + c2 * y + c3 * z);
        // Centroid of the unit tetrahedron is (1/4, 1/4, 1/4)
        let expected = (c0 + 0.25 * (c1 + c2 + c3)) / 6.0;
        prop_assert!((estimated - expected).abs() <= 1e-13);
    }
}
