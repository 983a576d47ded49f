use super::Chain;
use fk_parallel::{Communicator, Universe};
use fk_sparse::cg::{
    AbsoluteResidualCriterion, ConjugateGradient, LinearOperator, OperatorError, RelativeResidualCriterion,
    SolveErrorKind,
};
use fk_sparse::SsorPreconditioner;
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};

/// Solves the chain system for a known solution on `size` ranks.
fn solve_chain(size: usize, n_cells: usize, use_ssor: bool) -> Vec<(DVector<f64>, DVector<f64>, usize)> {
    let x_exact = DVector::from_fn(n_cells + 1, |i, _| 1.0 + (i as f64 * 0.3).cos());
    let b = Chain::dense(n_cells) * &x_exact;

    Universe::run(size, |comm| {
        let chain = Chain::new(&comm, n_cells);
        let matrix = chain.assemble();
        let b_owned = chain.restrict(&b);
        let mut x = DVector::zeros(b_owned.len());

        let cg = ConjugateGradient::new(&comm)
            .with_operator(&matrix)
            .with_stopping_criterion(AbsoluteResidualCriterion::new(1e-12))
            .with_max_iter(1000);
        let result = if use_ssor {
            let ssor = SsorPreconditioner::new(&matrix, 1.0).unwrap();
            cg.with_preconditioner(ssor).solve_with_guess(&b_owned, &mut x)
        } else {
            let mut cg = cg;
            cg.solve_with_guess(&b_owned, &mut x)
        };
        let output = result.unwrap();

        (x, chain.restrict(&x_exact), output.num_iterations)
    })
}

#[test]
fn cg_solves_distributed_spd_system() {
    for size in 1..=3 {
        for (x, x_exact, _) in solve_chain(size, 20, false) {
            assert_matrix_eq!(x, x_exact, comp = abs, tol = 1e-10);
        }
    }
}

#[test]
fn ssor_preconditioned_cg_solves_distributed_spd_system() {
    for size in 1..=3 {
        for (x, x_exact, _) in solve_chain(size, 20, true) {
            assert_matrix_eq!(x, x_exact, comp = abs, tol = 1e-10);
        }
    }
}

#[test]
fn iteration_count_is_reported_on_all_ranks() {
    let results = solve_chain(3, 30, true);
    let iterations = results[0].2;
    assert!(iterations > 0);
    assert!(results.iter().all(|(_, _, n)| *n == iterations));
}

#[test]
fn zero_right_hand_side_gives_zero_solution() {
    let comm = Communicator::serial();
    let a = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]);
    let operator = DenseOperator(a);
    let mut x = DVector::from_element(2, 5.0);
    let output = ConjugateGradient::new(&comm)
        .with_operator(&operator)
        .with_stopping_criterion(RelativeResidualCriterion::default())
        .solve_with_guess(&DVector::zeros(2), &mut x)
        .unwrap();
    assert_eq!(output.num_iterations, 0);
    assert_eq!(x, DVector::zeros(2));
}

#[test]
fn exhausting_iterations_is_an_error() {
    let comm = Communicator::serial();
    let n = 50;
    let a = DMatrix::from_fn(n, n, |i, j| if i == j { 1.0 + i as f64 } else { 0.0 });
    let operator = DenseOperator(a);
    let b = DVector::from_element(n, 1.0);
    let mut x = DVector::zeros(n);
    let error = ConjugateGradient::new(&comm)
        .with_operator(&operator)
        .with_stopping_criterion(AbsoluteResidualCriterion::new(1e-14))
        .with_max_iter(3)
        .solve_with_guess(&b, &mut x)
        .unwrap_err();
    assert!(matches!(error.kind, SolveErrorKind::MaxIterationsReached { max_iter: 3 }));
    assert_eq!(error.output.num_iterations, 3);
}

#[test]
fn indefinite_operator_is_detected() {
    let comm = Communicator::serial();
    let operator = DenseOperator(DMatrix::from_row_slice(2, 2, &[-1.0, 0.0, 0.0, -2.0]));
    let mut x = DVector::zeros(2);
    let error = ConjugateGradient::new(&comm)
        .with_operator(&operator)
        .with_stopping_criterion(AbsoluteResidualCriterion::new(1e-12))
        .solve_with_guess(&DVector::from_element(2, 1.0), &mut x)
        .unwrap_err();
    assert!(matches!(error.kind, SolveErrorKind::IndefiniteOperator));
}

struct DenseOperator(DMatrix<f64>);

impl LinearOperator for DenseOperator {
    fn apply(&self, y: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), OperatorError> {
        y.gemv(1.0, &self.0, x, 0.0);
        Ok(())
    }
}
