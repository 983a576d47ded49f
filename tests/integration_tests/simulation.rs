use fisher_kolmogorov::coefficients::{Coefficients, Constant, IsotropicDiffusion, SeedInitialCondition};
use fisher_kolmogorov::config::Parameters;
use fisher_kolmogorov::estimate::NormType;
use fisher_kolmogorov::mesh::procedural::create_unit_box_uniform_tet_mesh;
use fisher_kolmogorov::problem::FisherKolmogorov;
use fisher_kolmogorov::Error;
use fk_parallel::{Communicator, Universe};
use matrixcompare::assert_scalar_eq;
use nalgebra::Point3;
use std::path::PathBuf;

/// Parameters for small runs without output files.
fn test_parameters() -> Parameters {
    let mut parameters = Parameters::default();
    parameters.output.enabled = false;
    parameters.time.final_time = 0.2;
    parameters.time.deltat = 0.1;
    parameters.solver.newton_tolerance = 1e-12;
    parameters.solver.cg_tolerance_factor = 1e-12;
    parameters
}

fn seed_in_box() -> SeedInitialCondition {
    SeedInitialCondition {
        center: Point3::new(0.5, 0.5, 0.5),
        radius: 0.3,
        value: 0.6,
    }
}

fn setup(comm: &Communicator, parameters: Parameters, coefficients: Coefficients, cells_per_dim: usize) -> FisherKolmogorov {
    FisherKolmogorov::setup(comm, parameters, coefficients, create_unit_box_uniform_tet_mesh(cells_per_dim)).unwrap()
}

/// L2 norm of the discrete solution.
fn solution_l2_norm(problem: &FisherKolmogorov) -> f64 {
    problem.compute_error(NormType::L2, &Constant(0.0))
}

#[test]
fn equilibria_are_stationary() {
    let comm = Communicator::serial();
    for equilibrium in [0.0, 1.0] {
        let mut parameters = test_parameters();
        parameters.physics.alpha = 3.0;
        let coefficients = Coefficients::new(IsotropicDiffusion(1.0), Constant(0.0), Constant(equilibrium));
        let mut problem = setup(&comm, parameters, coefficients, 2);

        let summary = problem.solve().unwrap();
        assert_eq!(summary.steps.len(), 2);
        assert!(summary.all_converged());
        assert!(summary.steps.iter().all(|step| step.newton.updates == 0));
        assert!(problem.compute_error(NormType::Linfty, &Constant(equilibrium)) < 1e-12);
    }
}

#[test]
fn pure_diffusion_does_not_increase_the_l2_norm() {
    let comm = Communicator::serial();
    let mut parameters = test_parameters();
    parameters.physics.alpha = 0.0;
    let coefficients = Coefficients::new(IsotropicDiffusion(1.0), Constant(0.0), seed_in_box());
    let mut problem = setup(&comm, parameters, coefficients, 3);

    problem.apply_initial_condition();
    let mut previous = solution_l2_norm(&problem);
    assert!(previous > 0.0);
    for _ in 0..4 {
        problem.advance_time();
        let outcome = problem.solve_newton().unwrap();
        assert!(outcome.converged);
        let norm = solution_l2_norm(&problem);
        assert!(norm <= previous + 1e-12, "L2 norm increased from {} to {}", previous, norm);
        previous = norm;
    }
}

#[test]
fn newton_converges_quadratically() {
    let comm = Communicator::serial();
    let mut parameters = test_parameters();
    parameters.physics.alpha = 5.0;
    parameters.time.deltat = 0.02;
    let coefficients = Coefficients::new(IsotropicDiffusion(0.1), Constant(0.0), seed_in_box());
    let mut problem = setup(&comm, parameters, coefficients, 2);

    problem.apply_initial_condition();
    problem.advance_time();
    let outcome = problem.solve_newton().unwrap();
    assert!(outcome.converged);
    assert!(outcome.updates >= 1 && outcome.updates <= 6);
    assert_eq!(outcome.residual_history.len(), outcome.updates + 1);

    // rho_{n+1} <= C rho_n^2, with C scaled by the initial residual so that the bound does not
    // depend on the magnitude of the residual. Only steps above round-off are checked.
    let history = &outcome.residual_history;
    let c = 10.0 / history[0];
    for pair in history.windows(2) {
        if pair[0] > 1e-10 && pair[1] > 1e-13 {
            assert!(pair[1] < 0.1 * pair[0], "slow Newton convergence: {:?}", history);
            assert!(
                pair[1] <= c * pair[0].powi(2),
                "Newton convergence is not quadratic: {:?}",
                history
            );
        }
    }
}

#[test]
fn time_loop_takes_the_expected_number_of_steps() {
    let comm = Communicator::serial();
    for (final_time, deltat, expected_steps) in [(0.3, 0.1, 3), (0.5, 0.5, 1), (0.0, 0.1, 0)] {
        let mut parameters = test_parameters();
        parameters.time.final_time = final_time;
        parameters.time.deltat = deltat;
        let coefficients = Coefficients::from_parameters(&parameters);
        let mut problem = setup(&comm, parameters, coefficients, 1);

        let summary = problem.solve().unwrap();
        assert_eq!(summary.steps.len(), expected_steps);
        let step_indices: Vec<usize> = summary.steps.iter().map(|step| step.time_step).collect();
        assert_eq!(step_indices, (1..=expected_steps).collect::<Vec<_>>());
        assert_scalar_eq!(summary.final_time(), final_time, comp = abs, tol = 1e-12);
        assert_eq!(problem.time_step(), expected_steps);
    }
}

/// Runs the default brain model on the unit box and returns the final L2 norm.
fn brain_model_l2_norm(comm: &Communicator) -> f64 {
    let mut parameters = test_parameters();
    parameters.time.theta = 0.5;
    parameters.physics.alpha = 1.0;
    parameters.physics.axon_center = [0.5, 0.5, 0.5];
    parameters.initial_condition.seed_center = [0.25, 0.5, 0.5];
    parameters.initial_condition.seed_radius = 0.4;
    parameters.solver.newton_tolerance = 1e-13;
    let coefficients = Coefficients::from_parameters(&parameters);
    let mut problem = setup(comm, parameters, coefficients, 2);
    let summary = problem.solve().unwrap();
    assert!(summary.all_converged());
    solution_l2_norm(&problem)
}

#[test]
fn results_are_independent_of_the_number_of_ranks() {
    let serial = brain_model_l2_norm(&Communicator::serial());
    assert!(serial > 0.0);
    for norm in Universe::run(4, |comm| brain_model_l2_norm(&comm)) {
        assert_scalar_eq!(norm, serial, comp = abs, tol = 1e-10);
    }
}

fn single_newton_iteration_parameters(abort: bool) -> Parameters {
    let mut parameters = test_parameters();
    parameters.physics.alpha = 5.0;
    parameters.solver.max_newton_iterations = 1;
    parameters.solver.newton_tolerance = 1e-14;
    parameters.solver.abort_on_newton_failure = abort;
    parameters
}

#[test]
fn newton_failure_is_reported_and_tolerated() {
    let comm = Communicator::serial();
    let parameters = single_newton_iteration_parameters(false);
    let coefficients = Coefficients::new(IsotropicDiffusion(0.1), Constant(0.0), seed_in_box());
    let mut problem = setup(&comm, parameters, coefficients, 2);

    let summary = problem.solve().unwrap();
    assert_eq!(summary.steps.len(), 2);
    assert!(!summary.all_converged());
    assert!(summary.steps.iter().all(|step| step.newton.updates == 1));
}

#[test]
fn newton_failure_aborts_when_requested() {
    let comm = Communicator::serial();
    let parameters = single_newton_iteration_parameters(true);
    let coefficients = Coefficients::new(IsotropicDiffusion(0.1), Constant(0.0), seed_in_box());
    let mut problem = setup(&comm, parameters, coefficients, 2);

    match problem.solve() {
        Err(Error::NewtonNonConvergence {
            time_step, iterations, ..
        }) => {
            assert_eq!(time_step, 1);
            assert_eq!(iterations, 1);
        }
        other => panic!("expected NewtonNonConvergence, got {:?}", other),
    }
}

#[test]
fn zero_diagonal_is_detected_on_all_ranks() {
    // With alpha = 1 / deltat and no diffusion the Jacobian at u = 0 vanishes, while the
    // forcing keeps the residual away from zero
    let results = Universe::run(2, |comm| {
        let mut parameters = test_parameters();
        parameters.physics.alpha = 2.0;
        parameters.time.deltat = 0.5;
        parameters.time.final_time = 0.5;
        let coefficients = Coefficients::new(IsotropicDiffusion(0.0), Constant(1.0), Constant(0.0));
        let mut problem = setup(&comm, parameters, coefficients, 1);
        problem.solve().map(|_| ())
    });
    for result in results {
        match result {
            Err(Error::ZeroDiagonal { .. }) => {}
            other => panic!("expected ZeroDiagonal, got {:?}", other),
        }
    }
}

#[test]
fn brain_model_runs_on_msh_mesh() {
    let comm = Communicator::serial();
    let mut parameters = test_parameters();
    parameters.mesh.mesh_file = Some(PathBuf::from("assets/meshes/cube_6.msh"));
    parameters.mesh.degree = 2;
    parameters.initial_condition.seed_center = [0.5, 0.5, 0.5];
    parameters.initial_condition.seed_radius = 0.5;

    let mut problem = FisherKolmogorov::from_parameters(&comm, parameters).unwrap();
    assert_eq!(problem.discretization().mesh.n_global_cells(), 6);
    assert_eq!(problem.discretization().dofs.n_dofs(), 27);

    let summary = problem.solve().unwrap();
    assert_eq!(summary.steps.len(), 2);
    assert!(summary.all_converged());
}

#[test]
fn missing_mesh_file_is_reported() {
    let comm = Communicator::serial();
    let parameters = test_parameters();
    assert!(matches!(
        FisherKolmogorov::from_parameters(&comm, parameters),
        Err(Error::ConfigInvalid(_))
    ));

    let mut parameters = test_parameters();
    parameters.mesh.mesh_file = Some(PathBuf::from("assets/meshes/does_not_exist.msh"));
    assert!(matches!(
        FisherKolmogorov::from_parameters(&comm, parameters),
        Err(Error::MeshIo { .. })
    ));
}

#[test]
fn output_files_are_written_for_every_step() {
    let directory = PathBuf::from("data/integration_tests/output_files_are_written_for_every_step");
    if directory.exists() {
        std::fs::remove_dir_all(&directory).unwrap();
    }

    Universe::run(2, |comm| {
        let mut parameters = test_parameters();
        parameters.output.enabled = true;
        parameters.output.directory = directory.clone();
        let coefficients = Coefficients::from_parameters(&parameters);
        let mut problem = setup(&comm, parameters, coefficients, 1);
        problem.solve().unwrap();
    });

    for step in 0..=2 {
        assert!(directory.join(format!("6_output_{:03}.pvtu", step)).is_file());
        for rank in 0..2 {
            assert!(directory
                .join(format!("6_output_{:03}.{}.vtu", step, rank))
                .is_file());
        }
    }
}
