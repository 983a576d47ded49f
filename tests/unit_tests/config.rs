use fisher_kolmogorov::config::Parameters;
use fisher_kolmogorov::Error;
use std::path::PathBuf;

fn assert_config_invalid(result: Result<Parameters, Error>) {
    match result {
        Err(Error::ConfigInvalid(_)) => {}
        other => panic!("expected ConfigInvalid, got {:?}", other),
    }
}

#[test]
fn default_parameter_file_matches_defaults() -> eyre::Result<()> {
    let parameters = Parameters::from_file("assets/parameters/default.prm")?;
    assert_eq!(parameters, Parameters::default());
    Ok(())
}

#[test]
fn empty_file_gives_defaults() -> eyre::Result<()> {
    assert_eq!(Parameters::from_prm_str("")?, Parameters::default());
    assert_eq!(Parameters::from_prm_str("# only a comment\n\n")?, Parameters::default());
    assert_eq!(Parameters::from_json_str("{}")?, Parameters::default());
    Ok(())
}

#[test]
fn prm_values_are_read() -> eyre::Result<()> {
    let text = r#"
subsection Mesh & geometry parameters
  set Mesh file = meshes/brain-h3.0.msh
  set Degree    = 2
end
subsection Physical constants
  set Dext  = 1.5
  set Daxn  = 3
  set Alpha = 0.25     # alias of Alpha coefficient
  set Axon center = 0.1, 0.2, 0.3
end
subsection Time stepping parameters
  set T      = 2.0
  set deltat = 0.25
  set Theta  = 0.5
end
subsection Solver parameters
  set Max Newton iterations   = 20
  set Newton tolerance        = 1e-8
  set Max CG iterations       = 500
  set CG tolerance factor     = 1e-4
  set Abort on Newton failure = true
end
subsection Output
  set Directory = results
  set Enabled   = false
end
"#;
    let parameters = Parameters::from_prm_str(text)?;
    assert_eq!(parameters.mesh.mesh_file, Some(PathBuf::from("meshes/brain-h3.0.msh")));
    assert_eq!(parameters.mesh.degree, 2);
    assert_eq!(parameters.physics.d_ext, 1.5);
    assert_eq!(parameters.physics.d_axn, 3.0);
    assert_eq!(parameters.physics.alpha, 0.25);
    assert_eq!(parameters.physics.axon_center, [0.1, 0.2, 0.3]);
    assert_eq!(parameters.time.final_time, 2.0);
    assert_eq!(parameters.time.deltat, 0.25);
    assert_eq!(parameters.time.theta, 0.5);
    assert_eq!(parameters.solver.max_newton_iterations, 20);
    assert_eq!(parameters.solver.newton_tolerance, 1e-8);
    assert_eq!(parameters.solver.max_cg_iterations, 500);
    assert_eq!(parameters.solver.cg_tolerance_factor, 1e-4);
    assert!(parameters.solver.abort_on_newton_failure);
    assert_eq!(parameters.output.directory, PathBuf::from("results"));
    assert!(!parameters.output.enabled);
    // Untouched sections keep their defaults
    assert_eq!(parameters.initial_condition, Parameters::default().initial_condition);
    Ok(())
}

#[test]
fn json_file_is_read() -> eyre::Result<()> {
    let parameters = Parameters::from_file("assets/parameters/unit_box.json")?;
    assert_eq!(parameters.mesh.degree, 2);
    assert_eq!(parameters.physics.alpha, 1.5);
    assert_eq!(parameters.physics.axon_center, [0.5, 0.5, 0.5]);
    assert_eq!(parameters.time.theta, 0.5);
    assert_eq!(parameters.initial_condition.seed_radius, 0.25);
    assert!(parameters.solver.abort_on_newton_failure);
    assert!(!parameters.output.enabled);
    Ok(())
}

#[test]
fn unknown_entries_are_rejected() {
    assert_config_invalid(Parameters::from_prm_str(
        "subsection Physical constants\n  set Gamma = 1.0\nend\n",
    ));
    assert_config_invalid(Parameters::from_prm_str("subsection Physics\n  set Dext = 1.0\nend\n"));
    assert_config_invalid(Parameters::from_prm_str("set Dext = 1.0\n"));
    assert_config_invalid(Parameters::from_json_str(r#"{ "Output": { "Format": "vtu" } }"#));
}

#[test]
fn malformed_files_are_rejected() {
    assert_config_invalid(Parameters::from_prm_str("subsection Physical constants\n  set Dext = 1.0\n"));
    assert_config_invalid(Parameters::from_prm_str("end\n"));
    assert_config_invalid(Parameters::from_prm_str(
        "subsection Physical constants\n  set Dext 1.0\nend\n",
    ));
    assert_config_invalid(Parameters::from_prm_str(
        "subsection Physical constants\n  Dext = 1.0\nend\n",
    ));
    assert_config_invalid(Parameters::from_prm_str(
        "subsection Physical constants\n  set Dext = fast\nend\n",
    ));
    assert_config_invalid(Parameters::from_json_str("{ not json"));
}

#[test]
fn out_of_range_values_are_rejected() {
    let cases = [
        "subsection Mesh & geometry parameters\n set Degree = 0\nend",
        "subsection Physical constants\n set Dext = -1\nend",
        "subsection Physical constants\n set Alpha coefficient = -0.1\nend",
        "subsection Time stepping parameters\n set deltat = 0\nend",
        "subsection Time stepping parameters\n set Theta = 1.5\nend",
        "subsection Time stepping parameters\n set T = -1\nend",
        "subsection Solver parameters\n set Max Newton iterations = 0\nend",
        "subsection Solver parameters\n set Max CG iterations = 0\nend",
        "subsection Solver parameters\n set Newton tolerance = -1e-6\nend",
        "subsection Initial condition\n set Seed value = 2\nend",
    ];
    for case in cases {
        assert_config_invalid(Parameters::from_prm_str(case));
    }
}

#[test]
fn missing_file_is_a_config_error() {
    assert_config_invalid(Parameters::from_file("assets/parameters/does_not_exist.prm"));
}
