use eyre::{eyre, WrapErr};
use fisher_kolmogorov::coefficients::Coefficients;
use fisher_kolmogorov::config::Parameters;
use fisher_kolmogorov::io::msh::load_msh_from_file;
use fisher_kolmogorov::mesh::procedural::create_unit_box_uniform_tet_mesh;
use fisher_kolmogorov::problem::FisherKolmogorov;
use fk_parallel::Universe;
use log::info;
use std::path::PathBuf;
use structopt::StructOpt;

/// Command line options
#[derive(StructOpt, Debug)]
#[structopt(
    name = "fisher-kolmogorov",
    about = "Solves the Fisher-Kolmogorov equation on a tetrahedral mesh"
)]
struct Options {
    /// Parameter file in .prm or .json format. Defaults are used if omitted.
    #[structopt(parse(from_os_str))]
    parameter_file: Option<PathBuf>,

    /// Gmsh mesh file, overrides the mesh file of the parameters.
    #[structopt(long, parse(from_os_str), conflicts_with = "unit-box")]
    mesh: Option<PathBuf>,

    /// Use a uniform mesh of the unit cube with this many cubes per dimension instead of a mesh file.
    #[structopt(long)]
    unit_box: Option<usize>,

    /// Number of ranks to run on.
    #[structopt(long, default_value = "1")]
    ranks: usize,

    /// Output directory, overrides the output directory of the parameters.
    #[structopt(long, parse(from_os_str))]
    output: Option<PathBuf>,
}

fn main() -> eyre::Result<()> {
    env_logger::builder()
        .format_timestamp(None)
        .format_target(false)
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let options = Options::from_args();
    if options.ranks == 0 {
        return Err(eyre!("the number of ranks must be positive"));
    }

    let mut parameters = match &options.parameter_file {
        Some(path) => Parameters::from_file(path)
            .wrap_err_with(|| format!("failed to load parameters from {}", path.display()))?,
        None => Parameters::default(),
    };
    if let Some(mesh) = &options.mesh {
        parameters.mesh.mesh_file = Some(mesh.clone());
    }
    if let Some(output) = &options.output {
        parameters.output.directory = output.clone();
    }

    let mesh = match (options.unit_box, &parameters.mesh.mesh_file) {
        (Some(cells_per_dim), _) => create_unit_box_uniform_tet_mesh(cells_per_dim),
        (None, Some(path)) => load_msh_from_file(path).wrap_err("failed to load mesh")?,
        (None, None) => return Err(eyre!("no mesh given, use --mesh, --unit-box or the Mesh file parameter")),
    };

    info!("Running on {} rank(s)", options.ranks);
    let results = Universe::run(options.ranks, |comm| {
        let coefficients = Coefficients::from_parameters(&parameters);
        let mut problem = FisherKolmogorov::setup(&comm, parameters.clone(), coefficients, mesh.clone())?;
        problem.solve()
    });

    // Every rank fails in the same collective, so the root's result is representative
    let summary = results
        .into_iter()
        .next()
        .ok_or_else(|| eyre!("no ranks were run"))?
        .wrap_err("simulation failed")?;

    info!(
        "Finished {} time steps at t = {:.6}",
        summary.steps.len(),
        summary.final_time()
    );
    if !summary.all_converged() {
        info!("Newton's method did not converge in every time step");
    }
    Ok(())
}
