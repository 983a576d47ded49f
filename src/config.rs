//! Run parameters and their parameter-file formats.
//!
//! Parameters are grouped into sections. Two file formats are accepted:
//!
//! - the block format of `.prm` files, with `subsection <name>`, `set <key> = <value>` and
//!   `end` lines and `#` comments:
//!
//!   ```text
//!   subsection Physical constants
//!     set Dext  = 1.0
//!     set Alpha coefficient = 0.1   # reaction rate
//!   end
//!   ```
//!
//! - JSON (files ending in `.json`) with the same section and key names.
//!
//! Missing entries take their default values. Unknown sections or keys are errors, and all
//! values are range-checked by [`Parameters::validate`].
use crate::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeshParameters {
    /// Path of the Gmsh mesh file. Can also be supplied on the command line.
    #[serde(rename = "Mesh file")]
    pub mesh_file: Option<PathBuf>,
    /// Polynomial degree `r` of the finite element space.
    #[serde(rename = "Degree")]
    pub degree: usize,
}

impl Default for MeshParameters {
    fn default() -> Self {
        Self {
            mesh_file: None,
            degree: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhysicalConstants {
    /// Isotropic extracellular diffusion.
    #[serde(rename = "Dext")]
    pub d_ext: f64,
    /// Diffusion along axons.
    #[serde(rename = "Daxn")]
    pub d_axn: f64,
    /// Reaction rate.
    #[serde(rename = "Alpha coefficient", alias = "Alpha")]
    pub alpha: f64,
    /// Center from which axons radiate.
    #[serde(rename = "Axon center")]
    pub axon_center: [f64; 3],
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            d_ext: 1.0,
            d_axn: 10.0,
            alpha: 0.1,
            axon_center: [0.0; 3],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeSteppingParameters {
    /// Final time.
    #[serde(rename = "T")]
    pub final_time: f64,
    #[serde(rename = "deltat")]
    pub deltat: f64,
    /// Weight of the new time level in the theta-method; 1 is implicit Euler.
    #[serde(rename = "Theta")]
    pub theta: f64,
}

impl Default for TimeSteppingParameters {
    fn default() -> Self {
        Self {
            final_time: 1.0,
            deltat: 0.1,
            theta: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverParameters {
    #[serde(rename = "Max Newton iterations")]
    pub max_newton_iterations: usize,
    #[serde(rename = "Newton tolerance")]
    pub newton_tolerance: f64,
    #[serde(rename = "Max CG iterations")]
    pub max_cg_iterations: usize,
    /// CG stops once the residual is below this factor times the Newton residual norm.
    #[serde(rename = "CG tolerance factor")]
    pub cg_tolerance_factor: f64,
    /// Whether a time step whose Newton iteration does not converge ends the run.
    #[serde(rename = "Abort on Newton failure")]
    pub abort_on_newton_failure: bool,
}

impl Default for SolverParameters {
    fn default() -> Self {
        Self {
            max_newton_iterations: 1000,
            newton_tolerance: 1e-6,
            max_cg_iterations: 1000,
            cg_tolerance_factor: 1e-6,
            abort_on_newton_failure: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InitialConditionParameters {
    #[serde(rename = "Seed center")]
    pub seed_center: [f64; 3],
    #[serde(rename = "Seed radius")]
    pub seed_radius: f64,
    #[serde(rename = "Seed value")]
    pub seed_value: f64,
}

impl Default for InitialConditionParameters {
    fn default() -> Self {
        Self {
            seed_center: [0.0; 3],
            seed_radius: 1.0,
            seed_value: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputParameters {
    #[serde(rename = "Directory")]
    pub directory: PathBuf,
    #[serde(rename = "Enabled")]
    pub enabled: bool,
}

impl Default for OutputParameters {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./"),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Parameters {
    #[serde(rename = "Mesh & geometry parameters")]
    pub mesh: MeshParameters,
    #[serde(rename = "Physical constants")]
    pub physics: PhysicalConstants,
    #[serde(rename = "Time stepping parameters")]
    pub time: TimeSteppingParameters,
    #[serde(rename = "Solver parameters")]
    pub solver: SolverParameters,
    #[serde(rename = "Initial condition")]
    pub initial_condition: InitialConditionParameters,
    #[serde(rename = "Output")]
    pub output: OutputParameters,
}

/// Keys whose values are kept as text even if they look like numbers.
const TEXT_KEYS: [&str; 2] = ["Mesh file", "Directory"];

impl Parameters {
    /// Reads and validates parameters from a `.prm` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| Error::ConfigInvalid(format!("failed to read {}: {}", path.display(), err)))?;
        let is_json = path
            .extension()
            .map_or(false, |extension| extension.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_prm_str(&text)
        }
    }

    /// Parses and validates parameters in the `.prm` block format.
    pub fn from_prm_str(text: &str) -> Result<Self, Error> {
        let tree = parse_prm(text)?;
        let parameters: Self = serde_json::from_value(Value::Object(tree))
            .map_err(|err| Error::ConfigInvalid(err.to_string()))?;
        parameters.validate()?;
        Ok(parameters)
    }

    /// Parses and validates parameters in JSON format.
    pub fn from_json_str(text: &str) -> Result<Self, Error> {
        let parameters: Self = serde_json::from_str(text).map_err(|err| Error::ConfigInvalid(err.to_string()))?;
        parameters.validate()?;
        Ok(parameters)
    }

    /// Checks every value against its admissible range.
    pub fn validate(&self) -> Result<(), Error> {
        let mesh = &self.mesh;
        let physics = &self.physics;
        let time = &self.time;
        let solver = &self.solver;
        let initial = &self.initial_condition;

        check(mesh.degree >= 1, "Degree must be at least 1")?;
        check_non_negative("Dext", physics.d_ext)?;
        check_non_negative("Daxn", physics.d_axn)?;
        check_non_negative("Alpha coefficient", physics.alpha)?;
        check(
            physics.axon_center.iter().all(|c| c.is_finite()),
            "Axon center must be finite",
        )?;
        check_non_negative("T", time.final_time)?;
        check(
            time.deltat.is_finite() && time.deltat > 0.0,
            "deltat must be positive",
        )?;
        check(
            (0.0..=1.0).contains(&time.theta),
            "Theta must lie in [0, 1]",
        )?;
        check(
            solver.max_newton_iterations >= 1,
            "Max Newton iterations must be at least 1",
        )?;
        check_non_negative("Newton tolerance", solver.newton_tolerance)?;
        check(solver.max_cg_iterations >= 1, "Max CG iterations must be at least 1")?;
        check_non_negative("CG tolerance factor", solver.cg_tolerance_factor)?;
        check(
            initial.seed_center.iter().all(|c| c.is_finite()),
            "Seed center must be finite",
        )?;
        check_non_negative("Seed radius", initial.seed_radius)?;
        check(
            (0.0..=1.0).contains(&initial.seed_value),
            "Seed value must lie in [0, 1]",
        )?;
        Ok(())
    }
}

fn check(condition: bool, message: &str) -> Result<(), Error> {
    if condition {
        Ok(())
    } else {
        Err(Error::ConfigInvalid(message.to_string()))
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<(), Error> {
    check(
        value.is_finite() && value >= 0.0,
        &format!("{} must be a non-negative number, got {}", name, value),
    )
}

/// Parses the block format into a tree of sections.
fn parse_prm(text: &str) -> Result<Map<String, Value>, Error> {
    let mut root = Map::new();
    let mut path: Vec<String> = Vec::new();

    for (line_index, raw_line) in text.lines().enumerate() {
        let line_number = line_index + 1;
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let invalid = |message: &str| Error::ConfigInvalid(format!("line {}: {}", line_number, message));

        if let Some(name) = keyword_argument(line, "subsection") {
            if name.is_empty() {
                return Err(invalid("subsection without a name"));
            }
            path.push(name.to_string());
        } else if line == "end" {
            if path.pop().is_none() {
                return Err(invalid("'end' without a matching subsection"));
            }
        } else if let Some(assignment) = keyword_argument(line, "set") {
            let (key, value) = assignment
                .split_once('=')
                .ok_or_else(|| invalid("expected 'set <key> = <value>'"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(invalid("empty key"));
            }
            let section = section_mut(&mut root, &path).ok_or_else(|| invalid("key conflicts with a subsection"))?;
            section.insert(key.to_string(), prm_value(key, value.trim()));
        } else {
            return Err(invalid(&format!("unrecognized statement '{}'", line)));
        }
    }

    if let Some(open) = path.last() {
        return Err(Error::ConfigInvalid(format!("subsection '{}' is not closed", open)));
    }
    Ok(root)
}

/// Returns the rest of `line` if it starts with the keyword followed by whitespace.
fn keyword_argument<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    rest.starts_with(char::is_whitespace).then(|| rest.trim())
}

fn section_mut<'a>(root: &'a mut Map<String, Value>, path: &[String]) -> Option<&'a mut Map<String, Value>> {
    let mut section = root;
    for name in path {
        section = section
            .entry(name.clone())
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()?;
    }
    Some(section)
}

/// Interprets a textual value: booleans, integers, reals, comma-separated lists of reals, and
/// text otherwise.
fn prm_value(key: &str, value: &str) -> Value {
    if TEXT_KEYS.contains(&key) {
        return Value::String(value.to_string());
    }
    match value {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(integer) = value.parse::<u64>() {
        return Value::from(integer);
    }
    if let Ok(real) = value.parse::<f64>() {
        return Value::from(real);
    }
    if value.contains(',') {
        let components: Option<Vec<Value>> = value
            .split(',')
            .map(|component| component.trim().parse::<f64>().ok().map(Value::from))
            .collect();
        if let Some(components) = components {
            return Value::Array(components);
        }
    }
    Value::String(value.to_string())
}
