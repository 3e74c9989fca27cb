//! TOML configuration overriding the built-in exploration parameters.
//!
//! Every section is optional; a missing section or field keeps the values of
//! the reference runs.

use filippov_core::filippov::FilippovSettings;
use filippov_core::integrator::IntegrationSettings;
use filippov_core::models::{
    Ambient, CubicPlanar, ExponentialGrowth, NewtonCooling, PredatorPreyParams, ScalarProblem,
    SiModel, SiTreatmentParams, SirModel,
};
use filippov_core::time_switched::TimeSwitchedSettings;
use filippov_core::vector_field::{GridSpacing, Window};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub predator_prey: PredatorPreyConfig,
    pub si_treatment: SiTreatmentConfig,
    pub linear_switch: LinearSwitchConfig,
    pub time_switched: TimeSwitchedConfig,
    pub linear: LinearConfig,
    pub cubic: CubicConfig,
    pub nonlinear: NonlinearConfig,
    pub polynomial_pair: PolynomialPairConfig,
    pub si: SiConfig,
    pub sir_fit: SirFitConfig,
    pub cooling: CoolingConfig,
    pub growth: GrowthConfig,
    pub scalar: ScalarConfig,
    pub eigen: EigenConfig,
    pub scenario: Option<ScenarioConfig>,
}

/// Reads `path` when given, otherwise returns the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&text).map_err(|err| match err {
        ConfigError::Parse { source, .. } => ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })?;
    log::debug!("loaded configuration from {}", path.display());
    Ok(config)
}

pub fn parse_config(text: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: PathBuf::from("<inline>"),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        let counts = [
            ("linear.samples", self.linear.samples),
            ("cubic.samples", self.cubic.samples),
            ("si.samples", self.si.samples),
            ("sir_fit.samples", self.sir_fit.samples),
            ("cooling.samples", self.cooling.samples),
            ("growth.samples", self.growth.samples),
            ("scalar.samples", self.scalar.samples),
        ];
        for (name, value) in counts {
            if value < 2 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be at least 2, got {value}"
                )));
            }
        }
        if let Some(scenario) = &self.scenario {
            scenario.validate()?;
        }
        Ok(())
    }
}

/// Initial points as `(x, y)` pairs.
pub fn starts(points: &[[f64; 2]]) -> impl Iterator<Item = (f64, f64)> + '_ {
    points.iter().map(|p| (p[0], p[1]))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredatorPreyConfig {
    pub params: PredatorPreyParams,
    pub threshold: f64,
    pub window: Window,
    pub grid: GridSpacing,
    pub starts: Vec<[f64; 2]>,
    pub simulator: FilippovSettings,
}

impl Default for PredatorPreyConfig {
    fn default() -> Self {
        Self {
            params: PredatorPreyParams::default(),
            threshold: 1.625,
            window: Window::new(0.0, 1.2, 0.0, 2.0),
            grid: GridSpacing::Count { nx: 20, ny: 20 },
            starts: vec![[1.1, 1.5]],
            simulator: FilippovSettings {
                eps: 1e-5,
                ..FilippovSettings::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiTreatmentConfig {
    pub params: SiTreatmentParams,
    pub threshold: f64,
    pub window: Window,
    pub grid: GridSpacing,
    pub starts: Vec<[f64; 2]>,
    pub simulator: FilippovSettings,
}

impl Default for SiTreatmentConfig {
    fn default() -> Self {
        Self {
            params: SiTreatmentParams::default(),
            threshold: 0.3,
            window: Window::new(0.0, 1.0, 0.0, 1.0),
            grid: GridSpacing::Count { nx: 20, ny: 20 },
            starts: vec![[0.55, 0.4], [0.3, 0.4], [0.9, 0.1]],
            simulator: FilippovSettings::default(),
        }
    }
}

/// Two linear fields glued on `y = threshold`, one crossing only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearSwitchConfig {
    pub lower: [[f64; 2]; 2],
    pub upper: [[f64; 2]; 2],
    pub threshold: f64,
    pub window: Window,
    pub grid: GridSpacing,
    pub starts: Vec<[f64; 2]>,
    pub t_max: f64,
    pub integration: IntegrationSettings,
}

impl Default for LinearSwitchConfig {
    fn default() -> Self {
        Self {
            lower: [[2.0, -1.0], [1.0, 4.0]],
            upper: [[1.0, 2.0], [-1.0, 1.0]],
            threshold: 3.0,
            window: Window::new(-15.0, 20.0, 0.0, 6.0),
            grid: GridSpacing::Step { h: 0.5 },
            starts: vec![[0.5, 0.5]],
            t_max: 10.5,
            integration: IntegrationSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSwitchedConfig {
    pub settings: TimeSwitchedSettings,
    pub window: Window,
    /// Drawn for reference only; switching is driven by time.
    pub reference: f64,
    pub grid: GridSpacing,
}

impl Default for TimeSwitchedConfig {
    fn default() -> Self {
        Self {
            settings: TimeSwitchedSettings::default(),
            window: Window::new(0.0, 5.0, 0.0, 6.0),
            reference: 3.0,
            grid: GridSpacing::Step { h: 0.5 },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearConfig {
    pub matrix: [[f64; 2]; 2],
    pub start: [f64; 2],
    pub t_end: f64,
    pub samples: usize,
    pub window: Window,
    pub grid: GridSpacing,
    pub integration: IntegrationSettings,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            matrix: [[-1.0, -2.0], [1.0, -1.0]],
            start: [10.0, -30.0],
            t_end: 8.0,
            samples: 2000,
            window: Window::new(-35.0, 35.0, -35.0, 35.0),
            grid: GridSpacing::Count { nx: 25, ny: 25 },
            integration: IntegrationSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CubicConfig {
    pub model: CubicPlanar,
    pub start: [f64; 2],
    pub t_end: f64,
    pub samples: usize,
    pub window: Window,
    pub grid: GridSpacing,
    pub integration: IntegrationSettings,
}

impl Default for CubicConfig {
    fn default() -> Self {
        Self {
            model: CubicPlanar::default(),
            start: [3.0, 0.5],
            t_end: 200.0,
            samples: 5000,
            window: Window::new(-3.5, 3.5, -3.5, 3.5),
            grid: GridSpacing::Count { nx: 25, ny: 25 },
            integration: IntegrationSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NonlinearConfig {
    pub window: Window,
    pub grid: GridSpacing,
    /// Initial guesses for the equilibrium search.
    pub guesses: Vec<[f64; 2]>,
    /// Samples per axis of the nullcline grid.
    pub nullcline_samples: usize,
}

impl Default for NonlinearConfig {
    fn default() -> Self {
        Self {
            window: Window::new(-10.0, 10.0, -10.0, 10.0),
            grid: GridSpacing::Step { h: 0.5 },
            guesses: vec![[-1.5, -2.5], [0.3, -0.2], [1.5, 2.5]],
            nullcline_samples: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolynomialPairConfig {
    pub threshold: f64,
    pub window: Window,
    pub grid: GridSpacing,
    pub starts: Vec<[f64; 2]>,
    pub simulator: FilippovSettings,
}

impl Default for PolynomialPairConfig {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            window: Window::new(-3.0, 3.0, 0.0, 3.0),
            grid: GridSpacing::Step { h: 0.5 },
            starts: vec![[-1.5, 0.0]],
            simulator: FilippovSettings {
                segment_time: 1.0,
                sliding_time: 1.0,
                ..FilippovSettings::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiConfig {
    pub model: SiModel,
    pub initial: [f64; 2],
    pub t_end: f64,
    pub samples: usize,
    pub integration: IntegrationSettings,
}

impl Default for SiConfig {
    fn default() -> Self {
        Self {
            model: SiModel::default(),
            initial: [0.7, 0.3],
            t_end: 150.0,
            samples: 1000,
            integration: IntegrationSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SirFitConfig {
    pub model: SirModel,
    pub initial: [f64; 3],
    pub samples: usize,
    /// CSV with columns `dia,Casos`.
    pub data: Option<PathBuf>,
    /// Where to write the per-day error table, if anywhere.
    pub errors: Option<PathBuf>,
    pub integration: IntegrationSettings,
}

impl Default for SirFitConfig {
    fn default() -> Self {
        Self {
            model: SirModel::default(),
            initial: [762.0, 1.0, 0.0],
            samples: 250,
            data: None,
            errors: None,
            integration: IntegrationSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoolingConfig {
    pub model: NewtonCooling,
    pub initial: f64,
    pub t_end: f64,
    pub samples: usize,
    pub integration: IntegrationSettings,
}

impl Default for CoolingConfig {
    fn default() -> Self {
        Self {
            model: NewtonCooling::default(),
            initial: 75.0,
            t_end: 20.0,
            samples: 200,
            integration: IntegrationSettings::default(),
        }
    }
}

impl CoolingConfig {
    /// Daily temperature cycle around 60 degrees.
    pub fn periodic() -> Self {
        Self {
            model: NewtonCooling {
                k: -0.2,
                ambient: Ambient::Periodic {
                    base: 60.0,
                    amplitude: 15.0,
                    omega: PI / 12.0,
                },
            },
            initial: 80.0,
            t_end: 72.0,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthConfig {
    pub model: ExponentialGrowth,
    pub initial: f64,
    pub t_end: f64,
    pub samples: usize,
    pub integration: IntegrationSettings,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            model: ExponentialGrowth::default(),
            initial: 1.0,
            t_end: 10.0,
            samples: 100,
            integration: IntegrationSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalarConfig {
    pub problem: ScalarProblem,
    pub initial: f64,
    pub t0: f64,
    pub t_end: f64,
    pub samples: usize,
    /// Known value of `x(t_end)`, reported next to the numeric one.
    pub exact: Option<f64>,
    /// Also run explicit Euler with this many steps.
    pub euler_steps: Option<usize>,
    pub integration: IntegrationSettings,
}

impl Default for ScalarConfig {
    fn default() -> Self {
        Self::forced_decay()
    }
}

impl ScalarConfig {
    pub fn forced_decay() -> Self {
        Self {
            problem: ScalarProblem::ForcedDecay,
            initial: 5.0,
            t0: 0.0,
            t_end: 2.0 * PI,
            samples: 250,
            exact: None,
            euler_steps: Some(2000),
            integration: IntegrationSettings::default(),
        }
    }

    pub fn relaxation() -> Self {
        Self {
            problem: ScalarProblem::Relaxation { target: 10.0 },
            initial: 1.0,
            t_end: 10.0 * PI,
            euler_steps: None,
            ..Self::forced_decay()
        }
    }

    /// `x' = -t/x`, `x(0) = 1`, whose solution `sqrt(1 - t²)` reaches 0 at `t = 1`.
    pub fn rational() -> Self {
        Self {
            problem: ScalarProblem::Rational,
            initial: 1.0,
            t_end: 1.0,
            samples: 4,
            exact: Some(0.0),
            euler_steps: None,
            ..Self::forced_decay()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EigenConfig {
    pub matrix: [[f64; 2]; 2],
    pub start: [f64; 2],
    pub t_end: f64,
    pub window: Window,
    pub grid: GridSpacing,
}

impl Default for EigenConfig {
    fn default() -> Self {
        Self {
            matrix: [[1.0, 5.0], [-1.0, -2.0]],
            start: [1.0, 0.0],
            t_end: 10.0,
            window: Window::new(-3.0, 3.0, -3.0, 3.0),
            grid: GridSpacing::Count { nx: 21, ny: 21 },
        }
    }
}

/// Switched system whose two fields are given as expressions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub title: String,
    pub variables: Vec<String>,
    pub parameters: BTreeMap<String, f64>,
    /// Field below the threshold, one expression per variable.
    pub lower: Vec<String>,
    /// Field above the threshold.
    pub upper: Vec<String>,
    pub threshold: f64,
    pub window: Window,
    pub grid: GridSpacing,
    pub starts: Vec<[f64; 2]>,
    /// `[T1, T2]`; located numerically when absent.
    pub tangent_points: Option<[f64; 2]>,
    pub simulator: FilippovSettings,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            title: "scenario".to_string(),
            variables: vec!["x".to_string(), "y".to_string()],
            parameters: BTreeMap::new(),
            lower: Vec::new(),
            upper: Vec::new(),
            threshold: 0.0,
            window: Window::new(-1.0, 1.0, -1.0, 1.0),
            grid: GridSpacing::Count { nx: 20, ny: 20 },
            starts: Vec::new(),
            tangent_points: None,
            simulator: FilippovSettings::default(),
        }
    }
}

impl ScenarioConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.variables.len() != 2 {
            return Err(ConfigError::Invalid(format!(
                "scenario needs exactly two variables, got {}",
                self.variables.len()
            )));
        }
        for (name, field) in [("lower", &self.lower), ("upper", &self.upper)] {
            if field.len() != 2 {
                return Err(ConfigError::Invalid(format!(
                    "scenario.{name} needs two expressions, got {}",
                    field.len()
                )));
            }
        }
        if self.starts.is_empty() {
            return Err(ConfigError::Invalid(
                "scenario needs at least one start point".to_string(),
            ));
        }
        Ok(())
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters.keys().cloned().collect()
    }

    pub fn parameter_values(&self) -> Vec<f64> {
        self.parameters.values().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{load_config, parse_config, ConfigError};
    use filippov_core::models::Ambient;
    use filippov_core::vector_field::GridSpacing;
    use std::io::Write;

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T, ConfigError>, needle: &str) {
        let err = result.expect_err("expected error");
        assert!(
            err.to_string().contains(needle),
            "expected error containing '{needle}', got '{err}'"
        );
    }

    #[test]
    fn empty_file_keeps_reference_values() {
        let config = parse_config("").expect("empty config");
        assert_eq!(config.predator_prey.threshold, 1.625);
        assert_eq!(config.predator_prey.simulator.eps, 1e-5);
        assert_eq!(config.si_treatment.starts.len(), 3);
        assert_eq!(config.sir_fit.initial, [762.0, 1.0, 0.0]);
        assert!(config.scenario.is_none());
    }

    #[test]
    fn sections_override_only_given_fields() {
        let text = r#"
            [predator_prey]
            threshold = 1.5
            starts = [[0.5, 0.5], [1.0, 1.0]]

            [predator_prey.params]
            e = 0.1

            [predator_prey.simulator]
            max_switches = 3

            [si_treatment.grid]
            kind = "step"
            h = 0.1

            [cooling.model]
            k = -0.3
            ambient = { kind = "periodic", base = 20.0, amplitude = 5.0, omega = 0.5 }
        "#;
        let config = parse_config(text).expect("valid config");
        let pp = &config.predator_prey;
        assert_eq!(pp.threshold, 1.5);
        assert_eq!(pp.starts.len(), 2);
        assert_eq!(pp.params.e, 0.1);
        assert_eq!(pp.params.a, 0.3556);
        assert_eq!(pp.simulator.max_switches, 3);
        assert_eq!(pp.simulator.eps, 1e-6);
        assert_eq!(config.si_treatment.grid, GridSpacing::Step { h: 0.1 });
        assert!(matches!(
            config.cooling.model.ambient,
            Ambient::Periodic { base, .. } if base == 20.0
        ));
    }

    #[test]
    fn scenario_section_is_checked() {
        let text = r#"
            [scenario]
            threshold = 0.5
            lower = ["-x", "1"]
            upper = ["x", "-1"]
            starts = [[0.2, 0.1]]
            window = { x_min = -1.0, x_max = 1.0, y_min = 0.0, y_max = 1.0 }

            [scenario.parameters]
            k = 2.0
        "#;
        let config = parse_config(text).expect("valid scenario");
        let scenario = config.scenario.expect("scenario present");
        assert_eq!(scenario.variables, vec!["x", "y"]);
        assert_eq!(scenario.parameter_names(), vec!["k"]);
        assert_eq!(scenario.parameter_values(), vec![2.0]);

        let bad = "[scenario]\nlower = [\"1\"]\nupper = [\"1\", \"2\"]\nstarts = [[0.0, 0.0]]\n";
        assert_err_contains(parse_config(bad), "scenario.lower needs two expressions");
        let no_starts = "[scenario]\nlower = [\"1\", \"1\"]\nupper = [\"1\", \"2\"]\n";
        assert_err_contains(parse_config(no_starts), "at least one start point");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert_err_contains(parse_config("[linear]\nsamples = 1\n"), "linear.samples");
        assert_err_contains(parse_config("[linear]\nsamples = \"many\"\n"), "failed to parse");
    }

    #[test]
    fn load_reads_files_and_reports_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run.toml");
        let mut file = std::fs::File::create(&path).expect("create config");
        writeln!(file, "[eigen]\nmatrix = [[0.0, 1.0], [-1.0, 0.0]]").expect("write config");
        drop(file);

        let config = load_config(Some(path.as_path())).expect("load config");
        assert_eq!(config.eigen.matrix, [[0.0, 1.0], [-1.0, 0.0]]);
        assert_eq!(load_config(None).expect("defaults").eigen.matrix[0], [1.0, 5.0]);

        let missing = dir.path().join("missing.toml");
        assert_err_contains(load_config(Some(missing.as_path())), "missing.toml");

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[eigen\n").expect("write broken");
        assert_err_contains(load_config(Some(broken.as_path())), "broken.toml");
    }
}
