use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "filippov",
    about = "Switched planar ODE simulator and ODE explorations",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Global: TOML file overriding the built-in parameters
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Global: SVG destination; default `<subcommand>.svg`
    #[arg(long = "out", value_name = "FILE", global = true)]
    pub out: Option<PathBuf>,

    /// Global: debug logging (overrides RUST_LOG)
    #[arg(short = 'v', long = "verbose", action = ArgAction::SetTrue, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ScalarKind {
    /// x' = -x + sin t
    ForcedDecay,
    /// x' = -x + 10
    Relaxation,
    /// x' = -t / x
    Rational,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Holling II predator-prey with harvesting above the threshold
    PredatorPrey,
    /// SI model with treatment above the threshold
    SiTreatment,
    /// Two linear fields, single crossing of the threshold
    LinearSwitch,
    /// Linear system alternating matrices on a sinusoidal schedule
    TimeSwitched,
    /// Linear planar system: trajectory, eigenvalues and nullclines
    Linear,
    /// Cubic planar system
    Cubic,
    /// x' = x - y, y' = x²y - 4x: equilibria and nullclines
    Nonlinear,
    /// Two polynomial fields glued on y = w
    PolynomialPair,
    /// Susceptible/infected fractions over time
    Si,
    /// SIR curve against observed case counts
    SirFit {
        /// CSV with columns `dia,Casos`
        #[arg(long = "data", value_name = "CSV")]
        data: Option<PathBuf>,
        /// Write the per-day error table to this CSV
        #[arg(long = "errors", value_name = "CSV")]
        errors: Option<PathBuf>,
    },
    /// Newton's law of cooling
    Cooling {
        /// Use the periodic ambient temperature preset
        #[arg(long = "periodic", action = ArgAction::SetTrue)]
        periodic: bool,
    },
    /// Exponential growth y' = k y
    Growth,
    /// Scalar initial value problems
    Scalar {
        /// Preset problem; default is the `[scalar]` config section
        #[arg(long = "problem", value_enum)]
        problem: Option<ScalarKind>,
    },
    /// Eigenvalues and eigenvectors of a 2x2 matrix
    Eigen,
    /// Switched system defined by the `[scenario]` config section
    Scenario,
}

impl Command {
    /// Subcommand name, used for the default output file.
    pub fn name(&self) -> &'static str {
        match self {
            Command::PredatorPrey => "predator-prey",
            Command::SiTreatment => "si-treatment",
            Command::LinearSwitch => "linear-switch",
            Command::TimeSwitched => "time-switched",
            Command::Linear => "linear",
            Command::Cubic => "cubic",
            Command::Nonlinear => "nonlinear",
            Command::PolynomialPair => "polynomial-pair",
            Command::Si => "si",
            Command::SirFit { .. } => "sir-fit",
            Command::Cooling { .. } => "cooling",
            Command::Growth => "growth",
            Command::Scalar { .. } => "scalar",
            Command::Eigen => "eigen",
            Command::Scenario => "scenario",
        }
    }
}

impl Cli {
    pub fn output_path(&self) -> PathBuf {
        self.out
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.svg", self.cmd.name())))
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, ScalarKind};
    use clap::{CommandFactory, Parser};
    use std::path::PathBuf;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_output_follows_subcommand() {
        let cli = Cli::try_parse_from(["filippov", "predator-prey"]).expect("parse");
        assert_eq!(cli.output_path(), PathBuf::from("predator-prey.svg"));
        assert!(!cli.verbose);

        let cli = Cli::try_parse_from(["filippov", "si-treatment", "--out", "a.svg", "-v"])
            .expect("parse");
        assert_eq!(cli.output_path(), PathBuf::from("a.svg"));
        assert!(cli.verbose);
    }

    #[test]
    fn subcommand_options_parse() {
        let cli = Cli::try_parse_from([
            "filippov",
            "--config",
            "run.toml",
            "sir-fit",
            "--data",
            "cases.csv",
        ])
        .expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("run.toml")));
        match cli.cmd {
            Command::SirFit { data, errors } => {
                assert_eq!(data, Some(PathBuf::from("cases.csv")));
                assert!(errors.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::try_parse_from(["filippov", "scalar", "--problem", "rational"])
            .expect("parse");
        assert!(matches!(
            cli.cmd,
            Command::Scalar {
                problem: Some(ScalarKind::Rational)
            }
        ));
        assert!(Cli::try_parse_from(["filippov", "scalar", "--problem", "bogus"]).is_err());
        assert!(Cli::try_parse_from(["filippov"]).is_err());
    }
}
