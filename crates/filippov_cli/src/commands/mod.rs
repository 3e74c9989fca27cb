mod portraits;
mod series;
mod switched;

use crate::cli::{Cli, Command, ScalarKind};
use crate::config::{Config, CoolingConfig, ScalarConfig};
use anyhow::{bail, Result};

pub fn run(cli: &Cli, config: &Config) -> Result<()> {
    let out = cli.output_path();
    log::debug!("running {} into {}", cli.cmd.name(), out.display());
    match &cli.cmd {
        Command::PredatorPrey => switched::predator_prey(&config.predator_prey, &out),
        Command::SiTreatment => switched::si_treatment(&config.si_treatment, &out),
        Command::LinearSwitch => switched::linear_switch(&config.linear_switch, &out),
        Command::TimeSwitched => switched::time_switched(&config.time_switched, &out),
        Command::PolynomialPair => switched::polynomial_pair(&config.polynomial_pair, &out),
        Command::Scenario => {
            let Some(scenario) = &config.scenario else {
                bail!("scenario needs a [scenario] section in the --config file");
            };
            switched::scenario(scenario, &out)
        }
        Command::Linear => portraits::linear(&config.linear, &out),
        Command::Cubic => portraits::cubic(&config.cubic, &out),
        Command::Nonlinear => portraits::nonlinear(&config.nonlinear, &out),
        Command::Eigen => portraits::eigen(&config.eigen, &out),
        Command::Si => series::si(&config.si, &out),
        Command::SirFit { data, errors } => {
            series::sir_fit(&config.sir_fit, data.as_deref(), errors.as_deref(), &out)
        }
        Command::Cooling { periodic } => {
            if *periodic {
                series::cooling(&CoolingConfig::periodic(), &out)
            } else {
                series::cooling(&config.cooling, &out)
            }
        }
        Command::Growth => series::growth(&config.growth, &out),
        Command::Scalar { problem } => {
            let preset = problem.map(|kind| match kind {
                ScalarKind::ForcedDecay => ScalarConfig::forced_decay(),
                ScalarKind::Relaxation => ScalarConfig::relaxation(),
                ScalarKind::Rational => ScalarConfig::rational(),
            });
            series::scalar(preset.as_ref().unwrap_or(&config.scalar), &out)
        }
    }
}
