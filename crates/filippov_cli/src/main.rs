mod cli;
mod commands;
mod config;
mod plot;

use clap::Parser;
use env_logger::Env;

use crate::cli::Cli;
use crate::config::load_config;

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_deref())?;
    commands::run(&cli, &config)
}
