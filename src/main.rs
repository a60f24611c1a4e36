use anyhow::{Context, Result};
use clap::Parser;
use log::debug;
use pair_intervals::cli::{Cli, CommandHandler};
use pair_intervals::settings::Settings;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    debug!("Effective settings: {:?}", settings);

    CommandHandler::new(settings).handle(cli.command)
}
