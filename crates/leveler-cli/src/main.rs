//! Leveler CLI - console front end for the optical leveling amplifier.

mod assistant;
mod commands;
mod console;
mod settings;

use clap::{Parser, Subcommand};
use settings::Settings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "leveler")]
#[command(author, version, about = "Optical leveling amplifier", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the leveler live with a command console
    Run(commands::run::RunArgs),

    /// Record a take and loop it through the leveler
    Record(commands::record::RecordArgs),

    /// Render processed audio to a WAV file without audio hardware
    Render(commands::render::RenderArgs),

    /// List audio devices
    Devices(commands::devices::DevicesArgs),

    /// Ask the assistant about the leveling amplifier
    Ask(commands::ask::AskArgs),

    /// Show the effective configuration
    Config(commands::config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let Cli { config, command } = Cli::parse();
    let settings = || Settings::load(config.as_deref());

    match command {
        Commands::Run(args) => commands::run::run(args, &settings()?),
        Commands::Record(args) => commands::record::run(args, &settings()?),
        Commands::Render(args) => commands::render::run(args, &settings()?),
        Commands::Devices(args) => commands::devices::run(args, &settings()?),
        Commands::Ask(args) => commands::ask::run(args, &settings()?),
        Commands::Config(args) => commands::config::run(args, &settings()?),
    }
}
