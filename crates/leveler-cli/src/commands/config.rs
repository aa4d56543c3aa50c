//! Show or write the effective configuration.

use crate::settings::Settings;
use clap::Args;
use leveler_engine::default_config_path;
use std::path::PathBuf;

#[derive(Args)]
pub struct ConfigArgs {
    /// Print where the config file is looked for and exit
    #[arg(long)]
    path: bool,

    /// Write the effective configuration to this file
    #[arg(long, value_name = "FILE")]
    save: Option<PathBuf>,
}

pub fn run(args: ConfigArgs, settings: &Settings) -> anyhow::Result<()> {
    if args.path {
        println!("{}", default_config_path().display());
        return Ok(());
    }

    let text = settings.to_toml()?;
    match args.save {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, text)?;
            println!("Wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
