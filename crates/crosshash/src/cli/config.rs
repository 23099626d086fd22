//! The `crosshash config` command: inspect and bootstrap the TOML config.

use clap::{Args, Subcommand};
use crosshash_core::TrainConfig;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Print where the config file is looked up
    Path,

    /// Write a config file populated with the defaults
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Execute the config command.
pub fn execute(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            println!("{}", TrainConfig::load()?.to_toml()?);
        }
        ConfigCommand::Path => {
            println!("{}", TrainConfig::default_path().display());
        }
        ConfigCommand::Init { force } => init_config(force)?,
    }
    Ok(())
}

fn init_config(force: bool) -> anyhow::Result<()> {
    let path = TrainConfig::default_path();
    if path.exists() && !force {
        anyhow::bail!(
            "refusing to overwrite {} (pass --force to replace it)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, TrainConfig::default().to_toml()?)?;
    tracing::info!(path = %path.display(), "wrote default config");
    println!("wrote default config to {}", path.display());
    Ok(())
}
