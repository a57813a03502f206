//! The `moderator config` command for configuration management.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use moderator_core::Config;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display the effective configuration (file + environment overrides)
    Show,

    /// Show config file path
    Path,

    /// Initialize a new config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Execute the config command.
///
/// `config` is the already-loaded effective configuration; `path` is the
/// `--config` override, if any.
pub async fn execute(args: ConfigArgs, config: Config, path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(Config::default_path);

    match args.command {
        ConfigCommand::Show => {
            println!("{}", redacted(config).to_toml()?);
        }

        ConfigCommand::Path => {
            println!("{}", path.display());
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let toml = Config::default().to_toml()?;
            std::fs::write(&path, toml)?;

            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

/// Blank out credentials before printing.
fn redacted(mut config: Config) -> Config {
    for secret in [
        &mut config.queue.password,
        &mut config.face.api_key,
        &mut config.storage.access_key,
        &mut config.storage.secret_key,
    ] {
        if !secret.is_empty() {
            *secret = "***".to_string();
        }
    }
    config
}
