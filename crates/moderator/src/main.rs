//! Moderator CLI - queue-driven photo moderation worker.
//!
//! Consumes batches of uploaded profile photos from Redis, decides
//! approve/reject per photo and publishes one result per batch.
//!
//! # Usage
//!
//! ```bash
//! # Run the worker loop (Ctrl-C stops after the current batch)
//! moderator run
//!
//! # Moderate local files without the queue
//! moderator check photo1.jpg photo2.png
//!
//! # View configuration
//! moderator config show
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use moderator_core::Config;

mod cli;
mod logging;

/// Moderator - queue-driven photo moderation worker.
#[derive(Parser, Debug)]
#[command(name = "moderator")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to the platform config path)
    #[arg(short, long, global = true, env = "MODERATOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Consume the moderation queue until interrupted
    Run(cli::run::RunArgs),

    /// Moderate local image files and print the results as JSON
    Check(cli::check::CheckArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config problems go to stderr directly.
    let config = resolve_config(
        load_config(cli.config.as_deref()),
        &cli.command,
        cli.config.is_some(),
    )?;
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Moderator v{}", moderator_core::VERSION);

    match cli.command {
        Commands::Run(args) => cli::run::execute(args, config).await,
        Commands::Check(args) => cli::check::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, config, cli.config).await,
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config, moderator_core::ConfigError> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// Decide what to do when the configuration fails to load.
///
/// `run` and an explicit `--config` treat it as fatal. The local commands
/// fall back to defaults plus environment overrides, with a warning.
fn resolve_config(
    loaded: Result<Config, moderator_core::ConfigError>,
    command: &Commands,
    explicit_path: bool,
) -> anyhow::Result<Config> {
    let e = match loaded {
        Ok(config) => return Ok(config),
        Err(e) => e,
    };
    if explicit_path || matches!(command, Commands::Run(_)) {
        return Err(anyhow::Error::new(e).context("Failed to load configuration"));
    }

    eprintln!(
        "Warning: Failed to load config: {e}\n  \
         Using default configuration. Check your config file with `moderator config path`."
    );
    let mut config = Config::default();
    if let Err(env_err) = config
        .apply_env_overrides()
        .and_then(|()| config.validate())
    {
        eprintln!("Warning: Ignoring environment overrides: {env_err}");
        config = Config::default();
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["moderator", "check", "a.jpg", "--verbose", "--config", "x.toml"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(cli.command, Commands::Check(_)));
    }

    fn invalid() -> Result<Config, moderator_core::ConfigError> {
        Err(moderator_core::ConfigError::ValidationError(
            "policy.blur_threshold must be finite and >= 0".into(),
        ))
    }

    fn command(args: &[&str]) -> Commands {
        Cli::try_parse_from(args).unwrap().command
    }

    #[test]
    fn test_run_refuses_broken_config() {
        let run = command(&["moderator", "run"]);
        let err = resolve_config(invalid(), &run, false).unwrap_err();
        assert!(format!("{err:#}").contains("blur_threshold"));
    }

    #[test]
    fn test_local_commands_fall_back_to_defaults() {
        let check = command(&["moderator", "check", "a.jpg"]);
        assert!(resolve_config(invalid(), &check, false).is_ok());

        let show = command(&["moderator", "config", "show"]);
        assert!(resolve_config(invalid(), &show, false).is_ok());

        assert!(resolve_config(invalid(), &check, true).is_err());
    }

    #[test]
    fn test_loaded_config_is_used_as_is() {
        let mut config = Config::default();
        config.queue.queue_name = "custom".into();
        let run = command(&["moderator", "run"]);
        let resolved = resolve_config(Ok(config), &run, false).unwrap();
        assert_eq!(resolved.queue.queue_name, "custom");
    }
}
