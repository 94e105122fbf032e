use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Common CLI arguments shared across all binaries
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, global = true, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Subcommands that inspect the setup without touching any data
#[derive(Subcommand, Debug, Clone)]
pub enum CommonCommands {
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Initialize logging based on CLI arguments.
    ///
    /// `RUST_LOG` wins over the flags when set.
    pub fn init_logging(args: &CommonArgs) {
        let level = if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("purposedb configuration:");
            println!("========================");
            println!("Database DSN: {}", config.database.dsn);
            println!("Vacuum enabled: {}", config.vacuum.enabled);
            println!("Vacuum interval: {:?}", config.vacuum.interval);
            println!("Vacuum mode: {:?}", config.vacuum.mode);
            println!("Vacuum dry run: {}", config.vacuum.dry_run);
            println!("Vacuum on failure: {:?}", config.vacuum.on_failure);
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");
        config.validate().context("Configuration is invalid")?;
        log::info!("Configuration validation passed");
        Ok(())
    }

    /// Handle commands that don't require starting services
    pub fn handle_common_command(command: &CommonCommands, config: &Configuration) -> Result<()> {
        match command {
            CommonCommands::Config { json } => display_config(config, *json),
            CommonCommands::Validate => validate_config(config),
            CommonCommands::Version => {
                println!("{}", version_info());
                Ok(())
            }
        }
    }

    /// Standard version information
    pub fn version_info() -> String {
        format!(
            "{} {} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_RUST_VERSION")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let version = utils::version_info();
        assert!(version.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_validate_config_rejects_empty_dsn() {
        let mut config = crate::config::Configuration::default();
        config.database.dsn = String::new();
        assert!(utils::validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_config_reports_invalid_loaded_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("invalid.toml", "[vacuum]\ninterval = \"0s\"\n")?;

            let path = PathBuf::from("invalid.toml");
            let config = utils::load_config(Some(&path)).expect("file should load");
            let err = utils::validate_config(&config).unwrap_err();
            assert!(format!("{err:#}").contains("vacuum.interval must be greater than zero"));
            Ok(())
        });
    }
}
