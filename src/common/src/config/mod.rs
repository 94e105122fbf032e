use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "purposedb.toml";

/// Prefix for environment overrides, e.g. `PURPOSEDB__VACUUM__DRY_RUN=true`.
pub const ENV_PREFIX: &str = "PURPOSEDB__";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// DSN of the bookkeeping catalog (SQLite or PostgreSQL)
    pub dsn: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: String::from("sqlite://.data/purposedb.db"),
        }
    }
}

impl DatabaseConfig {
    /// Create an in-memory database configuration
    pub fn in_memory() -> Self {
        Self {
            dsn: String::from("sqlite::memory:"),
        }
    }
}

/// What a scheduler tick does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VacuumMode {
    /// Run the system-wide pass over every storage policy.
    #[default]
    All,
    /// Run a targeted pass for each vacuuming policy whose period has elapsed.
    Due,
}

/// How a batch reacts when the backing store rejects a statement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and keep executing the remaining statements.
    #[default]
    Continue,
    /// Record the failure and skip every remaining statement of the pass.
    Abort,
}

/// Vacuuming (retention enforcement) configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VacuumConfig {
    /// Run the scheduling loop when the service starts.
    ///
    /// Env: PURPOSEDB__VACUUM__ENABLED
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Interval between scheduler ticks.
    ///
    /// Env: PURPOSEDB__VACUUM__INTERVAL
    #[serde(with = "humantime_serde", default = "default_interval")]
    pub interval: Duration,

    /// Env: PURPOSEDB__VACUUM__MODE
    #[serde(default)]
    pub mode: VacuumMode,

    /// Log statements without sending them to the database.
    ///
    /// Env: PURPOSEDB__VACUUM__DRY_RUN
    #[serde(default)]
    pub dry_run: bool,

    /// Env: PURPOSEDB__VACUUM__ON_FAILURE
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

impl Default for VacuumConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval: default_interval(),
            mode: VacuumMode::default(),
            dry_run: false,
            on_failure: FailurePolicy::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    /// Bookkeeping catalog holding purposes, policies and columns
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Retention enforcement
    #[serde(default)]
    pub vacuum: VacuumConfig,
}

impl Configuration {
    /// Load defaults, then `purposedb.toml`, then `PURPOSEDB__*` env vars.
    ///
    /// The result is not validated; call [`Configuration::validate`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::extract(Self::figment().merge(Toml::file(DEFAULT_CONFIG_FILE)))
    }

    /// Like [`Configuration::load`] but reading the given TOML file.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        Self::extract(Self::figment().merge(Toml::file(path)))
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Configuration::default()))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Configuration = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.dsn.trim().is_empty() {
            return Err(ConfigError::Invalid("database.dsn cannot be empty".into()));
        }
        if self.vacuum.interval.is_zero() {
            return Err(ConfigError::Invalid(
                "vacuum.interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_configuration() {
        let config = Configuration::default();

        assert_eq!(config.database.dsn, "sqlite://.data/purposedb.db");
        assert!(config.vacuum.enabled);
        assert_eq!(config.vacuum.interval, Duration::from_secs(300));
        assert_eq!(config.vacuum.mode, VacuumMode::All);
        assert!(!config.vacuum.dry_run);
        assert_eq!(config.vacuum.on_failure, FailurePolicy::Continue);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_configless_operation() {
        Jail::expect_with(|_jail| {
            let config = Configuration::load().expect("defaults should load");
            assert_eq!(config.database.dsn, "sqlite://.data/purposedb.db");
            Ok(())
        });
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                [database]
                dsn = "postgres://localhost/gdpr"

                [vacuum]
                interval = "1h 30m"
                mode = "due"
                on_failure = "abort"
                "#,
            )?;

            let config = Configuration::load().expect("file should load");
            assert_eq!(config.database.dsn, "postgres://localhost/gdpr");
            assert_eq!(config.vacuum.interval, Duration::from_secs(90 * 60));
            assert_eq!(config.vacuum.mode, VacuumMode::Due);
            assert_eq!(config.vacuum.on_failure, FailurePolicy::Abort);
            assert!(config.vacuum.enabled);
            Ok(())
        });
    }

    #[test]
    fn test_env_var_override() {
        Jail::expect_with(|jail| {
            jail.set_env("PURPOSEDB__DATABASE__DSN", "sqlite::memory:");
            jail.set_env("PURPOSEDB__VACUUM__DRY_RUN", "true");
            jail.set_env("PURPOSEDB__VACUUM__INTERVAL", "30s");

            let config = Configuration::load().expect("env should load");
            assert_eq!(config.database.dsn, "sqlite::memory:");
            assert!(config.vacuum.dry_run);
            assert_eq!(config.vacuum.interval, Duration::from_secs(30));
            Ok(())
        });
    }

    #[test]
    fn test_load_from_path() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "[vacuum]\nenabled = false\n")?;

            let config = Configuration::load_from_path(Path::new("custom.toml"))
                .expect("custom file should load");
            assert!(!config.vacuum.enabled);
            assert_eq!(config.vacuum.interval, Duration::from_secs(300));
            Ok(())
        });
    }

    #[test]
    fn test_loading_does_not_validate() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                "[database]\ndsn = \"\"\n\n[vacuum]\ninterval = \"0s\"\n",
            )?;

            let config = Configuration::load().expect("file should load");
            assert_eq!(config.vacuum.interval, Duration::ZERO);
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
            Ok(())
        });
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut config = Configuration::default();
        config.vacuum.interval = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
