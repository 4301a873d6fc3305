//! Configuration file support for the siphon CLI.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `SIPHON_`, e.g., `SIPHON_DATABASE_URL`)
//! 3. Config file (~/.config/siphon/config.toml or ./siphon.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/siphon/siphon.db` on
//! Linux (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite://~/.local/state/siphon/siphon.db"  # optional, this is the default
//! ```

use std::path::PathBuf;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Progress store connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    /// Defaults to `sqlite://~/.local/state/siphon/siphon.db` if not specified.
    pub url: Option<String>,
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/siphon/config.toml)
    /// 3. Local config file (./siphon.toml)
    /// 4. Environment variables with SIPHON_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(proj_dirs) = ProjectDirs::from("", "", "siphon") {
            let xdg_config = proj_dirs.config_dir().join("config.toml");
            if xdg_config.exists() {
                tracing::debug!("Loading config from {:?}", xdg_config);
                builder = builder.add_source(
                    File::from(xdg_config)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        // Local config file (higher priority than XDG)
        let local_config = PathBuf::from("siphon.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./siphon.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // SIPHON_ prefixed environment variables
        // e.g., SIPHON_DATABASE_URL -> database.url
        builder = builder.add_source(
            Environment::with_prefix("SIPHON")
                .separator("_")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the database URL, falling back to the default state directory.
    ///
    /// The `mode=rwc` parameter enables read-write access and creates the
    /// file if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("siphon.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "siphon").map(|dirs| {
            dirs.state_dir()
                .map(PathBuf::from)
                .unwrap_or_else(|| dirs.data_local_dir().to_path_buf())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_database_url_is_sqlite() {
        let config = Config::default();
        let url = config.database_url().expect("default URL");
        assert!(url.starts_with("sqlite://"));
        assert!(url.ends_with("siphon.db?mode=rwc"));
    }

    #[test]
    fn explicit_url_wins() {
        let config = Config {
            database: DatabaseConfig {
                url: Some("postgres:///warehouse".to_string()),
            },
        };
        assert_eq!(
            config.database_url().as_deref(),
            Some("postgres:///warehouse")
        );
    }
}
