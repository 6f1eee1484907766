//! Application configuration: where files live and the `config.toml`
//! settings. Every section is optional and falls back to its defaults.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::DuplicatePolicy;

/// Overrides the platform directories with `<base>/config` and `<base>/data`.
pub const HOME_ENV: &str = "SETLIST_MANAGER_HOME";
const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "setlists.sqlite";
const LOG_FILE_NAME: &str = "setlist-manager.log";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("could not determine the home directory")]
    Directories,
}

/// Resolved on-disk locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Resolve from `SETLIST_MANAGER_HOME` when set, else from the platform's
    /// project directories. Both directories are created if missing.
    pub fn detect() -> Result<Self, ConfigError> {
        let paths = match std::env::var_os(HOME_ENV) {
            Some(base) => Self::under(Path::new(&base)),
            None => {
                let dirs = ProjectDirs::from("org", "setlist-manager", "setlist-manager")
                    .ok_or(ConfigError::Directories)?;
                Self {
                    config_dir: dirs.config_dir().to_path_buf(),
                    data_dir: dirs.data_dir().to_path_buf(),
                }
            }
        };

        fs::create_dir_all(&paths.config_dir)?;
        fs::create_dir_all(&paths.data_dir)?;
        Ok(paths)
    }

    pub fn under(base: &Path) -> Self {
        Self {
            config_dir: base.join("config"),
            data_dir: base.join("data"),
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE_NAME)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub user: UserConfig,
    pub setlists: SetlistConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Defaults to `<data_dir>/setlists.sqlite`.
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5_000,
        }
    }
}

/// The actor the TUI acts as. Created on first start if missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub username: String,
    pub email: Option<String>,
}

impl Default for UserConfig {
    fn default() -> Self {
        let username = std::env::var("USER")
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "performer".to_string());
        Self {
            username,
            email: None,
        }
    }
}

impl UserConfig {
    pub fn email(&self) -> String {
        self.email
            .clone()
            .unwrap_or_else(|| format!("{}@localhost", self.username))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetlistConfig {
    pub duplicate_songs: DuplicatePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Read `config.toml` from the config directory. A missing file yields the
    /// defaults; a malformed one is an error.
    pub fn load(paths: &AppPaths) -> Result<Self, ConfigError> {
        match fs::read_to_string(paths.config_file()) {
            Ok(content) => Self::from_toml(&content),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn database_path(&self, paths: &AppPaths) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| paths.data_dir.join(DB_FILE_NAME))
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.database.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::under(dir.path());
        let config = Config::load(&paths).unwrap();

        assert_eq!(config.setlists.duplicate_songs, DuplicatePolicy::Allow);
        assert_eq!(config.logging.filter, "info");
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
        assert_eq!(
            config.database_path(&paths),
            dir.path().join("data").join("setlists.sqlite")
        );
    }

    #[test]
    fn partial_file_overrides_only_what_it_names() {
        let config = Config::from_toml(
            r#"
            [user]
            username = "ana"

            [setlists]
            duplicate_songs = "reject"
            "#,
        )
        .unwrap();

        assert_eq!(config.user.username, "ana");
        assert_eq!(config.user.email(), "ana@localhost");
        assert_eq!(config.setlists.duplicate_songs, DuplicatePolicy::Reject);
        assert_eq!(config.database.busy_timeout_ms, 5_000);
    }

    #[test]
    fn file_is_read_from_the_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::under(dir.path());
        fs::create_dir_all(&paths.config_dir).unwrap();
        fs::write(
            paths.config_file(),
            "[database]\npath = \"/tmp/elsewhere.sqlite\"\n",
        )
        .unwrap();

        let config = Config::load(&paths).unwrap();
        assert_eq!(
            config.database_path(&paths),
            PathBuf::from("/tmp/elsewhere.sqlite")
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(matches!(
            Config::from_toml("[setlists]\nduplicate_songs = \"sometimes\"\n"),
            Err(ConfigError::Toml(_))
        ));
    }
}
