use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::DbTarget;
use crate::validation::{is_valid_password, is_valid_username, MIN_PASSWORD_LENGTH};

/// Folder name used beneath the user's home directory for application data.
pub const DATA_DIR_NAME: &str = ".library-manager";
/// SQLite file name stored inside the application data directory.
const DB_FILE_NAME: &str = "library.sqlite";
const LOG_FILE_NAME: &str = "library-manager.log";
const CONFIG_FILE_NAME: &str = "config.toml";
/// Config file looked up in the working directory before the data dir.
const LOCAL_CONFIG_FILE: &str = "library-manager.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub bootstrap: BootstrapConfig,
    /// File this config was read from; `None` when running on defaults.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Overrides `~/.library-manager/library.sqlite`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub level: String,
    /// Overrides `~/.library-manager/library-manager.log`.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Credentials for the admin account created on first start, when the admin
/// table is still empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BootstrapConfig {
    pub admin_username: String,
    pub admin_password: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_username: "admin".to_string(),
            admin_password: "admin123".to_string(),
        }
    }
}

impl AppConfig {
    /// Load the first config file found, or defaults when there is none.
    /// This runs before logging is up, so the caller reports `source`.
    pub fn load() -> Result<Self> {
        match Self::config_paths().into_iter().find(|path| path.exists()) {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.source = Some(path.to_path_buf());

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_username(&self.bootstrap.admin_username) {
            anyhow::bail!(
                "bootstrap.admin_username must be 3-30 letters, digits, or underscores"
            );
        }
        if !is_valid_password(&self.bootstrap.admin_password) {
            anyhow::bail!(
                "bootstrap.admin_password must be at least {MIN_PASSWORD_LENGTH} characters"
            );
        }
        if self.logging.level.trim().is_empty() {
            anyhow::bail!("logging.level cannot be empty");
        }
        Ok(())
    }

    /// Record where the settings came from. Call after [`crate::logging::init`].
    pub fn log_source(&self) {
        match &self.source {
            Some(path) => info!(path = %path.display(), "Loaded config"),
            None => info!("No config file found, using defaults"),
        }
    }

    pub fn database_target(&self) -> Result<DbTarget> {
        match &self.database.path {
            Some(path) => Ok(DbTarget::File(path.clone())),
            None => Ok(DbTarget::File(data_dir()?.join(DB_FILE_NAME))),
        }
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        match &self.logging.file {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join(LOG_FILE_NAME)),
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Ok(dir) = data_dir() {
            paths.push(dir.join(CONFIG_FILE_NAME));
        }
        paths
    }
}

/// Resolve `~/.library-manager`.
pub fn data_dir() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
        assert_eq!(config.bootstrap, BootstrapConfig::default());
        assert!(config.database.path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn explicit_database_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[database]\npath = \"/tmp/books.sqlite\"\n").unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(
            config.database_target().unwrap(),
            DbTarget::File(PathBuf::from("/tmp/books.sqlite"))
        );
    }

    #[test]
    fn defaults_have_no_source() {
        let config = AppConfig::default();
        assert!(config.source.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn weak_bootstrap_password_is_rejected() {
        let mut config = AppConfig::default();
        config.bootstrap.admin_password = "123".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[logging\nlevel = 1").unwrap();
        let err = AppConfig::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
