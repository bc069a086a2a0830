//! Persistent configuration.
//!
//! Settings are layered with `figment`, later layers winning:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, or `config.toml` in the platform config dir)
//! 3. `DUPEDB_*` environment variables (`DUPEDB_WORKERS=8`,
//!    `DUPEDB_PREFERRED=["/main","/backup"]`)
//! 4. command-line flags, applied by the caller
//!
//! ```toml
//! database = "/var/lib/dupedb/index.db"
//! workers = 4
//! skip_hidden = true
//! ignore_patterns = ["*.tmp", "node_modules/"]
//! preferred = ["/data/main", "/data/backup"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "DUPEDB_";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Index database file; the platform data dir is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,

    /// Fingerprinting worker count; the CPU count is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Follow symbolic links while walking.
    pub follow_symlinks: bool,

    /// Skip files and directories whose name starts with a dot.
    pub skip_hidden: bool,

    /// Extra gitignore-style patterns applied to every scan.
    pub ignore_patterns: Vec<String>,

    /// Default preference order for `list` and `delete`.
    pub preferred: Vec<PathBuf>,
}

impl Config {
    /// Load defaults, the config file and the environment.
    ///
    /// A missing file is not an error; an unreadable or malformed one is.
    ///
    /// # Errors
    ///
    /// Returns an error if a layer cannot be parsed into [`Config`].
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let path = match config_file {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path(),
        };
        let config: Self = Self::figment(path.as_deref())
            .extract()
            .context("invalid configuration")?;
        log::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// The layered provider chain, without CLI flags.
    #[must_use]
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Write the configuration as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("cannot serialize configuration")?;
        fs::write(path, content).with_context(|| format!("cannot write {}", path.display()))?;
        Ok(())
    }

    /// The configured database path, or the platform default.
    ///
    /// # Errors
    ///
    /// Returns an error if no database is configured and the platform has no
    /// data directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => default_database_path()
                .context("no data directory available; pass --db to choose an index file"),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "dupedb")
}

/// `config.toml` under the platform config dir.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// `index.db` under the platform data dir.
#[must_use]
pub fn default_database_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("index.db"))
}
