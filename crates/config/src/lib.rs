//! Configuration for ogsync.
//!
//! Layers, lowest priority first:
//!
//! 1. built-in defaults (`serde` field defaults),
//! 2. a config file in TOML, YAML or JSON (chosen by extension),
//! 3. `OGSYNC_*` environment variables, with `__` separating nested keys
//!    (`OGSYNC_REMOTE__PATH=/mnt/share`).
//!
//! ```toml
//! root = "/home/me/.local/share/game/saves"
//! concurrency = 8
//!
//! [remote]
//! kind = "directory"
//! path = "/mnt/share/saves"
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use ogsync_storage::BackendHandle;
use ogsync_storage::backend::{DirectoryBackend, DryRunBackend};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const ENV_PREFIX: &str = "OGSYNC_";
const DEFAULT_CONFIG_FILENAME: &str = "config.toml";

/// Fully merged configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Absolute local directory being synchronised.
    pub root: PathBuf,
    /// Maximum transfers in flight during one sync. Unset means unbounded.
    #[serde(default)]
    pub concurrency: Option<NonZeroUsize>,
    /// Release each file's buffer as soon as it has been saved.
    #[serde(default)]
    pub release_content: bool,
    /// Never modify the remote store; log what would have happened.
    #[serde(default)]
    pub dry_run: bool,
    pub remote: RemoteConfig,
}

/// Which remote backend to connect, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RemoteConfig {
    Directory {
        path: PathBuf,
        #[serde(default = "default_remote_name")]
        name: String,
    },
}

fn default_remote_name() -> String {
    "remote".to_string()
}

impl Config {
    /// Where the config file lives when none is given explicitly.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "ogsync").map(|dirs| dirs.config_dir().join(DEFAULT_CONFIG_FILENAME))
    }

    /// Load and validate configuration.
    ///
    /// An explicit `path` must exist. Without one, the file at
    /// [`default_path()`](Self::default_path) is used when present and
    /// skipped otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, ENV_PREFIX)
    }

    fn load_with_env(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut figment = Figment::new();
        match path {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => figment = merge_file(figment, path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => figment = merge_file(figment, &path)?,
                None => tracing::debug!("No config file found; using environment only"),
            },
        }
        let config: Config = figment
            .merge(Env::prefixed(env_prefix).split("__"))
            .extract()
            .map_err(|e| ErrorKind::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values serde can't.
    pub fn validate(&self) -> Result<()> {
        if !self.root.is_absolute() {
            exn::bail!(ErrorKind::Invalid(format!("root must be absolute: {}", self.root.display())));
        }
        match &self.remote {
            RemoteConfig::Directory { path, .. } if !path.is_absolute() => {
                exn::bail!(ErrorKind::Invalid(format!("remote path must be absolute: {}", path.display())));
            },
            RemoteConfig::Directory { path, .. } if path.starts_with(&self.root) || self.root.starts_with(path) => {
                // Clearing one side would wipe (part of) the other.
                exn::bail!(ErrorKind::Invalid(format!(
                    "remote path {} overlaps root {}",
                    path.display(),
                    self.root.display()
                )));
            },
            RemoteConfig::Directory { .. } => Ok(()),
        }
    }

    /// Construct the configured remote backend.
    pub fn connect(&self) -> Result<BackendHandle> {
        let backend: BackendHandle = match &self.remote {
            RemoteConfig::Directory { path, name } => {
                Arc::new(DirectoryBackend::new(name.clone(), path).or_raise(|| ErrorKind::Backend)?)
            },
        };
        if self.dry_run {
            tracing::info!(backend = backend.name(), "Dry run enabled; remote store will not be modified");
            return Ok(Arc::new(DryRunBackend::new(backend)));
        }
        Ok(backend)
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    let figment = match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    };
    tracing::debug!(path = %path.display(), "Loaded config file");
    Ok(figment)
}
