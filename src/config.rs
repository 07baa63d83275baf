//! Application configuration management.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config PATH`, or `config.toml` in the platform config dir)
//! 3. `LOREKEEPER_*` environment variables (e.g. `LOREKEEPER_TOP_K=4`)
//! 4. CLI flags, applied by the caller after loading
//!
//! # Example
//!
//! ```toml
//! extensions = ["md", "txt", "org"]
//! cache_path = "campaign/.lorekeeper/embed_cache.json"
//! top_k = 3
//! skip_hidden = true
//! ignore_patterns = ["drafts/"]
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::ingest::pipeline::DEFAULT_BATCH_SIZE;
use crate::scanner::{normalize_extension, WalkerConfig, DEFAULT_EXTENSIONS};
use crate::store::{DEFAULT_DIMENSION, DEFAULT_TOP_K};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "LOREKEEPER_";

/// Cache file name, used in the platform cache dir or the working directory.
pub const CACHE_FILE_NAME: &str = "embed_cache.json";

/// Vector store file name, used in the platform data dir or the working directory.
pub const STORE_FILE_NAME: &str = "lore_store.json";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A layer could not be parsed or has the wrong types.
    #[error("Invalid configuration: {0}")]
    Parse(#[from] Box<figment::Error>),

    /// Values parsed but are out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File extensions to ingest (without the dot).
    pub extensions: Vec<String>,
    /// Location of the freshness cache record.
    pub cache_path: Option<PathBuf>,
    /// Location of the vector store file.
    pub store_path: Option<PathBuf>,
    /// Passages retrieved per question.
    pub top_k: usize,
    /// Skip hidden files and directories.
    pub skip_hidden: bool,
    /// Follow symbolic links during the walk.
    pub follow_symlinks: bool,
    /// Gitignore-style patterns to skip.
    pub ignore_patterns: Vec<String>,
    /// Width of hashed embeddings.
    pub embedding_dimension: usize,
    /// Documents embedded per batch.
    pub batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            cache_path: None,
            store_path: None,
            top_k: DEFAULT_TOP_K,
            skip_hidden: false,
            follow_symlinks: false,
            ignore_patterns: Vec::new(),
            embedding_dimension: DEFAULT_DIMENSION,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl Config {
    /// Load configuration from all layers.
    ///
    /// With `explicit` set, that file must exist. Otherwise the platform
    /// config file is used when present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a layer is malformed or a value is out of range.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) if !p.exists() => return Err(ConfigError::NotFound(p.to_path_buf())),
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_config_path(),
        };
        Self::load_from_path(path.as_deref())
    }

    /// Load defaults, then `path` (if it exists), then environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a layer is malformed or a value is out of range.
    pub fn load_from_path(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(p) = path {
            log::debug!("Reading config from {}", p.display());
            figment = figment.merge(Toml::file(p));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        let mut config: Self = figment.extract().map_err(Box::new)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn normalize(&mut self) {
        self.extensions = self
            .extensions
            .iter()
            .map(|e| normalize_extension(e))
            .filter(|e| !e.is_empty())
            .collect();
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "extensions must name at least one file extension".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be at least 1".to_string()));
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::Invalid(
                "embedding_dimension must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Walker settings derived from this configuration.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            follow_symlinks: self.follow_symlinks,
            skip_hidden: self.skip_hidden,
            ignore_patterns: self.ignore_patterns.clone(),
            ..WalkerConfig::default()
        }
        .with_extensions(&self.extensions)
    }

    /// Cache location: configured, else platform cache dir, else working directory.
    #[must_use]
    pub fn resolved_cache_path(&self) -> PathBuf {
        self.cache_path.clone().unwrap_or_else(|| {
            project_dirs().map_or_else(
                || PathBuf::from(CACHE_FILE_NAME),
                |dirs| dirs.cache_dir().join(CACHE_FILE_NAME),
            )
        })
    }

    /// Store location: configured, else platform data dir, else working directory.
    #[must_use]
    pub fn resolved_store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(|| {
            project_dirs().map_or_else(
                || PathBuf::from(STORE_FILE_NAME),
                |dirs| dirs.data_dir().join(STORE_FILE_NAME),
            )
        })
    }

    /// Platform-specific config file, if a home directory is known.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "lorekeeper", "lorekeeper")
}
