//! Configuration module for wsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::{RemotePath, WorkspaceHost};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for wsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub workspace: WorkspaceConfig,
    pub ignore: IgnoreConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Local directory that is mirrored to the workspace.
    pub root: PathBuf,
    /// Absolute workspace path that receives the files.
    pub remote_path: Option<String>,
    /// Seconds between poll ticks in watch mode.
    pub poll_interval: u64,
    /// Maximum number of remote calls in flight during one apply.
    pub max_in_flight: usize,
    /// Root-relative paths to synchronize. Empty means the whole root.
    pub include: Vec<String>,
}

/// Remote workspace connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Workspace URL, e.g. `https://acme.cloud.example.com`.
    pub host: Option<String>,
    /// Name of the environment variable holding the bearer token.
    pub token_env: String,
}

/// Ignore rule settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Overrides the machine-global excludes file.
    pub global_excludes_file: Option<PathBuf>,
    /// Additional patterns applied at the sync root, never read from disk.
    pub extra_patterns: Vec<String>,
}

/// Snapshot cache settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding sync snapshots. Defaults to `<sync root>/.wsync`.
    pub dir: Option<PathBuf>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/wsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("wsync")
            .join("config.yaml")
    }

    /// Snapshot cache directory, resolved against the sync root when unset.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache
            .dir
            .clone()
            .unwrap_or_else(|| self.sync.root.join(DEFAULT_CACHE_DIR_NAME))
    }
}

/// Name of the per-project cache directory. Always ignored by the sync.
pub const DEFAULT_CACHE_DIR_NAME: &str = ".wsync";

/// Default name of the environment variable carrying the access token.
pub const DEFAULT_TOKEN_ENV: &str = "WSYNC_TOKEN";

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            remote_path: None,
            poll_interval: 1,
            max_in_flight: 20,
            include: Vec::new(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            host: None,
            token_env: DEFAULT_TOKEN_ENV.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.poll_interval"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound for `sync.max_in_flight`.
const MAX_IN_FLIGHT_LIMIT: usize = 256;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.poll_interval == 0 {
            errors.push(ValidationError {
                field: "sync.poll_interval".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.max_in_flight == 0 || self.sync.max_in_flight > MAX_IN_FLIGHT_LIMIT {
            errors.push(ValidationError {
                field: "sync.max_in_flight".into(),
                message: format!("must be in range 1..={MAX_IN_FLIGHT_LIMIT}"),
            });
        }
        if let Some(remote_path) = &self.sync.remote_path {
            if let Err(e) = RemotePath::new(remote_path.clone()) {
                errors.push(ValidationError {
                    field: "sync.remote_path".into(),
                    message: e.to_string(),
                });
            }
        }
        for include in &self.sync.include {
            let path = Path::new(include);
            let escapes = path
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir));
            if path.is_absolute() || escapes {
                errors.push(ValidationError {
                    field: "sync.include".into(),
                    message: format!("must be relative to the sync root: {include}"),
                });
            }
        }

        // --- workspace ---
        if let Some(host) = &self.workspace.host {
            if let Err(e) = WorkspaceHost::new(host) {
                errors.push(ValidationError {
                    field: "workspace.host".into(),
                    message: e.to_string(),
                });
            }
        }
        if self.workspace.token_env.trim().is_empty() {
            errors.push(ValidationError {
                field: "workspace.token_env".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use wsync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sync_root(PathBuf::from("/home/user/project"))
///     .sync_remote_path("/Users/me@example.com/project")
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_root(mut self, root: PathBuf) -> Self {
        self.config.sync.root = root;
        self
    }

    pub fn sync_remote_path(mut self, remote_path: impl Into<String>) -> Self {
        self.config.sync.remote_path = Some(remote_path.into());
        self
    }

    pub fn sync_poll_interval(mut self, seconds: u64) -> Self {
        self.config.sync.poll_interval = seconds;
        self
    }

    pub fn sync_max_in_flight(mut self, n: usize) -> Self {
        self.config.sync.max_in_flight = n;
        self
    }

    pub fn sync_include(mut self, path: impl Into<String>) -> Self {
        self.config.sync.include.push(path.into());
        self
    }

    // --- workspace ---

    pub fn workspace_host(mut self, host: impl Into<String>) -> Self {
        self.config.workspace.host = Some(host.into());
        self
    }

    pub fn workspace_token_env(mut self, name: impl Into<String>) -> Self {
        self.config.workspace.token_env = name.into();
        self
    }

    // --- ignore ---

    pub fn ignore_global_excludes_file(mut self, path: PathBuf) -> Self {
        self.config.ignore.global_excludes_file = Some(path);
        self
    }

    pub fn ignore_extra_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.ignore.extra_patterns.push(pattern.into());
        self
    }

    // --- cache ---

    pub fn cache_dir(mut self, dir: PathBuf) -> Self {
        self.config.cache.dir = Some(dir);
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
