//! # configs
//!
//! Layered settings for the feed coordinator and its host binary:
//! built-in defaults, then an optional TOML file, then `RUSTY_FEED__*`
//! environment variables (`RUSTY_FEED__PAGINATION__BATCH_SIZE=10`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use rf_engine::{EngineConfig, PaginationConfig, PlaybackConfig, ViewportConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const ENV_PREFIX: &str = "RUSTY_FEED";
pub const DEFAULT_FILE: &str = "rusty-feed.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { filter: "info".to_string(), json: false }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pagination: PaginationConfig,
    pub viewport: ViewportConfig,
    pub playback: PlaybackConfig,
    pub log: LogConfig,
}

impl AppConfig {
    pub fn engine(&self) -> EngineConfig {
        EngineConfig { pagination: self.pagination, viewport: self.viewport, playback: self.playback }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pagination.batch_size == 0 {
            return Err(ConfigError::Invalid("pagination.batch_size must be positive".into()));
        }
        if !(self.pagination.end_reached_threshold >= 0.0) {
            return Err(ConfigError::Invalid("pagination.end_reached_threshold must not be negative".into()));
        }
        let ViewportConfig { enter_ratio, leave_ratio } = self.viewport;
        if !(0.0 < leave_ratio && leave_ratio <= enter_ratio && enter_ratio <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "viewport ratios must satisfy 0 < leave_ratio ({leave_ratio}) <= enter_ratio ({enter_ratio}) <= 1"
            )));
        }
        Ok(())
    }
}

/// Assembles the layers. Tests inject the environment instead of mutating
/// the process's own.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    toml: Option<String>,
    env: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Optional file layer. A missing file is not an error.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Inline TOML layered where the file would be.
    pub fn toml(mut self, contents: impl Into<String>) -> Self {
        self.toml = Some(contents.into());
        self
    }

    /// Replaces the process environment as the variable source.
    pub fn env(mut self, vars: HashMap<String, String>) -> Self {
        self.env = Some(vars);
        self
    }

    pub fn load(self) -> Result<AppConfig, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = &self.file {
            debug!(path = %path.display(), "config file layer");
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml).required(false));
        }
        if let Some(contents) = &self.toml {
            builder = builder.add_source(File::from_str(contents, FileFormat::Toml));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(self.env),
        );

        let app: AppConfig = builder.build()?.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }
}

/// Reads `.env`, then loads from `RUSTY_FEED_CONFIG` (or `rusty-feed.toml`)
/// and the process environment.
pub fn load() -> Result<AppConfig, ConfigError> {
    if let Ok(path) = dotenvy::dotenv() {
        debug!(path = %path.display(), "loaded .env");
    }
    let file = std::env::var("RUSTY_FEED_CONFIG").unwrap_or_else(|_| DEFAULT_FILE.to_string());
    ConfigLoader::new().file(file).load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_engine::PlaybackMode;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults_when_no_layers() {
        let cfg = ConfigLoader::new().env(HashMap::new()).load().unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.pagination.batch_size, 20);
        assert_eq!(cfg.viewport.enter_ratio, 0.4);
        assert!(cfg.playback.autoplay_video_enabled);
        assert_eq!(cfg.log.filter, "info");
    }

    #[test]
    fn test_missing_file_is_ignored() {
        let cfg = ConfigLoader::new().file("/nonexistent/rusty-feed.toml").env(HashMap::new()).load().unwrap();
        assert_eq!(cfg.engine(), EngineConfig::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let cfg = ConfigLoader::new()
            .toml("[pagination]\nbatch_size = 10\n\n[playback]\nmode = \"detail\"\n")
            .env(vars(&[("RUSTY_FEED__PAGINATION__BATCH_SIZE", "5"), ("RUSTY_FEED__LOG__JSON", "true")]))
            .load()
            .unwrap();
        assert_eq!(cfg.pagination.batch_size, 5);
        assert_eq!(cfg.playback.mode, PlaybackMode::Detail);
        assert!(cfg.log.json);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let err = ConfigLoader::new().toml("[pagination]\nbatch_size = 0\n").env(HashMap::new()).load().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_inverted_viewport_ratios_are_rejected() {
        let err = ConfigLoader::new()
            .toml("[viewport]\nenter_ratio = 0.1\nleave_ratio = 0.5\n")
            .env(HashMap::new())
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("leave_ratio")));
    }

    #[test]
    fn test_malformed_value_is_a_load_error() {
        let err = ConfigLoader::new().toml("[pagination]\nbatch_size = \"many\"\n").env(HashMap::new()).load().unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
