//! Cache configuration.
//!
//! Options arrive from the host, often deserialized straight out of its
//! own configuration file, and are validated once when the cache is
//! configured.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::engine::EngineKind;

const DEFAULT_VIEW_ENGINE: &str = "tera";

/// Page cache options.
///
/// Every field except `cache_dir` has a usable default, so hosts can
/// deserialize a partial table:
///
/// ```toml
/// [page_cache]
/// cache_dir = "/var/cache/site/pages"
/// view_engine = "handlebars"
/// dev = true
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Directory rendered pages are persisted under. Leaving it empty
    /// fails validation.
    pub cache_dir: PathBuf,
    /// Recursively delete `cache_dir` when the cache is configured.
    pub clear_on_start: bool,
    /// Log lifecycle events (configuration, clears) at `info` instead of
    /// `debug`.
    pub verbose: bool,
    /// Engine used to render templates. Matched case-insensitively.
    pub view_engine: String,
    /// Development mode: render and respond normally, never write cache
    /// files.
    pub dev: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::new(),
            clear_on_start: true,
            verbose: false,
            view_engine: DEFAULT_VIEW_ENGINE.to_string(),
            dev: false,
        }
    }
}

/// Errors raised while validating cache options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field failed validation.
    #[error("invalid cache configuration: {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    /// `view_engine` named an engine this crate does not know.
    #[error("invalid view engine `{name}`")]
    UnknownEngine { name: String },
    /// `view_engine` named a known engine that is neither compiled in nor
    /// covered by a registered substitute.
    #[error("view engine `{engine}` is not available in this build")]
    EngineUnavailable { engine: EngineKind },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Validated configuration, fixed for the lifetime of a cache instance.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub(crate) cache_dir: PathBuf,
    pub(crate) clear_on_start: bool,
    pub(crate) verbose: bool,
    pub(crate) engine: EngineKind,
    pub(crate) dev: bool,
}

impl CacheOptions {
    /// Validate into the fixed runtime configuration.
    pub(crate) fn validate(self) -> Result<Config, ConfigError> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("cache_dir", "path must not be empty"));
        }

        let engine =
            EngineKind::parse(&self.view_engine).ok_or_else(|| ConfigError::UnknownEngine {
                name: self.view_engine.clone(),
            })?;

        Ok(Config {
            cache_dir: self.cache_dir,
            clear_on_start: self.clear_on_start,
            verbose: self.verbose,
            engine,
            dev: self.dev,
        })
    }
}
