//! Configuration for the chunk model.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $CHUNKSTACK_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/chunkstack/config.toml
//!   3. ~/.config/chunkstack/config.toml
//!
//! The settings are process-wide: a loaded config only takes effect once
//! `install()` is called, typically once by the simulation host at startup.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

/// Default bound on slice/sequence nesting.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

static IMPLICIT_SERIALIZATION: AtomicBool = AtomicBool::new(true);
static MAX_NESTING_DEPTH: AtomicUsize = AtomicUsize::new(DEFAULT_MAX_NESTING_DEPTH);

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Allow peeks to serialize fields, slices and sequences in order to
    /// produce another representation. When false, such conversions need
    /// `PeekFlags::ALLOW_SERIALIZATION`.
    pub implicit_serialization: bool,
    /// Deepest slice/sequence nesting a chunk tree may reach.
    pub max_nesting_depth: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            implicit_serialization: true,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("chunkstack")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

fn parse_flag(value: &str) -> bool {
    value == "true" || value == "1"
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl ChunkConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            ChunkConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load a config file without consulting the environment.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("CHUNKSTACK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write this config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        std::fs::write(path, self.to_toml()?)
            .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)
    }

    /// Apply CHUNKSTACK_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CHUNKSTACK_IMPLICIT_SERIALIZATION") {
            self.implicit_serialization = parse_flag(&v);
        }
        if let Ok(v) = std::env::var("CHUNKSTACK_MAX_NESTING_DEPTH") {
            if let Ok(depth) = v.parse() {
                self.max_nesting_depth = depth;
            }
        }
    }

    /// Make these settings the process-wide ones.
    pub fn install(&self) {
        IMPLICIT_SERIALIZATION.store(self.implicit_serialization, Ordering::Relaxed);
        MAX_NESTING_DEPTH.store(self.max_nesting_depth, Ordering::Relaxed);
        tracing::debug!(
            implicit_serialization = self.implicit_serialization,
            max_nesting_depth = self.max_nesting_depth,
            "chunk config installed"
        );
    }

    /// The settings currently in effect.
    pub fn current() -> Self {
        Self {
            implicit_serialization: implicit_serialization(),
            max_nesting_depth: max_nesting_depth(),
        }
    }
}

pub(crate) fn implicit_serialization() -> bool {
    IMPLICIT_SERIALIZATION.load(Ordering::Relaxed)
}

pub(crate) fn max_nesting_depth() -> usize {
    MAX_NESTING_DEPTH.load(Ordering::Relaxed)
}
