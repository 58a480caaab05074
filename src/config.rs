//! Configuration for termbridge.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.termbridge/config.toml`
//! - Names of the managed descriptor types the bridge binds to
//! - Logging and console input settings for the probe binary
//!
//! # Configuration File
//!
//! ```toml
//! [log]
//! level = "debug"
//! file = "/tmp/termbridge.log"
//!
//! [descriptor]
//! class = "FileDescriptor"
//! field = "fd"
//! redirect_class = "RedirectPipe"
//! redirect_field = "fd"
//!
//! [console]
//! input_batch = 32
//! ```
//!
//! Every section and key is optional.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::error::Result;
use crate::managed::types;

/// Records requested per console input read when nothing else is set.
pub const DEFAULT_INPUT_BATCH: usize = 32;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub log: LogConfig,
    pub descriptor: DescriptorConfig,
    pub console: ConsoleConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `error`, `warn`, `info`, `debug` or `trace`
    pub level: String,
    /// Log file; stderr when unset
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LogConfig {
    /// Parsed level, `INFO` when the name is not recognised.
    pub fn max_level(&self) -> Level {
        self.level.parse().unwrap_or(Level::INFO)
    }
}

/// Managed types the descriptor bridge constructs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorConfig {
    /// Descriptor class
    pub class: String,
    /// Int field holding the raw descriptor
    pub field: String,
    /// Redirect-pipe class
    pub redirect_class: String,
    /// Field of the redirect class holding the descriptor object
    pub redirect_field: String,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            class: types::FILE_DESCRIPTOR.to_string(),
            field: "fd".to_string(),
            redirect_class: types::REDIRECT_PIPE.to_string(),
            redirect_field: "fd".to_string(),
        }
    }
}

/// Console input settings (Windows)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Records per batched console read
    pub input_batch: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            input_batch: DEFAULT_INPUT_BATCH,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from the default location, falling back to
    /// defaults when the file is missing or unreadable.
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                if let Ok(config) = Self::load_from(&path) {
                    return config;
                }
            }
        }
        Self::default()
    }

    /// Load configuration from `path`, reporting I/O and parse errors.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get config file path
    pub fn config_path() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".termbridge").join("config.toml"))
    }
}

/// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::error::BridgeError;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.log.max_level(), Level::INFO);
        assert_eq!(config.log.file, None);
        assert_eq!(config.descriptor.class, "FileDescriptor");
        assert_eq!(config.descriptor.redirect_class, "RedirectPipe");
        assert_eq!(config.console.input_batch, DEFAULT_INPUT_BATCH);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = BridgeConfig::parse(
            r#"
            [log]
            level = "trace"

            [console]
            input_batch = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.log.max_level(), Level::TRACE);
        assert_eq!(config.console.input_batch, 8);
        assert_eq!(config.descriptor, DescriptorConfig::default());
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let config = BridgeConfig::parse("[log]\nlevel = \"loud\"\n").unwrap();
        assert_eq!(config.log.max_level(), Level::INFO);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[descriptor]\nclass = \"java.io.FileDescriptor\"\n\
             redirect_class = \"ProcessBuilder$RedirectPipeImpl\""
        )
        .unwrap();

        let config = BridgeConfig::load_from(file.path()).unwrap();
        assert_eq!(config.descriptor.class, "java.io.FileDescriptor");
        assert_eq!(config.descriptor.field, "fd");
        assert_eq!(config.descriptor.redirect_class, "ProcessBuilder$RedirectPipeImpl");
    }

    #[test]
    fn test_load_from_reports_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[console]\ninput_batch = \"many\"").unwrap();
        assert!(matches!(
            BridgeConfig::load_from(file.path()),
            Err(BridgeError::Config(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            BridgeConfig::load_from(&dir.path().join("missing.toml")),
            Err(BridgeError::Io(_))
        ));
    }
}
