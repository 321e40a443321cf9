//! # Registry Configuration
//!
//! [`RegistryConfig`] holds the few knobs of plugin admission: the archive
//! extension, the manifest entry name, the embedded-library glob and an
//! optional install timeout. It can be read from JSON, TOML
//! (`toml-config` feature) or YAML (`yaml-config` feature) files; the format
//! follows the file extension. Every field has a default, so an empty
//! document is a valid configuration.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DEFAULT_ARCHIVE_EXTENSION, DEFAULT_LIBRARY_GLOB, MANIFEST_ENTRY};
use crate::plugin_system::descriptor::ArchiveLayout;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read configuration file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported configuration format for '{}'", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("Deserialization from '{format}' failed: {message}")]
    Deserialization { format: &'static str, message: String },

    #[error("Invalid library glob '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: &'static str, message: String },
}

/// Settings for plugin admission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Extension plugin archives must carry (without the dot)
    pub archive_extension: String,
    /// Manifest entry at the archive root
    pub manifest_entry: String,
    /// Glob selecting embedded library entries
    pub library_glob: String,
    /// Upper bound for a single install, in milliseconds
    pub install_timeout_ms: Option<u64>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            archive_extension: DEFAULT_ARCHIVE_EXTENSION.to_string(),
            manifest_entry: MANIFEST_ENTRY.to_string(),
            library_glob: DEFAULT_LIBRARY_GLOB.to_string(),
            install_timeout_ms: None,
        }
    }
}

impl RegistryConfig {
    /// Load configuration from a file, picking the format by extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse_str(&data, format)?;
        config.validate()?;
        Ok(config)
    }

    /// Deserialize from string based on format
    pub fn parse_str(data: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let failed = |message: String| ConfigError::Deserialization {
            format: format.extension(),
            message,
        };
        match format {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| failed(e.to_string())),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| failed(e.to_string())),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| failed(e.to_string())),
        }
    }

    /// Reject values that cannot describe an archive layout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.archive_extension.trim_start_matches('.').is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "archive_extension",
                message: "must not be empty".to_string(),
            });
        }
        if self.manifest_entry.trim_start_matches('/').is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "manifest_entry",
                message: "must not be empty".to_string(),
            });
        }
        if self.install_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "install_timeout_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// The archive layout these settings describe.
    pub fn layout(&self) -> Result<ArchiveLayout, ConfigError> {
        self.validate()?;
        ArchiveLayout::new(&self.archive_extension, &self.manifest_entry, &self.library_glob).map_err(|source| {
            ConfigError::InvalidGlob {
                pattern: self.library_glob.clone(),
                source,
            }
        })
    }

    pub fn install_timeout(&self) -> Option<Duration> {
        self.install_timeout_ms.map(Duration::from_millis)
    }
}
