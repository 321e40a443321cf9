//! # Plugin System Errors
//!
//! Defines error types specific to plugin admission.
//!
//! [`PluginSystemError`] classifies every way [`add_plugin`] can reject an
//! archive: unusable archive paths, archive I/O, missing or invalid
//! manifests, malformed ranges, self dependencies, duplicates and
//! unsatisfied dependencies. [`ManifestError`] carries the individual field
//! violations of a rejected `plugin.json`.
//!
//! [`add_plugin`]: crate::plugin_system::PluginRegistry::add_plugin
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use uuid::Uuid;

use crate::plugin_system::archive::ArchiveError;
use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::version::VersionError;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("Unable to use '{}' as a plugin archive: {reason}", .path.display())]
    InvalidArchive { path: PathBuf, reason: String },

    #[error("Unable to open the plugin archive '{}': {source}", .path.display())]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: ArchiveError,
    },

    #[error("Unable to read '{entry}' from the plugin archive '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        entry: String,
        #[source]
        source: ArchiveError,
    },

    #[error("The plugin archive '{}' has no '{entry}' at its root", .path.display())]
    MissingManifest { path: PathBuf, entry: String },

    #[error("Invalid plugin manifest in '{}': {source}", .path.display())]
    InvalidManifest {
        path: PathBuf,
        #[source]
        source: ManifestError,
    },

    #[error("The plugin '{plugin_name}' declares an invalid range for its dependency on {target_id}: {source}")]
    InvalidRange {
        plugin_name: String,
        target_id: Uuid,
        #[source]
        source: VersionError,
    },

    #[error("The plugin '{plugin_name}' ({plugin_id}) cannot have a dependency on itself")]
    SelfDependency { plugin_name: String, plugin_id: Uuid },

    #[error("The plugin {plugin_name} is already in the plugin list")]
    DuplicatePlugin { plugin_name: String, plugin_id: Uuid },

    #[error(transparent)]
    UnsatisfiedDependency(#[from] DependencyError),

    #[error("Admission of '{}' was cancelled", .path.display())]
    Cancelled { path: PathBuf },

    #[error("Admission of '{}' timed out after {timeout:?}", .path.display())]
    TimedOut { path: PathBuf, timeout: Duration },

    #[error("The admission worker for '{}' failed: {message}", .path.display())]
    WorkerFailed { path: PathBuf, message: String },
}

impl PluginSystemError {
    /// Whether retrying the same admission later can succeed without
    /// changing the archive.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PluginSystemError::UnsatisfiedDependency(_)
                | PluginSystemError::ArchiveOpen { .. }
                | PluginSystemError::Io { .. }
                | PluginSystemError::Cancelled { .. }
                | PluginSystemError::TimedOut { .. }
        )
    }

    /// The manifest fields at fault, for `InvalidManifest`.
    pub fn manifest_fields(&self) -> Vec<&str> {
        match self {
            PluginSystemError::InvalidManifest { source, .. } => source.fields(),
            _ => Vec::new(),
        }
    }
}

/// One violated manifest field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestViolation {
    pub field: String,
    pub message: String,
}

impl ManifestViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, "is required")
    }
}

impl fmt::Display for ManifestViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' {}", self.field, self.message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("{}", join_violations(.violations))]
    Invalid { violations: Vec<ManifestViolation> },
}

fn join_violations(violations: &[ManifestViolation]) -> String {
    let parts: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
    parts.join("; ")
}

impl ManifestError {
    /// Names of the offending fields; empty for malformed JSON.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            ManifestError::Malformed(_) => Vec::new(),
            ManifestError::Invalid { violations } => violations.iter().map(|v| v.field.as_str()).collect(),
        }
    }
}
