use std::fmt;
use std::sync::Arc;

use semver::Version;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::plugin_system::version::{VersionError, VersionRange};
use crate::utils::Memoizer;

/// Represents a dependency on another plugin.
///
/// A dependency is a plain value: two dependencies with the same target and
/// range compare equal whether or not they are the same instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PluginDependency {
    /// The id of the required plugin
    #[serde(rename = "$id")]
    target_id: Uuid,

    /// The npm-style range the installed version must satisfy
    #[serde(rename = "version")]
    version_range: String,
}

/// Why a dependency is not satisfied by the current registry contents.
///
/// Both cases are recoverable: installing the missing or a compatible plugin
/// and retrying can succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    /// The required plugin was not found
    #[error("Unable to satisfy the dependency on {target_id} of the plugin '{plugin_name}': not installed")]
    MissingPlugin { plugin_name: String, target_id: Uuid },

    /// The plugin was found, but the version is incompatible
    #[error(
        "Unable to satisfy the dependency on '{target_name}' ({target_id}) of the plugin '{plugin_name}': \
         installed version {installed_version} does not satisfy '{required_range}'"
    )]
    IncompatibleVersion {
        plugin_name: String,
        target_id: Uuid,
        target_name: String,
        installed_version: String,
        required_range: String,
    },
}

impl DependencyError {
    /// The id of the plugin that could not satisfy the dependency.
    pub fn target_id(&self) -> Uuid {
        match self {
            DependencyError::MissingPlugin { target_id, .. } => *target_id,
            DependencyError::IncompatibleVersion { target_id, .. } => *target_id,
        }
    }
}

impl PluginDependency {
    /// Create a dependency on `target_id` restricted to `version_range`
    pub fn new(target_id: Uuid, version_range: impl Into<String>) -> Self {
        Self {
            target_id,
            version_range: version_range.into(),
        }
    }

    pub fn target_id(&self) -> Uuid {
        self.target_id
    }

    /// The range exactly as declared in the manifest.
    pub fn version_range(&self) -> &str {
        &self.version_range
    }

    /// Parses the declared range.
    pub fn range(&self) -> Result<VersionRange, VersionError> {
        VersionRange::from_constraint(&self.version_range)
    }

    /// Check if this dependency accepts the given installed version
    pub fn is_satisfied_by(&self, version: &Version) -> Result<bool, VersionError> {
        Ok(self.range()?.includes(version))
    }
}

impl fmt::Display for PluginDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{\"id\":\"{}\",\"version\":\"{}\"}}", self.target_id, self.version_range)
    }
}

/// Hands out shared [`PluginDependency`] instances, one per distinct
/// `(target, range)` pair.
///
/// Re-parsing the same manifests (batch installs, retries) then reuses the
/// same allocations. Nothing relies on identity; equality is structural.
#[derive(Debug, Default)]
pub struct DependencyInterner {
    cache: Memoizer<(Uuid, String), Arc<PluginDependency>>,
}

impl DependencyInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, target_id: Uuid, version_range: &str) -> Arc<PluginDependency> {
        self.cache
            .get_or_compute((target_id, version_range.to_string()), |(id, range)| {
                Arc::new(PluginDependency::new(*id, range.clone()))
            })
    }

    /// Number of distinct dependencies seen so far.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
