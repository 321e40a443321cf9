//! # Plugin System
//!
//! This module turns plugin archives into validated descriptors and admits
//! them into a shared registry once their dependencies are satisfied.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`archive`]**: The [`ArchiveReader`] capability used to open plugin
//!   archives, and its zip implementation.
//! - **[`dependency`]**: [`PluginDependency`] values and their interning cache.
//! - **[`descriptor`]**: [`PluginDescriptor`], built from one archive's
//!   manifest plus a scan for embedded libraries.
//! - **[`error`]**: [`PluginSystemError`] and manifest validation errors.
//! - **[`manager`]**: [`PluginManager`], the async front end that runs
//!   admissions on a worker pool with optional timeouts.
//! - **[`manifest`]**: The `plugin.json` wire format ([`PluginManifest`]).
//! - **[`registry`]**: [`PluginRegistry`], the concurrent table of admitted
//!   plugins and the admission algorithm.
//! - **[`version`]**: npm-style version parsing and range matching.
pub mod archive;
pub mod dependency;
pub mod descriptor;
pub mod error;
pub mod manager;
pub mod manifest;
pub mod registry;
pub mod version;

pub use archive::{ArchiveHandle, ArchiveReader, ZipArchiveReader};
pub use dependency::{DependencyError, DependencyInterner, PluginDependency};
pub use descriptor::{ArchiveLayout, PluginDescriptor};
pub use error::PluginSystemError;
pub use manager::PluginManager;
pub use manifest::{ManifestBuilder, PluginManifest};
pub use registry::{Cancellation, PluginRegistry};
pub use version::{parse_version, satisfies, VersionError, VersionRange};

// Test module declaration
#[cfg(test)]
mod tests;
