//! # Plugin Descriptors
//!
//! A [`PluginDescriptor`] is the validated, immutable record of one plugin
//! archive: the manifest fields, the parsed version, where the archive lives
//! and which embedded libraries it carries.
//!
//! Loading a descriptor goes through these steps, holding the archive open
//! only for their duration:
//!
//! 1. check the path names an existing regular file with the archive extension,
//! 2. open the archive,
//! 3. require the manifest entry at the archive root and read it,
//! 4. deserialize and validate the manifest,
//! 5. scan the archive for embedded libraries,
//! 6. parse the declared version.
//!
//! Embedded libraries are derived from the archive, never from the manifest,
//! and are only scanned when a descriptor is built; later changes to the
//! file on disk are not reflected.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{GlobBuilder, GlobMatcher};
use log::debug;
use semver::Version;
use serde::Serialize;
use uuid::Uuid;

use crate::constants::{DEFAULT_ARCHIVE_EXTENSION, DEFAULT_LIBRARY_GLOB, MANIFEST_ENTRY};
use crate::plugin_system::archive::{ArchiveHandle, ArchiveReader};
use crate::plugin_system::dependency::{DependencyInterner, PluginDependency};
use crate::plugin_system::error::{ManifestError, ManifestViolation, PluginSystemError};
use crate::plugin_system::manifest::PluginManifest;
use crate::plugin_system::version::parse_version;
use crate::utils::fs::check_plugin_archive;

/// Where things live inside (and on) a plugin archive.
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    /// File extension plugin archives must carry, without the dot
    pub extension: String,
    /// Manifest entry at the archive root
    pub manifest_entry: String,
    /// Matches embedded library entries
    pub library_matcher: GlobMatcher,
}

impl ArchiveLayout {
    pub fn new(extension: &str, manifest_entry: &str, library_glob: &str) -> Result<Self, globset::Error> {
        Ok(Self {
            extension: extension.trim_start_matches('.').to_string(),
            manifest_entry: manifest_entry.trim_start_matches('/').to_string(),
            library_matcher: compile_library_glob(library_glob)?,
        })
    }
}

impl Default for ArchiveLayout {
    fn default() -> Self {
        Self {
            extension: DEFAULT_ARCHIVE_EXTENSION.to_string(),
            manifest_entry: MANIFEST_ENTRY.to_string(),
            library_matcher: compile_library_glob(DEFAULT_LIBRARY_GLOB).expect("default library glob is valid"),
        }
    }
}

/// Compiles a library glob. `*` never matches across `/`, `**` does.
pub fn compile_library_glob(pattern: &str) -> Result<GlobMatcher, globset::Error> {
    Ok(GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()?
        .compile_matcher())
}

/// Full metadata of one plugin archive
#[derive(Debug, Clone, Serialize)]
pub struct PluginDescriptor {
    #[serde(flatten)]
    manifest: PluginManifest,
    #[serde(skip)]
    parsed_version: Version,
    archive_path: PathBuf,
    embedded_libraries: Vec<String>,
}

impl PartialEq for PluginDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.manifest == other.manifest
            && self.archive_path == other.archive_path
            && self.embedded_libraries == other.embedded_libraries
    }
}

impl PluginDescriptor {
    /// Build a descriptor from the archive at `path`.
    pub fn load(
        path: &Path,
        reader: &dyn ArchiveReader,
        layout: &ArchiveLayout,
        interner: &DependencyInterner,
    ) -> Result<Self, PluginSystemError> {
        let mut handle = open_archive(path, reader, layout)?;
        let entry = layout.manifest_entry.as_str();

        if !handle.exists(entry) {
            return Err(PluginSystemError::MissingManifest {
                path: path.to_path_buf(),
                entry: entry.to_string(),
            });
        }
        let text = handle.read_all_text(entry).map_err(|source| PluginSystemError::Io {
            path: path.to_path_buf(),
            entry: entry.to_string(),
            source,
        })?;
        let manifest = PluginManifest::from_json(&text, interner).map_err(|source| {
            PluginSystemError::InvalidManifest {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let embedded_libraries = scan_libraries(handle.as_mut(), path, layout)?;
        handle.close();

        Self::assemble(manifest, path.to_path_buf(), embedded_libraries)
    }

    /// Build a descriptor from manifest fields known up front, scanning the
    /// archive at `path` for embedded libraries.
    pub fn from_manifest(
        manifest: PluginManifest,
        path: &Path,
        reader: &dyn ArchiveReader,
        layout: &ArchiveLayout,
    ) -> Result<Self, PluginSystemError> {
        manifest.validate().map_err(|source| PluginSystemError::InvalidManifest {
            path: path.to_path_buf(),
            source,
        })?;
        let embedded_libraries = scan_archive(path, reader, layout)?;
        Self::assemble(manifest, path.to_path_buf(), embedded_libraries)
    }

    /// A copy of this descriptor for the archive at `path`.
    ///
    /// Manifest fields are kept; the library scan is redone against the new
    /// archive. `self` is left untouched.
    pub fn with_archive_path(
        &self,
        path: &Path,
        reader: &dyn ArchiveReader,
        layout: &ArchiveLayout,
    ) -> Result<Self, PluginSystemError> {
        let embedded_libraries = scan_archive(path, reader, layout)?;
        Ok(Self {
            manifest: self.manifest.clone(),
            parsed_version: self.parsed_version.clone(),
            archive_path: path.to_path_buf(),
            embedded_libraries,
        })
    }

    fn assemble(
        manifest: PluginManifest,
        archive_path: PathBuf,
        embedded_libraries: Vec<String>,
    ) -> Result<Self, PluginSystemError> {
        let parsed_version = parse_version(&manifest.version).map_err(|e| PluginSystemError::InvalidManifest {
            path: archive_path.clone(),
            source: ManifestError::Invalid {
                violations: vec![ManifestViolation::new("version", e.to_string())],
            },
        })?;
        Ok(Self {
            manifest,
            parsed_version,
            archive_path,
            embedded_libraries,
        })
    }

    pub fn id(&self) -> Uuid {
        self.manifest.id
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn description(&self) -> Option<&str> {
        self.manifest.description.as_deref()
    }

    pub fn license(&self) -> &str {
        &self.manifest.license
    }

    /// The version exactly as declared in the manifest.
    pub fn version_string(&self) -> &str {
        &self.manifest.version
    }

    pub fn parsed_version(&self) -> &Version {
        &self.parsed_version
    }

    pub fn dependencies(&self) -> &[Arc<PluginDependency>] {
        &self.manifest.dependencies
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// In-archive paths of embedded libraries, in archive order.
    pub fn embedded_library_paths(&self) -> &[String] {
        &self.embedded_libraries
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }
}

fn open_archive(
    path: &Path,
    reader: &dyn ArchiveReader,
    layout: &ArchiveLayout,
) -> Result<Box<dyn ArchiveHandle>, PluginSystemError> {
    check_plugin_archive(path, &layout.extension).map_err(|problem| PluginSystemError::InvalidArchive {
        path: path.to_path_buf(),
        reason: problem.describe(&layout.extension),
    })?;
    reader.open(path).map_err(|source| PluginSystemError::ArchiveOpen {
        path: path.to_path_buf(),
        source,
    })
}

fn scan_archive(path: &Path, reader: &dyn ArchiveReader, layout: &ArchiveLayout) -> Result<Vec<String>, PluginSystemError> {
    let mut handle = open_archive(path, reader, layout)?;
    let libraries = scan_libraries(handle.as_mut(), path, layout)?;
    handle.close();
    Ok(libraries)
}

fn scan_libraries(
    handle: &mut dyn ArchiveHandle,
    path: &Path,
    layout: &ArchiveLayout,
) -> Result<Vec<String>, PluginSystemError> {
    let libraries = handle
        .walk("/", &layout.library_matcher)
        .map_err(|source| PluginSystemError::Io {
            path: path.to_path_buf(),
            entry: "/".to_string(),
            source,
        })?;
    debug!("Found {} embedded libraries in {}", libraries.len(), path.display());
    Ok(libraries)
}
