use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use log::{info, warn};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::config::{ConfigError, RegistryConfig};
use crate::plugin_system::archive::{ArchiveReader, ZipArchiveReader};
use crate::plugin_system::dependency::{DependencyError, DependencyInterner};
use crate::plugin_system::descriptor::{ArchiveLayout, PluginDescriptor};
use crate::plugin_system::error::PluginSystemError;

const PENDING: u8 = 0;
const COMMITTED: u8 = 1;
const CANCELLED: u8 = 2;

/// Settles, exactly once, whether an in-flight admission commits or is
/// abandoned.
///
/// The admitting thread calls [`try_commit`](Self::try_commit) while holding
/// the registry write lock, right before inserting. A caller that gives up
/// (for example on a timeout) calls [`try_cancel`](Self::try_cancel); only one
/// of the two can succeed.
#[derive(Debug, Default)]
pub struct Cancellation {
    state: AtomicU8,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_commit(&self) -> bool {
        self.state
            .compare_exchange(PENDING, COMMITTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn try_cancel(&self) -> bool {
        self.state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    pub fn is_committed(&self) -> bool {
        self.state.load(Ordering::Acquire) == COMMITTED
    }
}

/// The table of admitted plugins, keyed by plugin id.
///
/// Plugins are only ever added. Reads take short shared locks; admission
/// takes the exclusive lock only for the final insert-if-absent, which is
/// what decides uniqueness when two admissions of the same id race.
pub struct PluginRegistry {
    plugins: RwLock<HashMap<Uuid, Arc<PluginDescriptor>>>,
    reader: Arc<dyn ArchiveReader>,
    layout: ArchiveLayout,
    interner: DependencyInterner,
}

impl PluginRegistry {
    /// Create an empty registry reading zip archives with the default layout
    pub fn new() -> Self {
        Self::with_reader(Arc::new(ZipArchiveReader::new()), ArchiveLayout::default())
    }

    /// Create an empty registry with a specific archive reader and layout
    pub fn with_reader(reader: Arc<dyn ArchiveReader>, layout: ArchiveLayout) -> Self {
        Self {
            plugins: RwLock::new(HashMap::new()),
            reader,
            layout,
            interner: DependencyInterner::new(),
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_reader(Arc::new(ZipArchiveReader::new()), config.layout()?))
    }

    pub fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    pub fn reader(&self) -> &dyn ArchiveReader {
        self.reader.as_ref()
    }

    /// Read the archive at `path` into a descriptor without admitting it.
    pub fn load_descriptor(&self, path: &Path) -> Result<PluginDescriptor, PluginSystemError> {
        PluginDescriptor::load(path, self.reader.as_ref(), &self.layout, &self.interner)
    }

    /// Load the plugin archive at `path` and admit it.
    ///
    /// On any error the registry is left unchanged.
    pub fn add_plugin(&self, path: &Path) -> Result<Arc<PluginDescriptor>, PluginSystemError> {
        let result = self
            .load_descriptor(path)
            .and_then(|descriptor| self.try_admit(descriptor, None));
        log_rejection(path, result)
    }

    /// Like [`add_plugin`](Self::add_plugin), but gives up without touching
    /// the registry once `cancel` has been cancelled.
    pub fn add_plugin_cancellable(
        &self,
        path: &Path,
        cancel: &Cancellation,
    ) -> Result<Arc<PluginDescriptor>, PluginSystemError> {
        let cancelled = || PluginSystemError::Cancelled { path: path.to_path_buf() };
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        let result = self.load_descriptor(path).and_then(|descriptor| {
            if cancel.is_cancelled() {
                return Err(cancelled());
            }
            self.try_admit(descriptor, Some(cancel))
        });
        log_rejection(path, result)
    }

    /// Admit an already-built descriptor.
    pub fn admit(&self, descriptor: PluginDescriptor) -> Result<Arc<PluginDescriptor>, PluginSystemError> {
        let path = descriptor.archive_path().to_path_buf();
        log_rejection(&path, self.try_admit(descriptor, None))
    }

    fn try_admit(
        &self,
        descriptor: PluginDescriptor,
        cancel: Option<&Cancellation>,
    ) -> Result<Arc<PluginDescriptor>, PluginSystemError> {
        let id = descriptor.id();

        if self.contains(&id) {
            return Err(duplicate(&descriptor));
        }
        self.check_dependencies(&descriptor)?;

        // The existence check above is advisory; this insert decides.
        let mut plugins = self.plugins.write();
        match plugins.entry(id) {
            Entry::Occupied(_) => Err(duplicate(&descriptor)),
            Entry::Vacant(slot) => {
                if let Some(cancel) = cancel {
                    if !cancel.try_commit() {
                        return Err(PluginSystemError::Cancelled {
                            path: descriptor.archive_path().to_path_buf(),
                        });
                    }
                }
                let descriptor = Arc::new(descriptor);
                slot.insert(Arc::clone(&descriptor));
                info!(
                    "Registered plugin '{}' ({}) version {}",
                    descriptor.name(),
                    descriptor.id(),
                    descriptor.version_string()
                );
                Ok(descriptor)
            }
        }
    }

    /// Checks every declared dependency in order, stopping at the first failure.
    ///
    /// Lookups do not hold the registry lock across the loop, so a missing
    /// dependency may be admitted concurrently; such a failure is retryable.
    fn check_dependencies(&self, descriptor: &PluginDescriptor) -> Result<(), PluginSystemError> {
        for dependency in descriptor.dependencies() {
            let target_id = dependency.target_id();
            if target_id == descriptor.id() {
                return Err(PluginSystemError::SelfDependency {
                    plugin_name: descriptor.name().to_string(),
                    plugin_id: descriptor.id(),
                });
            }

            let installed = self.get(&target_id).ok_or_else(|| DependencyError::MissingPlugin {
                plugin_name: descriptor.name().to_string(),
                target_id,
            })?;

            let satisfied = dependency
                .is_satisfied_by(installed.parsed_version())
                .map_err(|source| PluginSystemError::InvalidRange {
                    plugin_name: descriptor.name().to_string(),
                    target_id,
                    source,
                })?;
            if !satisfied {
                return Err(DependencyError::IncompatibleVersion {
                    plugin_name: descriptor.name().to_string(),
                    target_id,
                    target_name: installed.name().to_string(),
                    installed_version: installed.version_string().to_string(),
                    required_range: dependency.version_range().to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Check if a plugin is registered by ID
    pub fn contains(&self, id: &Uuid) -> bool {
        self.plugins.read().contains_key(id)
    }

    /// Get a registered plugin by ID
    pub fn get(&self, id: &Uuid) -> Option<Arc<PluginDescriptor>> {
        self.plugins.read().get(id).cloned()
    }

    /// Snapshot of all registered plugins, sorted by name then id
    pub fn plugins(&self) -> Vec<Arc<PluginDescriptor>> {
        let mut plugins: Vec<_> = self.plugins.read().values().cloned().collect();
        plugins.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id().cmp(&b.id())));
        plugins
    }

    pub fn len(&self) -> usize {
        self.plugins.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.read().is_empty()
    }
}

fn log_rejection(
    path: &Path,
    result: Result<Arc<PluginDescriptor>, PluginSystemError>,
) -> Result<Arc<PluginDescriptor>, PluginSystemError> {
    if let Err(e) = &result {
        warn!("Rejected plugin archive {}: {}", path.display(), e);
    }
    result
}

fn duplicate(descriptor: &PluginDescriptor) -> PluginSystemError {
    PluginSystemError::DuplicatePlugin {
        plugin_name: descriptor.name().to_string(),
        plugin_id: descriptor.id(),
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.len())
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}
