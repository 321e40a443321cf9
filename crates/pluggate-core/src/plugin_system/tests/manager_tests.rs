#![cfg(test)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;

use crate::config::RegistryConfig;
use crate::plugin_system::archive::{ArchiveError, ArchiveHandle, ArchiveReader, ZipArchiveReader};
use crate::plugin_system::descriptor::ArchiveLayout;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::manager::PluginManager;
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::tests::fixtures::{manifest, write_addon, write_core, write_plugin, ADDON_ID, CORE_ID};

/// Opens zip archives after a fixed delay.
struct SlowReader {
    delay: Duration,
}

impl ArchiveReader for SlowReader {
    fn open(&self, path: &Path) -> Result<Box<dyn ArchiveHandle>, ArchiveError> {
        std::thread::sleep(self.delay);
        ZipArchiveReader::new().open(path)
    }
}

fn slow_manager(delay: Duration, timeout: Duration) -> PluginManager {
    let registry = PluginRegistry::with_reader(Arc::new(SlowReader { delay }), ArchiveLayout::default());
    PluginManager::new(Arc::new(registry)).with_timeout(timeout)
}

#[tokio::test]
async fn test_install_single_plugin() {
    let dir = tempdir().unwrap();
    let manager = PluginManager::new(Arc::new(PluginRegistry::new()));
    assert!(manager.timeout().is_none());

    let descriptor = manager.install(write_core(dir.path())).await.unwrap();
    assert_eq!(descriptor.id(), CORE_ID);
    assert!(manager.registry().contains(&CORE_ID));
}

#[tokio::test]
async fn test_install_in_order_respects_dependencies() {
    let dir = tempdir().unwrap();
    let manager = PluginManager::new(Arc::new(PluginRegistry::new()));
    let core = write_core(dir.path());
    let addon = write_addon(dir.path());

    let results = manager.install_in_order([addon.clone(), core.clone(), addon.clone()]).await;
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].0, addon);
    assert!(matches!(
        results[0].1,
        Err(PluginSystemError::UnsatisfiedDependency(_))
    ));
    assert!(results[1].1.is_ok());
    assert!(results[2].1.is_ok());
    assert_eq!(manager.registry().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_install_all_keeps_input_order() {
    let dir = tempdir().unwrap();
    let manager = PluginManager::new(Arc::new(PluginRegistry::new()));
    let paths: Vec<_> = (0..6u128)
        .map(|i| {
            write_plugin(
                dir.path(),
                &format!("bulk{}.zip", i),
                &manifest(uuid::Uuid::from_u128(2000 + i), &format!("Bulk Plugin {}", i), "1.0.0", &[]),
                &[],
            )
        })
        .collect();

    let results = manager.install_all(paths.clone()).await;
    let returned: Vec<_> = results.iter().map(|(path, _)| path.clone()).collect();
    assert_eq!(returned, paths);
    assert!(results.iter().all(|(_, result)| result.is_ok()));
    assert_eq!(manager.registry().len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_install_all_same_archive_admits_once() {
    let dir = tempdir().unwrap();
    let manager = PluginManager::new(Arc::new(PluginRegistry::new()));
    let core = write_core(dir.path());

    let results = manager.install_all(vec![core.clone(); 5]).await;
    let admitted = results.iter().filter(|(_, r)| r.is_ok()).count();
    assert_eq!(admitted, 1);
    assert!(results
        .iter()
        .filter_map(|(_, r)| r.as_ref().err())
        .all(|e| matches!(e, PluginSystemError::DuplicatePlugin { .. })));
    assert_eq!(manager.registry().len(), 1);
}

#[tokio::test]
async fn test_timed_out_install_is_never_admitted() {
    let dir = tempdir().unwrap();
    let manager = slow_manager(Duration::from_millis(300), Duration::from_millis(20));

    let err = manager.install(write_core(dir.path())).await.unwrap_err();
    match &err {
        PluginSystemError::TimedOut { timeout, .. } => assert_eq!(*timeout, Duration::from_millis(20)),
        other => panic!("Expected TimedOut, got {:?}", other),
    }
    assert!(err.is_retryable());

    // Give the abandoned worker time to finish; it must not insert.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!manager.registry().contains(&CORE_ID));
    assert!(manager.registry().is_empty());
}

#[tokio::test]
async fn test_install_within_timeout() {
    let dir = tempdir().unwrap();
    let manager = slow_manager(Duration::from_millis(1), Duration::from_secs(10));
    assert_eq!(manager.timeout(), Some(Duration::from_secs(10)));

    manager.install(write_core(dir.path())).await.unwrap();
    manager.install(write_addon(dir.path())).await.unwrap();
    assert!(manager.registry().contains(&ADDON_ID));
}

#[tokio::test]
async fn test_manager_from_config() {
    let config = RegistryConfig {
        install_timeout_ms: Some(1500),
        ..RegistryConfig::default()
    };
    let manager = PluginManager::from_config(&config).unwrap();
    assert_eq!(manager.timeout(), Some(Duration::from_millis(1500)));

    let dir = tempdir().unwrap();
    manager.install(write_core(dir.path())).await.unwrap();
    assert_eq!(manager.registry().len(), 1);
}
