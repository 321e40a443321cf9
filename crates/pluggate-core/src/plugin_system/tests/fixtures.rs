//! Helpers that write plugin archives for tests.
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::json;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const CORE_ID: Uuid = Uuid::from_u128(0x6f1d2c1e_8a4b_4c4e_9d2a_1b2c3d4e5f60);
pub const ADDON_ID: Uuid = Uuid::from_u128(0x0b7e4a52_3c1d_4f7a_8e6b_9a0c1d2e3f41);
pub const EXTRA_ID: Uuid = Uuid::from_u128(0x9c3a8f10_2b4d_4e6f_a1b2_c3d4e5f60718);

/// Write a zip archive; names ending in `/` become directory entries.
pub fn write_archive(dir: &Path, file_name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(file_name);
    let file = File::create(&path).expect("Failed to create archive file");
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, contents) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).expect("Failed to add directory");
        } else {
            writer.start_file(*name, options).expect("Failed to start entry");
            writer.write_all(contents).expect("Failed to write entry");
        }
    }
    writer.finish().expect("Failed to finish archive");
    path
}

/// Manifest JSON with an MIT license.
pub fn manifest(id: Uuid, name: &str, version: &str, deps: &[(Uuid, &str)]) -> String {
    let deps: Vec<_> = deps
        .iter()
        .map(|(target, range)| json!({ "$id": target.to_string(), "version": range }))
        .collect();
    json!({
        "name": name,
        "$id": id.to_string(),
        "description": format!("{} for tests", name),
        "license": "MIT",
        "version": version,
        "dependencies": deps,
    })
    .to_string()
}

/// Write an archive holding `plugin.json` plus `extra` entries.
pub fn write_plugin(dir: &Path, file_name: &str, manifest: &str, extra: &[(&str, &[u8])]) -> PathBuf {
    let mut entries: Vec<(&str, &[u8])> = vec![("plugin.json", manifest.as_bytes())];
    entries.extend_from_slice(extra);
    write_archive(dir, file_name, &entries)
}

/// The `core.zip` plugin: "Core Plugin" 1.0.0 without dependencies.
pub fn write_core(dir: &Path) -> PathBuf {
    write_plugin(dir, "core.zip", &manifest(CORE_ID, "Core Plugin", "1.0.0", &[]), &[])
}

/// The `addon.zip` plugin: "Addon Plugin" 1.0.0 depending on core `^1.0.0`.
pub fn write_addon(dir: &Path) -> PathBuf {
    write_plugin(
        dir,
        "addon.zip",
        &manifest(ADDON_ID, "Addon Plugin", "1.0.0", &[(CORE_ID, "^1.0.0")]),
        &[],
    )
}
