use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command; // Bring Command into scope
use predicates::prelude::*; // Bring predicate traits into scope
use tempfile::tempdir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const CORE_ID: &str = "6f1d2c1e-8a4b-4c4e-9d2a-1b2c3d4e5f60";
const ADDON_ID: &str = "0b7e4a52-3c1d-4f7a-8e6b-9a0c1d2e3f41";

fn write_plugin(dir: &Path, file_name: &str, manifest: &str, extra: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(file_name);
    let mut writer = ZipWriter::new(File::create(&path).unwrap());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    writer.start_file("plugin.json", options).unwrap();
    writer.write_all(manifest.as_bytes()).unwrap();
    for (name, contents) in extra {
        writer.start_file(*name, options).unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap();
    path
}

fn core_manifest(version: &str) -> String {
    format!(
        r#"{{"name":"Core Plugin","$id":"{}","license":"MIT","version":"{}","dependencies":[]}}"#,
        CORE_ID, version
    )
}

fn addon_manifest() -> String {
    format!(
        r#"{{"name":"Addon Plugin","$id":"{}","license":"MIT","version":"1.0.0","dependencies":[{{"$id":"{}","version":"^1.0.0"}}]}}"#,
        ADDON_ID, CORE_ID
    )
}

fn pluggate() -> Command {
    let mut cmd = Command::cargo_bin("pluggate").unwrap();
    cmd.env("RUST_LOG", "warn");
    cmd
}

#[test]
fn test_ping_command() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("pluggate")?;
    cmd.arg("--ping");
    cmd.assert().success().stdout(predicate::str::contains("pong"));
    Ok(())
}

#[test]
fn test_no_command_fails_with_help() {
    pluggate()
        .assert()
        .failure()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("pong").not());
}

#[test]
fn test_install_core_then_addon() {
    let dir = tempdir().unwrap();
    let core = write_plugin(dir.path(), "core.zip", &core_manifest("1.0.0"), &[]);
    let addon = write_plugin(dir.path(), "addon.zip", &addon_manifest(), &[]);

    pluggate()
        .arg("install")
        .arg(&core)
        .arg(&addon)
        .assert()
        .success()
        .stdout(predicate::str::contains("installed Core Plugin 1.0.0"))
        .stdout(predicate::str::contains("installed Addon Plugin 1.0.0"))
        .stdout(predicate::str::contains("2 of 2 plugins installed"));
}

#[test]
fn test_install_reports_duplicates_and_missing_dependencies() {
    let dir = tempdir().unwrap();
    let core = write_plugin(dir.path(), "core.zip", &core_manifest("1.0.0"), &[]);
    let addon = write_plugin(dir.path(), "addon.zip", &addon_manifest(), &[]);

    pluggate()
        .arg("install")
        .arg(&addon)
        .arg(&core)
        .arg(&core)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not installed"))
        .stderr(predicate::str::contains("The plugin Core Plugin is already in the plugin list"))
        .stdout(predicate::str::contains("1 of 3 plugins installed"));
}

#[test]
fn test_install_directory_in_sorted_order() {
    let dir = tempdir().unwrap();
    // "a-core" sorts before "b-addon", so the dependency is installed first
    write_plugin(dir.path(), "a-core.zip", &core_manifest("1.4.2"), &[]);
    write_plugin(dir.path(), "b-addon.zip", &addon_manifest(), &[]);
    fs::write(dir.path().join("notes.txt"), "not an archive").unwrap();

    pluggate()
        .arg("install")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("2 of 2 plugins installed"));
}

#[test]
fn test_install_incompatible_version_fails() {
    let dir = tempdir().unwrap();
    let core = write_plugin(dir.path(), "core.zip", &core_manifest("2.0.0"), &[]);
    let addon = write_plugin(dir.path(), "addon.zip", &addon_manifest(), &[]);

    pluggate()
        .args(["install"])
        .arg(&core)
        .arg(&addon)
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not satisfy '^1.0.0'"));
}

#[test]
fn test_install_missing_file_fails() {
    let dir = tempdir().unwrap();
    pluggate()
        .arg("install")
        .arg(dir.path().join("absent.zip"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_inspect_prints_descriptor_json() {
    let dir = tempdir().unwrap();
    let core = write_plugin(
        dir.path(),
        "core.zip",
        &core_manifest("1.0.0"),
        &[("lib/a.jar", b"a"), ("lib/b.jar", b"b"), ("lib/readme.txt", b"r")],
    );

    let output = pluggate().arg("inspect").arg(&core).output().unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["$id"], CORE_ID);
    assert_eq!(value["name"], "Core Plugin");
    assert_eq!(value["embedded_libraries"], serde_json::json!(["lib/a.jar", "lib/b.jar"]));
}

#[test]
fn test_inspect_reports_invalid_manifest() {
    let dir = tempdir().unwrap();
    let bad = write_plugin(
        dir.path(),
        "bad.zip",
        r#"{"name":"Bad","$id":"nope","license":"MIT","version":"1.0.0"}"#,
        &[],
    );
    pluggate()
        .arg("inspect")
        .arg(&bad)
        .assert()
        .failure()
        .stderr(predicate::str::contains("'$id' not a valid UUID"))
        .stderr(predicate::str::contains("'name' must be at least 5 characters long"));
}

#[test]
fn test_config_file_changes_the_layout() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("pluggate.toml");
    fs::write(&config, "archive_extension = \"plug\"\nlibrary_glob = \"native/*.so\"\n").unwrap();
    let plugin = write_plugin(
        dir.path(),
        "core.plug",
        &core_manifest("1.0.0"),
        &[("native/libcore.so", b"so"), ("lib/core.jar", b"jar")],
    );

    let output = pluggate()
        .arg("--config")
        .arg(&config)
        .arg("inspect")
        .arg(&plugin)
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["embedded_libraries"], serde_json::json!(["native/libcore.so"]));

    let zip = write_plugin(dir.path(), "core.zip", &core_manifest("1.0.0"), &[]);
    pluggate()
        .arg("--config")
        .arg(&config)
        .arg("install")
        .arg(&zip)
        .assert()
        .failure()
        .stderr(predicate::str::contains("'.plug'"));
}

#[test]
fn test_unreadable_config_fails() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("pluggate.ini");
    fs::write(&config, "whatever").unwrap();
    pluggate()
        .arg("--config")
        .arg(&config)
        .arg("install")
        .arg(dir.path())
        .assert()
        .failure();
}

#[test]
fn test_install_rejects_zero_timeout() {
    let dir = tempdir().unwrap();
    let core = write_plugin(dir.path(), "core.zip", &core_manifest("1.0.0"), &[]);

    pluggate()
        .arg("install")
        .arg("--timeout-ms")
        .arg("0")
        .arg(&core)
        .assert()
        .failure()
        .stdout(predicate::str::contains("installed").not())
        .stderr(predicate::str::contains("--timeout-ms"));
}

#[cfg(unix)]
#[test]
fn test_install_directory_with_symlink_loop() {
    let dir = tempdir().unwrap();
    let plugins = dir.path().join("plugins");
    fs::create_dir(&plugins).unwrap();
    write_plugin(&plugins, "core.zip", &core_manifest("1.0.0"), &[]);
    std::os::unix::fs::symlink(&plugins, plugins.join("loop")).unwrap();

    pluggate()
        .arg("install")
        .arg(&plugins)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 of 1 plugins installed"));
}
