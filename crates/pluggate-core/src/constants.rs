/// Application name
pub const APP_NAME: &str = "pluggate";

/// Extension plugin archives must carry
pub const DEFAULT_ARCHIVE_EXTENSION: &str = "zip";

/// Manifest entry at the archive root
pub const MANIFEST_ENTRY: &str = "plugin.json";

/// Embedded libraries discovered inside an archive
pub const DEFAULT_LIBRARY_GLOB: &str = "**/*.jar";

/// Minimum length of a plugin display name
pub const MIN_NAME_LEN: usize = 5;

/// Minimum length of an SPDX license id
pub const MIN_LICENSE_LEN: usize = 2;
