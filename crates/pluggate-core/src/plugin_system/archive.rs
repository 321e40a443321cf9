//! # Plugin Archive Access
//!
//! Plugin archives are read through the [`ArchiveReader`] capability so the
//! descriptor code never binds to one container format. [`ZipArchiveReader`]
//! is the implementation used in practice.
//!
//! Entry paths are `/`-separated and relative to the archive root; a leading
//! `/` is accepted and ignored, so `/plugin.json` and `plugin.json` name the
//! same entry.
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use globset::GlobMatcher;
use log::debug;
use thiserror::Error;
use zip::ZipArchive;

/// Errors raised while opening or reading an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Entry '{0}' is not valid UTF-8 text")]
    NotUtf8(String),
}

/// Opens container files as read-only virtual filesystems.
pub trait ArchiveReader: Send + Sync {
    /// Opens the archive at `path`.
    fn open(&self, path: &Path) -> Result<Box<dyn ArchiveHandle>, ArchiveError>;
}

/// An open archive. Dropping the handle releases the underlying file.
pub trait ArchiveHandle {
    /// True when `entry` names a regular file in the archive.
    fn exists(&mut self, entry: &str) -> bool;

    /// Reads a whole entry as UTF-8 text.
    fn read_all_text(&mut self, entry: &str) -> Result<String, ArchiveError>;

    /// Regular-file entries below `root` matching `pattern`, in archive order.
    fn walk(&mut self, root: &str, pattern: &GlobMatcher) -> Result<Vec<String>, ArchiveError>;

    /// Releases the handle.
    fn close(self: Box<Self>) {}
}

/// Upper bound on the buffer reserved up front for an entry.
pub(crate) const MAX_PREALLOCATED_TEXT: usize = 64 * 1024;

/// Initial buffer size for an entry whose header declares `declared` bytes.
/// The header is not trusted; larger entries grow the buffer as they are read.
pub(crate) fn text_capacity(declared: u64) -> usize {
    usize::try_from(declared).map_or(MAX_PREALLOCATED_TEXT, |size| size.min(MAX_PREALLOCATED_TEXT))
}

fn normalize(entry: &str) -> &str {
    entry.trim_start_matches('/')
}

fn is_below(name: &str, root: &str) -> bool {
    root.is_empty()
        || name
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// [`ArchiveReader`] for zip files.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipArchiveReader;

impl ZipArchiveReader {
    pub fn new() -> Self {
        Self
    }
}

impl ArchiveReader for ZipArchiveReader {
    fn open(&self, path: &Path) -> Result<Box<dyn ArchiveHandle>, ArchiveError> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(file)?;
        debug!("Opened archive {} ({} entries)", path.display(), archive.len());
        Ok(Box::new(ZipHandle { archive }))
    }
}

struct ZipHandle {
    archive: ZipArchive<File>,
}

impl ArchiveHandle for ZipHandle {
    fn exists(&mut self, entry: &str) -> bool {
        match self.archive.by_name(normalize(entry)) {
            Ok(file) => file.is_file(),
            Err(_) => false,
        }
    }

    fn read_all_text(&mut self, entry: &str) -> Result<String, ArchiveError> {
        let name = normalize(entry);
        let mut file = self.archive.by_name(name)?;
        let mut bytes = Vec::with_capacity(text_capacity(file.size()));
        file.read_to_end(&mut bytes)?;
        String::from_utf8(bytes).map_err(|_| ArchiveError::NotUtf8(name.to_string()))
    }

    fn walk(&mut self, root: &str, pattern: &GlobMatcher) -> Result<Vec<String>, ArchiveError> {
        let root = normalize(root).trim_end_matches('/');
        let mut found = Vec::new();
        for index in 0..self.archive.len() {
            // Raw access skips decompression; only the header is needed here.
            let file = self.archive.by_index_raw(index)?;
            if !file.is_file() {
                continue;
            }
            let name = file.name();
            if is_below(name, root) && pattern.is_match(name) {
                found.push(name.to_string());
            }
        }
        Ok(found)
    }
}
