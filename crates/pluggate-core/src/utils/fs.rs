use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Why a path cannot be used as a plugin archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchivePathProblem {
    Missing,
    NotRegularFile,
    WrongExtension,
}

impl ArchivePathProblem {
    pub fn describe(&self, extension: &str) -> String {
        match self {
            ArchivePathProblem::Missing => "the file does not exist".to_string(),
            ArchivePathProblem::NotRegularFile => "not a regular file".to_string(),
            ArchivePathProblem::WrongExtension => format!("the file name does not end with '.{}'", extension),
        }
    }
}

/// Check that `path` is an existing regular file ending in `.{extension}`.
///
/// The extension comparison ignores ASCII case.
pub fn check_plugin_archive(path: &Path, extension: &str) -> Result<(), ArchivePathProblem> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ArchivePathProblem::Missing),
        Err(_) => return Err(ArchivePathProblem::NotRegularFile),
    };
    if !metadata.is_file() {
        return Err(ArchivePathProblem::NotRegularFile);
    }
    let matches = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
    if matches {
        Ok(())
    } else {
        Err(ArchivePathProblem::WrongExtension)
    }
}

/// Find files recursively in a directory that match a predicate.
///
/// Symlinked directories are not descended into; symlinked files are still
/// offered to the predicate.
pub fn find_files<P, F>(path: P, predicate: &F) -> io::Result<Vec<PathBuf>>
where
    P: AsRef<Path>,
    F: Fn(&Path) -> bool + ?Sized,
{
    let mut result = Vec::new();

    if !path.as_ref().exists() {
        return Ok(result);
    }

    for entry in WalkDir::new(path.as_ref()).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_dir() {
            continue;
        }
        if predicate(entry.path()) {
            result.push(entry.into_path());
        }
    }

    Ok(result)
}

/// Find plugin archives below `dir`, sorted by path so batch installs are reproducible.
pub fn find_plugin_archives<P: AsRef<Path>>(dir: P, extension: &str) -> io::Result<Vec<PathBuf>> {
    let mut archives = find_files(dir, &|p: &Path| check_plugin_archive(p, extension).is_ok())?;
    archives.sort();
    Ok(archives)
}
