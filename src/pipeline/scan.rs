//! Batch scanner: list the regular files directly inside a directory.

use crate::error::PipelineError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A regular file found by [`scan_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub name: String,
}

/// List regular files in `dir` (non-recursive), sorted by name.
///
/// Symlinks count when they point at a regular file. Names that are not
/// valid UTF-8 are skipped with a warning. When `prefix` is given only names
/// starting with it are returned.
pub fn scan_dir(dir: &Path, prefix: Option<&str>) -> Result<Vec<ScannedFile>, PipelineError> {
    let read_err = |source| PipelineError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();

        let is_file = match fs::metadata(&path) {
            Ok(m) => m.is_file(),
            // Dangling symlink.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(source) => return Err(PipelineError::ReadFile { path, source }),
        };
        if !is_file {
            continue;
        }

        let name = match entry.file_name().into_string() {
            Ok(n) => n,
            Err(raw) => {
                warn!("Skipping file with non UTF-8 name: {:?}", raw);
                continue;
            }
        };

        if let Some(p) = prefix {
            if !name.starts_with(p) {
                continue;
            }
        }

        files.push(ScannedFile { path, name });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    debug!("Scanned {} → {} files", dir.display(), files.len());
    Ok(files)
}
