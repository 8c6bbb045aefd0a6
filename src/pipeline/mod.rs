//! Pipeline stages for batch image preparation.
//!
//! Each submodule implements one step. Stages share nothing but the
//! [`crate::batch::BatchContext`] and the run's [`crate::batch::Manifest`],
//! and each one finishes every file before the next starts.
//!
//! ## Data Flow
//!
//! ```text
//! scan ──▶ normalize ──▶ vector ──▶ raster ──▶ relocate
//!          (tag copy)   (svg→png)  (fit box)  (→ target dir)
//! ```
//!
//! 1. [`scan`]      list regular files in the working directory
//! 2. [`normalize`] sanitise names and write `<tag>_<label>_<name>` copies
//! 3. [`vector`]    rasterise SVGs through the external tool
//! 4. [`raster`]    decode, fit with [`scale`], write `_resized` PNGs
//! 5. [`relocate`]  move finished files out, drop intermediates

pub mod normalize;
pub mod raster;
pub mod relocate;
pub mod scale;
pub mod scan;
pub mod vector;

use crate::error::PipelineError;
use std::fs;
use std::path::Path;

/// Write `bytes` to `path` through a sibling `.tmp` file and a rename, so
/// a crash never leaves a truncated file under the final name.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");

    fs::write(&tmp, bytes).map_err(|source| PipelineError::WriteFile {
        path: path.to_path_buf(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| PipelineError::WriteFile {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1_partner_a_resized.png");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!dir.path().join("1_partner_a_resized.png.tmp").exists());
    }
}
