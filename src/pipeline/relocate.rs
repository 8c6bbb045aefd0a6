//! Relocator: move finished assets into the target directory.

use crate::batch::{AssetStatus, BatchContext, BatchTag, Manifest};
use crate::error::{PipelineError, Stage};
use crate::pipeline::scan::scan_dir;
use crate::progress::{emit, ProgressCallback};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Move every live `Raw`/`Converted`/`Resized` record to
/// `target_dir/<stem>.<ext>` and delete `Superseded` intermediates.
///
/// Each move is a copy followed by a delete of the source. `Skipped`
/// records stay in the working directory. A failure part-way leaves the
/// files moved so far in place; nothing is rolled back. Returns the number
/// of files relocated.
pub fn relocate(
    ctx: &BatchContext,
    manifest: &mut Manifest,
    progress: &Option<ProgressCallback>,
) -> Result<usize, PipelineError> {
    let finished = manifest.select(|r| {
        matches!(
            r.status,
            AssetStatus::Raw | AssetStatus::Converted | AssetStatus::Resized
        )
    });
    let superseded = manifest.select(|r| r.status == AssetStatus::Superseded);
    emit(progress, |cb| cb.on_stage_start(Stage::Relocate, finished.len()));

    // Two records with one final name would silently overwrite each other.
    let mut claimed: HashMap<String, PathBuf> = HashMap::with_capacity(finished.len());
    for &idx in &finished {
        let Some(r) = manifest.get(idx) else { continue };
        let name = r.final_name();
        if let Some(first) = claimed.get(&name) {
            return Err(PipelineError::NameCollision {
                name,
                first: first.clone(),
                second: r.path.clone(),
            });
        }
        claimed.insert(name, r.path.clone());
    }

    fs::create_dir_all(&ctx.target_dir).map_err(|source| PipelineError::CreateDir {
        path: ctx.target_dir.clone(),
        source,
    })?;

    let mut moved = 0;
    for idx in finished {
        let Some(record) = manifest.get(idx).cloned() else {
            continue;
        };
        let dest = ctx.target_dir.join(record.final_name());
        move_file(&record.path, &dest)?;

        debug!("Relocated {} → {}", record.file_name(), dest.display());
        manifest.set_path(idx, dest);
        manifest.set_status(idx, AssetStatus::Relocated);
        moved += 1;
        emit(progress, |cb| cb.on_asset_done(Stage::Relocate, &record.final_name()));
    }

    for idx in superseded {
        let Some(record) = manifest.get(idx) else { continue };
        remove(&record.path)?;
        debug!("Discarded {}", record.file_name());
        manifest.set_status(idx, AssetStatus::Discarded);
    }

    info!(
        "Relocated {moved} files to {} ({} left in {})",
        ctx.target_dir.display(),
        manifest.count(AssetStatus::Skipped),
        ctx.base_dir.display()
    );
    emit(progress, |cb| cb.on_stage_complete(Stage::Relocate, moved));
    Ok(moved)
}

/// Delete every file in `base_dir` carrying the batch prefix of `tag`.
///
/// Used to clear intermediates a failed run left behind before re-running
/// it. Returns the removed paths.
pub fn clean(base_dir: &Path, tag: BatchTag) -> Result<Vec<PathBuf>, PipelineError> {
    let files = scan_dir(base_dir, Some(&tag.prefix()))?;
    let mut removed = Vec::with_capacity(files.len());
    for f in files {
        remove(&f.path)?;
        removed.push(f.path);
    }
    info!("Removed {} leftover files of batch {tag}", removed.len());
    Ok(removed)
}

fn move_file(from: &Path, to: &Path) -> Result<(), PipelineError> {
    let data = fs::read(from).map_err(|source| PipelineError::ReadFile {
        path: from.to_path_buf(),
        source,
    })?;
    fs::write(to, &data).map_err(|source| PipelineError::WriteFile {
        path: to.to_path_buf(),
        source,
    })?;
    remove(from)
}

fn remove(path: &Path) -> Result<(), PipelineError> {
    fs::remove_file(path).map_err(|source| PipelineError::RemoveFile {
        path: path.to_path_buf(),
        source,
    })
}
