//! Result types returned by [`crate::run::run`].
//!
//! Everything here is `Serialize` so the CLI can print a run as JSON.

use crate::batch::{AssetFormat, AssetRecord, AssetStatus, BatchTag, Manifest};
use crate::config::AssetKind;
use crate::error::AssetWarning;
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub batch: BatchTag,
    pub kind: AssetKind,
    pub target_dir: PathBuf,
    /// Every file the run created or touched, in creation order.
    pub assets: Vec<AssetSummary>,
    /// Files skipped with a non-fatal diagnostic.
    pub warnings: Vec<AssetWarning>,
    /// Uploads, in walk order. Empty when publishing was not requested.
    pub published: Vec<PublishResult>,
    pub stats: PipelineStats,
}

impl PipelineReport {
    /// Assets that ended up in the target directory.
    pub fn relocated(&self) -> impl Iterator<Item = &AssetSummary> {
        self.assets
            .iter()
            .filter(|a| a.status == AssetStatus::Relocated)
    }
}

/// Final state of one manifest record.
#[derive(Debug, Clone, Serialize)]
pub struct AssetSummary {
    /// Final name in the target directory, or the working file name when the
    /// file never left the working directory.
    pub name: String,
    pub path: PathBuf,
    pub format: AssetFormat,
    pub status: AssetStatus,
}

impl From<&AssetRecord> for AssetSummary {
    fn from(r: &AssetRecord) -> Self {
        let name = if r.status == AssetStatus::Relocated {
            r.final_name()
        } else {
            r.file_name()
        };
        Self {
            name,
            path: r.path.clone(),
            format: r.format.clone(),
            status: r.status,
        }
    }
}

/// Per-stage counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Tagged copies written by the normaliser.
    pub normalized: usize,
    /// PNGs rasterised from vector files.
    pub converted: usize,
    /// `_resized` derivatives written.
    pub resized: usize,
    /// Unsupported files left in the working directory.
    pub skipped: usize,
    /// Files moved into the target directory.
    pub relocated: usize,
    /// Intermediates deleted by the relocator.
    pub discarded: usize,
    /// Objects uploaded.
    pub published: usize,
    pub total_duration_ms: u64,
}

impl PipelineStats {
    /// Counters that can be read off a finished manifest.
    pub(crate) fn from_manifest(m: &Manifest) -> Self {
        Self {
            skipped: m.count(AssetStatus::Skipped),
            relocated: m.count(AssetStatus::Relocated),
            discarded: m.count(AssetStatus::Discarded),
            ..Self::default()
        }
    }
}

/// One uploaded object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    /// Object key, `<folder>/<file name>`.
    pub key: String,
    /// Public URL returned by the store.
    pub url: String,
}
