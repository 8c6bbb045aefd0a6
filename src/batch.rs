//! Batch identity and the per-run asset manifest.
//!
//! A run is identified by a [`BatchTag`] (seconds since the Unix epoch) that
//! prefixes every file the run writes into the working directory. The tag is
//! minted once and carried in a [`BatchContext`] that every stage receives by
//! reference; stages never re-derive it from file names.
//!
//! What happened to each file is tracked in a [`Manifest`]: one
//! [`AssetRecord`] per file with an explicit [`AssetStatus`]. The manifest
//! lives for one run only and is never persisted.

use crate::config::{AssetKind, PipelineConfig};
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ── Batch tag ─────────────────────────────────────────────────────────────

/// Run-scoped correlation marker embedded in file names.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BatchTag(u64);

impl BatchTag {
    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Mint a tag from the current wall-clock time.
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp().max(0) as u64)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// File-name prefix owned by this batch: `"<tag>_"`.
    ///
    /// The separator is part of the prefix so tag `17` does not claim the
    /// files of tag `170`.
    pub fn prefix(self) -> String {
        format!("{}_", self.0)
    }
}

impl fmt::Display for BatchTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BatchTag {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(BatchTag)
            .map_err(|_| PipelineError::InvalidConfig(format!("invalid batch tag '{s}'")))
    }
}

// ── Batch context ─────────────────────────────────────────────────────────

/// Everything a stage needs to know about the current run.
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub tag: BatchTag,
    pub kind: AssetKind,
    pub base_dir: PathBuf,
    pub target_dir: PathBuf,
}

impl BatchContext {
    pub fn new(tag: BatchTag, config: &PipelineConfig) -> Self {
        Self {
            tag,
            kind: config.kind.clone(),
            base_dir: config.base_dir.clone(),
            target_dir: config.target_dir.clone(),
        }
    }

    pub fn prefix(&self) -> String {
        self.tag.prefix()
    }

    /// Whether `file_name` belongs to this batch.
    pub fn owns(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.prefix())
    }

    /// `<tag>_<label>_<stem>[_<marker>][.<extension>]`
    pub fn tagged_name(&self, stem: &str, marker: Option<&str>, extension: &str) -> String {
        let mut name = format!("{}_{}_{}", self.tag, self.kind.label(), stem);
        if let Some(m) = marker {
            name.push('_');
            name.push_str(m);
        }
        if !extension.is_empty() {
            name.push('.');
            name.push_str(extension);
        }
        name
    }

    /// [`Self::tagged_name`] joined onto the base directory.
    pub fn tagged_path(&self, stem: &str, marker: Option<&str>, extension: &str) -> PathBuf {
        self.base_dir.join(self.tagged_name(stem, marker, extension))
    }
}

// ── Asset records ─────────────────────────────────────────────────────────

/// File format, classified from the extension alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetFormat {
    Vector,
    Png,
    Jpeg,
    Unsupported(String),
}

impl AssetFormat {
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "svg" => AssetFormat::Vector,
            "png" => AssetFormat::Png,
            "jpg" | "jpeg" => AssetFormat::Jpeg,
            other => AssetFormat::Unsupported(other.to_string()),
        }
    }

    pub fn is_raster(&self) -> bool {
        matches!(self, AssetFormat::Png | AssetFormat::Jpeg)
    }

    pub fn image_format(&self) -> Option<image::ImageFormat> {
        match self {
            AssetFormat::Png => Some(image::ImageFormat::Png),
            AssetFormat::Jpeg => Some(image::ImageFormat::Jpeg),
            _ => None,
        }
    }
}

/// Where a file stands in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    /// Tagged copy written by the normaliser.
    Raw,
    /// PNG rasterised from a vector file.
    Converted,
    /// Resampled derivative of a raster file.
    Resized,
    /// Unsupported format; left in the working directory.
    Skipped,
    /// Replaced by a derivative; deleted at relocation.
    Superseded,
    /// Moved into the target directory.
    Relocated,
    /// Superseded file deleted by the relocator.
    Discarded,
}

/// One file produced or touched by the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    /// Current location on disk.
    pub path: PathBuf,
    /// Normalised base name without batch markers or extension.
    pub stem: String,
    /// Lower-case extension without the dot; may be empty.
    pub extension: String,
    pub format: AssetFormat,
    pub status: AssetStatus,
    /// Index of the record this file was derived from.
    pub source: Option<usize>,
}

impl AssetRecord {
    pub fn new(path: PathBuf, stem: impl Into<String>, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        Self {
            path,
            stem: stem.into(),
            format: AssetFormat::from_extension(&extension),
            extension,
            status: AssetStatus::Raw,
            source: None,
        }
    }

    pub fn with_status(mut self, status: AssetStatus) -> Self {
        self.status = status;
        self
    }

    pub fn derived_from(mut self, source: usize) -> Self {
        self.source = Some(source);
        self
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Name in the target directory: the normalised base name only.
    pub fn final_name(&self) -> String {
        if self.extension.is_empty() {
            self.stem.clone()
        } else {
            format!("{}.{}", self.stem, self.extension)
        }
    }

    /// Whether the file is still expected in the working directory.
    pub fn is_live(&self) -> bool {
        !matches!(self.status, AssetStatus::Relocated | AssetStatus::Discarded)
    }
}

// ── Manifest ──────────────────────────────────────────────────────────────

/// In-memory record of every file of one batch.
#[derive(Debug, Clone)]
pub struct Manifest {
    tag: BatchTag,
    records: Vec<AssetRecord>,
}

impl Manifest {
    pub fn new(tag: BatchTag) -> Self {
        Self {
            tag,
            records: Vec::new(),
        }
    }

    pub fn tag(&self) -> BatchTag {
        self.tag
    }

    pub fn records(&self) -> &[AssetRecord] {
        &self.records
    }

    pub fn get(&self, idx: usize) -> Option<&AssetRecord> {
        self.records.get(idx)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add a record, refusing to shadow a live file at the same path.
    pub fn push(&mut self, record: AssetRecord) -> Result<usize, PipelineError> {
        if let Some(existing) = self
            .records
            .iter()
            .find(|r| r.is_live() && r.path == record.path)
        {
            let second = record
                .source
                .and_then(|i| self.records.get(i))
                .map(|r| r.path.clone())
                .unwrap_or_else(|| record.path.clone());
            return Err(PipelineError::NameCollision {
                name: record.file_name(),
                first: existing.path.clone(),
                second,
            });
        }
        self.records.push(record);
        Ok(self.records.len() - 1)
    }

    pub fn set_status(&mut self, idx: usize, status: AssetStatus) {
        if let Some(r) = self.records.get_mut(idx) {
            r.status = status;
        }
    }

    pub(crate) fn set_path(&mut self, idx: usize, path: PathBuf) {
        if let Some(r) = self.records.get_mut(idx) {
            r.path = path;
        }
    }

    /// Indices of records matching `pred`, in insertion order.
    pub fn select(&self, pred: impl Fn(&AssetRecord) -> bool) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| pred(r))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn count(&self, status: AssetStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    pub fn position(&self, path: &Path) -> Option<usize> {
        self.records.iter().position(|r| r.path == path)
    }
}
