//! Error types for the imgbatch library.
//!
//! Two distinct types reflect two distinct failure modes:
//!
//! * [`PipelineError`]: **Fatal**: the current stage cannot continue
//!   (unreadable directory, rasteriser missing, corrupt JPEG, upload refused).
//!   Every stage returns the first one it hits; [`crate::run::run`] wraps it
//!   in [`PipelineError::Stage`] so the caller knows where the run stopped.
//!
//! * [`AssetWarning`]: **Non-fatal**: a single file was skipped (for example
//!   a batch-tagged GIF reaching the resizer). Warnings are collected into
//!   [`crate::output::PipelineReport`] and the run continues.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage, used to give fatal errors and progress events context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Normalize,
    Convert,
    Resize,
    Relocate,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Normalize => "normalize",
            Stage::Convert => "convert",
            Stage::Resize => "resize",
            Stage::Relocate => "relocate",
            Stage::Publish => "publish",
        };
        f.write_str(name)
    }
}

/// All fatal errors returned by the imgbatch library.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Filesystem errors ─────────────────────────────────────────────────
    /// A directory could not be listed.
    #[error("Failed to read directory '{path}': {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file could not be created or written.
    #[error("Failed to write '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file could not be deleted.
    #[error("Failed to remove '{path}': {source}")]
    RemoveFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The target directory could not be created.
    #[error("Failed to create directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two files of one batch would end up under the same name.
    #[error("Name collision on '{name}': '{first}' and '{second}' map to the same file")]
    NameCollision {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    // ── Rasteriser errors ─────────────────────────────────────────────────
    /// The external vector rasteriser is not installed or not on PATH.
    #[error("Rasteriser '{program}' not found on PATH.\nInstall Inkscape or pass --inkscape <PATH>.")]
    RasterizerMissing { program: String },

    /// The rasteriser ran but reported failure.
    #[error("Rasteriser command failed ({status}): {command}\n{output}")]
    RasterizerFailed {
        command: String,
        status: String,
        output: String,
    },

    /// The rasteriser reported a width/height that is not a positive number.
    #[error("Rasteriser reported an invalid {axis} for '{path}': {raw:?}")]
    InvalidDimension {
        path: PathBuf,
        axis: &'static str,
        raw: String,
    },

    // ── Image errors ──────────────────────────────────────────────────────
    /// A batch-tagged PNG/JPEG could not be decoded.
    #[error("Failed to decode '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The resized image could not be encoded as PNG.
    #[error("Failed to encode '{path}' as PNG: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    // ── Publish errors ────────────────────────────────────────────────────
    /// The object store refused or failed an upload.
    #[error("Failed to publish '{key}': {detail}")]
    PublishFailed { key: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Context ───────────────────────────────────────────────────────────
    /// A stage aborted; `source` is the first error it encountered.
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<PipelineError>,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Attach stage context, unless the error already carries it.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            e @ PipelineError::Stage { .. } => e,
            other => PipelineError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error was raised in, if known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// A non-fatal problem with a single file.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetWarning {
    /// A batch-tagged file has an extension the resizer does not handle.
    #[error("'{file}': image format '{extension}' is not supported for resizing, skipped")]
    UnsupportedFormat { file: String, extension: String },
}
