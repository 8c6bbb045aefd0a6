//! Vector converter: rasterise batch-tagged SVGs into PNG siblings.
//!
//! The external tool sits behind the [`Rasterizer`] trait so tests (and
//! hosts with another renderer) can swap it out. [`InkscapeRasterizer`] is
//! the production implementation.

use crate::batch::{AssetFormat, AssetRecord, AssetStatus, BatchContext, Manifest};
use crate::config::ScaleMode;
use crate::error::{PipelineError, Stage};
use crate::pipeline::scale::TargetBox;
use crate::progress::{emit, ProgressCallback};
use once_cell::sync::OnceCell;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// External vector rasterisation capability.
///
/// Calls are blocking and run to completion; failures are fatal and never
/// retried.
pub trait Rasterizer: Send + Sync {
    /// Check the tool can be run at all. Called once before the first file.
    fn ensure_available(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Intrinsic width of the drawing, in user units.
    fn query_width(&self, path: &Path) -> Result<f64, PipelineError>;

    /// Intrinsic height of the drawing, in user units.
    fn query_height(&self, path: &Path) -> Result<f64, PipelineError>;

    /// Render `path` as a `width`×`height` PNG at `output`.
    fn rasterize(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        output: &Path,
    ) -> Result<(), PipelineError>;
}

// ── Inkscape ─────────────────────────────────────────────────────────────

/// [`Rasterizer`] backed by the Inkscape 1.x command line.
#[derive(Debug)]
pub struct InkscapeRasterizer {
    program: OsString,
    resolved: OnceCell<PathBuf>,
}

impl Default for InkscapeRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl InkscapeRasterizer {
    /// Look up `inkscape` on `PATH`.
    pub fn new() -> Self {
        Self::with_program("inkscape")
    }

    /// Use a specific binary name or path.
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            resolved: OnceCell::new(),
        }
    }

    fn program(&self) -> Result<&Path, PipelineError> {
        self.resolved
            .get_or_try_init(|| {
                which::which(&self.program).map_err(|_| PipelineError::RasterizerMissing {
                    program: self.program.to_string_lossy().into_owned(),
                })
            })
            .map(PathBuf::as_path)
    }

    /// Run the tool and return its stdout.
    fn exec(&self, args: &[&OsStr]) -> Result<String, PipelineError> {
        let program = self.program()?;
        let command = std::iter::once(program.as_os_str())
            .chain(args.iter().copied())
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        debug!("Running {command}");

        let output = Command::new(program).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::RasterizerMissing {
                    program: program.display().to_string(),
                }
            } else {
                PipelineError::RasterizerFailed {
                    command: command.clone(),
                    status: "not started".into(),
                    output: e.to_string(),
                }
            }
        })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(PipelineError::RasterizerFailed {
                command,
                status: output.status.to_string(),
                output: combined.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn query(&self, flag: &str, axis: &'static str, path: &Path) -> Result<f64, PipelineError> {
        let stdout = self.exec(&[OsStr::new(flag), path.as_os_str()])?;
        parse_dimension(&stdout, axis, path)
    }
}

impl Rasterizer for InkscapeRasterizer {
    fn ensure_available(&self) -> Result<(), PipelineError> {
        self.program().map(|_| ())
    }

    fn query_width(&self, path: &Path) -> Result<f64, PipelineError> {
        self.query("-W", "width", path)
    }

    fn query_height(&self, path: &Path) -> Result<f64, PipelineError> {
        self.query("-H", "height", path)
    }

    fn rasterize(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        output: &Path,
    ) -> Result<(), PipelineError> {
        let (w, h) = (width.to_string(), height.to_string());
        self.exec(&[
            OsStr::new("-w"),
            OsStr::new(&w),
            OsStr::new("-h"),
            OsStr::new(&h),
            path.as_os_str(),
            OsStr::new("-o"),
            output.as_os_str(),
        ])
        .map(|_| ())
    }
}

/// Parse a query result. Inkscape may print warnings first, so the last
/// non-empty line is used.
fn parse_dimension(stdout: &str, axis: &'static str, path: &Path) -> Result<f64, PipelineError> {
    let raw = stdout
        .lines()
        .map(str::trim)
        .rev()
        .find(|l| !l.is_empty())
        .unwrap_or("");

    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(PipelineError::InvalidDimension {
            path: path.to_path_buf(),
            axis,
            raw: raw.to_string(),
        }),
    }
}

// ── Stage ────────────────────────────────────────────────────────────────

/// Convert every `Raw` vector record into a `<tag>_<label>_<stem>.png`.
///
/// The SVG record becomes [`AssetStatus::Superseded`] and the PNG is added
/// as [`AssetStatus::Converted`]. Returns the number of files converted.
pub fn convert(
    ctx: &BatchContext,
    manifest: &mut Manifest,
    rasterizer: &dyn Rasterizer,
    target: TargetBox,
    mode: ScaleMode,
    progress: &Option<ProgressCallback>,
) -> Result<usize, PipelineError> {
    let vectors =
        manifest.select(|r| r.status == AssetStatus::Raw && r.format == AssetFormat::Vector);
    emit(progress, |cb| cb.on_stage_start(Stage::Convert, vectors.len()));

    if !vectors.is_empty() {
        rasterizer.ensure_available()?;
    }

    let mut converted = 0;
    for idx in vectors {
        let Some(source) = manifest.get(idx).cloned() else {
            continue;
        };

        let output = ctx.tagged_path(&source.stem, None, "png");
        if output.exists() {
            return Err(PipelineError::NameCollision {
                name: ctx.tagged_name(&source.stem, None, "png"),
                first: output,
                second: source.path,
            });
        }

        let width = rasterizer.query_width(&source.path)?;
        let height = rasterizer.query_height(&source.path)?;
        let (w, h) = mode.fit(whole_pixels(width), whole_pixels(height), target);

        // Only this file's output is removed on failure; earlier PNGs stay.
        let pushed = rasterizer
            .rasterize(&source.path, w, h, &output)
            .and_then(|()| {
                manifest.push(
                    AssetRecord::new(output.clone(), source.stem.clone(), "png")
                        .with_status(AssetStatus::Converted)
                        .derived_from(idx),
                )
            });
        if let Err(e) = pushed {
            let _ = fs::remove_file(&output);
            return Err(e);
        }

        debug!(
            "Converted {} ({width}x{height}) → {w}x{h}",
            source.file_name()
        );
        manifest.set_status(idx, AssetStatus::Superseded);
        converted += 1;
        emit(progress, |cb| cb.on_asset_done(Stage::Convert, &source.file_name()));
    }

    info!("Converted {converted} vector files");
    emit(progress, |cb| cb.on_stage_complete(Stage::Convert, converted));
    Ok(converted)
}

/// Truncate a user-unit dimension to whole pixels, never below one.
fn whole_pixels(v: f64) -> u32 {
    (v as u32).max(1)
}
