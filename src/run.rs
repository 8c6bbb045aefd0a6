//! Run entry points: the full pipeline, start to finish.
//!
//! Stages run one after another on the calling thread and share one
//! [`BatchContext`] and one [`Manifest`]. The first error aborts the run and
//! comes back wrapped in [`PipelineError::Stage`]. Files written by earlier
//! stages stay where they are; use [`crate::pipeline::relocate::clean`]
//! before re-running the same batch.
//!
//! The working and target directories must not be used by two runs at the
//! same time.

use crate::batch::{BatchContext, BatchTag, Manifest};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Stage};
use crate::output::{AssetSummary, PipelineReport, PipelineStats};
use crate::pipeline::scale::TargetBox;
use crate::pipeline::vector::Rasterizer;
use crate::pipeline::{normalize, raster, relocate, vector};
use crate::publish::{publish_dir, ObjectStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Run normalise → convert → resize → relocate → (publish) over
/// `config.base_dir`.
///
/// `store` is required when `config.publish` is set and ignored otherwise.
///
/// # Errors
/// Returns the first fatal error, tagged with the stage it happened in.
/// Unsupported files are not errors; they show up in
/// [`PipelineReport::warnings`].
pub fn run(
    config: &PipelineConfig,
    rasterizer: &dyn Rasterizer,
    store: Option<&dyn ObjectStore>,
) -> Result<PipelineReport, PipelineError> {
    let started = Instant::now();

    let publish = match (&config.publish, store) {
        (Some(target), Some(store)) => Some((target, store)),
        (Some(_), None) => {
            return Err(PipelineError::InvalidConfig(
                "publish target set but no object store given".into(),
            ))
        }
        (None, _) => None,
    };

    let tag = config.batch.unwrap_or_else(BatchTag::now);
    let ctx = BatchContext::new(tag, config);
    let target = TargetBox::new(config.target_width, config.target_height);
    let progress = &config.progress_callback;
    info!(
        "Starting batch {tag} ({}) in {}",
        ctx.kind,
        ctx.base_dir.display()
    );

    // ── Step 1: Normalise ────────────────────────────────────────────────
    let mut manifest: Manifest = normalize::normalize(&ctx, config.keep_originals, progress)
        .map_err(|e| e.in_stage(Stage::Normalize))?;
    let normalized = manifest.len();

    // ── Step 2: Rasterise vectors ────────────────────────────────────────
    let converted = vector::convert(
        &ctx,
        &mut manifest,
        rasterizer,
        target,
        config.scale_mode,
        progress,
    )
    .map_err(|e| e.in_stage(Stage::Convert))?;

    // ── Step 3: Resize rasters ───────────────────────────────────────────
    let resized = if config.resize {
        raster::resize(
            &ctx,
            &mut manifest,
            target,
            config.scale_mode,
            config.filter,
            progress,
        )
        .map_err(|e| e.in_stage(Stage::Resize))?
    } else {
        info!("Resize disabled, relocating files at their current size");
        raster::ResizeSummary::default()
    };

    // ── Step 4: Relocate ─────────────────────────────────────────────────
    relocate::relocate(&ctx, &mut manifest, progress)
        .map_err(|e| e.in_stage(Stage::Relocate))?;

    // ── Step 5: Publish ──────────────────────────────────────────────────
    let published = match publish {
        Some((dest, store)) => publish_dir(store, dest, &ctx.target_dir, progress)
            .map_err(|e| e.in_stage(Stage::Publish))?,
        None => Vec::new(),
    };

    let stats = PipelineStats {
        normalized,
        converted,
        resized: resized.resized,
        published: published.len(),
        total_duration_ms: started.elapsed().as_millis() as u64,
        ..PipelineStats::from_manifest(&manifest)
    };

    info!(
        "Batch {tag} complete: {} relocated, {} skipped, {} published, {}ms",
        stats.relocated, stats.skipped, stats.published, stats.total_duration_ms
    );

    Ok(PipelineReport {
        batch: tag,
        kind: ctx.kind.clone(),
        target_dir: ctx.target_dir.clone(),
        assets: manifest.records().iter().map(AssetSummary::from).collect(),
        warnings: resized.warnings,
        published,
        stats,
    })
}

/// [`run`] on tokio's blocking pool, for async hosts.
///
/// Every stage blocks on the filesystem or an external process, so the
/// whole pipeline is moved off the async worker threads.
pub async fn run_async(
    config: PipelineConfig,
    rasterizer: Arc<dyn Rasterizer>,
    store: Option<Arc<dyn ObjectStore>>,
) -> Result<PipelineReport, PipelineError> {
    tokio::task::spawn_blocking(move || run(&config, rasterizer.as_ref(), store.as_deref()))
        .await
        .map_err(|e| PipelineError::Internal(format!("pipeline task panicked: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PublishTarget;
    use std::path::Path;
    use tempfile::TempDir;

    struct NoRasterizer;

    impl Rasterizer for NoRasterizer {
        fn ensure_available(&self) -> Result<(), PipelineError> {
            Err(PipelineError::RasterizerMissing {
                program: "inkscape".into(),
            })
        }
        fn query_width(&self, _: &Path) -> Result<f64, PipelineError> {
            unreachable!()
        }
        fn query_height(&self, _: &Path) -> Result<f64, PipelineError> {
            unreachable!()
        }
        fn rasterize(&self, _: &Path, _: u32, _: u32, _: &Path) -> Result<(), PipelineError> {
            unreachable!()
        }
    }

    #[test]
    fn publish_without_store_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::builder(dir.path(), dir.path().join("out"))
            .publish(PublishTarget::new("bucket", "2024/partner"))
            .build()
            .unwrap();
        let err = run(&config, &NoRasterizer, None).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn missing_base_dir_fails_in_normalize() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::builder(dir.path().join("nope"), dir.path().join("out"))
            .build()
            .unwrap();
        let err = run(&config, &NoRasterizer, None).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Normalize));
    }

    #[test]
    fn missing_rasterizer_fails_in_convert() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("logo.svg"), b"<svg/>").unwrap();
        let config = PipelineConfig::builder(dir.path(), dir.path().join("out"))
            .batch(BatchTag::new(3))
            .build()
            .unwrap();

        let err = run(&config, &NoRasterizer, None).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Convert));
        assert!(dir.path().join("3_partner_logo.svg").exists());
        assert!(!dir.path().join("3_partner_logo.png").exists());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn empty_directory_runs_clean() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("in");
        std::fs::create_dir(&base).unwrap();
        let config = PipelineConfig::builder(&base, dir.path().join("out"))
            .build()
            .unwrap();

        let report = run(&config, &NoRasterizer, None).unwrap();
        assert!(report.assets.is_empty());
        assert_eq!(report.stats.relocated, 0);
        assert!(dir.path().join("out").is_dir());
    }
}
