//! # imgbatch
//!
//! Prepare a folder of partner logos, speaker portraits or team photos for
//! the web in one pass: clean up the file names, rasterise SVGs, shrink
//! everything into a bounding box, move the results into an output folder
//! and optionally upload them to DigitalOcean Spaces.
//!
//! ## Pipeline Overview
//!
//! ```text
//! base dir
//!  │
//!  ├─ 1. Normalize  "Büro Foto.JPG" → "<tag>_partner_buero_foto.jpg"
//!  ├─ 2. Convert    *.svg → *.png via Inkscape, sized by the scale rule
//!  ├─ 3. Resize     PNG/JPEG → "<tag>_partner_<stem>_resized.<ext>"
//!  ├─ 4. Relocate   → target dir as "<stem>.<ext>", intermediates deleted
//!  └─ 5. Publish    target dir → <bucket>/<year>/<label>/<file>   (optional)
//! ```
//!
//! Every file a run writes carries the run's batch tag (seconds since the
//! epoch). Later stages only look at files of the current tag, so leftovers
//! from earlier runs are never picked up.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imgbatch::{run, AssetKind, InkscapeRasterizer, PipelineConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder("./incoming", "./ready")
//!         .kind(AssetKind::Speaker)
//!         .target_box(600, 300)
//!         .build()?;
//!
//!     let report = run(&config, &InkscapeRasterizer::new(), None)?;
//!     for asset in report.relocated() {
//!         println!("{}", asset.path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `imgbatch` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! imgbatch = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod publish;
pub mod run;
pub mod settings;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{AssetFormat, AssetRecord, AssetStatus, BatchContext, BatchTag, Manifest};
pub use config::{
    AssetKind, PipelineConfig, PipelineConfigBuilder, PublishTarget, ResampleFilter, ScaleMode,
};
pub use error::{AssetWarning, PipelineError, Stage};
pub use output::{AssetSummary, PipelineReport, PipelineStats, PublishResult};
pub use pipeline::scale::{fit, fit_exact, TargetBox};
pub use pipeline::vector::{InkscapeRasterizer, Rasterizer};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use publish::{publish_dir, ObjectStore, StoreError};
pub use run::{run, run_async};
pub use settings::{Settings, StorageSettings};
