//! Progress-callback trait for stage and per-asset events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events while the pipeline runs. The library never prints; the CLI turns
//! these events into a progress bar.
//!
//! # Example
//!
//! ```rust
//! use imgbatch::{PipelineConfig, PipelineProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_asset_done(&self, stage: Stage, name: &str) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("[{stage}] {name} ({n} so far)");
//!     }
//! }
//!
//! let config = PipelineConfig::builder("incoming", "ready")
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Stage;
use std::sync::Arc;

/// Called by the pipeline as it works through each stage.
///
/// Stages run sequentially on one thread, so events never interleave, but
/// the trait is `Send + Sync` so [`crate::run::run_async`] can move the
/// config onto a blocking worker. All methods default to no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called when a stage begins.
    ///
    /// # Arguments
    /// * `total`: number of files the stage will look at
    fn on_stage_start(&self, stage: Stage, total: usize) {
        let _ = (stage, total);
    }

    /// Called after a file was processed successfully.
    fn on_asset_done(&self, stage: Stage, name: &str) {
        let _ = (stage, name);
    }

    /// Called when a file is skipped with a non-fatal diagnostic.
    fn on_asset_skipped(&self, stage: Stage, name: &str, reason: &str) {
        let _ = (stage, name, reason);
    }

    /// Called when a stage returns successfully.
    ///
    /// # Arguments
    /// * `processed`: files the stage wrote, moved or uploaded
    fn on_stage_complete(&self, stage: Stage, processed: usize) {
        let _ = (stage, processed);
    }

    /// Called after each successful upload.
    fn on_published(&self, key: &str, url: &str) {
        let _ = (key, url);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

/// Forward to an optional callback.
pub(crate) fn emit(cb: &Option<ProgressCallback>, f: impl FnOnce(&dyn PipelineProgressCallback)) {
    if let Some(cb) = cb {
        f(cb.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl PipelineProgressCallback for Recorder {
        fn on_stage_start(&self, stage: Stage, total: usize) {
            self.events.lock().unwrap().push(format!("start {stage} {total}"));
        }

        fn on_asset_done(&self, stage: Stage, name: &str) {
            self.events.lock().unwrap().push(format!("done {stage} {name}"));
        }

        fn on_stage_complete(&self, stage: Stage, processed: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("complete {stage} {processed}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::Normalize, 3);
        cb.on_asset_done(Stage::Normalize, "a.png");
        cb.on_asset_skipped(Stage::Resize, "b.gif", "unsupported");
        cb.on_stage_complete(Stage::Normalize, 3);
        cb.on_published("2024/partner/a.png", "https://example.invalid/a.png");
    }

    #[test]
    fn emit_forwards_to_callback() {
        let rec = Arc::new(Recorder::default());
        let cb: Option<ProgressCallback> = Some(rec.clone());

        emit(&cb, |c| c.on_stage_start(Stage::Resize, 2));
        emit(&cb, |c| c.on_asset_done(Stage::Resize, "a.png"));
        emit(&cb, |c| c.on_stage_complete(Stage::Resize, 1));
        emit(&None, |c| c.on_stage_start(Stage::Resize, 99));

        let events = rec.events.lock().unwrap();
        assert_eq!(
            *events,
            vec!["start resize 2", "done resize a.png", "complete resize 1"]
        );
    }
}
