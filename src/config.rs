//! Configuration types for a batch run.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. The target box bounds every scale
//! computation; the asset kind's label is embedded in every file name the
//! run produces.

use crate::batch::BatchTag;
use crate::error::PipelineError;
use crate::progress::ProgressCallback;
use chrono::Datelike;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration for one batch run.
///
/// # Example
/// ```rust
/// use imgbatch::{AssetKind, PipelineConfig};
///
/// let config = PipelineConfig::builder("./incoming", "./ready")
///     .kind(AssetKind::Partner)
///     .target_box(600, 300)
///     .build()
///     .unwrap();
/// assert_eq!(config.target_width, 600);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Working directory holding the raw assets. Scanned non-recursively.
    pub base_dir: PathBuf,

    /// Directory finished assets are moved into. Created if absent.
    pub target_dir: PathBuf,

    /// Width of the bounding box every asset is fitted into. Default: 600.
    pub target_width: u32,

    /// Height of the bounding box every asset is fitted into. Default: 300.
    pub target_height: u32,

    /// Semantic category; its label is embedded in every produced file name.
    pub kind: AssetKind,

    /// Keep the untagged source files after the normaliser copied them. Default: true.
    pub keep_originals: bool,

    /// Run the raster resize stage. Default: true.
    ///
    /// When disabled, normalised PNG/JPEG files (and PNGs converted from SVG)
    /// are relocated at their original size.
    pub resize: bool,

    /// Rule used to fit source dimensions into the target box. Default: whole factor.
    pub scale_mode: ScaleMode,

    /// Resampling filter for the raster resizer. Default: nearest neighbour.
    pub filter: ResampleFilter,

    /// Batch tag to use instead of minting one from the clock.
    pub batch: Option<BatchTag>,

    /// Where to publish relocated assets. `None` stops after relocation.
    pub publish: Option<PublishTarget>,

    /// Stage/asset event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("base_dir", &self.base_dir)
            .field("target_dir", &self.target_dir)
            .field("target_width", &self.target_width)
            .field("target_height", &self.target_height)
            .field("kind", &self.kind)
            .field("keep_originals", &self.keep_originals)
            .field("resize", &self.resize)
            .field("scale_mode", &self.scale_mode)
            .field("filter", &self.filter)
            .field("batch", &self.batch)
            .field("publish", &self.publish)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder(
        base_dir: impl Into<PathBuf>,
        target_dir: impl Into<PathBuf>,
    ) -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: PipelineConfig {
                base_dir: base_dir.into(),
                target_dir: target_dir.into(),
                target_width: 600,
                target_height: 300,
                kind: AssetKind::Partner,
                keep_originals: true,
                resize: true,
                scale_mode: ScaleMode::default(),
                filter: ResampleFilter::default(),
                batch: None,
                publish: None,
                progress_callback: None,
            },
        }
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn target_box(mut self, width: u32, height: u32) -> Self {
        self.config.target_width = width;
        self.config.target_height = height;
        self
    }

    pub fn kind(mut self, kind: AssetKind) -> Self {
        self.config.kind = kind;
        self
    }

    pub fn keep_originals(mut self, v: bool) -> Self {
        self.config.keep_originals = v;
        self
    }

    pub fn resize(mut self, v: bool) -> Self {
        self.config.resize = v;
        self
    }

    pub fn scale_mode(mut self, mode: ScaleMode) -> Self {
        self.config.scale_mode = mode;
        self
    }

    pub fn filter(mut self, filter: ResampleFilter) -> Self {
        self.config.filter = filter;
        self
    }

    pub fn batch(mut self, tag: BatchTag) -> Self {
        self.config.batch = Some(tag);
        self
    }

    pub fn publish(mut self, target: PublishTarget) -> Self {
        self.config.publish = Some(target);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.target_width == 0 || c.target_height == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "target box must be at least 1x1, got {}x{}",
                c.target_width, c.target_height
            )));
        }
        if c.base_dir.as_os_str().is_empty() {
            return Err(PipelineError::InvalidConfig("base directory is empty".into()));
        }
        if c.target_dir.as_os_str().is_empty() {
            return Err(PipelineError::InvalidConfig("target directory is empty".into()));
        }
        if c.base_dir == c.target_dir {
            return Err(PipelineError::InvalidConfig(format!(
                "target directory must differ from base directory ({})",
                c.base_dir.display()
            )));
        }
        if !is_valid_label(c.kind.label()) {
            return Err(PipelineError::InvalidConfig(format!(
                "asset label '{}' must be non-empty [a-z0-9_]",
                c.kind.label()
            )));
        }
        if let Some(ref p) = c.publish {
            if p.bucket.trim().is_empty() {
                return Err(PipelineError::InvalidConfig("publish bucket is empty".into()));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Semantic category of a batch of images.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AssetKind {
    /// Partner / sponsor logos. (default)
    #[default]
    Partner,
    /// Speaker portraits.
    Speaker,
    /// Team member portraits.
    Team,
    /// Any other label made of `[a-z0-9_]`.
    Custom(String),
}

impl AssetKind {
    /// The token embedded in file names and default storage folders.
    pub fn label(&self) -> &str {
        match self {
            AssetKind::Partner => "partner",
            AssetKind::Speaker => "speaker",
            AssetKind::Team => "team",
            AssetKind::Custom(s) => s,
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AssetKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "partner" | "partners" => Ok(AssetKind::Partner),
            "speaker" | "speakers" => Ok(AssetKind::Speaker),
            "team" => Ok(AssetKind::Team),
            other if is_valid_label(other) => Ok(AssetKind::Custom(other.to_string())),
            other => Err(PipelineError::InvalidConfig(format!(
                "invalid asset label '{other}': use lowercase letters, digits and '_'"
            ))),
        }
    }
}

impl Serialize for AssetKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Rule used to fit a source size into the target box.
///
/// Both rules bind on the axis with the larger scale factor and break ties
/// toward the height branch; the same rule is used for vector and raster
/// assets. See [`crate::pipeline::scale`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    /// Divide both sides by a whole-number factor (≥ 1). (default)
    #[default]
    WholeFactor,
    /// Exact ratio: the binding side equals the target, never upscales.
    Exact,
}

/// Resampling filter for the raster resizer. All choices are deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleFilter {
    /// Nearest neighbour: fastest, blocky. (default)
    #[default]
    Nearest,
    /// Bilinear.
    Triangle,
    /// Lanczos with window 3: slowest, sharpest.
    Lanczos3,
}

impl From<ResampleFilter> for FilterType {
    fn from(f: ResampleFilter) -> Self {
        match f {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Destination of the publish stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishTarget {
    pub bucket: String,
    /// Remote folder prefixed to every object key, e.g. `2024/partner`.
    pub folder: String,
}

impl PublishTarget {
    pub fn new(bucket: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            folder: folder.into(),
        }
    }

    /// `<current year>/<label>`, e.g. `2024/partner`.
    pub fn default_folder(kind: &AssetKind) -> String {
        format!("{}/{}", chrono::Utc::now().year(), kind.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::builder("in", "out").build().unwrap();
        assert_eq!((c.target_width, c.target_height), (600, 300));
        assert_eq!(c.kind, AssetKind::Partner);
        assert!(c.keep_originals);
        assert!(c.resize);
        assert_eq!(c.scale_mode, ScaleMode::WholeFactor);
        assert_eq!(c.filter, ResampleFilter::Nearest);
        assert!(c.publish.is_none());
    }

    #[test]
    fn zero_target_box_is_rejected() {
        let err = PipelineConfig::builder("in", "out")
            .target_box(0, 300)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("0x300"), "got: {err}");
    }

    #[test]
    fn same_base_and_target_is_rejected() {
        assert!(PipelineConfig::builder("assets", "assets").build().is_err());
    }

    #[test]
    fn invalid_custom_label_is_rejected() {
        let err = PipelineConfig::builder("in", "out")
            .kind(AssetKind::Custom("Has Space".into()))
            .build()
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn empty_bucket_is_rejected() {
        assert!(PipelineConfig::builder("in", "out")
            .publish(PublishTarget::new(" ", "2024/partner"))
            .build()
            .is_err());
    }

    #[test]
    fn kind_parsing() {
        assert_eq!("Partner".parse::<AssetKind>().unwrap(), AssetKind::Partner);
        assert_eq!("speakers".parse::<AssetKind>().unwrap(), AssetKind::Speaker);
        assert_eq!("team".parse::<AssetKind>().unwrap(), AssetKind::Team);
        assert_eq!(
            "jury".parse::<AssetKind>().unwrap(),
            AssetKind::Custom("jury".into())
        );
        assert!("no-dash".parse::<AssetKind>().is_err());
        assert!("".parse::<AssetKind>().is_err());
    }

    #[test]
    fn default_folder_is_year_and_label() {
        let folder = PublishTarget::default_folder(&AssetKind::Speaker);
        let (year, label) = folder.split_once('/').unwrap();
        assert!(year.parse::<i32>().unwrap() >= 2024);
        assert_eq!(label, "speaker");
    }

    #[test]
    fn kind_serialises_as_label() {
        let json = serde_json::to_string(&AssetKind::Custom("jury".into())).unwrap();
        assert_eq!(json, "\"jury\"");
    }
}
