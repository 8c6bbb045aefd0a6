//! Raster resizer: fit batch-tagged PNG/JPEG files into the target box.
//!
//! Each supported record is decoded, resampled with the configured filter,
//! re-encoded as PNG and written next to its source as
//! `<tag>_<label>_<stem>_resized.<ext>`. The extension is kept as-is, so a
//! `_resized.jpg` holds PNG bytes. Unsupported formats are skipped with a
//! warning.

use crate::batch::{AssetFormat, AssetRecord, AssetStatus, BatchContext, Manifest};
use crate::config::{ResampleFilter, ScaleMode};
use crate::error::{AssetWarning, PipelineError, Stage};
use crate::pipeline::scale::TargetBox;
use crate::pipeline::write_atomic;
use crate::progress::{emit, ProgressCallback};
use image::{DynamicImage, ImageFormat};
use std::fs;
use std::io::Cursor;
use tracing::{debug, info, warn};

/// Infix marking a resampled derivative.
pub const RESIZED_MARKER: &str = "resized";

/// What [`resize`] did.
#[derive(Debug, Default)]
pub struct ResizeSummary {
    /// `_resized` files written.
    pub resized: usize,
    pub warnings: Vec<AssetWarning>,
}

/// Resize every `Raw` or `Converted` raster record.
///
/// Vector records are not considered here. `Raw` records in an unsupported
/// format become [`AssetStatus::Skipped`] and are reported as warnings; a
/// decode failure on a PNG/JPEG aborts the stage.
pub fn resize(
    ctx: &BatchContext,
    manifest: &mut Manifest,
    target: TargetBox,
    mode: ScaleMode,
    filter: ResampleFilter,
    progress: &Option<ProgressCallback>,
) -> Result<ResizeSummary, PipelineError> {
    let candidates = manifest.select(|r| {
        matches!(r.status, AssetStatus::Raw | AssetStatus::Converted)
            && r.format != AssetFormat::Vector
    });
    emit(progress, |cb| cb.on_stage_start(Stage::Resize, candidates.len()));

    let mut warnings = Vec::new();
    let mut resized = 0;

    for idx in candidates {
        let Some(source) = manifest.get(idx).cloned() else {
            continue;
        };
        let name = source.file_name();

        let Some(format) = source.format.image_format() else {
            let warning = AssetWarning::UnsupportedFormat {
                file: name.clone(),
                extension: source.extension.clone(),
            };
            warn!("{warning}");
            emit(progress, |cb| {
                cb.on_asset_skipped(Stage::Resize, &name, &warning.to_string())
            });
            manifest.set_status(idx, AssetStatus::Skipped);
            warnings.push(warning);
            continue;
        };

        let output = ctx.tagged_path(&source.stem, Some(RESIZED_MARKER), &source.extension);
        if output.exists() {
            return Err(PipelineError::NameCollision {
                name: ctx.tagged_name(&source.stem, Some(RESIZED_MARKER), &source.extension),
                first: output,
                second: source.path,
            });
        }

        let data = fs::read(&source.path).map_err(|e| PipelineError::ReadFile {
            path: source.path.clone(),
            source: e,
        })?;
        let img = image::load_from_memory_with_format(&data, format).map_err(|e| {
            PipelineError::Decode {
                path: source.path.clone(),
                source: e,
            }
        })?;

        let (w, h) = mode.fit(img.width(), img.height(), target);
        let png = encode_png(&img.resize_exact(w, h, filter.into())).map_err(|e| {
            PipelineError::Encode {
                path: output.clone(),
                source: e,
            }
        })?;

        write_atomic(&output, &png)?;
        let pushed = manifest.push(
            AssetRecord::new(output.clone(), source.stem.clone(), source.extension.clone())
                .with_status(AssetStatus::Resized)
                .derived_from(idx),
        );
        if let Err(e) = pushed {
            let _ = fs::remove_file(&output);
            return Err(e);
        }
        manifest.set_status(idx, AssetStatus::Superseded);

        debug!("Resized {name} {}x{} → {w}x{h}", img.width(), img.height());
        resized += 1;
        emit(progress, |cb| cb.on_asset_done(Stage::Resize, &name));
    }

    info!(
        "Resized {resized} raster files ({} skipped)",
        warnings.len()
    );
    emit(progress, |cb| cb.on_stage_complete(Stage::Resize, resized));
    Ok(ResizeSummary { resized, warnings })
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchTag;
    use crate::config::AssetKind;
    use image::{ImageBuffer, Rgb, Rgba};
    use tempfile::TempDir;

    fn ctx(dir: &TempDir) -> BatchContext {
        BatchContext {
            tag: BatchTag::new(1700000000),
            kind: AssetKind::Partner,
            base_dir: dir.path().to_path_buf(),
            target_dir: dir.path().join("out"),
        }
    }

    fn add(ctx: &BatchContext, m: &mut Manifest, stem: &str, ext: &str, bytes: &[u8]) -> usize {
        let path = ctx.tagged_path(stem, None, ext);
        fs::write(&path, bytes).unwrap();
        m.push(AssetRecord::new(path, stem, ext)).unwrap()
    }

    fn jpeg(w: u32, h: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(w, h, |x, _| Rgb([(x % 256) as u8, 80, 160]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Jpeg)
            .unwrap();
        buf.into_inner()
    }

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(w, h, Rgba([10u8, 20, 30, 128]));
        encode_png(&DynamicImage::ImageRgba8(img)).unwrap()
    }

    #[test]
    fn resizes_jpeg_to_png_bytes() {
        let dir = TempDir::new().unwrap();
        let c = ctx(&dir);
        let mut m = Manifest::new(c.tag);
        add(&c, &mut m, "buero_foto", "jpg", &jpeg(2000, 1000));

        let summary = resize(
            &c,
            &mut m,
            TargetBox::new(600, 300),
            ScaleMode::WholeFactor,
            ResampleFilter::Nearest,
            &None,
        )
        .unwrap();
        assert_eq!(summary.resized, 1);
        assert!(summary.warnings.is_empty());

        let out = dir.path().join("1700000000_partner_buero_foto_resized.jpg");
        let bytes = fs::read(&out).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (666, 333));

        assert_eq!(m.get(0).unwrap().status, AssetStatus::Superseded);
        let derived = m.get(1).unwrap();
        assert_eq!(derived.status, AssetStatus::Resized);
        assert_eq!(derived.final_name(), "buero_foto.jpg");
        // Source is left for the relocator.
        assert!(dir.path().join("1700000000_partner_buero_foto.jpg").exists());
    }

    #[test]
    fn exact_mode_hits_the_box() {
        let dir = TempDir::new().unwrap();
        let c = ctx(&dir);
        let mut m = Manifest::new(c.tag);
        add(&c, &mut m, "wide", "png", &png(2000, 1000));

        resize(
            &c,
            &mut m,
            TargetBox::new(600, 300),
            ScaleMode::Exact,
            ResampleFilter::Lanczos3,
            &None,
        )
        .unwrap();

        let img = image::open(dir.path().join("1700000000_partner_wide_resized.png")).unwrap();
        assert_eq!((img.width(), img.height()), (600, 300));
    }

    #[test]
    fn unsupported_format_is_skipped() {
        let dir = TempDir::new().unwrap();
        let c = ctx(&dir);
        let mut m = Manifest::new(c.tag);
        add(&c, &mut m, "anim", "gif", b"GIF89a");
        add(&c, &mut m, "small", "png", &png(10, 10));

        let warnings = resize(
            &c,
            &mut m,
            TargetBox::new(600, 300),
            ScaleMode::WholeFactor,
            ResampleFilter::Nearest,
            &None,
        )
        .unwrap()
        .warnings;

        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            AssetWarning::UnsupportedFormat { extension, .. } if extension == "gif"
        ));
        assert_eq!(m.get(0).unwrap().status, AssetStatus::Skipped);
        assert!(dir.path().join("1700000000_partner_small_resized.png").exists());
        assert!(!dir.path().join("1700000000_partner_anim_resized.gif").exists());
    }

    #[test]
    fn corrupt_png_is_fatal() {
        let dir = TempDir::new().unwrap();
        let c = ctx(&dir);
        let mut m = Manifest::new(c.tag);
        add(&c, &mut m, "broken", "png", b"not a png");

        let err = resize(
            &c,
            &mut m,
            TargetBox::new(600, 300),
            ScaleMode::WholeFactor,
            ResampleFilter::Nearest,
            &None,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }), "got: {err}");
        assert!(!dir.path().join("1700000000_partner_broken_resized.png").exists());
    }

    #[test]
    fn failed_write_adds_no_record() {
        let dir = TempDir::new().unwrap();
        let c = ctx(&dir);
        let mut m = Manifest::new(c.tag);
        add(&c, &mut m, "wide", "png", &png(20, 10));
        // A directory in the temp file's place makes the write fail.
        fs::create_dir(dir.path().join("1700000000_partner_wide_resized.png.tmp")).unwrap();

        let err = resize(
            &c,
            &mut m,
            TargetBox::new(600, 300),
            ScaleMode::WholeFactor,
            ResampleFilter::Nearest,
            &None,
        )
        .unwrap_err();

        assert!(matches!(err, PipelineError::WriteFile { .. }), "got: {err}");
        assert_eq!(m.len(), 1);
        assert_eq!(m.get(0).unwrap().status, AssetStatus::Raw);
    }

    #[test]
    fn vectors_are_left_to_the_converter() {
        let dir = TempDir::new().unwrap();
        let c = ctx(&dir);
        let mut m = Manifest::new(c.tag);
        add(&c, &mut m, "logo", "svg", b"<svg/>");

        let summary = resize(
            &c,
            &mut m,
            TargetBox::new(600, 300),
            ScaleMode::WholeFactor,
            ResampleFilter::Nearest,
            &None,
        )
        .unwrap();
        assert_eq!(summary.resized, 0);
        assert_eq!(m.get(0).unwrap().status, AssetStatus::Raw);
    }
}
