//! Filename normaliser: write a batch-tagged, sanitised copy of every file.
//!
//! `Büro Foto.JPG` becomes `<tag>_partner_buero_foto.jpg`. The copy is
//! byte-identical; the original is kept unless `keep_originals` is off.
//! The records created here seed the run's [`Manifest`].

use crate::batch::{AssetFormat, AssetRecord, BatchContext, Manifest};
use crate::error::{PipelineError, Stage};
use crate::pipeline::scan::{scan_dir, ScannedFile};
use crate::progress::{emit, ProgressCallback};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

// Transliteration can emit `/` (`½` → `1/2`), which would split the path.
static RE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \-/\\]").unwrap());

// Umlaut written as base vowel + U+0308 COMBINING DIAERESIS (macOS file names).
static RE_DECOMPOSED_UMLAUT: Lazy<Regex> =
    Lazy::new(|| Regex::new("([aou])\u{0308}").unwrap());

/// Sanitise a file name: lower-case, German umlauts and `ß` spelled out,
/// remaining non-ASCII transliterated, spaces, hyphens and slashes turned
/// into `_`.
///
/// ```rust
/// use imgbatch::pipeline::normalize::normalize_name;
///
/// assert_eq!(normalize_name("Büro Foto.JPG"), "buero_foto.jpg");
/// assert_eq!(normalize_name("Straße-Nord.png"), "strasse_nord.png");
/// ```
pub fn normalize_name(name: &str) -> String {
    let lower = name.to_lowercase();
    let composed = RE_DECOMPOSED_UMLAUT.replace_all(&lower, "${1}e");

    let mut spelled = String::with_capacity(composed.len());
    for c in composed.chars() {
        match c {
            'ä' => spelled.push_str("ae"),
            'ö' => spelled.push_str("oe"),
            'ü' => spelled.push_str("ue"),
            'ß' => spelled.push_str("ss"),
            c => spelled.push(c),
        }
    }

    let ascii = deunicode::deunicode_with_tofu(&spelled, "_").to_lowercase();
    RE_SEPARATORS.replace_all(&ascii, "_").into_owned()
}

/// Split a normalised name into stem and extension at the last dot.
///
/// Dot-files (`.hidden`) and names without a dot have an empty extension.
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext),
        _ => (name, ""),
    }
}

struct Planned {
    file: ScannedFile,
    stem: String,
    extension: String,
    target: PathBuf,
}

/// Run the normaliser over `ctx.base_dir`.
///
/// Files already carrying this batch's prefix are left alone. Every target
/// name, including the PNG each SVG will be rasterised to, is planned
/// before anything is written, so a collision between two inputs aborts the
/// stage with nothing on disk.
pub fn normalize(
    ctx: &BatchContext,
    keep_originals: bool,
    progress: &Option<ProgressCallback>,
) -> Result<Manifest, PipelineError> {
    let files: Vec<ScannedFile> = scan_dir(&ctx.base_dir, None)?
        .into_iter()
        .filter(|f| !ctx.owns(&f.name))
        .collect();

    emit(progress, |cb| cb.on_stage_start(Stage::Normalize, files.len()));

    let plan = plan(ctx, files)?;

    let mut manifest = Manifest::new(ctx.tag);
    for item in plan {
        let data = fs::read(&item.file.path).map_err(|source| PipelineError::ReadFile {
            path: item.file.path.clone(),
            source,
        })?;
        fs::write(&item.target, &data).map_err(|source| PipelineError::WriteFile {
            path: item.target.clone(),
            source,
        })?;

        if !keep_originals {
            fs::remove_file(&item.file.path).map_err(|source| PipelineError::RemoveFile {
                path: item.file.path.clone(),
                source,
            })?;
        }

        debug!("Normalized {} → {}", item.file.name, item.target.display());
        manifest.push(AssetRecord::new(item.target, item.stem, item.extension))?;
        emit(progress, |cb| cb.on_asset_done(Stage::Normalize, &item.file.name));
    }

    info!(
        "Normalized {} files in {} (batch {})",
        manifest.len(),
        ctx.base_dir.display(),
        ctx.tag
    );
    emit(progress, |cb| cb.on_stage_complete(Stage::Normalize, manifest.len()));
    Ok(manifest)
}

fn plan(ctx: &BatchContext, files: Vec<ScannedFile>) -> Result<Vec<Planned>, PipelineError> {
    let mut claimed: HashMap<String, PathBuf> = HashMap::with_capacity(files.len());
    let mut plan = Vec::with_capacity(files.len());

    for file in files {
        let normalized = normalize_name(&file.name);
        let (stem, extension) = split_name(&normalized);
        let name = ctx.tagged_name(stem, None, extension);
        let target = ctx.base_dir.join(&name);

        if let Some(first) = claimed.get(&name) {
            return Err(PipelineError::NameCollision {
                name,
                first: first.clone(),
                second: file.path,
            });
        }
        // Left over from an earlier run with the same tag.
        if target.exists() {
            return Err(PipelineError::NameCollision {
                name,
                first: target,
                second: file.path,
            });
        }

        claimed.insert(name, file.path.clone());
        plan.push(Planned {
            stem: stem.to_string(),
            extension: extension.to_string(),
            target,
            file,
        });
    }

    // The converter writes `<stem>.png` next to each SVG.
    for item in &plan {
        if AssetFormat::from_extension(&item.extension) != AssetFormat::Vector {
            continue;
        }
        let name = ctx.tagged_name(&item.stem, None, "png");
        let png = ctx.base_dir.join(&name);
        if let Some(first) = claimed.get(&name) {
            return Err(PipelineError::NameCollision {
                name,
                first: first.clone(),
                second: item.file.path.clone(),
            });
        }
        if png.exists() {
            return Err(PipelineError::NameCollision {
                name,
                first: png,
                second: item.file.path.clone(),
            });
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{AssetStatus, BatchTag};
    use crate::config::AssetKind;
    use tempfile::TempDir;

    fn ctx(dir: &TempDir, tag: u64) -> BatchContext {
        BatchContext {
            tag: BatchTag::new(tag),
            kind: AssetKind::Partner,
            base_dir: dir.path().to_path_buf(),
            target_dir: dir.path().join("out"),
        }
    }

    #[test]
    fn name_rules() {
        assert_eq!(normalize_name("Büro Foto.JPG"), "buero_foto.jpg");
        assert_eq!(normalize_name("ÄÖÜ-äöü.png"), "aeoeue_aeoeue.png");
        assert_eq!(normalize_name("Gruß.svg"), "gruss.svg");
        assert_eq!(normalize_name("My Logo - Final.svg"), "my_logo___final.svg");
        assert_eq!(normalize_name("already_clean.png"), "already_clean.png");
        assert_eq!(normalize_name("Logo ½.png"), "logo_1_2.png");
        assert_eq!(normalize_name("a⁄b.png"), "a_b.png");
        assert_eq!(normalize_name("Team ∕ Foto.jpg"), "team___foto.jpg");
        assert_eq!(normalize_name("back\\slash.png"), "back_slash.png");
    }

    #[test]
    fn decomposed_umlauts() {
        assert_eq!(normalize_name("Bu\u{0308}ro.png"), "buero.png");
        assert_eq!(normalize_name("O\u{0308}l.png"), "oel.png");
    }

    #[test]
    fn other_accents_are_transliterated() {
        assert_eq!(normalize_name("Café Zürich.jpg"), "cafe_zuerich.jpg");
        assert_eq!(normalize_name("Ångström.png"), "angstroem.png");
        assert!(normalize_name("ロゴ.png").is_ascii());
    }

    #[test]
    fn split() {
        assert_eq!(split_name("logo.png"), ("logo", "png"));
        assert_eq!(split_name("archive.tar.gz"), ("archive.tar", "gz"));
        assert_eq!(split_name("readme"), ("readme", ""));
        assert_eq!(split_name(".hidden"), (".hidden", ""));
    }

    #[test]
    fn writes_tagged_copies() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Büro Foto.JPG"), b"jpeg bytes").unwrap();
        fs::write(dir.path().join("logo.svg"), b"<svg/>").unwrap();
        fs::write(dir.path().join("Logo ½.png"), b"half").unwrap();
        fs::create_dir(dir.path().join("Sub Dir")).unwrap();

        let c = ctx(&dir, 1700000000);
        let m = normalize(&c, true, &None).unwrap();

        assert_eq!(m.len(), 3);
        assert_eq!(
            fs::read(dir.path().join("1700000000_partner_logo_1_2.png")).unwrap(),
            b"half"
        );
        let copy = dir.path().join("1700000000_partner_buero_foto.jpg");
        assert_eq!(fs::read(&copy).unwrap(), b"jpeg bytes");
        assert!(dir.path().join("1700000000_partner_logo.svg").exists());
        assert!(dir.path().join("Büro Foto.JPG").exists());
        assert!(dir.path().join("Sub Dir").is_dir());

        let rec = &m.records()[0];
        assert_eq!(rec.path, copy);
        assert_eq!((rec.stem.as_str(), rec.extension.as_str()), ("buero_foto", "jpg"));
        assert_eq!(rec.status, AssetStatus::Raw);
    }

    #[test]
    fn discards_originals_when_asked() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Logo.png"), b"png").unwrap();

        normalize(&ctx(&dir, 5), false, &None).unwrap();

        assert!(!dir.path().join("Logo.png").exists());
        assert!(dir.path().join("5_partner_logo.png").exists());
    }

    #[test]
    fn skips_files_of_current_batch() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("5_partner_logo.png"), b"png").unwrap();

        let m = normalize(&ctx(&dir, 5), true, &None).unwrap();
        assert!(m.is_empty());
    }

    #[test]
    fn colliding_inputs_write_nothing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Logo.png"), b"a").unwrap();
        fs::write(dir.path().join("logo.png"), b"b").unwrap();

        let err = normalize(&ctx(&dir, 5), true, &None).unwrap_err();
        assert!(matches!(err, PipelineError::NameCollision { .. }), "got: {err}");
        assert!(!dir.path().join("5_partner_logo.png").exists());
    }

    #[test]
    fn svg_and_png_of_one_name_write_nothing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Logo.svg"), b"<svg/>").unwrap();
        fs::write(dir.path().join("logo.png"), b"png").unwrap();

        let err = normalize(&ctx(&dir, 5), true, &None).unwrap_err();
        match err {
            PipelineError::NameCollision { name, .. } => assert_eq!(name, "5_partner_logo.png"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join("5_partner_logo.svg").exists());
        assert!(!dir.path().join("5_partner_logo.png").exists());
    }

    #[test]
    fn different_tags_never_overwrite() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("logo.png"), b"first").unwrap();

        normalize(&ctx(&dir, 100), true, &None).unwrap();
        fs::write(dir.path().join("logo.png"), b"second").unwrap();
        normalize(&ctx(&dir, 200), true, &None).unwrap();

        assert_eq!(fs::read(dir.path().join("100_partner_logo.png")).unwrap(), b"first");
        assert_eq!(fs::read(dir.path().join("200_partner_logo.png")).unwrap(), b"second");
    }
}
