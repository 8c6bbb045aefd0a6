//! Publisher: upload a relocated directory to object storage.
//!
//! The store is a capability behind [`ObjectStore`]; the production
//! implementation is [`spaces_client::SpacesClient`].

use crate::config::PublishTarget;
use crate::error::{PipelineError, Stage};
use crate::output::PublishResult;
use crate::progress::{emit, ProgressCallback};
use spaces_client::SpacesClient;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Error type returned by [`ObjectStore`] implementations.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// "Store these bytes at `key` in `bucket`, readable by anyone."
pub trait ObjectStore: Send + Sync {
    /// Upload `body` and return its public URL.
    fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError>;
}

impl ObjectStore for SpacesClient {
    fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        Ok(self.put_object(bucket, key, body, content_type)?)
    }
}

/// Upload every file under `dir` (recursively, sorted by path).
///
/// Keys are `<folder>/<file name>`; sub-directory names are not part of the
/// key. Stops at the first failed upload.
pub fn publish_dir(
    store: &dyn ObjectStore,
    target: &PublishTarget,
    dir: &Path,
    progress: &Option<ProgressCallback>,
) -> Result<Vec<PublishResult>, PipelineError> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    emit(progress, |cb| cb.on_stage_start(Stage::Publish, files.len()));

    let mut published = Vec::with_capacity(files.len());
    for path in files {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let key = object_key(&target.folder, &name);

        let body = fs::read(&path).map_err(|source| PipelineError::ReadFile {
            path: path.clone(),
            source,
        })?;
        let content_type = content_type(&body, &path);
        debug!("Uploading {} as {key} ({content_type})", path.display());

        let url = store
            .put(&target.bucket, &key, body, content_type)
            .map_err(|e| PipelineError::PublishFailed {
                key: key.clone(),
                detail: e.to_string(),
            })?;

        info!("Published {url}");
        emit(progress, |cb| cb.on_published(&key, &url));
        published.push(PublishResult { key, url });
    }

    emit(progress, |cb| cb.on_stage_complete(Stage::Publish, published.len()));
    Ok(published)
}

/// `<folder>/<name>`, with surrounding slashes trimmed from `folder`.
pub fn object_key(folder: &str, name: &str) -> String {
    let folder = folder.trim().trim_matches('/');
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    }
}

/// MIME type sniffed from the bytes, falling back to the extension.
///
/// Resized files keep their original extension but hold PNG data, so the
/// bytes win.
pub fn content_type(bytes: &[u8], path: &Path) -> &'static str {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type();
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), PipelineError> {
    let read_err = |source| PipelineError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        entries.push(entry.map_err(read_err)?.path());
    }
    entries.sort();

    for path in entries {
        let meta = fs::metadata(&path).map_err(|source| PipelineError::ReadFile {
            path: path.clone(),
            source,
        })?;
        if meta.is_dir() {
            collect_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct MemoryStore {
        objects: Mutex<Vec<(String, String, usize, String)>>,
        fail_on: Option<&'static str>,
    }

    impl ObjectStore for MemoryStore {
        fn put(
            &self,
            bucket: &str,
            key: &str,
            body: Vec<u8>,
            content_type: &str,
        ) -> Result<String, StoreError> {
            if self.fail_on.is_some_and(|f| key.ends_with(f)) {
                return Err("403 AccessDenied".into());
            }
            self.objects.lock().unwrap().push((
                bucket.to_string(),
                key.to_string(),
                body.len(),
                content_type.to_string(),
            ));
            Ok(format!("https://{bucket}.example.invalid/{key}"))
        }
    }

    fn png_bytes() -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        image::DynamicImage::new_rgb8(2, 2)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn keys() {
        assert_eq!(object_key("2024/partner", "a.png"), "2024/partner/a.png");
        assert_eq!(object_key("/2024/partner/", "a.png"), "2024/partner/a.png");
        assert_eq!(object_key("", "a.png"), "a.png");
    }

    #[test]
    fn content_type_prefers_bytes() {
        assert_eq!(content_type(&png_bytes(), Path::new("x_resized.jpg")), "image/png");
        assert_eq!(content_type(b"<svg/>", Path::new("logo.svg")), "image/svg+xml");
        assert_eq!(content_type(b"??", Path::new("notes")), "application/octet-stream");
    }

    #[test]
    fn uploads_tree_in_sorted_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.png"), png_bytes()).unwrap();
        fs::write(dir.path().join("a.svg"), b"<svg/>").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.jpg"), b"jpg").unwrap();

        let store = MemoryStore::default();
        let target = PublishTarget::new("assets", "2024/partner");
        let results = publish_dir(&store, &target, dir.path(), &None).unwrap();

        let keys: Vec<_> = results.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["2024/partner/a.svg", "2024/partner/b.png", "2024/partner/c.jpg"]);
        assert_eq!(results[1].url, "https://assets.example.invalid/2024/partner/b.png");

        let objects = store.objects.lock().unwrap();
        assert_eq!(objects[0].3, "image/svg+xml");
        assert_eq!(objects[1].3, "image/png");
        assert_eq!(objects[2].3, "image/jpeg");
    }

    #[test]
    fn first_failure_stops_the_walk() {
        let dir = TempDir::new().unwrap();
        for n in ["a.png", "b.png", "c.png"] {
            fs::write(dir.path().join(n), png_bytes()).unwrap();
        }
        let store = MemoryStore {
            fail_on: Some("b.png"),
            ..Default::default()
        };

        let err = publish_dir(&store, &PublishTarget::new("x", "f"), dir.path(), &None)
            .unwrap_err();
        match err {
            PipelineError::PublishFailed { key, detail } => {
                assert_eq!(key, "f/b.png");
                assert!(detail.contains("403"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.objects.lock().unwrap().len(), 1);
    }
}
