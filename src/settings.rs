//! Optional JSON settings file.
//!
//! Holds values that rarely change between runs, mostly the storage
//! credentials. Every field is optional; command-line flags and environment
//! variables take precedence over anything read from the file.
//!
//! ```json
//! {
//!   "target_width": 600,
//!   "target_height": 300,
//!   "storage": {
//!     "bucket": "assets",
//!     "region": "fra1",
//!     "access_key": "DO00...",
//!     "secret_key": "..."
//!   }
//! }
//! ```
//!
//! Location: `$IMGBATCH_CONFIG`, else `<config dir>/imgbatch/config.json`.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the settings file location.
pub const CONFIG_ENV: &str = "IMGBATCH_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub base_dir: Option<PathBuf>,
    pub target_dir: Option<PathBuf>,
    pub target_width: Option<u32>,
    pub target_height: Option<u32>,
    /// Rasteriser binary name or path.
    pub inkscape: Option<PathBuf>,
    pub storage: StorageSettings,
}

/// Object-storage section.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSettings {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Remote folder; defaults to `<year>/<label>` when unset.
    pub folder: Option<String>,
    /// Provider domain; defaults to `digitaloceanspaces.com`.
    pub domain: Option<String>,
}

impl fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageSettings")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("folder", &self.folder)
            .field("domain", &self.domain)
            .finish()
    }
}

impl Settings {
    /// Where settings are read from when no path is given.
    pub fn default_path() -> PathBuf {
        if let Ok(p) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(p);
        }

        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(std::env::temp_dir);

        base.join("imgbatch").join("config.json")
    }

    /// Read and parse `path`.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = fs::read_to_string(path).map_err(|source| PipelineError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| {
            PipelineError::InvalidConfig(format!("settings file '{}': {e}", path.display()))
        })
    }

    /// Like [`Self::load`], but a missing file yields empty settings.
    pub fn load_or_default(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            debug!("No settings file at {}", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let s = Settings::load_or_default(&dir.path().join("config.json")).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn parses_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "target_width": 800, "storage": { "bucket": "assets", "region": "fra1" } }"#,
        )
        .unwrap();

        let s = Settings::load(&path).unwrap();
        assert_eq!(s.target_width, Some(800));
        assert_eq!(s.target_height, None);
        assert_eq!(s.storage.bucket.as_deref(), Some("assets"));
        assert_eq!(s.storage.secret_key, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "target_widht": 800 }"#).unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(err.to_string().contains("target_widht"), "got: {err}");
    }

    #[test]
    fn debug_redacts_secret() {
        let s = StorageSettings {
            secret_key: Some("hunter2".into()),
            ..Default::default()
        };
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn default_path_ends_in_imgbatch_config() {
        if std::env::var(CONFIG_ENV).is_err() {
            assert!(Settings::default_path().ends_with("imgbatch/config.json"));
        }
    }
}
