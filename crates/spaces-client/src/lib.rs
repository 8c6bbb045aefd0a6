//! # spaces-client
//!
//! Upload objects to [DigitalOcean Spaces](https://docs.digitalocean.com/products/spaces/)
//! (or any S3-compatible endpoint that speaks AWS Signature Version 4) with a
//! `public-read` ACL, and get back the public URL of each object.
//!
//! ## How it works
//!
//! 1. The endpoint host is derived from the region: `<region>.<domain>`,
//!    port 443 (default domain `digitaloceanspaces.com`).
//! 2. Each object is sent as a single path-style `PUT /<bucket>/<key>`,
//!    signed with SigV4 (`x-amz-content-sha256` carries the payload hash).
//! 3. On success the public, virtual-hosted URL is returned:
//!    `https://<bucket>.<region>.<domain>/<key>`.
//!
//! There is no retry: a failed upload is reported to the caller, which
//! decides whether the whole batch is aborted.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use spaces_client::{SpacesClient, SpacesConfig};
//!
//! let config = SpacesConfig::new("fra1", "ACCESS_KEY", "SECRET_KEY");
//! let client = SpacesClient::new(config).expect("client");
//! let url = client
//!     .put_object("my-bucket", "2024/team/jane.png", b"...".to_vec(), "image/png")
//!     .expect("upload");
//! println!("{url}");
//! ```

use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

pub mod sigv4;

use sigv4::{amz_date, encode_key, sha256_hex, Signer};

// ── Public constants ─────────────────────────────────────────────────────────

/// Domain appended to the region slug to form the endpoint host.
pub const DEFAULT_DOMAIN: &str = "digitaloceanspaces.com";

/// Canned ACL applied to every uploaded object.
pub const PUBLIC_READ: &str = "public-read";

/// Per-request HTTP timeout used when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by spaces-client operations.
#[derive(Error, Debug)]
pub enum SpacesError {
    /// Region, bucket or credentials are missing or malformed.
    #[error("Invalid Spaces configuration: {0}")]
    InvalidConfig(String),

    /// The request signature could not be computed.
    #[error("Request signing failed: {0}")]
    Signing(String),

    /// The HTTP request did not complete (DNS, TLS, timeout, …).
    #[error("Upload of '{key}' failed: {reason}")]
    Request { key: String, reason: String },

    /// The endpoint answered with a non-success status.
    #[error("Upload of '{key}' rejected with HTTP {status}: {body}")]
    Rejected { key: String, status: u16, body: String },
}

// ── Configuration ────────────────────────────────────────────────────────────

/// Connection settings for one Spaces region.
#[derive(Clone)]
pub struct SpacesConfig {
    /// Region slug, e.g. `fra1`. Surrounding whitespace is ignored.
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Provider domain; [`DEFAULT_DOMAIN`] unless overridden.
    pub domain: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for SpacesConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpacesConfig")
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("domain", &self.domain)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl SpacesConfig {
    pub fn new(
        region: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            domain: DEFAULT_DOMAIN.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs.max(1);
        self
    }

    /// Region-scoped endpoint host, e.g. `fra1.digitaloceanspaces.com`.
    pub fn host(&self) -> String {
        format!("{}.{}", self.region.trim(), self.domain.trim())
    }

    /// Endpoint in `<host>:443` form.
    pub fn endpoint(&self) -> String {
        format!("{}:443", self.host())
    }

    /// Public URL under which an object becomes readable.
    pub fn public_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "https://{}.{}/{}",
            bucket.trim(),
            self.host(),
            encode_key(key.trim_start_matches('/'))
        )
    }

    fn validate(&self) -> Result<(), SpacesError> {
        if self.region.trim().is_empty() {
            return Err(SpacesError::InvalidConfig("region is empty".into()));
        }
        if self.access_key.is_empty() || self.secret_key.is_empty() {
            return Err(SpacesError::InvalidConfig(
                "access key and secret key are required".into(),
            ));
        }
        Ok(())
    }
}

// ── Client ───────────────────────────────────────────────────────────────────

/// Blocking uploader bound to one [`SpacesConfig`].
#[derive(Debug, Clone)]
pub struct SpacesClient {
    config: SpacesConfig,
    http: reqwest::blocking::Client,
}

impl SpacesClient {
    /// Validate the configuration and build the underlying HTTP client.
    pub fn new(config: SpacesConfig) -> Result<Self, SpacesError> {
        config.validate()?;

        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("spaces-client/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SpacesError::InvalidConfig(e.to_string()))?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &SpacesConfig {
        &self.config
    }

    /// Store `body` at `key` in `bucket` with a `public-read` ACL.
    ///
    /// Returns the public URL of the stored object.
    pub fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, SpacesError> {
        let bucket = bucket.trim();
        if bucket.is_empty() {
            return Err(SpacesError::InvalidConfig("bucket is empty".into()));
        }
        let key = key.trim_start_matches('/');

        let host = self.config.host();
        let canonical_uri = format!("/{}/{}", bucket, encode_key(key));
        let payload_hash = sha256_hex(&body);
        let now = Utc::now();
        let date = amz_date(now);

        let signer = Signer {
            access_key: &self.config.access_key,
            secret_key: &self.config.secret_key,
            region: self.config.region.trim(),
            service: "s3",
        };
        let authorization = signer.authorization(
            "PUT",
            &canonical_uri,
            &[
                ("content-type", content_type),
                ("host", &host),
                ("x-amz-acl", PUBLIC_READ),
                ("x-amz-content-sha256", &payload_hash),
                ("x-amz-date", &date),
            ],
            &payload_hash,
            now,
        )?;

        let url = format!("https://{host}{canonical_uri}");
        debug!("PUT {} ({} bytes)", url, body.len());

        let response = self
            .http
            .put(&url)
            .header("content-type", content_type)
            .header("x-amz-acl", PUBLIC_READ)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &date)
            .header("authorization", authorization)
            .body(body)
            .send()
            .map_err(|e| SpacesError::Request {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SpacesError::Rejected {
                key: key.to_string(),
                status: status.as_u16(),
                body: body.chars().take(512).collect(),
            });
        }

        Ok(self.config.public_url(bucket, key))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_follows_region_convention() {
        let cfg = SpacesConfig::new(" fra1 ", "k", "s");
        assert_eq!(cfg.host(), "fra1.digitaloceanspaces.com");
        assert_eq!(cfg.endpoint(), "fra1.digitaloceanspaces.com:443");
    }

    #[test]
    fn custom_domain() {
        let cfg = SpacesConfig::new("eu-central-1", "k", "s").with_domain("example-storage.net");
        assert_eq!(cfg.host(), "eu-central-1.example-storage.net");
    }

    #[test]
    fn public_url_is_virtual_hosted() {
        let cfg = SpacesConfig::new("fra1", "k", "s");
        assert_eq!(
            cfg.public_url("assets", "/2024/team/jane doe.png"),
            "https://assets.fra1.digitaloceanspaces.com/2024/team/jane%20doe.png"
        );
    }

    #[test]
    fn client_rejects_missing_credentials() {
        let err = SpacesClient::new(SpacesConfig::new("fra1", "", "")).unwrap_err();
        assert!(matches!(err, SpacesError::InvalidConfig(_)));

        let err = SpacesClient::new(SpacesConfig::new("  ", "k", "s")).unwrap_err();
        assert!(err.to_string().contains("region"));
    }

    #[test]
    fn put_rejects_empty_bucket() {
        let client = SpacesClient::new(SpacesConfig::new("fra1", "k", "s")).unwrap();
        let err = client
            .put_object(" ", "a.png", vec![1, 2, 3], "image/png")
            .unwrap_err();
        assert!(matches!(err, SpacesError::InvalidConfig(_)));
    }

    #[test]
    fn debug_redacts_secret() {
        let cfg = SpacesConfig::new("fra1", "key", "very-secret");
        let shown = format!("{cfg:?}");
        assert!(!shown.contains("very-secret"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn rejected_display() {
        let e = SpacesError::Rejected {
            key: "2024/team/a.png".into(),
            status: 403,
            body: "AccessDenied".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("403"), "got: {msg}");
        assert!(msg.contains("2024/team/a.png"));
    }
}
