//! Object storage behind a narrow trait: store a byte buffer under a
//! name, get back a publicly resolvable URL; deletion is best-effort.

mod local;
mod s3;

pub use local::LocalStorage;
pub use s3::S3Storage;

use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

use crate::config::{Config, StorageBackend};

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` under `name` (optionally below `prefix`) and return
    /// the URL it is reachable at.
    async fn put(&self, data: Bytes, name: &str, prefix: Option<&str>) -> Result<String>;

    /// Remove the object a URL points at. Callers treat failures as
    /// non-fatal: database cleanup never waits on object removal.
    async fn delete(&self, url: &str) -> Result<()>;
}

/// Build the configured storage backend.
pub async fn init(config: &Config) -> Result<Arc<dyn ObjectStorage>> {
    match config.storage.backend {
        StorageBackend::Local => {
            let public_base = config
                .storage
                .public_base_url
                .clone()
                .unwrap_or_else(|| format!("{}/uploads", config.server.public_url));
            let storage = LocalStorage::new(config.storage.upload_dir.clone(), public_base)?;
            tracing::info!(dir = %config.storage.upload_dir.display(), "Using local object storage");
            Ok(Arc::new(storage))
        }
        StorageBackend::S3 => {
            let Some(bucket) = config.storage.s3_bucket.clone() else {
                bail!("storage.s3_bucket is required for the s3 backend");
            };
            let storage = S3Storage::new(
                bucket.clone(),
                config.storage.s3_prefix.clone(),
                config.storage.public_base_url.clone(),
            )
            .await;
            tracing::info!(bucket = %bucket, "Using S3 object storage");
            Ok(Arc::new(storage))
        }
    }
}

lazy_static! {
    /// Characters allowed in object names and prefixes; everything else
    /// is folded to underscores
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_.-]").unwrap();
}

/// Sanitize a user-supplied name segment for use in an object key.
pub fn sanitize_segment(name: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(name, "_");
    // Guard against traversal and empty segments
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Generate a unique object name keeping the original extension.
pub fn unique_name(original: &str) -> String {
    let ext = std::path::Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .map(sanitize_segment);
    match ext {
        Some(ext) if !ext.is_empty() => format!("{}.{}", uuid::Uuid::new_v4(), ext),
        _ => uuid::Uuid::new_v4().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("Shear Genius"), "Shear_Genius");
        assert_eq!(sanitize_segment("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_segment("..."), "unnamed");
        assert_eq!(sanitize_segment("logo-v2.png"), "logo-v2.png");
    }

    #[test]
    fn test_unique_name_keeps_extension() {
        let name = unique_name("photo.JPG");
        assert!(name.ends_with(".JPG"));
        let bare = unique_name("no-extension");
        assert!(!bare.contains('.'));
    }
}
