//! Local-disk storage backend. Objects land under the upload directory
//! and are served by the HTTP layer from `/uploads`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;

use super::{sanitize_segment, ObjectStorage};

pub struct LocalStorage {
    base_dir: PathBuf,
    public_base: String,
}

impl LocalStorage {
    pub fn new(base_dir: PathBuf, public_base: String) -> Result<Self> {
        std::fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create upload directory: {}", base_dir.display()))?;
        Ok(Self {
            base_dir,
            public_base: public_base.trim_end_matches('/').to_string(),
        })
    }

    /// Map a public URL back to the relative path below the upload dir.
    fn relative_path(&self, url: &str) -> Result<PathBuf> {
        let Some(rel) = url.strip_prefix(&self.public_base) else {
            bail!("URL does not belong to this storage backend: {url}");
        };
        let rel = rel.trim_start_matches('/');
        if rel.is_empty() || rel.split('/').any(|seg| seg.is_empty() || seg == "..") {
            bail!("Refusing suspicious object path: {rel}");
        }
        Ok(self.base_dir.join(rel))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(&self, data: Bytes, name: &str, prefix: Option<&str>) -> Result<String> {
        let name = sanitize_segment(name);
        let (dir, rel) = match prefix {
            Some(prefix) => {
                let prefix = sanitize_segment(prefix);
                (self.base_dir.join(&prefix), format!("{prefix}/{name}"))
            }
            None => (self.base_dir.clone(), name.clone()),
        };

        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(&name);
        tokio::fs::write(&path, &data)
            .await
            .with_context(|| format!("Failed to write object: {}", path.display()))?;

        Ok(format!("{}/{}", self.public_base, rel))
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let path = self.relative_path(url)?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("Failed to remove object: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(
            dir.path().to_path_buf(),
            "http://localhost:8080/uploads".to_string(),
        )
        .unwrap();

        let url = storage
            .put(Bytes::from_static(b"fake image"), "logo.png", Some("Shear Genius"))
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:8080/uploads/Shear_Genius/logo.png");
        assert!(dir.path().join("Shear_Genius/logo.png").exists());

        storage.delete(&url).await.unwrap();
        assert!(!dir.path().join("Shear_Genius/logo.png").exists());
    }

    #[tokio::test]
    async fn delete_rejects_foreign_urls() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(
            dir.path().to_path_buf(),
            "http://localhost:8080/uploads".to_string(),
        )
        .unwrap();

        assert!(storage
            .delete("https://elsewhere.example/uploads/x.png")
            .await
            .is_err());
    }
}
