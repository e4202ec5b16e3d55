//! S3 storage backend.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;

use super::{sanitize_segment, ObjectStorage};

pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
    key_prefix: String,
    public_base: String,
}

impl S3Storage {
    pub async fn new(bucket: String, key_prefix: String, public_base_url: Option<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = aws_sdk_s3::Client::new(&config);
        let public_base = public_base_url
            .unwrap_or_else(|| format!("https://{bucket}.s3.amazonaws.com"))
            .trim_end_matches('/')
            .to_string();
        Self {
            client,
            bucket,
            key_prefix: key_prefix.trim_matches('/').to_string(),
            public_base,
        }
    }

    fn object_key(&self, name: &str, prefix: Option<&str>) -> String {
        let mut segments = Vec::new();
        if !self.key_prefix.is_empty() {
            segments.push(self.key_prefix.clone());
        }
        if let Some(prefix) = prefix {
            segments.push(sanitize_segment(prefix));
        }
        segments.push(sanitize_segment(name));
        segments.join("/")
    }

    fn key_from_url<'a>(&self, url: &'a str) -> Result<&'a str> {
        let Some(key) = url.strip_prefix(&self.public_base) else {
            bail!("URL does not belong to this bucket: {url}");
        };
        let key = key.trim_start_matches('/');
        if key.is_empty() {
            bail!("URL carries no object key: {url}");
        }
        Ok(key)
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put(&self, data: Bytes, name: &str, prefix: Option<&str>) -> Result<String> {
        let key = self.object_key(name, prefix);
        let content_type = mime_guess::from_path(name).first_or_octet_stream();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type.as_ref())
            .body(ByteStream::from(data))
            .send()
            .await
            .with_context(|| format!("Failed to upload object: {key}"))?;

        Ok(format!("{}/{}", self.public_base, key))
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let key = self.key_from_url(url)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to delete object: {key}"))?;
        Ok(())
    }
}
