use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use base64::Engine;
use bytes::Bytes;
use chrono::Utc;
use thiserror::Error;
use tracing::{error, info};

use crate::config::StorageConfig;
use crate::gemini::InlineImage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid base64 image payload: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("upload failed: {0}")]
    UploadFailed(String),
}

/// A persisted lookbook frame. The object store owns it from here on; the
/// handler never deletes.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub public_url: String,
    pub content_type: String,
    pub path: String,
}

/// Public-read object store seam. One implementation talks to S3; tests
/// substitute a capturing stub.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Uploads `data` under `key` with the given content type and returns the
    /// store-assigned public URL.
    async fn put(&self, key: &str, content_type: &str, data: Vec<u8>)
        -> Result<String, StorageError>;
}

pub struct S3ArtifactStore {
    client: Client,
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
}

impl S3ArtifactStore {
    pub async fn new(config: &StorageConfig) -> Self {
        let region_provider =
            RegionProviderChain::first_try(aws_config::Region::new(config.region.clone()));
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        // S3-compatible providers (MinIO, Spaces) need a custom endpoint and
        // path-style addressing.
        let client = if let Some(ref endpoint) = config.endpoint_url {
            let s3_config = aws_sdk_s3::config::Builder::from(&shared)
                .endpoint_url(endpoint)
                .force_path_style(true)
                .build();
            Client::from_conf(s3_config)
        } else {
            Client::new(&shared)
        };

        Self {
            client,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint_url: config.endpoint_url.clone(),
        }
    }

    fn public_url(&self, key: &str) -> String {
        match self.endpoint_url {
            Some(ref endpoint) => {
                format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key)
            }
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            ),
        }
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn put(
        &self,
        key: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<String, StorageError> {
        let size = data.len();
        let body = ByteStream::from(Bytes::from(data));

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, bucket = %self.bucket, key = %key, "S3 upload failed");
                StorageError::UploadFailed(e.to_string())
            })?;

        let url = self.public_url(key);
        info!(bucket = %self.bucket, key = %key, size_bytes = size, "S3 upload successful");
        Ok(url)
    }
}

/// Decodes one inline image and persists it under a timestamped key.
pub async fn store_inline_image(
    store: &dyn ArtifactStore,
    prefix: &str,
    concept: &str,
    image: &InlineImage,
) -> Result<StoredArtifact, StorageError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(&image.data)?;
    let path = artifact_path(prefix, concept, &image.mime_type, Utc::now().timestamp_millis());
    let public_url = store.put(&path, &image.mime_type, bytes).await?;
    Ok(StoredArtifact {
        public_url,
        content_type: image.mime_type.clone(),
        path,
    })
}

/// `<prefix>/<epoch-millis>-<slug>.<ext>`; uniqueness per attempt rides on
/// the millisecond timestamp.
pub fn artifact_path(prefix: &str, concept: &str, mime_type: &str, epoch_millis: i64) -> String {
    format!(
        "{}/{}-{}.{}",
        prefix.trim_end_matches('/'),
        epoch_millis,
        concept_slug(concept),
        extension_for(mime_type)
    )
}

/// Concept truncated to at most 32 characters, whitespace collapsed to `-`,
/// with a fixed placeholder for the empty concept.
pub fn concept_slug(concept: &str) -> String {
    let truncated: String = concept.chars().take(32).collect();
    let slug = truncated.split_whitespace().collect::<Vec<_>>().join("-");
    if slug.is_empty() {
        "concept".to_string()
    } else {
        slug
    }
}

pub fn extension_for(mime_type: &str) -> &'static str {
    if mime_type.eq_ignore_ascii_case("image/jpeg") {
        "jpg"
    } else {
        "png"
    }
}
