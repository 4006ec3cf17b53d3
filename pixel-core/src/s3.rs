use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    presigning::PresigningConfig,
    primitives::{ByteStream, DateTime},
    types::{CompletedMultipartUpload, CompletedPart},
    Client,
};
use chrono::{TimeZone, Utc};
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::error::{GalleryError, Result};
use crate::store::{BytesCallback, ObjectMetadata, ObjectStore};

/// Multipart part size; also the largest object sent with a single PUT.
/// S3 rejects non-final parts smaller than 5 MiB.
pub const PART_SIZE: usize = 5 * 1024 * 1024;

#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    public_base_url: Option<String>,
    presign_expiry: Option<Duration>,
}

impl S3Store {
    pub async fn new(config: &GatewayConfig) -> Result<Self> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        // If AWS_ENDPOINT_URL is set, use it (for MinIO/LocalStack/etc)
        if let Some(endpoint_url) = &config.endpoint_url {
            config_loader = config_loader.endpoint_url(endpoint_url);
        }

        if let Some(creds) = &config.credentials {
            config_loader = config_loader.credentials_provider(Credentials::new(
                &creds.access_key_id,
                &creds.secret_access_key,
                None,
                None,
                "pixel-env",
            ));
        }

        let sdk_config = config_loader.load().await;
        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);

        // For S3-compatible services, force path-style addressing
        if config.endpoint_url.is_some() {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = Client::from_conf(s3_config_builder.build());

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            public_base_url: config.public_base_url.clone(),
            presign_expiry: config.presign_expiry,
        })
    }

    /// Get public URL for an object (if bucket is public)
    pub fn get_public_url(&self, s3_key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{base}/{s3_key}"),
            None => format!("https://{}.s3.amazonaws.com/{}", self.bucket, s3_key),
        }
    }

    async fn put_single(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| GalleryError::transfer(format!("Failed to upload {key}"), e))?;
        Ok(())
    }

    async fn put_multipart(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        on_bytes: BytesCallback<'_>,
    ) -> Result<()> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| GalleryError::transfer(format!("Failed to start upload of {key}"), e))?;

        let upload_id = created.upload_id().ok_or_else(|| {
            GalleryError::transfer(
                format!("Failed to start upload of {key}"),
                anyhow::anyhow!("S3 returned no upload id"),
            )
        })?;

        match self.upload_parts(key, upload_id, &data, on_bytes).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Leave no orphaned parts behind; the original error is what the caller sees.
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(upload_id)
                    .send()
                    .await
                {
                    tracing::warn!("Failed to abort multipart upload of {}: {:?}", key, abort_err);
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        data: &[u8],
        on_bytes: BytesCallback<'_>,
    ) -> Result<()> {
        let mut parts = Vec::new();
        let mut sent = 0u64;

        for (index, chunk) in data.chunks(PART_SIZE).enumerate() {
            let part_number = index as i32 + 1;
            tracing::debug!("S3 UPLOAD PART: key={}, part={}, size={} bytes", key, part_number, chunk.len());

            let output = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk.to_vec()))
                .send()
                .await
                .map_err(|e| {
                    GalleryError::transfer(format!("Failed to upload part {part_number} of {key}"), e)
                })?;

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(output.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );

            sent += chunk.len() as u64;
            on_bytes(sent);
        }

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| GalleryError::transfer(format!("Failed to complete upload of {key}"), e))?;

        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        on_bytes: BytesCallback<'_>,
    ) -> Result<()> {
        tracing::debug!("S3 PUT: bucket={}, key={}, size={} bytes", self.bucket, key, data.len());

        let size = data.len() as u64;
        if data.len() <= PART_SIZE {
            on_bytes(0);
            self.put_single(key, data, content_type).await?;
            on_bytes(size);
        } else {
            self.put_multipart(key, data, content_type, on_bytes).await?;
        }

        tracing::debug!("S3 PUT success: key={}", key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        tracing::debug!("S3 LIST: bucket={}, prefix={}", self.bucket, prefix);

        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| GalleryError::transfer("Failed to list objects", e))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key())
                    // Skip folder placeholder objects
                    .filter(|key| !key.ends_with('/'))
                    .map(str::to_string),
            );
        }

        tracing::debug!("S3 LIST success: prefix={}, count={}", prefix, keys.len());
        Ok(keys)
    }

    async fn resolve_url(&self, key: &str) -> Result<String> {
        let Some(expiry) = self.presign_expiry else {
            return Ok(self.get_public_url(key));
        };

        let presigning = PresigningConfig::expires_in(expiry)
            .map_err(|e| GalleryError::transfer(format!("Invalid presign expiry for {key}"), e))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| GalleryError::transfer(format!("Failed to presign {key}"), e))?;

        Ok(request.uri().to_string())
    }

    async fn head(&self, key: &str) -> Result<ObjectMetadata> {
        tracing::debug!("S3 HEAD: bucket={}, key={}", self.bucket, key);

        let output = match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => {
                return Err(GalleryError::NotFound(key.to_string()));
            }
            Err(e) => {
                return Err(GalleryError::transfer(format!("Failed to fetch metadata for {key}"), e));
            }
        };

        Ok(ObjectMetadata {
            size_bytes: output.content_length().unwrap_or_default().max(0) as u64,
            content_type: output.content_type().map(str::to_string),
            created: output
                .last_modified()
                .and_then(to_chrono)
                .unwrap_or_else(Utc::now),
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        // S3 deletes of missing keys succeed silently; check first so callers see NotFound.
        self.head(key).await?;

        tracing::debug!("S3 DELETE: bucket={}, key={}", self.bucket, key);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| GalleryError::transfer(format!("Failed to delete {key}"), e))?;

        tracing::debug!("S3 DELETE success: key={}", key);
        Ok(())
    }
}

fn to_chrono(timestamp: &DateTime) -> Option<chrono::DateTime<Utc>> {
    Utc.timestamp_opt(timestamp.secs(), timestamp.subsec_nanos()).single()
}
