//! S3 storage provider
//!
//! Issues presigned PUT capabilities and inspects objects over HEAD. Works
//! against AWS proper or any S3-compatible provider (MinIO, Ceph RGW) when
//! an endpoint override is configured.

use crate::config::StorageConfig;
use crate::keys::ObjectKey;
use crate::storage::{ObjectStat, ObjectStore, StorageError};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use std::time::Duration;

/// Object store backed by an S3 bucket
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
        }
    }

    /// Build a client from configuration
    ///
    /// Static credentials and an endpoint override are both optional; when
    /// neither is set the default AWS provider chain applies. Path-style
    /// addressing is forced whenever an endpoint override is present, which
    /// MinIO and most other S3-compatible providers require.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "consignr",
            ));
        }

        let base = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&base);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::new(Client::from_conf(builder.build()), &config.bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[tracing::instrument(
        name = "storage.presign_put",
        skip(self),
        fields(upload.key = %key, s3.bucket = %self.bucket),
        err
    )]
    async fn issue_write_capability(
        &self,
        key: &ObjectKey,
        content_type: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::Signing(format!("{}", e)))?;

        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Unavailable(format!("{}", e)))?;

        Ok(presigned.uri().to_string())
    }

    #[tracing::instrument(
        name = "storage.head",
        skip(self),
        fields(upload.key = %key, s3.bucket = %self.bucket),
        err
    )]
    async fn inspect_object(&self, key: &ObjectKey) -> Result<Option<ObjectStat>, StorageError> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await;

        match result {
            Ok(response) => Ok(Some(ObjectStat {
                size_bytes: response.content_length().unwrap_or(0),
                content_type: response.content_type().map(|s| s.to_string()),
            })),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(None)
                } else {
                    Err(StorageError::Unavailable(format!("{}", service_error)))
                }
            }
        }
    }
}
