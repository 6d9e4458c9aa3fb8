//! Direct transfer module
//!
//! Second phase of the protocol: the payload travels straight to the storage
//! provider over the capability URL. The broker never sees the bytes in the
//! server path; this client exists for the embedded [`crate::uploader`] flow
//! and for tests. Provider rejections come back as opaque HTTP errors, so
//! this module also classifies them, in particular telling an expired
//! capability apart from other failures.

use crate::issuer::IssuedCapability;
use crate::metrics;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The capability's expiry clock ran out before the write completed
    #[error("Write capability expired")]
    Expired,
    /// The provider refused the write for a reason other than expiry
    #[error("Provider rejected the write (status {status}): {detail}")]
    Rejected { status: u16, detail: String },
    #[error("Network error: {0}")]
    Network(String),
}

/// Client side of the transfer phase
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Write `body` to the object named by the capability
    async fn send(
        &self,
        capability: &IssuedCapability,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), TransferError>;
}

/// Shape of an S3-style XML error document. Only the fields we classify on;
/// everything else in the document is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProviderErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Map a provider rejection to a [`TransferError`]
///
/// Expiry shows up as a 403 with either an `ExpiredToken` code or an
/// `AccessDenied` document whose message mentions expiry. Anything else is
/// an ordinary rejection carrying the provider's code when one is present.
fn classify_rejection(status: u16, body: &str) -> TransferError {
    let parsed: Option<ProviderErrorBody> = quick_xml::de::from_str(body).ok();

    if status == 403 {
        if let Some(ref doc) = parsed {
            let expired_code = doc.code.as_deref() == Some("ExpiredToken");
            let expired_message = doc
                .message
                .as_deref()
                .map(|m| m.to_lowercase().contains("expired"))
                .unwrap_or(false);
            if expired_code || expired_message {
                return TransferError::Expired;
            }
        }
    }

    let detail = parsed
        .and_then(|doc| doc.code)
        .unwrap_or_else(|| "unrecognized provider response".to_string());
    TransferError::Rejected { status, detail }
}

/// HTTP transfer over a presigned URL
pub struct HttpTransfer {
    client: reqwest::Client,
}

impl HttpTransfer {
    pub fn new() -> Result<Self, TransferError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TransferError::Network(format!("{}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transfer for HttpTransfer {
    #[tracing::instrument(
        name = "transfer.send",
        skip(self, capability, body),
        fields(upload.key = %capability.key, transfer.bytes = body.len()),
        err
    )]
    async fn send(
        &self,
        capability: &IssuedCapability,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), TransferError> {
        // Refuse locally if the clock has already run out; the provider
        // would reject the write anyway.
        if capability.is_expired() {
            metrics::record_transfer("expired", 0);
            return Err(TransferError::Expired);
        }

        let bytes_sent = body.len() as u64;
        let response = self
            .client
            .put(&capability.url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                metrics::record_transfer("network_error", 0);
                TransferError::Network(format!("{}", e))
            })?;

        let status = response.status().as_u16();
        if response.status().is_success() {
            metrics::record_transfer("success", bytes_sent);
            tracing::debug!(status = status, "Transfer completed");
            return Ok(());
        }

        let body_text = response.text().await.unwrap_or_default();
        let err = classify_rejection(status, &body_text);
        match err {
            TransferError::Expired => metrics::record_transfer("expired", 0),
            _ => metrics::record_transfer("rejected", 0),
        }
        tracing::warn!(status = status, error = %err, "Provider rejected transfer");
        Err(err)
    }
}
