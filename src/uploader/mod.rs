//! Upload orchestration module
//!
//! Drives one upload through all three phases: issue a capability, transfer
//! the payload, finalize against provider ground truth. The sequence is
//! strict; finalize is never reached unless the transfer succeeded, so
//! dropping the future mid-transfer abandons the upload without ever
//! presenting a half-written object for verification.

use crate::authz::{AllowAllAuthorizer, UploadAuthorizer};
use crate::config::{DEFAULT_CAPABILITY_TTL_SECS, DEFAULT_TRANSFER_TIMEOUT_SECS};
use crate::error::UploadError;
use crate::finalize::{FinalizeRequest, FinalizeVerifier, FinalizedUpload};
use crate::issuer::{CapabilityIssuer, UploadIntent};
use crate::metrics;
use crate::policy::Constraints;
use crate::sink::{NullSink, UploadSink};
use crate::storage::ObjectStore;
use crate::transfer::{HttpTransfer, Transfer};
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;

/// Where an upload currently stands
///
/// Phases only ever advance, so observers may compare with `<`/`>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UploadPhase {
    IssuingCapability,
    Transferring,
    Finalizing,
    Done,
}

impl UploadPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadPhase::IssuingCapability => "issuing_capability",
            UploadPhase::Transferring => "transferring",
            UploadPhase::Finalizing => "finalizing",
            UploadPhase::Done => "done",
        }
    }
}

/// One upload to run end to end
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub subject: String,
    pub intent: UploadIntent,
    pub body: Bytes,
}

impl UploadRequest {
    pub fn new(subject: &str, intent: UploadIntent, body: Bytes) -> Self {
        Self {
            subject: subject.to_string(),
            intent,
            body,
        }
    }
}

#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("Uploader configuration error: {0}")]
    ConfigError(String),
}

/// End-to-end upload client
pub struct Uploader {
    issuer: CapabilityIssuer,
    transfer: Arc<dyn Transfer>,
    verifier: FinalizeVerifier,
    sink: Arc<dyn UploadSink>,
    transfer_timeout: Duration,
}

/// Builder for Uploader
#[derive(Default)]
pub struct UploaderBuilder {
    store: Option<Arc<dyn ObjectStore>>,
    authorizer: Option<Arc<dyn UploadAuthorizer>>,
    transfer: Option<Arc<dyn Transfer>>,
    sink: Option<Arc<dyn UploadSink>>,
    constraints: Option<Constraints>,
    capability_ttl: Option<Duration>,
    transfer_timeout: Option<Duration>,
}

impl UploaderBuilder {
    /// Set the storage provider
    pub fn store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the authorizer. Defaults to allowing every subject.
    pub fn authorizer(mut self, authorizer: Arc<dyn UploadAuthorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    /// Set the transfer client. Defaults to HTTP over the capability URL.
    pub fn transfer(mut self, transfer: Arc<dyn Transfer>) -> Self {
        self.transfer = Some(transfer);
        self
    }

    /// Set the sink for verified uploads. Defaults to dropping them.
    pub fn sink(mut self, sink: Arc<dyn UploadSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the upload constraints
    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Set how long issued capabilities stay valid
    pub fn capability_ttl(mut self, ttl: Duration) -> Self {
        self.capability_ttl = Some(ttl);
        self
    }

    /// Set the transfer deadline
    pub fn transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = Some(timeout);
        self
    }

    /// Build the Uploader
    pub fn build(self) -> Result<Uploader, BuilderError> {
        let store = self
            .store
            .ok_or_else(|| BuilderError::ConfigError("an object store is required".into()))?;
        let constraints = self
            .constraints
            .ok_or_else(|| BuilderError::ConfigError("upload constraints are required".into()))?;

        let authorizer = self
            .authorizer
            .unwrap_or_else(|| Arc::new(AllowAllAuthorizer));
        let transfer: Arc<dyn Transfer> = match self.transfer {
            Some(transfer) => transfer,
            None => Arc::new(
                HttpTransfer::new().map_err(|e| BuilderError::ConfigError(format!("{}", e)))?,
            ),
        };
        let sink = self.sink.unwrap_or_else(|| Arc::new(NullSink));
        let capability_ttl = self
            .capability_ttl
            .unwrap_or(Duration::from_secs(DEFAULT_CAPABILITY_TTL_SECS));
        let transfer_timeout = self
            .transfer_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_TRANSFER_TIMEOUT_SECS));

        Ok(Uploader {
            issuer: CapabilityIssuer::new(
                Arc::clone(&store),
                authorizer,
                constraints.clone(),
                capability_ttl,
            ),
            verifier: FinalizeVerifier::new(store, constraints),
            transfer,
            sink,
            transfer_timeout,
        })
    }
}

impl Uploader {
    /// Create a new builder for Uploader
    pub fn builder() -> UploaderBuilder {
        UploaderBuilder::default()
    }

    /// Run one upload end to end
    pub async fn upload(&self, request: UploadRequest) -> Result<FinalizedUpload, UploadError> {
        let (progress, _rx) = watch::channel(UploadPhase::IssuingCapability);
        self.upload_with_progress(request, &progress).await
    }

    /// Run one upload, reporting each phase over the watch channel
    #[tracing::instrument(
        name = "uploader.upload",
        skip(self, request, progress),
        fields(upload.subject = %request.subject, upload.purpose = %request.intent.purpose)
    )]
    pub async fn upload_with_progress(
        &self,
        request: UploadRequest,
        progress: &watch::Sender<UploadPhase>,
    ) -> Result<FinalizedUpload, UploadError> {
        let purpose = request.intent.purpose.to_string();
        let result = self.run(request, progress).await;

        match &result {
            Ok(finalized) => {
                metrics::record_upload_outcome(&purpose, "success");
                tracing::info!(key = %finalized.key, "Upload completed");
            }
            Err(e) => {
                metrics::record_upload_outcome(&purpose, e.reason());
                tracing::warn!(error = %e, reason = e.reason(), "Upload failed");
            }
        }
        result
    }

    async fn run(
        &self,
        request: UploadRequest,
        progress: &watch::Sender<UploadPhase>,
    ) -> Result<FinalizedUpload, UploadError> {
        progress.send_replace(UploadPhase::IssuingCapability);
        let capability = self.issuer.issue(&request.subject, &request.intent).await?;

        progress.send_replace(UploadPhase::Transferring);
        let transfer_start = Instant::now();
        let sent = tokio::time::timeout(
            self.transfer_timeout,
            self.transfer
                .send(&capability, request.body.clone(), &capability.content_type),
        )
        .await;
        match sent {
            Ok(Ok(())) => {
                metrics::record_phase_duration("transfer", transfer_start.elapsed().as_secs_f64());
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                metrics::record_error("transfer_timeout");
                return Err(UploadError::TransferFailed {
                    detail: format!("timed out after {}s", self.transfer_timeout.as_secs()),
                });
            }
        }

        progress.send_replace(UploadPhase::Finalizing);
        let finalized = self
            .verifier
            .finalize(&FinalizeRequest::new(capability.key.clone()))
            .await?;

        self.sink.record(&finalized).await.map_err(|e| {
            metrics::record_error("sink");
            UploadError::Persistence(format!("{}", e))
        })?;

        progress.send_replace(UploadPhase::Done);
        Ok(finalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phases_are_ordered() {
        assert!(UploadPhase::IssuingCapability < UploadPhase::Transferring);
        assert!(UploadPhase::Transferring < UploadPhase::Finalizing);
        assert!(UploadPhase::Finalizing < UploadPhase::Done);
    }

    #[test]
    fn test_builder_requires_a_store() {
        let result = Uploader::builder()
            .constraints(Constraints::new(1024, vec![]))
            .build();
        assert!(matches!(result, Err(BuilderError::ConfigError(_))));
    }

    #[test]
    fn test_builder_requires_constraints() {
        let store = crate::storage::InMemoryObjectStore::new();
        let result = Uploader::builder().store(Arc::new(store)).build();
        assert!(matches!(result, Err(BuilderError::ConfigError(_))));
    }
}
