//! Finalize module
//!
//! Third phase of the protocol and the only authoritative one: the object's
//! size and content type are read back from the provider and judged against
//! policy. Declared values from the issue phase play no part here. A
//! verifier holds no per-upload state, so finalizing the same key twice
//! returns the same answer.

use crate::error::UploadError;
use crate::keys::ObjectKey;
use crate::metrics;
use crate::policy::{self, Constraints, PolicyRejection};
use crate::storage::ObjectStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Verified upload record
///
/// Carries the provider-observed attributes, never the declared ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedUpload {
    pub key: ObjectKey,
    pub size_bytes: i64,
    pub content_type: String,
}

/// Finalize request
#[derive(Debug, Clone)]
pub struct FinalizeRequest {
    pub key: ObjectKey,
    /// Tighten the type check for this request: observed type must start
    /// with this prefix on top of passing the configured policy
    pub expected_mime_prefix: Option<String>,
    /// Tighten the size bound for this request; can only narrow, never
    /// widen, the configured limit
    pub max_size: Option<i64>,
}

impl FinalizeRequest {
    pub fn new(key: ObjectKey) -> Self {
        Self {
            key,
            expected_mime_prefix: None,
            max_size: None,
        }
    }

    pub fn with_expected_mime_prefix(mut self, prefix: &str) -> Self {
        self.expected_mime_prefix = Some(prefix.to_string());
        self
    }

    pub fn with_max_size(mut self, max_size: i64) -> Self {
        self.max_size = Some(max_size);
        self
    }
}

/// Post-transfer verifier
pub struct FinalizeVerifier {
    store: Arc<dyn ObjectStore>,
    constraints: Constraints,
}

impl FinalizeVerifier {
    pub fn new(store: Arc<dyn ObjectStore>, constraints: Constraints) -> Self {
        Self { store, constraints }
    }

    /// Verify the uploaded object against provider ground truth
    ///
    /// A missing object is reported as [`UploadError::NotFound`] before any
    /// policy judgement. A policy violation leaves the object in place;
    /// cleanup of such orphans belongs to an offline process, not to this
    /// call.
    #[tracing::instrument(
        name = "finalize.verify",
        skip(self, request),
        fields(
            upload.key = %request.key,
            observed.size = tracing::field::Empty,
            observed.mime_type = tracing::field::Empty
        ),
        err
    )]
    pub async fn finalize(&self, request: &FinalizeRequest) -> Result<FinalizedUpload, UploadError> {
        let start_time = Instant::now();

        let stat = self
            .store
            .inspect_object(&request.key)
            .await
            .map_err(|e| {
                metrics::record_finalize("failed");
                metrics::record_error("inspection");
                tracing::warn!(error = %e, key = %request.key, "Object inspection failed");
                UploadError::from(e)
            })?;

        let stat = match stat {
            Some(stat) => stat,
            None => {
                metrics::record_finalize("not_found");
                return Err(UploadError::NotFound {
                    key: request.key.to_string(),
                });
            }
        };

        let content_type = stat.content_type.unwrap_or_default();
        let span = tracing::Span::current();
        span.record("observed.size", stat.size_bytes);
        span.record("observed.mime_type", content_type.as_str());

        let effective = self.constraints.narrowed(request.max_size);
        if let Err(rejection) = policy::evaluate(&content_type, stat.size_bytes, &effective) {
            return Err(self.violation(request, rejection));
        }

        if let Some(prefix) = &request.expected_mime_prefix {
            if !content_type.starts_with(prefix.as_str()) {
                return Err(self.violation(
                    request,
                    PolicyRejection::DisallowedType {
                        mime_type: content_type,
                    },
                ));
            }
        }

        metrics::record_finalize("finalized");
        metrics::record_phase_duration("finalize", start_time.elapsed().as_secs_f64());

        tracing::info!(
            key = %request.key,
            size = stat.size_bytes,
            mime_type = %content_type,
            "Upload finalized"
        );

        Ok(FinalizedUpload {
            key: request.key.clone(),
            size_bytes: stat.size_bytes,
            content_type,
        })
    }

    fn violation(&self, request: &FinalizeRequest, rejection: PolicyRejection) -> UploadError {
        metrics::record_finalize("violation");
        tracing::warn!(
            key = %request.key,
            reason = %rejection,
            "Finalize rejected; object retained for offline cleanup"
        );
        UploadError::PolicyViolation(rejection)
    }
}
