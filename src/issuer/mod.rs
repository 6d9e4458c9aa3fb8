//! Capability issuing module
//!
//! First phase of the protocol: authorize the purpose, validate the declared
//! intent, allocate a key, and obtain a time-boxed write capability from the
//! storage provider. The declared values are advisory; their job is to
//! reject obviously bad requests before anything is allocated. A rejected
//! intent leaves no trace in the key namespace.

use crate::authz::UploadAuthorizer;
use crate::error::UploadError;
use crate::keys::{KeyAllocator, ObjectKey, Purpose};
use crate::metrics;
use crate::policy::{self, Constraints};
use crate::storage::ObjectStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Declared upload intent
///
/// Caller-declared attributes of the upcoming upload. Ephemeral: it exists
/// for the duration of the issue call and is never persisted.
#[derive(Debug, Clone)]
pub struct UploadIntent {
    pub mime_type: String,
    /// Declared size in bytes; untrusted until finalize confirms it
    pub size: i64,
    pub purpose: Purpose,
}

impl UploadIntent {
    pub fn new(mime_type: &str, size: i64) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            size,
            purpose: Purpose::default(),
        }
    }

    pub fn with_purpose(mut self, purpose: Purpose) -> Self {
        self.purpose = purpose;
        self
    }
}

/// Issued write capability
///
/// Grants a direct write of one object until expiry. The expiry clock
/// started at issuance, not at first use, and the URL is bound to both the
/// key and the declared content type.
#[derive(Debug, Clone)]
pub struct IssuedCapability {
    pub key: ObjectKey,
    pub url: String,
    pub expires_in_secs: u64,
    pub issued_at: DateTime<Utc>,
    /// Content type the capability is bound to; the transfer must declare
    /// exactly this type
    pub content_type: String,
}

impl IssuedCapability {
    /// Absolute expiry instant
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + chrono::Duration::seconds(self.expires_in_secs as i64)
    }

    /// Whether the expiry clock has already run out
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at()
    }
}

/// Capability issuer
pub struct CapabilityIssuer {
    store: Arc<dyn ObjectStore>,
    authorizer: Arc<dyn UploadAuthorizer>,
    allocator: KeyAllocator,
    constraints: Constraints,
    capability_ttl: Duration,
}

impl CapabilityIssuer {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        authorizer: Arc<dyn UploadAuthorizer>,
        constraints: Constraints,
        capability_ttl: Duration,
    ) -> Self {
        Self {
            store,
            authorizer,
            allocator: KeyAllocator::new(),
            constraints,
            capability_ttl,
        }
    }

    /// Constraint set this issuer validates against
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Issue a write capability for the declared intent
    #[tracing::instrument(
        name = "issuer.issue",
        skip(self, intent),
        fields(
            upload.purpose = %intent.purpose,
            upload.mime_type = %intent.mime_type,
            upload.declared_size = intent.size,
            upload.key = tracing::field::Empty
        ),
        err
    )]
    pub async fn issue(
        &self,
        subject: &str,
        intent: &UploadIntent,
    ) -> Result<IssuedCapability, UploadError> {
        let start_time = Instant::now();

        let allowed = match self
            .authorizer
            .may_upload_for(subject, &intent.purpose)
            .await
        {
            Ok(allowed) => allowed,
            Err(e) => {
                // Fail closed: an unanswerable authorization question is a no.
                tracing::warn!(error = %e, subject = %subject, "Authorization backend failed");
                false
            }
        };
        if !allowed {
            metrics::record_issue(intent.purpose.as_str(), "denied");
            return Err(UploadError::NotAuthorized {
                purpose: intent.purpose.to_string(),
            });
        }

        if let Err(rejection) = policy::evaluate(&intent.mime_type, intent.size, &self.constraints)
        {
            metrics::record_issue(intent.purpose.as_str(), "rejected");
            tracing::debug!(reason = %rejection, "Intent rejected by advisory policy check");
            return Err(UploadError::InvalidUpload(rejection));
        }

        // Only intents that passed the advisory check get a key.
        let key = self.allocator.allocate(&intent.purpose);
        tracing::Span::current().record("upload.key", key.as_str());

        let issued_at = Utc::now();
        let url = self
            .store
            .issue_write_capability(&key, &intent.mime_type, self.capability_ttl)
            .await
            .map_err(|e| {
                metrics::record_issue(intent.purpose.as_str(), "failed");
                metrics::record_error("capability_issue");
                tracing::warn!(error = %e, key = %key, "Capability issuing failed");
                UploadError::from(e)
            })?;

        metrics::record_issue(intent.purpose.as_str(), "issued");
        metrics::record_phase_duration("issue", start_time.elapsed().as_secs_f64());

        tracing::info!(
            key = %key,
            ttl_secs = self.capability_ttl.as_secs(),
            "Issued write capability"
        );

        Ok(IssuedCapability {
            key,
            url,
            expires_in_secs: self.capability_ttl.as_secs(),
            issued_at,
            content_type: intent.mime_type.clone(),
        })
    }
}
