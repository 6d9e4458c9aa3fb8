//! Upload protocol errors
//!
//! One taxonomy across all three phases. Display strings are the public,
//! caller-facing text and never carry provider internals; variants that wrap
//! a detail string keep it for logs only. [`UploadError::reason`] yields the
//! machine-readable code used on the wire.

use crate::keys::PurposeError;
use crate::policy::PolicyRejection;
use crate::storage::StorageError;
use crate::transfer::TransferError;
use thiserror::Error;

/// Errors surfaced by the upload protocol
#[derive(Error, Debug)]
pub enum UploadError {
    /// The authorization gate refused this subject/purpose pair
    #[error("not authorized to upload for purpose '{purpose}'")]
    NotAuthorized { purpose: String },

    /// Declared attributes failed the advisory policy check; no key was
    /// allocated and no provider call was made
    #[error("invalid upload: {0}")]
    InvalidUpload(PolicyRejection),

    /// The purpose tag is not a valid namespace
    #[error("invalid purpose: {0}")]
    InvalidPurpose(#[from] PurposeError),

    /// The provider failed to issue a capability or answer an inspection;
    /// retryable with backoff
    #[error("storage provider unavailable")]
    ProviderUnavailable(String),

    /// The write never completed: network failure, provider rejection, or
    /// orchestrator timeout
    #[error("transfer failed")]
    TransferFailed { detail: String },

    /// The write capability expired before the transfer; re-issue rather
    /// than retry
    #[error("write capability expired")]
    CapabilityExpired,

    /// Finalize found no object at the key; terminal
    #[error("no stored object for key '{key}'")]
    NotFound { key: String },

    /// The stored object violates the constraints; it stays in the bucket
    /// for out-of-band cleanup and is never persisted
    #[error("policy violation: {0}")]
    PolicyViolation(PolicyRejection),

    /// The persistence sink refused a finalized upload
    #[error("persistence sink rejected the upload")]
    Persistence(String),
}

impl UploadError {
    /// Machine-readable reason code for the boundary contract
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotAuthorized { .. } => "not-authorized",
            Self::InvalidUpload(rejection) => match rejection {
                PolicyRejection::InvalidSize { .. } | PolicyRejection::TooLarge { .. } => {
                    "invalid-size"
                }
                PolicyRejection::DisallowedType { .. } => "invalid-type",
            },
            Self::InvalidPurpose(_) => "invalid-purpose",
            Self::ProviderUnavailable(_) => "provider-unavailable",
            Self::TransferFailed { .. } => "transfer-failed",
            Self::CapabilityExpired => "capability-expired",
            Self::NotFound { .. } => "not-found",
            Self::PolicyViolation(rejection) => match rejection {
                PolicyRejection::InvalidSize { .. } => "invalid-size",
                PolicyRejection::TooLarge { .. } => "size-exceeded",
                PolicyRejection::DisallowedType { .. } => "type-mismatch",
            },
            Self::Persistence(_) => "persistence-failed",
        }
    }

    /// True when the caller may retry the same call after backing off
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_) | Self::TransferFailed { .. }
        )
    }
}

impl From<StorageError> for UploadError {
    fn from(err: StorageError) -> Self {
        Self::ProviderUnavailable(err.to_string())
    }
}

impl From<TransferError> for UploadError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::Expired => Self::CapabilityExpired,
            other => Self::TransferFailed {
                detail: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_differ_by_phase() {
        // The same oversize rejection reads differently depending on
        // whether it was declared (issue) or observed (finalize).
        let declared = UploadError::InvalidUpload(PolicyRejection::TooLarge {
            size: 2048,
            limit: 1024,
        });
        let observed = UploadError::PolicyViolation(PolicyRejection::TooLarge {
            size: 2048,
            limit: 1024,
        });
        assert_eq!(declared.reason(), "invalid-size");
        assert_eq!(observed.reason(), "size-exceeded");
    }

    #[test]
    fn test_type_reason_codes() {
        let rejection = PolicyRejection::DisallowedType {
            mime_type: "text/html".into(),
        };
        assert_eq!(UploadError::InvalidUpload(rejection.clone()).reason(), "invalid-type");
        assert_eq!(UploadError::PolicyViolation(rejection).reason(), "type-mismatch");
    }

    #[test]
    fn test_provider_detail_is_not_displayed() {
        let err = UploadError::ProviderUnavailable("s3://internal-bucket/secret refused".into());
        assert_eq!(err.to_string(), "storage provider unavailable");
        assert_eq!(err.reason(), "provider-unavailable");
    }

    #[test]
    fn test_transfer_error_conversion() {
        let expired: UploadError = TransferError::Expired.into();
        assert!(matches!(expired, UploadError::CapabilityExpired));

        let rejected: UploadError = TransferError::Rejected {
            status: 403,
            detail: "SignatureDoesNotMatch".into(),
        }
        .into();
        assert!(matches!(rejected, UploadError::TransferFailed { .. }));
        assert_eq!(rejected.to_string(), "transfer failed");
    }

    #[test]
    fn test_retryability() {
        assert!(UploadError::ProviderUnavailable("x".into()).is_retryable());
        assert!(UploadError::TransferFailed { detail: "x".into() }.is_retryable());
        assert!(!UploadError::CapabilityExpired.is_retryable());
        assert!(!UploadError::NotFound { key: "k".into() }.is_retryable());
    }
}
