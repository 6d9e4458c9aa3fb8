//! Wire types for the broker's HTTP surface
//!
//! Request bodies tolerate unknown fields; absent required fields are
//! rejected rather than defaulted. Error responses carry a stable
//! kebab-case reason code plus a human-readable message.

use crate::error::UploadError;
use crate::keys::ObjectKey;
use crate::policy::{Constraints, PolicyRejection};
use serde::{Deserialize, Serialize};

/// Body of `POST /v1/uploads`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IssueRequest {
    pub mime_type: Option<String>,
    pub size: Option<i64>,
    pub purpose: Option<String>,
}

impl IssueRequest {
    /// Extract the required fields, rejecting the request if either is
    /// absent. Purpose stays optional and defaults elsewhere.
    pub fn validated(&self) -> Result<(String, i64), UploadError> {
        let mime_type = match &self.mime_type {
            Some(mime_type) => mime_type.clone(),
            None => {
                return Err(UploadError::InvalidUpload(PolicyRejection::DisallowedType {
                    mime_type: String::new(),
                }))
            }
        };
        let size = match self.size {
            Some(size) => size,
            None => return Err(UploadError::InvalidUpload(PolicyRejection::InvalidSize { size: 0 })),
        };
        Ok((mime_type, size))
    }
}

/// Body of a `201 Created` issue response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueResponse {
    pub key: ObjectKey,
    pub url: String,
    pub expires_in_seconds: u64,
    /// The constraint set finalize will verify against, echoed so clients
    /// can fail fast without a doomed transfer
    pub constraints: Constraints,
}

/// Body of `POST /v1/uploads/finalize`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinalizeRequestBody {
    pub key: Option<String>,
    pub expected_mime_prefix: Option<String>,
    pub max_size: Option<i64>,
}

/// Body of a `200 OK` finalize response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    pub ok: bool,
    pub key: ObjectKey,
    pub size_bytes: i64,
    pub content_type: String,
}

impl From<crate::finalize::FinalizedUpload> for FinalizeResponse {
    fn from(upload: crate::finalize::FinalizedUpload) -> Self {
        Self {
            ok: true,
            key: upload.key,
            size_bytes: upload.size_bytes,
            content_type: upload.content_type,
        }
    }
}

/// Error body common to every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }

    pub fn from_error(e: &UploadError) -> Self {
        Self {
            error: e.reason().to_string(),
            message: format!("{}", e),
        }
    }
}

/// HTTP status carried by each error
pub fn status_for(e: &UploadError) -> u16 {
    match e {
        UploadError::NotAuthorized { .. } => 403,
        UploadError::InvalidUpload(_) => 400,
        UploadError::InvalidPurpose(_) => 400,
        UploadError::ProviderUnavailable(_) => 503,
        UploadError::TransferFailed { .. } => 502,
        UploadError::CapabilityExpired => 409,
        UploadError::NotFound { .. } => 404,
        UploadError::PolicyViolation(_) => 422,
        UploadError::Persistence(_) => 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_request_ignores_unknown_fields() {
        let body = r#"{"mimeType":"image/png","size":1024,"futureField":true}"#;
        let request: IssueRequest = serde_json::from_str(body).unwrap();
        let (mime_type, size) = request.validated().unwrap();
        assert_eq!(mime_type, "image/png");
        assert_eq!(size, 1024);
        assert!(request.purpose.is_none());
    }

    #[test]
    fn test_issue_request_missing_mime_type_is_invalid_type() {
        let request: IssueRequest = serde_json::from_str(r#"{"size":10}"#).unwrap();
        let err = request.validated().unwrap_err();
        assert_eq!(err.reason(), "invalid-type");
    }

    #[test]
    fn test_issue_request_missing_size_is_invalid_size() {
        let request: IssueRequest = serde_json::from_str(r#"{"mimeType":"image/png"}"#).unwrap();
        let err = request.validated().unwrap_err();
        assert_eq!(err.reason(), "invalid-size");
    }

    #[test]
    fn test_issue_response_uses_camel_case_keys() {
        let response = IssueResponse {
            key: ObjectKey::from_string("uploads/avatar/abc".into()),
            url: "https://bucket.example/uploads/avatar/abc?X-Amz-Expires=300".into(),
            expires_in_seconds: 300,
            constraints: Constraints::new(10_485_760, vec!["image/".into()]),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["key"], "uploads/avatar/abc");
        assert_eq!(json["expiresInSeconds"], 300);
        assert_eq!(json["constraints"]["maxSizeBytes"], 10_485_760);
        assert_eq!(json["constraints"]["allowedMimePrefixes"][0], "image/");
    }

    #[test]
    fn test_finalize_body_tolerates_extra_and_missing_fields() {
        let body: FinalizeRequestBody =
            serde_json::from_str(r#"{"key":"uploads/generic/x","checksum":"ignored"}"#).unwrap();
        assert_eq!(body.key.as_deref(), Some("uploads/generic/x"));
        assert!(body.expected_mime_prefix.is_none());
        assert!(body.max_size.is_none());

        let empty: FinalizeRequestBody = serde_json::from_str("{}").unwrap();
        assert!(empty.key.is_none());
    }

    #[test]
    fn test_error_response_carries_reason_and_message() {
        let e = UploadError::NotFound {
            key: "uploads/generic/x".into(),
        };
        let body = ErrorResponse::from_error(&e);
        assert_eq!(body.error, "not-found");
        assert!(body.message.contains("uploads/generic/x"));
        assert_eq!(status_for(&e), 404);
    }

    #[test]
    fn test_status_codes_by_error() {
        assert_eq!(
            status_for(&UploadError::NotAuthorized {
                purpose: "avatar".into()
            }),
            403
        );
        assert_eq!(status_for(&UploadError::CapabilityExpired), 409);
        assert_eq!(
            status_for(&UploadError::PolicyViolation(PolicyRejection::TooLarge {
                size: 10,
                limit: 1
            })),
            422
        );
        assert_eq!(
            status_for(&UploadError::ProviderUnavailable("down".into())),
            503
        );
        assert_eq!(
            status_for(&UploadError::TransferFailed {
                detail: "x".into()
            }),
            502
        );
        assert_eq!(status_for(&UploadError::Persistence("db".into())), 500);
    }
}
