//! Authorization module
//!
//! The identity system lives outside this crate: callers arrive with a
//! subject string the surrounding deployment has already authenticated. The
//! only question asked here is whether that subject may upload under a given
//! purpose, answered through an injected [`UploadAuthorizer`] rather than
//! any global permission state.

use crate::keys::Purpose;
use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

/// Authorization errors
#[derive(Error, Debug)]
pub enum AuthzError {
    #[error("Policy error: {0}")]
    PolicyError(String),

    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Upload authorization seam
#[async_trait]
pub trait UploadAuthorizer: Send + Sync {
    /// Check whether `subject` may upload under `purpose`
    async fn may_upload_for(&self, subject: &str, purpose: &Purpose) -> Result<bool, AuthzError>;
}

/// Authorizer that always allows
pub struct AllowAllAuthorizer;

#[async_trait]
impl UploadAuthorizer for AllowAllAuthorizer {
    async fn may_upload_for(&self, _subject: &str, _purpose: &Purpose) -> Result<bool, AuthzError> {
        Ok(true)
    }
}

/// Authorizer that always denies
pub struct DenyAllAuthorizer;

#[async_trait]
impl UploadAuthorizer for DenyAllAuthorizer {
    async fn may_upload_for(&self, _subject: &str, _purpose: &Purpose) -> Result<bool, AuthzError> {
        Ok(false)
    }
}

/// Authorizer that grants a fixed set of purposes to every subject
///
/// Configuration-driven deployments use this to fence uploads into known
/// namespaces without standing up a policy engine.
pub struct PurposeListAuthorizer {
    allowed: HashSet<String>,
}

impl PurposeListAuthorizer {
    pub fn new<I, S>(purposes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: purposes.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl UploadAuthorizer for PurposeListAuthorizer {
    async fn may_upload_for(&self, _subject: &str, purpose: &Purpose) -> Result<bool, AuthzError> {
        Ok(self.allowed.contains(purpose.as_str()))
    }
}
