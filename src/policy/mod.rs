//! Upload policy module
//!
//! Pure evaluation of upload attributes against the process-wide constraint
//! set. The same evaluation runs twice per upload: advisory at issue time
//! against caller-declared values, and authoritative at finalize time against
//! what the storage provider actually observed. Both runs use the same
//! constraints; the limit a capability was issued under is the limit it is
//! verified under.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejection reasons produced by [`evaluate`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyRejection {
    #[error("invalid size: {size} bytes")]
    InvalidSize { size: i64 },

    #[error("too large: {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: i64, limit: i64 },

    #[error("disallowed type: '{mime_type}'")]
    DisallowedType { mime_type: String },
}

/// Upload constraint set
///
/// Built once from configuration at startup and shared immutably by the
/// issue and finalize phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    /// Upper bound on object size in bytes
    pub max_size_bytes: i64,

    /// Accepted content type prefixes; empty accepts any non-empty type
    #[serde(default)]
    pub allowed_mime_prefixes: Vec<String>,
}

impl Constraints {
    /// Create a constraint set
    pub fn new(max_size_bytes: i64, allowed_mime_prefixes: Vec<String>) -> Self {
        Self {
            max_size_bytes,
            allowed_mime_prefixes,
        }
    }

    /// Narrow the size limit with a per-request bound.
    ///
    /// The process-wide limit always applies; a request can only tighten it.
    /// Non-positive bounds are ignored.
    pub fn narrowed(&self, max_size: Option<i64>) -> Constraints {
        let mut narrowed = self.clone();
        if let Some(limit) = max_size {
            if limit > 0 && limit < narrowed.max_size_bytes {
                narrowed.max_size_bytes = limit;
            }
        }
        narrowed
    }
}

/// Evaluate upload attributes against a constraint set.
///
/// Deterministic and side-effect free; safe to call concurrently from any
/// number of callers. Rules are applied in order: the size must be positive,
/// the size must not exceed the limit, and the content type must be non-empty
/// and match one of the allowed prefixes when any are configured.
pub fn evaluate(mime_type: &str, size: i64, constraints: &Constraints) -> Result<(), PolicyRejection> {
    if size <= 0 {
        return Err(PolicyRejection::InvalidSize { size });
    }

    if size > constraints.max_size_bytes {
        return Err(PolicyRejection::TooLarge {
            size,
            limit: constraints.max_size_bytes,
        });
    }

    if mime_type.is_empty() {
        return Err(PolicyRejection::DisallowedType {
            mime_type: mime_type.to_string(),
        });
    }

    if !constraints.allowed_mime_prefixes.is_empty()
        && !constraints
            .allowed_mime_prefixes
            .iter()
            .any(|prefix| mime_type.starts_with(prefix.as_str()))
    {
        return Err(PolicyRejection::DisallowedType {
            mime_type: mime_type.to_string(),
        });
    }

    Ok(())
}
