//! Key allocation module
//!
//! Allocates namespaced object keys of the form `uploads/{purpose}/{uuid}`.
//! Uniqueness comes from entropy alone, so allocation needs no lock and no
//! shared counter and is safe under unbounded concurrency. Keys are never
//! derived from caller-supplied identifiers; the only caller input is the
//! validated purpose tag, which closes off key guessing and cross-tenant
//! overwrites structurally.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Namespace used when the caller names none
pub const DEFAULT_PURPOSE: &str = "generic";

/// Prefix shared by every allocated key
pub const KEY_PREFIX: &str = "uploads";

const MAX_PURPOSE_LEN: usize = 64;

/// Purpose parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PurposeError {
    #[error("purpose must not be empty")]
    Empty,

    #[error("purpose longer than 64 characters")]
    TooLong,

    #[error("purpose contains invalid character '{0}'")]
    InvalidCharacter(char),
}

/// Validated namespace tag for allocated keys
///
/// Lowercase ASCII alphanumerics plus `-` and `_`, starting with an
/// alphanumeric, at most 64 characters. Anything else is rejected rather
/// than rewritten: silently renaming a namespace would make authorization
/// decisions about a purpose the caller never asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Purpose(String);

impl Purpose {
    /// Parse a caller-supplied purpose tag
    pub fn parse(raw: &str) -> Result<Self, PurposeError> {
        if raw.is_empty() {
            return Err(PurposeError::Empty);
        }
        if raw.len() > MAX_PURPOSE_LEN {
            return Err(PurposeError::TooLong);
        }
        for (index, ch) in raw.chars().enumerate() {
            let valid = ch.is_ascii_lowercase()
                || ch.is_ascii_digit()
                || (index > 0 && (ch == '-' || ch == '_'));
            if !valid {
                return Err(PurposeError::InvalidCharacter(ch));
            }
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Purpose {
    fn default() -> Self {
        Self(DEFAULT_PURPOSE.to_string())
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Allocated object key
///
/// Opaque to callers: they receive it at issue time and echo it back at
/// finalize time, never construct their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Wrap a key echoed back by a caller (e.g. in a finalize request)
    pub fn from_string(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace segment of the key, when the key is well formed
    pub fn purpose(&self) -> Option<&str> {
        let mut segments = self.0.split('/');
        match (segments.next(), segments.next(), segments.next()) {
            (Some(KEY_PREFIX), Some(purpose), Some(id)) if !purpose.is_empty() && !id.is_empty() => {
                Some(purpose)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entropy-backed key allocator
///
/// Stateless: every allocation draws fresh random bits, so concurrent
/// callers need no coordination and rejected or abandoned allocations leave
/// nothing to clean up here.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyAllocator;

impl KeyAllocator {
    pub fn new() -> Self {
        Self
    }

    /// Allocate a fresh key under the purpose namespace
    pub fn allocate(&self, purpose: &Purpose) -> ObjectKey {
        ObjectKey(format!("{}/{}/{}", KEY_PREFIX, purpose.as_str(), Uuid::new_v4()))
    }
}
