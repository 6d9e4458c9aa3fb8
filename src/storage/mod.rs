//! Object storage module
//!
//! The broker's view of the storage provider: it can mint time-boxed write
//! capabilities and inspect what actually landed in the bucket. It never
//! reads or writes object bytes itself; those flow directly between the
//! client and the provider.

use crate::keys::ObjectKey;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod s3;

pub use memory::{InMemoryObjectStore, MemoryTransfer};
pub use s3::S3ObjectStore;

/// Storage provider errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Capability signing failed: {0}")]
    Signing(String),
}

/// Ground truth about a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStat {
    /// Size the provider reports, in bytes
    pub size_bytes: i64,
    /// Content type the provider reports, when it reports one
    pub content_type: Option<String>,
}

/// Storage provider seam
///
/// `issue_write_capability` returns a URL granting a direct write of exactly
/// one object, bound to the given content type, until the TTL elapses.
/// `inspect_object` reports what is actually stored: `Ok(None)` means no
/// such object exists, an error means the provider could not answer.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn issue_write_capability(
        &self,
        key: &ObjectKey,
        content_type: &str,
        ttl: Duration,
    ) -> Result<String, StorageError>;

    async fn inspect_object(&self, key: &ObjectKey) -> Result<Option<ObjectStat>, StorageError>;
}
