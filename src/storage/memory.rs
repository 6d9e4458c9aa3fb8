//! In-memory storage provider
//!
//! Offline stand-in for S3 used by tests and embedded callers. The store
//! keeps objects and outstanding capabilities in process memory, and
//! [`MemoryTransfer`] plays the provider's upload endpoint: it honors the
//! same rules a presigned PUT would, including expiry and the content type
//! the capability was bound to.

use crate::issuer::IssuedCapability;
use crate::keys::ObjectKey;
use crate::storage::{ObjectStat, ObjectStore, StorageError};
use crate::transfer::{Transfer, TransferError};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredObject {
    size_bytes: i64,
    content_type: String,
}

#[derive(Debug, Clone)]
struct MemoryCapability {
    key: String,
    content_type: String,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    objects: DashMap<String, StoredObject>,
    capabilities: DashMap<String, MemoryCapability>,
}

/// Object store backed by process memory
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    inner: Arc<Inner>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an object directly, bypassing the capability flow. Test hook.
    pub fn put_object(&self, key: &ObjectKey, size_bytes: i64, content_type: &str) {
        self.inner.objects.insert(
            key.as_str().to_string(),
            StoredObject {
                size_bytes,
                content_type: content_type.to_string(),
            },
        );
    }

    /// Force every outstanding capability past its expiry. Test hook.
    pub fn expire_capabilities(&self) {
        let expired = Utc::now() - chrono::Duration::seconds(1);
        for mut entry in self.inner.capabilities.iter_mut() {
            entry.value_mut().expires_at = expired;
        }
    }

    pub fn capability_count(&self) -> usize {
        self.inner.capabilities.len()
    }

    pub fn object_count(&self) -> usize {
        self.inner.objects.len()
    }

    /// Transfer client wired to this store
    pub fn transfer(&self) -> MemoryTransfer {
        MemoryTransfer {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn issue_write_capability(
        &self,
        key: &ObjectKey,
        content_type: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let token = Uuid::new_v4().simple().to_string();
        self.inner.capabilities.insert(
            token.clone(),
            MemoryCapability {
                key: key.as_str().to_string(),
                content_type: content_type.to_string(),
                expires_at: Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64),
            },
        );
        Ok(format!("memory://local/{}?cap={}", key, token))
    }

    async fn inspect_object(&self, key: &ObjectKey) -> Result<Option<ObjectStat>, StorageError> {
        Ok(self.inner.objects.get(key.as_str()).map(|obj| ObjectStat {
            size_bytes: obj.size_bytes,
            content_type: Some(obj.content_type.clone()),
        }))
    }
}

/// Upload endpoint of the in-memory provider
///
/// Capabilities stay live until expiry, so repeated writes over the same
/// URL overwrite the object just as they would against S3.
pub struct MemoryTransfer {
    inner: Arc<Inner>,
}

#[async_trait]
impl Transfer for MemoryTransfer {
    async fn send(
        &self,
        capability: &IssuedCapability,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), TransferError> {
        let token = match capability.url.rsplit_once("cap=") {
            Some((_, token)) => token.to_string(),
            None => {
                return Err(TransferError::Rejected {
                    status: 403,
                    detail: "AccessDenied".to_string(),
                })
            }
        };

        // Clone the entry out before touching the objects map; holding a
        // reference into one dashmap while writing another invites deadlock.
        let cap = match self.inner.capabilities.get(&token) {
            Some(entry) => entry.value().clone(),
            None => {
                return Err(TransferError::Rejected {
                    status: 403,
                    detail: "AccessDenied".to_string(),
                })
            }
        };

        if Utc::now() >= cap.expires_at {
            return Err(TransferError::Expired);
        }
        if content_type != cap.content_type {
            return Err(TransferError::Rejected {
                status: 403,
                detail: "SignatureDoesNotMatch".to_string(),
            });
        }

        self.inner.objects.insert(
            cap.key,
            StoredObject {
                size_bytes: body.len() as i64,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}
