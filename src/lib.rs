//! Consignr Library
//!
//! Capability-based direct-to-S3 upload broker. An upload runs in three
//! phases: the broker issues a short-lived presigned write capability, the
//! client sends its payload straight to the storage provider, and finalize
//! verifies the stored object against provider ground truth before anything
//! downstream trusts it.
//!
//! # Features
//!
//! - **Direct transfer**: payload bytes never pass through the broker
//! - **Time-boxed capabilities**: presigned PUT URLs bound to key and type
//! - **Authoritative finalize**: size and type read back from the provider
//! - **Pluggable seams**: storage, authorization, transfer, and sink traits
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use consignr::issuer::UploadIntent;
//! use consignr::policy::Constraints;
//! use consignr::storage::InMemoryObjectStore;
//! use consignr::uploader::{UploadRequest, Uploader};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = InMemoryObjectStore::new();
//!     let uploader = Uploader::builder()
//!         .store(Arc::new(store.clone()))
//!         .transfer(Arc::new(store.transfer()))
//!         .constraints(Constraints::new(10 * 1024 * 1024, vec!["image/".into()]))
//!         .build()?;
//!
//!     let intent = UploadIntent::new("image/png", 4);
//!     let finalized = uploader
//!         .upload(UploadRequest::new("alice", intent, Bytes::from_static(b"png!")))
//!         .await?;
//!     println!("stored {} ({} bytes)", finalized.key, finalized.size_bytes);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod authz;
pub mod config;
pub mod error;
pub mod finalize;
pub mod issuer;
pub mod keys;
pub mod metrics;
pub mod policy;
pub mod server;
pub mod sink;
pub mod storage;
pub mod transfer;
pub mod uploader;

// Re-export commonly used types
pub use config::Config;
pub use error::UploadError;
pub use finalize::{FinalizeRequest, FinalizeVerifier, FinalizedUpload};
pub use issuer::{CapabilityIssuer, IssuedCapability, UploadIntent};
pub use server::Server;
pub use uploader::{UploadPhase, UploadRequest, Uploader};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
