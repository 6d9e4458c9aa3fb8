//! Upload sink module
//!
//! Where verified uploads land once finalize accepts them. The broker's own
//! HTTP surface returns the record to the caller and needs no sink; the
//! embedded [`crate::uploader`] flow hands each record to one of these, so
//! applications can attach their catalog or database behind the trait.

use crate::finalize::FinalizedUpload;
use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    /// The sink refused the record
    #[error("Sink rejected the upload: {0}")]
    Rejected(String),
    #[error("Sink backend error: {0}")]
    BackendError(String),
}

/// Destination for verified upload records
#[async_trait]
pub trait UploadSink: Send + Sync {
    async fn record(&self, upload: &FinalizedUpload) -> Result<(), SinkError>;
}

/// Sink that keeps records in memory. Useful in tests and demos.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<FinalizedUpload>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn records(&self) -> Vec<FinalizedUpload> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl UploadSink for MemorySink {
    async fn record(&self, upload: &FinalizedUpload) -> Result<(), SinkError> {
        self.records.lock().push(upload.clone());
        Ok(())
    }
}

/// Sink that drops every record
pub struct NullSink;

#[async_trait]
impl UploadSink for NullSink {
    async fn record(&self, _upload: &FinalizedUpload) -> Result<(), SinkError> {
        Ok(())
    }
}
