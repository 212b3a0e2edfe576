//! Ingestion error types.

use thiserror::Error;

pub type IngestResult<T> = Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    /// The source URL does not yield a source key; nothing is written.
    #[error("Invalid source: {0}")]
    InvalidSource(#[from] vingest_models::SourceKeyError),

    #[error("Store error: {0}")]
    Store(#[from] vingest_firestore::FirestoreError),

    /// Fails the run immediately.
    #[error("{0}")]
    Setup(String),

    /// Fails one stage; the run continues.
    #[error("{0}")]
    Stage(String),

    #[error("Media error: {0}")]
    Media(#[from] vingest_media::MediaError),

    #[error("Provider error: {0}")]
    Provider(#[from] vingest_ml_client::MlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IngestError {
    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }

    pub fn stage(msg: impl Into<String>) -> Self {
        Self::Stage(msg.into())
    }
}
