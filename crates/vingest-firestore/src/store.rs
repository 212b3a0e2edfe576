//! Store traits shared by the Firestore and in-memory backends.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use vingest_models::{
    AnalysisRecord, ContentIdentity, Modality, PipelineRun, RunStatus, SourceKey,
};

use crate::client::FirestoreClient;
use crate::error::FirestoreResult;
use crate::memory::MemoryStore;
use crate::repos::{FirestoreAnalysisStore, FirestoreIdentityStore, FirestoreRunStore};

/// A status write for the run keyed by a source.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    /// Intermediate write: status and optionally progress.
    Progress { status: RunStatus, progress: Option<u8> },
    /// Terminal success with a summary message.
    Completed { message: String },
    /// Terminal failure.
    Failed { error: String },
}

impl StatusUpdate {
    pub fn processing(progress: u8) -> Self {
        Self::Progress {
            status: RunStatus::Processing,
            progress: Some(progress),
        }
    }

    pub fn completed(message: impl Into<String>) -> Self {
        Self::Completed {
            message: message.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    /// Apply this update to a run. Terminal runs are left untouched.
    pub fn apply(&self, run: &mut PipelineRun) {
        match self {
            Self::Progress { status, progress } => run.advance(*status, *progress),
            Self::Completed { message } => run.complete(message.as_str()),
            Self::Failed { error } => run.fail(error.as_str()),
        }
    }
}

/// Pipeline run status, one row per source key.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Write a full run row, replacing any previous row for the key.
    async fn create(&self, run: &PipelineRun) -> FirestoreResult<()>;

    async fn get(&self, key: &SourceKey) -> FirestoreResult<Option<PipelineRun>>;

    /// Apply a status update. A missing row is created as a fresh run first.
    async fn upsert_status(&self, key: &SourceKey, update: StatusUpdate) -> FirestoreResult<()>;

    /// Cheap reachability probe for readiness checks.
    async fn health_check(&self) -> FirestoreResult<()> {
        Ok(())
    }
}

/// Per-modality analysis output. Last writer wins.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn upsert_analysis(&self, record: &AnalysisRecord) -> FirestoreResult<()>;

    async fn get_analysis(
        &self,
        key: &SourceKey,
        modality: Modality,
    ) -> FirestoreResult<Option<AnalysisRecord>>;

    /// All records for a key, in [`Modality::ALL`] order.
    async fn list_analysis(&self, key: &SourceKey) -> FirestoreResult<Vec<AnalysisRecord>> {
        let mut records = Vec::new();
        for modality in Modality::ALL {
            if let Some(record) = self.get_analysis(key, modality).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Whether both the transcript and frame descriptions exist.
    async fn has_complete_analysis(&self, key: &SourceKey) -> FirestoreResult<bool> {
        Ok(self.get_analysis(key, Modality::Transcript).await?.is_some()
            && self
                .get_analysis(key, Modality::FrameDescriptions)
                .await?
                .is_some())
    }
}

/// Content identity, one per source key.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn upsert_identity(&self, identity: &ContentIdentity) -> FirestoreResult<()>;

    async fn get_identity(&self, key: &SourceKey) -> FirestoreResult<Option<ContentIdentity>>;
}

/// Backend selection for `STORE_BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Firestore,
    Memory,
}

impl StoreBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Some(Self::Firestore),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }

    pub fn from_env() -> Self {
        std::env::var("STORE_BACKEND")
            .ok()
            .and_then(|s| Self::parse(&s))
            .unwrap_or_default()
    }
}

/// The three stores, shared across the worker and the API.
#[derive(Clone)]
pub struct Stores {
    pub runs: Arc<dyn RunStore>,
    pub analysis: Arc<dyn AnalysisStore>,
    pub identity: Arc<dyn IdentityStore>,
}

impl Stores {
    /// All three stores backed by one in-memory store.
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            runs: store.clone(),
            analysis: store.clone(),
            identity: store,
        }
    }

    pub fn firestore(client: FirestoreClient) -> Self {
        Self {
            runs: Arc::new(FirestoreRunStore::new(client.clone())),
            analysis: Arc::new(FirestoreAnalysisStore::new(client.clone())),
            identity: Arc::new(FirestoreIdentityStore::new(client)),
        }
    }

    /// Build the stores for `backend`; the Firestore backend reads its config from the environment.
    pub async fn connect(backend: StoreBackend) -> FirestoreResult<Self> {
        match backend {
            StoreBackend::Memory => {
                info!("Using in-memory stores");
                Ok(Self::memory())
            }
            StoreBackend::Firestore => {
                let client = FirestoreClient::from_env().await?;
                info!("Using Firestore stores");
                Ok(Self::firestore(client))
            }
        }
    }
}
