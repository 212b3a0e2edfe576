//! In-memory store backend for tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use vingest_models::{AnalysisRecord, ContentIdentity, Modality, PipelineRun, SourceKey};

use crate::error::FirestoreResult;
use crate::store::{AnalysisStore, IdentityStore, RunStore, StatusUpdate};

/// Implements all three store traits over maps keyed by source key.
#[derive(Default)]
pub struct MemoryStore {
    runs: RwLock<HashMap<SourceKey, PipelineRun>>,
    analysis: RwLock<HashMap<(SourceKey, Modality), AnalysisRecord>>,
    identities: RwLock<HashMap<SourceKey, ContentIdentity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn create(&self, run: &PipelineRun) -> FirestoreResult<()> {
        self.runs
            .write()
            .await
            .insert(run.source_key.clone(), run.clone());
        Ok(())
    }

    async fn get(&self, key: &SourceKey) -> FirestoreResult<Option<PipelineRun>> {
        Ok(self.runs.read().await.get(key).cloned())
    }

    async fn upsert_status(&self, key: &SourceKey, update: StatusUpdate) -> FirestoreResult<()> {
        let mut runs = self.runs.write().await;
        let run = runs
            .entry(key.clone())
            .or_insert_with(|| PipelineRun::new_pending(key.clone(), ""));
        update.apply(run);
        Ok(())
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn upsert_analysis(&self, record: &AnalysisRecord) -> FirestoreResult<()> {
        self.analysis
            .write()
            .await
            .insert((record.source_key.clone(), record.modality), record.clone());
        Ok(())
    }

    async fn get_analysis(
        &self,
        key: &SourceKey,
        modality: Modality,
    ) -> FirestoreResult<Option<AnalysisRecord>> {
        Ok(self
            .analysis
            .read()
            .await
            .get(&(key.clone(), modality))
            .cloned())
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn upsert_identity(&self, identity: &ContentIdentity) -> FirestoreResult<()> {
        self.identities
            .write()
            .await
            .insert(identity.source_key.clone(), identity.clone());
        Ok(())
    }

    async fn get_identity(&self, key: &SourceKey) -> FirestoreResult<Option<ContentIdentity>> {
        Ok(self.identities.read().await.get(key).cloned())
    }
}
