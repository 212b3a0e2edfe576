//! Firestore-backed stores.
//!
//! Collections: `runs/{doc}`, `analysis/{doc}_{modality}` and
//! `content_identity/{doc}`, where `{doc}` is [`SourceKey::document_id`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use tracing::{debug, info};
use vingest_models::{
    AnalysisRecord, ContentIdentity, Modality, PipelineRun, RunId, RunStatus, SourceKey,
};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::store::{AnalysisStore, IdentityStore, RunStore, StatusUpdate};
use crate::types::{
    fields_to_json_object, json_object_to_fields, Document, ToFirestoreValue, Value,
};

const RUNS: &str = "runs";
const ANALYSIS: &str = "analysis";
const CONTENT_IDENTITY: &str = "content_identity";

/// Fields touched by an intermediate status write.
const PROGRESS_MASK: [&str; 3] = ["status", "progress", "updated_at"];

pub struct FirestoreRunStore {
    client: FirestoreClient,
}

impl FirestoreRunStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    async fn write(&self, run: &PipelineRun, mask: Option<&[&str]>) -> FirestoreResult<()> {
        self.client
            .upsert_document(RUNS, &run.source_key.document_id(), run_to_fields(run), mask)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RunStore for FirestoreRunStore {
    async fn create(&self, run: &PipelineRun) -> FirestoreResult<()> {
        self.write(run, None).await?;
        info!(run_id = %run.id, source_key = %run.source_key, "Created run record");
        Ok(())
    }

    async fn get(&self, key: &SourceKey) -> FirestoreResult<Option<PipelineRun>> {
        match self.client.get_document(RUNS, &key.document_id()).await? {
            Some(doc) => Ok(Some(document_to_run(&doc)?)),
            None => Ok(None),
        }
    }

    async fn upsert_status(&self, key: &SourceKey, update: StatusUpdate) -> FirestoreResult<()> {
        let existing = self.get(key).await?;
        if existing.as_ref().is_some_and(PipelineRun::is_terminal) {
            debug!(source_key = %key, "Ignoring status write for terminal run");
            return Ok(());
        }

        let is_new = existing.is_none();
        let mut run = existing.unwrap_or_else(|| PipelineRun::new_pending(key.clone(), ""));
        update.apply(&mut run);

        let mask = match update {
            StatusUpdate::Progress { .. } if !is_new => Some(&PROGRESS_MASK[..]),
            _ => None,
        };
        self.write(&run, mask).await
    }

    async fn health_check(&self) -> FirestoreResult<()> {
        self.client.get_document(RUNS, "_readiness").await.map(|_| ())
    }
}

pub struct FirestoreAnalysisStore {
    client: FirestoreClient,
}

impl FirestoreAnalysisStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }
}

fn analysis_doc_id(key: &SourceKey, modality: Modality) -> String {
    format!("{}_{}", key.document_id(), modality.as_str())
}

#[async_trait]
impl AnalysisStore for FirestoreAnalysisStore {
    async fn upsert_analysis(&self, record: &AnalysisRecord) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("source_key".to_string(), record.source_key.as_str().to_firestore_value());
        fields.insert("modality".to_string(), record.modality.as_str().to_firestore_value());
        fields.insert("payload".to_string(), record.payload.to_firestore_value());
        fields.insert("created_at".to_string(), record.created_at.to_firestore_value());

        self.client
            .upsert_document(
                ANALYSIS,
                &analysis_doc_id(&record.source_key, record.modality),
                fields,
                None,
            )
            .await?;
        info!(source_key = %record.source_key, modality = %record.modality, "Saved analysis record");
        Ok(())
    }

    async fn get_analysis(
        &self,
        key: &SourceKey,
        modality: Modality,
    ) -> FirestoreResult<Option<AnalysisRecord>> {
        let Some(doc) = self
            .client
            .get_document(ANALYSIS, &analysis_doc_id(key, modality))
            .await?
        else {
            return Ok(None);
        };

        Ok(Some(AnalysisRecord {
            source_key: key.clone(),
            modality,
            payload: doc.get::<Json>("payload").unwrap_or(Json::Null),
            created_at: doc.get("created_at").unwrap_or_else(Utc::now),
        }))
    }
}

pub struct FirestoreIdentityStore {
    client: FirestoreClient,
}

impl FirestoreIdentityStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentityStore for FirestoreIdentityStore {
    async fn upsert_identity(&self, identity: &ContentIdentity) -> FirestoreResult<()> {
        let Json::Object(map) = serde_json::to_value(identity)? else {
            return Err(FirestoreError::invalid_response("identity did not serialize to an object"));
        };
        let mut fields = json_object_to_fields(&map);
        fields.insert("updated_at".to_string(), identity.updated_at.to_firestore_value());

        self.client
            .upsert_document(CONTENT_IDENTITY, &identity.source_key.document_id(), fields, None)
            .await?;
        info!(
            source_key = %identity.source_key,
            show_type = %identity.show_type.as_str(),
            external_id = ?identity.external_id,
            "Saved content identity"
        );
        Ok(())
    }

    async fn get_identity(&self, key: &SourceKey) -> FirestoreResult<Option<ContentIdentity>> {
        match self.client.get_document(CONTENT_IDENTITY, &key.document_id()).await? {
            Some(doc) => {
                let object = fields_to_json_object(doc.fields.as_ref());
                Ok(Some(serde_json::from_value(Json::Object(object))?))
            }
            None => Ok(None),
        }
    }
}

fn run_to_fields(run: &PipelineRun) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), run.id.as_str().to_firestore_value());
    fields.insert("source_key".to_string(), run.source_key.as_str().to_firestore_value());
    fields.insert("owner_context_id".to_string(), run.owner_context_id.as_str().to_firestore_value());
    fields.insert("status".to_string(), run.status.as_str().to_firestore_value());
    fields.insert("progress".to_string(), run.progress.to_firestore_value());
    fields.insert("error_message".to_string(), run.error_message.to_firestore_value());
    fields.insert("message".to_string(), run.message.to_firestore_value());
    fields.insert("started_at".to_string(), run.started_at.to_firestore_value());
    fields.insert("updated_at".to_string(), run.updated_at.to_firestore_value());
    fields.insert("completed_at".to_string(), run.completed_at.to_firestore_value());
    fields
}

fn document_to_run(doc: &Document) -> FirestoreResult<PipelineRun> {
    let required = |name: &str| {
        doc.get::<String>(name)
            .ok_or_else(|| FirestoreError::invalid_response(format!("run document missing {}", name)))
    };

    let source_key = SourceKey::parse(&required("source_key")?)
        .map_err(|e| FirestoreError::invalid_response(e.to_string()))?;
    let status_str = required("status")?;
    let status = RunStatus::parse(&status_str)
        .ok_or_else(|| FirestoreError::invalid_response(format!("unknown run status {}", status_str)))?;
    let started_at: DateTime<Utc> = doc.get("started_at").unwrap_or_else(Utc::now);

    Ok(PipelineRun {
        id: RunId::from_string(required("id")?),
        source_key,
        owner_context_id: doc.get("owner_context_id").unwrap_or_default(),
        status,
        progress: doc.get("progress").unwrap_or(0),
        error_message: doc.get("error_message"),
        message: doc.get("message"),
        started_at,
        updated_at: doc.get("updated_at").unwrap_or(started_at),
        completed_at: doc.get("completed_at"),
    })
}
