//! Pipeline run status tracking.
//!
//! One [`PipelineRun`] row exists per source key. It is created `pending`,
//! moves through `processing` with non-decreasing progress, and ends in
//! exactly one terminal state.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::source::SourceKey;

/// Unique identifier for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Create a new random run id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Run processing status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No run has ever been requested for the key
    #[default]
    NotStarted,
    /// Run accepted, task not yet picked up
    Pending,
    /// Stages are executing
    Processing,
    /// At least one primary modality was produced
    Completed,
    /// Nothing usable was produced, or setup failed
    Failed,
}

impl RunStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::NotStarted => "not_started",
            RunStatus::Pending => "pending",
            RunStatus::Processing => "processing",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    /// Parse from the stored string form. Unknown values map to `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(RunStatus::NotStarted),
            "pending" => Some(RunStatus::Pending),
            "processing" => Some(RunStatus::Processing),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Check if a run in this state is still in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Pending | RunStatus::Processing)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status row for one ingestion attempt of a source key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineRun {
    /// Unique run identifier
    pub id: RunId,
    /// Source the run ingests
    pub source_key: SourceKey,
    /// Opaque caller context (chat session id)
    pub owner_context_id: String,
    /// Current status
    pub status: RunStatus,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Error message if the run failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Completion summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When the run was created
    pub started_at: DateTime<Utc>,
    /// When the row was last written
    pub updated_at: DateTime<Utc>,
    /// When the run reached a terminal state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// Create a new pending run.
    pub fn new_pending(source_key: SourceKey, owner_context_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: RunId::new(),
            source_key,
            owner_context_id: owner_context_id.into(),
            status: RunStatus::Pending,
            progress: 0,
            error_message: None,
            message: None,
            started_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Check if the run is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply an intermediate status/progress update.
    ///
    /// Terminal rows are left untouched. Progress never decreases and is
    /// capped below 100 until the run completes.
    pub fn advance(&mut self, status: RunStatus, progress: Option<u8>) {
        if self.is_terminal() {
            return;
        }
        self.status = status;
        if let Some(p) = progress {
            self.progress = self.progress.max(p.min(99));
        }
        self.updated_at = Utc::now();
    }

    /// Mark run as completed.
    pub fn complete(&mut self, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        let now = Utc::now();
        self.status = RunStatus::Completed;
        self.progress = 100;
        self.message = Some(message.into());
        self.updated_at = now;
        self.completed_at = Some(now);
    }

    /// Mark run as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        let now = Utc::now();
        self.status = RunStatus::Failed;
        self.error_message = Some(error.into());
        self.updated_at = now;
        self.completed_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SourceKey {
        SourceKey::parse("https://youtu.be/dQw4w9WgXcQ").unwrap()
    }

    #[test]
    fn test_run_creation() {
        let run = PipelineRun::new_pending(key(), "session-1");
        assert_eq!(run.status, RunStatus::Pending);
        assert_eq!(run.progress, 0);
        assert!(run.completed_at.is_none());
        assert!(!run.is_terminal());
    }

    #[test]
    fn test_run_transitions() {
        let mut run = PipelineRun::new_pending(key(), "session-1");

        run.advance(RunStatus::Processing, Some(40));
        assert_eq!(run.status, RunStatus::Processing);
        assert_eq!(run.progress, 40);

        // Progress never goes backwards
        run.advance(RunStatus::Processing, Some(20));
        assert_eq!(run.progress, 40);

        // 100 is reserved for completion
        run.advance(RunStatus::Processing, Some(100));
        assert_eq!(run.progress, 99);

        run.complete("Successfully processed: transcript");
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.progress, 100);
        assert!(run.completed_at.is_some());
        assert!(run.is_terminal());
    }

    #[test]
    fn test_terminal_runs_are_immutable() {
        let mut run = PipelineRun::new_pending(key(), "session-1");
        run.fail("Failed to extract video ID from URL");
        let snapshot = run.clone();

        run.advance(RunStatus::Processing, Some(50));
        run.complete("late");
        assert_eq!(run, snapshot);
        assert_eq!(run.error_message.as_deref(), Some("Failed to extract video ID from URL"));
    }

    #[test]
    fn test_status_serde_and_parse() {
        let json = serde_json::to_string(&RunStatus::NotStarted).unwrap();
        assert_eq!(json, "\"not_started\"");

        for status in [
            RunStatus::NotStarted,
            RunStatus::Pending,
            RunStatus::Processing,
            RunStatus::Completed,
            RunStatus::Failed,
        ] {
            assert_eq!(RunStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RunStatus::parse("queued"), None);
        assert!(RunStatus::Pending.is_active());
        assert!(!RunStatus::Failed.is_active());
    }
}
