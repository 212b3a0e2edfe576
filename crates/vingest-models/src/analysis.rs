//! Persisted analysis outputs.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::source::SourceKey;
use crate::timestamp::format_mmss;

/// Kind of analysis stored for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Transcript,
    FrameDescriptions,
    ContentIdentification,
}

impl Modality {
    pub const ALL: [Modality; 3] = [
        Modality::Transcript,
        Modality::FrameDescriptions,
        Modality::ContentIdentification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Transcript => "transcript",
            Modality::FrameDescriptions => "frame_descriptions",
            Modality::ContentIdentification => "content_identification",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One modality's output for one source. Upserts replace the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisRecord {
    pub source_key: SourceKey,
    pub modality: Modality,
    /// Modality-specific JSON (see the segment/description types)
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn new(source_key: SourceKey, modality: Modality, payload: serde_json::Value) -> Self {
        Self {
            source_key,
            modality,
            payload,
            created_at: Utc::now(),
        }
    }
}

/// A timestamped transcript line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    /// `MM:SS` offset as written in the transcript
    pub timestamp: String,
    pub seconds: u64,
    pub text: String,
}

impl TranscriptSegment {
    /// Build a segment from an offset in seconds.
    pub fn at(seconds: u64, text: impl Into<String>) -> Self {
        Self {
            timestamp: format_mmss(seconds),
            seconds,
            text: text.into(),
        }
    }
}

/// AI description of one captured frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FrameDescription {
    pub timestamp: String,
    pub seconds: u64,
    pub filename: String,
    pub description: String,
}
