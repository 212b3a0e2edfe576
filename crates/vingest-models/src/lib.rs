//! Shared data models for the vingest backend.
//!
//! Types here are shared by the worker, the stores and the API:
//! source identification, run status, analysis records and content identity.

pub mod analysis;
pub mod identity;
pub mod run;
pub mod source;
pub mod timestamp;

pub use analysis::{AnalysisRecord, FrameDescription, Modality, TranscriptSegment};
pub use identity::{ContentIdentity, ContentType, Identification};
pub use run::{PipelineRun, RunId, RunStatus};
pub use source::{extract_youtube_id, SourceKey, SourceKeyError, YoutubeIdError};
pub use timestamp::{format_mmss, parse_mmss, TimestampError};
