//! Video ingestion handlers: submit, poll and read back analysis.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use vingest_models::{AnalysisRecord, ContentIdentity, RunStatus, SourceKey};
use vingest_worker::IngestOutcome;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

// ============================================================================
// Types
// ============================================================================

/// Body of `POST /api/video/process`.
#[derive(Debug, Deserialize)]
pub struct ProcessVideoRequest {
    pub video_url: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProcessVideoResponse {
    pub message: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct VideoQuery {
    pub video_url: String,
}

#[derive(Debug, Serialize)]
pub struct VideoStatusResponse {
    pub status: String,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VideoAnalysisResponse {
    pub video_url: String,
    pub analysis_count: usize,
    pub analysis_data: Vec<AnalysisRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_identity: Option<ContentIdentity>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Admit a video for ingestion. Returns before any stage runs.
pub async fn process_video(
    State(state): State<AppState>,
    Json(request): Json<ProcessVideoRequest>,
) -> ApiResult<(StatusCode, Json<ProcessVideoResponse>)> {
    let (Some(video_url), Some(session_id)) = (request.video_url, request.session_id) else {
        return Err(ApiError::bad_request("video_url and session_id are required"));
    };

    let handle = state.pipeline.ingest(&video_url, &session_id).await?;
    metrics::record_ingest_request(&handle.outcome);

    let (status, body) = match handle.outcome {
        IngestOutcome::Started => {
            info!(video_url = %video_url, session_id = %session_id, "Video processing started");
            (
                StatusCode::ACCEPTED,
                ProcessVideoResponse {
                    message: "Video processing started".to_string(),
                    status: RunStatus::Pending.as_str().to_string(),
                    progress: None,
                },
            )
        }
        IngestOutcome::InProgress => (
            StatusCode::OK,
            ProcessVideoResponse {
                message: "Video processing already in progress".to_string(),
                status: handle.status().as_str().to_string(),
                progress: Some(handle.progress()),
            },
        ),
        IngestOutcome::AlreadyCompleted => (
            StatusCode::OK,
            ProcessVideoResponse {
                message: "Video already processed".to_string(),
                status: RunStatus::Completed.as_str().to_string(),
                progress: None,
            },
        ),
    };

    Ok((status, Json(body)))
}

/// Poll ingestion status. The status row wins over stored analysis.
pub async fn get_video_status(
    State(state): State<AppState>,
    Query(query): Query<VideoQuery>,
) -> ApiResult<Json<VideoStatusResponse>> {
    let key = SourceKey::parse(&query.video_url)?;

    if let Some(run) = state.stores.runs.get(&key).await? {
        return Ok(Json(VideoStatusResponse {
            status: run.status.as_str().to_string(),
            progress: run.progress,
            message: run.message,
            error_message: run.error_message,
            updated_at: Some(run.updated_at.to_rfc3339()),
        }));
    }

    // Same rule ingest uses to skip a source
    let response = if state.stores.analysis.has_complete_analysis(&key).await? {
        VideoStatusResponse {
            status: RunStatus::Completed.as_str().to_string(),
            progress: 100,
            message: Some("Video analysis available".to_string()),
            error_message: None,
            updated_at: None,
        }
    } else {
        VideoStatusResponse {
            status: RunStatus::NotStarted.as_str().to_string(),
            progress: 0,
            message: Some("Video processing not started".to_string()),
            error_message: None,
            updated_at: None,
        }
    };

    Ok(Json(response))
}

/// Every stored analysis record plus the content identity for one video.
pub async fn get_video_analysis(
    State(state): State<AppState>,
    Query(query): Query<VideoQuery>,
) -> ApiResult<Json<VideoAnalysisResponse>> {
    let key = SourceKey::parse(&query.video_url)?;

    let records = state.stores.analysis.list_analysis(&key).await?;
    let identity = state.stores.identity.get_identity(&key).await?;

    if records.is_empty() && identity.is_none() {
        return Err(ApiError::not_found("No analysis data found for this video"));
    }

    Ok(Json(VideoAnalysisResponse {
        video_url: key.as_str().to_string(),
        analysis_count: records.len(),
        analysis_data: records,
        content_identity: identity,
    }))
}
