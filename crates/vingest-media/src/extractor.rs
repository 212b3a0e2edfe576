//! Media extraction seam used by the pipeline.

use std::path::Path;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::audio::extract_audio;
use crate::captions::extract_captions;
use crate::command::{check_tools, ToolOptions};
use crate::cookies::prepare_cookies;
use crate::error::MediaResult;
use crate::frames::capture_frames;
use crate::probe::probe_stream;
use crate::stream::resolve_stream_url;
use crate::workdir::WorkArea;

/// Extracts modalities for one source into its working area.
///
/// Each operation is independent. `extract_frames` only errors when no
/// playable stream URL can be resolved; every other failure is `false`.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Write `[MM:SS] text` lines to the area's transcript file.
    async fn extract_transcript(&self, url: &str, area: &WorkArea) -> bool;

    /// Write the area's MP3 audio file.
    async fn extract_audio(&self, url: &str, area: &WorkArea) -> bool;

    /// Write one screenshot per `interval_secs` from t=0.
    async fn extract_frames(&self, url: &str, area: &WorkArea, interval_secs: u32)
        -> MediaResult<bool>;
}

/// [`MediaExtractor`] backed by yt-dlp, FFprobe and FFmpeg.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    options: ToolOptions,
}

impl YtDlpExtractor {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }

    /// Verify the tools are installed and stage the cookies file, if any.
    pub async fn init(
        work_root: &Path,
        timeout_secs: u64,
        cookies_source: Option<&Path>,
    ) -> MediaResult<Self> {
        check_tools()?;

        let cookies_path = match cookies_source {
            Some(source) => prepare_cookies(source, work_root).await,
            None => None,
        };

        Ok(Self::new(ToolOptions {
            timeout_secs,
            cookies_path,
        }))
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn extract_transcript(&self, url: &str, area: &WorkArea) -> bool {
        match extract_captions(url, area, &self.options).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, media_id = area.media_id(), "Caption extraction failed");
                false
            }
        }
    }

    async fn extract_audio(&self, url: &str, area: &WorkArea) -> bool {
        match extract_audio(url, area, &self.options).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, media_id = area.media_id(), "Audio extraction failed");
                false
            }
        }
    }

    async fn extract_frames(
        &self,
        url: &str,
        area: &WorkArea,
        interval_secs: u32,
    ) -> MediaResult<bool> {
        let stream_url = resolve_stream_url(url, &self.options).await?;

        let info = match probe_stream(&stream_url, self.options.timeout_secs).await {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, media_id = area.media_id(), "Failed to open video stream");
                return Ok(false);
            }
        };

        if info.fps <= 0.0 {
            warn!(media_id = area.media_id(), "Failed to retrieve video FPS");
            return Ok(false);
        }

        match capture_frames(&stream_url, &info, interval_secs, area, self.options.timeout_secs)
            .await
        {
            Ok(0) => Ok(false),
            Ok(count) => {
                info!(media_id = area.media_id(), count, "Frame extraction finished");
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, media_id = area.media_id(), "Frame capture failed");
                Ok(false)
            }
        }
    }
}
