//! Caption track download and WebVTT parsing.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::command::{stderr_tail, ToolCommand, ToolOptions};
use crate::error::MediaResult;
use crate::workdir::WorkArea;
use vingest_models::format_mmss;

static CUE_TIMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:\d+:)?\d{2}:\d{2})\.\d{3}\s+-->").expect("valid cue timing regex")
});
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));

/// Caption tracks to try, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionPreference {
    /// Uploader-provided English
    ManualEnglish,
    /// Auto-generated English
    GeneratedEnglish,
    /// Uploader-provided, any language
    AnyManual,
}

impl CaptionPreference {
    pub const ORDER: [CaptionPreference; 3] = [
        CaptionPreference::ManualEnglish,
        CaptionPreference::GeneratedEnglish,
        CaptionPreference::AnyManual,
    ];

    fn args(&self) -> [&'static str; 3] {
        match self {
            CaptionPreference::ManualEnglish => ["--write-sub", "--sub-langs", "en,en-US"],
            CaptionPreference::GeneratedEnglish => ["--write-auto-sub", "--sub-langs", "en,en-US"],
            CaptionPreference::AnyManual => ["--write-sub", "--sub-langs", "all"],
        }
    }
}

/// Download the best caption track and write it as `[MM:SS] text` lines.
///
/// Returns `Ok(false)` when no track yields any caption text.
pub async fn extract_captions(
    url: &str,
    area: &WorkArea,
    options: &ToolOptions,
) -> MediaResult<bool> {
    tokio::fs::create_dir_all(area.transcripts_dir()).await?;
    let template = area
        .transcripts_dir()
        .join(format!("{}_captions.%(ext)s", area.media_id()));

    for preference in CaptionPreference::ORDER {
        remove_vtt_files(area).await?;

        let output = ToolCommand::yt_dlp(options)
            .args(preference.args())
            .args(["--skip-download", "--sub-format", "vtt", "--no-playlist", "-o"])
            .arg(template.to_string_lossy())
            .arg(url)
            .output(options.timeout_secs)
            .await?;

        if !output.status.success() {
            debug!(
                ?preference,
                error = %stderr_tail(&output),
                "yt-dlp caption download failed"
            );
            continue;
        }

        let vtt_files = find_vtt_files(area).await?;
        let Some(vtt_path) = vtt_files.first() else {
            debug!(?preference, "No caption track available");
            continue;
        };

        let content = tokio::fs::read_to_string(vtt_path).await?;
        let lines = parse_vtt(&content);
        if lines.is_empty() {
            warn!(?preference, path = %vtt_path.display(), "Caption track had no text");
            continue;
        }

        tokio::fs::write(area.transcript_file(), render_transcript(&lines)).await?;
        remove_vtt_files(area).await?;

        info!(
            ?preference,
            lines = lines.len(),
            path = %area.transcript_file().display(),
            "Saved caption transcript"
        );
        return Ok(true);
    }

    Ok(false)
}

/// Caption `.vtt` files for the area, English tracks first.
async fn find_vtt_files(area: &WorkArea) -> MediaResult<Vec<PathBuf>> {
    let prefix = format!("{}_captions", area.media_id());
    let mut entries = tokio::fs::read_dir(area.transcripts_dir()).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(&prefix) && name.ends_with(".vtt") {
            files.push(entry.path());
        }
    }

    files.sort_by_key(|path| {
        let name = path.file_name().map(|n| n.to_string_lossy().to_string());
        let english = name.is_some_and(|n| n.contains(".en"));
        (!english, path.clone())
    });
    Ok(files)
}

async fn remove_vtt_files(area: &WorkArea) -> MediaResult<()> {
    for path in find_vtt_files(area).await? {
        tokio::fs::remove_file(path).await.ok();
    }
    Ok(())
}

/// Parse WebVTT content into `(start_seconds, text)` lines.
///
/// Tags are stripped, cue numbers dropped and consecutive duplicate lines
/// from rolling captions removed.
pub fn parse_vtt(content: &str) -> Vec<(u64, String)> {
    let mut lines = Vec::new();
    let mut current_secs: u64 = 0;
    let mut last_text = String::new();
    let mut in_header = true;

    for raw in content.lines() {
        let raw = raw.trim();

        if let Some(caps) = CUE_TIMING.captures(raw) {
            current_secs = hms_to_seconds(&caps[1]);
            in_header = false;
            continue;
        }

        // WEBVTT header block plus its Kind:/Language: metadata
        if in_header {
            continue;
        }

        let text = TAG.replace_all(raw, "");
        let text = text.trim();

        if text.is_empty() || text.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        if text != last_text {
            lines.push((current_secs, text.to_string()));
            last_text = text.to_string();
        }
    }

    lines
}

/// Render lines in the `[MM:SS] text` transcript format.
pub fn render_transcript(lines: &[(u64, String)]) -> String {
    lines
        .iter()
        .map(|(secs, text)| format!("[{}] {}\n", format_mmss(*secs), text))
        .collect()
}

fn hms_to_seconds(ts: &str) -> u64 {
    ts.split(':')
        .filter_map(|part| part.parse::<u64>().ok())
        .fold(0, |acc, part| acc * 60 + part)
}
