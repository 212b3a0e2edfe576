//! Audio track download.

use tracing::{info, warn};

use crate::command::{stderr_tail, ToolCommand, ToolOptions};
use crate::error::{MediaError, MediaResult};
use crate::workdir::WorkArea;

/// Download the best audio stream and convert it to 192K MP3.
///
/// Succeeds only if `{id}_audio.mp3` exists afterwards.
pub async fn extract_audio(url: &str, area: &WorkArea, options: &ToolOptions) -> MediaResult<()> {
    tokio::fs::create_dir_all(area.audio_dir()).await?;

    let output = ToolCommand::yt_dlp(options)
        .args([
            "-f",
            "bestaudio/best",
            "-x",
            "--audio-format",
            "mp3",
            "--audio-quality",
            "192K",
            "--no-playlist",
            "-o",
        ])
        .arg(area.audio_template().to_string_lossy())
        .arg(url)
        .output(options.timeout_secs)
        .await?;

    if !output.status.success() {
        let error_msg = stderr_tail(&output);
        warn!(url = %url, error = %error_msg, "yt-dlp audio download failed");
        return Err(MediaError::download_failed(format!(
            "yt-dlp failed: {}",
            error_msg
        )));
    }

    let audio_file = area.audio_file();
    if !audio_file.exists() {
        return Err(MediaError::download_failed("Audio file not created"));
    }

    let size = tokio::fs::metadata(&audio_file).await?.len();
    info!(
        output = %audio_file.display(),
        size_mb = size as f64 / (1024.0 * 1024.0),
        "Downloaded audio successfully"
    );

    Ok(())
}
