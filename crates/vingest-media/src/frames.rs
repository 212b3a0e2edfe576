//! Periodic frame capture.

use tracing::{debug, info};

use crate::command::FfmpegCommand;
use crate::error::MediaResult;
use crate::probe::StreamInfo;
use crate::workdir::{move_file, WorkArea};

const CAPTURE_DIR: &str = ".capture";
const CAPTURE_PREFIX: &str = "capture_";

/// Number of frames sampled at `interval_secs` from t=0.
pub fn frame_count(duration_secs: f64, interval_secs: u32) -> u64 {
    if interval_secs == 0 || !duration_secs.is_finite() || duration_secs <= 0.0 {
        return 0;
    }
    (duration_secs / f64::from(interval_secs)).floor() as u64
}

/// Capture one JPEG per interval into the screenshots directory.
///
/// Captures are named `{id}_screenshot_{seconds:04}.jpg`. Returns the number
/// of frames written.
pub async fn capture_frames(
    stream_url: &str,
    info: &StreamInfo,
    interval_secs: u32,
    area: &WorkArea,
    timeout_secs: u64,
) -> MediaResult<u64> {
    let count = frame_count(info.duration, interval_secs);
    if count == 0 {
        debug!(duration = info.duration, interval_secs, "Stream too short for any frame");
        return Ok(0);
    }

    let capture_dir = area.screenshots_dir().join(CAPTURE_DIR);
    tokio::fs::create_dir_all(&capture_dir).await?;

    FfmpegCommand::new(stream_url, capture_dir.join(format!("{}%05d.jpg", CAPTURE_PREFIX)))
        .video_filter(format!("fps=1/{}", interval_secs))
        .max_frames(count)
        .quality(2)
        .output_arg("-start_number")
        .output_arg("0")
        .run(timeout_secs)
        .await?;

    let mut entries = tokio::fs::read_dir(&capture_dir).await?;
    let mut captures = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if let Some(index) = capture_index(&entry.file_name().to_string_lossy()) {
            captures.push((index, entry.path()));
        }
    }
    captures.sort();

    for (index, path) in &captures {
        move_file(path, area.screenshot_file(index * u64::from(interval_secs))).await?;
    }
    tokio::fs::remove_dir_all(&capture_dir).await.ok();

    info!(
        frames = captures.len(),
        interval_secs,
        dir = %area.screenshots_dir().display(),
        "Captured frames"
    );
    Ok(captures.len() as u64)
}

/// Zero-based index from a `capture_00003.jpg` style name.
fn capture_index(name: &str) -> Option<u64> {
    name.strip_prefix(CAPTURE_PREFIX)?
        .strip_suffix(".jpg")?
        .parse()
        .ok()
}
