//! Per-run working area.
//!
//! Layout is `{root}/{run_dir}/{audio,screenshots,transcripts}`, where
//! `run_dir` is private to one source key. File names carry the media id.
//! Files are transient and removed once a run succeeds.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};

/// Working directories and file names for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkArea {
    base: PathBuf,
    media_id: String,
}

impl WorkArea {
    pub fn new(root: impl AsRef<Path>, run_dir: &str, media_id: impl Into<String>) -> Self {
        Self {
            base: root.as_ref().join(run_dir),
            media_id: media_id.into(),
        }
    }

    pub fn media_id(&self) -> &str {
        &self.media_id
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.base.join("audio")
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.base.join("screenshots")
    }

    pub fn transcripts_dir(&self) -> PathBuf {
        self.base.join("transcripts")
    }

    pub fn transcript_file(&self) -> PathBuf {
        self.transcripts_dir()
            .join(format!("{}_transcript.txt", self.media_id))
    }

    /// yt-dlp output template for audio; the extension is filled in by yt-dlp.
    pub fn audio_template(&self) -> PathBuf {
        self.audio_dir()
            .join(format!("{}_audio.%(ext)s", self.media_id))
    }

    pub fn audio_file(&self) -> PathBuf {
        self.audio_dir().join(format!("{}_audio.mp3", self.media_id))
    }

    pub fn screenshot_file(&self, seconds: u64) -> PathBuf {
        self.screenshots_dir()
            .join(format!("{}_screenshot_{:04}.jpg", self.media_id, seconds))
    }

    /// Create the working directories.
    pub async fn prepare(&self) -> MediaResult<()> {
        for dir in [self.audio_dir(), self.screenshots_dir(), self.transcripts_dir()] {
            fs::create_dir_all(&dir).await?;
        }
        debug!(path = %self.base.display(), "Working area ready");
        Ok(())
    }

    /// List captured screenshots in timestamp order.
    pub async fn screenshots(&self) -> MediaResult<Vec<PathBuf>> {
        let dir = self.screenshots_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let prefix = format!("{}_screenshot_", self.media_id);
        let mut entries = fs::read_dir(&dir).await?;
        let mut shots = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && name.ends_with(".jpg") {
                shots.push(entry.path());
            }
        }

        // Padding is only four digits, so sort numerically
        shots.sort_by_key(|path| screenshot_seconds(path));
        Ok(shots)
    }

    /// Drop frames left behind by an earlier attempt.
    pub async fn reset_screenshots(&self) -> MediaResult<()> {
        let dir = self.screenshots_dir();
        if dir.exists() {
            fs::remove_dir_all(&dir).await?;
        }
        fs::create_dir_all(&dir).await?;
        Ok(())
    }

    /// Remove the whole working area.
    pub async fn cleanup(&self) -> MediaResult<()> {
        if !self.base.exists() {
            return Ok(());
        }
        fs::remove_dir_all(&self.base).await?;
        info!(path = %self.base.display(), "Removed working area");
        Ok(())
    }
}

fn screenshot_seconds(path: &Path) -> u64 {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.rsplit('_').next())
        .and_then(|secs| secs.parse().ok())
        .unwrap_or(u64::MAX)
}

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// Tries a rename first and falls back to copy-and-delete on EXDEV.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// EXDEV is error code 18 on Linux/macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let tmp_dst = dst.with_extension("tmp");

    fs::copy(src, &tmp_dst).await?;

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        fs::remove_file(&tmp_dst).await.ok();
        return Err(MediaError::from(e));
    }

    if let Err(e) = fs::remove_file(src).await {
        warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}
