//! Ingestion configuration.

use std::path::PathBuf;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Root of the per-video working areas
    pub work_dir: PathBuf,
    /// Seconds between captured frames
    pub frame_interval_secs: u32,
    /// Timeout for each yt-dlp / FFmpeg invocation
    pub tool_timeout_secs: u64,
    /// Netscape cookies file handed to yt-dlp
    pub cookies_path: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/vingest"),
            frame_interval_secs: 10,
            tool_timeout_secs: 1800,
            cookies_path: None,
        }
    }
}

impl IngestConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            frame_interval_secs: std::env::var("FRAME_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.frame_interval_secs),
            tool_timeout_secs: std::env::var("TOOL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.tool_timeout_secs),
            cookies_path: std::env::var("YTDLP_COOKIES_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env_with_fallbacks() {
        std::env::set_var("WORK_DIR", "/data/vingest");
        std::env::set_var("FRAME_INTERVAL_SECS", "0");
        std::env::set_var("TOOL_TIMEOUT_SECS", "not-a-number");
        std::env::set_var("YTDLP_COOKIES_PATH", " ");

        let config = IngestConfig::from_env();
        assert_eq!(config.work_dir, PathBuf::from("/data/vingest"));
        assert_eq!(config.frame_interval_secs, 10);
        assert_eq!(config.tool_timeout_secs, 1800);
        assert!(config.cookies_path.is_none());

        for name in ["WORK_DIR", "FRAME_INTERVAL_SECS", "TOOL_TIMEOUT_SECS", "YTDLP_COOKIES_PATH"] {
            std::env::remove_var(name);
        }
    }
}
