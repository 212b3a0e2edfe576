//! Direct stream URL resolution.

use crate::command::{stderr_tail, ToolCommand, ToolOptions};
use crate::error::{MediaError, MediaResult};

/// Ask yt-dlp for a directly playable URL of the best combined format.
pub async fn resolve_stream_url(url: &str, options: &ToolOptions) -> MediaResult<String> {
    let output = ToolCommand::yt_dlp(options)
        .args(["-f", "best", "--get-url", "--no-playlist"])
        .arg(url)
        .output(options.timeout_secs)
        .await?;

    if !output.status.success() {
        return Err(MediaError::stream_unavailable(stderr_tail(&output)));
    }

    first_url_line(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| MediaError::stream_unavailable("yt-dlp returned no URL"))
}

fn first_url_line(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_url_line() {
        assert_eq!(
            first_url_line("\n  https://rr1.example.com/videoplayback?x=1\nhttps://second\n"),
            Some("https://rr1.example.com/videoplayback?x=1".to_string())
        );
        assert_eq!(first_url_line("\n \n"), None);
    }
}
