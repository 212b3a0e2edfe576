//! yt-dlp cookies file handling.
//!
//! yt-dlp writes cookies back after use, so a read-only source file is copied
//! into the working root first.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

/// Minimum size for a valid cookies file (bytes).
const MIN_COOKIES_FILE_SIZE: u64 = 50;

/// Whether `content` looks like a Netscape cookies file.
///
/// Accepts the standard header or any tab-separated line with at least six
/// fields.
pub fn is_valid_netscape_cookies(content: &str) -> bool {
    if content.starts_with("# Netscape HTTP Cookie File")
        || content.starts_with("# HTTP Cookie File")
    {
        return true;
    }

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .any(|line| line.split('\t').count() >= 6)
}

/// Validate `source` and copy it to a writable location under `work_root`.
///
/// Returns `None` when the file is missing, too small or not in Netscape
/// format.
pub async fn prepare_cookies(source: &Path, work_root: &Path) -> Option<PathBuf> {
    let metadata = match tokio::fs::metadata(source).await {
        Ok(m) => m,
        Err(_) => {
            debug!("Cookies file not found at {}, skipping", source.display());
            return None;
        }
    };

    if metadata.len() < MIN_COOKIES_FILE_SIZE {
        debug!(
            "Cookies file {} is too small ({} bytes), skipping",
            source.display(),
            metadata.len()
        );
        return None;
    }

    match tokio::fs::read_to_string(source).await {
        Ok(content) if is_valid_netscape_cookies(&content) => {}
        Ok(_) => {
            warn!(
                "Cookies file {} is not in Netscape format, skipping",
                source.display()
            );
            return None;
        }
        Err(e) => {
            warn!("Failed to read cookies file: {}", e);
            return None;
        }
    }

    if let Err(e) = tokio::fs::create_dir_all(work_root).await {
        warn!("Failed to create work root for cookies: {}", e);
        return None;
    }

    let writable = work_root.join("cookies.txt");
    if let Err(e) = tokio::fs::copy(source, &writable).await {
        warn!("Failed to copy cookies file: {}", e);
        return None;
    }

    info!("Using cookies file for yt-dlp authentication");
    Some(writable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const COOKIES: &str = "# Netscape HTTP Cookie File\n\
        .youtube.com\tTRUE\t/\tTRUE\t1735689600\tPREF\tf6=40000000\n";

    #[test]
    fn test_netscape_detection() {
        assert!(is_valid_netscape_cookies(COOKIES));
        assert!(is_valid_netscape_cookies(
            ".youtube.com\tTRUE\t/\tTRUE\t0\tSID\tabc"
        ));
        assert!(!is_valid_netscape_cookies("{\"cookies\": []}"));
        assert!(!is_valid_netscape_cookies("# just a comment\n"));
    }

    #[tokio::test]
    async fn test_prepare_cookies_copies_valid_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("cookies-src.txt");
        tokio::fs::write(&source, COOKIES).await.unwrap();

        let work = dir.path().join("work");
        let path = prepare_cookies(&source, &work).await.unwrap();
        assert_eq!(path, work.join("cookies.txt"));
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), COOKIES);
    }

    #[tokio::test]
    async fn test_prepare_cookies_rejects_invalid() {
        let dir = TempDir::new().unwrap();
        assert!(prepare_cookies(&dir.path().join("missing.txt"), dir.path())
            .await
            .is_none());

        let bad = dir.path().join("bad.txt");
        tokio::fs::write(&bad, "x".repeat(100)).await.unwrap();
        assert!(prepare_cookies(&bad, dir.path()).await.is_none());
    }
}
