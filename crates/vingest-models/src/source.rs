//! Source identification.
//!
//! A [`SourceKey`] is the stable join key for everything the pipeline stores
//! about one video. The platform media id (the YouTube video id) is derived
//! from it separately and only names local working files.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised while deriving a [`SourceKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceKeyError {
    #[error("Source URL is empty")]
    Empty,

    #[error("Source URL is not a valid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// Stable identifier for one ingestible video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SourceKey(String);

impl SourceKey {
    /// Derive a source key from a user-supplied URL.
    pub fn parse(source_url: &str) -> Result<Self, SourceKeyError> {
        let trimmed = source_url.trim();
        if trimmed.is_empty() {
            return Err(SourceKeyError::Empty);
        }

        let parsed = url::Url::parse(trimmed)
            .map_err(|e| SourceKeyError::InvalidUrl(format!("{}: {}", trimmed, e)))?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(SourceKeyError::UnsupportedScheme(other.to_string())),
        }

        if parsed.host_str().is_none() {
            return Err(SourceKeyError::InvalidUrl(trimmed.to_string()));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Platform media id used for working file names.
    pub fn media_id(&self) -> Result<String, YoutubeIdError> {
        extract_youtube_id(&self.0)
    }

    /// Storage-safe document id (hex SHA-256 of the key).
    pub fn document_id(&self) -> String {
        format!("{:x}", Sha256::digest(self.0.as_bytes()))
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SourceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Errors that can occur during YouTube ID extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum YoutubeIdError {
    #[error("URL is not a valid YouTube URL")]
    InvalidYoutubeUrl,

    #[error("Video ID has invalid format")]
    InvalidVideoId,

    #[error("Video ID not found in URL")]
    VideoIdNotFound,
}

/// Extract the 11-character YouTube video id from a URL.
///
/// Supports `watch?v=`, `youtu.be/`, `/embed/`, `/e/`, `/v/`, `/shorts/`
/// and channel-style `/user/<name>/<id>` paths, with or without scheme,
/// `www.` prefix, query parameters or fragments.
pub fn extract_youtube_id(url: &str) -> Result<String, YoutubeIdError> {
    let url = url.trim();

    if !is_youtube_domain(url) {
        return Err(YoutubeIdError::InvalidYoutubeUrl);
    }

    let lower = url.to_ascii_lowercase();
    let strategies: [fn(&str, &str) -> Option<String>; 3] =
        [from_query_param, from_short_host, from_path_marker];

    for strategy in strategies {
        if let Some(id) = strategy(url, &lower) {
            return validate_youtube_id(id);
        }
    }

    Err(YoutubeIdError::VideoIdNotFound)
}

fn is_youtube_domain(url: &str) -> bool {
    let url = url.to_ascii_lowercase();
    url.contains("youtube.com") || url.contains("youtu.be")
}

/// `youtube.com/watch?v=ID` or `...&v=ID`
fn from_query_param(url: &str, lower: &str) -> Option<String> {
    let pos = lower.find("?v=").or_else(|| lower.find("&v="))?;
    Some(take_segment(&url[pos + 3..]))
}

/// `youtu.be/ID`
fn from_short_host(url: &str, lower: &str) -> Option<String> {
    let pos = lower.find("youtu.be/")?;
    Some(take_segment(&url[pos + 9..]))
}

/// `/embed/ID`, `/e/ID`, `/v/ID`, `/shorts/ID`, `/live/ID`
fn from_path_marker(url: &str, lower: &str) -> Option<String> {
    const MARKERS: [&str; 5] = ["/embed/", "/shorts/", "/live/", "/v/", "/e/"];

    for marker in MARKERS {
        if let Some(pos) = lower.find(marker) {
            return Some(take_segment(&url[pos + marker.len()..]));
        }
    }

    // Channel-style paths ending in an id: /user/<name>/<id>
    let path_start = lower.find("youtube.com/")? + "youtube.com/".len();
    let path = &url[path_start..];
    let path = &path[..path.find(['?', '#']).unwrap_or(path.len())];
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() >= 3 {
        return segments.last().map(|s| s.to_string());
    }

    None
}

fn take_segment(segment: &str) -> String {
    let end = segment
        .find(['&', '#', '?', '/'])
        .unwrap_or(segment.len());
    segment[..end].trim().to_string()
}

fn validate_youtube_id(id: String) -> Result<String, YoutubeIdError> {
    if id.is_empty() {
        return Err(YoutubeIdError::VideoIdNotFound);
    }
    if id.len() != 11 {
        return Err(YoutubeIdError::InvalidVideoId);
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(YoutubeIdError::InvalidVideoId);
    }
    Ok(id)
}
