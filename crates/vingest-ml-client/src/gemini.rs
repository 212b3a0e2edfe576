//! Gemini client for frame descriptions and audio transcription.
//!
//! Uses the REST `generateContent` endpoint. Images and small audio files are
//! sent inline as base64; larger audio goes through the Files API and is
//! referenced by URI once the upload is `ACTIVE`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{MlError, MlResult};
use crate::provider::{SpeechToText, VisionModel};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Inline request payload limit for audio (18 MiB).
pub const INLINE_AUDIO_LIMIT: u64 = 18 * 1024 * 1024;

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    /// Audio above this size is uploaded instead of inlined
    pub inline_audio_limit: u64,
    /// Delay between upload state polls
    pub poll_interval: Duration,
    /// Give up waiting for an upload after this many polls
    pub max_polls: u32,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout: Duration::from_secs(300),
            inline_audio_limit: INLINE_AUDIO_LIMIT,
            poll_interval: Duration::from_secs(2),
            max_polls: 150,
        }
    }

    /// Load from environment variables.
    pub fn from_env() -> MlResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| MlError::config("GEMINI_API_KEY not set"))?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            if !base_url.trim().is_empty() {
                config.base_url = base_url.trim_end_matches('/').to_string();
            }
        }
        config.timeout = Duration::from_secs(
            std::env::var("GEMINI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        );
        Ok(config)
    }
}

/// Gemini API request.
#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: Blob },
    FileData { file_data: FileRef },
}

#[derive(Debug, Serialize)]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct FileRef {
    mime_type: String,
    file_uri: String,
}

/// Gemini API response.
#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedFile {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    state: Option<String>,
}

/// Gemini API client.
pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> MlResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> MlResult<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }

    async fn generate(&self, parts: Vec<Part>) -> MlResult<String> {
        let request = GenerateRequest {
            contents: vec![Content { parts }],
        };

        let response = self
            .client
            .post(self.generate_url())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MlError::from_response(response).await);
        }

        let body: GenerateResponse = response.json().await?;
        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(MlError::EmptyResponse);
        }
        Ok(text)
    }

    /// Upload a file through the Files API and wait until it is `ACTIVE`.
    async fn upload_file(&self, path: &Path, mime_type: &str) -> MlResult<UploadedFile> {
        let bytes = tokio::fs::read(path).await?;
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());

        let metadata = serde_json::json!({ "file": { "display_name": display_name } });
        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata.to_string()).mime_str("application/json")?,
            )
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes)
                    .file_name(display_name)
                    .mime_str(mime_type)?,
            );

        let response = self
            .client
            .post(format!("{}/upload/v1beta/files", self.config.base_url))
            .query(&[("key", self.config.api_key.as_str())])
            .header("X-Goog-Upload-Protocol", "multipart")
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MlError::from_response(response).await);
        }

        let mut file = response.json::<UploadResponse>().await?.file;
        info!(name = %file.name, "Uploaded file to Gemini");

        for _ in 0..self.config.max_polls {
            match file.state.as_deref() {
                Some("ACTIVE") | None => return Ok(file),
                Some("FAILED") => {
                    return Err(MlError::FileState(format!("{} processing failed", file.name)))
                }
                Some(state) => debug!(name = %file.name, state, "Waiting for file processing"),
            }

            tokio::time::sleep(self.config.poll_interval).await;
            file = self.get_file(&file.name).await?;
        }

        Err(MlError::FileState(format!(
            "{} still processing after {} polls",
            file.name, self.config.max_polls
        )))
    }

    async fn get_file(&self, name: &str) -> MlResult<UploadedFile> {
        let response = self
            .client
            .get(format!("{}/v1beta/{}", self.config.base_url, name))
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MlError::from_response(response).await);
        }
        Ok(response.json().await?)
    }

    async fn delete_file(&self, name: &str) {
        let result = self
            .client
            .delete(format!("{}/v1beta/{}", self.config.base_url, name))
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await;

        if let Err(e) = result {
            warn!(name, error = %e, "Failed to delete uploaded file");
        }
    }
}

#[async_trait]
impl VisionModel for GeminiClient {
    async fn describe_images(&self, prompt: &str, images: &[PathBuf]) -> MlResult<String> {
        let mut parts = vec![Part::Text {
            text: prompt.to_string(),
        }];

        for path in images {
            match tokio::fs::read(path).await {
                Ok(bytes) => parts.push(Part::InlineData {
                    inline_data: Blob {
                        mime_type: "image/jpeg".to_string(),
                        data: BASE64.encode(bytes),
                    },
                }),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable image"),
            }
        }

        if parts.len() == 1 {
            return Err(MlError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No valid images could be loaded",
            )));
        }

        info!(images = parts.len() - 1, model = %self.config.model, "Analyzing images");
        self.generate(parts).await
    }
}

#[async_trait]
impl SpeechToText for GeminiClient {
    async fn transcribe(&self, audio: &Path, prompt: &str) -> MlResult<String> {
        let size = tokio::fs::metadata(audio).await?.len();
        let mime_type = "audio/mpeg";

        if size <= self.config.inline_audio_limit {
            let bytes = tokio::fs::read(audio).await?;
            let parts = vec![
                Part::Text {
                    text: prompt.to_string(),
                },
                Part::InlineData {
                    inline_data: Blob {
                        mime_type: mime_type.to_string(),
                        data: BASE64.encode(bytes),
                    },
                },
            ];
            return self.generate(parts).await;
        }

        info!(size, "Audio exceeds inline limit, using Files API");
        let file = self.upload_file(audio, mime_type).await?;
        let parts = vec![
            Part::Text {
                text: prompt.to_string(),
            },
            Part::FileData {
                file_data: FileRef {
                    mime_type: mime_type.to_string(),
                    file_uri: file.uri.clone(),
                },
            },
        ];

        let result = self.generate(parts).await;
        self.delete_file(&file.name).await;
        result
    }
}
