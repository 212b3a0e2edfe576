//! Provider traits.
//!
//! The pipeline only sees these traits, so tests can swap in fakes for the
//! remote model and catalog.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use vingest_models::ContentType;

use crate::error::MlResult;

/// Multimodal model that answers a prompt about a set of images.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Send `prompt` followed by every image in one request; returns the raw text.
    async fn describe_images(&self, prompt: &str, images: &[PathBuf]) -> MlResult<String>;
}

/// Speech-to-text over a whole audio file.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &Path, prompt: &str) -> MlResult<String>;
}

/// Catalog section to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    Tv,
    Movie,
}

impl CatalogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Tv => "tv",
            CatalogKind::Movie => "movie",
        }
    }

    /// Only shows and movies are catalogued.
    pub fn from_content_type(content_type: ContentType) -> Option<Self> {
        match content_type {
            ContentType::TvShow => Some(CatalogKind::Tv),
            ContentType::Movie => Some(CatalogKind::Movie),
            ContentType::Other => None,
        }
    }
}

impl std::fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// External show/movie metadata catalog.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Search by title, optionally filtered by year. Results are in catalog order.
    async fn search(&self, kind: CatalogKind, query: &str, year: Option<i32>) -> MlResult<Vec<Value>>;

    /// Full details for one catalog id.
    async fn details(&self, kind: CatalogKind, id: i64) -> MlResult<Value>;

    /// Details of one TV episode.
    async fn episode(&self, tv_id: i64, season: u32, episode: u32) -> MlResult<Value>;
}
