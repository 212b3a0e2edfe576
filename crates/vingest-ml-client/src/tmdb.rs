//! TMDB v3 catalog client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{MlError, MlResult};
use crate::provider::{CatalogApi, CatalogKind};

pub const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

/// TMDB client configuration.
#[derive(Debug, Clone)]
pub struct TmdbConfig {
    /// v4 read access token, sent as a bearer token
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl TmdbConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_TMDB_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Load from environment variables. Returns `None` when no key is set.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("TMDB_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())?;

        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("TMDB_BASE_URL") {
            if !base_url.trim().is_empty() {
                config.base_url = base_url.trim_end_matches('/').to_string();
            }
        }
        Some(config)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Value>,
}

/// TMDB API client.
pub struct TmdbClient {
    config: TmdbConfig,
    client: Client,
}

impl TmdbClient {
    pub fn new(config: TmdbConfig) -> MlResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> MlResult<Value> {
        let url = format!("{}{}", self.config.base_url, path);
        debug!(url = %url, "TMDB request");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .query(&[("language", "en-US")])
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MlError::from_response(response).await);
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl CatalogApi for TmdbClient {
    async fn search(&self, kind: CatalogKind, query: &str, year: Option<i32>) -> MlResult<Vec<Value>> {
        let mut params = vec![
            ("query", query.to_string()),
            ("include_adult", "false".to_string()),
            ("page", "1".to_string()),
        ];
        if let Some(year) = year {
            let key = match kind {
                CatalogKind::Tv => "first_air_date_year",
                CatalogKind::Movie => "year",
            };
            params.push((key, year.to_string()));
        }

        let body = self.get(&format!("/search/{}", kind), &params).await?;
        let results = serde_json::from_value::<SearchResponse>(body)?.results;
        info!(kind = %kind, query, count = results.len(), "TMDB search finished");
        Ok(results)
    }

    async fn details(&self, kind: CatalogKind, id: i64) -> MlResult<Value> {
        self.get(&format!("/{}/{}", kind, id), &[]).await
    }

    async fn episode(&self, tv_id: i64, season: u32, episode: u32) -> MlResult<Value> {
        self.get(
            &format!("/tv/{}/season/{}/episode/{}", tv_id, season, episode),
            &[],
        )
        .await
    }
}
