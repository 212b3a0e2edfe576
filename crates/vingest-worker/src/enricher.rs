//! Catalog enrichment for identified shows and movies.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};
use vingest_ml_client::{CatalogApi, CatalogKind};
use vingest_models::ContentType;

/// What to look up.
#[derive(Debug, Clone, Copy)]
pub struct CatalogQuery<'a> {
    pub title: &'a str,
    pub content_type: ContentType,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub year: Option<i32>,
}

pub struct MetadataEnricher {
    catalog: Arc<dyn CatalogApi>,
}

impl MetadataEnricher {
    pub fn new(catalog: Arc<dyn CatalogApi>) -> Self {
        Self { catalog }
    }

    /// Search, take the first result and fetch its details.
    ///
    /// TV shows with a season and episode get `{show_info, episode_info}`.
    /// Returns `None` when nothing matches or any catalog call fails.
    pub async fn enrich(&self, query: CatalogQuery<'_>) -> Option<Value> {
        let kind = CatalogKind::from_content_type(query.content_type)?;

        let results = match self.catalog.search(kind, query.title, query.year).await {
            Ok(results) => results,
            Err(e) => {
                warn!(title = query.title, error = %e, "Catalog search failed");
                return None;
            }
        };
        let total_results = results.len();

        // First result wins; the catalog orders by relevance.
        let Some(id) = results.first().and_then(|r| r.get("id")).and_then(Value::as_i64) else {
            info!(title = query.title, kind = %kind, "No catalog match");
            return None;
        };

        let mut details = match self.catalog.details(kind, id).await {
            Ok(details) => details,
            Err(e) => {
                warn!(catalog_id = id, error = %e, "Catalog details failed");
                return None;
            }
        };

        if let Value::Object(map) = &mut details {
            map.insert(
                "_search_metadata".to_string(),
                json!({
                    "search_query": query.title,
                    "search_year": query.year,
                    "content_type": kind.as_str(),
                    "total_results": total_results,
                }),
            );
        }
        info!(title = query.title, catalog_id = id, "Found catalog match");

        let (CatalogKind::Tv, Some(season), Some(episode)) = (kind, query.season, query.episode) else {
            return Some(details);
        };

        match self.catalog.episode(id, season, episode).await {
            Ok(episode_info) => Some(json!({
                "show_info": details,
                "episode_info": episode_info,
            })),
            Err(e) => {
                warn!(catalog_id = id, season, episode, error = %e, "Episode lookup failed, keeping show details");
                Some(details)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use vingest_ml_client::{MlError, MlResult};

    struct FakeCatalog {
        results: Vec<Value>,
        fail_search: bool,
        fail_episode: bool,
    }

    #[async_trait]
    impl CatalogApi for FakeCatalog {
        async fn search(&self, _kind: CatalogKind, _query: &str, _year: Option<i32>) -> MlResult<Vec<Value>> {
            if self.fail_search {
                return Err(MlError::Api { status: 500, body: "down".into() });
            }
            Ok(self.results.clone())
        }

        async fn details(&self, kind: CatalogKind, id: i64) -> MlResult<Value> {
            Ok(json!({"id": id, "kind": kind.as_str(), "name": "Breaking Bad"}))
        }

        async fn episode(&self, _tv_id: i64, season: u32, episode: u32) -> MlResult<Value> {
            if self.fail_episode {
                return Err(MlError::Api { status: 404, body: "missing".into() });
            }
            Ok(json!({"season_number": season, "episode_number": episode, "name": "Ozymandias"}))
        }
    }

    fn enricher(results: Vec<Value>, fail_search: bool, fail_episode: bool) -> MetadataEnricher {
        MetadataEnricher::new(Arc::new(FakeCatalog {
            results,
            fail_search,
            fail_episode,
        }))
    }

    fn tv_query() -> CatalogQuery<'static> {
        CatalogQuery {
            title: "Breaking Bad",
            content_type: ContentType::TvShow,
            season: Some(5),
            episode: Some(14),
            year: None,
        }
    }

    #[tokio::test]
    async fn test_episode_payload() {
        let payload = enricher(vec![json!({"id": 1396}), json!({"id": 2})], false, false)
            .enrich(tv_query())
            .await
            .unwrap();

        assert_eq!(payload["show_info"]["id"], 1396);
        assert_eq!(payload["show_info"]["_search_metadata"]["total_results"], 2);
        assert_eq!(payload["show_info"]["_search_metadata"]["content_type"], "tv");
        assert_eq!(payload["episode_info"]["name"], "Ozymandias");
    }

    #[tokio::test]
    async fn test_missing_episode_keeps_show_payload() {
        let payload = enricher(vec![json!({"id": 1396})], false, true)
            .enrich(tv_query())
            .await
            .unwrap();
        assert_eq!(payload["id"], 1396);
        assert!(payload.get("episode_info").is_none());
    }

    #[tokio::test]
    async fn test_movie_without_episode_lookup() {
        let payload = enricher(vec![json!({"id": 603})], false, false)
            .enrich(CatalogQuery {
                title: "The Matrix",
                content_type: ContentType::Movie,
                season: None,
                episode: None,
                year: Some(1999),
            })
            .await
            .unwrap();
        assert_eq!(payload["kind"], "movie");
        assert_eq!(payload["_search_metadata"]["search_year"], 1999);
    }

    #[tokio::test]
    async fn test_no_match_or_error_is_none() {
        assert!(enricher(vec![], false, false).enrich(tv_query()).await.is_none());
        assert!(enricher(vec![json!({"id": 1})], true, false).enrich(tv_query()).await.is_none());

        let other = CatalogQuery {
            content_type: ContentType::Other,
            ..tv_query()
        };
        assert!(enricher(vec![json!({"id": 1})], false, false).enrich(other).await.is_none());
    }
}
