//! Show/movie identification and catalog identity.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::source::SourceKey;

/// What kind of content a video appears to be.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
pub enum ContentType {
    #[serde(rename = "TV Show")]
    TvShow,
    #[serde(rename = "Movie")]
    Movie,
    #[default]
    #[serde(rename = "Other")]
    Other,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::TvShow => "TV Show",
            ContentType::Movie => "Movie",
            ContentType::Other => "Other",
        }
    }

    /// Case-insensitive match: anything mentioning "tv" is a show, anything
    /// mentioning "movie" is a movie.
    pub fn from_loose(s: &str) -> Self {
        let lower = s.to_ascii_lowercase();
        if lower.contains("tv") {
            ContentType::TvShow
        } else if lower.contains("movie") {
            ContentType::Movie
        } else {
            ContentType::Other
        }
    }

    /// Whether the catalog can be searched for this type.
    pub fn is_catalogued(&self) -> bool {
        matches!(self, ContentType::TvShow | ContentType::Movie)
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parsed answer of the identification prompt.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Identification {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub title: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl Identification {
    /// Build from loosely typed model JSON.
    ///
    /// Non-object input yields the default identity. `season`/`episode`
    /// accept numbers or numeric strings; anything else becomes `None`.
    pub fn from_loose_json(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let content_type = obj
            .get("type")
            .and_then(Value::as_str)
            .map(ContentType::from_loose)
            .unwrap_or_default();

        let title = obj
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("null"))
            .map(str::to_string);

        Self {
            content_type,
            title,
            season: obj.get("season").and_then(loose_u32),
            episode: obj.get("episode").and_then(loose_u32),
        }
    }

    /// A usable title and a catalogued type.
    pub fn is_enrichable(&self) -> bool {
        self.title.is_some() && self.content_type.is_catalogued()
    }
}

fn loose_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Best-known identity of a source plus catalog metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContentIdentity {
    pub source_key: SourceKey,
    pub show_type: ContentType,
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    /// Catalog id of the matched show or movie
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<i64>,
    /// Catalog details; episodic payloads nest `{show_info, episode_info}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_payload: Option<Value>,
    pub updated_at: DateTime<Utc>,
}

impl ContentIdentity {
    pub fn from_identification(source_key: SourceKey, ident: &Identification) -> Self {
        Self {
            source_key,
            show_type: ident.content_type,
            title: ident.title.clone(),
            season: ident.season,
            episode: ident.episode,
            external_id: None,
            external_payload: None,
            updated_at: Utc::now(),
        }
    }

    /// Attach a catalog record, reading the id from the show payload.
    pub fn with_catalog(mut self, payload: Value) -> Self {
        let details = payload.get("show_info").unwrap_or(&payload);
        self.external_id = details.get("id").and_then(Value::as_i64);
        self.external_payload = Some(payload);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_type_loose_match() {
        assert_eq!(ContentType::from_loose("TV Show"), ContentType::TvShow);
        assert_eq!(ContentType::from_loose("tv series"), ContentType::TvShow);
        assert_eq!(ContentType::from_loose("MOVIE"), ContentType::Movie);
        assert_eq!(ContentType::from_loose("Commercial"), ContentType::Other);
        assert_eq!(serde_json::to_value(ContentType::TvShow).unwrap(), json!("TV Show"));
    }

    #[test]
    fn test_identification_lenient_fields() {
        let ident = Identification::from_loose_json(&json!({
            "type": "TV Show",
            "title": "Breaking Bad",
            "season": "5",
            "episode": 14
        }));
        assert_eq!(ident.content_type, ContentType::TvShow);
        assert_eq!(ident.title.as_deref(), Some("Breaking Bad"));
        assert_eq!(ident.season, Some(5));
        assert_eq!(ident.episode, Some(14));
        assert!(ident.is_enrichable());

        let ident = Identification::from_loose_json(&json!({
            "type": "Movie",
            "title": "  ",
            "season": "unknown",
            "episode": null
        }));
        assert_eq!(ident.title, None);
        assert_eq!(ident.season, None);
        assert_eq!(ident.episode, None);
        assert!(!ident.is_enrichable());
    }

    #[test]
    fn test_identification_default_for_non_object() {
        assert_eq!(
            Identification::from_loose_json(&json!("no idea")),
            Identification::default()
        );
        assert_eq!(Identification::default().content_type, ContentType::Other);
    }

    #[test]
    fn test_identity_catalog_id() {
        let key = SourceKey::parse("https://youtu.be/dQw4w9WgXcQ").unwrap();
        let ident = Identification {
            content_type: ContentType::TvShow,
            title: Some("Breaking Bad".into()),
            season: Some(5),
            episode: Some(14),
        };

        let identity = ContentIdentity::from_identification(key.clone(), &ident)
            .with_catalog(json!({"show_info": {"id": 1396}, "episode_info": {"id": 62161}}));
        assert_eq!(identity.external_id, Some(1396));

        let identity = ContentIdentity::from_identification(key, &ident).with_catalog(json!({"id": 603}));
        assert_eq!(identity.external_id, Some(603));
    }
}
