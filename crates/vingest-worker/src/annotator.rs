//! Frame descriptions and content identification from captured frames.
//!
//! Both calls send every frame in one request. Responses are loosely
//! structured text, so parsing degrades instead of failing: descriptions
//! always come back one per frame, and an unreadable identification becomes
//! the default (`Other`, no title). Transport errors are returned to the caller.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};
use vingest_ml_client::{MlResult, VisionModel};
use vingest_models::{format_mmss, FrameDescription, Identification};

pub const DESCRIPTION_PROMPT: &str = "Analyze these screenshots from a TV show or video. For each image, provide a detailed description \
focusing on main subjects, their names if recognizable, their actions, visible text, and overall scene composition. \
Return your response as a JSON array where each element corresponds to one screenshot in order, with this structure: \
[{\"description\": \"detailed description of first image\"}, {\"description\": \"detailed description of second image\"}, ...]";

pub const IDENTIFICATION_PROMPT: &str = "These are multiple screenshots from a video. Identify if this is a TV show. \
If yes, provide the show's title and, if possible, the season and episode. \
If it's not a TV show, say clearly what it most likely is (e.g., a movie, commercial, YouTube video, etc.). \
Return your answer in JSON: {\"type\": \"TV Show/Movie/Other\", \"title\": \"...\", \"season\": ..., \"episode\": ...}.";

static JSON_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("valid array regex"));
static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid object regex"));
static DESCRIPTION_SPLIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n\n+|\d+\.\s+|Image \d+:").expect("valid split regex")
});
static FRAME_SECONDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(\d{4,})\.jpg$").expect("valid frame name regex"));

/// Identification call result.
#[derive(Debug, Clone)]
pub struct IdentificationResponse {
    pub identification: Identification,
    /// Model output as returned
    pub raw: String,
    /// Whether a JSON object was found and read
    pub parsed: bool,
}

impl IdentificationResponse {
    /// Payload for the `content_identification` record: the parsed object,
    /// or the raw text when nothing parsed.
    pub fn record_payload(&self) -> Value {
        if self.parsed {
            serde_json::to_value(&self.identification).unwrap_or(Value::Null)
        } else {
            Value::String(self.raw.clone())
        }
    }
}

pub struct FrameAnnotator {
    vision: Arc<dyn VisionModel>,
    interval_secs: u32,
}

impl FrameAnnotator {
    pub fn new(vision: Arc<dyn VisionModel>, interval_secs: u32) -> Self {
        Self {
            vision,
            interval_secs,
        }
    }

    /// Describe each frame. Always returns exactly one entry per frame.
    pub async fn describe(&self, frames: &[PathBuf]) -> MlResult<Vec<FrameDescription>> {
        info!(frames = frames.len(), "Requesting frame descriptions");
        let raw = self.vision.describe_images(DESCRIPTION_PROMPT, frames).await?;
        Ok(parse_descriptions(&raw, frames, self.interval_secs))
    }

    pub async fn identify(&self, frames: &[PathBuf]) -> MlResult<IdentificationResponse> {
        info!(frames = frames.len(), "Requesting content identification");
        let raw = self.vision.describe_images(IDENTIFICATION_PROMPT, frames).await?;

        let parsed = parse_identification(&raw);
        if parsed.is_none() {
            warn!("No JSON object in identification response, using default identity");
        }

        Ok(IdentificationResponse {
            parsed: parsed.is_some(),
            identification: parsed.unwrap_or_default(),
            raw,
        })
    }
}

/// Map a description response onto the frames.
///
/// Reads a JSON array whose elements are `{description}` objects or bare
/// strings. Without one, the text is split on blank lines and numbering.
/// Frames left without text get a placeholder.
pub fn parse_descriptions(raw: &str, frames: &[PathBuf], interval_secs: u32) -> Vec<FrameDescription> {
    let texts = match json_descriptions(raw) {
        Some(texts) => texts,
        None => {
            debug!("No JSON array in description response, splitting text");
            split_descriptions(raw)
        }
    };

    frames
        .iter()
        .enumerate()
        .map(|(index, frame)| {
            let filename = file_name(frame);
            let seconds = frame_seconds(&filename).unwrap_or(index as u64 * u64::from(interval_secs));
            let description = texts
                .get(index)
                .cloned()
                .flatten()
                .unwrap_or_else(|| format!("Description not available for {}", filename));

            FrameDescription {
                timestamp: format_mmss(seconds),
                seconds,
                filename,
                description,
            }
        })
        .collect()
}

fn json_descriptions(raw: &str) -> Option<Vec<Option<String>>> {
    let matched = JSON_ARRAY.find(raw)?;
    let items: Vec<Value> = serde_json::from_str(matched.as_str()).ok()?;

    Some(
        items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Some(s),
                Value::Object(map) => map
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .map(|text| text.filter(|t| !t.trim().is_empty()))
            .collect(),
    )
}

fn split_descriptions(raw: &str) -> Vec<Option<String>> {
    DESCRIPTION_SPLIT
        .split(raw)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| Some(part.to_string()))
        .collect()
}

/// Read the identification object out of a model response.
pub fn parse_identification(raw: &str) -> Option<Identification> {
    let matched = JSON_OBJECT.find(raw)?;
    let value: Value = serde_json::from_str(matched.as_str()).ok()?;
    Some(Identification::from_loose_json(&value))
}

/// Seconds encoded in a screenshot filename (`..._0030.jpg`).
pub fn frame_seconds(filename: &str) -> Option<u64> {
    FRAME_SECONDS
        .captures(filename)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vingest_models::ContentType;

    fn frames(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from("/work/shots").join(n)).collect()
    }

    #[test]
    fn test_json_array_descriptions() {
        let shots = frames(&["abc_screenshot_0000.jpg", "abc_screenshot_0010.jpg", "abc_screenshot_0020.jpg"]);
        let raw = "Sure! Here you go:\n```json\n[{\"description\": \"A kitchen\"}, \"Two people talking\"]\n```";

        let parsed = parse_descriptions(raw, &shots, 10);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].description, "A kitchen");
        assert_eq!(parsed[1].description, "Two people talking");
        assert_eq!(parsed[1].timestamp, "00:10");
        assert_eq!(parsed[2].description, "Description not available for abc_screenshot_0020.jpg");
        assert_eq!(parsed[2].seconds, 20);
    }

    #[test]
    fn test_text_fallback_yields_one_entry_per_frame() {
        let shots = frames(&["abc_screenshot_0000.jpg", "abc_screenshot_0010.jpg", "abc_screenshot_0020.jpg"]);
        let raw = "1. A man in a lab coat\n2. A desert road\n";

        let parsed = parse_descriptions(raw, &shots, 10);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].description, "A man in a lab coat");
        assert_eq!(parsed[1].description, "A desert road");
        assert!(parsed[2].description.starts_with("Description not available"));
    }

    #[test]
    fn test_invalid_json_array_falls_back_to_split() {
        let shots = frames(&["abc_screenshot_0000.jpg", "abc_screenshot_0010.jpg"]);
        let raw = "Image 1: a [blurry] frame\n\nImage 2: credits";

        let parsed = parse_descriptions(raw, &shots, 10);
        assert_eq!(parsed[0].description, "a [blurry] frame");
        assert_eq!(parsed[1].description, "credits");
    }

    #[test]
    fn test_timestamps_fall_back_to_index() {
        let shots = frames(&["first.jpg", "second.jpg", "abc_screenshot_12345.jpg"]);
        let parsed = parse_descriptions("[]", &shots, 15);
        assert_eq!(parsed[0].seconds, 0);
        assert_eq!(parsed[1].seconds, 15);
        assert_eq!(parsed[2].seconds, 12345);
        assert_eq!(parsed[2].timestamp, "205:45");
    }

    #[test]
    fn test_parse_identification() {
        let raw = "```json\n{\"type\": \"TV Show\", \"title\": \"Breaking Bad\", \"season\": \"5\", \"episode\": 14}\n```";
        let ident = parse_identification(raw).unwrap();
        assert_eq!(ident.content_type, ContentType::TvShow);
        assert_eq!(ident.title.as_deref(), Some("Breaking Bad"));
        assert_eq!(ident.season, Some(5));
        assert_eq!(ident.episode, Some(14));

        assert!(parse_identification("I think it's a cooking show.").is_none());
        assert!(parse_identification("{not json}").is_none());
    }

    #[test]
    fn test_record_payload_keeps_raw_text_when_unparsed() {
        let response = IdentificationResponse {
            identification: Identification::default(),
            raw: "no idea".to_string(),
            parsed: false,
        };
        assert_eq!(response.record_payload(), Value::String("no idea".into()));
    }
}
