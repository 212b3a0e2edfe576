//! End-to-end ingestion scenarios with fake extractor and providers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio_test::assert_err;

use vingest_firestore::{
    AnalysisStore, FirestoreResult, IdentityStore, MemoryStore, RunStore, StatusUpdate, Stores,
};
use vingest_media::{MediaError, MediaExtractor, MediaResult, WorkArea};
use vingest_ml_client::{CatalogApi, CatalogKind, MlError, MlResult, SpeechToText, VisionModel};
use vingest_models::{AnalysisRecord, Modality, PipelineRun, RunStatus, SourceKey};
use vingest_worker::{IngestConfig, IngestError, IngestOutcome, Pipeline, PipelineDeps};

const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
const MEDIA_ID: &str = "dQw4w9WgXcQ";

#[derive(Clone, Copy)]
enum Frames {
    Capture(u64),
    Unreadable,
    NoStream,
    Panic,
}

struct FakeExtractor {
    captions: Option<&'static str>,
    audio: bool,
    frames: Frames,
    /// Holds caption extraction for one URL until notified
    gate: Option<(&'static str, Arc<Notify>)>,
    calls: AtomicUsize,
}

impl FakeExtractor {
    fn new(captions: Option<&'static str>, audio: bool, frames: Frames) -> Self {
        Self {
            captions,
            audio,
            frames,
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MediaExtractor for FakeExtractor {
    async fn extract_transcript(&self, url: &str, area: &WorkArea) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((held, gate)) = &self.gate {
            if *held == url {
                gate.notified().await;
            }
        }
        match self.captions {
            Some(raw) => tokio::fs::write(area.transcript_file(), raw).await.is_ok(),
            None => false,
        }
    }

    async fn extract_audio(&self, _url: &str, area: &WorkArea) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.audio && tokio::fs::write(area.audio_file(), b"ID3").await.is_ok()
    }

    async fn extract_frames(&self, _url: &str, area: &WorkArea, interval_secs: u32) -> MediaResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.frames {
            Frames::Capture(count) => {
                for index in 0..count {
                    let path = area.screenshot_file(index * u64::from(interval_secs));
                    tokio::fs::write(path, b"jpeg").await?;
                }
                Ok(count > 0)
            }
            Frames::Unreadable => Ok(false),
            Frames::NoStream => Err(MediaError::stream_unavailable("no playable formats")),
            Frames::Panic => panic!("ffmpeg exploded"),
        }
    }
}

struct FakeVision {
    fail: bool,
}

#[async_trait]
impl VisionModel for FakeVision {
    async fn describe_images(&self, prompt: &str, images: &[PathBuf]) -> MlResult<String> {
        if self.fail {
            return Err(MlError::Api { status: 503, body: "overloaded".into() });
        }
        if prompt.contains("JSON array") {
            let items: Vec<Value> = (0..images.len())
                .map(|i| json!({"description": format!("Scene {}", i)}))
                .collect();
            return Ok(format!("```json\n{}\n```", Value::Array(items)));
        }
        Ok(r#"{"type": "TV Show", "title": "Breaking Bad", "season": 5, "episode": 14}"#.to_string())
    }
}

struct FakeSpeech;

#[async_trait]
impl SpeechToText for FakeSpeech {
    async fn transcribe(&self, audio: &Path, _prompt: &str) -> MlResult<String> {
        assert!(audio.exists());
        Ok("transcribed audio".to_string())
    }
}

struct FakeCatalog;

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn search(&self, _kind: CatalogKind, _query: &str, _year: Option<i32>) -> MlResult<Vec<Value>> {
        Ok(vec![json!({"id": 1396, "name": "Breaking Bad"})])
    }

    async fn details(&self, _kind: CatalogKind, id: i64) -> MlResult<Value> {
        Ok(json!({"id": id, "name": "Breaking Bad"}))
    }

    async fn episode(&self, _tv_id: i64, _season: u32, _episode: u32) -> MlResult<Value> {
        Ok(json!({"id": 62161, "name": "Ozymandias"}))
    }
}

/// Run store that records every status write.
struct RecordingRunStore {
    inner: MemoryStore,
    updates: Mutex<Vec<StatusUpdate>>,
}

#[async_trait]
impl RunStore for RecordingRunStore {
    async fn create(&self, run: &PipelineRun) -> FirestoreResult<()> {
        self.inner.create(run).await
    }

    async fn get(&self, key: &SourceKey) -> FirestoreResult<Option<PipelineRun>> {
        self.inner.get(key).await
    }

    async fn upsert_status(&self, key: &SourceKey, update: StatusUpdate) -> FirestoreResult<()> {
        self.updates.lock().unwrap().push(update.clone());
        self.inner.upsert_status(key, update).await
    }
}

struct Harness {
    pipeline: Pipeline,
    stores: Stores,
    extractor: Arc<FakeExtractor>,
    work: TempDir,
}

fn harness(extractor: FakeExtractor, vision_fails: bool) -> Harness {
    harness_with_stores(extractor, vision_fails, Stores::memory())
}

fn harness_with_stores(extractor: FakeExtractor, vision_fails: bool, stores: Stores) -> Harness {
    let work = TempDir::new().unwrap();
    let extractor = Arc::new(extractor);
    let config = IngestConfig {
        work_dir: work.path().to_path_buf(),
        ..IngestConfig::default()
    };
    let pipeline = Pipeline::new(
        config,
        PipelineDeps {
            stores: stores.clone(),
            extractor: extractor.clone(),
            vision: Arc::new(FakeVision { fail: vision_fails }),
            speech: Arc::new(FakeSpeech),
            catalog: Some(Arc::new(FakeCatalog)),
        },
    );
    Harness {
        pipeline,
        stores,
        extractor,
        work,
    }
}

fn key() -> SourceKey {
    SourceKey::parse(URL).unwrap()
}

fn work_area(h: &Harness, key: &SourceKey) -> WorkArea {
    WorkArea::new(h.work.path(), &key.document_id(), MEDIA_ID)
}

async fn ingest_and_wait(h: &Harness, url: &str) -> PipelineRun {
    let handle = h.pipeline.ingest(url, "session-1").await.unwrap();
    assert_eq!(handle.outcome, IngestOutcome::Started);
    let key = handle.run.as_ref().unwrap().source_key.clone();
    handle.wait().await.unwrap();
    h.stores.runs.get(&key).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_scenario_a_full_success() {
    let h = harness(
        FakeExtractor::new(Some("[00:00] Say my name\n[01:05] You're Heisenberg\nnoise\n"), true, Frames::Capture(3)),
        false,
    );

    let run = ingest_and_wait(&h, URL).await;
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.progress, 100);
    assert_eq!(
        run.message.as_deref(),
        Some("Successfully processed: transcript, frame_descriptions, content_identification, catalog_enrichment")
    );

    let records = h.stores.analysis.list_analysis(&key()).await.unwrap();
    assert_eq!(records.len(), 3);

    let transcript = &records[0].payload;
    assert_eq!(transcript.as_array().unwrap().len(), 2);
    assert_eq!(transcript[1]["seconds"], 65);

    let frames = &records[1].payload;
    assert_eq!(frames.as_array().unwrap().len(), 3);
    assert_eq!(frames[2]["timestamp"], "00:20");
    assert_eq!(frames[2]["description"], "Scene 2");

    assert_eq!(records[2].payload["title"], "Breaking Bad");

    let identity = h.stores.identity.get_identity(&key()).await.unwrap().unwrap();
    assert_eq!(identity.external_id, Some(1396));
    assert_eq!(identity.external_payload.unwrap()["episode_info"]["name"], "Ozymandias");

    assert!(!work_area(&h, &key()).base_dir().exists(), "working area removed on success");
}

#[tokio::test]
async fn test_scenario_b_no_transcript_or_audio() {
    let h = harness(FakeExtractor::new(None, false, Frames::Capture(2)), false);

    let run = ingest_and_wait(&h, URL).await;
    assert_eq!(run.status, RunStatus::Completed);
    let message = run.message.unwrap();
    assert!(message.contains("frame_descriptions"));
    assert!(message.contains("Errors encountered: Failed to extract transcript or audio"));

    assert!(h
        .stores
        .analysis
        .get_analysis(&key(), Modality::Transcript)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_scenario_c_nothing_extracted() {
    let h = harness(FakeExtractor::new(None, false, Frames::Unreadable), false);

    let run = ingest_and_wait(&h, URL).await;
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(
        run.error_message.as_deref(),
        Some("Failed to process any components. Errors: Failed to extract transcript or audio; Failed to extract screenshots")
    );
    assert!(h.stores.analysis.list_analysis(&key()).await.unwrap().is_empty());
    assert!(h.stores.identity.get_identity(&key()).await.unwrap().is_none());
    assert!(work_area(&h, &key()).base_dir().exists(), "working area kept on failure");
}

#[tokio::test]
async fn test_audio_fallback_single_segment() {
    let h = harness(FakeExtractor::new(None, true, Frames::NoStream), false);

    let run = ingest_and_wait(&h, URL).await;
    assert_eq!(run.status, RunStatus::Completed);
    let message = run.message.unwrap();
    assert!(message.starts_with("Successfully processed: audio_transcription"));
    assert!(message.contains("Screenshot processing error"));

    let transcript = h
        .stores
        .analysis
        .get_analysis(&key(), Modality::Transcript)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        transcript.payload,
        json!([{"timestamp": "00:00", "seconds": 0, "text": "transcribed audio"}])
    );
}

#[tokio::test]
async fn test_vision_failure_is_soft() {
    let h = harness(FakeExtractor::new(Some("[00:01] hi\n"), false, Frames::Capture(2)), true);

    let run = ingest_and_wait(&h, URL).await;
    assert_eq!(run.status, RunStatus::Completed);
    let message = run.message.unwrap();
    assert!(message.contains("Frame description error"));
    assert!(message.contains("Content identification error"));
    assert!(message.contains("No screenshots were successfully processed"));
    assert_eq!(h.stores.analysis.list_analysis(&key()).await.unwrap().len(), 1);
    assert!(h.stores.identity.get_identity(&key()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_repeated_ingest_returns_active_run() {
    let gate = Arc::new(Notify::new());
    let mut extractor = FakeExtractor::new(Some("[00:01] hi\n"), false, Frames::Capture(1));
    extractor.gate = Some((URL, gate.clone()));
    let h = harness(extractor, false);

    let first = h.pipeline.ingest(URL, "session-1").await.unwrap();
    let second = h.pipeline.ingest(URL, "session-2").await.unwrap();
    assert_eq!(first.outcome, IngestOutcome::Started);
    assert_eq!(second.outcome, IngestOutcome::InProgress);
    assert_eq!(second.run.as_ref().unwrap().id, first.run.as_ref().unwrap().id);

    gate.notify_one();
    first.wait().await.unwrap();
    let run = h.stores.runs.get(&key()).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_completed_source_is_not_reprocessed() {
    let h = harness(FakeExtractor::new(Some("[00:01] hi\n"), false, Frames::Capture(1)), false);
    ingest_and_wait(&h, URL).await;
    let calls = h.extractor.calls.load(Ordering::SeqCst);

    let again = h.pipeline.ingest(URL, "session-2").await.unwrap();
    assert_eq!(again.outcome, IngestOutcome::AlreadyCompleted);
    assert_eq!(again.status(), RunStatus::Completed);
    assert_eq!(again.progress(), 100);
    again.wait().await.unwrap();
    assert_eq!(h.extractor.calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn test_stored_analysis_short_circuits() {
    let h = harness(FakeExtractor::new(None, false, Frames::Unreadable), false);
    for modality in [Modality::Transcript, Modality::FrameDescriptions] {
        h.stores
            .analysis
            .upsert_analysis(&AnalysisRecord::new(key(), modality, json!([])))
            .await
            .unwrap();
    }

    let handle = h.pipeline.ingest(URL, "session-1").await.unwrap();
    assert_eq!(handle.outcome, IngestOutcome::AlreadyCompleted);
    assert!(handle.run.is_none());
    assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_run_is_replaced() {
    let h = harness(FakeExtractor::new(None, false, Frames::Unreadable), false);
    let failed = ingest_and_wait(&h, URL).await;
    assert_eq!(failed.status, RunStatus::Failed);

    let retry = h.pipeline.ingest(URL, "session-2").await.unwrap();
    assert_eq!(retry.outcome, IngestOutcome::Started);
    assert_ne!(retry.run.as_ref().unwrap().id, failed.id);
    retry.wait().await.unwrap();
}

#[tokio::test]
async fn test_progress_is_monotonic_and_ends_at_100() {
    let runs = Arc::new(RecordingRunStore {
        inner: MemoryStore::new(),
        updates: Mutex::new(Vec::new()),
    });
    let memory = Arc::new(MemoryStore::new());
    let stores = Stores {
        runs: runs.clone(),
        analysis: memory.clone(),
        identity: memory,
    };
    let h = harness_with_stores(
        FakeExtractor::new(Some("[00:01] hi\n"), false, Frames::Capture(2)),
        false,
        stores,
    );

    let run = ingest_and_wait(&h, URL).await;
    assert_eq!(run.progress, 100);

    let updates = runs.updates.lock().unwrap().clone();
    let progress: Vec<u8> = updates
        .iter()
        .filter_map(|u| match u {
            StatusUpdate::Progress { progress, .. } => *progress,
            _ => None,
        })
        .collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "progress went backwards: {:?}", progress);
    assert!(progress.iter().all(|p| *p < 100));
    assert!(matches!(updates.last(), Some(StatusUpdate::Completed { .. })));
}

#[tokio::test]
async fn test_invalid_source_writes_nothing() {
    let h = harness(FakeExtractor::new(None, false, Frames::Unreadable), false);
    let err = assert_err!(h.pipeline.ingest("not a url", "session-1").await);
    assert!(matches!(err, IngestError::InvalidSource(_)));
    assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unrecognized_video_id_fails_run() {
    let h = harness(FakeExtractor::new(Some("[00:01] hi\n"), false, Frames::Capture(1)), false);
    let run = ingest_and_wait(&h, "https://example.com/watch/123").await;
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error_message.as_deref(), Some("Failed to extract video ID from URL"));
    assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_panicking_frame_stage_is_contained() {
    let h = harness(FakeExtractor::new(Some("[00:01] hi\n"), false, Frames::Panic), false);
    let run = ingest_and_wait(&h, URL).await;
    assert_eq!(run.status, RunStatus::Completed);
    let message = run.message.unwrap();
    assert!(message.starts_with("Successfully processed: transcript"));
    assert!(message.contains("Screenshot processing error: ffmpeg exploded"));
    assert!(h
        .stores
        .analysis
        .get_analysis(&key(), Modality::Transcript)
        .await
        .unwrap()
        .is_some());
    assert!(!work_area(&h, &key()).base_dir().exists());
}

#[tokio::test]
async fn test_runs_sharing_a_video_id_keep_separate_work_areas() {
    const SHORT_URL: &str = "https://youtu.be/dQw4w9WgXcQ";
    let gate = Arc::new(Notify::new());
    let mut extractor = FakeExtractor::new(Some("[00:01] hi\n"), false, Frames::Capture(2));
    extractor.gate = Some((SHORT_URL, gate.clone()));
    let h = harness(extractor, false);

    let held = h.pipeline.ingest(SHORT_URL, "session-1").await.unwrap();
    assert_eq!(held.outcome, IngestOutcome::Started);
    let held_key = held.run.as_ref().unwrap().source_key.clone();
    assert_ne!(held_key, key());

    let finished = ingest_and_wait(&h, URL).await;
    assert_eq!(finished.status, RunStatus::Completed);
    assert!(!work_area(&h, &key()).base_dir().exists());
    assert!(work_area(&h, &held_key).base_dir().exists());

    gate.notify_one();
    held.wait().await.unwrap();
    let run = h.stores.runs.get(&held_key).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(
        run.message.as_deref(),
        Some("Successfully processed: transcript, frame_descriptions, content_identification, catalog_enrichment")
    );
}

#[tokio::test]
async fn test_retry_ignores_frames_from_earlier_attempt() {
    let h = harness(FakeExtractor::new(None, false, Frames::Capture(2)), false);
    let stale = work_area(&h, &key());
    stale.prepare().await.unwrap();
    for secs in [0, 10, 20, 30] {
        tokio::fs::write(stale.screenshot_file(secs), b"old").await.unwrap();
    }

    let run = ingest_and_wait(&h, URL).await;
    assert_eq!(run.status, RunStatus::Completed);
    let frames = h
        .stores
        .analysis
        .get_analysis(&key(), Modality::FrameDescriptions)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frames.payload.as_array().unwrap().len(), 2);
}
