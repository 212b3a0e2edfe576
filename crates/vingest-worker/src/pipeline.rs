//! Ingestion orchestrator.
//!
//! [`Pipeline::ingest`] admits a source and returns at once; the stages run
//! on a spawned task:
//!
//! 1. captions, falling back to audio + speech-to-text
//! 2. frame capture, then descriptions and identification
//! 3. catalog enrichment for identified shows and movies
//!
//! Each stage catches its own failures, panics included. The run completes if
//! a transcript or frame descriptions were saved, and fails otherwise.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn, Instrument};
use vingest_firestore::Stores;
use vingest_media::{MediaExtractor, WorkArea, YtDlpExtractor};
use vingest_ml_client::{CatalogApi, GeminiClient, SpeechToText, TmdbClient, TmdbConfig, VisionModel};
use vingest_models::{
    AnalysisRecord, ContentIdentity, Identification, Modality, PipelineRun, RunStatus, SourceKey,
    TranscriptSegment,
};

use crate::annotator::FrameAnnotator;
use crate::config::IngestConfig;
use crate::enricher::{CatalogQuery, MetadataEnricher};
use crate::error::{IngestError, IngestResult};
use crate::logging::RunLogger;
use crate::metrics::{record_run_completed, record_run_failed, record_run_started, record_stage};
use crate::progress::{checkpoint, ProgressReporter};
use crate::transcript;

pub const TRANSCRIPTION_PROMPT: &str = "Transcribe this audio recording with timestamps if possible.";

/// External collaborators of the pipeline.
pub struct PipelineDeps {
    pub stores: Stores,
    pub extractor: Arc<dyn MediaExtractor>,
    pub vision: Arc<dyn VisionModel>,
    pub speech: Arc<dyn SpeechToText>,
    /// Enrichment is skipped when absent
    pub catalog: Option<Arc<dyn CatalogApi>>,
}

/// How an ingest request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A new run was created and spawned.
    Started,
    /// A pending or processing run already exists.
    InProgress,
    /// The source has already been ingested.
    AlreadyCompleted,
}

/// Result of [`Pipeline::ingest`].
#[derive(Debug)]
pub struct RunHandle {
    pub outcome: IngestOutcome,
    /// The run row, when one exists
    pub run: Option<PipelineRun>,
    task: Option<JoinHandle<()>>,
}

impl RunHandle {
    pub fn status(&self) -> RunStatus {
        match (&self.outcome, &self.run) {
            (IngestOutcome::AlreadyCompleted, _) => RunStatus::Completed,
            (_, Some(run)) => run.status,
            (_, None) => RunStatus::NotStarted,
        }
    }

    pub fn progress(&self) -> u8 {
        match (&self.outcome, &self.run) {
            (IngestOutcome::AlreadyCompleted, _) => 100,
            (_, Some(run)) => run.progress,
            (_, None) => 0,
        }
    }

    /// Wait for the spawned run, if this request started one.
    pub async fn wait(self) -> IngestResult<()> {
        if let Some(task) = self.task {
            task.await
                .map_err(|e| IngestError::stage(format!("Run task failed: {}", e)))?;
        }
        Ok(())
    }
}

/// Components and errors collected over one run.
#[derive(Debug, Default)]
struct RunSummary {
    components: Vec<&'static str>,
    errors: Vec<String>,
}

impl RunSummary {
    fn processed(&mut self, component: &'static str) {
        self.components.push(component);
    }

    fn error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// A transcript or frame descriptions must have been saved.
    fn succeeded(&self) -> bool {
        self.components
            .iter()
            .any(|c| matches!(*c, "transcript" | "audio_transcription" | "frame_descriptions"))
    }

    fn success_message(&self) -> String {
        let mut message = format!("Successfully processed: {}", self.components.join(", "));
        if !self.errors.is_empty() {
            message.push_str(&format!(". Errors encountered: {}", self.errors.join("; ")));
        }
        message
    }

    fn failure_message(&self) -> String {
        format!("Failed to process any components. Errors: {}", self.errors.join("; "))
    }
}

/// Video ingestion pipeline. Cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Inner>,
}

struct Inner {
    config: IngestConfig,
    stores: Stores,
    extractor: Arc<dyn MediaExtractor>,
    speech: Arc<dyn SpeechToText>,
    annotator: FrameAnnotator,
    enricher: Option<MetadataEnricher>,
    /// Serializes the check-then-create in `ingest`
    admission: Mutex<()>,
}

impl Pipeline {
    pub fn new(config: IngestConfig, deps: PipelineDeps) -> Self {
        let annotator = FrameAnnotator::new(deps.vision, config.frame_interval_secs);
        Self {
            inner: Arc::new(Inner {
                stores: deps.stores,
                extractor: deps.extractor,
                speech: deps.speech,
                annotator,
                enricher: deps.catalog.map(MetadataEnricher::new),
                admission: Mutex::new(()),
                config,
            }),
        }
    }

    /// Build with Gemini, TMDB (when `TMDB_API_KEY` is set) and yt-dlp/FFmpeg.
    pub async fn from_env(config: IngestConfig, stores: Stores) -> IngestResult<Self> {
        let gemini = Arc::new(GeminiClient::from_env()?);

        let catalog: Option<Arc<dyn CatalogApi>> = match TmdbConfig::from_env() {
            Some(tmdb) => Some(Arc::new(TmdbClient::new(tmdb)?)),
            None => {
                warn!("TMDB_API_KEY not set, catalog enrichment disabled");
                None
            }
        };

        let extractor = YtDlpExtractor::init(
            &config.work_dir,
            config.tool_timeout_secs,
            config.cookies_path.as_deref(),
        )
        .await?;

        Ok(Self::new(
            config,
            PipelineDeps {
                stores,
                extractor: Arc::new(extractor),
                vision: gemini.clone(),
                speech: gemini,
                catalog,
            },
        ))
    }

    pub fn stores(&self) -> &Stores {
        &self.inner.stores
    }

    pub fn config(&self) -> &IngestConfig {
        &self.inner.config
    }

    /// Admit a source for ingestion without waiting for it.
    ///
    /// A completed source is reported as such; an active run is returned
    /// unchanged. Otherwise a new `pending` run replaces any failed one and
    /// the stages start on a background task.
    pub async fn ingest(&self, source_url: &str, owner_context_id: &str) -> IngestResult<RunHandle> {
        let key = SourceKey::parse(source_url)?;
        let _admission = self.inner.admission.lock().await;

        match self.inner.stores.runs.get(&key).await? {
            Some(run) if run.status == RunStatus::Completed => {
                info!(source_key = %key, "Source already ingested");
                return Ok(RunHandle {
                    outcome: IngestOutcome::AlreadyCompleted,
                    run: Some(run),
                    task: None,
                });
            }
            Some(run) if run.status.is_active() => {
                info!(source_key = %key, run_id = %run.id, "Run already in progress");
                return Ok(RunHandle {
                    outcome: IngestOutcome::InProgress,
                    run: Some(run),
                    task: None,
                });
            }
            Some(_) => {}
            None => {
                if self.inner.stores.analysis.has_complete_analysis(&key).await? {
                    info!(source_key = %key, "Analysis already stored");
                    return Ok(RunHandle {
                        outcome: IngestOutcome::AlreadyCompleted,
                        run: None,
                        task: None,
                    });
                }
            }
        }

        let run = PipelineRun::new_pending(key, owner_context_id);
        self.inner.stores.runs.create(&run).await?;

        let task = tokio::spawn(Inner::execute(Arc::clone(&self.inner), run.clone()));
        Ok(RunHandle {
            outcome: IngestOutcome::Started,
            run: Some(run),
            task: Some(task),
        })
    }
}

impl Inner {
    async fn execute(self: Arc<Self>, run: PipelineRun) {
        let logger = RunLogger::new(&run.id, "ingest");
        let span = logger.create_span();

        async move {
            logger.log_start(run.source_key.as_str());
            record_run_started();

            let mut reporter =
                ProgressReporter::new(self.stores.runs.clone(), run.source_key.clone(), logger.clone());

            // Stages isolate their own panics; this only catches the remainder
            let result = AssertUnwindSafe(self.run_stages(&run.source_key, &mut reporter))
                .catch_unwind()
                .await;

            let failure = match result {
                Ok(Ok(())) => None,
                Ok(Err(IngestError::Setup(message))) => Some(message),
                Ok(Err(e)) => Some(format!("Unexpected error during preprocessing: {}", e)),
                Err(panic) => Some(format!(
                    "Unexpected error during preprocessing: {}",
                    panic_message(panic.as_ref())
                )),
            };

            if let Some(error) = failure {
                record_run_failed();
                reporter.fail(&error).await;
            }
        }
        .instrument(span)
        .await
    }

    /// Run every stage and write the terminal status. Returns `Err` only for
    /// setup failures and unexpected errors, which the caller records.
    async fn run_stages(&self, key: &SourceKey, reporter: &mut ProgressReporter) -> IngestResult<()> {
        reporter.report(checkpoint::PICKED_UP, "Run picked up").await;
        reporter.report(checkpoint::PROVIDERS_READY, "Providers ready").await;
        reporter.report(checkpoint::EXTRACTION_STARTING, "Starting extraction").await;

        let media_id = key
            .media_id()
            .map_err(|_| IngestError::setup("Failed to extract video ID from URL"))?;
        reporter.report(checkpoint::EXTRACTOR_READY, "Extractor initialised").await;

        let area = WorkArea::new(&self.config.work_dir, &key.document_id(), media_id);
        area.prepare()
            .await
            .map_err(|e| IngestError::setup(format!("Failed to prepare working directories: {}", e)))?;
        reporter.report(checkpoint::WORKDIR_READY, "Working directories ready").await;

        let mut summary = RunSummary::default();
        self.transcript_stage(key, &area, reporter, &mut summary).await;
        self.frame_stage(key, &area, reporter, &mut summary).await;

        if summary.succeeded() {
            reporter.report(checkpoint::CLEANUP, "Cleaning up working files").await;
            if let Err(e) = area.cleanup().await {
                warn!(error = %e, "Failed to remove working area");
            }
            record_run_completed();
            reporter.complete(&summary.success_message()).await;
        } else {
            record_run_failed();
            reporter.fail(&summary.failure_message()).await;
        }
        Ok(())
    }

    async fn transcript_stage(
        &self,
        key: &SourceKey,
        area: &WorkArea,
        reporter: &mut ProgressReporter,
        summary: &mut RunSummary,
    ) {
        let started = Instant::now();
        let result = AssertUnwindSafe(self.extract_transcript(key, area, reporter))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(IngestError::stage(panic_message(panic.as_ref()))));
        record_stage("transcript", started.elapsed(), matches!(result, Ok(Some(_))));

        match result {
            Ok(Some(component)) => summary.processed(component),
            Ok(None) => summary.error("Failed to extract transcript or audio"),
            Err(e) => summary.error(format!("Transcript/audio processing error: {}", e)),
        }
    }

    /// Captions first, then audio transcription. `Ok(None)` when neither could be extracted.
    async fn extract_transcript(
        &self,
        key: &SourceKey,
        area: &WorkArea,
        reporter: &mut ProgressReporter,
    ) -> IngestResult<Option<&'static str>> {
        reporter.report(checkpoint::TRANSCRIPT, "Extracting transcript").await;

        if self.extractor.extract_transcript(key.as_str(), area).await {
            reporter.report(checkpoint::TRANSCRIPT_NORMALIZE, "Processing transcript").await;
            let raw = tokio::fs::read_to_string(area.transcript_file()).await?;
            let segments = transcript::normalize(&raw);
            self.save(key, Modality::Transcript, serde_json::to_value(&segments)?)
                .await?;
            return Ok(Some("transcript"));
        }

        if !self.extractor.extract_audio(key.as_str(), area).await {
            return Ok(None);
        }

        let text = self
            .speech
            .transcribe(&area.audio_file(), TRANSCRIPTION_PROMPT)
            .await?;
        let segments = vec![TranscriptSegment::at(0, text)];
        self.save(key, Modality::Transcript, serde_json::to_value(&segments)?)
            .await?;
        Ok(Some("audio_transcription"))
    }

    async fn frame_stage(
        &self,
        key: &SourceKey,
        area: &WorkArea,
        reporter: &mut ProgressReporter,
        summary: &mut RunSummary,
    ) {
        let started = Instant::now();
        let outcome = AssertUnwindSafe(self.process_frames(key, area, reporter, summary))
            .catch_unwind()
            .await;
        if let Err(panic) = outcome {
            record_stage("frames", started.elapsed(), false);
            summary.error(format!("Screenshot processing error: {}", panic_message(panic.as_ref())));
        }
    }

    /// Capture, annotate and enrich. Failures land in `summary`.
    async fn process_frames(
        &self,
        key: &SourceKey,
        area: &WorkArea,
        reporter: &mut ProgressReporter,
        summary: &mut RunSummary,
    ) {
        let started = Instant::now();
        let frames = match self.extract_frames(key, area, reporter).await {
            Ok(Some(frames)) => frames,
            Ok(None) => {
                record_stage("frames", started.elapsed(), false);
                summary.error("Failed to extract screenshots");
                return;
            }
            Err(e) => {
                record_stage("frames", started.elapsed(), false);
                summary.error(format!("Screenshot processing error: {}", e));
                return;
            }
        };
        record_stage("frames", started.elapsed(), true);

        reporter
            .report(checkpoint::ANNOTATION, &format!("Annotating {} frames", frames.len()))
            .await;
        let started = Instant::now();
        let mut saved_any = false;

        reporter.report(checkpoint::DESCRIPTION_CALL, "Requesting frame descriptions").await;
        let descriptions = self.describe_frames(&frames).await;
        reporter.report(checkpoint::DESCRIPTIONS_PARSED, "Frame descriptions parsed").await;

        reporter.report(checkpoint::IDENTIFICATION_CALL, "Requesting content identification").await;
        let identification = self.annotator.identify(&frames).await;
        reporter.report(checkpoint::IDENTIFICATION_RETURNED, "Content identification returned").await;

        match descriptions {
            Ok(payload) => {
                reporter.report(checkpoint::DESCRIPTIONS_SAVED, "Saving frame descriptions").await;
                match self.save(key, Modality::FrameDescriptions, payload).await {
                    Ok(()) => {
                        summary.processed("frame_descriptions");
                        saved_any = true;
                    }
                    Err(e) => summary.error(format!("Failed to save frame descriptions: {}", e)),
                }
            }
            Err(e) => summary.error(format!("Frame description error: {}", e)),
        }

        let mut identified: Option<Identification> = None;
        match identification {
            Ok(response) => {
                reporter.report(checkpoint::IDENTIFICATION_SAVED, "Saving content identification").await;
                match self
                    .save(key, Modality::ContentIdentification, response.record_payload())
                    .await
                {
                    Ok(()) => {
                        summary.processed("content_identification");
                        saved_any = true;
                        identified = Some(response.identification);
                    }
                    Err(e) => summary.error(format!("Failed to save content identification: {}", e)),
                }
            }
            Err(e) => summary.error(format!("Content identification error: {}", e)),
        }
        record_stage("annotation", started.elapsed(), saved_any);

        if !saved_any {
            summary.error("No screenshots were successfully processed");
        }

        if let Some(ident) = identified.filter(Identification::is_enrichable) {
            self.enrichment_stage(key, &ident, reporter, summary).await;
        }
    }

    async fn describe_frames(&self, frames: &[PathBuf]) -> IngestResult<serde_json::Value> {
        let descriptions = self.annotator.describe(frames).await?;
        Ok(serde_json::to_value(descriptions)?)
    }

    /// Capture frames; `Ok(None)` when the stream could not be sampled.
    async fn extract_frames(
        &self,
        key: &SourceKey,
        area: &WorkArea,
        reporter: &mut ProgressReporter,
    ) -> IngestResult<Option<Vec<PathBuf>>> {
        reporter.report(checkpoint::FRAMES, "Extracting frames").await;
        area.reset_screenshots().await?;

        let captured = self
            .extractor
            .extract_frames(key.as_str(), area, self.config.frame_interval_secs)
            .await?;
        if !captured {
            return Ok(None);
        }

        let frames = area.screenshots().await?;
        Ok(if frames.is_empty() { None } else { Some(frames) })
    }

    async fn enrichment_stage(
        &self,
        key: &SourceKey,
        ident: &Identification,
        reporter: &mut ProgressReporter,
        summary: &mut RunSummary,
    ) {
        reporter.report(checkpoint::ENRICHMENT, "Fetching catalog metadata").await;
        let started = Instant::now();

        let mut identity = ContentIdentity::from_identification(key.clone(), ident);
        match &self.enricher {
            Some(enricher) => {
                let query = CatalogQuery {
                    title: ident.title.as_deref().unwrap_or_default(),
                    content_type: ident.content_type,
                    season: ident.season,
                    episode: ident.episode,
                    year: None,
                };
                if let Some(payload) = enricher.enrich(query).await {
                    identity = identity.with_catalog(payload);
                }
            }
            None => warn!("No catalog configured, saving identity without metadata"),
        }

        let matched = identity.external_payload.is_some();
        match self.stores.identity.upsert_identity(&identity).await {
            Ok(()) if matched => summary.processed("catalog_enrichment"),
            Ok(()) => {}
            Err(e) => summary.error(format!("Failed to save content identity: {}", e)),
        }
        record_stage("enrichment", started.elapsed(), matched);
    }

    async fn save(&self, key: &SourceKey, modality: Modality, payload: serde_json::Value) -> IngestResult<()> {
        let record = AnalysisRecord::new(key.clone(), modality, payload);
        self.stores.analysis.upsert_analysis(&record).await?;
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "task panicked".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_messages() {
        let mut summary = RunSummary::default();
        summary.error("Failed to extract transcript or audio");
        assert!(!summary.succeeded());
        assert_eq!(
            summary.failure_message(),
            "Failed to process any components. Errors: Failed to extract transcript or audio"
        );

        summary.processed("frame_descriptions");
        summary.processed("content_identification");
        assert!(summary.succeeded());
        assert_eq!(
            summary.success_message(),
            "Successfully processed: frame_descriptions, content_identification. \
             Errors encountered: Failed to extract transcript or audio"
        );
    }

    #[test]
    fn test_identification_alone_is_not_success() {
        let mut summary = RunSummary::default();
        summary.processed("content_identification");
        assert!(!summary.succeeded());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
