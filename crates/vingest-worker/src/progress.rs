//! Status writes for one run.

use std::sync::Arc;

use vingest_firestore::{RunStore, StatusUpdate};
use vingest_models::SourceKey;

use crate::logging::RunLogger;

/// Named progress checkpoints, in pipeline order.
pub mod checkpoint {
    pub const PICKED_UP: u8 = 10;
    pub const PROVIDERS_READY: u8 = 20;
    pub const EXTRACTION_STARTING: u8 = 30;
    pub const EXTRACTOR_READY: u8 = 35;
    pub const WORKDIR_READY: u8 = 40;
    pub const TRANSCRIPT: u8 = 45;
    pub const TRANSCRIPT_NORMALIZE: u8 = 55;
    pub const FRAMES: u8 = 65;
    pub const ANNOTATION: u8 = 75;
    pub const DESCRIPTION_CALL: u8 = 80;
    pub const DESCRIPTIONS_PARSED: u8 = 82;
    pub const IDENTIFICATION_CALL: u8 = 84;
    pub const IDENTIFICATION_RETURNED: u8 = 85;
    pub const DESCRIPTIONS_SAVED: u8 = 88;
    pub const IDENTIFICATION_SAVED: u8 = 90;
    pub const ENRICHMENT: u8 = 92;
    pub const CLEANUP: u8 = 95;
}

/// Writes progress for a run, never going backwards.
///
/// Store failures are logged and swallowed so a flaky status write never
/// aborts ingestion.
pub struct ProgressReporter {
    store: Arc<dyn RunStore>,
    key: SourceKey,
    logger: RunLogger,
    last: u8,
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn RunStore>, key: SourceKey, logger: RunLogger) -> Self {
        Self {
            store,
            key,
            logger,
            last: 0,
        }
    }

    pub fn last(&self) -> u8 {
        self.last
    }

    pub async fn report(&mut self, progress: u8, message: &str) {
        if progress < self.last {
            return;
        }
        self.last = progress;
        self.logger.log_progress(&format!("{}% {}", progress, message));
        self.write(StatusUpdate::processing(progress)).await;
    }

    pub async fn complete(&mut self, message: &str) {
        self.last = 100;
        self.logger.log_completion(message);
        self.write(StatusUpdate::completed(message)).await;
    }

    pub async fn fail(&mut self, error: &str) {
        self.logger.log_error(error);
        self.write(StatusUpdate::failed(error)).await;
    }

    async fn write(&self, update: StatusUpdate) {
        if let Err(e) = self.store.upsert_status(&self.key, update).await {
            self.logger
                .log_warning(&format!("Failed to write run status: {}", e));
        }
    }
}
