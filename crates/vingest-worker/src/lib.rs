//! Video ingestion pipeline.
//!
//! - [`Pipeline`]: admits sources and runs the stages in the background
//! - [`transcript`]: `[MM:SS] text` transcript normalization
//! - [`annotator`]: frame descriptions and content identification
//! - [`enricher`]: catalog lookups for identified shows and movies
//! - [`progress`]: monotonic status writes

pub mod annotator;
pub mod config;
pub mod enricher;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod transcript;

pub use annotator::{FrameAnnotator, IdentificationResponse};
pub use config::IngestConfig;
pub use enricher::{CatalogQuery, MetadataEnricher};
pub use error::{IngestError, IngestResult};
pub use logging::RunLogger;
pub use pipeline::{IngestOutcome, Pipeline, PipelineDeps, RunHandle};
pub use progress::ProgressReporter;
