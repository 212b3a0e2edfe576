//! Application state.

use vingest_firestore::Stores;
use vingest_worker::{IngestConfig, Pipeline};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Pipeline,
    pub stores: Stores,
}

impl AppState {
    /// Connect the configured stores and build the pipeline from the environment.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let stores = Stores::connect(config.store_backend).await?;
        let pipeline = Pipeline::from_env(IngestConfig::from_env(), stores).await?;
        Ok(Self::with_pipeline(config, pipeline))
    }

    /// State around an already-built pipeline; reads go to the pipeline's stores.
    pub fn with_pipeline(config: ApiConfig, pipeline: Pipeline) -> Self {
        let stores = pipeline.stores().clone();
        Self {
            config,
            pipeline,
            stores,
        }
    }
}
