//! Axum HTTP API for the ingestion pipeline.
//!
//! - `POST /api/video/process`: admit a video
//! - `GET /api/video/status`: poll a run
//! - `GET /api/video/analysis`: read stored analysis and identity
//! - `/health`, `/ready`, `/metrics`

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
