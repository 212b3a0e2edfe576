//! Persistence for pipeline runs, analysis records and content identity.
//!
//! - [`RunStore`], [`AnalysisStore`] and [`IdentityStore`] are the seams the
//!   worker and API depend on
//! - [`MemoryStore`] backs tests and local runs
//! - the Firestore REST backend uses service account auth via gcp_auth, with
//!   token caching, retries and request metrics

pub mod client;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod repos;
pub mod retry;
pub mod store;
pub mod token_cache;
pub mod types;

#[cfg(test)]
mod client_tests;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use memory::MemoryStore;
pub use repos::{FirestoreAnalysisStore, FirestoreIdentityStore, FirestoreRunStore};
pub use retry::RetryConfig;
pub use store::{AnalysisStore, IdentityStore, RunStore, StatusUpdate, StoreBackend, Stores};
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
