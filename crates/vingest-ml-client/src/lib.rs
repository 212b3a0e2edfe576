//! Clients for the remote model and catalog providers.
//!
//! - [`GeminiClient`]: frame descriptions and speech-to-text
//! - [`TmdbClient`]: show/movie catalog lookups
//!
//! Callers depend on the [`VisionModel`], [`SpeechToText`] and [`CatalogApi`]
//! traits.

pub mod error;
pub mod gemini;
pub mod provider;
pub mod tmdb;

pub use error::{MlError, MlResult};
pub use gemini::{GeminiClient, GeminiConfig};
pub use provider::{CatalogApi, CatalogKind, SpeechToText, VisionModel};
pub use tmdb::{TmdbClient, TmdbConfig};
