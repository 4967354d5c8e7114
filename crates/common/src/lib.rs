//! citemap Common Library
//!
//! Shared code for the citemap crates including:
//! - Data model for references, resolutions and citation sets
//! - Bibliographic database abstraction (OpenAlex, stub)
//! - Per-run cache
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod bibdb;
pub mod cache;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod text;

// Re-export commonly used types
pub use bibdb::{BibliographicDb, OpenAlexClient, StubDatabase, StubWork};
pub use cache::RunCache;
pub use config::AppConfig;
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
