//! Pipeline error types
//!
//! Only run-aborting failures live here. Per-record problems degrade the
//! record and are counted in the run summary instead.

use citemap_common::AppError;
use citemap_ingestion::IngestionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(
        "Bibliographic database unavailable after {consecutive_failures} consecutive failures: {last_error}"
    )]
    DatabaseUnavailable {
        consecutive_failures: usize,
        last_error: String,
    },

    #[error("Run exceeded its {secs}s time limit")]
    Timeout { secs: u64 },

    #[error("Export error: {0}")]
    Export(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    App(#[from] AppError),
}

impl From<quick_xml::Error> for PipelineError {
    fn from(err: quick_xml::Error) -> Self {
        PipelineError::Export(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
