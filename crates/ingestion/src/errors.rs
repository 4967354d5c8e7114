//! Ingestion error types
//!
//! Every variant here is fatal for the run: without a well-formed
//! bibliography and a valid selection no meaningful subset exists.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Segmentation error: {0}")]
    Segmentation(String),

    #[error("No numbered references like [1] found in the bibliography")]
    NoBibliography,

    #[error("Reference {index} requested but the bibliography has {available} entries")]
    SelectionOutOfRange { index: u32, available: usize },

    #[error("Invalid selection '{expression}': {message}")]
    InvalidSelection { expression: String, message: String },

    #[error("Selection matched no references")]
    EmptySelection,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
