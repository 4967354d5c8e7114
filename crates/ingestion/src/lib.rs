//! citemap Ingestion
//!
//! Turns one document into parsed reference records:
//! - RTF to plain text and bibliography location
//! - Segmentation into numbered entries
//! - Subset selection by original numbering
//! - Best-effort field extraction per entry

pub mod errors;
pub mod parser;
pub mod rtf;
pub mod segmenter;
pub mod selection;

pub use errors::IngestionError;
pub use parser::{parse_entry, ReferenceParser};
pub use rtf::{locate_bibliography, looks_like_rtf, rtf_to_text};
pub use segmenter::{segment, Bibliography};
pub use selection::Selection;
