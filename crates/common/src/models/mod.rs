//! Shared data model for one citation-mapping run
//!
//! Records flow strictly forward:
//! `RawEntry` -> `ReferenceRecord` -> `ResolvedReference`, with the
//! `CitationSet` fetched for every resolved work.

mod reference;
mod work;

pub use reference::{Field, RawEntry, ReferenceRecord, ResolvedReference};
pub use work::{Candidate, CitationSet, SearchQuery};

/// Local node key: the 1-based position of a reference in its bibliography
pub type RtfOrder = u32;
