//! Bibliography entries and what we learned about them

use super::RtfOrder;
use serde::{Deserialize, Serialize};

/// One bibliography line item, as segmented from the source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    /// Original 1-based numbering in the bibliography
    pub rtf_order: RtfOrder,

    /// Entry text with whitespace collapsed
    pub text: String,
}

/// A best-effort extracted field.
///
/// `Absent` means the entry text carries nothing that could be this field
/// (no year-like token at all, empty entry). `Unknown` means candidates
/// were present but none could be extracted with confidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Field<T> {
    Present(T),
    Absent,
    Unknown,
}

impl<T> Field<T> {
    pub fn as_ref(&self) -> Field<&T> {
        match self {
            Field::Present(v) => Field::Present(v),
            Field::Absent => Field::Absent,
            Field::Unknown => Field::Unknown,
        }
    }

    /// The value if it was extracted
    pub fn present(&self) -> Option<&T> {
        match self {
            Field::Present(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Field::Present(_))
    }
}

impl<T: Copy> Field<T> {
    pub fn copied(&self) -> Option<T> {
        self.present().copied()
    }
}

/// Structured fields parsed from a `RawEntry`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub rtf_order: RtfOrder,

    /// Author surnames in citation order; empty when none were found
    pub authors: Vec<String>,

    /// Publication year
    pub year: Field<i32>,

    /// Title, or the leading part of it
    pub title_fragment: Field<String>,

    /// DOI, lower-cased
    pub doi: Field<String>,

    /// The entry text this record was parsed from
    pub raw_text: String,
}

impl ReferenceRecord {
    /// True when nothing but the raw text is available for matching
    pub fn is_bare(&self) -> bool {
        self.authors.is_empty()
            && !self.year.is_present()
            && !self.title_fragment.is_present()
            && !self.doi.is_present()
    }
}

/// Outcome of resolving one reference against the external database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedReference {
    pub rtf_order: RtfOrder,

    /// Canonical work identifier; `None` when unresolved
    pub external_id: Option<String>,

    /// Score of the accepted (or best rejected) candidate in [0, 1]
    pub match_confidence: f64,

    /// Matched work's year, else the parsed year
    pub pub_year: Option<i32>,

    /// Matched work's title, else the parsed title fragment
    pub title: Option<String>,

    /// Matched work's DOI, else the parsed DOI
    pub doi: Option<String>,
}

impl ResolvedReference {
    /// An isolated node: no identifier, no citation links
    pub fn unresolved(record: &ReferenceRecord, best_score: f64) -> Self {
        Self {
            rtf_order: record.rtf_order,
            external_id: None,
            match_confidence: best_score.clamp(0.0, 1.0),
            pub_year: record.year.copied(),
            title: record.title_fragment.present().cloned(),
            doi: record.doi.present().cloned(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.external_id.is_some()
    }
}
