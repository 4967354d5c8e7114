//! Search query construction
//!
//! Preference order: first surname + title fragment (with the year carried
//! separately as a search hint), then the leading part of the raw entry
//! text when no title was extracted.

use citemap_common::models::{ReferenceRecord, SearchQuery};
use citemap_common::text::normalize_text;

/// Longest raw-text prefix used as a fallback query, in characters
pub const MAX_RAW_QUERY_CHARS: usize = 160;

/// Build the search query for a record; `None` when the entry has no
/// searchable text at all
pub fn build_query(record: &ReferenceRecord, limit: usize) -> Option<SearchQuery> {
    let text = match record.title_fragment.present() {
        Some(title) => {
            let mut parts = Vec::with_capacity(2);
            if let Some(surname) = record.authors.first() {
                parts.push(surname.as_str());
            }
            parts.push(title.as_str());
            normalize_text(&parts.join(" "))
        }
        None => {
            let prefix: String = record.raw_text.chars().take(MAX_RAW_QUERY_CHARS).collect();
            normalize_text(&prefix)
        }
    };

    if text.is_empty() {
        return None;
    }

    Some(SearchQuery {
        text,
        year: record.year.copied(),
        limit,
    })
}

/// Cache key for a query: identical keys always get the same decision
pub fn cache_key(query: &SearchQuery) -> String {
    match query.year {
        Some(year) => format!("{}|{}", query.text, year),
        None => format!("{}|-", query.text),
    }
}
