//! Works as seen by the external bibliographic database

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A search request against the external database
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Normalized free-text query
    pub text: String,

    /// Publication year hint, used to narrow the search window
    pub year: Option<i32>,

    /// Maximum number of candidates wanted
    pub limit: usize,
}

/// A ranked search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub external_id: String,
    pub title: String,
    /// Display names, in author order
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub doi: Option<String>,
}

/// Outbound citations per resolved work, keyed by external id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationSet {
    outbound: BTreeMap<String, BTreeSet<String>>,
}

impl CitationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, external_id: impl Into<String>, cited: BTreeSet<String>) {
        self.outbound.insert(external_id.into(), cited);
    }

    /// Works cited by `external_id`; empty when never fetched or failed
    pub fn outbound(&self, external_id: &str) -> Option<&BTreeSet<String>> {
        self.outbound.get(external_id)
    }

    /// Whether `citing` is recorded as citing `cited`
    pub fn cites(&self, citing: &str, cited: &str) -> bool {
        self.outbound
            .get(citing)
            .map(|set| set.contains(cited))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.outbound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outbound.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.outbound.iter()
    }
}
