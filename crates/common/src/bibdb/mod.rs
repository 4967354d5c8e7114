//! External bibliographic database abstraction
//!
//! Two capabilities are required of every backend:
//! - free-text search returning ranked candidate works
//! - outbound citation lookup by external id
//!
//! A direct DOI lookup is optional. `OpenAlexClient` talks to the real
//! service; `StubDatabase` serves fixed data for tests and dry runs.

mod openalex;

pub use openalex::OpenAlexClient;

use crate::errors::{AppError, Result};
use crate::models::{Candidate, SearchQuery};
use crate::text::tokens;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trait for the external bibliographic database
#[async_trait]
pub trait BibliographicDb: Send + Sync {
    /// Ranked candidate works for a normalized text query
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>>;

    /// External ids cited by the given work
    async fn get_outbound_citations(&self, external_id: &str) -> Result<BTreeSet<String>>;

    /// Exact lookup by DOI; `Ok(None)` when unknown or unsupported
    async fn get_by_doi(&self, _doi: &str) -> Result<Option<Candidate>> {
        Ok(None)
    }

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// A work held by `StubDatabase`
#[derive(Debug, Clone)]
pub struct StubWork {
    pub candidate: Candidate,
    pub cites: BTreeSet<String>,
}

impl StubWork {
    pub fn new(external_id: &str, title: &str) -> Self {
        Self {
            candidate: Candidate {
                external_id: external_id.to_string(),
                title: title.to_string(),
                authors: Vec::new(),
                year: None,
                doi: None,
            },
            cites: BTreeSet::new(),
        }
    }

    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidate.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.candidate.year = Some(year);
        self
    }

    pub fn doi(mut self, doi: &str) -> Self {
        self.candidate.doi = Some(doi.to_lowercase());
        self
    }

    pub fn cites<I, S>(mut self, cited: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cites = cited.into_iter().map(Into::into).collect();
        self
    }
}

/// Deterministic in-memory database.
///
/// Search ranks works by how many query tokens appear in their title,
/// author names and year; ties keep insertion order. The year hint is
/// deliberately ignored so callers see cross-year candidates.
#[derive(Debug, Default)]
pub struct StubDatabase {
    works: Vec<StubWork>,
    failing_fetches: HashSet<String>,
    fail_searches: bool,
    search_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl StubDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_work(mut self, work: StubWork) -> Self {
        self.works.push(work);
        self
    }

    /// Make `get_outbound_citations` fail for this id
    pub fn with_failing_fetch(mut self, external_id: &str) -> Self {
        self.failing_fetches.insert(external_id.to_string());
        self
    }

    /// Make every search fail as if the service were unreachable
    pub fn unreachable(mut self) -> Self {
        self.fail_searches = true;
        self
    }

    /// Number of searches served so far
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Number of citation fetches served so far
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn overlap(query: &BTreeSet<String>, work: &StubWork) -> usize {
        let mut haystack = tokens(&work.candidate.title);
        for author in &work.candidate.authors {
            haystack.extend(tokens(author));
        }
        if let Some(year) = work.candidate.year {
            haystack.insert(year.to_string());
        }
        query.intersection(&haystack).count()
    }
}

#[async_trait]
impl BibliographicDb for StubDatabase {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_searches {
            return Err(AppError::Upstream {
                service: self.name().to_string(),
                message: "connection refused".to_string(),
            });
        }

        let wanted = tokens(&query.text);
        let mut ranked: Vec<(usize, usize)> = self
            .works
            .iter()
            .enumerate()
            .map(|(i, work)| (i, Self::overlap(&wanted, work)))
            .filter(|(_, overlap)| *overlap > 0)
            .collect();
        // stable: equal overlaps keep insertion order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(ranked
            .into_iter()
            .take(query.limit)
            .map(|(i, _)| self.works[i].candidate.clone())
            .collect())
    }

    async fn get_outbound_citations(&self, external_id: &str) -> Result<BTreeSet<String>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_fetches.contains(external_id) {
            return Err(AppError::UpstreamStatus {
                service: self.name().to_string(),
                status: 503,
                body: "unavailable".to_string(),
            });
        }

        Ok(self
            .works
            .iter()
            .find(|w| w.candidate.external_id == external_id)
            .map(|w| w.cites.clone())
            .unwrap_or_default())
    }

    async fn get_by_doi(&self, doi: &str) -> Result<Option<Candidate>> {
        let doi = doi.to_lowercase();
        Ok(self
            .works
            .iter()
            .find(|w| w.candidate.doi.as_deref() == Some(doi.as_str()))
            .map(|w| w.candidate.clone()))
    }

    fn name(&self) -> &str {
        "stub"
    }
}
