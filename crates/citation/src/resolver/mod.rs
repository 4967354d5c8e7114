//! Identifier resolution
//!
//! Maps each parsed reference to a canonical external work id:
//! DOI lookup first when a DOI was parsed, then a scored free-text search.
//! Decisions are cached per run under the normalized query, so duplicate
//! entries never query twice.
//!
//! A failed lookup downgrades only its own reference to unresolved. Once
//! `max_consecutive_failures` lookups fail in a row the database is taken
//! to be down and the run aborts.

mod query;
mod scoring;

pub use query::{build_query, cache_key, MAX_RAW_QUERY_CHARS};
pub use scoring::{author_overlap, levenshtein_similarity, score_candidate, title_similarity, Signals};

use crate::errors::{PipelineError, Result};
use citemap_common::config::ResolverConfig;
use citemap_common::metrics::record_resolution;
use citemap_common::models::{Candidate, ReferenceRecord, ResolvedReference, SearchQuery};
use citemap_common::{AppError, BibliographicDb, RunCache};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A resolution decision as cached for one query
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Highest-scoring candidate, accepted or not
    pub best: Option<Candidate>,
    pub confidence: f64,
    pub accepted: bool,
}

impl Decision {
    fn nothing() -> Self {
        Self {
            best: None,
            confidence: 0.0,
            accepted: false,
        }
    }

    fn exact(candidate: Candidate) -> Self {
        Self {
            best: Some(candidate),
            confidence: 1.0,
            accepted: true,
        }
    }
}

/// Resolution of one reference
#[derive(Debug, Clone)]
pub struct Resolution {
    pub reference: ResolvedReference,
    /// The lookup failed and the reference was downgraded
    pub failed: bool,
}

/// Identifier resolver bound to one run's cache
pub struct Resolver<'a> {
    db: Arc<dyn BibliographicDb>,
    config: ResolverConfig,
    per_page: usize,
    cache: &'a RunCache<Decision>,
    consecutive_failures: AtomicUsize,
}

impl<'a> Resolver<'a> {
    pub fn new(
        db: Arc<dyn BibliographicDb>,
        config: ResolverConfig,
        per_page: usize,
        cache: &'a RunCache<Decision>,
    ) -> Self {
        Self {
            db,
            config,
            per_page: per_page.max(1),
            cache,
            consecutive_failures: AtomicUsize::new(0),
        }
    }

    /// Resolve one reference.
    ///
    /// Only `PipelineError::DatabaseUnavailable` is returned as an error;
    /// every other failure yields an unresolved reference.
    #[instrument(skip(self, record), fields(rtf_order = record.rtf_order))]
    pub async fn resolve(&self, record: &ReferenceRecord) -> Result<Resolution> {
        if let Some(doi) = record.doi.present() {
            match self.lookup_doi(doi).await {
                Ok(Some(decision)) => return Ok(self.finish(record, decision)),
                Ok(None) => debug!(doi = %doi, "DOI unknown, falling back to search"),
                Err(e) => return self.downgrade(record, e),
            }
        }

        if !record.year.is_present() && !record.title_fragment.is_present() {
            debug!("No year or title to match on");
            return Ok(self.finish(record, Decision::nothing()));
        }

        let Some(query) = build_query(record, self.per_page) else {
            debug!("Nothing searchable in entry");
            return Ok(self.finish(record, Decision::nothing()));
        };

        let key = cache_key(&query);
        match self
            .cache
            .get_or_load(&key, || self.search_and_decide(record, &query))
            .await
        {
            Ok(decision) => Ok(self.finish(record, decision)),
            Err(e) => self.downgrade(record, e),
        }
    }

    async fn lookup_doi(&self, doi: &str) -> std::result::Result<Option<Decision>, AppError> {
        let key = format!("doi:{}", doi);
        if let Some(decision) = self.cache.get(&key).await {
            return Ok(Some(decision));
        }

        let found = self.db.get_by_doi(doi).await?;
        self.consecutive_failures.store(0, Ordering::SeqCst);

        match found {
            Some(candidate) => {
                let decision = Decision::exact(candidate);
                self.cache.insert(key, decision.clone()).await;
                Ok(Some(decision))
            }
            None => Ok(None),
        }
    }

    async fn search_and_decide(
        &self,
        record: &ReferenceRecord,
        query: &SearchQuery,
    ) -> std::result::Result<Decision, AppError> {
        let candidates = self.db.search(query).await?;
        self.consecutive_failures.store(0, Ordering::SeqCst);

        let mut best: Option<(f64, &Candidate)> = None;
        for candidate in &candidates {
            let score = score_candidate(record, candidate, &self.config);
            debug!(
                external_id = %candidate.external_id,
                score,
                "Candidate scored"
            );
            // ties keep the higher-ranked candidate
            if best.map_or(true, |(top, _)| score > top) {
                best = Some((score, candidate));
            }
        }

        Ok(match best {
            Some((score, candidate)) => Decision {
                best: Some(candidate.clone()),
                confidence: score,
                accepted: score >= self.config.confidence_threshold,
            },
            None => Decision::nothing(),
        })
    }

    fn finish(&self, record: &ReferenceRecord, decision: Decision) -> Resolution {
        let reference = match decision.best {
            Some(candidate) if decision.accepted => ResolvedReference {
                rtf_order: record.rtf_order,
                external_id: Some(candidate.external_id),
                match_confidence: decision.confidence.clamp(0.0, 1.0),
                pub_year: candidate.year.or_else(|| record.year.copied()),
                title: Some(candidate.title)
                    .filter(|t| !t.is_empty())
                    .or_else(|| record.title_fragment.present().cloned()),
                doi: candidate.doi.or_else(|| record.doi.present().cloned()),
            },
            _ => ResolvedReference::unresolved(record, decision.confidence),
        };

        match &reference.external_id {
            Some(id) => info!(
                external_id = %id,
                confidence = reference.match_confidence,
                "Reference resolved"
            ),
            None => info!(
                confidence = reference.match_confidence,
                "Reference unresolved"
            ),
        }
        record_resolution(reference.is_resolved(), false);

        Resolution {
            reference,
            failed: false,
        }
    }

    fn downgrade(&self, record: &ReferenceRecord, error: AppError) -> Result<Resolution> {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(
            rtf_order = record.rtf_order,
            error = %error,
            consecutive_failures = failures,
            "Lookup failed, reference left unresolved"
        );

        if failures >= self.config.max_consecutive_failures {
            return Err(PipelineError::DatabaseUnavailable {
                consecutive_failures: failures,
                last_error: error.to_string(),
            });
        }

        record_resolution(false, true);
        Ok(Resolution {
            reference: ResolvedReference::unresolved(record, 0.0),
            failed: true,
        })
    }

    /// Lookups that failed since the last success
    pub fn consecutive_failures(&self) -> usize {
        self.consecutive_failures.load(Ordering::SeqCst)
    }
}
