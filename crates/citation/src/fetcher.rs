//! Citation link fetching
//!
//! One outbound-citation fetch per distinct resolved id, at most
//! `max_in_flight` at a time. A failed fetch leaves that id with an empty
//! outbound set: a missing edge is acceptable, an invented one is not.

use citemap_common::metrics::record_citation_fetch;
use citemap_common::models::{CitationSet, ResolvedReference};
use citemap_common::BibliographicDb;
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outbound citations plus the ids whose fetch failed
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub citations: CitationSet,
    pub failed: BTreeSet<String>,
}

pub struct CitationFetcher {
    db: Arc<dyn BibliographicDb>,
    max_in_flight: usize,
}

impl CitationFetcher {
    pub fn new(db: Arc<dyn BibliographicDb>, max_in_flight: usize) -> Self {
        Self {
            db,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Fetch outbound citations for every distinct resolved id
    pub async fn fetch_all(&self, references: &[ResolvedReference]) -> FetchOutcome {
        let ids: BTreeSet<&str> = references
            .iter()
            .filter_map(|r| r.external_id.as_deref())
            .collect();

        debug!(distinct_ids = ids.len(), "Fetching outbound citations");

        let results: Vec<(String, Option<BTreeSet<String>>)> = stream::iter(ids)
            .map(|id| async move {
                match self.db.get_outbound_citations(id).await {
                    Ok(cited) => {
                        record_citation_fetch(true);
                        debug!(external_id = id, outbound = cited.len(), "Citations fetched");
                        (id.to_string(), Some(cited))
                    }
                    Err(e) => {
                        record_citation_fetch(false);
                        warn!(external_id = id, error = %e, "Citation fetch failed, using empty set");
                        (id.to_string(), None)
                    }
                }
            })
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        let mut outcome = FetchOutcome::default();
        for (id, cited) in results {
            match cited {
                Some(cited) => outcome.citations.insert(id, cited),
                None => {
                    outcome.citations.insert(id.clone(), BTreeSet::new());
                    outcome.failed.insert(id);
                }
            }
        }

        info!(
            fetched = outcome.citations.len(),
            failed = outcome.failed.len(),
            "Citation fetch complete"
        );
        outcome
    }
}
