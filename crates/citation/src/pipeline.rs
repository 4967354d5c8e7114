//! Mapping pipeline
//!
//! Segment, parse, resolve, fetch, build. Resolution and fetching run
//! concurrently up to `max_in_flight` and under one run-level timeout;
//! everything else is synchronous.

use crate::errors::{PipelineError, Result};
use crate::fetcher::CitationFetcher;
use crate::graph::{CitationGraph, TimeOrderViolation};
use crate::resolver::{Decision, Resolution, Resolver};
use citemap_common::config::{AppConfig, ResolverConfig};
use citemap_common::models::{RawEntry, ReferenceRecord, ResolvedReference, RtfOrder};
use citemap_common::{BibliographicDb, RunCache};
use citemap_ingestion::{Bibliography, ReferenceParser, Selection};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// End-of-run report
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub database: String,
    pub references_found: usize,
    pub references_selected: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub resolution_failures: usize,
    pub fetch_failures: usize,
    pub nodes: usize,
    pub edges: usize,
    pub unresolved_rtf_orders: Vec<RtfOrder>,
    pub time_order_violations: Vec<TimeOrderViolation>,
}

/// Everything one run produces
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub records: Vec<ReferenceRecord>,
    pub resolved: Vec<ResolvedReference>,
    pub graph: CitationGraph,
    pub summary: RunSummary,
}

pub struct Pipeline {
    db: Arc<dyn BibliographicDb>,
    parser: ReferenceParser,
    resolver_config: ResolverConfig,
    per_page: usize,
    max_in_flight: usize,
    run_timeout: Duration,
}

impl Pipeline {
    pub fn new(db: Arc<dyn BibliographicDb>, config: &AppConfig) -> Self {
        Self {
            db,
            parser: ReferenceParser::default(),
            resolver_config: config.resolver.clone(),
            per_page: config.openalex.per_page,
            max_in_flight: config.concurrency.max_in_flight.max(1),
            run_timeout: config.run_timeout(),
        }
    }

    /// Use a fixed parser, e.g. one with a pinned year bound
    pub fn with_parser(mut self, parser: ReferenceParser) -> Self {
        self.parser = parser;
        self
    }

    /// Map the selected entries of a bibliography block
    pub async fn run(&self, bibliography: &str, selection: &Selection) -> Result<RunOutput> {
        let bib = Bibliography::parse(bibliography)?;
        let entries = bib.select(selection)?;
        self.run_entries(entries, bib.len()).await
    }

    /// Map already-segmented entries; `found` is the bibliography size
    pub async fn run_entries(&self, entries: Vec<RawEntry>, found: usize) -> Result<RunOutput> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id, database = self.db.name());

        async move {
            info!(found, selected = entries.len(), "Starting citation mapping run");

            let records: Vec<ReferenceRecord> =
                entries.iter().map(|entry| self.parser.parse(entry)).collect();

            let secs = self.run_timeout.as_secs();
            let (resolutions, fetched) = tokio::time::timeout(self.run_timeout, async {
                let resolutions = self.resolve_all(&records).await?;
                let references: Vec<ResolvedReference> =
                    resolutions.iter().map(|r| r.reference.clone()).collect();
                let fetched = CitationFetcher::new(self.db.clone(), self.max_in_flight)
                    .fetch_all(&references)
                    .await;
                Ok::<_, PipelineError>((resolutions, fetched))
            })
            .await
            .map_err(|_| {
                warn!(secs, "Run timed out");
                PipelineError::Timeout { secs }
            })??;

            let resolution_failures = resolutions.iter().filter(|r| r.failed).count();
            let resolved: Vec<ResolvedReference> =
                resolutions.into_iter().map(|r| r.reference).collect();
            let graph = CitationGraph::build(&resolved, &fetched.citations);

            let unresolved_rtf_orders: Vec<RtfOrder> = resolved
                .iter()
                .filter(|r| !r.is_resolved())
                .map(|r| r.rtf_order)
                .collect();
            let time_order_violations = graph.time_order_violations();
            for v in &time_order_violations {
                warn!(
                    source = v.source,
                    target = v.target,
                    source_year = v.source_year,
                    target_year = v.target_year,
                    "Citing work is older than the cited work"
                );
            }

            let summary = RunSummary {
                run_id,
                database: self.db.name().to_string(),
                references_found: found,
                references_selected: records.len(),
                resolved: resolved.len() - unresolved_rtf_orders.len(),
                unresolved: unresolved_rtf_orders.len(),
                resolution_failures,
                fetch_failures: fetched.failed.len(),
                nodes: graph.node_count(),
                edges: graph.edge_count(),
                unresolved_rtf_orders,
                time_order_violations,
            };

            info!(
                resolved = summary.resolved,
                unresolved = summary.unresolved,
                nodes = summary.nodes,
                edges = summary.edges,
                "Citation mapping run complete"
            );

            Ok(RunOutput {
                records,
                resolved,
                graph,
                summary,
            })
        }
        .instrument(span)
        .await
    }

    /// Resolve every record with a fresh run cache; results by `rtf_order`
    async fn resolve_all(&self, records: &[ReferenceRecord]) -> Result<Vec<Resolution>> {
        let cache: RunCache<Decision> = RunCache::new("resolution");
        let resolver = Resolver::new(
            self.db.clone(),
            self.resolver_config.clone(),
            self.per_page,
            &cache,
        );

        let mut resolutions: Vec<Resolution> = stream::iter(records)
            .map(|record| resolver.resolve(record))
            .buffer_unordered(self.max_in_flight)
            .try_collect()
            .await?;

        resolutions.sort_by_key(|r| r.reference.rtf_order);
        Ok(resolutions)
    }
}
