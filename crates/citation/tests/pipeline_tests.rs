//! End-to-end runs through `Pipeline` against deterministic stub data

use async_trait::async_trait;
use citemap_citation::{read_graphml, Pipeline, PipelineError};
use citemap_common::config::AppConfig;
use citemap_common::models::{Candidate, SearchQuery};
use citemap_common::{BibliographicDb, StubDatabase, StubWork};
use citemap_ingestion::{IngestionError, ReferenceParser, Selection};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

const BIBLIOGRAPHY: &str = "References\n\
[1] A. Alpha, \u{201c}Graph alpha methods,\u{201d} J. Net., 2001.\n\
[2] B. Beta, \u{201c}Beta tree search,\u{201d} J. Net., 2002.\n\
[3] C. Gamma, \u{201c}Gamma network flows,\u{201d} J. Net., 1998.\n\
[4] D. Delta, \u{201c}Delta spectral partitioning,\u{201d} J. Net., 1995.\n\
[5] E. Epsilon, \u{201c}Epsilon random walks,\u{201d} J. Net., 2003.\n";

fn works() -> [StubWork; 5] {
    [
        StubWork::new("W1", "Graph alpha methods").authors(["Ann Alpha"]).year(2001),
        StubWork::new("W2", "Beta tree search").authors(["Bob Beta"]).year(2002),
        StubWork::new("W3", "Gamma network flows").authors(["Cy Gamma"]).year(1998),
        StubWork::new("W4", "Delta spectral partitioning").authors(["Di Delta"]).year(1995),
        StubWork::new("W5", "Epsilon random walks").authors(["Ed Epsilon"]).year(2003),
    ]
}

/// Stub database over the five works with `(citing, cited)` links
fn database(links: &[(&str, &str)]) -> StubDatabase {
    works().into_iter().fold(StubDatabase::new(), |db, work| {
        let cited: Vec<&str> = links
            .iter()
            .filter(|(citing, _)| *citing == work.candidate.external_id)
            .map(|(_, cited)| *cited)
            .collect();
        db.with_work(work.cites(cited))
    })
}

fn pipeline(db: Arc<dyn BibliographicDb>) -> Pipeline {
    pipeline_with(db, AppConfig::default())
}

fn pipeline_with(db: Arc<dyn BibliographicDb>, config: AppConfig) -> Pipeline {
    Pipeline::new(db, &config).with_parser(ReferenceParser::with_max_year(2026))
}

fn selection(expression: &str) -> Selection {
    Selection::parse(expression).unwrap()
}

fn text() -> &'static str {
    citemap_ingestion::locate_bibliography(BIBLIOGRAPHY)
}

#[tokio::test]
async fn test_single_internal_edge() {
    let db = Arc::new(database(&[("W1", "W3")]));
    let out = pipeline(db).run(text(), &selection("1,2,3")).await.unwrap();

    assert_eq!(out.graph.node_count(), 3);
    assert_eq!(out.graph.edges().collect::<Vec<_>>(), vec![(1, 3)]);
    assert_eq!(out.summary.references_found, 5);
    assert_eq!(out.summary.references_selected, 3);
    assert_eq!(out.summary.resolved, 3);
}

#[tokio::test]
async fn test_citation_to_unselected_reference_is_dropped() {
    let db = Arc::new(database(&[("W2", "W3"), ("W2", "W4")]));
    let out = pipeline(db).run(text(), &selection("2,4")).await.unwrap();

    let nodes: Vec<u32> = out.graph.nodes().map(|n| n.rtf_order).collect();
    assert_eq!(nodes, vec![2, 4]);
    assert_eq!(out.graph.edges().collect::<Vec<_>>(), vec![(2, 4)]);
}

#[tokio::test]
async fn test_node_set_is_exactly_the_selection() {
    // W1 cites itself and a work outside the bibliography
    let db = Arc::new(database(&[("W1", "W1"), ("W1", "W3"), ("W1", "W99"), ("W3", "W4")]));
    let out = pipeline(db).run(text(), &selection("5-1")).await.unwrap();

    let nodes: BTreeSet<u32> = out.graph.nodes().map(|n| n.rtf_order).collect();
    assert_eq!(nodes, (1..=5).collect());
    assert!(out.graph.edges().all(|(a, b)| a != b));
    assert!(out.graph.edges().all(|(a, b)| nodes.contains(&a) && nodes.contains(&b)));
    assert_eq!(out.graph.edges().collect::<Vec<_>>(), vec![(1, 3), (3, 4)]);
}

#[tokio::test]
async fn test_bare_entry_is_isolated_node() {
    let bibliography = "[1] A. Alpha, \u{201c}Graph alpha methods,\u{201d} J. Net., 2001.\n\
        [2] Personal communication.\n\
        [3] C. Gamma, \u{201c}Gamma network flows,\u{201d} J. Net., 1998.";
    let db = Arc::new(database(&[("W1", "W3")]));
    let out = pipeline(db).run(bibliography, &Selection::All).await.unwrap();

    let bare = out.graph.node(2).unwrap();
    assert_eq!(bare.pub_year, None);
    assert_eq!(bare.external_id, None);
    assert_eq!(out.graph.isolated().collect::<Vec<_>>(), vec![2]);
    assert_eq!(out.summary.unresolved_rtf_orders, vec![2]);
    assert_eq!(out.summary.resolution_failures, 0);
}

#[tokio::test]
async fn test_bare_entry_gains_no_edges_from_loose_matches() {
    let bibliography = "[1] A. Alpha, \u{201c}Graph alpha methods,\u{201d} J. Net., 2001.\n\
        [2] Personal communication.";
    let db = Arc::new(
        StubDatabase::new()
            .with_work(
                StubWork::new("W1", "Graph alpha methods")
                    .authors(["Ann Alpha"])
                    .year(2001)
                    .cites(["W9"]),
            )
            .with_work(StubWork::new("W9", "Communication").year(1990))
            .with_work(StubWork::new("W8", "Personal communication networks").year(1990)),
    );
    let out = pipeline(db).run(bibliography, &Selection::All).await.unwrap();

    assert_eq!(out.resolved[1].external_id, None);
    assert_eq!(out.resolved[1].pub_year, None);
    assert_eq!(out.graph.edge_count(), 0);
    assert_eq!(out.graph.isolated().collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn test_same_title_different_years_not_conflated() {
    let bibliography = "[1] A. Alpha, \u{201c}Graph alpha methods,\u{201d} J. Net., 2001.\n\
        [2] A. Alpha, \u{201c}Graph alpha methods,\u{201d} J. Net., 2012.";

    let both = StubDatabase::new()
        .with_work(StubWork::new("W1", "Graph alpha methods").authors(["Ann Alpha"]).year(2001))
        .with_work(StubWork::new("W1b", "Graph alpha methods").authors(["Ann Alpha"]).year(2012));
    let out = pipeline(Arc::new(both)).run(bibliography, &Selection::All).await.unwrap();
    assert_eq!(out.resolved[0].external_id.as_deref(), Some("W1"));
    assert_eq!(out.resolved[1].external_id.as_deref(), Some("W1b"));

    let only_first = StubDatabase::new()
        .with_work(StubWork::new("W1", "Graph alpha methods").authors(["Ann Alpha"]).year(2001));
    let out = pipeline(Arc::new(only_first)).run(bibliography, &Selection::All).await.unwrap();
    assert_eq!(out.resolved[0].external_id.as_deref(), Some("W1"));
    assert_eq!(out.resolved[1].external_id, None);
    assert_eq!(out.resolved[1].pub_year, Some(2012));
}

#[tokio::test]
async fn test_runs_are_idempotent() {
    let db: Arc<dyn BibliographicDb> = Arc::new(database(&[("W1", "W3"), ("W5", "W1"), ("W5", "W2")]));
    let first = pipeline(db.clone()).run(text(), &Selection::All).await.unwrap();
    let second = pipeline(db).run(text(), &Selection::All).await.unwrap();

    assert_eq!(first.resolved, second.resolved);
    assert_eq!(first.graph, second.graph);
    assert_ne!(first.summary.run_id, second.summary.run_id);
}

#[tokio::test]
async fn test_duplicate_entries_share_lookups() {
    let bibliography = "[1] A. Alpha, \u{201c}Graph alpha methods,\u{201d} J. Net., 2001.\n\
        [2] C. Gamma, \u{201c}Gamma network flows,\u{201d} J. Net., 1998.\n\
        [3] A. Alpha, \u{201c}Graph alpha methods,\u{201d} J. Net., 2001.";
    let db = Arc::new(database(&[("W1", "W3")]));

    let mut config = AppConfig::default();
    config.concurrency.max_in_flight = 1;
    let out = pipeline_with(db.clone(), config)
        .run(bibliography, &Selection::All)
        .await
        .unwrap();

    assert_eq!(db.search_calls(), 2);
    assert_eq!(db.fetch_calls(), 2);
    // both copies cite entry 2, neither cites its twin
    assert_eq!(out.graph.edges().collect::<Vec<_>>(), vec![(1, 2), (3, 2)]);
}

#[tokio::test]
async fn test_failed_fetch_only_loses_edges() {
    let db = Arc::new(database(&[("W1", "W3"), ("W2", "W3")]).with_failing_fetch("W1"));
    let out = pipeline(db).run(text(), &selection("1-3")).await.unwrap();

    assert_eq!(out.graph.edges().collect::<Vec<_>>(), vec![(2, 3)]);
    assert_eq!(out.summary.fetch_failures, 1);
    assert_eq!(out.summary.resolved, 3);
}

#[tokio::test]
async fn test_doi_resolves_directly() {
    let bibliography = "[1] A. Alfa, \u{201c}Graf methods,\u{201d} 1999, doi: 10.1000/ALPHA.1.";
    let db = Arc::new(
        StubDatabase::new()
            .with_work(StubWork::new("W1", "Graph alpha methods").year(2001).doi("10.1000/alpha.1")),
    );
    let out = pipeline(db.clone()).run(bibliography, &Selection::All).await.unwrap();

    assert_eq!(out.resolved[0].external_id.as_deref(), Some("W1"));
    assert_eq!(out.resolved[0].match_confidence, 1.0);
    assert_eq!(out.resolved[0].pub_year, Some(2001));
    assert_eq!(db.search_calls(), 0);
}

#[tokio::test]
async fn test_time_order_violations_reported() {
    let db = Arc::new(database(&[("W1", "W5")]));
    let out = pipeline(db).run(text(), &selection("1,5")).await.unwrap();

    assert_eq!(out.summary.time_order_violations.len(), 1);
    let v = &out.summary.time_order_violations[0];
    assert_eq!((v.source, v.target, v.source_year, v.target_year), (1, 5, 2001, 2003));

    let json = serde_json::to_value(&out.summary).unwrap();
    assert_eq!(json["edges"], 1);
    assert_eq!(json["time_order_violations"][0]["target"], 5);
}

#[tokio::test]
async fn test_unreachable_database_is_fatal() {
    let db = Arc::new(StubDatabase::new().unreachable());
    let err = pipeline(db).run(text(), &Selection::All).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::DatabaseUnavailable { consecutive_failures: 5, .. }
    ));
}

#[tokio::test]
async fn test_selection_out_of_range_is_fatal() {
    let db = Arc::new(database(&[]));
    let err = pipeline(db).run(text(), &selection("4-6")).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Ingestion(IngestionError::SelectionOutOfRange { index: 6, available: 5 })
    ));
}

#[tokio::test]
async fn test_graphml_round_trips_run_output() {
    let db = Arc::new(database(&[("W1", "W3"), ("W5", "W1"), ("W5", "W4")]));
    let out = pipeline(db).run(text(), &Selection::All).await.unwrap();

    let xml = citemap_citation::export::to_graphml_string(&out.graph).unwrap();
    let back = read_graphml(&xml).unwrap();
    assert_eq!(back, out.graph);

    let rows = citemap_citation::export::node_rows(&back);
    let years: Vec<Option<i32>> = rows.iter().map(|n| n.pub_year).collect();
    assert_eq!(
        years,
        vec![Some(1995), Some(1998), Some(2001), Some(2002), Some(2003)]
    );
}

/// Never answers within the run limit
struct SlowDatabase;

#[async_trait]
impl BibliographicDb for SlowDatabase {
    async fn search(&self, _query: &SearchQuery) -> citemap_common::Result<Vec<Candidate>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }

    async fn get_outbound_citations(&self, _external_id: &str) -> citemap_common::Result<BTreeSet<String>> {
        Ok(BTreeSet::new())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

#[tokio::test]
async fn test_run_timeout() {
    let mut config = AppConfig::default();
    config.run.timeout_secs = 1;
    let err = pipeline_with(Arc::new(SlowDatabase), config)
        .run(text(), &selection("1"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Timeout { secs: 1 }));
}
