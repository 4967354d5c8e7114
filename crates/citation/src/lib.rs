//! citemap Citation Engine
//!
//! From parsed references to an internal-only citation network:
//! - Identifier resolution with scored matching and a per-run cache
//! - Outbound citation fetching with bounded fan-out
//! - Graph building restricted to the selected references
//! - Export to node/edge tables and GraphML

pub mod errors;
pub mod export;
pub mod fetcher;
pub mod graph;
pub mod pipeline;
pub mod resolver;

pub use errors::PipelineError;
pub use export::{read_graphml, write_all, OutputPaths};
pub use fetcher::{CitationFetcher, FetchOutcome};
pub use graph::{CitationGraph, NodeAttrs, TimeOrderViolation};
pub use pipeline::{Pipeline, RunOutput, RunSummary};
pub use resolver::{Decision, Resolution, Resolver};
