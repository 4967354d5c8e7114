//! Graph export
//!
//! Three files per run, named from one prefix:
//! `{prefix}.graphml`, `{prefix}_nodes.csv` and `{prefix}_edges.csv`.

mod graphml;
mod tables;

pub use graphml::{read_graphml, to_graphml_string, write_graphml};
pub use tables::{edge_rows, node_rows, write_edges_csv, write_nodes_csv, EDGE_COLUMNS, NODE_COLUMNS};

use crate::errors::Result;
use crate::graph::CitationGraph;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;

/// Where one run's outputs go
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPaths {
    pub graphml: PathBuf,
    pub nodes: PathBuf,
    pub edges: PathBuf,
}

impl OutputPaths {
    pub fn for_prefix(prefix: &str) -> Self {
        Self {
            graphml: PathBuf::from(format!("{}.graphml", prefix)),
            nodes: PathBuf::from(format!("{}_nodes.csv", prefix)),
            edges: PathBuf::from(format!("{}_edges.csv", prefix)),
        }
    }
}

/// Write all three outputs
pub fn write_all(graph: &CitationGraph, prefix: &str) -> Result<OutputPaths> {
    let paths = OutputPaths::for_prefix(prefix);

    if let Some(parent) = paths.graphml.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    write_graphml(graph, BufWriter::new(File::create(&paths.graphml)?))?;
    write_nodes_csv(graph, BufWriter::new(File::create(&paths.nodes)?))?;
    write_edges_csv(graph, BufWriter::new(File::create(&paths.edges)?))?;

    info!(
        graphml = %paths.graphml.display(),
        nodes = %paths.nodes.display(),
        edges = %paths.edges.display(),
        "Outputs written"
    );
    Ok(paths)
}
