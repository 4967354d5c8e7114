//! Node and edge tables
//!
//! Nodes are ordered by publication year (unknown last), then `rtf_order`;
//! edges by `(source, target)`.

use crate::graph::{CitationGraph, NodeAttrs};
use citemap_common::models::RtfOrder;
use std::io::Write;

pub const NODE_COLUMNS: [&str; 6] = [
    "rtf_order",
    "pub_year",
    "external_id",
    "match_confidence",
    "doi",
    "title",
];

pub const EDGE_COLUMNS: [&str; 2] = ["source_rtf_order", "target_rtf_order"];

/// Node rows in table order
pub fn node_rows(graph: &CitationGraph) -> Vec<&NodeAttrs> {
    let mut rows: Vec<&NodeAttrs> = graph.nodes().collect();
    rows.sort_by_key(|n| (n.pub_year.is_none(), n.pub_year, n.rtf_order));
    rows
}

/// Edge rows in table order
pub fn edge_rows(graph: &CitationGraph) -> Vec<(RtfOrder, RtfOrder)> {
    // already sorted: BTreeMap of BTreeSets
    graph.edges().collect()
}

pub fn write_nodes_csv<W: Write>(graph: &CitationGraph, mut out: W) -> std::io::Result<()> {
    writeln!(out, "{}", NODE_COLUMNS.join(","))?;
    for node in node_rows(graph) {
        let fields = [
            node.rtf_order.to_string(),
            optional(node.pub_year),
            csv_field(node.external_id.as_deref().unwrap_or("")),
            node.match_confidence.to_string(),
            csv_field(node.doi.as_deref().unwrap_or("")),
            csv_field(node.title.as_deref().unwrap_or("")),
        ];
        writeln!(out, "{}", fields.join(","))?;
    }
    out.flush()
}

pub fn write_edges_csv<W: Write>(graph: &CitationGraph, mut out: W) -> std::io::Result<()> {
    writeln!(out, "{}", EDGE_COLUMNS.join(","))?;
    for (source, target) in edge_rows(graph) {
        writeln!(out, "{},{}", source, target)?;
    }
    out.flush()
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Quote a field when it holds a delimiter, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
