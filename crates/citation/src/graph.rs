//! Citation graph representation
//!
//! Nodes are the selected references keyed by `rtf_order`; edges exist only
//! between two nodes. Building is pure: same inputs, same graph.

use citemap_common::models::{CitationSet, ResolvedReference, RtfOrder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Attributes carried by one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAttrs {
    pub rtf_order: RtfOrder,
    pub pub_year: Option<i32>,
    pub external_id: Option<String>,
    pub match_confidence: f64,
    pub doi: Option<String>,
    pub title: Option<String>,
}

impl From<&ResolvedReference> for NodeAttrs {
    fn from(r: &ResolvedReference) -> Self {
        Self {
            rtf_order: r.rtf_order,
            pub_year: r.pub_year,
            external_id: r.external_id.clone(),
            match_confidence: r.match_confidence,
            doi: r.doi.clone(),
            title: r.title.clone(),
        }
    }
}

/// An edge whose citing work is older than the cited one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOrderViolation {
    pub source: RtfOrder,
    pub target: RtfOrder,
    pub source_year: i32,
    pub target_year: i32,
}

/// Directed citation graph over the selected references
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CitationGraph {
    nodes: BTreeMap<RtfOrder, NodeAttrs>,

    /// node -> nodes it cites
    outgoing: BTreeMap<RtfOrder, BTreeSet<RtfOrder>>,

    /// node -> nodes citing it
    incoming: BTreeMap<RtfOrder, BTreeSet<RtfOrder>>,
}

impl CitationGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph: one node per reference, edge A -> B when A's
    /// work cites B's work
    pub fn build(references: &[ResolvedReference], citations: &CitationSet) -> Self {
        let mut graph = Self::new();
        for reference in references {
            graph.add_node(NodeAttrs::from(reference));
        }

        // one work may back several duplicate entries
        let mut by_id: BTreeMap<&str, Vec<RtfOrder>> = BTreeMap::new();
        for reference in references {
            if let Some(id) = reference.external_id.as_deref() {
                by_id.entry(id).or_default().push(reference.rtf_order);
            }
        }

        for reference in references {
            let Some(source_id) = reference.external_id.as_deref() else {
                continue;
            };
            let Some(cited) = citations.outbound(source_id) else {
                continue;
            };

            for target_id in cited {
                if target_id == source_id {
                    continue;
                }
                for &target in by_id.get(target_id.as_str()).into_iter().flatten() {
                    graph.add_edge(reference.rtf_order, target);
                }
            }
        }

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Citation graph built"
        );
        graph
    }

    /// Add or replace a node
    pub fn add_node(&mut self, attrs: NodeAttrs) {
        self.nodes.insert(attrs.rtf_order, attrs);
    }

    /// Add an edge; self-loops and edges touching unknown nodes are
    /// rejected. Returns whether the edge was added.
    pub fn add_edge(&mut self, citing: RtfOrder, cited: RtfOrder) -> bool {
        if citing == cited || !self.nodes.contains_key(&citing) || !self.nodes.contains_key(&cited) {
            return false;
        }

        let added = self.outgoing.entry(citing).or_default().insert(cited);
        self.incoming.entry(cited).or_default().insert(citing);
        added
    }

    /// Nodes cited by this node
    pub fn get_references(&self, node: RtfOrder) -> impl Iterator<Item = RtfOrder> + '_ {
        self.outgoing.get(&node).into_iter().flatten().copied()
    }

    /// Nodes citing this node
    pub fn get_citations(&self, node: RtfOrder) -> impl Iterator<Item = RtfOrder> + '_ {
        self.incoming.get(&node).into_iter().flatten().copied()
    }

    pub fn node(&self, node: RtfOrder) -> Option<&NodeAttrs> {
        self.nodes.get(&node)
    }

    /// All nodes, by `rtf_order`
    pub fn nodes(&self) -> impl Iterator<Item = &NodeAttrs> {
        self.nodes.values()
    }

    /// All edges as `(source, target)`, sorted
    pub fn edges(&self) -> impl Iterator<Item = (RtfOrder, RtfOrder)> + '_ {
        self.outgoing
            .iter()
            .flat_map(|(&source, targets)| targets.iter().map(move |&target| (source, target)))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(BTreeSet::len).sum()
    }

    /// Nodes with neither inbound nor outbound edges
    pub fn isolated(&self) -> impl Iterator<Item = RtfOrder> + '_ {
        self.nodes.keys().copied().filter(|n| {
            self.get_references(*n).next().is_none() && self.get_citations(*n).next().is_none()
        })
    }

    /// Edges where the citing work was published before the cited one
    pub fn time_order_violations(&self) -> Vec<TimeOrderViolation> {
        self.edges()
            .filter_map(|(source, target)| {
                let source_year = self.nodes.get(&source)?.pub_year?;
                let target_year = self.nodes.get(&target)?.pub_year?;
                (source_year < target_year).then_some(TimeOrderViolation {
                    source,
                    target,
                    source_year,
                    target_year,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(order: u32, id: Option<&str>, year: Option<i32>) -> ResolvedReference {
        ResolvedReference {
            rtf_order: order,
            external_id: id.map(str::to_string),
            match_confidence: if id.is_some() { 0.9 } else { 0.0 },
            pub_year: year,
            title: None,
            doi: None,
        }
    }

    /// `(citing, cited)` work pairs
    fn citations(pairs: &[(&str, &str)]) -> CitationSet {
        let mut outbound: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (citing, cited) in pairs {
            outbound.entry(citing.to_string()).or_default().insert(cited.to_string());
        }
        let mut set = CitationSet::new();
        for (id, cited) in outbound {
            set.insert(id, cited);
        }
        set
    }

    #[test]
    fn test_edges_stay_inside_selection() {
        let refs = vec![
            resolved(2, Some("W2"), Some(2010)),
            resolved(4, Some("W4"), Some(2005)),
        ];
        // W3 is cited but not selected
        let graph = CitationGraph::build(&refs, &citations(&[("W2", "W3"), ("W2", "W4")]));

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edges().collect::<Vec<_>>(), vec![(2, 4)]);
        assert_eq!(graph.get_citations(4).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_self_citations_and_duplicates_are_dropped() {
        let refs = vec![
            resolved(1, Some("W1"), None),
            resolved(2, Some("W1"), None),
            resolved(3, Some("W3"), None),
        ];
        let graph = CitationGraph::build(&refs, &citations(&[("W1", "W1"), ("W1", "W3"), ("W3", "W1")]));

        assert_eq!(
            graph.edges().collect::<Vec<_>>(),
            vec![(1, 3), (2, 3), (3, 1), (3, 2)]
        );
        assert!(graph.edges().all(|(a, b)| a != b));
    }

    #[test]
    fn test_unresolved_node_is_isolated() {
        let refs = vec![resolved(1, Some("W1"), Some(2001)), resolved(5, None, None)];
        let graph = CitationGraph::build(&refs, &citations(&[("W1", "W9")]));

        assert_eq!(graph.node(5).and_then(|n| n.pub_year), None);
        assert_eq!(graph.isolated().collect::<Vec<_>>(), vec![1, 5]);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_add_edge_rejects_unknown_nodes() {
        let mut graph = CitationGraph::new();
        graph.add_node(NodeAttrs::from(&resolved(1, None, None)));
        assert!(!graph.add_edge(1, 2));
        assert!(!graph.add_edge(1, 1));
    }

    #[test]
    fn test_time_order_violations() {
        let refs = vec![
            resolved(1, Some("W1"), Some(1990)),
            resolved(2, Some("W2"), Some(2000)),
        ];
        let graph = CitationGraph::build(&refs, &citations(&[("W1", "W2"), ("W2", "W1")]));

        assert_eq!(
            graph.time_order_violations(),
            vec![TimeOrderViolation {
                source: 1,
                target: 2,
                source_year: 1990,
                target_year: 2000,
            }]
        );
    }
}
