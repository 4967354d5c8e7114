//! GraphML encoding
//!
//! Writes a directed GraphML document with one `<key>` per node attribute
//! and reads such documents back, so a written graph can be reloaded
//! exactly. Unknown values are written as missing `<data>` elements.

use crate::errors::{PipelineError, Result};
use crate::graph::{CitationGraph, NodeAttrs};
use citemap_common::models::RtfOrder;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::fmt::Display;
use std::io::Write;

const GRAPHML_NS: &str = "http://graphml.graphdrawing.org/xmlns";

/// `(key id, attr.type)` for every node attribute
const NODE_KEYS: [(&str, &str); 6] = [
    ("rtf_order", "int"),
    ("pub_year", "int"),
    ("external_id", "string"),
    ("match_confidence", "double"),
    ("doi", "string"),
    ("title", "string"),
];

fn node_id(order: RtfOrder) -> String {
    format!("n{}", order)
}

/// Write the graph as GraphML
pub fn write_graphml<W: Write>(graph: &CitationGraph, out: W) -> Result<()> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(
        BytesStart::new("graphml").with_attributes([("xmlns", GRAPHML_NS)]),
    ))?;

    for (key, kind) in NODE_KEYS {
        writer.write_event(Event::Empty(BytesStart::new("key").with_attributes([
            ("id", key),
            ("for", "node"),
            ("attr.name", key),
            ("attr.type", kind),
        ])))?;
    }

    writer.write_event(Event::Start(
        BytesStart::new("graph").with_attributes([("id", "citations"), ("edgedefault", "directed")]),
    ))?;

    for node in graph.nodes() {
        let id = node_id(node.rtf_order);
        writer.write_event(Event::Start(
            BytesStart::new("node").with_attributes([("id", id.as_str())]),
        ))?;

        let values = [
            ("rtf_order", Some(node.rtf_order.to_string())),
            ("pub_year", node.pub_year.map(|y| y.to_string())),
            ("external_id", node.external_id.clone()),
            ("match_confidence", Some(node.match_confidence.to_string())),
            ("doi", node.doi.clone()),
            ("title", node.title.clone()),
        ];
        for (key, value) in values {
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                continue;
            };
            writer.write_event(Event::Start(
                BytesStart::new("data").with_attributes([("key", key)]),
            ))?;
            writer.write_event(Event::Text(BytesText::new(&value)))?;
            writer.write_event(Event::End(BytesEnd::new("data")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("node")))?;
    }

    for (i, (source, target)) in graph.edges().enumerate() {
        let id = format!("e{}", i);
        let source = node_id(source);
        let target = node_id(target);
        writer.write_event(Event::Empty(BytesStart::new("edge").with_attributes([
            ("id", id.as_str()),
            ("source", source.as_str()),
            ("target", target.as_str()),
        ])))?;
    }

    writer.write_event(Event::End(BytesEnd::new("graph")))?;
    writer.write_event(Event::End(BytesEnd::new("graphml")))?;
    writer.get_mut().flush()?;
    Ok(())
}

/// Write the graph as a GraphML string
pub fn to_graphml_string(graph: &CitationGraph) -> Result<String> {
    let mut buffer = Vec::new();
    write_graphml(graph, &mut buffer)?;
    String::from_utf8(buffer).map_err(xml_error)
}

fn xml_error(err: impl Display) -> PipelineError {
    PipelineError::Export(format!("GraphML: {}", err))
}

/// Node being read: its GraphML id and collected `<data>` values
#[derive(Default)]
struct PendingNode {
    id: String,
    data: HashMap<String, String>,
}

impl PendingNode {
    fn finish(self) -> Result<NodeAttrs> {
        let rtf_order = match self.data.get("rtf_order") {
            Some(v) => v.parse().map_err(xml_error)?,
            None => self
                .id
                .trim_start_matches('n')
                .parse()
                .map_err(|_| xml_error(format!("node '{}' has no rtf_order", self.id)))?,
        };
        let pub_year = self
            .data
            .get("pub_year")
            .map(|v| v.parse::<i32>())
            .transpose()
            .map_err(xml_error)?;
        let match_confidence = self
            .data
            .get("match_confidence")
            .map(|v| v.parse::<f64>())
            .transpose()
            .map_err(xml_error)?
            .unwrap_or(0.0);

        Ok(NodeAttrs {
            rtf_order,
            pub_year,
            external_id: self.data.get("external_id").cloned(),
            match_confidence,
            doi: self.data.get("doi").cloned(),
            title: self.data.get("title").cloned(),
        })
    }
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    match element.try_get_attribute(name).map_err(xml_error)? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned())),
        None => Ok(None),
    }
}

/// Read a GraphML document written by [`write_graphml`]
pub fn read_graphml(xml: &str) -> Result<CitationGraph> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut graph = CitationGraph::new();
    let mut ids: HashMap<String, RtfOrder> = HashMap::new();
    let mut edges: Vec<(String, String)> = Vec::new();
    let mut node: Option<PendingNode> = None;
    let mut data_key: Option<String> = None;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => match e.name().as_ref() {
                b"node" => {
                    node = Some(PendingNode {
                        id: attribute(&e, "id")?.unwrap_or_default(),
                        data: HashMap::new(),
                    });
                }
                b"data" => data_key = attribute(&e, "key")?,
                b"edge" => edges.push(edge_endpoints(&e)?),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"edge" => edges.push(edge_endpoints(&e)?),
                b"node" => {
                    let pending = PendingNode {
                        id: attribute(&e, "id")?.unwrap_or_default(),
                        data: HashMap::new(),
                    };
                    let id = pending.id.clone();
                    let attrs = pending.finish()?;
                    ids.insert(id, attrs.rtf_order);
                    graph.add_node(attrs);
                }
                _ => {}
            },
            Event::Text(t) => {
                if let (Some(key), Some(pending)) = (data_key.as_ref(), node.as_mut()) {
                    let text = t.unescape().map_err(xml_error)?;
                    pending.data.insert(key.clone(), text.into_owned());
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"data" => data_key = None,
                b"node" => {
                    if let Some(pending) = node.take() {
                        let id = pending.id.clone();
                        let attrs = pending.finish()?;
                        ids.insert(id, attrs.rtf_order);
                        graph.add_node(attrs);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    for (source, target) in edges {
        let (Some(&source), Some(&target)) = (ids.get(&source), ids.get(&target)) else {
            return Err(xml_error(format!("edge {} -> {} references an unknown node", source, target)));
        };
        graph.add_edge(source, target);
    }

    Ok(graph)
}

fn edge_endpoints(element: &BytesStart<'_>) -> Result<(String, String)> {
    let source = attribute(element, "source")?;
    let target = attribute(element, "target")?;
    match (source, target) {
        (Some(s), Some(t)) => Ok((s, t)),
        _ => Err(xml_error("edge without source or target")),
    }
}
