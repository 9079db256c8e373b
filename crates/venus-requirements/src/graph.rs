//! Rule graph and target detection.
//!
//! The rule graph comes from the pipeline engine's planning mode as DOT text.
//! Only node labels matter here: a label that names a schema target means the
//! invocation will build that target, wherever the node sits in the graph.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use venus_dot::DotGraph;

use venus_types::Result;

use crate::schema::SchemaModel;

/// One pipeline stage (rule) in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageNode {
    pub id: String,
    pub label: String,
}

/// `producer -> consumer`: the consumer needs the producer's outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEdge {
    pub producer: String,
    pub consumer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGraph {
    nodes: Vec<StageNode>,
    edges: Vec<StageEdge>,
}

/// The rule name from a node label. `--dag` output appends wildcard lines
/// under the rule name, so only the first line counts.
fn rule_name(label: &str) -> &str {
    label.lines().next().unwrap_or_default().trim()
}

impl RuleGraph {
    /// Parse DOT text. Blank text is an empty graph.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(Self::from_dot(venus_dot::parse(text)?))
    }

    /// Flatten a parsed DOT graph, subgraphs included.
    pub fn from_dot(graph: DotGraph) -> Self {
        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        let mut edges = Vec::new();

        let node_defs = graph
            .nodes
            .iter()
            .chain(graph.subgraphs.iter().flat_map(|sg| sg.nodes.iter()));
        for def in node_defs {
            if !seen.insert(def.id.clone()) {
                continue;
            }
            let label = match def.label().map(rule_name) {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => def.id.clone(),
            };
            nodes.push(StageNode {
                id: def.id.clone(),
                label,
            });
        }

        let edge_defs = graph
            .edges
            .iter()
            .chain(graph.subgraphs.iter().flat_map(|sg| sg.edges.iter()));
        for def in edge_defs {
            edges.push(StageEdge {
                producer: def.from.clone(),
                consumer: def.to.clone(),
            });
        }

        Self { nodes, edges }
    }

    pub fn nodes(&self) -> &[StageNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[StageEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&StageNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Labels of every stage, in declaration order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.label.as_str())
    }

    /// Stages nothing else consumes from.
    pub fn sinks(&self) -> Vec<&StageNode> {
        let producers: HashSet<&str> = self.edges.iter().map(|e| e.producer.as_str()).collect();
        self.nodes
            .iter()
            .filter(|n| !producers.contains(n.id.as_str()))
            .collect()
    }
}

/// Schema targets the graph will build: node labels that are schema target
/// names. Always a subset of the schema's targets.
pub fn detect_targets(graph: &RuleGraph, schema: &SchemaModel) -> BTreeSet<String> {
    let mut targets = BTreeSet::new();
    for label in graph.labels() {
        if schema.is_target(label) {
            targets.insert(label.to_string());
        } else {
            tracing::debug!(label, "rule is not a schema target");
        }
    }
    let sinks: Vec<&str> = graph.sinks().into_iter().map(|n| n.label.as_str()).collect();
    tracing::debug!(
        stages = graph.nodes().len(),
        sinks = ?sinks,
        targets = ?targets,
        "detected targets from rule graph"
    );
    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"
engine_key: assembler
universal: [output_dir]
targets:
  annotation: [reference_genome]
  assembly_qc: [busco_lineage]
"#;

    const RULEGRAPH: &str = r#"digraph snakemake_dag {
    graph[bgcolor=white, margin=0];
    node[shape=box, style=rounded, fontname=sans, fontsize=10, penwidth=2];
    edge[penwidth=2, color=grey];
	0[label = "all", color = "0.00 0.6 0.85", style="rounded"];
	1[label = "annotation", color = "0.33 0.6 0.85", style="rounded"];
	2[label = "assemble", color = "0.50 0.6 0.85", style="rounded"];
	3[label = "qc_report", color = "0.17 0.6 0.85", style="rounded"];
	1 -> 0
	3 -> 0
	2 -> 1
	2 -> 3
}
"#;

    #[test]
    fn labels_resolve_from_attributes() {
        let graph = RuleGraph::parse(RULEGRAPH).unwrap();
        let labels: Vec<_> = graph.labels().collect();
        assert_eq!(labels, vec!["all", "annotation", "assemble", "qc_report"]);
        assert_eq!(graph.edges().len(), 4);
        assert_eq!(
            graph.edges()[0],
            StageEdge {
                producer: "1".into(),
                consumer: "0".into()
            }
        );
        assert_eq!(graph.node("2").unwrap().label, "assemble");
    }

    #[test]
    fn detects_only_schema_targets() {
        let schema = SchemaModel::load(SCHEMA).unwrap();
        let graph = RuleGraph::parse(RULEGRAPH).unwrap();
        let targets = detect_targets(&graph, &schema);
        assert_eq!(targets.into_iter().collect::<Vec<_>>(), vec!["annotation"]);
    }

    #[test]
    fn detected_targets_are_subset_of_schema_targets() {
        let schema = SchemaModel::load(SCHEMA).unwrap();
        let graph = RuleGraph::parse(
            "digraph { 0[label=\"assembly_qc\"]; 1[label=\"annotation\"]; 2[label=\"mystery\"]; 0 -> 1 }",
        )
        .unwrap();
        let known: BTreeSet<&str> = schema.target_names().collect();
        let targets = detect_targets(&graph, &schema);
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|t| known.contains(t.as_str())));
    }

    #[test]
    fn non_sink_targets_still_detected() {
        let schema = SchemaModel::load(SCHEMA).unwrap();
        let graph = RuleGraph::parse("digraph { 0[label=\"all\"]; 1[label=\"annotation\"]; 1 -> 0 }").unwrap();
        let sinks: Vec<_> = graph.sinks().iter().map(|n| n.label.as_str()).collect();
        assert_eq!(sinks, vec!["all"]);
        assert!(detect_targets(&graph, &schema).contains("annotation"));
    }

    #[test]
    fn empty_graph_has_no_targets() {
        let schema = SchemaModel::load(SCHEMA).unwrap();
        for text in ["", "  \n", "digraph snakemake_dag { }"] {
            let graph = RuleGraph::parse(text).unwrap();
            assert!(graph.is_empty());
            assert!(detect_targets(&graph, &schema).is_empty());
        }
    }

    #[test]
    fn missing_label_falls_back_to_id() {
        let graph = RuleGraph::parse("digraph { annotation; 1[color=red]; annotation -> 1 }").unwrap();
        let labels: Vec<_> = graph.labels().collect();
        assert_eq!(labels, vec!["annotation", "1"]);
    }

    #[test]
    fn multiline_label_uses_rule_name() {
        let graph =
            RuleGraph::parse("digraph { 0[label=\"annotation\\nsample: S1\"]; }").unwrap();
        assert_eq!(graph.nodes()[0].label, "annotation");
    }

    #[test]
    fn subgraph_nodes_are_flattened() {
        let graph = RuleGraph::parse(
            "digraph { 0[label=\"all\"]; subgraph cluster_qc { 1[label=\"assembly_qc\"]; 1 -> 0 } }",
        )
        .unwrap();
        assert_eq!(graph.nodes().len(), 2);
        assert_eq!(graph.edges().len(), 1);
        let schema = SchemaModel::load(SCHEMA).unwrap();
        assert!(detect_targets(&graph, &schema).contains("assembly_qc"));
    }

    #[test]
    fn malformed_graph_is_parse_error() {
        let err = RuleGraph::parse("digraph { 0[label=\"all\" }").unwrap_err();
        assert!(matches!(err, venus_types::VenusError::GraphParse { .. }));
    }
}
