use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A parsed `digraph`. Nodes keep their first-declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DotGraph {
    pub name: Option<String>,
    pub attrs: HashMap<String, AttributeValue>,
    pub nodes: Vec<NodeDef>,
    pub edges: Vec<EdgeDef>,
    pub subgraphs: Vec<SubgraphDef>,
    pub node_defaults: HashMap<String, AttributeValue>,
    pub edge_defaults: HashMap<String, AttributeValue>,
}

impl DotGraph {
    pub fn node(&self, id: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.subgraphs.iter().all(|sg| sg.nodes.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: String,
    pub attrs: HashMap<String, AttributeValue>,
}

impl NodeDef {
    /// The `label` attribute when it is a string.
    pub fn label(&self) -> Option<&str> {
        match self.attrs.get("label") {
            Some(AttributeValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDef {
    pub from: String,
    pub to: String,
    pub attrs: HashMap<String, AttributeValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubgraphDef {
    pub name: Option<String>,
    pub attrs: HashMap<String, AttributeValue>,
    pub nodes: Vec<NodeDef>,
    pub edges: Vec<EdgeDef>,
    pub node_defaults: HashMap<String, AttributeValue>,
    pub edge_defaults: HashMap<String, AttributeValue>,
}

/// Attribute values. Bare words such as `white` or `box` are kept as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}
