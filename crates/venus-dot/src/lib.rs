//! DOT parser for the rule graphs Snakemake prints with `--rulegraph` / `--dag`.
//!
//! Parses `digraph name { ... }` with nodes, edges, subgraphs, and attribute blocks.
//! Produces a typed AST: [`DotGraph`], [`NodeDef`], [`EdgeDef`], [`SubgraphDef`], [`AttributeValue`].
//! Display attributes (colors, shapes, fonts) are parsed and kept but carry no meaning here.
//!
//! # Example
//! ```
//! let dot = r#"digraph snakemake_dag { 0[label = "all"]; 1[label = "assembly"]; 1 -> 0 }"#;
//! let graph = venus_dot::parse(dot).unwrap();
//! assert_eq!(graph.nodes.len(), 2);
//! assert_eq!(graph.nodes[1].label(), Some("assembly"));
//! ```

pub mod ast;
mod parser;

pub use ast::*;
pub use parser::parse;
