use std::collections::HashMap;

use winnow::ascii::{digit1, multispace0};
use winnow::combinator::{alt, opt, preceded, repeat};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::token::{literal, take_while};
use winnow::{ModalResult, Parser};

use venus_types::VenusError;

use crate::ast::*;

type Attrs = HashMap<String, AttributeValue>;

fn make_cut_error(desc: &'static str) -> ErrMode<ContextError<StrContext>> {
    let mut e = ContextError::new();
    e.push(StrContext::Expected(StrContextValue::Description(desc)));
    ErrMode::Cut(e)
}

/// Strip `//` line comments and `/* */` block comments, leaving string literals intact.
/// Newlines inside block comments are kept so line numbers survive.
pub(crate) fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'/') => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    if next == '\n' {
                        out.push('\n');
                    }
                    prev = next;
                }
            }
            '"' => {
                out.push('"');
                while let Some(next) = chars.next() {
                    out.push(next);
                    if next == '\\' {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    } else if next == '"' {
                        break;
                    }
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Drop diagnostic lines printed ahead of the graph. Returns the number of
/// skipped lines and the remainder starting at the graph keyword.
fn skip_preamble(input: &str) -> (usize, &str) {
    let mut offset = 0;
    for (index, line) in input.split_inclusive('\n').enumerate() {
        let trimmed = line.trim_start();
        if ["digraph", "strict", "graph"]
            .iter()
            .any(|kw| trimmed.starts_with(kw))
        {
            return (index, &input[offset..]);
        }
        offset += line.len();
    }
    (0, input)
}

/// Whitespace consumer (including newlines).
fn ws<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    multispace0.parse_next(input)
}

/// Parse an identifier: [A-Za-z_][A-Za-z0-9_]*
fn identifier<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1, |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

/// Parse a DOT numeral: '-'? digits ('.' digits)?
fn numeral<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (opt('-'), digit1, opt(('.', digit1)))
        .take()
        .parse_next(input)
}

/// Parse a qualified id: identifier ( '.' identifier )+  or plain identifier.
fn qualified_or_plain_id(input: &mut &str) -> ModalResult<String> {
    let first = identifier.parse_next(input)?;
    let rest: Vec<&str> = repeat(0.., preceded('.', identifier)).parse_next(input)?;
    let mut s = first.to_string();
    for part in rest {
        s.push('.');
        s.push_str(part);
    }
    Ok(s)
}

/// Parse a double-quoted string with escape support.
fn quoted_string(input: &mut &str) -> ModalResult<String> {
    let _ = '"'.parse_next(input)?;
    let mut s = String::new();
    loop {
        let c = winnow::token::any.parse_next(input)?;
        match c {
            '"' => break,
            '\\' => {
                let esc = winnow::token::any.parse_next(input)?;
                match esc {
                    'n' | 'l' | 'r' => s.push('\n'),
                    't' => s.push('\t'),
                    '\\' => s.push('\\'),
                    '"' => s.push('"'),
                    '\n' => {}
                    other => {
                        s.push('\\');
                        s.push(other);
                    }
                }
            }
            other => s.push(other),
        }
    }
    Ok(s)
}

/// Node ids in rule graphs are numerals (`0`, `1`, ...); plain DOT allows
/// identifiers and quoted strings as well.
fn node_id(input: &mut &str) -> ModalResult<String> {
    alt((
        quoted_string,
        identifier.map(String::from),
        numeral.map(String::from),
    ))
    .parse_next(input)
}

/// Parse a float: optional sign, digits, '.', digits.
fn float_value(input: &mut &str) -> ModalResult<f64> {
    let s: &str = (opt(alt(('-', '+'))), digit1, '.', digit1)
        .take()
        .parse_next(input)?;
    s.parse()
        .map_err(|_| ErrMode::Backtrack(ContextError::new()))
}

/// Parse an integer: optional sign + digits.
fn integer_value(input: &mut &str) -> ModalResult<i64> {
    let s: &str = (opt(alt(('-', '+'))), digit1)
        .take()
        .parse_next(input)?;
    s.parse()
        .map_err(|_| ErrMode::Backtrack(ContextError::new()))
}

/// Parse an unquoted word value (`white`, `box`, `true`).
fn bare_word(input: &mut &str) -> ModalResult<AttributeValue> {
    let word = identifier.parse_next(input)?;
    Ok(match word {
        "true" => AttributeValue::Boolean(true),
        "false" => AttributeValue::Boolean(false),
        other => AttributeValue::String(other.to_string()),
    })
}

/// Parse an attribute value.
fn attr_value(input: &mut &str) -> ModalResult<AttributeValue> {
    alt((
        quoted_string.map(AttributeValue::String),
        float_value.map(AttributeValue::Float),
        integer_value.map(AttributeValue::Integer),
        bare_word,
    ))
    .parse_next(input)
}

/// Parse a single attribute: key '=' value.
fn attr(input: &mut &str) -> ModalResult<(String, AttributeValue)> {
    let key = qualified_or_plain_id.parse_next(input)?;
    let _ = ws.parse_next(input)?;
    let _ = '='.parse_next(input)?;
    let _ = ws.parse_next(input)?;
    let value = attr_value
        .context(StrContext::Expected(StrContextValue::Description(
            "attribute value",
        )))
        .parse_next(input)?;
    Ok((key, value))
}

/// Parse an attribute block: '[' attr ( (','|';')? attr )* ']'
fn attr_block(input: &mut &str) -> ModalResult<Attrs> {
    let _ = '['.parse_next(input)?;
    let _ = ws.parse_next(input)?;

    let mut attrs = HashMap::new();
    if let Some((key, value)) = opt(attr).parse_next(input)? {
        attrs.insert(key, value);
        loop {
            let _ = ws.parse_next(input)?;
            let _ = opt(alt((',', ';'))).parse_next(input)?;
            let _ = ws.parse_next(input)?;
            match opt(attr).parse_next(input)? {
                Some((key, value)) => {
                    attrs.insert(key, value);
                }
                None => break,
            }
        }
    }

    let _ = ws.parse_next(input)?;
    let _ = ']'
        .context(StrContext::Expected(StrContextValue::CharLiteral(']')))
        .parse_next(input)?;
    Ok(attrs)
}

/// A parsed statement, before statements are merged into a graph.
enum Statement {
    GraphAttrs(Attrs),
    NodeDefaults(Attrs),
    EdgeDefaults(Attrs),
    Node(String, Attrs),
    Edge(Vec<String>, Attrs),
    Subgraph(Option<String>, Vec<Statement>),
    GraphAttrDecl(String, AttributeValue),
}

/// Parse `<keyword> '[' ... ']' ';'?` for the graph/node/edge default statements.
fn defaults_stmt<'i>(
    keyword: &'static str,
    wrap: fn(Attrs) -> Statement,
) -> impl Parser<&'i str, Statement, ErrMode<ContextError>> {
    move |input: &mut &'i str| {
        let _ = literal(keyword).parse_next(input)?;
        let _ = ws.parse_next(input)?;
        let attrs = attr_block.parse_next(input)?;
        let _ = ws.parse_next(input)?;
        let _ = opt(';').parse_next(input)?;
        Ok(wrap(attrs))
    }
}

/// Parse 'subgraph' id? '{' statement* '}'
fn subgraph_stmt(input: &mut &str) -> ModalResult<Statement> {
    let _ = literal("subgraph").parse_next(input)?;
    let _ = ws.parse_next(input)?;
    let name = opt(node_id).parse_next(input)?;
    let _ = ws.parse_next(input)?;
    let _ = '{'.parse_next(input)?;
    let stmts = statements.parse_next(input)?;
    let _ = ws.parse_next(input)?;
    let _ = '}'.parse_next(input)?;
    let _ = ws.parse_next(input)?;
    let _ = opt(';').parse_next(input)?;
    Ok(Statement::Subgraph(name, stmts))
}

/// Parse a node or edge statement. An edge is a node id followed by '->'.
fn node_or_edge_stmt(input: &mut &str) -> ModalResult<Statement> {
    let first = node_id.parse_next(input)?;
    let _ = ws.parse_next(input)?;

    if opt(literal("->")).parse_next(input)?.is_some() {
        let mut chain = vec![first];
        loop {
            let _ = ws.parse_next(input)?;
            let next = node_id
                .context(StrContext::Expected(StrContextValue::Description(
                    "edge target node id",
                )))
                .parse_next(input)
                .map_err(|e| e.cut())?;
            chain.push(next);
            let _ = ws.parse_next(input)?;
            if opt(literal("->")).parse_next(input)?.is_none() {
                break;
            }
        }

        let attrs = opt(attr_block).parse_next(input)?.unwrap_or_default();
        let _ = ws.parse_next(input)?;
        let _ = opt(';').parse_next(input)?;
        return Ok(Statement::Edge(chain, attrs));
    }

    if opt(literal("--")).parse_next(input)?.is_some() {
        return Err(make_cut_error(
            "only directed edges (->); undirected edges (--) are not supported",
        ));
    }

    if let Some(attrs) = opt(attr_block).parse_next(input)? {
        let _ = ws.parse_next(input)?;
        let _ = opt(';').parse_next(input)?;
        return Ok(Statement::Node(first, attrs));
    }

    // `key = value` at statement level is a graph attribute.
    if opt('=').parse_next(input)?.is_some() {
        let _ = ws.parse_next(input)?;
        let val = attr_value.parse_next(input).map_err(|e| e.cut())?;
        let _ = ws.parse_next(input)?;
        let _ = opt(';').parse_next(input)?;
        return Ok(Statement::GraphAttrDecl(first, val));
    }

    let _ = opt(';').parse_next(input)?;
    Ok(Statement::Node(first, HashMap::new()))
}

/// Parse a single statement.
fn statement(input: &mut &str) -> ModalResult<Statement> {
    let _ = ws.parse_next(input)?;
    alt((
        defaults_stmt("graph", Statement::GraphAttrs),
        defaults_stmt("node", Statement::NodeDefaults),
        defaults_stmt("edge", Statement::EdgeDefaults),
        subgraph_stmt,
        node_or_edge_stmt,
    ))
    .parse_next(input)
}

/// Parse zero or more statements.
fn statements(input: &mut &str) -> ModalResult<Vec<Statement>> {
    let mut stmts = Vec::new();
    loop {
        let _ = ws.parse_next(input)?;
        if input.is_empty() || input.starts_with('}') {
            break;
        }
        let stmt = statement
            .context(StrContext::Expected(StrContextValue::Description(
                "node, edge or attribute statement",
            )))
            .parse_next(input)
            .map_err(|e| e.cut())?;
        stmts.push(stmt);
    }
    Ok(stmts)
}

/// Nodes collected in declaration order, with an index for redeclarations.
#[derive(Default)]
struct NodeList {
    nodes: Vec<NodeDef>,
    index: HashMap<String, usize>,
}

impl NodeList {
    fn declare(&mut self, id: &str, attrs: Attrs, defaults: &Attrs) {
        match self.index.get(id) {
            Some(&i) => self.nodes[i].attrs.extend(attrs),
            None => {
                let mut merged = defaults.clone();
                merged.extend(attrs);
                self.index.insert(id.to_string(), self.nodes.len());
                self.nodes.push(NodeDef {
                    id: id.to_string(),
                    attrs: merged,
                });
            }
        }
    }

    fn ensure(&mut self, id: &str, defaults: &Attrs) {
        if !self.index.contains_key(id) {
            self.declare(id, HashMap::new(), defaults);
        }
    }
}

struct Merged {
    attrs: Attrs,
    nodes: Vec<NodeDef>,
    edges: Vec<EdgeDef>,
    subgraphs: Vec<SubgraphDef>,
    node_defaults: Attrs,
    edge_defaults: Attrs,
}

/// Merge statements into graph parts, applying node and edge defaults.
fn merge_statements(
    stmts: Vec<Statement>,
    parent_node_defaults: &Attrs,
    parent_edge_defaults: &Attrs,
) -> Merged {
    let mut attrs = HashMap::new();
    let mut nodes = NodeList::default();
    let mut edges = Vec::new();
    let mut subgraphs = Vec::new();
    let mut node_defaults = parent_node_defaults.clone();
    let mut edge_defaults = parent_edge_defaults.clone();

    for stmt in stmts {
        match stmt {
            Statement::GraphAttrs(a) => attrs.extend(a),
            Statement::NodeDefaults(a) => node_defaults.extend(a),
            Statement::EdgeDefaults(a) => edge_defaults.extend(a),
            Statement::Node(id, a) => nodes.declare(&id, a, &node_defaults),
            Statement::Edge(chain, a) => {
                for id in &chain {
                    nodes.ensure(id, &node_defaults);
                }
                // A -> B -> C expands to (A,B), (B,C)
                for pair in chain.windows(2) {
                    let mut merged = edge_defaults.clone();
                    merged.extend(a.clone());
                    edges.push(EdgeDef {
                        from: pair[0].clone(),
                        to: pair[1].clone(),
                        attrs: merged,
                    });
                }
            }
            Statement::Subgraph(name, inner) => {
                let sg = merge_statements(inner, &node_defaults, &edge_defaults);
                subgraphs.push(SubgraphDef {
                    name,
                    attrs: sg.attrs,
                    nodes: sg.nodes,
                    edges: sg.edges,
                    node_defaults: sg.node_defaults,
                    edge_defaults: sg.edge_defaults,
                });
                // nested subgraphs are flattened into the parent's list
                subgraphs.extend(sg.subgraphs);
            }
            Statement::GraphAttrDecl(key, val) => {
                attrs.insert(key, val);
            }
        }
    }

    Merged {
        attrs,
        nodes: nodes.nodes,
        edges,
        subgraphs,
        node_defaults,
        edge_defaults,
    }
}

/// Top-level parser: 'digraph' id? '{' statements '}'.
fn parse_digraph(input: &mut &str) -> ModalResult<DotGraph> {
    let _ = ws.parse_next(input)?;

    if input.starts_with("strict") {
        return Err(make_cut_error(
            "'digraph' keyword (strict graphs are not supported)",
        ));
    }

    if let Some(after) = input.strip_prefix("graph") {
        let trimmed = after.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(make_cut_error(
                "'digraph' keyword (undirected graphs are not supported)",
            ));
        }
    }

    let _ = literal("digraph")
        .context(StrContext::Expected(StrContextValue::StringLiteral(
            "digraph",
        )))
        .parse_next(input)?;
    let _ = ws.parse_next(input)?;
    let name = opt(node_id).parse_next(input)?;
    let _ = ws.parse_next(input)?;
    let _ = '{'
        .context(StrContext::Expected(StrContextValue::CharLiteral('{')))
        .parse_next(input)?;
    let stmts = statements.parse_next(input)?;
    let _ = ws.parse_next(input)?;
    let _ = '}'
        .context(StrContext::Expected(StrContextValue::CharLiteral('}')))
        .parse_next(input)?;
    let _ = ws.parse_next(input)?;

    let empty = HashMap::new();
    let merged = merge_statements(stmts, &empty, &empty);

    Ok(DotGraph {
        name,
        attrs: merged.attrs,
        nodes: merged.nodes,
        edges: merged.edges,
        subgraphs: merged.subgraphs,
        node_defaults: merged.node_defaults,
        edge_defaults: merged.edge_defaults,
    })
}

/// Compute (line, col) of the parse position within `text`.
fn offset_to_line_col(text: &str, remaining_len: usize) -> (usize, usize) {
    let consumed = text.len().saturating_sub(remaining_len);
    let prefix = &text[..consumed];
    let line = prefix.matches('\n').count() + 1;
    let col = match prefix.rfind('\n') {
        Some(pos) => prefix[pos + 1..].chars().count() + 1,
        None => prefix.chars().count() + 1,
    };
    (line, col)
}

/// Parse rule-graph text into a [`DotGraph`].
///
/// Blank input yields an empty graph: a planning run that selects no jobs is
/// not an error.
pub fn parse(input: &str) -> venus_types::Result<DotGraph> {
    let (skipped, body) = skip_preamble(input);
    if skipped > 0 {
        tracing::debug!(lines = skipped, "skipping text ahead of the rule graph");
    }

    let stripped = strip_comments(body);
    if stripped.trim().is_empty() {
        return Ok(DotGraph::default());
    }

    let mut remaining = stripped.as_str();
    match parse_digraph.parse_next(&mut remaining) {
        Ok(graph) => {
            if !remaining.is_empty() {
                tracing::debug!(
                    bytes = remaining.len(),
                    "ignoring text after the rule graph"
                );
            }
            Ok(graph)
        }
        Err(e) => {
            let (line, col) = offset_to_line_col(&stripped, remaining.len());
            let snippet: String = remaining.chars().take(40).collect();
            Err(VenusError::GraphParse {
                line: line + skipped,
                col,
                message: e.to_string(),
                source_snippet: (!snippet.is_empty()).then_some(snippet),
            })
        }
    }
}
