use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use thiserror::Error;

use super::atom::parse_atom;
use super::node::{Fields, ParsedNode};
use super::split::{classify, looks_like_block, normalize_key, normalize_numbers, split_top_level, ContainerKind};

/// The whole-text `Identifier[...]` envelope; `.` matches newlines.
static ENVELOPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(\w+)\s*\[(.*)\]$").unwrap());

/// Kind of structural anomaly the parser degraded around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// Text that should have been a block did not match `Identifier[...]`.
    NotABlock,
    /// Bracket nesting did not balance inside a split region.
    UnbalancedBrackets,
    /// A block or map element had no `=` and was dropped.
    MissingAssignment,
}

/// A degraded parse path. Never surfaced as a hard failure by [`parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind:?} at {path}: {message}")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Dotted field path from the root, `$` for the root itself.
    pub path: String,
    pub message: String,
}

/// Parsed tree plus every degradation that happened on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub node: ParsedNode,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutcome {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Parse an SCP trace into a [`ParsedNode`].
///
/// Total over its input: text that is not an `Identifier[...]` envelope is
/// returned unchanged as a string atom.
pub fn parse(text: &str) -> ParsedNode {
    parse_with_diagnostics(text).node
}

/// Like [`parse`], also reporting where the input was malformed.
pub fn parse_with_diagnostics(text: &str) -> ParseOutcome {
    let mut parser = TraceParser::default();
    let normalized = normalize_numbers(text.trim());
    let node = match parser.block(&normalized, "$") {
        Ok(node) => node,
        Err(diagnostic) => {
            parser.diagnostics.push(diagnostic);
            ParsedNode::str(text)
        }
    };
    ParseOutcome {
        node,
        diagnostics: parser.diagnostics,
    }
}

#[derive(Default)]
struct TraceParser {
    diagnostics: Vec<Diagnostic>,
}

impl TraceParser {
    fn report(&mut self, kind: DiagnosticKind, path: &str, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            kind,
            path: path.to_string(),
            message: message.into(),
        };
        log::warn!("degraded trace parse: {}", diagnostic);
        self.diagnostics.push(diagnostic);
    }

    fn block(&mut self, text: &str, path: &str) -> Result<ParsedNode, Diagnostic> {
        let caps = ENVELOPE_RE.captures(text).ok_or_else(|| Diagnostic {
            kind: DiagnosticKind::NotABlock,
            path: path.to_string(),
            message: format!("expected Identifier[...], found {:?}", preview(text)),
        })?;
        let tag = caps[1].to_string();
        let fields = self.assignments(&caps[2], path);
        Ok(ParsedNode::Block { tag, fields })
    }

    /// Level-0 `key=value` list shared by block bodies and maps.
    fn assignments(&mut self, body: &str, path: &str) -> Fields {
        let split = split_top_level(body, ',');
        if !split.balanced {
            self.report(DiagnosticKind::UnbalancedBrackets, path, "unbalanced brackets in field list");
        }

        let mut fields = Fields::new();
        for part in split.parts {
            match part.split_once('=') {
                Some((key, value)) => {
                    let key = normalize_key(key);
                    let child = format!("{path}.{key}");
                    let value = self.value(value, &child);
                    fields.insert(key, value);
                }
                None if part.is_empty() => {}
                None => self.report(
                    DiagnosticKind::MissingAssignment,
                    path,
                    format!("dropped element without '=': {:?}", preview(part)),
                ),
            }
        }
        fields
    }

    fn value(&mut self, raw: &str, path: &str) -> ParsedNode {
        let normalized = normalize_numbers(raw.trim());
        let val = normalized.as_ref();

        if val.len() >= 2 && val.starts_with('{') && val.ends_with('}') {
            return ParsedNode::Map(self.assignments(&val[1..val.len() - 1], path));
        }

        if val.len() >= 2 && val.starts_with('[') && val.ends_with(']') {
            return self.container(&val[1..val.len() - 1], path);
        }

        if looks_like_block(val) {
            return match self.block(val, path) {
                Ok(node) => node,
                Err(diagnostic) => {
                    log::warn!("degraded trace parse: {}", diagnostic);
                    self.diagnostics.push(diagnostic);
                    ParsedNode::str(val)
                }
            };
        }

        parse_atom(val).into()
    }

    fn container(&mut self, inner: &str, path: &str) -> ParsedNode {
        let split = split_top_level(inner, ',');
        if !split.balanced {
            self.report(DiagnosticKind::UnbalancedBrackets, path, "unbalanced brackets in list");
        }

        match classify(&split.parts) {
            ContainerKind::KeyValueMap => ParsedNode::Map(self.assignments(inner, path)),
            ContainerKind::BlockList | ContainerKind::PlainList => ParsedNode::Sequence(
                split
                    .parts
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.value(item, &format!("{path}[{i}]")))
                    .collect(),
            ),
        }
    }
}

fn preview(text: &str) -> String {
    const MAX: usize = 48;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
