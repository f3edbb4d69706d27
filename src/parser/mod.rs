//! Generic recursive-descent parser for the SCP bracket grammar.
//!
//! `ClassName[key=value, key2=Block[...], key3=[item1, item2]]`, with
//! European decimal commas and `T`/`F` boolean literals. Knows nothing about FX.

pub mod atom;
pub mod node;
pub mod parse;
pub mod render;
pub mod split;

pub use node::{Atom, Fields, ParsedNode};
pub use parse::{parse, parse_with_diagnostics, Diagnostic, DiagnosticKind, ParseOutcome};
