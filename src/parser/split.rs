//! Level-0 splitting, decimal-comma normalization and container
//! classification for the bracket grammar.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// `digits,digits` not already part of a dotted or longer literal.
static DECIMAL_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^\d.])(\d+),(\d+)").unwrap());

/// Start of a tagged block: `Identifier[` with optional spacing.
static BLOCK_START_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\w+\s*\[").unwrap());

/// Rewrite European decimal commas to points: `0,80173` → `0.80173`.
///
/// Idempotent: a digit run that follows a `.` is never the integer part of a
/// decimal comma, so normalizing twice is the same as normalizing once.
pub fn normalize_numbers(text: &str) -> Cow<'_, str> {
    DECIMAL_COMMA_RE.replace_all(text, "${1}${2}.${3}")
}

/// Field keys may carry hard-wraps from the log they were copied from.
pub fn normalize_key(key: &str) -> String {
    key.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Does `text` open with `Identifier[`?
pub fn looks_like_block(text: &str) -> bool {
    BLOCK_START_RE.is_match(text.trim_start())
}

/// Result of a level-0 split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split<'a> {
    pub parts: Vec<&'a str>,
    /// False when closing brackets outnumbered opening ones at some point, or
    /// nesting was still open at the end.
    pub balanced: bool,
}

/// Split on `sep` only where `[`/`{` nesting depth is zero.
///
/// Parts are trimmed. Empty parts between separators are kept; a trailing
/// empty part is not.
pub fn split_top_level(text: &str, sep: char) -> Split<'_> {
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut balanced = true;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth -= 1;
                if depth < 0 {
                    balanced = false;
                }
            }
            _ => {}
        }
        if c == sep && depth == 0 {
            parts.push(text[start..i].trim());
            start = i + c.len_utf8();
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        parts.push(tail);
    }

    Split {
        parts,
        balanced: balanced && depth == 0,
    }
}

/// How a `[...]` container is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// At least one element is a tagged block.
    BlockList,
    /// Every element is `key=value`.
    KeyValueMap,
    /// Anything else.
    PlainList,
}

pub fn has_block(items: &[&str]) -> bool {
    items.iter().any(|item| looks_like_block(item))
}

pub fn is_key_value_only(items: &[&str]) -> bool {
    !items.is_empty()
        && items
            .iter()
            .all(|item| item.contains('=') && !looks_like_block(item))
}

pub fn is_plain(items: &[&str]) -> bool {
    !has_block(items) && !is_key_value_only(items)
}

/// Classify the level-0 elements of a bracketed container.
pub fn classify(items: &[&str]) -> ContainerKind {
    if has_block(items) {
        ContainerKind::BlockList
    } else if is_key_value_only(items) {
        ContainerKind::KeyValueMap
    } else {
        ContainerKind::PlainList
    }
}
