//! Typed views over the ladders carried by a parsed trace.
//!
//! Extraction is forgiving: malformed entries are logged and skipped, never
//! fatal. Only the engine decides what is required.

use crate::parser::{Atom, ParsedNode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Items of a list-valued field. A lone block or map is read as a
/// one-element list.
pub fn list_items(node: Option<&ParsedNode>) -> Vec<&ParsedNode> {
    match node {
        Some(ParsedNode::Sequence(items)) => items.iter().collect(),
        Some(n @ ParsedNode::Block { .. }) | Some(n @ ParsedNode::Map(_)) => vec![n],
        _ => Vec::new(),
    }
}

/// One entry of the core rate ladder (CRL).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreRung {
    pub amt: i64,
    pub bid: Decimal,
    pub ask: Decimal,
    pub bid_cond: Option<String>,
    pub ask_cond: Option<String>,
}

impl CoreRung {
    /// Read a `Rung[amt, bidPrice, askPrice, bidCond, askCond]` entry.
    ///
    /// `None` when the amount or either price is unusable; the rung cannot be
    /// priced without them.
    pub fn from_node(node: &ParsedNode) -> Option<Self> {
        let Some(amt) = node.get("amt").and_then(ParsedNode::as_i64) else {
            log::warn!("skipping CRL rung without a usable amt: {}", node);
            return None;
        };
        let bid = node.get("bidPrice").and_then(ParsedNode::as_decimal);
        let ask = node.get("askPrice").and_then(ParsedNode::as_decimal);
        match (bid, ask) {
            (Some(bid), Some(ask)) => Some(Self {
                amt,
                bid,
                ask,
                bid_cond: node.get("bidCond").and_then(ParsedNode::as_text),
                ask_cond: node.get("askCond").and_then(ParsedNode::as_text),
            }),
            _ => {
                log::warn!("skipping CRL rung {}: bidPrice/askPrice missing or malformed", amt);
                None
            }
        }
    }
}

/// The core rate ladder: quoted directly, or synthesised from two legs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreLadder {
    pub id: Option<String>,
    pub ccy_pair: Option<String>,
    pub origin: Option<String>,
    pub val_dt: Option<String>,
    pub r_type: Option<String>,
    pub rungs: Vec<CoreRung>,
}

impl CoreLadder {
    pub fn from_node(crl: &ParsedNode) -> Self {
        Self {
            id: crl.get("id").and_then(ParsedNode::as_text),
            ccy_pair: crl.get("ccyPair").and_then(ParsedNode::as_text),
            origin: crl.get("origin").and_then(ParsedNode::as_text),
            val_dt: crl.get("valDt").and_then(ParsedNode::as_text),
            r_type: crl.get("rType").and_then(ParsedNode::as_text),
            rungs: list_items(crl.get("rungs"))
                .into_iter()
                .filter_map(CoreRung::from_node)
                .collect(),
        }
    }

    /// 1-based position of the rung with `amt`, in ladder order.
    pub fn position_of(&self, amt: i64) -> Option<usize> {
        self.rungs.iter().position(|r| r.amt == amt).map(|i| i + 1)
    }

    pub fn amounts(&self) -> Vec<i64> {
        self.rungs.iter().map(|r| r.amt).collect()
    }
}

/// Market-adjustment (TOM) deltas for one rung.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketRung {
    pub amt: i64,
    pub bid_spread: Decimal,
    pub ask_spread: Decimal,
    pub min_spread: Decimal,
}

impl MarketRung {
    fn from_node(node: &ParsedNode) -> Option<Self> {
        let Some(amt) = node.get("amt").and_then(ParsedNode::as_i64) else {
            log::warn!("skipping TOM rung without a usable amt: {}", node);
            return None;
        };
        Some(Self {
            amt,
            bid_spread: delta(node, "bidSpread", amt),
            ask_spread: delta(node, "askSpread", amt),
            min_spread: delta(node, "minSpread", amt),
        })
    }
}

/// A missing delta is zero; a malformed one is logged and read as zero.
fn delta(node: &ParsedNode, field: &str, amt: i64) -> Decimal {
    match node.get(field) {
        None => Decimal::ZERO,
        Some(v) if v.is_null() => Decimal::ZERO,
        Some(v) => v.as_decimal().unwrap_or_else(|| {
            log::warn!("TOM rung {}: ignoring malformed {} {}", amt, field, v);
            Decimal::ZERO
        }),
    }
}

/// Market conditions the TOM ladder was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityScenario {
    Normal,
    Active,
    Busy,
    Fast,
}

impl VolatilityScenario {
    /// Unknown codes read as `Normal`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "A" => Self::Active,
            "B" => Self::Busy,
            "F" => Self::Fast,
            _ => Self::Normal,
        }
    }
}

impl fmt::Display for VolatilityScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "Normal",
            Self::Active => "Active",
            Self::Busy => "Busy",
            Self::Fast => "Fast",
        };
        f.write_str(name)
    }
}

/// The TOM ladder keyed by rung amount.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketLadder {
    pub mkt_mode: String,
    pub time: Option<String>,
    pub rungs: Vec<MarketRung>,
}

impl MarketLadder {
    pub fn from_node(tom: Option<&ParsedNode>, default_mode: &str) -> Self {
        let Some(tom) = tom else {
            return Self {
                mkt_mode: default_mode.to_string(),
                time: None,
                rungs: Vec::new(),
            };
        };
        Self {
            mkt_mode: tom
                .get("mktMode")
                .and_then(mode_code)
                .unwrap_or_else(|| default_mode.to_string()),
            time: tom.get("time").and_then(ParsedNode::as_text),
            rungs: list_items(tom.get("rungs"))
                .into_iter()
                .filter_map(MarketRung::from_node)
                .collect(),
        }
    }

    pub fn rung(&self, amt: i64) -> Option<&MarketRung> {
        self.rungs.iter().find(|r| r.amt == amt)
    }

    pub fn scenario(&self) -> VolatilityScenario {
        VolatilityScenario::from_code(&self.mkt_mode)
    }
}

/// Mode letter of a `mktMode` value. `T` and `F` arrive as booleans.
fn mode_code(node: &ParsedNode) -> Option<String> {
    match node {
        ParsedNode::Atom(Atom::Bool(true)) => Some("T".to_string()),
        ParsedNode::Atom(Atom::Bool(false)) => Some("F".to_string()),
        other => other.as_text(),
    }
}

/// How a rung modifier reshapes the spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModifierKind {
    Additive,
    Multiply,
}

impl ModifierKind {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "ADDITIVE" => Some(Self::Additive),
            "MULTIPLY" | "MULTIPLICATIVE" => Some(Self::Multiply),
            _ => None,
        }
    }

    /// Spread after the modifier; `None` on overflow.
    pub fn apply(self, spread: Decimal, value: Decimal) -> Option<Decimal> {
        match self {
            Self::Additive => spread.checked_add(value),
            Self::Multiply => value.checked_mul(spread),
        }
    }
}

impl fmt::Display for ModifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Additive => f.write_str("ADDITIVE"),
            Self::Multiply => f.write_str("MULTIPLY"),
        }
    }
}

/// One commercial rung-modifier entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierEntry {
    pub rung: usize,
    pub kind: ModifierKind,
    pub value: Decimal,
    pub min: Option<Decimal>,
}

impl ModifierEntry {
    fn from_node(node: &ParsedNode) -> Option<Self> {
        let rung = node
            .get("rung")
            .and_then(ParsedNode::as_i64)
            .and_then(|r| usize::try_from(r).ok())?;
        let type_code = node.get("type").and_then(ParsedNode::as_text);
        let Some(kind) = type_code.as_deref().and_then(ModifierKind::from_code) else {
            log::warn!("ignoring rung modifier for rung {} with unknown type {:?}", rung, type_code);
            return None;
        };
        let Some(value) = node.get("value").and_then(ParsedNode::as_decimal) else {
            log::warn!("ignoring rung modifier for rung {} without a numeric value", rung);
            return None;
        };
        let min = node
            .get("min")
            .filter(|m| m.is_truthy())
            .and_then(ParsedNode::as_decimal);
        Some(Self { rung, kind, value, min })
    }
}

/// Commercial rung-modifier configuration (TMU), per market mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierConfig {
    pub package: Option<String>,
    modes: Vec<(String, Vec<ModifierEntry>)>,
}

impl ModifierConfig {
    pub fn from_node(tmu: Option<&ParsedNode>) -> Self {
        let Some(tmu) = tmu else {
            return Self {
                package: None,
                modes: Vec::new(),
            };
        };
        let package = tmu
            .get("package")
            .filter(|p| p.is_truthy())
            .and_then(ParsedNode::as_text);
        let modes = tmu
            .get("rungmodifiers")
            .and_then(ParsedNode::fields)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(mode, entries)| {
                        let entries = list_items(Some(entries))
                            .into_iter()
                            .filter_map(ModifierEntry::from_node)
                            .collect();
                        (mode.to_string(), entries)
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { package, modes }
    }

    /// Entry for a 1-based rung position under `mkt_mode`. Nothing applies
    /// without a commercial package.
    pub fn lookup(&self, mkt_mode: &str, position: usize) -> Option<&ModifierEntry> {
        self.package.as_ref()?;
        self.modes
            .iter()
            .find(|(mode, _)| mode == mkt_mode)
            .and_then(|(_, entries)| entries.iter().find(|e| e.rung == position))
    }
}
