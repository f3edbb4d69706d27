use crate::parser::{Atom, ParsedNode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The notional the client asked for, as carried by the trace `key` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientNotional {
    pub amount: Option<Decimal>,
    pub side: Option<String>,
}

impl ClientNotional {
    /// Read `key.notional`, which is either the `amount:side` compound or a
    /// bare number. Falls back to the first `clientPrc` entry's
    /// `notionalAmt` when the key carries no amount.
    pub fn from_trace(trace: &ParsedNode) -> Self {
        let mut notional = match trace.path("key.notional") {
            Some(node @ (ParsedNode::Map(_) | ParsedNode::Block { .. })) => Self {
                amount: node.get("amount").and_then(ParsedNode::as_decimal),
                side: node.get("side").and_then(ParsedNode::as_text),
            },
            Some(ParsedNode::Atom(Atom::Amount { amount, side })) => Self {
                amount: Some(*amount),
                side: Some(side.clone()),
            },
            Some(other) => Self {
                amount: other.as_decimal(),
                side: None,
            },
            None => Self::default(),
        };

        if notional.amount.is_none() {
            notional.amount = trace
                .get("clientPrc")
                .and_then(ParsedNode::as_sequence)
                .and_then(|entries| entries.first())
                .and_then(|entry| entry.get("notionalAmt"))
                .and_then(ParsedNode::as_decimal);
        }
        notional
    }
}

/// Pick the rung that prices a client notional.
///
/// Rungs are considered in ascending amount; the first one at or above the
/// notional wins. `None` when the notional is above every rung: no fallback
/// to the largest rung is made.
pub fn select_active_rung(amounts: &[i64], notional: Decimal) -> Option<i64> {
    let mut sorted = amounts.to_vec();
    sorted.sort_unstable();
    sorted.into_iter().find(|amt| Decimal::from(*amt) >= notional)
}
