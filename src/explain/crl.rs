//! Overview of every core rate ladder carried by a trace.

use crate::config::AuditConfig;
use crate::construction::ladder::CoreLadder;
use crate::construction::selection::{select_active_rung, ClientNotional};
use crate::parser::ParsedNode;
use serde::Serialize;
use std::fmt;

/// Component legs' ladders (comp1, then comp2) followed by the final one.
///
/// Empty when the trace has no `crl`.
pub fn all_ladders(trace: &ParsedNode) -> Vec<CoreLadder> {
    let Some(crl) = trace.get("crl") else {
        return Vec::new();
    };
    let legs = ["comp1Calc", "comp2Calc"]
        .into_iter()
        .filter_map(|leg| crl.get("XCalc")?.get(leg)?.get("crl"));
    legs.chain(std::iter::once(crl))
        .map(CoreLadder::from_node)
        .collect()
}

/// Ladders with the final one's active rung marked.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LadderOverview {
    pub ladders: Vec<CoreLadder>,
    /// Whether the final ladder's origin is the configured synthetic one.
    pub synthetic: bool,
    pub active_amt: Option<i64>,
}

impl LadderOverview {
    pub fn build(trace: &ParsedNode, config: &AuditConfig) -> Self {
        let ladders = all_ladders(trace);
        let last = ladders.last();
        let synthetic = last
            .and_then(|l| l.origin.as_deref())
            .map(|origin| origin == config.synthetic_origin)
            .unwrap_or(false);
        let active_amt = match (last, ClientNotional::from_trace(trace).amount) {
            (Some(ladder), Some(notional)) => select_active_rung(&ladder.amounts(), notional),
            _ => None,
        };
        Self {
            ladders,
            synthetic,
            active_amt,
        }
    }

    pub fn final_ladder(&self) -> Option<&CoreLadder> {
        self.ladders.last()
    }
}

impl fmt::Display for LadderOverview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let na = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        writeln!(f, "=== CRL Ladders ===")?;
        writeln!(f, "Synthetic:  {}", if self.synthetic { "yes" } else { "no" })?;

        let last = self.ladders.len().saturating_sub(1);
        for (i, ladder) in self.ladders.iter().enumerate() {
            let role = if i == last { "final" } else { "component" };
            writeln!(
                f,
                "\n--- {} [{}] id {} origin {} ---",
                na(&ladder.ccy_pair),
                role,
                na(&ladder.id),
                na(&ladder.origin)
            )?;
            writeln!(f, "  valDt {}  rType {}", na(&ladder.val_dt), na(&ladder.r_type))?;
            for rung in &ladder.rungs {
                let marker = if i == last && self.active_amt == Some(rung.amt) {
                    "  <- active"
                } else {
                    ""
                };
                writeln!(f, "  {:>12}  {} / {}{}", rung.amt, rung.bid, rung.ask, marker)?;
            }
        }
        Ok(())
    }
}
