use crate::construction::ladder::{ModifierKind, VolatilityScenario};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A two-way price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub bid: Decimal,
    pub ask: Decimal,
}

impl Price {
    pub fn new(bid: Decimal, ask: Decimal) -> Self {
        Self { bid, ask }
    }

    /// `None` when the sum leaves the decimal range.
    pub fn mid(&self) -> Option<Decimal> {
        self.bid.checked_add(self.ask)?.checked_div(Decimal::TWO)
    }

    pub fn spread(&self) -> Option<Decimal> {
        self.ask.checked_sub(self.bid)
    }

    /// Price of width `spread` centred on `mid`.
    pub fn centred(mid: Decimal, spread: Decimal) -> Option<Self> {
        let half = spread.checked_div(Decimal::TWO)?;
        Some(Self {
            bid: mid.checked_sub(half)?,
            ask: mid.checked_add(half)?,
        })
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.bid, self.ask)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidSpread {
    pub mid: Decimal,
    pub spread: Decimal,
}

impl MidSpread {
    pub fn of(price: &Price) -> Option<Self> {
        Some(Self {
            mid: price.mid()?,
            spread: price.spread()?,
        })
    }
}

/// TOM deltas that were added to the core price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAdjustment {
    pub bid_spread: Decimal,
    pub ask_spread: Decimal,
    pub min_spread: Decimal,
    pub source: String,
}

/// Rung modifier matched for this rung's ladder position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedModifier {
    /// `<package>_FA (Rung <n> <TYPE> <value>)`
    pub label: String,
    #[serde(rename = "type")]
    pub kind: ModifierKind,
    pub value: Decimal,
    pub min: Option<Decimal>,
}

/// Skew metadata carried by the active rung.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkewInfo {
    pub package: Option<String>,
    pub b_pos: Option<String>,
    pub a_auto_skew: Option<String>,
    /// Whether the trader-adjusted price replaced the constructed one.
    pub applied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeAdjustment {
    pub package: Option<String>,
    pub applied: bool,
}

/// One reconstructed notional tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rung {
    pub amt: i64,
    pub core: Price,
    pub adjustment: Option<MarketAdjustment>,
    pub price_adjustment: Price,
    pub mid_spread: MidSpread,
    pub volatility_scenario: VolatilityScenario,
    pub rung_modifier: Option<AppliedModifier>,
    pub price_after_rung_modifier: Price,
    pub min_spread: Decimal,
    pub price_after_min_spread: Price,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub skew: Option<SkewInfo>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub volume_adjustment: Option<VolumeAdjustment>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub price_after_skew: Option<Price>,
}

impl Rung {
    /// The price the client saw: post-skew on the active rung, post-min-spread
    /// elsewhere.
    pub fn final_price(&self) -> Price {
        self.price_after_skew.unwrap_or(self.price_after_min_spread)
    }

    pub fn skew_applied(&self) -> bool {
        self.skew.as_ref().map(|s| s.applied).unwrap_or(false)
    }
}
