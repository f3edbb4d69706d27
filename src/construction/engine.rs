use crate::config::AuditConfig;
use crate::construction::ladder::{CoreLadder, CoreRung, MarketLadder, ModifierConfig};
use crate::construction::rung::{
    AppliedModifier, MarketAdjustment, MidSpread, Price, Rung, SkewInfo, VolumeAdjustment,
};
use crate::construction::selection::{select_active_rung, ClientNotional};
use crate::parser::ParsedNode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a parsed trace cannot be reconstructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTraceError {
    #[error("trace root is not a tagged block")]
    NotABlock,
    #[error("trace {}: root tag is {found:?}, expected {expected:?}", .trace_id.as_deref().unwrap_or("<no id>"))]
    UnexpectedTag {
        trace_id: Option<String>,
        found: String,
        expected: String,
    },
    #[error("trace {}: missing `key` context block", .trace_id.as_deref().unwrap_or("<no id>"))]
    MissingContext { trace_id: Option<String> },
    #[error("trace {}: missing core rate ladder (`crl.rungs`)", .trace_id.as_deref().unwrap_or("<no id>"))]
    MissingLadder { trace_id: Option<String> },
}

impl InvalidTraceError {
    pub fn trace_id(&self) -> Option<&str> {
        match self {
            Self::NotABlock => None,
            Self::UnexpectedTag { trace_id, .. }
            | Self::MissingContext { trace_id }
            | Self::MissingLadder { trace_id } => trace_id.as_deref(),
        }
    }
}

/// Pricing context copied from the trace `key` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingContext {
    pub ccy_pair: Option<String>,
    pub venue: Option<String>,
    pub group: Option<String>,
    pub sm_type: Option<String>,
    pub prc_model: Option<String>,
    pub price_competition: Option<String>,
}

/// Counterparty identifiers from the trace `key` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIds {
    pub venue_client_id: Option<String>,
    pub venue_account_id: Option<String>,
    pub venue_user_id: Option<String>,
}

/// Rung-by-rung reconstruction of one trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotDocument {
    pub context: PricingContext,
    pub client: ClientIds,
    pub notional: ClientNotional,
    pub rungs: Vec<Rung>,
}

impl SpotDocument {
    /// The rung that priced the client notional, if any.
    pub fn active_rung(&self) -> Option<&Rung> {
        self.rungs.iter().find(|r| r.active)
    }

    pub fn rung(&self, amt: i64) -> Option<&Rung> {
        self.rungs.iter().find(|r| r.amt == amt)
    }
}

/// Skew inputs carried by the client price calculation (`SCalc`).
struct SkewSource {
    auto_skew: Option<ParsedNode>,
    trader_price: Option<Price>,
}

impl SkewSource {
    /// Prefer the `PPM` calculation; otherwise the one whose `crlAmt` matches
    /// the active rung.
    fn from_trace(trace: &ParsedNode, active_amt: Option<i64>) -> Option<Self> {
        let entries = trace.get("clientPrc").and_then(ParsedNode::as_sequence)?;
        let calcs: Vec<&ParsedNode> = entries.iter().filter_map(|e| e.get("SCalc")).collect();
        let scalc = calcs
            .iter()
            .find(|c| c.tag() == Some("PPM"))
            .or_else(|| {
                calcs.iter().find(|c| {
                    active_amt.is_some()
                        && c.get("crlAmt").and_then(ParsedNode::as_i64) == active_amt
                })
            })?;

        let bid = scalc.get("uBidTrSpot").and_then(ParsedNode::as_decimal);
        let ask = scalc.get("uAskTrSpot").and_then(ParsedNode::as_decimal);
        Some(Self {
            auto_skew: scalc.get("aAutoSkew").cloned(),
            trader_price: bid.zip(ask).map(|(bid, ask)| Price::new(bid, ask)),
        })
    }

    /// Trader-adjusted price when auto-skew is on, otherwise `price`.
    fn apply(&self, price: Price, amt: i64) -> (Price, bool) {
        let enabled = self.auto_skew.as_ref().map(|a| a.is_truthy()).unwrap_or(false);
        if !enabled {
            return (price, false);
        }
        match self.trader_price {
            Some(trader) => (trader, true),
            None => {
                log::warn!("rung {}: auto-skew set but uBidTrSpot/uAskTrSpot missing, keeping constructed price", amt);
                (price, false)
            }
        }
    }
}

/// Replays core → TOM → rung modifier → min spread → skew for every rung of
/// a parsed trace.
///
/// Pure and deterministic: the same trace always yields an identical
/// [`SpotDocument`].
#[derive(Debug, Clone)]
pub struct SpotConstructor {
    expected_tag: Option<String>,
    default_market_mode: String,
}

impl Default for SpotConstructor {
    fn default() -> Self {
        Self::new(&AuditConfig::default())
    }
}

impl SpotConstructor {
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            expected_tag: config.expected_tag.clone(),
            default_market_mode: config.default_market_mode.clone(),
        }
    }

    pub fn construct(&self, trace: &ParsedNode) -> Result<SpotDocument, InvalidTraceError> {
        let trace_id = trace.get("id").and_then(ParsedNode::as_text);
        let tag = trace.tag().ok_or(InvalidTraceError::NotABlock)?;
        if let Some(expected) = &self.expected_tag {
            if tag != expected {
                return Err(InvalidTraceError::UnexpectedTag {
                    trace_id,
                    found: tag.to_string(),
                    expected: expected.clone(),
                });
            }
        }

        let key = trace
            .get("key")
            .filter(|k| k.fields().is_some())
            .ok_or_else(|| InvalidTraceError::MissingContext {
                trace_id: trace_id.clone(),
            })?;
        let crl = trace
            .get("crl")
            .filter(|c| c.get("rungs").is_some())
            .ok_or_else(|| InvalidTraceError::MissingLadder {
                trace_id: trace_id.clone(),
            })?;

        let core = CoreLadder::from_node(crl);
        let market = MarketLadder::from_node(trace.get("tom"), &self.default_market_mode);
        let modifiers = ModifierConfig::from_node(trace.get("tmu"));
        let notional = ClientNotional::from_trace(trace);

        let active_amt = notional
            .amount
            .and_then(|n| select_active_rung(&core.amounts(), n));
        match active_amt {
            Some(amt) => log::debug!("active rung {} for notional {:?}", amt, notional.amount),
            None => log::debug!("no active rung for notional {:?}", notional.amount),
        }

        // A repeated amount activates only its first ladder entry.
        let active_position = active_amt.and_then(|amt| core.position_of(amt));

        let pass = RungPass {
            market: &market,
            modifiers: &modifiers,
            skew: SkewSource::from_trace(trace, active_amt),
            skew_meta: trace.get("skew"),
        };
        let rungs = core
            .rungs
            .iter()
            .enumerate()
            .filter_map(|(i, rung)| {
                let position = i + 1;
                let priced = pass.price(position, rung, active_position == Some(position));
                if priced.is_none() {
                    log::warn!("omitting rung {}: price arithmetic out of decimal range", rung.amt);
                }
                priced
            })
            .collect();

        Ok(SpotDocument {
            context: PricingContext {
                ccy_pair: text(key, "ccyPair"),
                venue: text(key, "venue"),
                group: text(key, "group"),
                sm_type: text(key, "smType"),
                prc_model: text(key, "prcModel"),
                price_competition: text(key, "priceCompetition"),
            },
            client: ClientIds {
                venue_client_id: text(key, "venueClientId"),
                venue_account_id: text(key, "venueAccountId"),
                venue_user_id: text(key, "venueUserId"),
            },
            notional,
            rungs,
        })
    }
}

/// Reconstruct with the default configuration.
pub fn construct(trace: &ParsedNode) -> Result<SpotDocument, InvalidTraceError> {
    SpotConstructor::default().construct(trace)
}

fn text(node: &ParsedNode, field: &str) -> Option<String> {
    node.get(field).and_then(ParsedNode::as_text)
}

/// Widen to `min_spread` around the current mid when the price is tighter.
/// `None` when the price is outside the decimal range.
pub fn enforce_min_spread(price: Price, min_spread: Decimal) -> Option<Price> {
    if price.spread()? >= min_spread {
        Some(price)
    } else {
        Price::centred(price.mid()?, min_spread)
    }
}

/// Per-trace inputs shared by every rung.
struct RungPass<'a> {
    market: &'a MarketLadder,
    modifiers: &'a ModifierConfig,
    skew: Option<SkewSource>,
    skew_meta: Option<&'a ParsedNode>,
}

impl RungPass<'_> {
    /// `None` when any step overflows the decimal range.
    fn price(&self, position: usize, core: &CoreRung, active: bool) -> Option<Rung> {
        let core_price = Price::new(core.bid, core.ask);

        let tom = self.market.rung(core.amt);
        let adjustment = tom.map(|t| MarketAdjustment {
            bid_spread: t.bid_spread,
            ask_spread: t.ask_spread,
            min_spread: t.min_spread,
            source: "TOM".to_string(),
        });
        let price_adjustment = match tom {
            Some(t) => Price::new(
                core.bid.checked_add(t.bid_spread)?,
                core.ask.checked_add(t.ask_spread)?,
            ),
            None => core_price,
        };
        let mid_spread = MidSpread::of(&price_adjustment)?;

        let entry = self.modifiers.lookup(&self.market.mkt_mode, position);
        let price_after_rung_modifier = match entry {
            Some(e) => Price::centred(mid_spread.mid, e.kind.apply(mid_spread.spread, e.value)?)?,
            None => price_adjustment,
        };
        let rung_modifier = entry.map(|e| AppliedModifier {
            label: format!(
                "{}_FA (Rung {} {} {})",
                self.modifiers.package.as_deref().unwrap_or_default(),
                position,
                e.kind,
                e.value
            ),
            kind: e.kind,
            value: e.value,
            min: e.min,
        });

        let tom_min = tom.map(|t| t.min_spread).unwrap_or(Decimal::ZERO);
        let rm_min = entry.and_then(|e| e.min).unwrap_or(Decimal::ZERO);
        let min_spread = tom_min.max(rm_min);
        let price_after_min_spread = enforce_min_spread(price_after_rung_modifier, min_spread)?;

        let mut rung = Rung {
            amt: core.amt,
            core: core_price,
            adjustment,
            price_adjustment,
            mid_spread,
            volatility_scenario: self.market.scenario(),
            rung_modifier,
            price_after_rung_modifier,
            min_spread,
            price_after_min_spread,
            active,
            skew: None,
            volume_adjustment: None,
            price_after_skew: None,
        };
        if active {
            self.attach_skew(&mut rung);
        }
        Some(rung)
    }

    fn attach_skew(&self, rung: &mut Rung) {
        let (price, applied) = match &self.skew {
            Some(source) => source.apply(rung.price_after_min_spread, rung.amt),
            None => (rung.price_after_min_spread, false),
        };
        rung.skew = Some(SkewInfo {
            package: self.skew_meta.and_then(|s| text(s, "pkg")),
            b_pos: self.skew_meta.and_then(|s| text(s, "bPos")),
            a_auto_skew: self
                .skew
                .as_ref()
                .and_then(|s| s.auto_skew.as_ref())
                .and_then(ParsedNode::as_text),
            applied,
        });
        rung.volume_adjustment = Some(VolumeAdjustment {
            package: self.modifiers.package.clone(),
            applied: self.modifiers.package.is_some(),
        });
        rung.price_after_skew = Some(price);
    }
}

impl fmt::Display for SpotDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let na = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        writeln!(f, "=== Spot Construction ===")?;
        writeln!(f, "Pair:       {}", na(&self.context.ccy_pair))?;
        writeln!(f, "Venue:      {}", na(&self.context.venue))?;
        writeln!(f, "Model:      {}", na(&self.context.prc_model))?;
        writeln!(f, "Client:     {}", na(&self.client.venue_client_id))?;
        match self.notional.amount {
            Some(amount) => writeln!(
                f,
                "Notional:   {} {}",
                amount,
                self.notional.side.as_deref().unwrap_or("")
            )?,
            None => writeln!(f, "Notional:   -")?,
        }

        for rung in &self.rungs {
            let marker = if rung.active { " (active)" } else { "" };
            writeln!(f, "\n--- Rung {}{} ---", rung.amt, marker)?;
            writeln!(f, "  Core:            {}", rung.core)?;
            writeln!(f, "  After TOM:       {}", rung.price_adjustment)?;
            writeln!(f, "  Mid / Spread:    {} / {}", rung.mid_spread.mid, rung.mid_spread.spread)?;
            if let Some(rm) = &rung.rung_modifier {
                writeln!(f, "  Rung modifier:   {}", rm.label)?;
            }
            writeln!(f, "  After modifier:  {}", rung.price_after_rung_modifier)?;
            writeln!(f, "  Min spread:      {}", rung.min_spread)?;
            writeln!(f, "  After min:       {}", rung.price_after_min_spread)?;
            if let Some(skewed) = &rung.price_after_skew {
                writeln!(f, "  After skew:      {}", skewed)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construction::ladder::{ModifierKind, VolatilityScenario};
    use crate::parser::parse;
    use rust_decimal_macros::dec;

    fn trace(body: &str) -> ParsedNode {
        parse(&format!(
            "SCP[id=PX-1, key=Key[ccyPair=EUR/USD, venue=EBS, prcModel=TIERED, notional=3000000:S], {body}]"
        ))
    }

    const CRL: &str = "crl=CRL[origin=DIRECT, rungs=[Rung[amt=1000000, bidPrice=1.2000, askPrice=1.2010], Rung[amt=5000000, bidPrice=1.1995, askPrice=1.2015], Rung[amt=10000000, bidPrice=1.1990, askPrice=1.2020]]]";

    #[test]
    fn test_market_adjustment_then_min_spread_unchanged() {
        let t = trace(&format!(
            "{CRL}, tom=TOM[mktMode=N, rungs=[Rung[amt=1000000, bidSpread=0.0001, askSpread=0.0002, minSpread=0.0005]]]"
        ));
        let doc = construct(&t).unwrap();
        let rung = doc.rung(1_000_000).unwrap();

        assert_eq!(rung.price_adjustment, Price::new(dec!(1.2001), dec!(1.2012)));
        assert_eq!(rung.mid_spread.spread, dec!(0.0011));
        assert!(rung.rung_modifier.is_none());
        assert_eq!(rung.price_after_rung_modifier, rung.price_adjustment);
        assert_eq!(rung.min_spread, dec!(0.0005));
        assert_eq!(rung.price_after_min_spread, Price::new(dec!(1.2001), dec!(1.2012)));
        assert!(!rung.active);
    }

    #[test]
    fn test_missing_tom_rung_inherits_core() {
        let doc = construct(&trace(CRL)).unwrap();
        let rung = doc.rung(5_000_000).unwrap();
        assert!(rung.adjustment.is_none());
        assert_eq!(rung.price_adjustment, rung.core);
        assert_eq!(rung.min_spread, Decimal::ZERO);
        assert_eq!(rung.price_after_min_spread, rung.core);
    }

    #[test]
    fn test_multiplicative_modifier_by_ladder_position() {
        let t = trace(&format!(
            "{CRL}, tom=TOM[mktMode=N, rungs=[Rung[amt=5000000, bidSpread=0.0006, askSpread=-0.0003]]], tmu=TMU[package=GOLD, rungmodifiers={{N=[RM[rung=2, type=MULTIPLY, value=2]]}}]"
        ));
        let doc = construct(&t).unwrap();
        let rung = doc.rung(5_000_000).unwrap();

        assert_eq!(rung.mid_spread.mid, dec!(1.20065));
        assert_eq!(rung.mid_spread.spread, dec!(0.0011));
        let rm = rung.rung_modifier.as_ref().unwrap();
        assert_eq!(rm.kind, ModifierKind::Multiply);
        assert_eq!(rm.label, "GOLD_FA (Rung 2 MULTIPLY 2)");
        assert_eq!(
            rung.price_after_rung_modifier,
            Price::new(dec!(1.19955), dec!(1.20175))
        );
        assert!(doc.rung(1_000_000).unwrap().rung_modifier.is_none());
    }

    #[test]
    fn test_min_spread_enforcement_recentres() {
        let t = trace(&format!(
            "{CRL}, tom=TOM[mktMode=A, rungs=[Rung[amt=10000000, bidSpread=0.0013, askSpread=-0.0013, minSpread=0.0004]]], tmu=TMU[package=P, rungmodifiers={{A=[RM[rung=3, type=ADDITIVE, value=0, min=0.0010]]}}]"
        ));
        let doc = construct(&t).unwrap();
        let rung = doc.rung(10_000_000).unwrap();

        assert_eq!(rung.price_after_rung_modifier.spread(), Some(dec!(0.0004)));
        assert_eq!(rung.min_spread, dec!(0.0010));
        let mid = rung.price_after_rung_modifier.mid().unwrap();
        assert_eq!(rung.price_after_min_spread.bid, mid - dec!(0.0005));
        assert_eq!(rung.price_after_min_spread.ask, mid + dec!(0.0005));
    }

    #[test]
    fn test_only_active_rung_carries_skew() {
        let t = trace(&format!(
            "{CRL}, skew=Skew[pkg=SK1, bPos=2], clientPrc=[CP[SCalc=PPM[crlAmt=5000000, aAutoSkew=1, uBidTrSpot=1.1990, uAskTrSpot=1.2019]]]"
        ));
        let doc = construct(&t).unwrap();
        let active = doc.active_rung().unwrap();
        assert_eq!(active.amt, 5_000_000);
        assert!(active.skew_applied());
        assert_eq!(active.price_after_skew, Some(Price::new(dec!(1.1990), dec!(1.2019))));
        assert_eq!(active.skew.as_ref().unwrap().package.as_deref(), Some("SK1"));
        assert_eq!(doc.rungs.iter().filter(|r| r.skew.is_some()).count(), 1);
        assert!(doc.rung(1_000_000).unwrap().price_after_skew.is_none());
    }

    #[test]
    fn test_auto_skew_off_inherits_min_spread_price() {
        let t = trace(&format!(
            "{CRL}, clientPrc=[CP[SCalc=PPM[aAutoSkew=0, uBidTrSpot=1.0, uAskTrSpot=2.0]]]"
        ));
        let doc = construct(&t).unwrap();
        let active = doc.active_rung().unwrap();
        assert!(!active.skew_applied());
        assert_eq!(active.price_after_skew, Some(active.price_after_min_spread));
    }

    #[test]
    fn test_notional_above_ladder_has_no_active_rung() {
        let t = parse(&format!("SCP[key=Key[notional=20000000:S], {CRL}]"));
        let doc = construct(&t).unwrap();
        assert!(doc.active_rung().is_none());
        assert!(doc.rungs.iter().all(|r| r.price_after_skew.is_none()));
    }

    #[test]
    fn test_invalid_traces() {
        assert_eq!(
            construct(&ParsedNode::str("nope")).unwrap_err(),
            InvalidTraceError::NotABlock
        );
        let wrong = parse("QUOTE[id=Q1, key=Key[a=1]]");
        assert!(matches!(
            construct(&wrong).unwrap_err(),
            InvalidTraceError::UnexpectedTag { .. }
        ));
        let no_key = parse(&format!("SCP[id=PX-2, {CRL}]"));
        let err = construct(&no_key).unwrap_err();
        assert_eq!(err.trace_id(), Some("PX-2"));
        assert!(err.to_string().contains("PX-2"));
        let no_ladder = parse("SCP[key=Key[a=1]]");
        assert!(matches!(
            construct(&no_ladder).unwrap_err(),
            InvalidTraceError::MissingLadder { .. }
        ));
    }

    #[test]
    fn test_unpriceable_rung_is_omitted() {
        let t = parse("SCP[key=Key[a=1], crl=CRL[rungs=[Rung[amt=1, bidPrice=x, askPrice=1.1], Rung[amt=2, bidPrice=1.0, askPrice=1.1]]]]");
        let doc = construct(&t).unwrap();
        assert_eq!(doc.rungs.len(), 1);
        assert_eq!(doc.rungs[0].amt, 2);
    }

    #[test]
    fn test_fast_market_mode_applies_its_modifiers() {
        let t = trace(&format!(
            "{CRL}, tom=TOM[mktMode=F, rungs=[]], tmu=TMU[package=GOLD, rungmodifiers={{F=[RM[rung=1, type=MULTIPLY, value=2]]}}]"
        ));
        let doc = construct(&t).unwrap();
        let rung = doc.rung(1_000_000).unwrap();
        assert_eq!(rung.volatility_scenario, VolatilityScenario::Fast);
        assert_eq!(rung.rung_modifier.as_ref().unwrap().kind, ModifierKind::Multiply);
        assert_eq!(
            rung.price_after_rung_modifier,
            Price::new(dec!(1.1995), dec!(1.2015))
        );
    }

    #[test]
    fn test_overflowing_rung_is_omitted() {
        let t = trace(
            "crl=CRL[rungs=[Rung[amt=1000000, bidPrice=0.0, askPrice=10000000000.0], Rung[amt=5000000, bidPrice=1.1995, askPrice=1.2015]]], \
             tmu=TMU[package=GOLD, rungmodifiers={N=[RM[rung=1, type=MULTIPLY, value=1e20]]}]",
        );
        let doc = construct(&t).unwrap();
        assert_eq!(doc.rungs.len(), 1);
        assert_eq!(doc.rungs[0].amt, 5_000_000);
        assert!(doc.rungs[0].active);
    }

    #[test]
    fn test_repeated_amount_activates_first_entry_only() {
        let t = trace(
            "crl=CRL[rungs=[Rung[amt=1000000, bidPrice=1.2000, askPrice=1.2010], Rung[amt=5000000, bidPrice=1.1995, askPrice=1.2015], Rung[amt=5000000, bidPrice=1.1990, askPrice=1.2020]]], \
             clientPrc=[CP[SCalc=PPM[crlAmt=5000000, aAutoSkew=T, uBidTrSpot=1.1990, uAskTrSpot=1.2019]]]",
        );
        let doc = construct(&t).unwrap();
        assert_eq!(doc.rungs.iter().filter(|r| r.active).count(), 1);
        assert!(doc.rungs[1].active);
        assert!(!doc.rungs[2].active);
        assert!(doc.rungs[2].price_after_skew.is_none());
    }

    #[test]
    fn test_construct_is_idempotent() {
        let t = trace(CRL);
        let a = serde_json::to_string(&construct(&t).unwrap()).unwrap();
        let b = serde_json::to_string(&construct(&t).unwrap()).unwrap();
        assert_eq!(a, b);
    }
}
