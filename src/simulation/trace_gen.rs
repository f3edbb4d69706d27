//! Random SCP trace generation.
//!
//! Produces raw trace text shaped like the pricer's output so that the
//! parser, the engine and the explain services can be exercised without
//! captured production traces. A fixed seed makes the output reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::fmt::Write;

/// Standard rung sizes, in millions.
const LADDER_MILLIONS: [i64; 8] = [1, 2, 5, 10, 20, 30, 50, 100];
const MARKET_MODES: [&str; 4] = ["N", "A", "B", "F"];
const PACKAGES: [&str; 3] = ["GOLD", "SILVER", "BRONZE"];
const VENUES: [&str; 3] = ["EBS", "REUTERS", "FXALL"];

/// Configuration for generating a random trace.
#[derive(Debug, Clone)]
pub struct TraceConfig {
    /// Number of CRL rungs.
    pub rung_count: usize,
    /// Emit a cross built from two legs (`crl.XCalc`).
    pub synthetic: bool,
    /// Seed for reproducible output; `None` draws from entropy.
    pub seed: Option<u64>,
    /// Pair quoted directly, or the first leg of a synthetic cross.
    pub ccy_pair: String,
    /// Mid around which the direct ladder is quoted.
    pub base_mid: Decimal,
    /// Write decimals with a comma separator, as some pricer builds do.
    pub decimal_comma: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            rung_count: 4,
            synthetic: false,
            seed: None,
            ccy_pair: "EUR/USD".to_string(),
            base_mid: Decimal::new(108_500, 5),
            decimal_comma: false,
        }
    }
}

/// One leg of a synthetic cross.
struct Leg {
    pair: String,
    mid: Decimal,
    half_spread: Decimal,
}

struct Generator {
    rng: StdRng,
    decimal_comma: bool,
}

impl Generator {
    fn num(&self, d: Decimal) -> String {
        let text = d.to_string();
        if self.decimal_comma {
            text.replace('.', ",")
        } else {
            text
        }
    }

    /// A random multiple of `unit` in `lo..=hi`.
    fn steps(&mut self, lo: i64, hi: i64, unit: Decimal) -> Decimal {
        Decimal::from(self.rng.gen_range(lo..=hi)) * unit
    }

    fn pick<'a>(&mut self, options: &[&'a str]) -> &'a str {
        options[self.rng.gen_range(0..options.len())]
    }
}

fn ladder_amounts(count: usize) -> Vec<i64> {
    (0..count)
        .map(|i| match LADDER_MILLIONS.get(i) {
            Some(m) => m * 1_000_000,
            None => (i as i64 - LADDER_MILLIONS.len() as i64 + 2) * 100_000_000,
        })
        .collect()
}

/// Generate a random raw SCP trace.
pub fn generate_trace(config: &TraceConfig) -> String {
    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut g = Generator {
        rng,
        decimal_comma: config.decimal_comma,
    };

    let amounts = ladder_amounts(config.rung_count.max(1));
    let tick = Decimal::new(1, 5);

    let (final_pair, final_mid, legs) = if config.synthetic {
        let quote = config
            .ccy_pair
            .split('/')
            .nth(1)
            .unwrap_or("USD")
            .to_string();
        let leg1 = Leg {
            pair: config.ccy_pair.clone(),
            mid: config.base_mid,
            half_spread: g.steps(1, 3, tick),
        };
        let leg2 = Leg {
            pair: format!("{quote}/JPY"),
            mid: Decimal::new(149_000, 3) + g.steps(0, 900, Decimal::new(1, 3)),
            half_spread: g.steps(1, 4, Decimal::new(1, 3)),
        };
        let base = config.ccy_pair.split('/').next().unwrap_or("EUR");
        let mid = (leg1.mid * leg2.mid).round_dp(3);
        (format!("{base}/JPY"), mid, Some((leg1, leg2)))
    } else {
        (config.ccy_pair.clone(), config.base_mid, None)
    };
    // Smallest price increment of the final pair.
    let unit = if legs.is_some() { Decimal::new(1, 3) } else { tick };

    let id = format!("GEN-{:08X}", g.rng.gen::<u32>());
    let top = *amounts.last().unwrap_or(&1_000_000);
    let notional = g.rng.gen_range(100_000..=top + top / 5) / 1000 * 1000;
    let side = g.pick(&["B", "S"]);
    let mode = g.pick(&MARKET_MODES);
    let package = g.pick(&PACKAGES);
    let venue = g.pick(&VENUES);

    let mut out = String::new();
    let _ = write!(
        out,
        "SCP[id={id}, key=Key[ccyPair={final_pair}, venue={venue}, group=G{}, smType=SPOT, prcModel=TIERED, priceCompetition=F, \
         venueClientId=CLI{:04}, venueAccountId=ACC{:04}, venueUserId=USR{:03}, notional={notional}:{side}], ",
        g.rng.gen_range(1..=9),
        g.rng.gen_range(0..10_000),
        g.rng.gen_range(0..10_000),
        g.rng.gen_range(0..1_000),
    );

    // Core ladder: wider with size.
    let mut crl_rungs = Vec::with_capacity(amounts.len());
    for (i, amt) in amounts.iter().enumerate() {
        let half = g.steps(2, 6, unit) + Decimal::from(i as i64) * unit;
        crl_rungs.push(format!(
            "Rung[amt={amt}, bidPrice={}, askPrice={}, bidCond=OK, askCond=OK]",
            g.num(final_mid - half),
            g.num(final_mid + half)
        ));
    }
    let origin = if legs.is_some() { "SYNTHETIC" } else { "DIRECT" };
    let _ = write!(
        out,
        "crl=CRL[id=CRL-{}, ccyPair={final_pair}, origin={origin}, valDt=20260105, rType=SPOT, rungs=[{}]",
        g.rng.gen_range(1000..10_000),
        crl_rungs.join(", ")
    );
    if let Some((leg1, leg2)) = &legs {
        let comp = |g: &mut Generator, leg: &Leg, n: usize| {
            let bid = leg.mid - leg.half_spread;
            let ask = leg.mid + leg.half_spread;
            format!(
                "comp{n}Calc=Comp[crl=CRL[id=CRL-L{n}{}, ccyPair={}, origin=DIRECT, valDt=20260105, rType=SPOT, \
                 rungs=[Rung[amt={}, bidPrice={}, askPrice={}]]], traderAdjBid={}, traderAdjAsk={}]",
                g.rng.gen_range(100..1000),
                leg.pair,
                amounts[0],
                g.num(bid),
                g.num(ask),
                g.num(bid),
                g.num(ask)
            )
        };
        let c1 = comp(&mut g, leg1, 1);
        let c2 = comp(&mut g, leg2, 2);
        let tri_bid = ((leg1.mid - leg1.half_spread) * (leg2.mid - leg2.half_spread)).round_dp(3);
        let tri_ask = ((leg1.mid + leg1.half_spread) * (leg2.mid + leg2.half_spread)).round_dp(3);
        let _ = write!(
            out,
            ", XCalc=XCalc[{c1}, {c2}, finalTriBid={}, finalTriAsk={}]",
            g.num(tri_bid),
            g.num(tri_ask)
        );
    }
    out.push_str("], ");

    // Market adjustment: small deltas, some rungs left out.
    let mut tom_rungs = Vec::new();
    for amt in &amounts {
        if g.rng.gen_bool(0.2) {
            continue;
        }
        let bid_spread = g.steps(-3, 1, unit);
        let ask_spread = g.steps(-1, 3, unit);
        let min_spread = g.steps(0, 12, unit);
        tom_rungs.push(format!(
            "Rung[amt={amt}, bidSpread={}, askSpread={}, minSpread={}]",
            g.num(bid_spread),
            g.num(ask_spread),
            g.num(min_spread)
        ));
    }
    let _ = write!(
        out,
        "tom=TOM[mktMode={mode}, time=10:15:00, rungs=[{}]], ",
        tom_rungs.join(", ")
    );

    // Commercial rung modifiers for a subset of positions.
    let mut modifiers = Vec::new();
    for position in 1..=amounts.len() {
        if !g.rng.gen_bool(0.5) {
            continue;
        }
        let (kind, value) = if g.rng.gen_bool(0.5) {
            ("ADDITIVE", g.steps(0, 4, unit))
        } else {
            ("MULTIPLY", g.steps(10, 30, Decimal::new(1, 1)))
        };
        let min = if g.rng.gen_bool(0.3) {
            let min = g.steps(1, 15, unit);
            g.num(min)
        } else {
            "null".to_string()
        };
        modifiers.push(format!(
            "RM[rung={position}, type={kind}, value={}, min={min}]",
            g.num(value)
        ));
    }
    let _ = write!(
        out,
        "tmu=TMU[package={package}, rungmodifiers={{{mode}=[{}]}}], ",
        modifiers.join(", ")
    );

    // Client price calculation with the trader's skewed spot.
    let scalc_amt = amounts
        .iter()
        .copied()
        .find(|a| *a >= notional)
        .unwrap_or(amounts[0]);
    let skew_bid = final_mid - g.steps(3, 8, unit);
    let skew_ask = final_mid + g.steps(3, 8, unit);
    let _ = write!(
        out,
        "skew=Skew[pkg=SK{}, bPos={}], clientPrc=[CP[notionalAmt={notional}, SCalc=PPM[crlAmt={scalc_amt}, aAutoSkew={}, uBidTrSpot={}, uAskTrSpot={}]]]]",
        g.rng.gen_range(1..=5),
        g.rng.gen_range(0..=amounts.len()),
        if g.rng.gen_bool(0.5) { "T" } else { "F" },
        g.num(skew_bid),
        g.num(skew_ask)
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construction::construct;
    use crate::explain::explain_triangulation;
    use crate::parser::parse_with_diagnostics;

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let config = TraceConfig {
            seed: Some(42),
            ..Default::default()
        };
        assert_eq!(generate_trace(&config), generate_trace(&config));
    }

    #[test]
    fn test_generated_trace_parses_cleanly() {
        for seed in 0..20 {
            let config = TraceConfig {
                seed: Some(seed),
                rung_count: 6,
                decimal_comma: seed % 2 == 0,
                ..Default::default()
            };
            let text = generate_trace(&config);
            let outcome = parse_with_diagnostics(&text);
            assert!(outcome.is_clean(), "seed {}: {:?}", seed, outcome.diagnostics);

            let doc = construct(&outcome.node).unwrap();
            assert_eq!(doc.rungs.len(), 6);
        }
    }

    #[test]
    fn test_synthetic_trace_triangulates() {
        let config = TraceConfig {
            seed: Some(7),
            synthetic: true,
            ..Default::default()
        };
        let trace = parse_with_diagnostics(&generate_trace(&config)).node;
        let explanation = explain_triangulation(&trace).unwrap();
        assert_eq!(explanation.final_pair.as_deref(), Some("EUR/JPY"));
        assert_eq!(explanation.bid.formula, "EUR/USD × USD/JPY");
    }

    #[test]
    fn test_ladder_amounts_extend_past_standard_sizes() {
        let amounts = ladder_amounts(10);
        assert_eq!(amounts[0], 1_000_000);
        assert_eq!(amounts[7], 100_000_000);
        assert_eq!(amounts[8], 200_000_000);
        assert_eq!(amounts[9], 300_000_000);
    }
}
