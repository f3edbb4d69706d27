//! Step-by-step audit narrative for one reconstructed rung.
//!
//! The text is a display contract: section headers and the `Bid =` /
//! `Final Bid =` style lines are picked up by renderers. Every number is
//! printed from the decimals the engine computed.

use crate::construction::engine::PricingContext;
use crate::construction::ladder::ModifierKind;
use crate::construction::rung::Rung;
use crate::construction::selection::ClientNotional;
use rust_decimal::Decimal;
use std::fmt;

pub const CONTEXT: &str = "CONTEXT";
pub const RUNG_SELECTION: &str = "RUNG SELECTION";
pub const SPOT_CORE: &str = "SPOT CORE (CRL)";
pub const TOM_ADJUSTMENT: &str = "TOM ADJUSTMENT";
pub const MID_SPREAD: &str = "MID / SPREAD";
pub const RUNG_MODIFIER: &str = "RUNG MODIFIER";
pub const MIN_SPREAD: &str = "MIN SPREAD";
pub const FINAL_PRICE: &str = "FINAL PRICE";

/// Section headers in the order they appear.
pub const SECTIONS: [&str; 8] = [
    CONTEXT,
    RUNG_SELECTION,
    SPOT_CORE,
    TOM_ADJUSTMENT,
    MID_SPREAD,
    RUNG_MODIFIER,
    MIN_SPREAD,
    FINAL_PRICE,
];

/// The narrative for one rung; read-only over already computed rung data.
/// Rendered through `Display`.
pub struct AuditNarrative<'a> {
    context: &'a PricingContext,
    notional: &'a ClientNotional,
    rung: &'a Rung,
}

/// Narrative for `rung` under the document's context and notional.
pub fn explain_rung(context: &PricingContext, notional: &ClientNotional, rung: &Rung) -> String {
    AuditNarrative::new(context, notional, rung).to_string()
}

type Section<'a> = fn(&AuditNarrative<'a>, &mut fmt::Formatter<'_>) -> fmt::Result;

impl<'a> AuditNarrative<'a> {
    pub fn new(context: &'a PricingContext, notional: &'a ClientNotional, rung: &'a Rung) -> Self {
        Self {
            context,
            notional,
            rung,
        }
    }

    fn context_section(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        header(f, CONTEXT)?;
        writeln!(
            f,
            "Price built for {} under pricing model {}.",
            self.context.ccy_pair.as_deref().unwrap_or("-"),
            self.context.prc_model.as_deref().unwrap_or("-")
        )?;
        write!(f, "Market scenario applied: '{}'.", self.rung.volatility_scenario)
    }

    fn selection_section(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        header(f, RUNG_SELECTION)?;
        match self.notional.amount {
            Some(amount) => writeln!(f, "Client notional = {}.", amount)?,
            None => writeln!(f, "Client notional = not available.")?,
        }
        write!(f, "Rung {} ", group_thousands(self.rung.amt))?;
        if self.rung.active {
            f.write_str("is selected as the first rung whose amount is greater than or equal to the client notional.")
        } else {
            f.write_str("is shown for reference; it is not the rung that priced the client notional.")
        }
    }

    fn core_section(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        header(f, SPOT_CORE)?;
        writeln!(f, "Base price taken from the CRL:")?;
        writeln!(f, "Bid_core = {}", self.rung.core.bid)?;
        writeln!(f, "Ask_core = {}", self.rung.core.ask)?;
        f.write_str("This price includes no market (TOM) or commercial (RM) adjustment.")
    }

    fn tom_section(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        header(f, TOM_ADJUSTMENT)?;
        let Some(adj) = &self.rung.adjustment else {
            return f.write_str("No TOM adjustment is configured for this rung.");
        };
        let core = &self.rung.core;
        let priced = &self.rung.price_adjustment;
        writeln!(f, "Price adjusted with the TOM spreads:\n")?;
        writeln!(f, "Bid_adj = Bid_core + BidSpread")?;
        writeln!(f, "        = {} + {}", core.bid, adj.bid_spread)?;
        writeln!(f, "        = {}\n", priced.bid)?;
        writeln!(f, "Ask_adj = Ask_core + AskSpread")?;
        writeln!(f, "        = {} + {}", core.ask, adj.ask_spread)?;
        write!(f, "        = {}", priced.ask)
    }

    fn mid_spread_section(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        header(f, MID_SPREAD)?;
        let priced = &self.rung.price_adjustment;
        let ms = &self.rung.mid_spread;
        writeln!(f, "Mid and spread of the adjusted price:")?;
        writeln!(f, "Mid = (Bid_adj + Ask_adj) / 2")?;
        writeln!(f, "    = ({} + {}) / 2", priced.bid, priced.ask)?;
        writeln!(f, "    = {}\n", ms.mid)?;
        writeln!(f, "Spread = Ask_adj - Bid_adj")?;
        writeln!(f, "       = {} - {}", priced.ask, priced.bid)?;
        write!(f, "       = {}", ms.spread)
    }

    fn modifier_section(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        header(f, RUNG_MODIFIER)?;
        let Some(rm) = &self.rung.rung_modifier else {
            return f.write_str("No rung modifier is configured for this rung.");
        };
        let mid = self.rung.mid_spread.mid;
        let spread = self.rung.mid_spread.spread;
        let priced = &self.rung.price_after_rung_modifier;
        let Some(new_spread) = rm.kind.apply(spread, rm.value) else {
            return f.write_str("The modified spread is outside the decimal range.");
        };
        let half = new_spread / Decimal::TWO;
        let (term, substituted) = match rm.kind {
            ModifierKind::Additive => (
                "(Spread + RMValue)",
                format!("({} + {})", spread, rm.value),
            ),
            ModifierKind::Multiply => (
                "(RMValue × Spread)",
                format!("({} × {})", rm.value, spread),
            ),
        };

        writeln!(f, "Active rung modifier:\n{}", rm.label)?;
        writeln!(f, "Modifier type: {}", rm.kind)?;
        writeln!(f, "Value applied = {}\n", rm.value)?;
        writeln!(f, "Formula:")?;
        writeln!(f, "BID = Mid - ({} / 2)", term)?;
        writeln!(f, "ASK = Mid + ({} / 2)\n", term)?;
        writeln!(f, "Substitution:")?;
        writeln!(f, "BID = {} - ({} / 2)", mid, substituted)?;
        writeln!(f, "ASK = {} + ({} / 2)\n", mid, substituted)?;
        writeln!(f, "Intermediate:")?;
        writeln!(f, "{} = {}", term, new_spread)?;
        writeln!(f, "{} / 2 = {}\n", term, half)?;
        writeln!(f, "Result:")?;
        writeln!(f, "Bid_RM = {}", priced.bid)?;
        write!(f, "Ask_RM = {}", priced.ask)
    }

    fn min_spread_section(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        header(f, MIN_SPREAD)?;
        let priced = &self.rung.price_after_rung_modifier;
        let min = self.rung.min_spread;
        let Some(spread_rm) = priced.spread() else {
            return f.write_str("Spread_RM is outside the decimal range.");
        };
        writeln!(f, "Spread_RM = Ask_RM - Bid_RM = {}", spread_rm)?;
        writeln!(f, "Configured MinSpread = {}\n", min)?;
        if spread_rm < min {
            let enforced = &self.rung.price_after_min_spread;
            writeln!(f, "Spread_RM < MinSpread, the minimum spread is enforced around the mid:")?;
            writeln!(f, "Bid_final = {}", enforced.bid)?;
            write!(f, "Ask_final = {}", enforced.ask)
        } else {
            writeln!(f, "Spread_RM ≥ MinSpread, no further adjustment is needed.")?;
            f.write_str("The price is kept.")
        }
    }

    fn final_section(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        header(f, FINAL_PRICE)?;
        let price = self.rung.final_price();
        if self.rung.skew_applied() {
            writeln!(f, "Trader skew replaced the constructed price on the active rung:")?;
        } else {
            writeln!(f, "Final price after every rule:")?;
        }
        writeln!(f, "Final Bid = {}", price.bid)?;
        write!(f, "Final Ask = {}", price.ask)
    }
}

impl fmt::Display for AuditNarrative<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sections: [Section<'_>; 8] = [
            Self::context_section,
            Self::selection_section,
            Self::core_section,
            Self::tom_section,
            Self::mid_spread_section,
            Self::modifier_section,
            Self::min_spread_section,
            Self::final_section,
        ];
        for (i, section) in sections.iter().enumerate() {
            if i > 0 {
                f.write_str("\n\n")?;
            }
            section(self, f)?;
        }
        Ok(())
    }
}

fn header(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f, "{}\n{}", title, "-".repeat(title.chars().count()))
}

/// `5000000` → `5.000.000`, the desk's amount notation.
pub fn group_thousands(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if amount < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construction::construct;
    use crate::parser::parse;

    fn document() -> crate::construction::SpotDocument {
        let trace = parse(
            "SCP[id=PX-7, key=Key[ccyPair=EUR/USD, prcModel=TIERED, notional=3000000:S], \
             crl=CRL[rungs=[Rung[amt=1000000, bidPrice=1.2000, askPrice=1.2010], Rung[amt=5000000, bidPrice=1.1995, askPrice=1.2015]]], \
             tom=TOM[mktMode=N, rungs=[Rung[amt=5000000, bidSpread=0.0006, askSpread=-0.0003, minSpread=0.0030]]], \
             tmu=TMU[package=GOLD, rungmodifiers={N=[RM[rung=2, type=MULTIPLY, value=2]]}]]",
        );
        construct(&trace).unwrap()
    }

    #[test]
    fn test_sections_in_order() {
        let doc = document();
        let rung = doc.active_rung().unwrap();
        let text = explain_rung(&doc.context, &doc.notional, rung);

        let mut last = 0;
        for section in SECTIONS {
            let pos = text.find(&format!("{}\n", section)).unwrap();
            assert!(pos >= last, "{} out of order", section);
            last = pos;
        }
    }

    #[test]
    fn test_numbers_match_engine() {
        let doc = document();
        let rung = doc.active_rung().unwrap();
        let text = explain_rung(&doc.context, &doc.notional, rung);

        assert!(text.contains(&format!("Bid_core = {}", rung.core.bid)));
        assert!(text.contains(&format!("        = {}\n", rung.price_adjustment.bid)));
        assert!(text.contains(&format!("    = {}\n", rung.mid_spread.mid)));
        assert!(text.contains(&format!("Bid_RM = {}", rung.price_after_rung_modifier.bid)));
        assert!(text.contains(&format!("Bid_final = {}", rung.price_after_min_spread.bid)));
        assert!(text.contains(&format!("Final Bid = {}", rung.final_price().bid)));
        assert!(text.contains(&format!("Final Ask = {}", rung.final_price().ask)));
        assert!(text.contains("Rung 5.000.000 is selected"));
        assert!(text.contains("(RMValue × Spread) = 0.0022"));
    }

    #[test]
    fn test_plain_rung_narrative() {
        let doc = document();
        let rung = doc.rung(1_000_000).unwrap();
        let text = explain_rung(&doc.context, &doc.notional, rung);

        assert!(text.contains("No TOM adjustment is configured"));
        assert!(text.contains("No rung modifier is configured"));
        assert!(text.contains("The price is kept."));
        assert!(text.contains("is shown for reference"));
    }

    #[test]
    fn test_display_separates_sections_with_blank_lines() {
        let doc = document();
        let rung = doc.active_rung().unwrap();
        let text = format!("{}", AuditNarrative::new(&doc.context, &doc.notional, rung));

        assert_eq!(text, explain_rung(&doc.context, &doc.notional, rung));
        assert!(text.starts_with("CONTEXT\n-------\n"));
        assert!(text.contains("\n\nRUNG SELECTION\n--------------\n"));
        assert!(text.contains("\n\nFINAL PRICE\n-----------\n"));
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(5_000_000), "5.000.000");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1.000");
        assert_eq!(group_thousands(-25_000), "-25.000");
    }
}
