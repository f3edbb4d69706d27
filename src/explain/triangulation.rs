use crate::parser::ParsedNode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriangulationError {
    #[error("CRL is not synthetic: no crl.XCalc found")]
    NotSynthetic,
    #[error("triangulation field missing or malformed: {path}")]
    MissingField { path: String },
}

/// Where one leg of a cross came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegSource {
    pub pair: String,
    pub origin: Option<String>,
    pub id: Option<String>,
}

/// One leg's contribution to a side of the cross.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegValue {
    pub pair: String,
    pub value: Decimal,
}

/// How one side (bid or ask) of the final pair was composed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideDerivation {
    pub formula: String,
    pub components: Vec<LegValue>,
    pub result: Decimal,
}

/// How a synthetic CRL was derived from its two component legs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriangulationExplanation {
    pub final_pair: Option<String>,
    pub method: String,
    pub bid: SideDerivation,
    pub ask: SideDerivation,
    pub sources: Vec<LegSource>,
}

/// A component leg as read from `crl.XCalc.comp{n}Calc`.
struct Leg {
    source: LegSource,
    bid: Decimal,
    ask: Decimal,
}

impl Leg {
    fn read(xcalc: &ParsedNode, name: &str) -> Result<Self, TriangulationError> {
        let prefix = format!("crl.XCalc.{}", name);
        let calc = xcalc.get(name).ok_or_else(|| missing(&prefix))?;
        let crl = calc.get("crl").ok_or_else(|| missing(&format!("{prefix}.crl")))?;
        let pair = crl
            .get("ccyPair")
            .and_then(ParsedNode::as_text)
            .ok_or_else(|| missing(&format!("{prefix}.crl.ccyPair")))?;
        Ok(Self {
            source: LegSource {
                pair,
                origin: crl.get("origin").and_then(ParsedNode::as_text),
                id: crl.get("id").and_then(ParsedNode::as_text),
            },
            bid: decimal(calc, "traderAdjBid", &prefix)?,
            ask: decimal(calc, "traderAdjAsk", &prefix)?,
        })
    }
}

fn missing(path: &str) -> TriangulationError {
    TriangulationError::MissingField {
        path: path.to_string(),
    }
}

fn decimal(node: &ParsedNode, field: &str, prefix: &str) -> Result<Decimal, TriangulationError> {
    node.get(field)
        .and_then(ParsedNode::as_decimal)
        .ok_or_else(|| missing(&format!("{prefix}.{field}")))
}

/// Explain a synthetic cross rate from its two legs.
///
/// The final values are the ones the pricer reported (`finalTriBid` /
/// `finalTriAsk`); they are quoted, not recomputed.
pub fn explain_triangulation(trace: &ParsedNode) -> Result<TriangulationExplanation, TriangulationError> {
    let crl = trace.get("crl");
    let xcalc = crl
        .and_then(|c| c.get("XCalc"))
        .filter(|x| x.is_truthy())
        .ok_or(TriangulationError::NotSynthetic)?;

    let leg1 = Leg::read(xcalc, "comp1Calc")?;
    let leg2 = Leg::read(xcalc, "comp2Calc")?;
    let final_bid = decimal(xcalc, "finalTriBid", "crl.XCalc")?;
    let final_ask = decimal(xcalc, "finalTriAsk", "crl.XCalc")?;
    let formula = format!("{} × {}", leg1.source.pair, leg2.source.pair);
    log::debug!("triangulation {} -> bid {} ask {}", formula, final_bid, final_ask);

    let side = |pick: fn(&Leg) -> Decimal, result: Decimal| SideDerivation {
        formula: formula.clone(),
        components: [&leg1, &leg2]
            .iter()
            .map(|leg| LegValue {
                pair: leg.source.pair.clone(),
                value: pick(leg),
            })
            .collect(),
        result,
    };
    let bid = side(|l| l.bid, final_bid);
    let ask = side(|l| l.ask, final_ask);

    Ok(TriangulationExplanation {
        final_pair: crl.and_then(|c| c.get("ccyPair")).and_then(ParsedNode::as_text),
        method: "TRIANGULATION".to_string(),
        bid,
        ask,
        sources: vec![leg1.source, leg2.source],
    })
}

impl fmt::Display for TriangulationExplanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Triangulation ===")?;
        writeln!(f, "Final pair: {}", self.final_pair.as_deref().unwrap_or("-"))?;
        writeln!(f, "Method:     {}", self.method)?;

        for (label, side) in [("BID", &self.bid), ("ASK", &self.ask)] {
            writeln!(f, "\n{}", label)?;
            writeln!(f, "{} = {}", label, side.formula)?;
            for leg in &side.components {
                writeln!(f, "  {} {} = {}", leg.pair, label, leg.value)?;
            }
            writeln!(f, "{} = {}", label, side.result)?;
        }

        writeln!(f, "\nSources:")?;
        for source in &self.sources {
            writeln!(
                f,
                "  {} (origin {}, id {})",
                source.pair,
                source.origin.as_deref().unwrap_or("-"),
                source.id.as_deref().unwrap_or("-")
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use rust_decimal_macros::dec;

    const SYNTHETIC: &str = "SCP[id=X1, crl=CRL[ccyPair=EUR/JPY, origin=SYNTHETIC, XCalc=XCalc[\
        comp1Calc=Comp[crl=CRL[id=C1, ccyPair=EUR/USD, origin=DIRECT], traderAdjBid=1.0850, traderAdjAsk=1.0852], \
        comp2Calc=Comp[crl=CRL[id=C2, ccyPair=USD/JPY, origin=DIRECT], traderAdjBid=149.10, traderAdjAsk=149.14], \
        finalTriBid=161.77, finalTriAsk=161.84]]]";

    #[test]
    fn test_explains_both_sides() {
        let explanation = explain_triangulation(&parse(SYNTHETIC)).unwrap();
        assert_eq!(explanation.final_pair.as_deref(), Some("EUR/JPY"));
        assert_eq!(explanation.method, "TRIANGULATION");
        assert_eq!(explanation.bid.formula, "EUR/USD × USD/JPY");
        assert_eq!(explanation.bid.components[0].value, dec!(1.0850));
        assert_eq!(explanation.bid.components[1].value, dec!(149.10));
        assert_eq!(explanation.ask.components[1].pair, "USD/JPY");
        assert_eq!(explanation.bid.result, dec!(161.77));
        assert_eq!(explanation.ask.result, dec!(161.84));
        assert_eq!(explanation.sources[0].id.as_deref(), Some("C1"));
        assert_eq!(explanation.sources[1].origin.as_deref(), Some("DIRECT"));
    }

    #[test]
    fn test_direct_crl_is_not_synthetic() {
        let trace = parse("SCP[crl=CRL[ccyPair=EUR/USD, origin=DIRECT]]");
        assert_eq!(explain_triangulation(&trace).unwrap_err(), TriangulationError::NotSynthetic);
        assert_eq!(
            explain_triangulation(&parse("SCP[id=1]")).unwrap_err(),
            TriangulationError::NotSynthetic
        );
        for empty in ["XCalc=", "XCalc=null", "XCalc=F"] {
            let trace = parse(&format!("SCP[crl=CRL[ccyPair=EUR/JPY, {empty}]]"));
            assert_eq!(
                explain_triangulation(&trace).unwrap_err(),
                TriangulationError::NotSynthetic,
                "{}",
                empty
            );
        }
    }

    #[test]
    fn test_missing_leg_field_names_path() {
        let trace = parse(&SYNTHETIC.replace("traderAdjAsk=149.14", "traderAdjAsk=null"));
        assert_eq!(
            explain_triangulation(&trace).unwrap_err(),
            TriangulationError::MissingField {
                path: "crl.XCalc.comp2Calc.traderAdjAsk".to_string()
            }
        );
    }

    #[test]
    fn test_display_blocks() {
        let text = explain_triangulation(&parse(SYNTHETIC)).unwrap().to_string();
        assert!(text.contains("BID = EUR/USD × USD/JPY"));
        assert!(text.contains("ASK = 161.84"));
        assert!(text.contains("EUR/USD (origin DIRECT, id C1)"));
    }
}
