use proptest::prelude::*;
use rust_decimal::Decimal;
use spot_audit::construction::ladder::VolatilityScenario;
use spot_audit::construction::{construct, select_active_rung};
use spot_audit::explain::explain_rung;
use spot_audit::parser::{parse, parse_with_diagnostics, Atom, Fields, ParsedNode};
use spot_audit::simulation::{generate_trace, TraceConfig};

/// Scalars that render and reparse to themselves.
fn arb_atom() -> impl Strategy<Value = ParsedNode> {
    prop_oneof![
        any::<i64>().prop_map(|i| Atom::Integer(i).into()),
        (-10_000_000i64..10_000_000, 1u32..7)
            .prop_map(|(m, scale)| Atom::Decimal(Decimal::new(m, scale)).into()),
        // Exponent literals such as `3e4` parse to whole decimals.
        (-1000i64..1000, 0u32..6).prop_map(|(m, exp)| {
            let text = format!("{m}e{exp}");
            Atom::Decimal(Decimal::from_scientific(&text).unwrap()).into()
        }),
        any::<bool>().prop_map(|b| Atom::Bool(b).into()),
        Just(ParsedNode::null()),
        "[A-Z]{2}[0-9]{1,3}".prop_map(ParsedNode::str),
        (1u32..50_000_000, prop::sample::select(vec!["B", "S"])).prop_map(|(amount, side)| {
            Atom::Amount {
                amount: Decimal::from(amount),
                side: side.to_string(),
            }
            .into()
        }),
    ]
}

fn arb_fields(value: BoxedStrategy<ParsedNode>) -> impl Strategy<Value = Fields> {
    prop::collection::vec(("[a-z][a-zA-Z]{0,6}", value), 1..4)
        .prop_map(|pairs| pairs.into_iter().collect::<Fields>())
}

fn arb_block(value: BoxedStrategy<ParsedNode>) -> impl Strategy<Value = ParsedNode> {
    ("[A-Z][a-zA-Z]{0,5}", arb_fields(value)).prop_map(|(tag, fields)| ParsedNode::Block { tag, fields })
}

/// Trees shaped like real traces: blocks, maps, block lists and plain lists.
fn arb_node() -> impl Strategy<Value = ParsedNode> {
    arb_atom().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            arb_block(inner.clone()),
            arb_fields(inner.clone()).prop_map(ParsedNode::Map),
            prop::collection::vec(arb_block(inner), 0..3).prop_map(ParsedNode::Sequence),
            prop::collection::vec(arb_atom(), 0..4).prop_map(ParsedNode::Sequence),
        ]
    })
}

fn arb_trace() -> impl Strategy<Value = ParsedNode> {
    arb_block(arb_node().boxed())
}

fn arb_trace_config() -> impl Strategy<Value = TraceConfig> {
    (any::<u64>(), 1usize..10, any::<bool>(), any::<bool>()).prop_map(
        |(seed, rung_count, synthetic, decimal_comma)| TraceConfig {
            seed: Some(seed),
            rung_count,
            synthetic,
            decimal_comma,
            ..Default::default()
        },
    )
}

proptest! {
    // ===================================================================
    // INVARIANT 1: Rendering then parsing yields an equal tree.
    // ===================================================================
    #[test]
    fn render_then_parse_is_identity(tree in arb_trace()) {
        let text = tree.to_trace_text();
        let outcome = parse_with_diagnostics(&text);
        prop_assert!(outcome.is_clean(), "diagnostics for {}: {:?}", text, outcome.diagnostics);
        prop_assert_eq!(outcome.node, tree);
    }

    // ===================================================================
    // INVARIANT 2: The JSON form preserves the tree, key order included.
    // ===================================================================
    #[test]
    fn json_round_trip_preserves_tree(tree in arb_trace()) {
        let json = serde_json::to_string(&tree).unwrap();
        let back: ParsedNode = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, tree);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // ===================================================================
    // INVARIANT 3: Every constructed rung honours its minimum spread.
    // ===================================================================
    #[test]
    fn final_spread_never_below_minimum(config in arb_trace_config()) {
        let trace = parse(&generate_trace(&config));
        let doc = construct(&trace).unwrap();
        prop_assert_eq!(doc.rungs.len(), config.rung_count);
        for rung in &doc.rungs {
            let spread = rung.price_after_min_spread.spread().unwrap();
            prop_assert!(
                spread >= rung.min_spread,
                "rung {}: spread {} below minimum {}",
                rung.amt,
                spread,
                rung.min_spread
            );
        }
    }

    // ===================================================================
    // INVARIANT 4: At most one rung is active, and it is the one the
    // selection rule picks. Only that rung carries skew.
    // ===================================================================
    #[test]
    fn at_most_one_active_rung(config in arb_trace_config()) {
        let doc = construct(&parse(&generate_trace(&config))).unwrap();
        let active: Vec<_> = doc.rungs.iter().filter(|r| r.active).collect();
        prop_assert!(active.len() <= 1);

        let amounts: Vec<i64> = doc.rungs.iter().map(|r| r.amt).collect();
        let expected = doc.notional.amount.and_then(|n| select_active_rung(&amounts, n));
        prop_assert_eq!(active.first().map(|r| r.amt), expected);
        for rung in &doc.rungs {
            prop_assert_eq!(rung.price_after_skew.is_some(), rung.active);
        }
    }

    // ===================================================================
    // INVARIANT 5: Construction is deterministic, byte for byte.
    // ===================================================================
    #[test]
    fn construction_is_idempotent(config in arb_trace_config()) {
        let trace = parse(&generate_trace(&config));
        let first = serde_json::to_string(&construct(&trace).unwrap()).unwrap();
        let second = serde_json::to_string(&construct(&trace).unwrap()).unwrap();
        prop_assert_eq!(first, second);
    }

    // ===================================================================
    // INVARIANT 6: The narrative prints the engine's own numbers.
    // ===================================================================
    #[test]
    fn narrative_matches_engine(config in arb_trace_config()) {
        let doc = construct(&parse(&generate_trace(&config))).unwrap();
        for rung in &doc.rungs {
            let text = explain_rung(&doc.context, &doc.notional, rung);
            let bid_core = format!("Bid_core = {}", rung.core.bid);
            let final_bid = format!("Final Bid = {}", rung.final_price().bid);
            let final_ask = format!("Final Ask = {}", rung.final_price().ask);
            prop_assert!(text.contains(&bid_core));
            prop_assert!(text.contains(&final_bid));
            prop_assert!(text.contains(&final_ask));
            if let Some(rm) = &rung.rung_modifier {
                let bid_rm = format!("Bid_RM = {}", rung.price_after_rung_modifier.bid);
                prop_assert!(text.contains(&bid_rm));
                prop_assert!(text.contains(&rm.label));
            }
        }
    }

    // ===================================================================
    // INVARIANT 7: Generated traces survive a render round trip.
    // ===================================================================
    #[test]
    fn generated_trace_render_round_trip(config in arb_trace_config()) {
        let trace = parse(&generate_trace(&config));
        prop_assert_eq!(parse(&trace.to_trace_text()), trace);
    }

    // ===================================================================
    // INVARIANT 8: Every modifier listed for the trace's market mode is
    // applied to the rung at its position, whatever the mode letter.
    // ===================================================================
    #[test]
    fn generated_modifiers_reach_their_rungs(config in arb_trace_config()) {
        let trace = parse(&generate_trace(&config));
        let doc = construct(&trace).unwrap();
        let modes = trace.path("tmu.rungmodifiers").and_then(ParsedNode::fields).unwrap();
        let (mode, entries) = modes.iter().next().unwrap();

        let expected_scenario = match mode {
            "A" => VolatilityScenario::Active,
            "B" => VolatilityScenario::Busy,
            "F" => VolatilityScenario::Fast,
            _ => VolatilityScenario::Normal,
        };
        let listed: Vec<usize> = entries
            .as_sequence()
            .unwrap_or_default()
            .iter()
            .filter_map(|e| e.get("rung").and_then(ParsedNode::as_i64))
            .map(|r| r as usize)
            .collect();
        for (i, rung) in doc.rungs.iter().enumerate() {
            prop_assert_eq!(rung.volatility_scenario, expected_scenario);
            prop_assert_eq!(
                rung.rung_modifier.is_some(),
                listed.contains(&(i + 1)),
                "mode {} rung {}",
                mode,
                rung.amt
            );
        }
    }
}
