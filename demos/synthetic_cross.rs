//! Synthetic cross example.
//!
//! Generates a EUR/JPY trace triangulated from EUR/USD and USD/JPY, then
//! shows the ladders involved and how the cross was derived.

use spot_audit::config::AuditConfig;
use spot_audit::explain::{explain_triangulation, LadderOverview};
use spot_audit::parser::parse;
use spot_audit::simulation::{generate_trace, TraceConfig};

fn main() {
    println!("╔══════════════════════════════════════════╗");
    println!("║  spot-audit: Synthetic Cross Example     ║");
    println!("╚══════════════════════════════════════════╝\n");

    let text = generate_trace(&TraceConfig {
        rung_count: 5,
        synthetic: true,
        seed: Some(7),
        ..Default::default()
    });
    let trace = parse(&text);

    println!("{}", LadderOverview::build(&trace, &AuditConfig::default()));

    match explain_triangulation(&trace) {
        Ok(explanation) => println!("{}", explanation),
        Err(e) => eprintln!("cannot triangulate: {}", e),
    }
}
