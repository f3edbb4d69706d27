//! Audit of a direct EUR/USD trace.
//!
//! Parses a trace as the pricer logs it, rebuilds every rung and prints the
//! step-by-step narrative for the rung that priced the client.

use spot_audit::construction::construct;
use spot_audit::explain::explain_rung;
use spot_audit::parser::parse_with_diagnostics;

const TRACE: &str = "SCP[id=SCP-DEMO-1, key=Key[ccyPair=EUR/USD, venue=EBS, prcModel=TIERED, venueClientId=CLI0042, notional=3000000:S],
 crl=CRL[id=CRL-881, ccyPair=EUR/USD, origin=DIRECT, rungs=[Rung[amt=1000000, bidPrice=1,08480, askPrice=1,08500],
 Rung[amt=5000000, bidPrice=1,08470, askPrice=1,08510], Rung[amt=10000000, bidPrice=1,08460, askPrice=1,08520]]],
 tom=TOM[mktMode=N, rungs=[Rung[amt=5000000, bidSpread=-0,00003, askSpread=0,00001, minSpread=0,00060]]],
 tmu=TMU[package=GOLD, rungmodifiers={N=[RM[rung=2, type=MULTIPLY, value=1,2]]}],
 clientPrc=[CP[SCalc=PPM[crlAmt=5000000, aAutoSkew=F]]]]";

fn main() {
    println!("╔══════════════════════════════════════════╗");
    println!("║  spot-audit: Direct Trace Audit Example  ║");
    println!("╚══════════════════════════════════════════╝\n");

    let outcome = parse_with_diagnostics(TRACE);
    for d in &outcome.diagnostics {
        println!("warning: {}", d);
    }

    let doc = match construct(&outcome.node) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("cannot construct: {}", e);
            return;
        }
    };
    println!("{}", doc);

    match doc.active_rung() {
        Some(rung) => {
            println!("━━━ Narrative for rung {} ━━━\n", rung.amt);
            println!("{}", explain_rung(&doc.context, &doc.notional, rung));
        }
        None => println!("No rung covers the client notional."),
    }
}
