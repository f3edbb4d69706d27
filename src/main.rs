//! spot-audit CLI
//!
//! Parse SCP traces and explain how their spot prices were built.
//!
//! # Usage
//!
//! ```bash
//! # Parse a raw trace to JSON
//! spot-audit parse --input trace.txt
//!
//! # Rebuild every rung and store the result
//! spot-audit construct --input trace.txt --save
//!
//! # Step-by-step narrative for the active rung
//! spot-audit explain --input trace.txt
//!
//! # Generate a random synthetic-cross trace
//! spot-audit generate --rungs 6 --synthetic --seed 7
//! ```

use spot_audit::config::AuditConfig;
use spot_audit::construction::{SpotConstructor, SpotDocument};
use spot_audit::explain::{explain_rung, explain_triangulation, LadderOverview};
use spot_audit::parser::{parse_with_diagnostics, ParsedNode};
use spot_audit::simulation::{generate_trace, TraceConfig};
use spot_audit::store::{import_trace, ArtifactStore, FsArtifactStore};
use std::fs;
use std::path::PathBuf;
use std::process;

fn print_usage() {
    eprintln!(
        r#"spot-audit — SCP trace parser and FX spot construction auditor

USAGE:
    spot-audit <COMMAND> [OPTIONS]

COMMANDS:
    parse        Parse a trace and print its JSON tree
    import       Store a raw trace (raw + parsed) under its id
    construct    Rebuild the price of every rung
    explain      Step-by-step narrative for one rung
    triangulate  Explain a synthetic cross from its two legs
    crl          Show every CRL ladder with the active rung marked
    generate     Generate a random SCP trace (for testing)
    help         Show this message

OPTIONS:
    --input <FILE>      Raw trace (.txt) or parsed JSON (.json)
    --format <FORMAT>   Output format: text (default) or json
    --config <FILE>     JSON configuration file
    --store <DIR>       Artifact store root (import, construct --save)
    --save              Persist the construction (construct)
    --amount <N>        Rung to explain instead of the active one (explain)

OPTIONS (generate):
    --rungs <N>         Number of CRL rungs (default: 4)
    --synthetic         Emit a cross triangulated from two legs
    --seed <N>          Seed for reproducible output
    --output <FILE>     Write to file instead of stdout

ENVIRONMENT:
    RUST_LOG                Log filter (default: warn)
    SPOT_AUDIT_STORE        Overrides the store root
    SPOT_AUDIT_TRACE_TAG    Expected root tag, or * for any

EXAMPLES:
    spot-audit parse --input trace.txt
    spot-audit import --input trace.txt --store resources/scp
    spot-audit construct --input trace.txt --format json --save
    spot-audit explain --input trace.txt --amount 5000000
    spot-audit triangulate --input cross.txt
    spot-audit generate --rungs 6 --synthetic --seed 7 --output cross.txt"#
    );
}

#[derive(Default)]
struct Options {
    input: Option<String>,
    format: String,
    config: Option<String>,
    store: Option<String>,
    save: bool,
    amount: Option<i64>,
    rungs: Option<usize>,
    synthetic: bool,
    seed: Option<u64>,
    output: Option<String>,
}

fn value<'a>(args: &'a [String], i: usize, flag: &str, what: &str) -> &'a str {
    args.get(i).map(String::as_str).unwrap_or_else(|| {
        eprintln!("{} requires {}", flag, what);
        process::exit(1);
    })
}

fn number<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    value(args, i, flag, "a number").parse().unwrap_or_else(|_| {
        eprintln!("{} requires a number", flag);
        process::exit(1);
    })
}

fn parse_options(args: &[String]) -> Options {
    let mut opts = Options {
        format: "text".to_string(),
        ..Default::default()
    };
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                opts.input = Some(value(args, i, "--input", "a file path").to_string());
            }
            "--format" => {
                i += 1;
                opts.format = value(args, i, "--format", "'text' or 'json'").to_string();
            }
            "--config" => {
                i += 1;
                opts.config = Some(value(args, i, "--config", "a file path").to_string());
            }
            "--store" => {
                i += 1;
                opts.store = Some(value(args, i, "--store", "a directory").to_string());
            }
            "--output" => {
                i += 1;
                opts.output = Some(value(args, i, "--output", "a file path").to_string());
            }
            "--amount" => {
                i += 1;
                opts.amount = Some(number(args, i, "--amount"));
            }
            "--rungs" => {
                i += 1;
                opts.rungs = Some(number(args, i, "--rungs"));
            }
            "--seed" => {
                i += 1;
                opts.seed = Some(number(args, i, "--seed"));
            }
            "--save" => opts.save = true,
            "--synthetic" => opts.synthetic = true,
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }
    if opts.format != "text" && opts.format != "json" {
        eprintln!("--format requires 'text' or 'json'");
        process::exit(1);
    }
    opts
}

fn load_config(opts: &Options) -> AuditConfig {
    let config = match &opts.config {
        Some(path) => AuditConfig::from_file(path).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            process::exit(1);
        }),
        None => AuditConfig::default(),
    };
    let mut config = config.with_env_overrides();
    if let Some(store) = &opts.store {
        config.store_root = PathBuf::from(store);
    }
    config
}

fn require_input(opts: &Options) -> &str {
    opts.input.as_deref().unwrap_or_else(|| {
        eprintln!("Error: --input <FILE> is required");
        process::exit(1);
    })
}

fn read_file(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file '{}': {}", path, e);
        process::exit(1);
    })
}

/// Parsed trace from `--input`: persisted JSON is loaded as is, raw text is
/// parsed with its diagnostics reported on stderr.
fn load_trace(opts: &Options) -> ParsedNode {
    let path = require_input(opts);
    let content = read_file(path);
    if path.ends_with(".json") {
        return serde_json::from_str(&content).unwrap_or_else(|e| {
            eprintln!("Error parsing JSON trace '{}': {}", path, e);
            process::exit(1);
        });
    }
    let outcome = parse_with_diagnostics(&content);
    for d in &outcome.diagnostics {
        eprintln!("warning: {}", d);
    }
    outcome.node
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error serializing output: {}", e);
        process::exit(1);
    })
}

fn build(trace: &ParsedNode, config: &AuditConfig) -> SpotDocument {
    SpotConstructor::new(config).construct(trace).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    })
}

fn cmd_parse(args: &[String]) {
    let opts = parse_options(args);
    let trace = load_trace(&opts);
    println!("{}", to_json(&trace));
}

fn cmd_import(args: &[String]) {
    let opts = parse_options(args);
    let config = load_config(&opts);
    let path = require_input(&opts);
    if path.ends_with(".json") {
        eprintln!("Error: import expects a raw .txt trace");
        process::exit(1);
    }
    let text = read_file(path);
    let store = FsArtifactStore::new(config.store_root.clone());
    let outcome = import_trace(&store, &text).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });
    if outcome.duplicate {
        println!("Trace {} already imported; using the stored copy.", outcome.trace_id);
    } else {
        println!(
            "Imported trace {} → {}",
            outcome.trace_id,
            store.raw_path(&outcome.trace_id).display()
        );
    }
}

fn cmd_construct(args: &[String]) {
    let opts = parse_options(args);
    let config = load_config(&opts);
    let trace = load_trace(&opts);
    let doc = build(&trace, &config);

    if opts.format == "json" {
        println!("{}", to_json(&doc));
    } else {
        println!("{}", doc);
    }

    if opts.save {
        let Some(trace_id) = trace.get("id").and_then(ParsedNode::as_text) else {
            eprintln!("Error: trace has no `id` field, cannot save");
            process::exit(1);
        };
        let store = FsArtifactStore::new(config.store_root.clone());
        store.save_construction(&trace_id, &doc).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            process::exit(1);
        });
        eprintln!("Saved construction → {}", store.construction_path(&trace_id).display());
    }
}

fn cmd_explain(args: &[String]) {
    let opts = parse_options(args);
    let config = load_config(&opts);
    let trace = load_trace(&opts);
    let doc = build(&trace, &config);

    let rung = match opts.amount {
        Some(amt) => doc.rung(amt).unwrap_or_else(|| {
            eprintln!("Error: no rung with amount {}", amt);
            process::exit(1);
        }),
        None => doc.active_rung().unwrap_or_else(|| {
            eprintln!("Error: no active rung for this notional; pass --amount <N>");
            process::exit(1);
        }),
    };
    println!("{}", explain_rung(&doc.context, &doc.notional, rung));
}

fn cmd_triangulate(args: &[String]) {
    let opts = parse_options(args);
    let trace = load_trace(&opts);
    let explanation = explain_triangulation(&trace).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });
    if opts.format == "json" {
        println!("{}", to_json(&explanation));
    } else {
        print!("{}", explanation);
    }
}

fn cmd_crl(args: &[String]) {
    let opts = parse_options(args);
    let config = load_config(&opts);
    let trace = load_trace(&opts);
    let overview = LadderOverview::build(&trace, &config);
    if overview.ladders.is_empty() {
        println!("No CRL found in trace.");
    } else if opts.format == "json" {
        println!("{}", to_json(&overview));
    } else {
        print!("{}", overview);
    }
}

fn cmd_generate(args: &[String]) {
    let opts = parse_options(args);
    let defaults = TraceConfig::default();
    let config = TraceConfig {
        rung_count: opts.rungs.unwrap_or(defaults.rung_count),
        synthetic: opts.synthetic,
        seed: opts.seed,
        ..defaults
    };
    let trace = generate_trace(&config);

    if let Some(path) = opts.output {
        fs::write(&path, &trace).unwrap_or_else(|e| {
            eprintln!("Error writing to '{}': {}", path, e);
            process::exit(1);
        });
        eprintln!("Generated {}-rung trace → {}", config.rung_count, path);
    } else {
        println!("{}", trace);
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "parse" => cmd_parse(rest),
        "import" => cmd_import(rest),
        "construct" => cmd_construct(rest),
        "explain" => cmd_explain(rest),
        "triangulate" => cmd_triangulate(rest),
        "crl" => cmd_crl(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
