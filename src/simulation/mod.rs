//! Synthetic inputs for benches, property tests and the `generate` command.

pub mod trace_gen;

pub use trace_gen::{generate_trace, TraceConfig};
