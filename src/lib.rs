//! # spot-audit
//!
//! Reconstructs how an FX spot price quoted to a client was derived from a
//! single SCP trace emitted by the upstream pricer.
//!
//! Given the raw bracketed trace text, the crate parses it into a generic
//! tree, replays the pricing chain rung by rung (core → TOM → rung modifier
//! → min spread → skew) and explains each step.
//!
//! ## Architecture
//!
//! - **parser**: SCP bracket grammar into an ordered tree, and back
//! - **construction**: Spot construction engine and rung selection
//! - **explain**: Audit narrative, triangulation and CRL ladder overview
//! - **store**: Persistence of raw, parsed and constructed artifacts
//! - **config**: Runtime settings with file and environment overrides
//! - **simulation**: Random trace generation

pub mod config;
pub mod construction;
pub mod explain;
pub mod parser;
pub mod simulation;
pub mod store;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::AuditConfig;
    pub use crate::construction::{construct, InvalidTraceError, Price, Rung, SpotConstructor, SpotDocument};
    pub use crate::explain::{explain_rung, explain_triangulation, LadderOverview};
    pub use crate::parser::{parse, parse_with_diagnostics, ParsedNode};
    pub use crate::store::{import_trace, ArtifactStore, FsArtifactStore};
}
