//! Human-readable explanations over parsed traces and constructed rungs.

pub mod audit;
pub mod crl;
pub mod triangulation;

pub use audit::{explain_rung, AuditNarrative};
pub use crl::{all_ladders, LadderOverview};
pub use triangulation::{explain_triangulation, TriangulationError, TriangulationExplanation};
