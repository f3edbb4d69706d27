//! Spot construction: re-derives every rung's price from a parsed trace.

pub mod engine;
pub mod ladder;
pub mod rung;
pub mod selection;

pub use engine::{construct, InvalidTraceError, SpotConstructor, SpotDocument};
pub use rung::{Price, Rung};
pub use selection::{select_active_rung, ClientNotional};
