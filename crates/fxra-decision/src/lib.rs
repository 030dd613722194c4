//! Deterministic decision core: indicator scoring, reason codes and the
//! action policy. Everything here is pure and does no logging.

pub mod indicators;
pub mod policy;
pub mod reason_codes;
pub mod scoring;

pub use indicators::{IndicatorBag, IndicatorValue};
pub use policy::{clamp_confidence, decide_action};
pub use reason_codes::build_reason_codes;
pub use scoring::{calculate_scores, DecisionScores};
