//! Core data model: research context, hypotheses, critiques, attempts.
//!
//! Everything the reflexion loop passes between components lives here.
//! The loop controller owns the only mutable collections (attempt
//! histories); the types themselves are plain values.

mod attempt;
mod context;
mod hypothesis;

pub use attempt::{Attempt, Decision, LineageId, LineageOutcome, LineageStatus, RejectReason};
pub use context::{Context, Direction, GeneSignal};
pub use hypothesis::{Critique, CritiqueDraft, Flag, Hypothesis};
