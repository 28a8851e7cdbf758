//! Attempt history and lineage outcomes.
//!
//! An `Attempt` is one Actor→Critic cycle, immutable once recorded. The
//! loop controller appends attempts in strict round order; that history is
//! the lineage's episodic memory and feeds every revision prompt.

use super::hypothesis::{Critique, Hypothesis};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier for one hypothesis lineage within an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineageId(Uuid);

impl LineageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LineageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LineageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a round was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Novelty score below the acceptance threshold.
    BelowThreshold,
    /// Biohazard flag raised — never auto-accepted, surfaced to the operator.
    Biohazard,
    /// The safety boundary refused the content.
    GuardrailBlocked,
    /// The critic produced no parsable verdict; fail-closed.
    EvaluationFailed,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowThreshold => write!(f, "novelty below threshold"),
            Self::Biohazard => write!(f, "biohazard flagged"),
            Self::GuardrailBlocked => write!(f, "guardrail blocked"),
            Self::EvaluationFailed => write!(f, "evaluation failed"),
        }
    }
}

/// Accept/reject decision for one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Accept,
    Reject(RejectReason),
}

impl Decision {
    pub fn is_accept(&self) -> bool {
        matches!(self, Decision::Accept)
    }
}

/// One Actor→Critic cycle for a lineage. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    /// Round index, starting at 0, strictly increasing with no gaps.
    pub round: u32,
    /// The hypothesis as annotated by the critic.
    pub hypothesis: Hypothesis,
    pub critique: Critique,
    pub decision: Decision,
    pub recorded_at: DateTime<Utc>,
}

impl Attempt {
    pub fn new(round: u32, hypothesis: Hypothesis, critique: Critique, decision: Decision) -> Self {
        Self {
            round,
            hypothesis,
            critique,
            decision,
            recorded_at: Utc::now(),
        }
    }
}

/// Terminal state of a lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineageStatus {
    /// The critic accepted a round.
    Accepted,
    /// Retry budget spent (or episode cancelled); best attempt surfaced.
    Exhausted,
    /// Generation failed persistently; no emittable hypothesis.
    Failed,
}

impl fmt::Display for LineageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A lineage's terminal record: full attempt history plus its status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageOutcome {
    pub lineage_id: LineageId,
    /// Creation order within the episode. The aggregator restores output
    /// order from this, regardless of completion order.
    pub index: usize,
    pub status: LineageStatus,
    pub attempts: Vec<Attempt>,
    /// Failure description for `Failed` lineages.
    pub failure: Option<String>,
}

impl LineageOutcome {
    /// The attempt this lineage emits, if any.
    ///
    /// `Accepted` emits its final (accepted) attempt. `Exhausted` emits the
    /// best-scoring attempt — highest novelty, ties broken by earliest
    /// round. `Failed` emits nothing.
    pub fn emitted(&self) -> Option<&Attempt> {
        match self.status {
            LineageStatus::Accepted => self.attempts.last(),
            LineageStatus::Exhausted => self.best_attempt(),
            LineageStatus::Failed => None,
        }
    }

    /// Highest-novelty attempt; earliest round wins ties.
    pub fn best_attempt(&self) -> Option<&Attempt> {
        let mut best: Option<&Attempt> = None;
        for attempt in &self.attempts {
            match best {
                None => best = Some(attempt),
                Some(b) if attempt.critique.novelty > b.critique.novelty => best = Some(attempt),
                _ => {}
            }
        }
        best
    }

    pub fn fully_accepted(&self) -> bool {
        self.status == LineageStatus::Accepted
    }
}
