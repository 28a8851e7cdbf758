//! hypoforge — iterative hypothesis generation with self-critique.
//!
//! Takes the gene-level output of a statistical model (a list of genes with
//! regulation directions, a disease, a target variable) and produces a slate
//! of literature-grounded hypotheses. An Actor drafts, a Critic scores and
//! flags, and each hypothesis is revised under a bounded retry budget before
//! the results are aggregated into a tabular report.
//!
//! # Core Concepts
//!
//! - **Slate**: the batch of hypotheses drafted in round 0
//! - **Lineage**: one hypothesis and its chain of revisions
//! - **Attempt**: one draft→critique→decision cycle, immutable once recorded
//!
//! The model and retrieval backends are capabilities behind traits
//! ([`provider::ModelProvider`], [`retriever::Retriever`]); production
//! implementations are feature-gated (`openai`, `embeddings`) and tests run
//! against the in-crate mocks.

pub mod actor;
pub mod aggregate;
pub mod critic;
pub mod episode;
pub mod guardrail;
pub mod model;
pub mod prompt;
pub mod provider;
pub mod retriever;
pub mod structured;

pub use actor::{Actor, ActorError, CallPolicy};
pub use aggregate::{EpisodeReport, HypothesisRecord};
pub use critic::{Critic, CriticError, CriticVerdict};
pub use episode::{
    CancellationToken, EpisodeConfig, EpisodeController, EpisodeError, LineageRunner,
};
pub use guardrail::{Guardrail, Verdict};
pub use model::{
    Attempt, Context, Critique, Decision, Direction, GeneSignal, Hypothesis, LineageId,
    LineageOutcome, LineageStatus, RejectReason,
};
pub use prompt::PromptAssembler;
pub use provider::{CompletionOptions, ModelProvider, ProviderError};
pub use retriever::{CorpusSnapshot, RetrievedPassage, Retriever};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
