//! Episode controller: one slate generation, then independent lineages.
//!
//! Round 0 drafts the whole slate in a single model call; each hypothesis
//! then becomes its own lineage task. Lineages share only the immutable
//! context, the retriever, and the call-concurrency limiter. A lost lineage
//! task degrades to a reported failure, never an episode abort.

use super::{CancellationToken, EpisodeConfig, LineageRunner};
use crate::actor::{Actor, CallPolicy};
use crate::aggregate::{self, EpisodeReport};
use crate::critic::Critic;
use crate::guardrail::Guardrail;
use crate::model::{Context, LineageId, LineageOutcome, LineageStatus};
use crate::prompt::PromptAssembler;
use crate::provider::ModelProvider;
use crate::retriever::{retrieve_with_backoff, RetrievalError, Retriever};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Error)]
pub enum EpisodeError {
    /// The initial slate could not be drafted at all.
    #[error("slate generation failed: {0}")]
    Generation(String),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Config(#[from] super::ConfigError),
}

/// Owns the capabilities and drives one episode end to end.
pub struct EpisodeController {
    actor: Arc<Actor>,
    critic: Arc<Critic>,
    retriever: Arc<dyn Retriever>,
    assembler: PromptAssembler,
    config: EpisodeConfig,
    token: CancellationToken,
}

impl EpisodeController {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        retriever: Arc<dyn Retriever>,
        config: EpisodeConfig,
    ) -> Result<Self, EpisodeError> {
        Self::with_guardrail(provider, retriever, config, None)
    }

    pub fn with_guardrail(
        provider: Arc<dyn ModelProvider>,
        retriever: Arc<dyn Retriever>,
        config: EpisodeConfig,
        guardrail: Option<Arc<dyn Guardrail>>,
    ) -> Result<Self, EpisodeError> {
        config.validate()?;
        let policy = CallPolicy {
            timeout: config.call_timeout(),
            provider_retries: config.provider_retries,
            backoff: config.backoff(),
            reformat_retries: config.reformat_retries,
        };
        let assembler = PromptAssembler::new(config.passage_budget);
        let mut critic = Critic::new(
            provider.clone(),
            assembler.clone(),
            config.novelty_threshold,
            policy.clone(),
        );
        if let Some(guardrail) = guardrail {
            critic = critic.with_guardrail(guardrail);
        }
        Ok(Self {
            actor: Arc::new(Actor::new(provider, policy)),
            critic: Arc::new(critic),
            retriever,
            assembler,
            config,
            token: CancellationToken::new(),
        })
    }

    /// Handle for cooperative cancellation; safe to move to another task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Run one episode: draft the slate, run every lineage, aggregate.
    pub async fn run(&self, context: Context) -> Result<EpisodeReport, EpisodeError> {
        let context = Arc::new(context);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_calls));

        let (passages, grounded) = retrieve_with_backoff(
            self.retriever.as_ref(),
            &context.retrieval_query(),
            self.config.retrieval_k,
            self.config.retrieval_retries,
            self.config.backoff(),
        )
        .await?;

        let prompt = self
            .assembler
            .build_generate(&context, &passages, self.config.slate_size);
        let mut slate = self
            .actor
            .generate(&prompt)
            .await
            .map_err(|e| EpisodeError::Generation(e.to_string()))?;
        if slate.len() > self.config.slate_size {
            slate.truncate(self.config.slate_size);
        }
        if slate.len() < self.config.slate_size {
            tracing::warn!(
                requested = self.config.slate_size,
                drafted = slate.len(),
                "model drafted a short slate"
            );
        }
        for hypothesis in &mut slate {
            hypothesis.grounded = grounded && !passages.is_empty();
            if !hypothesis.grounded {
                // Without passages there is nothing real to cite.
                hypothesis.references.clear();
            }
        }
        tracing::info!(slate = slate.len(), grounded, "slate drafted");

        let runner = Arc::new(LineageRunner::new(
            self.actor.clone(),
            self.critic.clone(),
            self.retriever.clone(),
            self.assembler.clone(),
            self.config.clone(),
            self.token.clone(),
            semaphore,
        ));

        let slate_len = slate.len();
        let mut tasks = JoinSet::new();
        for (index, draft) in slate.into_iter().enumerate() {
            let runner = runner.clone();
            let context = context.clone();
            tasks.spawn(async move { runner.run(index, context, draft).await });
        }

        let mut outcomes: Vec<LineageOutcome> = Vec::new();
        let mut lost = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(error = %e, "lineage task lost");
                    lost.push(e.to_string());
                }
            }
        }
        if !lost.is_empty() {
            // A lost task's index is recovered as the gap it left in the
            // slate, so failure reports name real slate positions.
            let seen: HashSet<usize> = outcomes.iter().map(|o| o.index).collect();
            let missing = (0..slate_len).filter(|index| !seen.contains(index));
            for (index, error) in missing.zip(lost) {
                outcomes.push(LineageOutcome {
                    lineage_id: LineageId::new(),
                    index,
                    status: LineageStatus::Failed,
                    attempts: Vec::new(),
                    failure: Some(format!("lineage task lost: {}", error)),
                });
            }
        }

        Ok(aggregate::collect(&outcomes))
    }
}
