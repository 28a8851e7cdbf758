//! Per-lineage reflexion loop: critique, decide, revise, repeat.
//!
//! A lineage starts from one hypothesis of the round-0 slate and runs
//! independently of its siblings. Rounds are indexed from 0; after a
//! rejection on round r, the lineage revises only while r + 1 < max_rounds,
//! so each lineage gets exactly max_rounds drafting cycles.

use super::{CancellationToken, EpisodeConfig};
use crate::actor::Actor;
use crate::critic::{Critic, CriticVerdict};
use crate::model::{
    Attempt, Context, Critique, Decision, Hypothesis, LineageId, LineageOutcome, LineageStatus,
    RejectReason,
};
use crate::prompt::PromptAssembler;
use crate::retriever::{retrieve_with_backoff, RetrievedPassage, Retriever};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Runs one lineage to its terminal state.
pub struct LineageRunner {
    actor: Arc<Actor>,
    critic: Arc<Critic>,
    retriever: Arc<dyn Retriever>,
    assembler: PromptAssembler,
    config: EpisodeConfig,
    token: CancellationToken,
    /// Shared ceiling on concurrent model calls across lineages.
    semaphore: Arc<Semaphore>,
}

impl LineageRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        actor: Arc<Actor>,
        critic: Arc<Critic>,
        retriever: Arc<dyn Retriever>,
        assembler: PromptAssembler,
        config: EpisodeConfig,
        token: CancellationToken,
        semaphore: Arc<Semaphore>,
    ) -> Self {
        Self {
            actor,
            critic,
            retriever,
            assembler,
            config,
            token,
            semaphore,
        }
    }

    /// Drive the loop from an initial draft to a terminal outcome.
    ///
    /// `index` is the lineage's creation order within the episode and is
    /// carried through to the aggregator.
    pub async fn run(&self, index: usize, context: Arc<Context>, initial: Hypothesis) -> LineageOutcome {
        let lineage_id = LineageId::new();
        let mut attempts: Vec<Attempt> = Vec::new();
        let mut current = initial;

        for round in 0..self.config.max_rounds {
            if self.token.is_cancelled() {
                tracing::info!(%lineage_id, round, "cancelled before critique");
                if attempts.is_empty() {
                    return self.failed(
                        lineage_id,
                        index,
                        attempts,
                        "cancelled before any attempt".to_string(),
                    );
                }
                return self.exhausted(lineage_id, index, attempts);
            }

            // Fresh retrieval per round, keyed on the hypothesis itself so the
            // critique is grounded against what the draft actually claims.
            // A blank short description ("none" and "" are legal field
            // values) falls back to the context query.
            let query = if current.short_description.trim().is_empty() {
                context.retrieval_query()
            } else {
                current.short_description.clone()
            };
            let passages = match self.retrieve(&query).await {
                Ok(passages) => passages,
                Err(failure) => return self.failed(lineage_id, index, attempts, failure),
            };

            let verdict = match self.critique(&context, &current, &passages).await {
                Some(verdict) => verdict,
                None => return self.exhausted(lineage_id, index, attempts),
            };

            let annotated = current.annotated(&verdict.critique);
            let accepted = verdict.decision.is_accept();
            tracing::info!(
                %lineage_id,
                round,
                novelty = verdict.critique.novelty,
                decision = %decision_label(&verdict.decision),
                "round complete"
            );
            attempts.push(Attempt::new(round, annotated, verdict.critique, verdict.decision));

            if accepted {
                return LineageOutcome {
                    lineage_id,
                    index,
                    status: LineageStatus::Accepted,
                    attempts,
                    failure: None,
                };
            }

            if round + 1 >= self.config.max_rounds {
                break;
            }
            if self.token.is_cancelled() {
                tracing::info!(%lineage_id, round, "cancelled before revision");
                break;
            }

            match self.revise(&context, &passages, &attempts).await {
                Ok(revised) => current = revised,
                Err(failure) => return self.failed(lineage_id, index, attempts, failure),
            }
        }

        self.exhausted(lineage_id, index, attempts)
    }

    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedPassage>, String> {
        let (passages, grounded) = retrieve_with_backoff(
            self.retriever.as_ref(),
            query,
            self.config.retrieval_k,
            self.config.retrieval_retries,
            self.config.backoff(),
        )
        .await
        .map_err(|e| e.to_string())?;
        if !grounded {
            tracing::warn!("proceeding without literature grounding");
        }
        Ok(passages)
    }

    /// Evaluate under the shared concurrency permit. Evaluation failures
    /// fail closed: the verdict becomes a forced rejection, never an error.
    async fn critique(
        &self,
        context: &Context,
        hypothesis: &Hypothesis,
        passages: &[RetrievedPassage],
    ) -> Option<CriticVerdict> {
        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => return None,
        };
        match self.critic.evaluate(context, hypothesis, passages).await {
            Ok(verdict) => Some(verdict),
            Err(e) => {
                tracing::warn!(error = %e, "critique failed, rejecting round");
                Some(CriticVerdict {
                    critique: Critique::evaluation_failed(e.to_string()),
                    decision: Decision::Reject(RejectReason::EvaluationFailed),
                })
            }
        }
    }

    async fn revise(
        &self,
        context: &Context,
        passages: &[RetrievedPassage],
        history: &[Attempt],
    ) -> Result<Hypothesis, String> {
        let prompt = self.assembler.build_revise(context, passages, history);
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| "concurrency limiter closed".to_string())?;
        let slate = self
            .actor
            .generate(&prompt)
            .await
            .map_err(|e| e.to_string())?;
        let mut revised = slate
            .into_iter()
            .next()
            .ok_or_else(|| "revision produced an empty slate".to_string())?;
        revised.grounded = !passages.is_empty();
        if !revised.grounded {
            revised.references.clear();
        }
        Ok(revised)
    }

    fn exhausted(
        &self,
        lineage_id: LineageId,
        index: usize,
        attempts: Vec<Attempt>,
    ) -> LineageOutcome {
        LineageOutcome {
            lineage_id,
            index,
            status: LineageStatus::Exhausted,
            attempts,
            failure: None,
        }
    }

    fn failed(
        &self,
        lineage_id: LineageId,
        index: usize,
        attempts: Vec<Attempt>,
        failure: String,
    ) -> LineageOutcome {
        tracing::warn!(%lineage_id, %failure, "lineage failed");
        LineageOutcome {
            lineage_id,
            index,
            status: LineageStatus::Failed,
            attempts,
            failure: Some(failure),
        }
    }
}

fn decision_label(decision: &Decision) -> String {
    match decision {
        Decision::Accept => "accept".to_string(),
        Decision::Reject(reason) => format!("reject: {}", reason),
    }
}
