//! Critic — scores hypotheses and decides acceptance.
//!
//! The model supplies the verdict fields (novelty, gaps, flags); acceptance
//! itself is computed here by policy and never trusted from model output.
//! Order of precedence for rejection: guardrail block, biohazard flag,
//! novelty below threshold.

use crate::actor::CallPolicy;
use crate::guardrail::Guardrail;
use crate::model::{Context, Critique, Decision, Flag, Hypothesis, RejectReason};
use crate::prompt::PromptAssembler;
use crate::provider::{complete_with_retry, CompletionOptions, ModelProvider, ProviderError};
use crate::retriever::RetrievedPassage;
use crate::structured;
use std::sync::Arc;
use thiserror::Error;

/// Errors from the evaluation step. Callers treat every variant as a
/// fail-closed rejection of the round, never an acceptance.
#[derive(Debug, Error)]
pub enum CriticError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Verdict stayed malformed through the reformat budget.
    #[error("evaluation failed: {0}")]
    EvaluationFailure(String),
}

/// A critique plus the policy decision derived from it.
#[derive(Debug, Clone)]
pub struct CriticVerdict {
    pub critique: Critique,
    pub decision: Decision,
}

/// Scores hypotheses via the injected model capability and an optional
/// safety boundary.
pub struct Critic {
    provider: Arc<dyn ModelProvider>,
    assembler: PromptAssembler,
    guardrail: Option<Arc<dyn Guardrail>>,
    novelty_threshold: u8,
    policy: CallPolicy,
}

impl Critic {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        assembler: PromptAssembler,
        novelty_threshold: u8,
        policy: CallPolicy,
    ) -> Self {
        Self {
            provider,
            assembler,
            guardrail: None,
            novelty_threshold,
            policy,
        }
    }

    pub fn with_guardrail(mut self, guardrail: Arc<dyn Guardrail>) -> Self {
        self.guardrail = Some(guardrail);
        self
    }

    /// Evaluate one hypothesis against the context and fresh passages.
    pub async fn evaluate(
        &self,
        context: &Context,
        hypothesis: &Hypothesis,
        passages: &[RetrievedPassage],
    ) -> Result<CriticVerdict, CriticError> {
        // The guardrail sees the hypothesis text itself, not the critique.
        if let Some(guardrail) = &self.guardrail {
            let subject = format!(
                "{}\n{}",
                hypothesis.short_description, hypothesis.long_description
            );
            let verdict = guardrail.check(&subject).await;
            if !verdict.allowed {
                let reason = verdict
                    .reason
                    .unwrap_or_else(|| "content blocked".to_string());
                tracing::warn!(%reason, "guardrail blocked hypothesis");
                let critique = Critique {
                    novelty: 1,
                    not_novel: String::new(),
                    missing: String::new(),
                    superfluous: String::new(),
                    anomaly: Flag::clear(),
                    biohazard: Flag::raise(reason),
                    references: Vec::new(),
                    relation_to_literature: String::new(),
                    accept: false,
                };
                return Ok(CriticVerdict {
                    critique,
                    decision: Decision::Reject(RejectReason::GuardrailBlocked),
                });
            }
        }

        let draft = self.request_verdict(context, hypothesis, passages).await?;

        let decision = if draft.biohazard.raised {
            Decision::Reject(RejectReason::Biohazard)
        } else if draft.novelty < self.novelty_threshold {
            Decision::Reject(RejectReason::BelowThreshold)
        } else {
            Decision::Accept
        };
        let critique = Critique::from_draft(draft, decision.is_accept());
        Ok(CriticVerdict { critique, decision })
    }

    async fn request_verdict(
        &self,
        context: &Context,
        hypothesis: &Hypothesis,
        passages: &[RetrievedPassage],
    ) -> Result<crate::model::CritiqueDraft, CriticError> {
        let prompt = self.assembler.build_critique(context, passages, hypothesis);
        let options = CompletionOptions::default();

        let mut current_prompt = prompt.clone();
        let mut last_error = None;
        for attempt in 0..=self.policy.reformat_retries {
            let text = complete_with_retry(
                self.provider.as_ref(),
                &current_prompt,
                &options,
                self.policy.timeout,
                self.policy.provider_retries,
                self.policy.backoff,
            )
            .await?;

            match structured::parse_critique(&text) {
                Ok(draft) => return Ok(draft),
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "critique parse failed");
                    current_prompt = format!(
                        "{}\n\nYour previous reply could not be parsed: {}.\n\
                         Respond again with ONLY the JSON object described above.",
                        prompt, e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(CriticError::EvaluationFailure(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no parse attempt recorded".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guardrail::BlocklistGuardrail;
    use crate::model::{Direction, GeneSignal};
    use crate::provider::ScriptedProvider;
    use std::time::Duration;

    fn verdict_json(novelty: u8, biohazard: bool) -> String {
        format!(
            r#"{{
                "novelty": {},
                "not_novel": "prior art", "missing": "dosing", "superfluous": "none",
                "anomaly": {{"raised": false, "reason": ""}},
                "biohazard": {{"raised": {}, "reason": "{}"}},
                "references": ["PMID:1"], "relation_to_literature": "extends"
            }}"#,
            novelty,
            biohazard,
            if biohazard { "restricted method" } else { "" }
        )
    }

    fn context() -> Context {
        Context::new(
            vec![GeneSignal::new("TP53", Direction::Down)],
            "triple negative breast cancer",
            "cisplatin resistance",
        )
    }

    fn hypothesis(short: &str) -> Hypothesis {
        Hypothesis {
            short_description: short.to_string(),
            long_description: format!("{} in detail", short),
            novelty: 5,
            not_novel: String::new(),
            missing: String::new(),
            superfluous: String::new(),
            anomaly: Flag::clear(),
            biohazard: Flag::clear(),
            references: Vec::new(),
            relation_to_literature: String::new(),
            grounded: true,
        }
    }

    fn quick_policy() -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_secs(5),
            provider_retries: 0,
            backoff: Duration::from_millis(1),
            reformat_retries: 1,
        }
    }

    fn critic(provider: ScriptedProvider) -> Critic {
        Critic::new(
            Arc::new(provider),
            PromptAssembler::new(4000),
            7,
            quick_policy(),
        )
    }

    // === Scenario: novelty at or above threshold accepts ===

    #[tokio::test]
    async fn accepts_at_threshold() {
        let c = critic(ScriptedProvider::new().with_response(&verdict_json(7, false)));
        let verdict = c.evaluate(&context(), &hypothesis("h"), &[]).await.unwrap();
        assert!(verdict.decision.is_accept());
        assert!(verdict.critique.accept);
    }

    // === Scenario: novelty below threshold rejects ===

    #[tokio::test]
    async fn rejects_below_threshold() {
        let c = critic(ScriptedProvider::new().with_response(&verdict_json(6, false)));
        let verdict = c.evaluate(&context(), &hypothesis("h"), &[]).await.unwrap();
        assert_eq!(
            verdict.decision,
            Decision::Reject(RejectReason::BelowThreshold)
        );
        assert!(!verdict.critique.accept);
    }

    // === Scenario: biohazard flag overrides a passing score ===

    #[tokio::test]
    async fn biohazard_is_never_accepted() {
        let c = critic(ScriptedProvider::new().with_response(&verdict_json(10, true)));
        let verdict = c.evaluate(&context(), &hypothesis("h"), &[]).await.unwrap();
        assert_eq!(verdict.decision, Decision::Reject(RejectReason::Biohazard));
        assert!(verdict.critique.biohazard.raised);
    }

    // === Scenario: guardrail block short-circuits the model call ===

    #[tokio::test]
    async fn guardrail_block_forces_rejection() {
        let provider = ScriptedProvider::new(); // no scripted responses: must not be called
        let c = critic(provider).with_guardrail(Arc::new(BlocklistGuardrail::new(vec![
            "aerosolized".to_string(),
        ])));
        let verdict = c
            .evaluate(&context(), &hypothesis("aerosolized delivery"), &[])
            .await
            .unwrap();
        assert_eq!(
            verdict.decision,
            Decision::Reject(RejectReason::GuardrailBlocked)
        );
        assert!(verdict.critique.biohazard.raised);
    }

    // === Scenario: unparsable verdict fails closed ===

    #[tokio::test]
    async fn malformed_verdict_is_evaluation_failure() {
        let c = critic(
            ScriptedProvider::new()
                .with_response("prose")
                .with_response("still prose"),
        );
        let err = c
            .evaluate(&context(), &hypothesis("h"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CriticError::EvaluationFailure(_)));
    }

    // === Scenario: one reformat retry recovers a malformed verdict ===

    #[tokio::test]
    async fn reformat_retry_recovers_verdict() {
        let c = critic(
            ScriptedProvider::new()
                .with_response("prose")
                .with_response(&verdict_json(8, false)),
        );
        let verdict = c.evaluate(&context(), &hypothesis("h"), &[]).await.unwrap();
        assert!(verdict.decision.is_accept());
    }
}
