//! Prompt assembly for generation, critique, and revision.
//!
//! A pure function of its inputs: the same context, passages, and history
//! always produce the same prompt text. Retrieved passages are budgeted by
//! total character count, dropping the lowest-similarity passages first.

use crate::model::{Attempt, Context, Hypothesis};
use crate::retriever::RetrievedPassage;

/// System framing shared by every prompt.
pub const SYSTEM_PROMPT: &str = "You are a professional hypothesis generator in \
cancer biology who proposes new, genuinely out-of-the-box hypotheses grounded \
in the provided literature. Be strict: if gene names or other inputs do not \
look real, say you cannot generate anything.";

/// The JSON fields every hypothesis record must carry. Enumerated in the
/// prompt so the model has no excuse for missing fields.
const HYPOTHESIS_FIELDS: &str = r#""short_description" (one sentence), "long_description" (detailed reasoning plus in-silico and in-vitro validation recommendations), "novelty" (integer 1-10), "not_novel" (what is already published), "missing" (what the hypothesis lacks), "superfluous" (what should be cut), "anomaly" ({"raised": bool, "reason": string} - does the hypothesis make sense at all), "biohazard" ({"raised": bool, "reason": string}), "references" (array of citation ids), "relation_to_literature" (how it relates to the passages)"#;

/// Builds prompts from context, passages, and attempt history.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    /// Total character budget for embedded passages.
    passage_budget: usize,
}

impl PromptAssembler {
    pub fn new(passage_budget: usize) -> Self {
        Self { passage_budget }
    }

    /// Initial generation prompt: model framing, exclusion list, passages,
    /// and the structured-output contract for a slate of `slate_size`.
    pub fn build_generate(
        &self,
        context: &Context,
        passages: &[RetrievedPassage],
        slate_size: usize,
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str(&self.framing(context));
        prompt.push_str(&self.exclusions(context));
        prompt.push_str(&self.passage_block(passages));
        prompt.push_str(&format!(
            "\nPropose exactly {} distinct hypotheses. Respond with ONLY a JSON \
             array of {} objects, each with the fields: {}.\n\
             Every field is required; use \"none\" for fields with nothing to say.\n",
            slate_size, slate_size, HYPOTHESIS_FIELDS
        ));
        prompt
    }

    /// Critique prompt: the hypothesis under review plus fresh passages.
    pub fn build_critique(
        &self,
        context: &Context,
        passages: &[RetrievedPassage],
        hypothesis: &Hypothesis,
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str(
            "You are a severe reviewer of cancer-biology hypotheses. Critique the \
             hypothesis below to maximize improvement.\n",
        );
        prompt.push_str(&self.framing(context));
        prompt.push_str("\nHypothesis under review:\n");
        prompt.push_str(&format!(
            "Short: {}\nFull: {}\n",
            hypothesis.short_description, hypothesis.long_description
        ));
        prompt.push_str(&self.passage_block(passages));
        prompt.push_str(
            "\nRespond with ONLY a JSON object with the fields: \"novelty\" (integer \
             1-10, compared against the passages and your knowledge of the field), \
             \"not_novel\", \"missing\", \"superfluous\", \"anomaly\" ({\"raised\", \
             \"reason\"} - flag unreal gene names or incoherent claims), \"biohazard\" \
             ({\"raised\", \"reason\"} - flag restricted or dual-use content), \
             \"references\" (supporting or contradicting citation ids), \
             \"relation_to_literature\" (how the hypothesis relates to the passages).\n\
             Every field is required.\n",
        );
        prompt
    }

    /// Revision prompt: framing plus the full accept/reject history, the
    /// most recent critique last so it dominates.
    pub fn build_revise(
        &self,
        context: &Context,
        passages: &[RetrievedPassage],
        history: &[Attempt],
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str(&self.framing(context));
        prompt.push_str(&self.exclusions(context));
        prompt.push_str("\nPrevious rounds for this hypothesis, oldest first:\n");
        for attempt in history {
            prompt.push_str(&format!(
                "Round {}: {} — \"{}\" (novelty {})\n",
                attempt.round,
                if attempt.decision.is_accept() {
                    "accepted".to_string()
                } else {
                    format!("rejected ({})", rejection_label(attempt))
                },
                attempt.hypothesis.short_description,
                attempt.critique.novelty,
            ));
        }
        if let Some(last) = history.last() {
            prompt.push_str(&format!(
                "\nMost recent critique:\n- Not novel: {}\n- Missing: {}\n- Superfluous: {}\n",
                last.critique.not_novel, last.critique.missing, last.critique.superfluous
            ));
            if last.critique.anomaly.raised {
                prompt.push_str(&format!("- Anomaly: {}\n", last.critique.anomaly.reason));
            }
        }
        prompt.push_str(&self.passage_block(passages));
        prompt.push_str(&format!(
            "\nRevise the hypothesis using the critique: add what is missing, drop \
             what is superfluous or already published, and cite references that can \
             verify it. Respond with ONLY a JSON object with the fields: {}.\n\
             Every field is required.\n",
            HYPOTHESIS_FIELDS
        ));
        prompt
    }

    /// The statistical-model framing common to all prompts.
    fn framing(&self, context: &Context) -> String {
        let mut block = format!(
            "I trained a statistical learning model to predict {} in {} samples. \
             The most important features (genes) were: {}. The central question is \
             what causes {} given these genes and how to exploit it therapeutically \
             in {}.\n",
            context.target_variable,
            context.disease,
            context.gene_summary(),
            context.target_variable,
            context.disease,
        );
        if let Some(notes) = &context.notes {
            block.push_str(&format!("Additional notes: {}\n", notes));
        }
        block
    }

    fn exclusions(&self, context: &Context) -> String {
        if context.known_hypotheses.is_empty() {
            return String::new();
        }
        format!(
            "\nALWAYS make sure your hypothesis is novel compared to the following \
             known hypotheses; do not generate anything conceptually related to \
             them: {}\n",
            context.known_hypotheses.join("; ")
        )
    }

    /// Render passages within the character budget, dropping the
    /// lowest-similarity passages first. An empty selection renders an
    /// explicit "no grounding" marker so the model knows it is unassisted.
    fn passage_block(&self, passages: &[RetrievedPassage]) -> String {
        let selected = self.select_passages(passages);
        if selected.is_empty() {
            return "\nNo literature passages are available for grounding.\n".to_string();
        }
        let mut block = String::from("\nRelevant literature passages:\n");
        for passage in selected {
            block.push_str(&format!("[{}] {}\n", passage.source, passage.text));
        }
        block
    }

    /// Keep passages in similarity order until the budget is spent. The kept
    /// set is a strict prefix of that order: the first passage that does not
    /// fit is truncated to the remaining budget and selection stops, so a
    /// lower-similarity passage can never displace a higher one.
    fn select_passages(&self, passages: &[RetrievedPassage]) -> Vec<RetrievedPassage> {
        let mut ordered: Vec<&RetrievedPassage> = passages.iter().collect();
        ordered.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut selected = Vec::new();
        let mut spent = 0usize;
        for passage in ordered {
            let cost = passage.text.len() + passage.source.len();
            if spent + cost <= self.passage_budget {
                spent += cost;
                selected.push(passage.clone());
                continue;
            }
            let remaining = self
                .passage_budget
                .saturating_sub(spent + passage.source.len());
            if remaining > 0 {
                let mut truncated = passage.clone();
                truncated.text = truncate_at_boundary(&truncated.text, remaining).to_string();
                if !truncated.text.is_empty() {
                    selected.push(truncated);
                }
            }
            break;
        }
        selected
    }
}

/// Longest prefix of `text` within `max` bytes, cut at a char boundary.
fn truncate_at_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn rejection_label(attempt: &Attempt) -> String {
    match &attempt.decision {
        crate::model::Decision::Accept => String::new(),
        crate::model::Decision::Reject(reason) => reason.to_string(),
    }
}
