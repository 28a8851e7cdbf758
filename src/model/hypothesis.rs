//! Hypothesis and critique records.
//!
//! These are the strictly validated shapes the Actor and Critic must fill.
//! Parsing is parse-or-fail: a missing field is an error, not a silently
//! defaulted value. The two exceptions are engine-owned fields (`grounded`)
//! and the critique's `accept`, which is computed by policy, never trusted
//! from model output.

use serde::{Deserialize, Deserializer, Serialize};

/// A boolean flag with an explanation, e.g. anomaly or biohazard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub raised: bool,
    pub reason: String,
}

impl Flag {
    pub fn clear() -> Self {
        Self {
            raised: false,
            reason: String::new(),
        }
    }

    pub fn raise(reason: impl Into<String>) -> Self {
        Self {
            raised: true,
            reason: reason.into(),
        }
    }
}

/// Deserialize a novelty score from a number or a numeric string,
/// clamped into 1..=10. Models return both shapes.
fn de_novelty<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
    }

    let raw = Raw::deserialize(deserializer)?;
    let value = match raw {
        Raw::Num(n) => n,
        Raw::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("novelty is not numeric: {:?}", s)))?,
    };
    Ok(value.round().clamp(1.0, 10.0) as u8)
}

/// The unit of work: one candidate hypothesis.
///
/// Created by the Actor; critique-facing fields are overwritten by the
/// Critic when it annotates the draft. "none" is a legal field value,
/// absence is not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    /// One-sentence summary of the core idea.
    pub short_description: String,
    /// Full description with reasoning and validation recommendations.
    pub long_description: String,
    /// Novelty score 1-10.
    #[serde(deserialize_with = "de_novelty")]
    pub novelty: u8,
    /// What has already been published.
    pub not_novel: String,
    /// What the hypothesis is missing.
    pub missing: String,
    /// What is superfluous.
    pub superfluous: String,
    /// Does the hypothesis make sense at all (real gene names, coherent claim)?
    pub anomaly: Flag,
    /// Restricted or dual-use content.
    pub biohazard: Flag,
    /// Citations drawn from retrieved passages or asserted literature.
    pub references: Vec<String>,
    /// How the hypothesis relates to the retrieved literature.
    pub relation_to_literature: String,
    /// False when the draft was produced without retrieved passages
    /// (retrieval degraded). Engine-owned, never model output.
    #[serde(default = "grounded_default")]
    pub grounded: bool,
}

fn grounded_default() -> bool {
    true
}

impl Hypothesis {
    /// Apply a critique to this hypothesis, overwriting the
    /// critique-facing fields. Returns the annotated copy.
    pub fn annotated(&self, critique: &Critique) -> Self {
        let mut out = self.clone();
        out.novelty = critique.novelty;
        out.not_novel = critique.not_novel.clone();
        out.missing = critique.missing.clone();
        out.superfluous = critique.superfluous.clone();
        out.anomaly = critique.anomaly.clone();
        out.biohazard = critique.biohazard.clone();
        if !critique.references.is_empty() {
            out.references = critique.references.clone();
        }
        if !critique.relation_to_literature.is_empty() {
            out.relation_to_literature = critique.relation_to_literature.clone();
        }
        out
    }
}

/// The Critic's verdict shape as the model must return it.
/// `accept` is intentionally absent — it is a policy decision.
#[derive(Debug, Clone, Deserialize)]
pub struct CritiqueDraft {
    #[serde(deserialize_with = "de_novelty")]
    pub novelty: u8,
    pub not_novel: String,
    pub missing: String,
    pub superfluous: String,
    pub anomaly: Flag,
    pub biohazard: Flag,
    pub references: Vec<String>,
    pub relation_to_literature: String,
}

/// A complete critique: the model's verdict plus the policy decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    pub novelty: u8,
    pub not_novel: String,
    pub missing: String,
    pub superfluous: String,
    pub anomaly: Flag,
    pub biohazard: Flag,
    pub references: Vec<String>,
    pub relation_to_literature: String,
    /// Policy outcome: novelty above threshold, no biohazard, guardrail clear.
    pub accept: bool,
}

impl Critique {
    pub fn from_draft(draft: CritiqueDraft, accept: bool) -> Self {
        Self {
            novelty: draft.novelty,
            not_novel: draft.not_novel,
            missing: draft.missing,
            superfluous: draft.superfluous,
            anomaly: draft.anomaly,
            biohazard: draft.biohazard,
            references: draft.references,
            relation_to_literature: draft.relation_to_literature,
            accept,
        }
    }

    /// Synthesized verdict for a failed evaluation. Fail-closed: lowest
    /// novelty, never accepted.
    pub fn evaluation_failed(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            novelty: 1,
            not_novel: String::new(),
            missing: String::new(),
            superfluous: String::new(),
            anomaly: Flag::raise(format!("evaluation failed: {}", reason)),
            biohazard: Flag::clear(),
            references: Vec::new(),
            relation_to_literature: String::new(),
            accept: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hypothesis_json() -> &'static str {
        r#"{
            "short_description": "PARP inhibition exploits HR deficiency",
            "long_description": "Synthetic lethality of PARP inhibitors in BRCA-mutant TNBC.",
            "novelty": 6,
            "not_novel": "PARP inhibitors are approved for BRCA-mutant cancers",
            "missing": "resistance mechanisms",
            "superfluous": "none",
            "anomaly": {"raised": false, "reason": ""},
            "biohazard": {"raised": false, "reason": ""},
            "references": ["PMID:12345"],
            "relation_to_literature": "extends established synthetic lethality work"
        }"#
    }

    #[test]
    fn hypothesis_parses_with_all_fields() {
        let h: Hypothesis = serde_json::from_str(hypothesis_json()).unwrap();
        assert_eq!(h.novelty, 6);
        assert!(h.grounded, "grounded defaults true");
        assert_eq!(h.references, vec!["PMID:12345"]);
    }

    #[test]
    fn hypothesis_missing_field_is_an_error() {
        let truncated = hypothesis_json().replace(r#""missing": "resistance mechanisms","#, "");
        let result = serde_json::from_str::<Hypothesis>(&truncated);
        assert!(result.is_err(), "missing field must fail, not default");
    }

    #[test]
    fn novelty_accepts_numeric_strings_and_clamps() {
        let as_string = hypothesis_json().replace(r#""novelty": 6"#, r#""novelty": "8""#);
        let h: Hypothesis = serde_json::from_str(&as_string).unwrap();
        assert_eq!(h.novelty, 8);

        let too_big = hypothesis_json().replace(r#""novelty": 6"#, r#""novelty": 42"#);
        let h: Hypothesis = serde_json::from_str(&too_big).unwrap();
        assert_eq!(h.novelty, 10);

        let zero = hypothesis_json().replace(r#""novelty": 6"#, r#""novelty": 0"#);
        let h: Hypothesis = serde_json::from_str(&zero).unwrap();
        assert_eq!(h.novelty, 1);
    }

    #[test]
    fn novelty_rejects_non_numeric_text() {
        let bad = hypothesis_json().replace(r#""novelty": 6"#, r#""novelty": "very novel""#);
        assert!(serde_json::from_str::<Hypothesis>(&bad).is_err());
    }

    #[test]
    fn annotated_overwrites_critique_fields() {
        let h: Hypothesis = serde_json::from_str(hypothesis_json()).unwrap();
        let critique = Critique {
            novelty: 9,
            not_novel: "nothing".to_string(),
            missing: "dose response".to_string(),
            superfluous: "background".to_string(),
            anomaly: Flag::clear(),
            biohazard: Flag::clear(),
            references: vec!["PMID:99".to_string()],
            relation_to_literature: "contradicts one report".to_string(),
            accept: true,
        };
        let annotated = h.annotated(&critique);
        assert_eq!(annotated.novelty, 9);
        assert_eq!(annotated.references, vec!["PMID:99"]);
        assert_eq!(annotated.short_description, h.short_description);
    }

    #[test]
    fn evaluation_failed_critique_is_rejecting() {
        let c = Critique::evaluation_failed("no parsable verdict");
        assert!(!c.accept);
        assert!(c.anomaly.raised);
        assert_eq!(c.novelty, 1);
    }
}
