//! Safety boundary — optional pre/post content filter.
//!
//! The filter itself is an external policy; this module only defines the
//! boundary contract and two local implementations. A `allowed = false`
//! verdict forces rejection regardless of how the critic scored the
//! hypothesis.

use async_trait::async_trait;

/// Outcome of a guardrail check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl Verdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// The guardrail capability: `check(text) → verdict`.
///
/// Total by contract — a guardrail that cannot reach its policy backend
/// must decide locally (typically block) rather than error.
#[async_trait]
pub trait Guardrail: Send + Sync {
    async fn check(&self, text: &str) -> Verdict;
}

/// Guardrail that allows everything. The default when no policy is wired.
pub struct AllowAll;

#[async_trait]
impl Guardrail for AllowAll {
    async fn check(&self, _text: &str) -> Verdict {
        Verdict::allow()
    }
}

/// Case-insensitive substring blocklist.
///
/// A minimal local policy for operators without an external guardrail
/// service; matches are reported with the offending term.
pub struct BlocklistGuardrail {
    terms: Vec<String>,
}

impl BlocklistGuardrail {
    pub fn new(terms: Vec<String>) -> Self {
        Self {
            terms: terms.into_iter().map(|t| t.to_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl Guardrail for BlocklistGuardrail {
    async fn check(&self, text: &str) -> Verdict {
        let lowered = text.to_lowercase();
        for term in &self.terms {
            if !term.is_empty() && lowered.contains(term) {
                return Verdict::block(format!("blocked term: {}", term));
            }
        }
        Verdict::allow()
    }
}
