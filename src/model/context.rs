//! User-supplied research context.
//!
//! A `Context` is the validated input record handed over by the UI layer:
//! which genes moved, in what disease, predicting what. It is immutable for
//! the lifetime of an episode; the engine never writes to it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a gene-level signal in the statistical model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    /// Free-form direction, e.g. "silenced" or "amplified".
    #[serde(untagged)]
    Other(String),
}

impl Direction {
    /// Parse a direction from user input. Unrecognized strings are kept
    /// verbatim as `Other` — the prompt passes them through to the model.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "up" | "upregulated" => Direction::Up,
            "down" | "downregulated" => Direction::Down,
            other if other.is_empty() => Direction::Other("unspecified".to_string()),
            other => Direction::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "upregulated"),
            Direction::Down => write!(f, "downregulated"),
            Direction::Other(s) => write!(f, "{}", s),
        }
    }
}

/// One (gene, direction) pair from the feature importance output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneSignal {
    /// Gene symbol as entered, e.g. "TP53". Validation is the UI's job.
    pub symbol: String,
    pub direction: Direction,
}

impl GeneSignal {
    pub fn new(symbol: impl Into<String>, direction: Direction) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
        }
    }

    /// Parse a `SYMBOL:direction` pair, e.g. `TP53:down`.
    /// A bare symbol gets an unspecified direction.
    pub fn parse(s: &str) -> Self {
        match s.split_once(':') {
            Some((sym, dir)) => Self::new(sym.trim(), Direction::parse(dir)),
            None => Self::new(s.trim(), Direction::Other("unspecified".to_string())),
        }
    }
}

impl fmt::Display for GeneSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.direction)
    }
}

/// The full input record for one episode.
///
/// Ordered gene signals plus free-text disease, target variable, and notes.
/// `known_hypotheses` are short descriptions the user already has — the
/// generator is told to stay away from them conceptually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub genes: Vec<GeneSignal>,
    pub disease: String,
    pub target_variable: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub known_hypotheses: Vec<String>,
}

impl Context {
    pub fn new(
        genes: Vec<GeneSignal>,
        disease: impl Into<String>,
        target_variable: impl Into<String>,
    ) -> Self {
        Self {
            genes,
            disease: disease.into(),
            target_variable: target_variable.into(),
            notes: None,
            known_hypotheses: Vec::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_known_hypotheses(mut self, known: Vec<String>) -> Self {
        self.known_hypotheses = known;
        self
    }

    /// Comma-joined gene list for prompt and retrieval-query use.
    pub fn gene_summary(&self) -> String {
        self.genes
            .iter()
            .map(|g| g.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The text used as the retrieval query for initial grounding.
    pub fn retrieval_query(&self) -> String {
        format!(
            "{} in {} predicting {}",
            self.gene_summary(),
            self.disease,
            self.target_variable
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_parses_common_forms() {
        assert_eq!(Direction::parse("down"), Direction::Down);
        assert_eq!(Direction::parse("Downregulated"), Direction::Down);
        assert_eq!(Direction::parse("up"), Direction::Up);
        assert_eq!(
            Direction::parse("silenced"),
            Direction::Other("silenced".to_string())
        );
    }

    #[test]
    fn gene_signal_parses_pair_syntax() {
        let g = GeneSignal::parse("TP53:down");
        assert_eq!(g.symbol, "TP53");
        assert_eq!(g.direction, Direction::Down);

        let bare = GeneSignal::parse("BRCA1");
        assert_eq!(bare.symbol, "BRCA1");
        assert!(matches!(bare.direction, Direction::Other(_)));
    }

    #[test]
    fn retrieval_query_includes_all_parts() {
        let ctx = Context::new(
            vec![
                GeneSignal::new("TP53", Direction::Down),
                GeneSignal::new("BRCA1", Direction::Down),
            ],
            "triple negative breast cancer",
            "cisplatin resistance",
        );
        let q = ctx.retrieval_query();
        assert!(q.contains("TP53"));
        assert!(q.contains("triple negative breast cancer"));
        assert!(q.contains("cisplatin resistance"));
    }
}
