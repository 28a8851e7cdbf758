//! Result aggregation: lineage outcomes to a tabular report.
//!
//! Output order is the slate's creation order, regardless of which lineage
//! finished first. Exhausted lineages still emit their best attempt, marked
//! not fully accepted; failed lineages emit no row and are reported
//! separately.

use crate::model::{Flag, LineageOutcome, LineageStatus};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// One output row, flattened from the emitted attempt of a lineage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypothesisRecord {
    pub short_description: String,
    pub long_description: String,
    pub novelty: u8,
    pub not_novel: String,
    pub missing: String,
    pub superfluous: String,
    pub anomaly: String,
    pub biohazard: String,
    pub references: String,
    pub relation_to_literature: String,
    /// True only when the critic accepted the final round.
    pub fully_accepted: bool,
    /// False when the hypothesis was drafted without literature passages.
    pub grounded: bool,
    /// Rounds spent on this lineage.
    pub rounds: u32,
}

/// A lineage that produced nothing emittable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageFailure {
    pub index: usize,
    pub reason: String,
}

/// The episode's aggregated result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeReport {
    pub records: Vec<HypothesisRecord>,
    pub failures: Vec<LineageFailure>,
}

impl EpisodeReport {
    pub fn accepted_count(&self) -> usize {
        self.records.iter().filter(|r| r.fully_accepted).count()
    }

    /// Write the records as CSV. The status fields (`fully_accepted`,
    /// `grounded`, `rounds`) are operator-facing and stay out of the table.
    pub fn write_csv(&self, path: &Path) -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        file.write_all(csv_text(&self.records).as_bytes())
    }
}

const CSV_HEADER: &str = "short_description,long_description,novelty,not_novel,missing,\
superfluous,anomaly,biohazard,references,relation_to_literature";

/// Build the report from lineage outcomes, restoring creation order.
pub fn collect(outcomes: &[LineageOutcome]) -> EpisodeReport {
    let mut ordered: Vec<&LineageOutcome> = outcomes.iter().collect();
    ordered.sort_by_key(|o| o.index);

    let mut records = Vec::new();
    let mut failures = Vec::new();
    for outcome in ordered {
        match outcome.emitted() {
            Some(attempt) => records.push(HypothesisRecord {
                short_description: attempt.hypothesis.short_description.clone(),
                long_description: attempt.hypothesis.long_description.clone(),
                novelty: attempt.critique.novelty,
                not_novel: attempt.critique.not_novel.clone(),
                missing: attempt.critique.missing.clone(),
                superfluous: attempt.critique.superfluous.clone(),
                anomaly: flag_cell(&attempt.critique.anomaly),
                biohazard: flag_cell(&attempt.critique.biohazard),
                references: attempt.hypothesis.references.join("; "),
                relation_to_literature: attempt.critique.relation_to_literature.clone(),
                fully_accepted: outcome.fully_accepted(),
                grounded: attempt.hypothesis.grounded,
                rounds: attempt.round + 1,
            }),
            None => failures.push(LineageFailure {
                index: outcome.index,
                reason: outcome
                    .failure
                    .clone()
                    .unwrap_or_else(|| no_row_reason(outcome.status).to_string()),
            }),
        }
    }
    EpisodeReport { records, failures }
}

fn no_row_reason(status: LineageStatus) -> &'static str {
    match status {
        LineageStatus::Failed => "generation failed",
        LineageStatus::Exhausted => "no attempt recorded",
        LineageStatus::Accepted => "accepted without attempts",
    }
}

fn flag_cell(flag: &Flag) -> String {
    if !flag.raised {
        return String::new();
    }
    if flag.reason.is_empty() {
        "flagged".to_string()
    } else {
        flag.reason.clone()
    }
}

fn csv_text(records: &[HypothesisRecord]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for r in records {
        let cells = [
            r.short_description.as_str(),
            r.long_description.as_str(),
            &r.novelty.to_string(),
            r.not_novel.as_str(),
            r.missing.as_str(),
            r.superfluous.as_str(),
            r.anomaly.as_str(),
            r.biohazard.as_str(),
            r.references.as_str(),
            r.relation_to_literature.as_str(),
        ]
        .map(csv_cell);
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

/// RFC 4180 quoting: quote cells containing commas, quotes, or newlines.
fn csv_cell(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
