//! Corpus snapshot: the fixed set of literature abstracts behind the index.
//!
//! One JSON object per line: `{"id": "PMID:123", "text": "..."}`. The
//! snapshot is read-only once loaded; index rebuilds produce a new snapshot,
//! and retrieval determinism is only promised within one snapshot.

use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;
use thiserror::Error;

/// One literature abstract in the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbstractRecord {
    /// Source identifier, e.g. a PubMed ID.
    pub id: String,
    pub text: String,
}

/// Errors while loading a corpus snapshot.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
    #[error("corpus is empty")]
    Empty,
}

/// A fixed, read-only collection of abstracts.
#[derive(Debug, Clone)]
pub struct CorpusSnapshot {
    records: Vec<AbstractRecord>,
}

impl CorpusSnapshot {
    pub fn new(records: Vec<AbstractRecord>) -> Result<Self, CorpusError> {
        if records.is_empty() {
            return Err(CorpusError::Empty);
        }
        Ok(Self { records })
    }

    /// Load a snapshot from a JSON-lines file. Blank lines are skipped;
    /// a malformed line fails the whole load with its line number.
    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let mut records = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: AbstractRecord = serde_json::from_str(&line)
                .map_err(|source| CorpusError::Parse {
                    line: idx + 1,
                    source,
                })?;
            records.push(record);
        }
        Self::new(records)
    }

    pub fn records(&self) -> &[AbstractRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
