//! Corpus retriever — nearest-neighbor search over a fixed abstract corpus.
//!
//! Wraps an embedding index as a black box: given a query, return the top-k
//! most similar passages, highest similarity first. The index is read-only
//! and safely shared across concurrent lineages. Backend loss is retryable
//! (`RetrievalError::Unavailable`); callers degrade to ungrounded prompts
//! rather than aborting the episode.

mod corpus;
mod embedding;

pub use corpus::{AbstractRecord, CorpusError, CorpusSnapshot};
#[cfg(feature = "embeddings")]
pub use embedding::FastEmbedEmbedder;
pub use embedding::{cosine_similarity, Embedder, EmbeddingError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// One retrieved passage with its similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub text: String,
    /// Source identifier, e.g. a PubMed ID.
    pub source: String,
    pub similarity: f32,
}

/// Errors from the retrieval boundary.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Index or backing store unreachable. Retryable with backoff; after
    /// the budget is spent, callers degrade to zero-passage grounding.
    #[error("retrieval backend unavailable: {0}")]
    Unavailable(String),
    #[error("query must be non-empty and k must be at least 1")]
    InvalidQuery,
}

/// The retrieval capability: `retrieve(query, k) → passages`.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return the top-k passages most similar to `query`, highest first.
    /// Deterministic for a fixed index snapshot and query.
    async fn retrieve(&self, query: &str, k: usize)
        -> Result<Vec<RetrievedPassage>, RetrievalError>;
}

/// Retriever over an in-memory embedding index of a corpus snapshot.
///
/// All abstracts are embedded once at construction; queries embed on
/// demand and rank by cosine similarity.
pub struct CorpusRetriever {
    entries: Vec<IndexEntry>,
    embedder: Arc<dyn Embedder>,
}

struct IndexEntry {
    id: String,
    text: String,
    vector: Vec<f32>,
}

impl CorpusRetriever {
    /// Build the index by embedding every abstract in the snapshot.
    pub fn build(
        snapshot: &CorpusSnapshot,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, EmbeddingError> {
        let texts: Vec<&str> = snapshot.records().iter().map(|r| r.text.as_str()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::ModelError(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        let entries = snapshot
            .records()
            .iter()
            .zip(vectors)
            .map(|(record, vector)| IndexEntry {
                id: record.id.clone(),
                text: record.text.clone(),
                vector,
            })
            .collect();
        Ok(Self { entries, embedder })
    }

    fn search(&self, query_vector: &[f32], k: usize) -> Vec<RetrievedPassage> {
        let mut scored: Vec<RetrievedPassage> = self
            .entries
            .iter()
            .map(|entry| RetrievedPassage {
                text: entry.text.clone(),
                source: entry.id.clone(),
                similarity: cosine_similarity(query_vector, &entry.vector),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }
}

#[async_trait]
impl Retriever for CorpusRetriever {
    async fn retrieve(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        if query.trim().is_empty() || k == 0 {
            return Err(RetrievalError::InvalidQuery);
        }
        let query_vector = self
            .embedder
            .embed_one(query)
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;
        Ok(self.search(&query_vector, k))
    }
}

/// Retrieve with bounded backoff, degrading to no passages on failure.
///
/// Returns `(passages, grounded)`. `grounded` is false when the backend
/// stayed unavailable through the retry budget; the caller marks downstream
/// hypotheses accordingly. Invalid queries are caller bugs and still error.
pub async fn retrieve_with_backoff(
    retriever: &dyn Retriever,
    query: &str,
    k: usize,
    retries: u32,
    backoff: Duration,
) -> Result<(Vec<RetrievedPassage>, bool), RetrievalError> {
    let mut wait = backoff;
    let mut attempt = 0;
    loop {
        match retriever.retrieve(query, k).await {
            Ok(passages) => return Ok((passages, true)),
            Err(RetrievalError::InvalidQuery) => return Err(RetrievalError::InvalidQuery),
            Err(RetrievalError::Unavailable(reason)) => {
                if attempt >= retries {
                    tracing::warn!(%reason, "retrieval unavailable, degrading to ungrounded");
                    return Ok((Vec::new(), false));
                }
                tracing::debug!(attempt, %reason, "retrieval unavailable, backing off");
                tokio::time::sleep(wait).await;
                wait = wait.saturating_mul(2);
                attempt += 1;
            }
        }
    }
}

/// Mock retriever returning fixed passages (testing).
pub struct StaticRetriever {
    passages: Vec<RetrievedPassage>,
}

impl StaticRetriever {
    pub fn new(passages: Vec<RetrievedPassage>) -> Self {
        Self { passages }
    }

    pub fn empty() -> Self {
        Self {
            passages: Vec::new(),
        }
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        if query.trim().is_empty() || k == 0 {
            return Err(RetrievalError::InvalidQuery);
        }
        Ok(self.passages.iter().take(k).cloned().collect())
    }
}

/// Mock retriever whose backend is always down (testing).
pub struct UnavailableRetriever;

#[async_trait]
impl Retriever for UnavailableRetriever {
    async fn retrieve(
        &self,
        _query: &str,
        _k: usize,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        Err(RetrievalError::Unavailable("index offline".to_string()))
    }
}
