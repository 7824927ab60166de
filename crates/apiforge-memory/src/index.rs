//! Per-run embedding index over a small document set.
//!
//! Documents are embedded through an injected `embed_fn` seam and stored in a
//! [`VectorStore`] collection that is rebuilt from scratch on every build.

use std::collections::HashMap;
use std::time::Duration;

use apiforge_llm::LlmError;
use apiforge_llm::provider::EmbedFuture;

use crate::error::MemoryError;
use crate::vector_store::{ScoredVectorPoint, VectorPoint, VectorStore};

const COLLECTION_NAME: &str = "api_docs";
const EMBED_ATTEMPTS: u32 = 3;
const EMBED_BASE_BACKOFF_MS: u64 = 200;

pub type EmbedFn = Box<dyn Fn(&str) -> EmbedFuture + Send + Sync>;

/// One retrievable unit: the text to embed plus the payload stored alongside
/// the vector.
#[derive(Debug, Clone)]
pub struct IndexDoc {
    pub text: String,
    pub payload: HashMap<String, serde_json::Value>,
}

/// Outcome of an index build. Documents whose embedding failed after all
/// retries are excluded, not fatal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub indexed: usize,
    pub failed: usize,
}

pub struct DocIndex {
    store: Box<dyn VectorStore>,
    collection: String,
    embed_fn: EmbedFn,
    indexed: usize,
}

impl std::fmt::Debug for DocIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocIndex")
            .field("collection", &self.collection)
            .field("indexed", &self.indexed)
            .finish_non_exhaustive()
    }
}

async fn embed_with_retry(embed_fn: &EmbedFn, text: &str) -> Result<Vec<f32>, LlmError> {
    let mut delay = Duration::from_millis(EMBED_BASE_BACKOFF_MS);
    let mut last_err = None;
    for attempt in 1..=EMBED_ATTEMPTS {
        match (embed_fn)(text).await {
            Ok(vector) => return Ok(vector),
            Err(e) => {
                if attempt < EMBED_ATTEMPTS {
                    tracing::warn!(
                        "embedding attempt {attempt}/{EMBED_ATTEMPTS} failed, retrying in {}ms: {e}",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| LlmError::Other("embedding failed".into())))
}

impl DocIndex {
    #[must_use]
    pub fn new(store: Box<dyn VectorStore>, embed_fn: EmbedFn) -> Self {
        Self {
            store,
            collection: COLLECTION_NAME.into(),
            embed_fn,
            indexed: 0,
        }
    }

    /// Number of documents currently in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indexed
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indexed == 0
    }

    /// Rebuild the collection from `docs`. Idempotent for an unchanged
    /// document set: the previous collection is dropped first.
    ///
    /// Per-document embedding failures are retried with exponential backoff;
    /// exhaustion excludes that document and increments `failed`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the vector store itself fails.
    pub async fn build(&mut self, docs: &[IndexDoc]) -> Result<BuildReport, MemoryError> {
        self.store.delete_collection(&self.collection).await?;
        self.indexed = 0;

        let mut points = Vec::with_capacity(docs.len());
        let mut failed = 0;
        for doc in docs {
            match embed_with_retry(&self.embed_fn, &doc.text).await {
                Ok(vector) => points.push(VectorPoint {
                    id: uuid::Uuid::new_v4().to_string(),
                    vector,
                    payload: doc.payload.clone(),
                }),
                Err(e) => {
                    failed += 1;
                    tracing::error!("excluding document from index, embedding failed: {e}");
                }
            }
        }

        let vector_size = points.first().map_or(0, |p| p.vector.len()) as u64;
        self.store
            .ensure_collection(&self.collection, vector_size)
            .await?;
        if !points.is_empty() {
            self.indexed = points.len();
            self.store.upsert(&self.collection, points).await?;
        }

        Ok(BuildReport {
            indexed: self.indexed,
            failed,
        })
    }

    /// Embed `query` and return up to `limit` scored points.
    ///
    /// An empty index yields an empty result without touching the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the query embedding or the store search fails.
    pub async fn search(
        &self,
        query: &str,
        limit: u64,
    ) -> Result<Vec<ScoredVectorPoint>, MemoryError> {
        if self.indexed == 0 {
            return Ok(Vec::new());
        }
        let vector = embed_with_retry(&self.embed_fn, query).await?;
        let results = self.store.search(&self.collection, vector, limit).await?;
        Ok(results)
    }
}
