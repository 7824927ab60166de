//! Similarity retrieval over the API documentation index.

use std::collections::HashMap;

use apiforge_memory::index::{DocIndex, IndexDoc};
use apiforge_memory::vector_store::ScoredVectorPoint;

use crate::dataset::ApiEntry;

pub const DEFAULT_TOP_K: usize = 4;

/// An API entry matched to a query, with its similarity score.
#[derive(Debug, Clone)]
pub struct RetrievedEntry {
    pub entry: ApiEntry,
    pub score: f32,
}

pub struct Retriever {
    index: DocIndex,
    top_k: usize,
}

/// Text representation embedded for an entry: name, description, and endpoint.
#[must_use]
pub fn embedding_text(entry: &ApiEntry) -> String {
    format!(
        "{}. {} Endpoint: {} {}",
        entry.name, entry.description, entry.method, entry.endpoint
    )
}

/// Convert an entry into the indexable document with its full payload.
#[must_use]
pub fn to_index_doc(entry: &ApiEntry) -> IndexDoc {
    IndexDoc {
        text: embedding_text(entry),
        payload: HashMap::from([
            ("seq".to_owned(), serde_json::json!(entry.seq)),
            ("name".to_owned(), serde_json::json!(entry.name)),
            ("description".to_owned(), serde_json::json!(entry.description)),
            ("endpoint".to_owned(), serde_json::json!(entry.endpoint)),
            ("method".to_owned(), serde_json::json!(entry.method)),
            ("example".to_owned(), serde_json::json!(entry.example)),
        ]),
    }
}

fn payload_to_entry(point: &ScoredVectorPoint) -> Option<RetrievedEntry> {
    let p = &point.payload;
    let as_str = |key: &str| p.get(key).and_then(|v| v.as_str()).map(ToOwned::to_owned);
    #[expect(clippy::cast_possible_truncation)]
    let seq = p.get("seq")?.as_u64()? as usize;
    Some(RetrievedEntry {
        entry: ApiEntry {
            seq,
            name: as_str("name")?,
            description: as_str("description")?,
            endpoint: as_str("endpoint")?,
            method: as_str("method")?,
            example: as_str("example").unwrap_or_default(),
        },
        score: point.score,
    })
}

impl Retriever {
    #[must_use]
    pub fn new(index: DocIndex, top_k: usize) -> Self {
        Self { index, top_k }
    }

    /// Top-k entries for `query`, ordered by descending similarity. Ties are
    /// broken by original dataset order. An empty index yields an empty
    /// result, never an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the query embedding or index search fails.
    pub async fn retrieve(&self, query: &str) -> anyhow::Result<Vec<RetrievedEntry>> {
        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        // Fetch the whole collection so equal-score points beyond top_k
        // cannot be dropped nondeterministically before the stable sort.
        let limit = self.index.len() as u64;
        let points = self.index.search(query, limit).await?;

        let mut hits: Vec<RetrievedEntry> = points.iter().filter_map(payload_to_entry).collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entry.seq.cmp(&b.entry.seq))
        });
        hits.truncate(self.top_k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiforge_llm::provider::EmbedFuture;
    use apiforge_memory::InMemoryVectorStore;

    fn entry(seq: usize, name: &str, endpoint: &str) -> ApiEntry {
        ApiEntry {
            seq,
            name: name.to_owned(),
            description: format!("{name} operation"),
            endpoint: endpoint.to_owned(),
            method: "POST".to_owned(),
            example: String::new(),
        }
    }

    fn marker_embed() -> Box<dyn Fn(&str) -> EmbedFuture + Send + Sync> {
        Box::new(|text: &str| {
            let text = text.to_lowercase();
            #[expect(clippy::cast_precision_loss)]
            let v = vec![
                text.matches("payment").count() as f32,
                text.matches("refund").count() as f32,
                1.0,
            ];
            Box::pin(async move { Ok(v) })
        })
    }

    fn constant_embed() -> Box<dyn Fn(&str) -> EmbedFuture + Send + Sync> {
        Box::new(|_| Box::pin(async { Ok(vec![1.0, 0.0]) }))
    }

    async fn build_retriever(
        entries: &[ApiEntry],
        embed: Box<dyn Fn(&str) -> EmbedFuture + Send + Sync>,
        top_k: usize,
    ) -> Retriever {
        let mut index = DocIndex::new(Box::new(InMemoryVectorStore::new()), embed);
        let docs: Vec<IndexDoc> = entries.iter().map(to_index_doc).collect();
        index.build(&docs).await.unwrap();
        Retriever::new(index, top_k)
    }

    #[tokio::test]
    async fn retrieves_best_match_first() {
        let entries = vec![
            entry(0, "Create Refund", "/v2/refunds"),
            entry(1, "Create Payment", "/v2/payments"),
        ];
        let retriever = build_retriever(&entries, marker_embed(), 2).await;

        let hits = retriever.retrieve("create a payment").await.unwrap();
        assert_eq!(hits[0].entry.name, "Create Payment");
        assert_eq!(hits[0].entry.endpoint, "/v2/payments");
    }

    #[tokio::test]
    async fn ties_broken_by_dataset_order() {
        // Constant embedding makes every score identical.
        let entries = vec![
            entry(0, "Alpha", "/v1/a"),
            entry(1, "Beta", "/v1/b"),
            entry(2, "Gamma", "/v1/c"),
        ];
        let retriever = build_retriever(&entries, constant_embed(), 2).await;

        let hits = retriever.retrieve("anything").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entry.seq, 0);
        assert_eq!(hits[1].entry.seq, 1);
    }

    #[tokio::test]
    async fn truncates_to_top_k() {
        let entries: Vec<ApiEntry> = (0..6).map(|i| entry(i, "Op", "/v1/op")).collect();
        let retriever = build_retriever(&entries, constant_embed(), 3).await;

        let hits = retriever.retrieve("op").await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn empty_index_returns_empty_not_error() {
        let index = DocIndex::new(Box::new(InMemoryVectorStore::new()), constant_embed());
        let retriever = Retriever::new(index, 4);
        let hits = retriever.retrieve("anything").await.unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn embedding_text_mentions_endpoint() {
        let e = entry(0, "Create Payment", "/v2/payments");
        let text = embedding_text(&e);
        assert!(text.contains("/v2/payments"));
        assert!(text.contains("Create Payment"));
    }

    #[tokio::test]
    async fn payload_round_trips_entry() {
        let e = ApiEntry {
            seq: 3,
            name: "Create Refund".into(),
            description: "Refund a payment".into(),
            endpoint: "/v2/refunds".into(),
            method: "POST".into(),
            example: "client.refunds.create()".into(),
        };
        let retriever = build_retriever(std::slice::from_ref(&e), constant_embed(), 1).await;
        let hits = retriever.retrieve("refund").await.unwrap();
        assert_eq!(hits[0].entry, e);
    }
}
