use crate::embedding::Embedder;
use crate::error::{CorepError, CorepResult};
use crate::store::DocumentStore;
use api_shared::wire::ContextItem;
use std::sync::Arc;

/// A chunk of regulatory text selected for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub source: String,
    pub content: String,
    pub score: f32,
}

impl From<&RetrievedChunk> for ContextItem {
    fn from(chunk: &RetrievedChunk) -> Self {
        ContextItem {
            source: chunk.source.clone(),
            content: chunk.content.clone(),
            score: chunk.score,
        }
    }
}

/// Embeds a query and looks up its nearest chunks in a read-only store.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<DocumentStore>,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    pub fn new(store: Arc<DocumentStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    pub fn document_count(&self) -> usize {
        self.store.len()
    }

    pub fn embedding_model(&self) -> &str {
        self.embedder.model_id()
    }

    /// Return up to `k` chunks ordered by descending similarity to `query`.
    ///
    /// An empty store gives an empty result without calling the embedder.
    ///
    /// # Errors
    /// Returns `Embedding` if the query cannot be embedded.
    pub async fn retrieve(&self, query: &str, k: usize) -> CorepResult<Vec<RetrievedChunk>> {
        if self.store.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut vectors = self.embedder.embed(&[query.to_string()]).await?;
        let query_embedding = vectors
            .pop()
            .ok_or_else(|| CorepError::Embedding("embedder returned no vector".into()))?;

        Ok(self
            .store
            .search(&query_embedding, k)
            .into_iter()
            .map(|hit| RetrievedChunk {
                source: hit.chunk.source.clone(),
                content: hit.chunk.text.clone(),
                score: hit.score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;

    async fn retriever_with(docs: &[(&str, &str)]) -> Retriever {
        let embedder = Arc::new(HashingEmbedder::default());
        let mut store = DocumentStore::new(embedder.model_id());
        for (label, text) in docs {
            store
                .ingest(embedder.as_ref(), label, text)
                .await
                .expect("ingest should succeed");
        }
        Retriever::new(Arc::new(store), embedder)
    }

    #[tokio::test]
    async fn test_retrieve_from_empty_store_is_empty() {
        let retriever = retriever_with(&[]).await;
        let hits = retriever.retrieve("goodwill", 5).await.expect("should succeed");
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_orders_by_descending_score() {
        let retriever = retriever_with(&[
            (
                "PRA_Rulebook",
                "## 2.1.2 Intangible assets\nGoodwill and other intangible assets are deducted from CET1 capital items.\n\n## 1.3.1 Tier 2\nTier 2 instruments require an original maturity of at least five years.",
            ),
        ])
        .await;

        let hits = retriever
            .retrieve("goodwill intangible assets deduction", 2)
            .await
            .expect("should succeed");

        assert_eq!(hits.len(), 2);
        assert!(hits[0].content.contains("Goodwill"));
        assert!(hits[0].score >= hits[1].score);
        assert_eq!(hits[0].source, "PRA_Rulebook");
    }

    #[tokio::test]
    async fn test_retrieve_is_deterministic() {
        let retriever = retriever_with(&[
            ("A", "Retained earnings are part of CET1 capital once verified by auditors."),
            ("B", "Retained earnings are part of CET1 capital once verified by auditors."),
        ])
        .await;

        let first = retriever.retrieve("retained earnings", 2).await.expect("ok");
        let second = retriever.retrieve("retained earnings", 2).await.expect("ok");
        assert_eq!(first, second);
        assert_eq!(first[0].source, "A");
    }
}
