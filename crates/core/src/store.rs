//! Regulatory document store.
//!
//! Holds chunks of regulatory text with their embeddings and answers nearest-neighbour
//! lookups. The corpus is small and fixed after ingestion, so the store is a plain vector
//! scanned on every lookup; no index structure is kept.
//!
//! ## Chunking
//!
//! Documents are split on structural markers:
//! - a line starting with `##` (section or subsection header) always opens a new chunk
//! - a blank line closes the current chunk once it is longer than [`MIN_CHUNK_CHARS`];
//!   shorter fragments (typically a bare header) are merged into the following paragraph
//!
//! ## Persistence
//!
//! The ingestion CLI writes a JSON snapshot which the server loads at start-up. The snapshot
//! records which embedder produced the vectors; loading it with a different embedder
//! re-embeds the stored text instead of serving incomparable vectors.

use crate::constants::MIN_CHUNK_CHARS;
use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{CorepError, CorepResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Immutable unit of regulatory text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// `{source}_{index}` within the source.
    pub id: String,
    /// Source label, e.g. `PRA_Rulebook`.
    pub source: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A chunk returned by a lookup together with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a DocumentChunk,
    pub score: f32,
}

#[derive(Serialize, Deserialize)]
struct StoreSnapshot {
    embedding_model: String,
    chunks: Vec<DocumentChunk>,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    embedding_model: String,
    chunks: Vec<DocumentChunk>,
}

/// Split a document into retrievable chunks.
pub fn chunk_document(content: &str) -> Vec<String> {
    fn flush(current: &mut Vec<&str>, chunks: &mut Vec<String>) {
        let text = current.join("\n").trim().to_string();
        if !text.is_empty() {
            chunks.push(text);
        }
        current.clear();
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in content.lines() {
        if line.trim_start().starts_with("##") {
            flush(&mut current, &mut chunks);
            current.push(line);
        } else if line.trim().is_empty() {
            let length = current.join("\n").trim().chars().count();
            if length > MIN_CHUNK_CHARS {
                flush(&mut current, &mut chunks);
            } else if length > 0 {
                current.push("");
            }
        } else {
            current.push(line);
        }
    }
    flush(&mut current, &mut chunks);

    chunks
}

impl DocumentStore {
    /// Create an empty store whose vectors will come from `embedding_model`.
    pub fn new(embedding_model: impl Into<String>) -> Self {
        Self {
            embedding_model: embedding_model.into(),
            chunks: Vec::new(),
        }
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[DocumentChunk] {
        &self.chunks
    }

    /// Number of chunks per source label.
    pub fn source_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for chunk in &self.chunks {
            *counts.entry(chunk.source.clone()).or_insert(0) += 1;
        }
        counts
    }

    fn check_embedder(&self, embedder: &dyn Embedder) -> CorepResult<()> {
        if !self.chunks.is_empty() && embedder.model_id() != self.embedding_model {
            return Err(CorepError::InvalidInput(format!(
                "store holds {} vectors, cannot add {} vectors",
                self.embedding_model,
                embedder.model_id()
            )));
        }
        Ok(())
    }

    /// Chunk, embed and store one document.
    ///
    /// Any chunks previously stored under the same `source_label` are replaced.
    ///
    /// # Returns
    /// The number of chunks stored for this document.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the label is blank or the embedder differs from the one
    /// that produced the stored vectors, or `Embedding` if the embedder fails.
    pub async fn ingest(
        &mut self,
        embedder: &dyn Embedder,
        source_label: &str,
        text: &str,
    ) -> CorepResult<usize> {
        let source_label = source_label.trim();
        if source_label.is_empty() {
            return Err(CorepError::InvalidInput(
                "source label cannot be empty".into(),
            ));
        }
        self.check_embedder(embedder)?;

        let pieces = chunk_document(text);
        let embeddings = embedder.embed(&pieces).await?;
        if embeddings.len() != pieces.len() {
            return Err(CorepError::Embedding(format!(
                "expected {} vectors, got {}",
                pieces.len(),
                embeddings.len()
            )));
        }

        self.chunks.retain(|c| c.source != source_label);
        self.embedding_model = embedder.model_id().to_string();

        let count = pieces.len();
        self.chunks.extend(
            pieces
                .into_iter()
                .zip(embeddings)
                .enumerate()
                .map(|(i, (text, embedding))| DocumentChunk {
                    id: format!("{source_label}_{i}"),
                    source: source_label.to_string(),
                    text,
                    embedding,
                }),
        );

        tracing::info!("ingested {} chunks from {}", count, source_label);
        Ok(count)
    }

    /// Full re-ingest: the store ends up holding exactly `documents`.
    ///
    /// `documents` is a list of `(source_label, text)` pairs. On error the previous contents
    /// are kept.
    pub async fn replace_all(
        &mut self,
        embedder: &dyn Embedder,
        documents: &[(String, String)],
    ) -> CorepResult<usize> {
        let mut fresh = DocumentStore::new(embedder.model_id());
        for (source, text) in documents {
            fresh.ingest(embedder, source, text).await?;
        }
        *self = fresh;
        Ok(self.len())
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    /// Return the `k` chunks most similar to `query_embedding`.
    ///
    /// Results are ordered by descending score; equal scores keep insertion order so identical
    /// inputs always give identical output.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Vec<ScoredChunk<'_>> {
        let mut scored: Vec<ScoredChunk<'_>> = self
            .chunks
            .iter()
            .map(|chunk| ScoredChunk {
                chunk,
                score: cosine_similarity(query_embedding, &chunk.embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored
    }

    /// Write the store to a JSON snapshot, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> CorepResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(CorepError::FileWrite)?;
        }
        let snapshot = StoreSnapshot {
            embedding_model: self.embedding_model.clone(),
            chunks: self.chunks.clone(),
        };
        let json = serde_json::to_string_pretty(&snapshot).map_err(CorepError::Serialization)?;
        fs::write(path, json).map_err(CorepError::FileWrite)
    }

    /// Load a snapshot, or return an empty store if `path` does not exist.
    ///
    /// If the snapshot was produced by a different embedder, the stored text is re-embedded
    /// with `embedder`.
    pub async fn load_or_empty(path: &Path, embedder: &dyn Embedder) -> CorepResult<Self> {
        if !path.exists() {
            tracing::warn!(
                "document store snapshot not found at {}, starting empty",
                path.display()
            );
            return Ok(Self::new(embedder.model_id()));
        }

        let contents = fs::read_to_string(path).map_err(CorepError::FileRead)?;
        let snapshot: StoreSnapshot =
            serde_json::from_str(&contents).map_err(CorepError::Deserialization)?;

        let mut store = Self {
            embedding_model: snapshot.embedding_model,
            chunks: snapshot.chunks,
        };

        if store.embedding_model != embedder.model_id() && !store.chunks.is_empty() {
            tracing::warn!(
                "snapshot embedded with {}, re-embedding {} chunks with {}",
                store.embedding_model,
                store.chunks.len(),
                embedder.model_id()
            );
            let texts: Vec<String> = store.chunks.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder.embed(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(CorepError::Embedding(format!(
                    "expected {} vectors, got {}",
                    texts.len(),
                    vectors.len()
                )));
            }
            for (chunk, vector) in store.chunks.iter_mut().zip(vectors) {
                chunk.embedding = vector;
            }
        }
        store.embedding_model = embedder.model_id().to_string();

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use tempfile::TempDir;

    const RULEBOOK: &str = "\
## 1.1.1 CET1 capital instruments
Ordinary shares qualify as Common Equity Tier 1 instruments where they are fully paid up and perpetual.

## 1.1.3 Retained earnings
Retained earnings count towards CET1 only once verified and net of foreseeable dividends.

## 2.1.2 Intangible assets
Goodwill and other intangible assets are deducted in full from CET1 capital.
";

    #[test]
    fn test_chunk_document_keeps_headers_with_paragraphs() {
        let chunks = chunk_document(RULEBOOK);
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].starts_with("## 1.1.1 CET1 capital instruments\nOrdinary shares"));
        assert!(chunks.iter().all(|c| !c.trim().is_empty()));
    }

    #[test]
    fn test_chunk_document_merges_short_fragment_into_next_paragraph() {
        let text = "Short intro.\n\nThis paragraph is long enough to stand on its own as a retrievable chunk of text.\n";
        let chunks = chunk_document(text);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].starts_with("Short intro.\n\nThis paragraph"));
    }

    #[test]
    fn test_chunk_document_of_blank_text_is_empty() {
        assert!(chunk_document("\n\n   \n").is_empty());
    }

    #[tokio::test]
    async fn test_ingest_replaces_chunks_for_same_source() {
        let embedder = HashingEmbedder::default();
        let mut store = DocumentStore::new(embedder.model_id());

        store
            .ingest(&embedder, "PRA_Rulebook", RULEBOOK)
            .await
            .expect("ingest should succeed");
        store
            .ingest(&embedder, "COREP_Instructions", "## Row 010\nReport paid up capital instruments in row 010 of C 01.00.")
            .await
            .expect("ingest should succeed");
        assert_eq!(store.len(), 4);

        store
            .ingest(&embedder, "PRA_Rulebook", "## 1.2.1 AT1\nAT1 instruments must be perpetual and subordinated to Tier 2.")
            .await
            .expect("re-ingest should succeed");

        let counts = store.source_counts();
        assert_eq!(counts.get("PRA_Rulebook"), Some(&1));
        assert_eq!(counts.get("COREP_Instructions"), Some(&1));
        assert_eq!(store.chunks()[1].id, "PRA_Rulebook_0");
    }

    #[tokio::test]
    async fn test_ingest_rejects_blank_label() {
        let embedder = HashingEmbedder::default();
        let mut store = DocumentStore::new(embedder.model_id());
        let err = store
            .ingest(&embedder, "  ", RULEBOOK)
            .await
            .expect_err("should reject");
        assert!(matches!(err, CorepError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_search_orders_by_score_and_is_deterministic() {
        let embedder = HashingEmbedder::default();
        let mut store = DocumentStore::new(embedder.model_id());
        store
            .ingest(&embedder, "PRA_Rulebook", RULEBOOK)
            .await
            .expect("ingest should succeed");

        let query = embedder.embed_one("goodwill intangible assets deducted");
        let first: Vec<String> = store.search(&query, 2).iter().map(|s| s.chunk.id.clone()).collect();
        let second: Vec<String> = store.search(&query, 2).iter().map(|s| s.chunk.id.clone()).collect();

        assert_eq!(first, second);
        assert_eq!(first[0], "PRA_Rulebook_2");
        let scores: Vec<f32> = store.search(&query, 3).iter().map(|s| s.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_search_on_empty_store_returns_nothing() {
        let store = DocumentStore::new("hashing-256");
        assert!(store.search(&[1.0, 0.0], 5).is_empty());
    }

    #[tokio::test]
    async fn test_replace_all_drops_previous_contents() {
        let embedder = HashingEmbedder::default();
        let mut store = DocumentStore::new(embedder.model_id());
        store
            .ingest(&embedder, "Old", RULEBOOK)
            .await
            .expect("ingest should succeed");

        let count = store
            .replace_all(
                &embedder,
                &[("PRA_Rulebook".to_string(), RULEBOOK.to_string())],
            )
            .await
            .expect("replace_all should succeed");

        assert_eq!(count, 3);
        assert!(store.chunks().iter().all(|c| c.source == "PRA_Rulebook"));

        store.clear();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_preserves_retrieval() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nested").join("store.json");
        let embedder = HashingEmbedder::default();

        let mut store = DocumentStore::new(embedder.model_id());
        store
            .ingest(&embedder, "PRA_Rulebook", RULEBOOK)
            .await
            .expect("ingest should succeed");
        store.save(&path).expect("save should succeed");

        let loaded = DocumentStore::load_or_empty(&path, &embedder)
            .await
            .expect("load should succeed");
        assert_eq!(loaded.len(), store.len());

        let query = embedder.embed_one("retained earnings dividends");
        let before: Vec<&str> = store.search(&query, 3).iter().map(|s| s.chunk.id.as_str()).collect();
        let after: Vec<&str> = loaded.search(&query, 3).iter().map(|s| s.chunk.id.as_str()).collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_load_re_embeds_when_model_differs() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("store.json");

        let small = HashingEmbedder::new(16);
        let mut store = DocumentStore::new(small.model_id());
        store
            .ingest(&small, "PRA_Rulebook", RULEBOOK)
            .await
            .expect("ingest should succeed");
        store.save(&path).expect("save should succeed");

        let large = HashingEmbedder::new(128);
        let loaded = DocumentStore::load_or_empty(&path, &large)
            .await
            .expect("load should succeed");
        assert_eq!(loaded.embedding_model(), "hashing-128");
        assert!(loaded.chunks().iter().all(|c| c.embedding.len() == 128));
    }

    #[tokio::test]
    async fn test_load_missing_snapshot_yields_empty_store() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let embedder = HashingEmbedder::default();
        let store = DocumentStore::load_or_empty(&temp_dir.path().join("absent.json"), &embedder)
            .await
            .expect("load should succeed");
        assert!(store.is_empty());
    }
}
