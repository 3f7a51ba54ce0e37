//! Text embedders used by the document store and the retriever.
//!
//! Two interchangeable strategies sit behind the [`Embedder`] trait:
//!
//! - [`HashingEmbedder`]: deterministic lexical feature hashing. No external dependency, so
//!   ingestion, retrieval and tests work offline. It is a stand-in, not a semantic model.
//! - [`LlmEmbedder`]: a hosted embedding model reached through the `llm` crate.
//!
//! Vectors are compared with cosine similarity, so both embedders return L2-normalised output.

use crate::error::{CorepError, CorepResult};
use crate::reasoning::llm::map_backend;
use async_trait::async_trait;
use llm::builder::LLMBuilder;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier recorded in store snapshots; vectors from different ids are not comparable.
    fn model_id(&self) -> &str;

    /// Embed a batch of texts, returning one vector per input in the same order.
    async fn embed(&self, texts: &[String]) -> CorepResult<Vec<Vec<f32>>>;
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for empty, mismatched or zero-magnitude inputs rather than NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

fn normalise(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

// FNV-1a, 32-bit. Stable across builds, which matters because hashed vectors are persisted.
fn fnv1a(bytes: &[u8]) -> u32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u32::from(*b)).wrapping_mul(PRIME))
}

/// Deterministic feature-hashing embedder.
///
/// Lowercased alphanumeric tokens and adjacent token pairs are hashed into a fixed number of
/// buckets; the sign of each contribution comes from a second hash bit to reduce collisions.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self {
            dim,
            model_id: format!("hashing-{dim}"),
        }
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect()
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let bucket = (hash as usize) % self.dim;
        let sign = if hash & 0x8000_0000 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }

    /// Embed a single text synchronously.
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dim];
        let tokens = Self::tokens(text);

        for token in &tokens {
            self.add_feature(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        normalise(&mut vector);
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(crate::constants::HASHING_EMBEDDING_DIM)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, texts: &[String]) -> CorepResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Remote embedding model reached through the `llm` crate.
#[derive(Debug, Clone)]
pub struct LlmEmbedder {
    provider: String,
    model: String,
    api_key: String,
    model_id: String,
}

impl LlmEmbedder {
    pub fn new(provider: &str, model: &str, api_key: &str) -> CorepResult<Self> {
        map_backend(provider)?;
        Ok(Self {
            provider: provider.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            model_id: format!("{provider}:{model}"),
        })
    }
}

#[async_trait]
impl Embedder for LlmEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, texts: &[String]) -> CorepResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = LLMBuilder::new()
            .backend(map_backend(&self.provider)?)
            .model(&self.model);
        if !self.api_key.is_empty() {
            builder = builder.api_key(&self.api_key);
        }
        let provider = builder
            .build()
            .map_err(|e| CorepError::Embedding(format!("build embedder: {e}")))?;

        let mut vectors = provider
            .embed(texts.to_vec())
            .await
            .map_err(|e| CorepError::Embedding(format!("embed: {e}")))?;

        if vectors.len() != texts.len() {
            return Err(CorepError::Embedding(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        vectors.iter_mut().for_each(|v| normalise(v));
        Ok(vectors)
    }
}
