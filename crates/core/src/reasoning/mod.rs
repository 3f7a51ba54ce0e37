//! Mapping a scenario onto template fields.
//!
//! Reasoning is a strategy selected once at start-up:
//!
//! - [`HeuristicReasoner`]: deterministic keyword and amount matching, no external calls
//! - [`LlmReasoner`]: prompt a generative model and parse its reply against a typed contract
//! - [`FallbackReasoner`]: wraps a model-backed reasoner and runs the heuristic when the
//!   backend is unavailable
//!
//! The orchestrator only sees `dyn Reasoner`.

pub mod heuristic;
pub mod llm;
mod parse;
mod prompt;

pub use heuristic::HeuristicReasoner;
pub use llm::{ChatBackend, LlmChatBackend, LlmReasoner, LlmSettings};
pub use parse::parse_reply;

use crate::error::{CorepError, CorepResult};
use crate::retriever::RetrievedChunk;
use crate::templates::Template;
use api_shared::wire::PopulatedField;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningMode {
    Heuristic,
    Llm,
}

impl ReasoningMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningMode::Heuristic => "heuristic",
            ReasoningMode::Llm => "llm",
        }
    }
}

impl std::fmt::Display for ReasoningMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReasoningMode {
    type Err = CorepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "heuristic" | "demo" => Ok(ReasoningMode::Heuristic),
            "llm" | "model" => Ok(ReasoningMode::Llm),
            other => Err(CorepError::InvalidConfig(format!(
                "unknown reasoning mode: {other} (expected heuristic or llm)"
            ))),
        }
    }
}

/// Everything a reasoner may look at for one query.
#[derive(Debug, Clone, Copy)]
pub struct ReasoningRequest<'a> {
    pub question: &'a str,
    pub scenario: &'a str,
    pub template: &'a Template,
    pub context: &'a [RetrievedChunk],
}

/// Result of one reasoning pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningOutput {
    /// Strategy that actually produced the fields.
    pub mode: ReasoningMode,
    pub fields: Vec<PopulatedField>,
    /// Issues raised during reasoning (backend-reported or parse problems).
    pub flags: Vec<String>,
    /// Narrative steps for the audit trail.
    pub notes: Vec<String>,
}

impl ReasoningOutput {
    pub fn empty(mode: ReasoningMode) -> Self {
        Self {
            mode,
            fields: Vec::new(),
            flags: Vec::new(),
            notes: Vec::new(),
        }
    }
}

#[async_trait]
pub trait Reasoner: Send + Sync {
    fn mode(&self) -> ReasoningMode;

    /// Populate template fields for one request.
    ///
    /// # Errors
    /// `BackendUnavailable` when a backend cannot be reached, `MalformedResponse` when its
    /// reply does not match the expected structure.
    async fn generate(&self, request: &ReasoningRequest<'_>) -> CorepResult<ReasoningOutput>;
}

/// Model-backed reasoning with a heuristic safety net.
pub struct FallbackReasoner {
    primary: Box<dyn Reasoner>,
    fallback: HeuristicReasoner,
}

impl FallbackReasoner {
    pub fn new(primary: Box<dyn Reasoner>, fallback: HeuristicReasoner) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl Reasoner for FallbackReasoner {
    fn mode(&self) -> ReasoningMode {
        self.primary.mode()
    }

    async fn generate(&self, request: &ReasoningRequest<'_>) -> CorepResult<ReasoningOutput> {
        match self.primary.generate(request).await {
            Err(CorepError::BackendUnavailable(reason)) => {
                tracing::warn!("reasoning backend unavailable, using heuristic: {}", reason);
                let mut output = self.fallback.generate(request).await?;
                output.flags.insert(
                    0,
                    format!("Reasoning backend unavailable ({reason}); heuristic fallback used"),
                );
                output
                    .notes
                    .insert(0, "Fell back to heuristic reasoning after backend failure".into());
                Ok(output)
            }
            other => other,
        }
    }
}
