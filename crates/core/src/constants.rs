//! Constants used throughout the COREP core crate.
//!
//! Defaults for configuration, chunking and the Own Funds field codes the validator and the
//! heuristic reasoner refer to by name.

/// Default location of the persisted document store snapshot.
pub const DEFAULT_STORE_PATH: &str = "data/document_store.json";

/// Default REST bind address.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:8000";

/// Default number of chunks returned by the retriever.
pub const DEFAULT_MAX_RETRIEVAL_RESULTS: usize = 5;

/// Default deadline for one model call.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;

/// Model calls per reasoning request (first attempt plus one retry).
pub const LLM_MAX_ATTEMPTS: u32 = 2;

/// Slack added on top of all model attempts when deriving the request deadline.
pub const REASONING_DEADLINE_MARGIN_SECS: u64 = 5;

pub const DEFAULT_LLM_PROVIDER: &str = "openai";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Dimension of the feature-hashing embedder.
pub const HASHING_EMBEDDING_DIM: usize = 256;

/// Paragraph-level chunks shorter than this are merged into the next paragraph.
pub const MIN_CHUNK_CHARS: usize = 50;

/// Marker used for values that cannot be determined.
pub const NOT_AVAILABLE: &str = "N/A";

/// Optional file in an ingestion folder mapping file names to source labels.
pub const SOURCES_MANIFEST_FILENAME: &str = "sources.yaml";

/// Own Funds template code.
pub const OWN_FUNDS_TEMPLATE_CODE: &str = "C_01.00";

/// Common Equity Tier 1 capital.
pub const CET1_FIELD: &str = "C_01.00_r120";
/// Tier 1 capital (CET1 + AT1).
pub const TIER1_FIELD: &str = "C_01.00_r170";
/// Total capital (Tier 1 + Tier 2).
pub const TOTAL_CAPITAL_FIELD: &str = "C_01.00_r230";
