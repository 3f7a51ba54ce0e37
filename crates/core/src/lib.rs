//! # COREP Core
//!
//! Core business logic for the COREP regulatory reporting assistant.
//!
//! This crate answers natural-language questions about how a scenario should be reported in a
//! PRA COREP template:
//! - regulatory text is chunked, embedded and kept in a [`DocumentStore`]
//! - the [`Retriever`] selects the chunks most relevant to a query
//! - a [`Reasoner`] maps the scenario onto template fields (model-backed or heuristic)
//! - the [`Validator`] checks the fields against template and cross-field rules
//! - [`QueryService`] runs those stages in order and assembles an auditable answer
//!
//! **No API concerns**: HTTP servers and command-line handling belong in `api-rest` and the
//! binaries.

pub mod amount;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod query;
pub mod reasoning;
pub mod retriever;
pub mod store;
pub mod templates;
pub mod validator;

pub use config::{CoreConfig, EmbeddingMode};
pub use embedding::{Embedder, HashingEmbedder, LlmEmbedder};
pub use error::{CorepError, CorepResult};
pub use query::QueryService;
pub use reasoning::{Reasoner, ReasoningMode};
pub use retriever::{RetrievedChunk, Retriever};
pub use store::DocumentStore;
pub use templates::{Template, TemplateCatalog};
pub use validator::{ValidationReport, Validator};
