//! Wire contract for the COREP reporting assistant.
//!
//! These are the request and response bodies exchanged with collaborators (the dashboard,
//! the CLI, tests). They carry OpenAPI schemas so the REST crate can publish them.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Template code used when a query does not name one.
pub const DEFAULT_TEMPLATE_CODE: &str = "C_01.00";

fn default_template_code() -> String {
    DEFAULT_TEMPLATE_CODE.to_string()
}

/// Incoming regulatory query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QueryReq {
    /// Natural-language question, e.g. "How should we report our share capital?"
    pub question: String,
    /// Free-text description of the reporting scenario.
    pub scenario: String,
    /// COREP template code, defaults to `C_01.00`.
    #[serde(default = "default_template_code")]
    pub template_code: String,
}

/// One template field the reasoning step chose to populate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PopulatedField {
    pub field_code: String,
    pub field_name: String,
    /// Reported amount (e.g. `£500M`) or `N/A` when it cannot be determined.
    pub value: String,
    #[serde(default)]
    pub justification: String,
    /// Regulatory reference the value was mapped from.
    #[serde(default)]
    pub source_rule: String,
}

/// A retrieved regulatory snippet, returned for transparency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContextItem {
    pub source: String,
    pub content: String,
    /// Cosine similarity between the query and this chunk.
    pub score: f32,
}

/// Full answer to a regulatory query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QueryRes {
    pub query_id: String,
    pub template_code: String,
    /// `heuristic` or `llm`.
    pub reasoning_mode: String,
    /// RFC 3339 UTC timestamp.
    pub generated_at: String,
    pub fields: Vec<PopulatedField>,
    pub validation_flags: Vec<String>,
    pub audit_log: Vec<String>,
    pub formatted_output: String,
    pub retrieved_context: Vec<ContextItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub status: String,
    pub documents_loaded: usize,
    pub reasoning_mode: String,
    pub embedding_model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TemplateSummary {
    pub code: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ListTemplatesRes {
    pub templates: Vec<TemplateSummary>,
}

/// Field descriptor as published by `GET /api/templates/{code}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TemplateFieldRes {
    pub field_code: String,
    pub field_name: String,
    pub description: String,
    pub is_deduction: bool,
    pub calculation: Option<String>,
    pub validation_rules: Vec<String>,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TemplateDetailRes {
    pub code: String,
    pub name: String,
    pub description: String,
    pub fields: Vec<TemplateFieldRes>,
}

/// Error body returned with every non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    /// Machine-readable kind: `not_found`, `malformed_request`, `backend_unavailable`,
    /// `backend_timeout` or `internal`.
    pub error: String,
    pub message: String,
}
