//! Query orchestration.
//!
//! One query runs retrieval, reasoning and validation in that order, each stage consuming the
//! previous stage's output. The result carries everything needed to audit the answer: the
//! retrieved context, the populated fields, every flag raised and an audit log of each step.

use crate::error::{CorepError, CorepResult};
use crate::reasoning::{Reasoner, ReasoningOutput, ReasoningRequest};
use crate::retriever::Retriever;
use crate::templates::{format_template_output, TemplateCatalog};
use crate::validator::{ValidationReport, Validator};
use api_shared::wire::{ContextItem, QueryReq, QueryRes, DEFAULT_TEMPLATE_CODE};
use corep_types::NonEmptyText;
use std::sync::Arc;
use std::time::Duration;

/// Flag raised when retrieval finds nothing to ground the answer in.
pub const NO_CONTEXT_FLAG: &str =
    "No regulatory context found in the document store; citations could not be checked against retrieved text";

#[derive(Clone)]
pub struct QueryService {
    catalog: Arc<TemplateCatalog>,
    retriever: Retriever,
    reasoner: Arc<dyn Reasoner>,
    validator: Validator,
    max_results: usize,
    reasoning_timeout: Duration,
}

impl QueryService {
    pub fn new(
        catalog: Arc<TemplateCatalog>,
        retriever: Retriever,
        reasoner: Arc<dyn Reasoner>,
        max_results: usize,
        reasoning_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            retriever,
            reasoner,
            validator: Validator::new(),
            max_results,
            reasoning_timeout,
        }
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn reasoner(&self) -> &dyn Reasoner {
        self.reasoner.as_ref()
    }

    /// Answer one regulatory query.
    ///
    /// # Errors
    /// - `InvalidInput` if the question or scenario is blank
    /// - `TemplateNotFound` for an unknown template code
    /// - `BackendUnavailable` / `BackendTimeout` if reasoning cannot complete
    /// - `Embedding` if the query cannot be embedded
    ///
    /// A malformed reasoning reply is not an error: the answer comes back with no fields and
    /// a flag explaining why.
    pub async fn run(&self, req: &QueryReq) -> CorepResult<QueryRes> {
        let question = NonEmptyText::new(&req.question)
            .map_err(|_| CorepError::InvalidInput("question must not be empty".into()))?;
        let scenario = NonEmptyText::new(&req.scenario)
            .map_err(|_| CorepError::InvalidInput("scenario must not be empty".into()))?;
        let template_code = match req.template_code.trim() {
            "" => DEFAULT_TEMPLATE_CODE,
            code => code,
        };
        let template = self.catalog.get_template(template_code)?;

        let query_id = uuid::Uuid::new_v4().to_string();
        tracing::info!("query {} accepted for template {}", query_id, template_code);

        let mut flags: Vec<String> = Vec::new();
        let mut audit: Vec<String> = Vec::new();

        // Retrieval
        let retrieval_text = format!("{question}\n{scenario}");
        let context = self
            .retriever
            .retrieve(&retrieval_text, self.max_results)
            .await?;
        tracing::info!("query {} retrieved {} chunks", query_id, context.len());

        audit.push(format!(
            "Retrieved {} regulatory context chunks (top {})",
            context.len(),
            self.max_results
        ));
        for chunk in &context {
            audit.push(format!("Context from {} (score {:.3})", chunk.source, chunk.score));
        }
        if context.is_empty() {
            flags.push(NO_CONTEXT_FLAG.to_string());
        }

        // Reasoning
        let request = ReasoningRequest {
            question: question.as_str(),
            scenario: scenario.as_str(),
            template,
            context: &context,
        };
        let output = match tokio::time::timeout(
            self.reasoning_timeout,
            self.reasoner.generate(&request),
        )
        .await
        {
            Err(_) => {
                tracing::error!("query {} reasoning timed out", query_id);
                return Err(CorepError::BackendTimeout(self.reasoning_timeout.as_secs()));
            }
            Ok(Err(CorepError::MalformedResponse(reason))) => {
                tracing::warn!("query {} got a malformed reply: {}", query_id, reason);
                let mut output = ReasoningOutput::empty(self.reasoner.mode());
                output.flags.push(format!(
                    "Reasoning backend returned malformed output ({reason}); no fields populated"
                ));
                output
            }
            Ok(result) => result?,
        };
        tracing::info!(
            "query {} populated {} fields in {} mode",
            query_id,
            output.fields.len(),
            output.mode
        );

        audit.push(format!("Reasoning mode: {}", output.mode));
        audit.extend(output.notes.iter().cloned());
        for field in &output.fields {
            audit.push(format!(
                "[{}] {}: {} | Source: {} | Reasoning: {}",
                field.field_code,
                field.field_name,
                field.value,
                non_blank(&field.source_rule, "No source"),
                non_blank(&field.justification, "No justification"),
            ));
        }

        // Validation
        let mut report = ValidationReport {
            flags: output.flags.clone(),
            audit: Vec::new(),
        };
        report.extend(self.validator.validate(&output.fields, template));
        report.extend(
            self.validator
                .check_citations(&output.fields, template, &context),
        );

        for flag in report.flags {
            if !flags.contains(&flag) {
                flags.push(flag);
            }
        }
        audit.extend(report.audit);
        tracing::info!("query {} raised {} flags", query_id, flags.len());

        Ok(QueryRes {
            query_id,
            template_code: template.template_code.clone(),
            reasoning_mode: output.mode.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            formatted_output: format_template_output(template, &output.fields),
            fields: output.fields,
            validation_flags: flags,
            audit_log: audit,
            retrieved_context: context.iter().map(ContextItem::from).collect(),
        })
    }
}

fn non_blank<'a>(text: &'a str, fallback: &'a str) -> &'a str {
    if text.trim().is_empty() {
        fallback
    } else {
        text
    }
}
