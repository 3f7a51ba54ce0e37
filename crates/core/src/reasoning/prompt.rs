use super::ReasoningRequest;
use crate::constants::NOT_AVAILABLE;
use std::fmt::Write;

pub(crate) const SYSTEM_PROMPT: &str = "You are a regulatory reporting assistant supporting UK banks in preparing PRA COREP returns.

Map the reporting scenario onto the fields of the given COREP template using only the regulatory context provided.

Rules:
- Do not invent regulatory rules or interpretations.
- Populate only fields that the scenario and the context justify.
- If an amount cannot be determined, answer \"N/A\" for that field and explain the gap in validation_flags.
- Every populated field must cite the regulation it relies on in source_rule, using the field reference or a context source label.
- Deductions are reported as positive amounts.
- Answer with a single JSON object that follows the schema exactly and nothing else.";

/// Build the user turn: question, scenario, template fields, retrieved context and schema.
pub(crate) fn user_message(request: &ReasoningRequest<'_>) -> String {
    let template = request.template;
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "User question:\n{}\n", request.question.trim());
    let _ = writeln!(out, "Reporting scenario:\n{}\n", request.scenario.trim());
    let _ = writeln!(
        out,
        "COREP template: {} ({})",
        template.template_name, template.template_code
    );
    for field in &template.fields {
        let _ = write!(
            out,
            "- {} | {} | reference: {}",
            field.field_code, field.field_name, field.reference
        );
        if let Some(calc) = &field.calculation {
            let _ = write!(out, " | computed as {calc}");
        }
        if !field.validation_rules.is_empty() {
            let rules: Vec<&str> = field.validation_rules.iter().map(|r| r.description()).collect();
            let _ = write!(out, " | rules: {}", rules.join("; "));
        }
        out.push('\n');
    }

    out.push_str("\nRetrieved regulatory context:\n");
    if request.context.is_empty() {
        out.push_str("(no regulatory context retrieved)\n");
    }
    for chunk in request.context {
        let _ = writeln!(
            out,
            "[Source: {} | relevance {:.2}]\n{}\n",
            chunk.source, chunk.score, chunk.content
        );
    }

    let _ = write!(
        out,
        r#"
Required output schema:
{{
  "template": "{code}",
  "fields": [
    {{
      "field_code": "{code}_rXXX",
      "field_name": "Field name",
      "value": "Amount such as £500M, or {na} if it cannot be determined",
      "justification": "Why this value applies",
      "source_rule": "Regulatory reference, e.g. PRA Rulebook 1.1.1"
    }}
  ],
  "validation_flags": ["Missing data, ambiguities or inconsistencies"],
  "audit_log": ["Reasoning steps for key decisions"]
}}

Respond with the JSON object now."#,
        code = template.template_code,
        na = NOT_AVAILABLE,
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retriever::RetrievedChunk;
    use crate::templates::TemplateCatalog;

    #[test]
    fn test_user_message_lists_fields_and_context() {
        let catalog = TemplateCatalog::builtin().expect("builtin catalog should load");
        let template = catalog.get_template("C_01.00").expect("template exists");
        let context = vec![RetrievedChunk {
            source: "PRA_Rulebook".into(),
            content: "1.1.1 CET1 instruments must be fully paid up.".into(),
            score: 0.42,
        }];
        let request = ReasoningRequest {
            question: "How should ordinary shares be reported?",
            scenario: "£500M of ordinary shares",
            template,
            context: &context,
        };

        let message = user_message(&request);
        assert!(message.contains("£500M of ordinary shares"));
        assert!(message.contains("- C_01.00_r120 | Common Equity Tier 1 (CET1) capital"));
        assert!(message.contains("computed as (r010 + r020 + r030 + r040) - r110"));
        assert!(message.contains("[Source: PRA_Rulebook | relevance 0.42]"));
        assert!(message.contains("\"template\": \"C_01.00\""));
    }

    #[test]
    fn test_user_message_notes_empty_context() {
        let catalog = TemplateCatalog::builtin().expect("builtin catalog should load");
        let template = catalog.get_template("C_01.00").expect("template exists");
        let request = ReasoningRequest {
            question: "q",
            scenario: "s",
            template,
            context: &[],
        };
        assert!(user_message(&request).contains("(no regulatory context retrieved)"));
    }
}
