//! Typed contract for model replies.
//!
//! The reply must contain one JSON object with a `fields` array. Anything outside the object
//! (prose, code fences) is ignored. A reply without a usable object is `MalformedResponse`;
//! individual field records that do not fit the contract are discarded with a flag so that
//! the rest of the answer survives.

use super::{ReasoningMode, ReasoningOutput};
use crate::constants::NOT_AVAILABLE;
use crate::error::{CorepError, CorepResult};
use crate::templates::Template;
use api_shared::wire::PopulatedField;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct ModelReply {
    #[serde(default)]
    template: Option<String>,
    fields: Vec<Value>,
    #[serde(default)]
    validation_flags: Vec<String>,
    #[serde(default)]
    audit_log: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ModelField {
    field_code: String,
    #[serde(default)]
    field_name: Option<String>,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    justification: Option<String>,
    #[serde(default)]
    source_rule: Option<String>,
}

/// Slice from the first `{` to the last `}`.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(NOT_AVAILABLE.to_string()),
        _ => None,
    }
}

/// Parse a raw model reply into reasoning output for `template`.
///
/// # Errors
/// Returns `MalformedResponse` when no JSON object can be found or the object lacks a
/// `fields` array.
pub fn parse_reply(raw: &str, template: &Template) -> CorepResult<ReasoningOutput> {
    let json = extract_json_object(raw)
        .ok_or_else(|| CorepError::MalformedResponse("reply contains no JSON object".into()))?;
    let reply: ModelReply = serde_json::from_str(json)
        .map_err(|e| CorepError::MalformedResponse(format!("reply does not match schema: {e}")))?;

    let mut output = ReasoningOutput::empty(ReasoningMode::Llm);
    output.flags = reply.validation_flags;
    output.notes = reply.audit_log;

    if let Some(code) = reply.template.as_deref() {
        if code != template.template_code {
            output.flags.push(format!(
                "Backend answered for template {code}, expected {}",
                template.template_code
            ));
        }
    }

    for (index, record) in reply.fields.into_iter().enumerate() {
        let field: ModelField = match serde_json::from_value(record) {
            Ok(field) => field,
            Err(e) => {
                tracing::debug!("discarding field record {}: {}", index, e);
                output
                    .flags
                    .push(format!("Discarded field record {index}: {e}"));
                continue;
            }
        };

        let Some(value) = value_text(&field.value) else {
            output.flags.push(format!(
                "Discarded field {}: value is not text or a number",
                field.field_code
            ));
            continue;
        };

        let field_name = field
            .field_name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| template.field(&field.field_code).map(|f| f.field_name.clone()))
            .unwrap_or_default();

        output.fields.push(PopulatedField {
            field_code: field.field_code,
            field_name,
            value,
            justification: field.justification.unwrap_or_default(),
            source_rule: field.source_rule.unwrap_or_default(),
        });
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::TemplateCatalog;

    fn own_funds() -> Template {
        TemplateCatalog::builtin()
            .expect("builtin catalog should load")
            .get_template("C_01.00")
            .expect("template exists")
            .clone()
    }

    #[test]
    fn test_parse_reply_accepts_fenced_json() {
        let raw = r#"Here you go:
```json
{
  "template": "C_01.00",
  "fields": [
    {"field_code": "C_01.00_r010", "field_name": "Shares", "value": "£500M",
     "justification": "Ordinary shares", "source_rule": "PRA Rulebook 1.1.1"}
  ],
  "validation_flags": [],
  "audit_log": ["Identified ordinary shares"]
}
```"#;

        let output = parse_reply(raw, &own_funds()).expect("should parse");
        assert_eq!(output.mode, ReasoningMode::Llm);
        assert_eq!(output.fields.len(), 1);
        assert_eq!(output.fields[0].value, "£500M");
        assert_eq!(output.notes, vec!["Identified ordinary shares".to_string()]);
        assert!(output.flags.is_empty());
    }

    #[test]
    fn test_parse_reply_stringifies_numbers_and_nulls() {
        let raw = r#"{"fields": [
            {"field_code": "C_01.00_r010", "value": 500000000},
            {"field_code": "C_01.00_r020", "value": null}
        ]}"#;

        let output = parse_reply(raw, &own_funds()).expect("should parse");
        assert_eq!(output.fields[0].value, "500000000");
        assert_eq!(
            output.fields[0].field_name,
            "Capital instruments and related share premium accounts"
        );
        assert_eq!(output.fields[1].value, "N/A");
    }

    #[test]
    fn test_parse_reply_discards_bad_records_but_keeps_the_rest() {
        let raw = r#"{"fields": [
            {"value": "£1M"},
            {"field_code": "C_01.00_r020", "value": {"amount": 1}},
            {"field_code": "C_01.00_r030", "value": "£5M"}
        ]}"#;

        let output = parse_reply(raw, &own_funds()).expect("should parse");
        assert_eq!(output.fields.len(), 1);
        assert_eq!(output.fields[0].field_code, "C_01.00_r030");
        assert_eq!(output.flags.len(), 2);
    }

    #[test]
    fn test_parse_reply_without_json_is_malformed() {
        let err = parse_reply("I cannot help with that.", &own_funds()).expect_err("should fail");
        assert!(matches!(err, CorepError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_reply_without_fields_is_malformed() {
        let err = parse_reply(r#"{"answer": 42}"#, &own_funds()).expect_err("should fail");
        assert!(matches!(err, CorepError::MalformedResponse(msg) if msg.contains("fields")));
    }

    #[test]
    fn test_parse_reply_flags_wrong_template() {
        let output = parse_reply(r#"{"template": "C_02.00", "fields": []}"#, &own_funds())
            .expect("should parse");
        assert!(output.flags[0].contains("C_02.00"));
    }
}
