//! Human-readable rendering of a populated template.
//!
//! ```text
//! COREP Template: Own Funds (C_01.00)
//! ================================================================================
//!
//! [C_01.00_r010] Capital instruments and related share premium accounts
//!   Value: £500M
//!   Justification: Ordinary shares meeting CRR Article 28 criteria
//!   Source: PRA Rulebook 1.1.1
//! ```
//!
//! Multi-line text is written as indented continuation lines so that
//! [`parse_formatted_output`] can restore it exactly.

use super::Template;
use api_shared::wire::PopulatedField;

const RULE_WIDTH: usize = 80;
const VALUE_PREFIX: &str = "  Value:";
const JUSTIFICATION_PREFIX: &str = "  Justification:";
const SOURCE_PREFIX: &str = "  Source:";
const CONTINUATION: &str = "    ";

/// One field block recovered from a rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormattedEntry {
    pub field_code: String,
    pub field_name: String,
    pub value: String,
    pub justification: String,
    pub source_rule: String,
}

fn push_labelled(out: &mut Vec<String>, prefix: &str, text: &str) {
    let mut lines = text.split('\n');
    let first = lines.next().unwrap_or_default();
    out.push(format!("{prefix} {first}"));
    for line in lines {
        out.push(format!("{CONTINUATION}{line}"));
    }
}

/// Render populated fields in template order of appearance in `fields`.
///
/// Field names come from the template when the code is known; unknown codes are rendered
/// with the name supplied by the reasoning step so nothing is silently dropped.
pub fn format_template_output(template: &Template, fields: &[PopulatedField]) -> String {
    let mut out = vec![
        format!(
            "COREP Template: {} ({})",
            template.template_name, template.template_code
        ),
        "=".repeat(RULE_WIDTH),
        String::new(),
    ];

    for field in fields {
        let name = template
            .field(&field.field_code)
            .map_or(field.field_name.as_str(), |f| f.field_name.as_str());

        out.push(format!("[{}] {}", field.field_code, name));
        push_labelled(&mut out, VALUE_PREFIX, &field.value);
        if !field.justification.is_empty() {
            push_labelled(&mut out, JUSTIFICATION_PREFIX, &field.justification);
        }
        if !field.source_rule.is_empty() {
            push_labelled(&mut out, SOURCE_PREFIX, &field.source_rule);
        }
        out.push(String::new());
    }

    out.join("\n")
}

#[derive(Clone, Copy)]
enum Slot {
    Value,
    Justification,
    Source,
}

fn strip_label<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(prefix)?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Parse a rendering produced by [`format_template_output`] back into field entries.
pub fn parse_formatted_output(text: &str) -> Vec<FormattedEntry> {
    let mut entries: Vec<FormattedEntry> = Vec::new();
    let mut slot: Option<Slot> = None;

    for line in text.lines() {
        if let Some(header) = line.strip_prefix('[') {
            if let Some((code, name)) = header.split_once("] ") {
                entries.push(FormattedEntry {
                    field_code: code.to_string(),
                    field_name: name.to_string(),
                    ..FormattedEntry::default()
                });
                slot = None;
                continue;
            }
        }

        let Some(entry) = entries.last_mut() else {
            continue;
        };

        if let Some(rest) = line.strip_prefix(CONTINUATION) {
            let target = match slot {
                Some(Slot::Value) => &mut entry.value,
                Some(Slot::Justification) => &mut entry.justification,
                Some(Slot::Source) => &mut entry.source_rule,
                None => continue,
            };
            target.push('\n');
            target.push_str(rest);
        } else if let Some(rest) = strip_label(line, VALUE_PREFIX) {
            entry.value = rest.to_string();
            slot = Some(Slot::Value);
        } else if let Some(rest) = strip_label(line, JUSTIFICATION_PREFIX) {
            entry.justification = rest.to_string();
            slot = Some(Slot::Justification);
        } else if let Some(rest) = strip_label(line, SOURCE_PREFIX) {
            entry.source_rule = rest.to_string();
            slot = Some(Slot::Source);
        } else {
            slot = None;
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::TemplateCatalog;

    fn field(code: &str, value: &str, justification: &str, source: &str) -> PopulatedField {
        PopulatedField {
            field_code: code.into(),
            field_name: "from reasoning".into(),
            value: value.into(),
            justification: justification.into(),
            source_rule: source.into(),
        }
    }

    #[test]
    fn test_format_uses_template_names_and_header() {
        let catalog = TemplateCatalog::builtin().expect("builtin catalog should load");
        let template = catalog.get_template("C_01.00").expect("template exists");
        let text = format_template_output(
            template,
            &[field("C_01.00_r010", "£500M", "Ordinary shares", "PRA Rulebook 1.1.1")],
        );

        assert!(text.starts_with("COREP Template: Own Funds (C_01.00)\n"));
        assert!(text.contains(
            "[C_01.00_r010] Capital instruments and related share premium accounts\n  Value: £500M"
        ));
        assert!(text.contains("  Source: PRA Rulebook 1.1.1"));
    }

    #[test]
    fn test_parse_reproduces_value_and_justification_for_every_field() {
        let catalog = TemplateCatalog::builtin().expect("builtin catalog should load");
        let template = catalog.get_template("C_01.00").expect("template exists");
        let fields = vec![
            field("C_01.00_r010", "£500M", "Ordinary shares\nfully paid up", "PRA Rulebook 1.1.1"),
            field("C_01.00_r020", "N/A", "", ""),
            field("C_01.00_r130", "£100M", "  indented text\n\n    deep", "PRA Rulebook 1.2.1"),
            field("C_09.99_r999", "£1M", "unknown row", "somewhere"),
        ];

        let parsed = parse_formatted_output(&format_template_output(template, &fields));

        assert_eq!(parsed.len(), fields.len());
        for (entry, original) in parsed.iter().zip(&fields) {
            assert_eq!(entry.field_code, original.field_code);
            assert_eq!(entry.value, original.value);
            assert_eq!(entry.justification, original.justification);
            assert_eq!(entry.source_rule, original.source_rule);
        }
        assert_eq!(parsed[3].field_name, "from reasoning");
    }

    #[test]
    fn test_parse_ignores_preamble() {
        assert!(parse_formatted_output("COREP Template: X (Y)\n=====\n").is_empty());
    }
}
