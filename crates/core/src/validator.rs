//! Rule checks over populated fields.
//!
//! Validation never fails: every violated rule becomes a flag and every check performed,
//! passed or not, becomes an audit entry naming the regulatory reference it was checked
//! against. Flags are de-duplicated while keeping the order the checks ran in.

use crate::amount::{format_amount, is_missing, parse_value, ParsedValue};
use crate::constants::{CET1_FIELD, OWN_FUNDS_TEMPLATE_CODE, TIER1_FIELD, TOTAL_CAPITAL_FIELD};
use crate::retriever::RetrievedChunk;
use crate::templates::{RuleCheck, Template, TemplateField};
use api_shared::wire::PopulatedField;
use regex::Regex;
use std::sync::LazyLock;

/// Flags and audit entries produced by one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub flags: Vec<String>,
    pub audit: Vec<String>,
}

impl ValidationReport {
    fn flag(&mut self, flag: String) {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
    }

    fn check(&mut self, what: &str, passed: bool, reference: &str) {
        let outcome = if passed { "passed" } else { "failed" };
        self.audit.push(format!("Checked {what}: {outcome} ({reference})"));
    }

    /// Append another report, keeping flags unique.
    pub fn extend(&mut self, other: ValidationReport) {
        for flag in other.flags {
            self.flag(flag);
        }
        self.audit.extend(other.audit);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    /// Check every populated field against its template rules, then the Own Funds
    /// cross-field constraints when `template` is C 01.00.
    pub fn validate(&self, fields: &[PopulatedField], template: &Template) -> ValidationReport {
        let mut report = ValidationReport::default();

        for field in fields {
            match template.field(&field.field_code) {
                Some(definition) => check_field(&mut report, field, definition),
                None => {
                    report.flag(format!("Unknown field code: {}", field.field_code));
                    report.check(
                        &format!("{} is defined in the template", field.field_code),
                        false,
                        &template.template_code,
                    );
                }
            }
        }

        if template.template_code == OWN_FUNDS_TEMPLATE_CODE {
            check_own_funds_consistency(&mut report, fields, template);
        }

        report
    }

    /// Check that each citation names a retrieved source or the field's catalog reference.
    ///
    /// A citation is grounded when it contains the reference as a whole term (so `1.1.10`
    /// does not match `1.1.1`), or when it names a retrieved source label and every section
    /// number it quotes appears in a chunk retrieved from that source.
    pub fn check_citations(
        &self,
        fields: &[PopulatedField],
        template: &Template,
        context: &[RetrievedChunk],
    ) -> ValidationReport {
        let mut report = ValidationReport::default();
        let retrieved: Vec<(String, String)> = context
            .iter()
            .map(|c| (normalise(&c.source), c.content.to_lowercase()))
            .collect();

        for field in fields {
            let Some(definition) = template.field(&field.field_code) else {
                continue;
            };
            if field.source_rule.trim().is_empty() {
                continue;
            }

            let citation = normalise(&field.source_rule);
            let reference = normalise(&definition.reference);
            let sections: Vec<&str> = SECTION_NUMBER
                .find_iter(&citation)
                .map(|m| m.as_str())
                .collect();

            let grounded = (!reference.is_empty() && contains_term(&citation, &reference))
                || retrieved.iter().any(|(label, content)| {
                    !label.is_empty()
                        && contains_term(&citation, label)
                        && sections.iter().all(|section| contains_term(content, section))
                });

            if !grounded {
                report.flag(format!(
                    "Field {} cites '{}', which matches neither a retrieved source nor its reference ({})",
                    field.field_code, field.source_rule, definition.reference
                ));
            }
            report.check(
                &format!("citation for {} is grounded", field.field_code),
                grounded,
                &definition.reference,
            );
        }

        report
    }
}

static SECTION_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)+").expect("static regex is valid"));

fn normalise(text: &str) -> String {
    text.trim().to_lowercase().replace(['_', '-'], " ")
}

/// True when `needle` occurs in `haystack` not glued to a neighbouring word or number.
fn contains_term(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let mut after = haystack[start + matched.len()..].chars();
        let next = after.next();

        let open_before = before.map_or(true, |c| !c.is_alphanumeric() && c != '.');
        let open_after = match next {
            None => true,
            Some('.') => !after.next().is_some_and(|c| c.is_ascii_digit()),
            Some(c) => !c.is_alphanumeric(),
        };
        open_before && open_after
    })
}

fn check_field(report: &mut ValidationReport, field: &PopulatedField, definition: &TemplateField) {
    let code = &field.field_code;
    let reference = &definition.reference;

    let has_value = !is_missing(&field.value);
    if !has_value {
        report.flag(format!("Field {code} ({}) has no value", definition.field_name));
    }
    report.check(&format!("{code} has a value"), has_value, reference);

    let has_justification = !field.justification.trim().is_empty();
    if !has_justification {
        report.flag(format!("Field {code} missing justification"));
    }
    report.check(&format!("{code} has a justification"), has_justification, reference);

    let has_source = !field.source_rule.trim().is_empty();
    if !has_source {
        report.flag(format!("Field {code} missing regulatory source reference"));
    }
    report.check(&format!("{code} cites a regulatory source"), has_source, reference);

    for rule in &definition.validation_rules {
        match rule.check() {
            RuleCheck::NonNegativeValue => {
                if !has_value {
                    report
                        .audit
                        .push(format!("Skipped '{}' for {code}: no value", rule.description()));
                    continue;
                }
                let passed = match parse_value(&field.value) {
                    ParsedValue::Amount(amount) if amount < 0.0 => {
                        report.flag(format!(
                            "Field {code} must be non-negative (reported {})",
                            field.value
                        ));
                        false
                    }
                    ParsedValue::Invalid => {
                        report.flag(format!(
                            "Field {code} value '{}' is not a recognisable amount",
                            field.value
                        ));
                        false
                    }
                    _ => true,
                };
                report.check(&format!("{code} {}", rule.description().to_lowercase()), passed, reference);
            }
            RuleCheck::CrossField => report.audit.push(format!(
                "Rule '{}' for {code} evaluated in cross-field checks",
                rule.description()
            )),
            RuleCheck::ManualReview => report.audit.push(format!(
                "Manual review required for {code}: {} ({reference})",
                rule.description()
            )),
        }
    }
}

/// Reported amount of `code`, or zero with a flag when it is absent or unusable.
fn tier_amount(
    report: &mut ValidationReport,
    fields: &[PopulatedField],
    template: &Template,
    code: &str,
    label: &str,
) -> f64 {
    let amount = fields
        .iter()
        .find(|f| f.field_code == code)
        .and_then(|f| parse_value(&f.value).amount());

    amount.unwrap_or_else(|| {
        let reference = template.field(code).map_or(code, |f| f.reference.as_str());
        report.flag(format!("{label} ({code}) is missing; treated as zero"));
        report.check(&format!("{label} ({code}) is reported"), false, reference);
        0.0
    })
}

fn check_own_funds_consistency(
    report: &mut ValidationReport,
    fields: &[PopulatedField],
    template: &Template,
) {
    let cet1 = tier_amount(report, fields, template, CET1_FIELD, "CET1 capital");
    let tier1 = tier_amount(report, fields, template, TIER1_FIELD, "Tier 1 capital");
    let total = tier_amount(report, fields, template, TOTAL_CAPITAL_FIELD, "Total capital");

    let reference_of = |code: &str| {
        template
            .field(code)
            .map_or_else(|| code.to_string(), |f| f.reference.clone())
    };

    let passed = cet1 >= 0.0;
    if !passed {
        report.flag(format!(
            "CET1 capital must be non-negative (reported {})",
            format_amount(cet1)
        ));
    }
    report.check("CET1 capital >= 0", passed, &reference_of(CET1_FIELD));

    let passed = tier1 >= cet1;
    if !passed {
        report.flag(format!(
            "Tier 1 capital ({}) must be >= CET1 capital ({})",
            format_amount(tier1),
            format_amount(cet1)
        ));
    }
    report.check("Tier 1 capital >= CET1 capital", passed, &reference_of(TIER1_FIELD));

    let passed = total >= tier1;
    if !passed {
        report.flag(format!(
            "Total capital ({}) must be >= Tier 1 capital ({})",
            format_amount(total),
            format_amount(tier1)
        ));
    }
    report.check(
        "Total capital >= Tier 1 capital",
        passed,
        &reference_of(TOTAL_CAPITAL_FIELD),
    );
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

    fn field(code: &str, value: &str) -> PopulatedField {
        PopulatedField {
            field_code: code.into(),
            field_name: code.into(),
            value: value.into(),
            justification: "Stated in scenario".into(),
            source_rule: "PRA Rulebook".into(),
        }
    }

    fn tiers(cet1: &str, tier1: &str, total: &str) -> Vec<PopulatedField> {
        vec![
            field(CET1_FIELD, cet1),
            field(TIER1_FIELD, tier1),
            field(TOTAL_CAPITAL_FIELD, total),
        ]
    }

    #[test]
    fn test_consistent_tiers_raise_no_flags() {
        let report = Validator::new().validate(&tiers("£700M", "£700M", "£750M"), &own_funds());
        assert!(report.flags.is_empty(), "unexpected flags: {:?}", report.flags);
        assert!(report.audit.iter().any(|a| a.contains("Tier 1 capital >= CET1 capital: passed")));
    }

    #[test]
    fn test_tier1_below_cet1_is_flagged() {
        let report = Validator::new().validate(&tiers("£700M", "£600M", "£800M"), &own_funds());
        assert_eq!(
            report.flags,
            vec!["Tier 1 capital (£600M) must be >= CET1 capital (£700M)".to_string()]
        );
    }

    #[test]
    fn test_total_below_tier1_is_flagged() {
        let report = Validator::new().validate(&tiers("£700M", "£700M", "£650M"), &own_funds());
        assert!(report.flags[0].starts_with("Total capital (£650M)"));
    }

    #[test]
    fn test_negative_cet1_is_flagged_twice_over() {
        let report = Validator::new().validate(&tiers("-£10M", "£0M", "£0M"), &own_funds());
        assert!(report.flags.iter().any(|f| f.contains("C_01.00_r120 must be non-negative")));
        assert!(report.flags.iter().any(|f| f.starts_with("CET1 capital must be non-negative")));
    }

    #[test]
    fn test_absent_cet1_is_flagged_and_compared_as_zero() {
        let fields = vec![field(TIER1_FIELD, "£100M"), field(TOTAL_CAPITAL_FIELD, "£100M")];
        let report = Validator::new().validate(&fields, &own_funds());

        assert_eq!(
            report.flags,
            vec!["CET1 capital (C_01.00_r120) is missing; treated as zero".to_string()]
        );
        assert!(report.audit.iter().any(|a| a.contains("Tier 1 capital >= CET1 capital: passed")));
    }

    #[test]
    fn test_field_level_checks() {
        let mut missing = field("C_01.00_r010", "N/A");
        missing.justification.clear();
        missing.source_rule.clear();
        let fields = vec![missing, field("C_01.00_r070", "-£5M"), field("C_01.00_r999", "£1M")];

        let report = Validator::new().validate(&fields, &own_funds());

        assert!(report.flags.contains(&"Field C_01.00_r010 (Capital instruments and related share premium accounts) has no value".to_string()));
        assert!(report.flags.contains(&"Field C_01.00_r010 missing justification".to_string()));
        assert!(report.flags.contains(&"Field C_01.00_r010 missing regulatory source reference".to_string()));
        assert!(report.flags.contains(&"Field C_01.00_r070 must be non-negative (reported -£5M)".to_string()));
        assert!(report.flags.contains(&"Unknown field code: C_01.00_r999".to_string()));
        assert!(report.audit.iter().any(|a| a.starts_with("Manual review required for C_01.00_r010")));
    }

    #[test]
    fn test_flags_are_deduplicated() {
        let fields = vec![field("C_01.00_r999", "£1M"), field("C_01.00_r999", "£2M")];
        let report = Validator::new().validate(&fields, &own_funds());
        let unknown = report
            .flags
            .iter()
            .filter(|f| f.starts_with("Unknown field code"))
            .count();
        assert_eq!(unknown, 1);
    }

    #[test]
    fn test_unrecognisable_amount_is_flagged() {
        let report = Validator::new()
            .validate(&[field("C_01.00_r030", "about half")], &own_funds());
        assert!(report.flags.iter().any(|f| f.contains("not a recognisable amount")));
    }

    #[test]
    fn test_check_citations_accepts_reference_or_retrieved_source() {
        let template = own_funds();
        let mut by_reference = field("C_01.00_r010", "£500M");
        by_reference.source_rule = "PRA Rulebook 1.1.1 - CET1 capital instruments criteria".into();
        let mut by_source = field("C_01.00_r020", "£200M");
        by_source.source_rule = "COREP Instructions, row 020".into();
        let mut ungrounded = field("C_01.00_r030", "£10M");
        ungrounded.source_rule = "Basel III paragraph 52".into();

        let context = vec![RetrievedChunk {
            source: "COREP_Instructions".into(),
            content: "Row 020 retained earnings".into(),
            score: 0.5,
        }];

        let report = Validator::new().check_citations(
            &[by_reference, by_source, ungrounded],
            &template,
            &context,
        );

        assert_eq!(report.flags.len(), 1);
        assert!(report.flags[0].contains("Basel III paragraph 52"));
        assert_eq!(report.audit.len(), 3);
    }

    #[test]
    fn test_check_citations_matches_reference_as_whole_term() {
        let template = own_funds();
        let mut longer_section = field("C_01.00_r010", "£500M");
        longer_section.source_rule = "PRA Rulebook 1.1.10".into();
        let mut sentence_end = field("C_01.00_r020", "£200M");
        sentence_end.source_rule = "Retained earnings per PRA Rulebook 1.1.3.".into();

        let report =
            Validator::new().check_citations(&[longer_section, sentence_end], &template, &[]);

        assert_eq!(report.flags.len(), 1);
        assert!(report.flags[0].starts_with("Field C_01.00_r010 cites 'PRA Rulebook 1.1.10'"));
    }

    #[test]
    fn test_check_citations_requires_cited_section_in_retrieved_source() {
        let template = own_funds();
        let context = vec![RetrievedChunk {
            source: "PRA_Rulebook".into(),
            content: "## 1.3.2 Credit risk adjustments\nGeneral credit risk adjustments are Tier 2 items.".into(),
            score: 0.4,
        }];
        let mut retrieved_section = field("C_01.00_r030", "£10M");
        retrieved_section.source_rule = "PRA_Rulebook 1.3.2".into();
        let mut invented_section = field("C_01.00_r040", "£5M");
        invented_section.source_rule = "PRA Rulebook 9.9.9".into();

        let report = Validator::new().check_citations(
            &[retrieved_section, invented_section],
            &template,
            &context,
        );

        assert_eq!(report.flags.len(), 1);
        assert!(report.flags[0].contains("PRA Rulebook 9.9.9"));
    }
}
