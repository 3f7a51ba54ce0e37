//! Deterministic keyword reasoning.
//!
//! Used when no model backend is configured, and as the fallback when one is unreachable.
//! The scenario is split into clauses; every known row has a keyword pattern, and the amount
//! stated in the first clause mentioning that keyword becomes the row's value. A keyword with
//! no stated amount yields `N/A`: amounts are never invented. Computed rows are then filled
//! with [`derive_totals`]. The output depends only on the scenario text and the template.

use super::{Reasoner, ReasoningMode, ReasoningOutput, ReasoningRequest};
use crate::amount::{find_amounts, format_amount};
use crate::constants::NOT_AVAILABLE;
use crate::error::CorepResult;
use crate::templates::{derive_totals, Template};
use api_shared::wire::PopulatedField;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

struct FieldRule {
    field_code: &'static str,
    keywords: &'static [&'static str],
    justification: &'static str,
    source_rule: &'static str,
}

const FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        field_code: "C_01.00_r010",
        keywords: &[
            "ordinary shares",
            "ordinary share capital",
            "common shares",
            "common equity instruments",
            "cet1 instruments",
            "share capital",
            "share premium",
            "paid up capital",
            "paid-up capital",
        ],
        justification: "Ordinary shares meeting CRR Article 28 criteria qualify as CET1 capital instruments",
        source_rule: "PRA Rulebook 1.1.1 - CET1 capital instruments criteria",
    },
    FieldRule {
        field_code: "C_01.00_r020",
        keywords: &["retained earnings", "retained profits"],
        justification: "Verified retained earnings net of foreseeable dividends",
        source_rule: "PRA Rulebook 1.1.3 - Retained earnings requirements",
    },
    FieldRule {
        field_code: "C_01.00_r030",
        keywords: &[
            "other comprehensive income",
            "oci",
            "disclosed reserves",
            "other reserves",
        ],
        justification: "Accumulated other comprehensive income and disclosed reserves recognised in equity",
        source_rule: "PRA Rulebook 1.1.4 - Other comprehensive income",
    },
    FieldRule {
        field_code: "C_01.00_r040",
        keywords: &["general banking risk"],
        justification: "Funds for general banking risk recognised in equity",
        source_rule: "PRA Rulebook 1.1.5 - Funds for general banking risk",
    },
    FieldRule {
        field_code: "C_01.00_r070",
        keywords: &["goodwill", "intangible assets", "intangibles"],
        justification: "Goodwill and intangible assets must be deducted from CET1 capital",
        source_rule: "PRA Rulebook 2.1.2 - Intangible assets deduction",
    },
    FieldRule {
        field_code: "C_01.00_r080",
        keywords: &["deferred tax"],
        justification: "Deferred tax assets relying on future profitability are deducted",
        source_rule: "PRA Rulebook 2.1.3 - Deferred tax assets deduction",
    },
    FieldRule {
        field_code: "C_01.00_r090",
        keywords: &["expected loss"],
        justification: "Negative amounts from expected loss calculations are deducted from CET1",
        source_rule: "PRA Rulebook 2.1.4 - Expected loss deduction",
    },
    FieldRule {
        field_code: "C_01.00_r100",
        keywords: &[
            "own shares",
            "own cet1 instruments",
            "own instruments",
            "treasury shares",
            "holdings of own",
        ],
        justification: "Holdings of own CET1 instruments must be deducted",
        source_rule: "PRA Rulebook 2.1.5 - Own instruments deduction",
    },
    FieldRule {
        field_code: "C_01.00_r130",
        keywords: &[
            "at1",
            "additional tier 1",
            "perpetual subordinated",
            "contingent convertible",
            "cocos",
        ],
        justification: "Perpetual subordinated instruments with a loss absorption mechanism qualify as AT1",
        source_rule: "PRA Rulebook 1.2.1 - AT1 capital instruments criteria",
    },
    FieldRule {
        field_code: "C_01.00_r180",
        keywords: &[
            "tier 2 instruments",
            "tier 2 capital instruments",
            "tier 2 bonds",
            "t2 instruments",
            "subordinated loans",
            "subordinated debt",
            "dated subordinated",
        ],
        justification: "Subordinated instruments with an original maturity of at least five years qualify as Tier 2",
        source_rule: "PRA Rulebook 1.3.1 - Tier 2 instruments criteria",
    },
    FieldRule {
        field_code: "C_01.00_r200",
        keywords: &[
            "credit risk adjustments",
            "credit risk adjustment",
            "general provisions",
        ],
        justification: "General credit risk adjustments are eligible Tier 2 items up to 1.25% of risk-weighted exposure amounts",
        source_rule: "PRA Rulebook 1.3.2 - Credit risk adjustments",
    },
];

static CLAUSE_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[;\n]|[.,](?:\s|$)|\s(?:and|plus|with|while|whereas)\s")
        .expect("static regex is valid")
});

static RULE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    FIELD_RULES
        .iter()
        .map(|rule| {
            let alternatives: Vec<String> = rule.keywords.iter().map(|k| regex::escape(k)).collect();
            Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))
                .expect("keyword patterns are valid")
        })
        .collect()
});

fn clauses(scenario: &str) -> Vec<&str> {
    CLAUSE_BREAK
        .split(scenario)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect()
}

fn distance(a: &std::ops::Range<usize>, b: &std::ops::Range<usize>) -> usize {
    if a.end <= b.start {
        b.start - a.end
    } else {
        a.start.saturating_sub(b.end)
    }
}

/// Amount stated next to the keyword, if any clause has both.
///
/// Returns `None` when the keyword is not mentioned, `Some(None)` when it is mentioned but no
/// clause pairs it with an amount.
fn match_rule(pattern: &Regex, clauses: &[&str]) -> Option<Option<f64>> {
    let mut mentioned = false;

    for clause in clauses {
        let Some(keyword) = pattern.find(clause) else {
            continue;
        };
        mentioned = true;

        let nearest = find_amounts(clause)
            .into_iter()
            .min_by_key(|m| distance(&m.span, &keyword.range()));
        if let Some(found) = nearest {
            return Some(Some(found.amount));
        }
    }

    mentioned.then_some(None)
}

#[derive(Debug, Clone, Default)]
pub struct HeuristicReasoner;

impl HeuristicReasoner {
    pub fn new() -> Self {
        Self
    }

    /// Populate fields from the scenario text alone.
    pub fn populate(&self, scenario: &str, template: &Template) -> ReasoningOutput {
        let clauses = clauses(scenario);
        let mut fields = Vec::new();

        for (rule, pattern) in FIELD_RULES.iter().zip(RULE_PATTERNS.iter()) {
            let Some(template_field) = template.field(rule.field_code) else {
                continue;
            };
            let Some(amount) = match_rule(pattern, &clauses) else {
                continue;
            };

            let (value, justification) = match amount {
                Some(amount) => {
                    let amount = if template_field.is_deduction {
                        amount.abs()
                    } else {
                        amount
                    };
                    (format_amount(amount), rule.justification.to_string())
                }
                None => (
                    NOT_AVAILABLE.to_string(),
                    format!(
                        "Scenario mentions {} but states no amount",
                        template_field.field_name.to_lowercase()
                    ),
                ),
            };

            fields.push(PopulatedField {
                field_code: rule.field_code.to_string(),
                field_name: template_field.field_name.clone(),
                value,
                justification,
                source_rule: rule.source_rule.to_string(),
            });
        }

        let matched = fields.len();
        let fields = derive_totals(template, fields);
        let derived = fields.len() - matched;

        ReasoningOutput {
            mode: ReasoningMode::Heuristic,
            fields,
            flags: Vec::new(),
            notes: vec![
                "Heuristic mode active - fields populated from scenario keyword analysis".into(),
                format!(
                    "Matched {matched} reported fields and derived {derived} computed fields"
                ),
            ],
        }
    }
}

#[async_trait]
impl Reasoner for HeuristicReasoner {
    fn mode(&self) -> ReasoningMode {
        ReasoningMode::Heuristic
    }

    async fn generate(&self, request: &ReasoningRequest<'_>) -> CorepResult<ReasoningOutput> {
        Ok(self.populate(request.scenario, request.template))
    }
}
