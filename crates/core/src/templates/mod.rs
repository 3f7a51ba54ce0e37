//! COREP template catalog.
//!
//! The catalog is built once at start-up from YAML definitions embedded in the binary and is
//! shared read-only (normally behind an `Arc`). It exposes no mutation.
//!
//! ## Key Components
//!
//! - **Definitions**: [`Template`], [`TemplateField`], [`Calculation`]
//! - **Registry**: [`TemplateCatalog`] with `get_template` / `list_templates`
//! - **Rendering**: [`format_template_output`] and its inverse [`parse_formatted_output`]
//! - **Derivation**: [`derive_totals`] fills computed rows from reported components

mod derive;
mod format;
pub mod rules;

pub use derive::derive_totals;
pub use format::{format_template_output, parse_formatted_output, FormattedEntry};
pub use rules::{RuleCheck, ValidationRule};

use crate::error::{CorepError, CorepResult};
use api_shared::wire::{TemplateDetailRes, TemplateFieldRes, TemplateSummary};
use serde::{Deserialize, Serialize};

const OWN_FUNDS_YAML: &str = include_str!("../../templates/c_01_00.yaml");

/// Arithmetic over other fields of the same template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calculation {
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub subtract: Vec<String>,
}

fn short_code(code: &str) -> &str {
    code.rsplit('_').next().unwrap_or(code)
}

impl Calculation {
    /// All referenced field codes, additions first.
    pub fn inputs(&self) -> impl Iterator<Item = &String> {
        self.add.iter().chain(self.subtract.iter())
    }
}

impl std::fmt::Display for Calculation {
    /// Renders e.g. `(r010 + r020) - r110`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let adds: Vec<&str> = self.add.iter().map(|c| short_code(c)).collect();
        let subs: Vec<&str> = self.subtract.iter().map(|c| short_code(c)).collect();
        let sum = adds.join(" + ");

        if subs.is_empty() {
            return write!(f, "{sum}");
        }
        if adds.len() > 1 {
            write!(f, "({sum})")?;
        } else {
            write!(f, "{sum}")?;
        }
        write!(f, " - {}", subs.join(" - "))
    }
}

/// Static descriptor of one template row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateField {
    pub field_code: String,
    pub field_name: String,
    pub description: String,
    /// Regulatory reference a populated value may cite.
    pub reference: String,
    #[serde(default)]
    pub is_deduction: bool,
    #[serde(default)]
    pub calculation: Option<Calculation>,
    #[serde(default)]
    pub validation_rules: Vec<ValidationRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub template_code: String,
    pub template_name: String,
    pub description: String,
    pub fields: Vec<TemplateField>,
}

impl Template {
    /// Parse and check a template definition.
    ///
    /// # Errors
    /// Returns `YamlDeserialization` for malformed YAML and `InvalidInput` when field codes
    /// are duplicated or a calculation refers to a code that is not in the template.
    pub fn from_yaml(yaml: &str) -> CorepResult<Self> {
        let template: Template =
            serde_yaml::from_str(yaml).map_err(CorepError::YamlDeserialization)?;

        let mut seen = std::collections::HashSet::new();
        for field in &template.fields {
            if !seen.insert(field.field_code.as_str()) {
                return Err(CorepError::InvalidInput(format!(
                    "duplicate field code {} in template {}",
                    field.field_code, template.template_code
                )));
            }
        }
        for field in &template.fields {
            if let Some(calc) = &field.calculation {
                if let Some(missing) = calc.inputs().find(|c| !seen.contains(c.as_str())) {
                    return Err(CorepError::InvalidInput(format!(
                        "calculation for {} refers to unknown field {}",
                        field.field_code, missing
                    )));
                }
            }
        }

        Ok(template)
    }

    pub fn field(&self, field_code: &str) -> Option<&TemplateField> {
        self.fields.iter().find(|f| f.field_code == field_code)
    }

    pub fn summary(&self) -> TemplateSummary {
        TemplateSummary {
            code: self.template_code.clone(),
            name: self.template_name.clone(),
            description: self.description.clone(),
        }
    }

    pub fn detail(&self) -> TemplateDetailRes {
        TemplateDetailRes {
            code: self.template_code.clone(),
            name: self.template_name.clone(),
            description: self.description.clone(),
            fields: self
                .fields
                .iter()
                .map(|f| TemplateFieldRes {
                    field_code: f.field_code.clone(),
                    field_name: f.field_name.clone(),
                    description: f.description.clone(),
                    is_deduction: f.is_deduction,
                    calculation: f.calculation.as_ref().map(ToString::to_string),
                    validation_rules: f
                        .validation_rules
                        .iter()
                        .map(|r| r.description().to_string())
                        .collect(),
                    reference: f.reference.clone(),
                })
                .collect(),
        }
    }
}

/// Read-only registry of known templates.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: Vec<Template>,
}

impl TemplateCatalog {
    pub fn new(templates: Vec<Template>) -> Self {
        Self { templates }
    }

    /// The catalog compiled into the binary (Own Funds, C 01.00).
    pub fn builtin() -> CorepResult<Self> {
        Ok(Self::new(vec![Template::from_yaml(OWN_FUNDS_YAML)?]))
    }

    /// Look up a template by code.
    ///
    /// # Errors
    /// Returns `TemplateNotFound` for unknown codes.
    pub fn get_template(&self, code: &str) -> CorepResult<&Template> {
        self.templates
            .iter()
            .find(|t| t.template_code == code)
            .ok_or_else(|| CorepError::TemplateNotFound(code.to_string()))
    }

    pub fn list_templates(&self) -> Vec<TemplateSummary> {
        self.templates.iter().map(Template::summary).collect()
    }
}
