//! Validation rule identifiers attached to template fields.
//!
//! The set is closed: a template that names an unknown rule fails to load. Some rules are
//! machine-checkable against the reported value; the rest describe eligibility conditions a
//! reviewer has to confirm and are recorded in the audit trail only.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationRule {
    NonNegative,
    ReportAsPositive,
    DeductedFromCet1,
    EligibilityReview,
    ExcludesForeseeableCharges,
    AuditorVerification,
    AccountingRecognition,
    At1Criteria,
    SubordinatedPerpetual,
    MinimumMaturityFiveYears,
    CreditRiskAdjustmentCap,
    AtLeastCet1,
    AtLeastTier1,
}

/// How the validator treats a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleCheck {
    /// Reported value must parse to an amount >= 0.
    NonNegativeValue,
    /// Evaluated by the cross-field consistency checks.
    CrossField,
    /// Needs human confirmation; noted in the audit trail.
    ManualReview,
}

impl ValidationRule {
    pub fn id(&self) -> &'static str {
        match self {
            ValidationRule::NonNegative => "non_negative",
            ValidationRule::ReportAsPositive => "report_as_positive",
            ValidationRule::DeductedFromCet1 => "deducted_from_cet1",
            ValidationRule::EligibilityReview => "eligibility_review",
            ValidationRule::ExcludesForeseeableCharges => "excludes_foreseeable_charges",
            ValidationRule::AuditorVerification => "auditor_verification",
            ValidationRule::AccountingRecognition => "accounting_recognition",
            ValidationRule::At1Criteria => "at1_criteria",
            ValidationRule::SubordinatedPerpetual => "subordinated_perpetual",
            ValidationRule::MinimumMaturityFiveYears => "minimum_maturity_five_years",
            ValidationRule::CreditRiskAdjustmentCap => "credit_risk_adjustment_cap",
            ValidationRule::AtLeastCet1 => "at_least_cet1",
            ValidationRule::AtLeastTier1 => "at_least_tier1",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ValidationRule::NonNegative => "Must be non-negative",
            ValidationRule::ReportAsPositive => "Report as positive number",
            ValidationRule::DeductedFromCet1 => "Deducted from CET1",
            ValidationRule::EligibilityReview => "Requires verification of instrument eligibility",
            ValidationRule::ExcludesForeseeableCharges => {
                "Must exclude foreseeable charges or dividends"
            }
            ValidationRule::AuditorVerification => "Requires auditor verification",
            ValidationRule::AccountingRecognition => {
                "Must be recognised under applicable accounting standards"
            }
            ValidationRule::At1Criteria => "Must meet AT1 criteria",
            ValidationRule::SubordinatedPerpetual => "Must be subordinated and perpetual",
            ValidationRule::MinimumMaturityFiveYears => "Minimum 5-year maturity required",
            ValidationRule::CreditRiskAdjustmentCap => {
                "Limited to 1.25% of risk-weighted exposures"
            }
            ValidationRule::AtLeastCet1 => "Must be >= CET1 capital",
            ValidationRule::AtLeastTier1 => "Must be >= Tier 1 capital",
        }
    }

    pub fn check(&self) -> RuleCheck {
        match self {
            ValidationRule::NonNegative | ValidationRule::ReportAsPositive => {
                RuleCheck::NonNegativeValue
            }
            ValidationRule::AtLeastCet1 | ValidationRule::AtLeastTier1 => RuleCheck::CrossField,
            _ => RuleCheck::ManualReview,
        }
    }
}

impl std::fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}
