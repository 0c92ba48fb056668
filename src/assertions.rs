//! Policy assertions over a finding set
//!
//! Pure predicates expressing security acceptance criteria. Each check is
//! independent and composable; a session runs a configured sequence of them
//! and fails fast on the first violation.

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::findings::{Finding, Risk};

/// Fails when the set is empty. An empty scan result is suspicious in its
/// own right and must not be conflated with "the application is secure".
pub fn assert_alerts_present(findings: &[Finding]) -> Result<(), PolicyError> {
    if findings.is_empty() {
        return Err(PolicyError::NoFindings);
    }
    Ok(())
}

/// Fails when any finding carries High risk, naming the offenders.
pub fn assert_no_high_risk(findings: &[Finding]) -> Result<(), PolicyError> {
    let names: Vec<String> = findings
        .iter()
        .filter(|f| f.risk == Risk::High)
        .map(|f| f.name.clone())
        .collect();

    if !names.is_empty() {
        return Err(PolicyError::HighRiskFindings { names });
    }
    Ok(())
}

/// Fails when no finding's name matches `name` (case-insensitive exact
/// match). Used for targeted regression checks, e.g. "the known SQLi
/// finding must still be detected".
pub fn assert_alert_present(findings: &[Finding], name: &str) -> Result<(), PolicyError> {
    let found = findings.iter().any(|f| f.name.eq_ignore_ascii_case(name));
    if !found {
        return Err(PolicyError::MissingExpectedFinding {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Fails when `max_level` is not a valid vocabulary token (for any set,
/// including an empty one), otherwise when any finding's risk ordinal
/// exceeds the maximum. Ordinal comparison, not lexical.
pub fn assert_below_risk_level(findings: &[Finding], max_level: &str) -> Result<(), PolicyError> {
    let max = Risk::from_token(max_level).ok_or_else(|| PolicyError::InvalidRiskLevel {
        token: max_level.to_string(),
    })?;

    let names: Vec<String> = findings
        .iter()
        .filter(|f| f.risk > max)
        .map(|f| f.name.clone())
        .collect();

    if !names.is_empty() {
        return Err(PolicyError::RiskLevelExceeded {
            max: max.name().to_string(),
            names,
        });
    }
    Ok(())
}

/// Fails when any finding's solution text is empty or all-whitespace.
pub fn assert_all_have_solutions(findings: &[Finding]) -> Result<(), PolicyError> {
    let count = findings.iter().filter(|f| f.solution_is_blank()).count();
    if count > 0 {
        return Err(PolicyError::MissingSolution { count });
    }
    Ok(())
}

/// A configurable assertion, so a host can declare the ordered sequence to
/// run (and its parameters) in the session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "kebab-case")]
pub enum Assertion {
    AlertsPresent,
    NoHighRisk,
    AlertPresent { name: String },
    BelowRiskLevel { max: String },
    AllHaveSolutions,
}

impl Assertion {
    /// Run this assertion against a finding set.
    pub fn check(&self, findings: &[Finding]) -> Result<(), PolicyError> {
        match self {
            Assertion::AlertsPresent => assert_alerts_present(findings),
            Assertion::NoHighRisk => assert_no_high_risk(findings),
            Assertion::AlertPresent { name } => assert_alert_present(findings, name),
            Assertion::BelowRiskLevel { max } => assert_below_risk_level(findings, max),
            Assertion::AllHaveSolutions => assert_all_have_solutions(findings),
        }
    }

    /// Short human label for logging.
    pub fn label(&self) -> String {
        match self {
            Assertion::AlertsPresent => "alerts-present".into(),
            Assertion::NoHighRisk => "no-high-risk".into(),
            Assertion::AlertPresent { name } => format!("alert-present({name})"),
            Assertion::BelowRiskLevel { max } => format!("below-risk-level({max})"),
            Assertion::AllHaveSolutions => "all-have-solutions".into(),
        }
    }
}
