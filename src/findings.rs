//! Vulnerability findings
//!
//! Normalized records parsed from the scanner's `core/view/alerts` payload.
//! A fetch is a full snapshot of whatever the scanner holds for the target
//! at that moment, never a delta.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Risk level vocabulary, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Risk {
    Informational,
    Low,
    Medium,
    High,
}

impl Risk {
    pub const ALL: [Risk; 4] = [Risk::Informational, Risk::Low, Risk::Medium, Risk::High];

    pub fn name(&self) -> &'static str {
        match self {
            Risk::Informational => "Informational",
            Risk::Low => "Low",
            Risk::Medium => "Medium",
            Risk::High => "High",
        }
    }

    /// Case-insensitive parse from a scanner token. Unknown tokens are
    /// rejected, never defaulted: a silently misfiled risk level would
    /// corrupt assertion outcomes.
    pub fn from_token(token: &str) -> Option<Risk> {
        match token.trim().to_ascii_lowercase().as_str() {
            "informational" => Some(Risk::Informational),
            "low" => Some(Risk::Low),
            "medium" => Some(Risk::Medium),
            "high" => Some(Risk::High),
            _ => None,
        }
    }
}

/// Confidence vocabulary, ordered from least to most certain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    FalsePositive,
    Low,
    Medium,
    High,
    Confirmed,
}

impl Confidence {
    pub fn name(&self) -> &'static str {
        match self {
            Confidence::FalsePositive => "False Positive",
            Confidence::Low => "Low",
            Confidence::Medium => "Medium",
            Confidence::High => "High",
            Confidence::Confirmed => "Confirmed",
        }
    }

    pub fn from_token(token: &str) -> Option<Confidence> {
        match token.trim().to_ascii_lowercase().as_str() {
            "false positive" | "falsepositive" => Some(Confidence::FalsePositive),
            "low" => Some(Confidence::Low),
            "medium" => Some(Confidence::Medium),
            "high" => Some(Confidence::High),
            "confirmed" => Some(Confidence::Confirmed),
            _ => None,
        }
    }
}

/// One normalized scanner alert. Immutable after parsing.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    /// Alert id, unique within one snapshot
    pub id: String,

    /// Id of the scan rule that raised the alert
    pub plugin_id: String,

    /// Alert name/title
    pub name: String,

    /// Risk level
    pub risk: Risk,

    /// Scanner confidence in the finding
    pub confidence: Confidence,

    /// Affected URL
    pub url: String,

    /// HTTP method of the triggering request
    pub method: String,

    /// Request parameter involved
    pub param: String,

    /// Attack payload used
    pub attack: String,

    /// Free-text description
    pub description: String,

    /// Remediation text
    pub solution: String,

    /// Reference links
    pub reference: String,

    /// Evidence snippet from the response
    pub evidence: String,

    /// Extra free-text information
    pub other: String,

    /// CWE classification id
    pub cwe_id: String,

    /// WASC classification id
    pub wasc_id: String,

    /// Tag name to tag value
    pub tags: HashMap<String, String>,

    /// Links back to the HTTP transaction that triggered the alert
    pub message_id: String,

    /// Rule reference (plugin id plus variant suffix)
    pub alert_ref: String,

    /// Originating source id
    pub source_id: String,

    /// Input vector that carried the attack
    pub input_vector: String,
}

impl Finding {
    /// True when the solution field carries no usable text.
    pub fn solution_is_blank(&self) -> bool {
        self.solution.trim().is_empty()
    }
}

/// Snapshot of findings in scanner-encounter order.
pub type FindingSet = Vec<Finding>;

/// Wire shape of one alert record. The scanner serializes every field as a
/// string; required fields are absent-checked here, vocabulary fields are
/// validated during conversion.
#[derive(Debug, Deserialize)]
struct RawAlert {
    id: String,
    name: String,
    risk: String,
    confidence: String,
    #[serde(default, rename = "pluginId")]
    plugin_id: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    method: String,
    #[serde(default)]
    param: String,
    #[serde(default)]
    attack: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    solution: String,
    #[serde(default)]
    reference: String,
    #[serde(default)]
    evidence: String,
    #[serde(default)]
    other: String,
    #[serde(default, rename = "cweid")]
    cwe_id: String,
    #[serde(default, rename = "wascid")]
    wasc_id: String,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default, rename = "messageId")]
    message_id: String,
    #[serde(default, rename = "alertRef")]
    alert_ref: String,
    #[serde(default, rename = "sourceid")]
    source_id: String,
    #[serde(default, rename = "inputVector")]
    input_vector: String,
}

#[derive(Debug, Deserialize)]
struct AlertsEnvelope {
    alerts: Vec<RawAlert>,
}

impl RawAlert {
    fn into_finding(self, index: usize) -> Result<Finding, ScanError> {
        let risk = Risk::from_token(&self.risk).ok_or_else(|| ScanError::Parse {
            record: Some(index),
            reason: format!("unknown risk level token '{}'", self.risk),
        })?;

        let confidence =
            Confidence::from_token(&self.confidence).ok_or_else(|| ScanError::Parse {
                record: Some(index),
                reason: format!("unknown confidence token '{}'", self.confidence),
            })?;

        if !self.url.is_empty() {
            // Absolute and relative references are both fine; outright
            // garbage is not.
            if url::Url::parse(&self.url).is_err()
                && url::Url::parse("http://placeholder.invalid")
                    .and_then(|base| base.join(&self.url))
                    .is_err()
            {
                return Err(ScanError::Parse {
                    record: Some(index),
                    reason: format!("malformed url '{}'", self.url),
                });
            }
        }

        Ok(Finding {
            id: self.id,
            plugin_id: self.plugin_id,
            name: self.name,
            risk,
            confidence,
            url: self.url,
            method: self.method,
            param: self.param,
            attack: self.attack,
            description: self.description,
            solution: self.solution,
            reference: self.reference,
            evidence: self.evidence,
            other: self.other,
            cwe_id: self.cwe_id,
            wasc_id: self.wasc_id,
            tags: self.tags,
            message_id: self.message_id,
            alert_ref: self.alert_ref,
            source_id: self.source_id,
            input_vector: self.input_vector,
        })
    }
}

/// Parse the scanner's alerts payload into a [`FindingSet`].
///
/// One malformed record rejects the whole batch with a descriptive error;
/// silently dropping a record could turn a real vulnerability into a
/// false-negative assertion pass.
pub fn parse_alerts(payload: &str) -> Result<FindingSet, ScanError> {
    let envelope: AlertsEnvelope =
        serde_json::from_str(payload).map_err(|e| ScanError::Parse {
            record: None,
            reason: e.to_string(),
        })?;

    let findings: FindingSet = envelope
        .alerts
        .into_iter()
        .enumerate()
        .map(|(i, raw)| raw.into_finding(i))
        .collect::<Result<_, _>>()?;

    // Alert ids are unique within one snapshot; a duplicate means the
    // payload is not the snapshot we think it is.
    let mut seen = std::collections::HashSet::new();
    for (i, finding) in findings.iter().enumerate() {
        if !seen.insert(finding.id.as_str()) {
            return Err(ScanError::Parse {
                record: Some(i),
                reason: format!("duplicate alert id '{}'", finding.id),
            });
        }
    }

    Ok(findings)
}

/// Test-only constructor used across the crate's unit tests.
#[cfg(test)]
pub(crate) fn test_finding(name: &str, risk: Risk, solution: &str) -> Finding {
    Finding {
        id: name.to_lowercase().replace(' ', "-"),
        plugin_id: "40018".into(),
        name: name.into(),
        risk,
        confidence: Confidence::Medium,
        url: "http://target.test/".into(),
        method: "GET".into(),
        param: String::new(),
        attack: String::new(),
        description: format!("{name} description"),
        solution: solution.into(),
        reference: String::new(),
        evidence: String::new(),
        other: String::new(),
        cwe_id: "89".into(),
        wasc_id: "19".into(),
        tags: HashMap::new(),
        message_id: "1".into(),
        alert_ref: "40018".into(),
        source_id: "1".into(),
        input_vector: String::new(),
    }
}
