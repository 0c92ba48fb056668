//! Error types for zapwright
//!
//! The taxonomy keeps infrastructure failures (transport, parse, config)
//! separate from policy violations so a host test-runner can tell "the
//! scanner broke" apart from "the application under test has a problem".

use thiserror::Error;

/// Errors raised while talking to the scanner or running a session.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The scan request failed: control endpoint unreachable, or it
    /// answered with a non-success status. Carries the raw response body
    /// (or the transport error text) for diagnostics.
    #[error("Scan request failed{}: {body}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    ScanRequest { status: Option<u16>, body: String },

    /// The underlying HTTP client could not be constructed. Surfaced at
    /// client build time, before any request is made.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// Transport failure while fetching findings
    #[error("Failed to fetch findings: {0}")]
    FindingsFetch(String),

    /// A call to the scanner API exceeded its bounded timeout
    #[error("Scanner API call timed out after {0}s")]
    Timeout(u64),

    /// Malformed scanner response. The whole fetch is rejected; a single
    /// bad record never drops out of the batch silently.
    #[error("Malformed scanner response{}: {reason}", record.map(|i| format!(" (record {i})")).unwrap_or_default())]
    Parse {
        record: Option<usize>,
        reason: String,
    },

    /// Failed to write the report artifact
    #[error("Report I/O error: {0}")]
    Report(#[from] std::io::Error),
}

/// Configuration errors, surfaced before any network call is made.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid scanner endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("No scanner API key configured; set scanner.api_key (or ZAP_API_KEY) or opt in with scanner.keyless = true")]
    MissingApiKey,

    #[error("Invalid configuration value: {field} - {reason}")]
    Validation { field: String, reason: String },
}

/// Policy assertion violations. These are expected business outcomes of a
/// scan, not bugs; each carries enough detail to act without re-running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// An empty result from a security scan is itself suspicious (proxy
    /// misconfigured, scan never ran) and must not pass as "secure".
    #[error("No findings were returned by the scan")]
    NoFindings,

    #[error("High-risk findings present: {}", names.join(", "))]
    HighRiskFindings { names: Vec<String> },

    #[error("Expected finding '{name}' was not detected")]
    MissingExpectedFinding { name: String },

    #[error("'{token}' is not a valid risk level (expected one of: Informational, Low, Medium, High)")]
    InvalidRiskLevel { token: String },

    #[error("Findings above risk level '{max}': {}", names.join(", "))]
    RiskLevelExceeded { max: String, names: Vec<String> },

    #[error("{count} finding(s) have no solution text")]
    MissingSolution { count: usize },
}
