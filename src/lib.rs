//! zapwright - scan orchestration and policy assertions for ZAP-style
//! security scanning proxies
//!
//! The crate assumes an external browser driver has already loaded the
//! target page through the scanning proxy. From there a [`ScanSession`]
//! requests a scan of that page, collects the resulting findings, writes a
//! self-contained HTML report, and evaluates a configured sequence of
//! policy assertions, reporting overall pass/fail.
//!
//! Infrastructure failures ([`ScanError`]) and policy violations
//! ([`PolicyError`]) are distinct types, so a host test-runner can tell
//! "the scanner broke" apart from "the application under test has a real
//! vulnerability".

pub mod assertions;
pub mod client;
pub mod config;
pub mod error;
pub mod findings;
pub mod report;
pub mod session;

pub use assertions::Assertion;
pub use client::{ScanClient, ScanTransport};
pub use config::{ApiKey, Config};
pub use error::{ConfigError, PolicyError, ScanError};
pub use findings::{Confidence, Finding, FindingSet, Risk};
pub use report::{render, write_report, ReportMeta};
pub use session::{NoopReporter, OutcomeReporter, ScanSession, SessionOutcome};
