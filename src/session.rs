//! Scan session orchestration
//!
//! One session drives a single forward pipeline for a target URL whose page
//! an external browser driver has already loaded through the scanning proxy:
//! request scan, collect findings, write the report, run the configured
//! assertions fail-fast. Policy violations come back as values inside
//! [`SessionOutcome`]; only infrastructure failures are `Err`.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::assertions::Assertion;
use crate::client::{ScanClient, ScanTransport};
use crate::config::Config;
use crate::error::{PolicyError, ScanError};
use crate::findings::{Finding, FindingSet};
use crate::report::{self, ReportMeta};

/// Result of one scan-and-assert pass.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Target URL the session ran against
    pub target: String,

    /// Number of findings in the final snapshot
    pub findings_total: usize,

    /// Where the report was written
    pub report_path: PathBuf,

    /// First policy violation, when any assertion failed
    pub violation: Option<PolicyError>,
}

impl SessionOutcome {
    pub fn passed(&self) -> bool {
        self.violation.is_none()
    }
}

/// Pluggable sink for the final session outcome, e.g. a cloud grid status
/// callback. Reporter failures are logged and never fail the session.
#[async_trait]
pub trait OutcomeReporter: Send + Sync {
    async fn report(&self, outcome: &SessionOutcome) -> anyhow::Result<()>;
}

/// Default reporter: does nothing.
pub struct NoopReporter;

#[async_trait]
impl OutcomeReporter for NoopReporter {
    async fn report(&self, _outcome: &SessionOutcome) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct ScanSession {
    config: Config,
    transport: Box<dyn ScanTransport>,
    findings: FindingSet,
    reporter: Option<Box<dyn OutcomeReporter>>,
}

impl ScanSession {
    /// Build a session. Configuration problems (bad endpoint, unresolved
    /// API key, no target) fail here, before any network call.
    pub fn new(config: Config) -> Result<Self, ScanError> {
        let client = ScanClient::new(&config)?;
        Self::with_transport(config, Box::new(client))
    }

    /// Build a session over a caller-supplied transport.
    pub fn with_transport(
        config: Config,
        transport: Box<dyn ScanTransport>,
    ) -> Result<Self, ScanError> {
        config.validate()?;

        Ok(Self {
            config,
            transport,
            findings: Vec::new(),
            reporter: None,
        })
    }

    /// Attach an outcome reporter invoked once with the final result.
    pub fn with_reporter(mut self, reporter: Box<dyn OutcomeReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// The current findings snapshot, read-only.
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Run the pipeline once. Precondition: the page is loaded at the
    /// target URL (external browser driver's responsibility).
    pub async fn run(&mut self) -> Result<SessionOutcome, ScanError> {
        let target = self.config.session.target_url.clone();
        let recurse = self.config.session.recurse;

        self.transport.request_scan(&target, recurse).await?;

        self.findings = self.collect_findings(&target).await?;

        let meta = ReportMeta::new(&target);
        report::write_report(&self.findings, &meta, &self.config.session.report_path)?;
        tracing::info!(path = %self.config.session.report_path.display(), "Report written");

        let violation = run_assertions(&self.config.session.assertions, &self.findings);

        let outcome = SessionOutcome {
            target,
            findings_total: self.findings.len(),
            report_path: self.config.session.report_path.clone(),
            violation,
        };

        if let Some(reporter) = &self.reporter {
            if let Err(e) = reporter.report(&outcome).await {
                tracing::warn!("Outcome reporter failed: {e:#}");
            }
        }

        Ok(outcome)
    }

    /// Obtain the findings snapshot for this session.
    ///
    /// The scanner processes asynchronously; a fetch issued right after
    /// `request_scan` can observe a partial result. We poll until the
    /// snapshot fingerprint is unchanged for `stable_fetches` consecutive
    /// fetches or the deadline passes, whichever comes first, and keep the
    /// last snapshot. `stable_fetches = 0` fetches exactly once.
    async fn collect_findings(&self, target: &str) -> Result<FindingSet, ScanError> {
        let session = &self.config.session;
        let mut current = self.transport.fetch_findings(target).await?;

        if session.stable_fetches == 0 {
            return Ok(current);
        }

        let deadline = Instant::now() + Duration::from_secs(session.poll_deadline_secs);
        let interval = Duration::from_millis(session.poll_interval_ms);
        let mut stable = 0u32;

        while stable < session.stable_fetches {
            if Instant::now() >= deadline {
                tracing::warn!(
                    stable,
                    required = session.stable_fetches,
                    "Poll deadline reached before findings settled; using last snapshot"
                );
                break;
            }

            tokio::time::sleep(interval).await;
            let next = self.transport.fetch_findings(target).await?;

            if snapshot_fingerprint(&next) == snapshot_fingerprint(&current) {
                stable += 1;
            } else {
                stable = 0;
            }
            current = next;
        }

        Ok(current)
    }
}

/// Identity of a snapshot for stability comparison: the ordered alert ids.
fn snapshot_fingerprint(findings: &[Finding]) -> Vec<&str> {
    findings.iter().map(|f| f.id.as_str()).collect()
}

/// Run the configured assertion sequence fail-fast, returning the first
/// violation. Later assertions are not evaluated once one fails.
fn run_assertions(assertions: &[Assertion], findings: &[Finding]) -> Option<PolicyError> {
    for assertion in assertions {
        match assertion.check(findings) {
            Ok(()) => tracing::info!(check = %assertion.label(), "Assertion passed"),
            Err(violation) => {
                tracing::warn!(check = %assertion.label(), %violation, "Assertion failed");
                return Some(violation);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::findings::{test_finding, Risk};

    /// Transport answering each fetch with the next scripted snapshot;
    /// once the script runs out, the last snapshot repeats.
    struct ScriptedTransport {
        snapshots: Vec<FindingSet>,
        fetches: AtomicUsize,
        scans: Mutex<Vec<(String, bool)>>,
    }

    impl ScriptedTransport {
        fn new(snapshots: Vec<FindingSet>) -> Arc<Self> {
            assert!(!snapshots.is_empty());
            Arc::new(Self {
                snapshots,
                fetches: AtomicUsize::new(0),
                scans: Mutex::new(Vec::new()),
            })
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ScanTransport for Arc<ScriptedTransport> {
        async fn request_scan(&self, page_url: &str, recurse: bool) -> Result<(), ScanError> {
            self.scans
                .lock()
                .unwrap()
                .push((page_url.to_string(), recurse));
            Ok(())
        }

        async fn fetch_findings(&self, _target_url: &str) -> Result<FindingSet, ScanError> {
            let i = self.fetches.fetch_add(1, Ordering::SeqCst);
            let idx = i.min(self.snapshots.len() - 1);
            Ok(self.snapshots[idx].clone())
        }
    }

    fn stub_session(
        transport: &Arc<ScriptedTransport>,
        configure: impl FnOnce(&mut Config),
    ) -> ScanSession {
        let mut config = Config::default();
        config.scanner.keyless = true;
        config.session.target_url = "http://target.test/".into();
        config.session.poll_interval_ms = 100;
        config.session.poll_deadline_secs = 60;
        configure(&mut config);
        ScanSession::with_transport(config, Box::new(Arc::clone(transport))).unwrap()
    }

    fn snapshot(names: &[&str]) -> FindingSet {
        names
            .iter()
            .map(|n| test_finding(n, Risk::Low, "fix"))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn poll_loop_resets_stability_count_on_a_changed_snapshot() {
        let a = snapshot(&["one"]);
        let b = snapshot(&["one", "two"]);
        // initial A, one stable A, then the set grows: stability must
        // restart and only settle after two unchanged B fetches
        let transport = ScriptedTransport::new(vec![
            a.clone(),
            a,
            b.clone(),
            b.clone(),
            b.clone(),
        ]);
        let session = stub_session(&transport, |c| c.session.stable_fetches = 2);

        let collected = session.collect_findings("http://target.test/").await.unwrap();

        assert_eq!(snapshot_fingerprint(&collected), snapshot_fingerprint(&b));
        assert_eq!(transport.fetch_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_deadline_expiry_keeps_the_last_snapshot() {
        // every fetch differs, so the required stability is never reached
        let transport = ScriptedTransport::new(vec![
            snapshot(&["a"]),
            snapshot(&["a", "b"]),
            snapshot(&["a", "b", "c"]),
        ]);
        let session = stub_session(&transport, |c| {
            c.session.stable_fetches = 3;
            c.session.poll_interval_ms = 500;
            c.session.poll_deadline_secs = 1;
        });

        let collected = session.collect_findings("http://target.test/").await.unwrap();

        // initial fetch plus two polls fit before the deadline
        assert_eq!(transport.fetch_count(), 3);
        assert_eq!(
            snapshot_fingerprint(&collected),
            snapshot_fingerprint(&snapshot(&["a", "b", "c"]))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_stable_fetches_fetches_exactly_once() {
        let first = snapshot(&["only"]);
        let transport = ScriptedTransport::new(vec![first.clone(), snapshot(&["never-seen"])]);
        let session = stub_session(&transport, |c| c.session.stable_fetches = 0);

        let collected = session.collect_findings("http://target.test/").await.unwrap();

        assert_eq!(transport.fetch_count(), 1);
        assert_eq!(snapshot_fingerprint(&collected), snapshot_fingerprint(&first));
    }

    #[tokio::test(start_paused = true)]
    async fn run_requests_scan_writes_report_and_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let report_path = dir.path().join("report.html");

        // high risk with a blank solution: both no-high-risk and
        // all-have-solutions would fail, only the first configured
        // assertion may surface
        let transport = ScriptedTransport::new(vec![vec![test_finding(
            "SQL Injection",
            Risk::High,
            "",
        )]]);
        let mut session = stub_session(&transport, |c| {
            c.session.stable_fetches = 0;
            c.session.report_path = report_path.clone();
            c.session.assertions = vec![
                Assertion::AlertsPresent,
                Assertion::NoHighRisk,
                Assertion::AllHaveSolutions,
            ];
        });

        let outcome = session.run().await.unwrap();

        assert_eq!(
            *transport.scans.lock().unwrap(),
            vec![("http://target.test/".to_string(), false)]
        );
        assert!(!outcome.passed());
        assert_eq!(
            outcome.violation,
            Some(PolicyError::HighRiskFindings {
                names: vec!["SQL Injection".into()]
            })
        );
        assert_eq!(outcome.findings_total, 1);

        let report = std::fs::read_to_string(&report_path).unwrap();
        assert!(report.contains("SQL Injection"));
    }

    #[tokio::test(start_paused = true)]
    async fn run_reports_success_when_every_assertion_passes() {
        let dir = tempfile::tempdir().unwrap();
        let transport =
            ScriptedTransport::new(vec![vec![test_finding("Server Banner", Risk::Low, "hide")]]);
        let mut session = stub_session(&transport, |c| {
            c.session.stable_fetches = 0;
            c.session.report_path = dir.path().join("report.html");
            c.session.assertions = vec![Assertion::AlertsPresent, Assertion::NoHighRisk];
        });

        let outcome = session.run().await.unwrap();
        assert!(outcome.passed());
        assert_eq!(session.findings().len(), 1);
    }

    #[test]
    fn empty_set_fails_overall_with_no_findings() {
        let sequence = [Assertion::AlertsPresent, Assertion::NoHighRisk];
        let violation = run_assertions(&sequence, &[]);
        assert_eq!(violation, Some(PolicyError::NoFindings));
    }

    #[test]
    fn assertions_run_fail_fast_in_configured_order() {
        // Both would fail; only the first configured one surfaces.
        let set = vec![test_finding("SQL Injection", Risk::High, "")];
        let sequence = [
            Assertion::NoHighRisk,
            Assertion::AllHaveSolutions,
            Assertion::BelowRiskLevel { max: "Low".into() },
        ];
        let violation = run_assertions(&sequence, &set);
        assert_eq!(
            violation,
            Some(PolicyError::HighRiskFindings {
                names: vec!["SQL Injection".into()]
            })
        );
    }

    #[test]
    fn passing_sequence_yields_no_violation() {
        let set = vec![
            test_finding("M", Risk::Medium, "x"),
            test_finding("L", Risk::Low, "y"),
        ];
        let sequence = [
            Assertion::AlertsPresent,
            Assertion::AllHaveSolutions,
            Assertion::BelowRiskLevel { max: "Medium".into() },
        ];
        assert_eq!(run_assertions(&sequence, &set), None);
    }

    #[test]
    fn blank_solution_surfaces_missing_solution_count() {
        let set = vec![test_finding("Missing Anti-clickjacking Header", Risk::Low, "")];
        let sequence = [Assertion::AllHaveSolutions];
        assert_eq!(
            run_assertions(&sequence, &set),
            Some(PolicyError::MissingSolution { count: 1 })
        );
    }

    #[test]
    fn fingerprint_tracks_alert_ids_in_order() {
        let a = vec![
            test_finding("One", Risk::Low, "x"),
            test_finding("Two", Risk::Low, "x"),
        ];
        let b = a.clone();
        assert_eq!(snapshot_fingerprint(&a), snapshot_fingerprint(&b));

        let shorter = vec![test_finding("One", Risk::Low, "x")];
        assert_ne!(snapshot_fingerprint(&a), snapshot_fingerprint(&shorter));
    }

    #[test]
    fn outcome_reports_pass_and_fail() {
        let passed = SessionOutcome {
            target: "http://t/".into(),
            findings_total: 2,
            report_path: PathBuf::from("r.html"),
            violation: None,
        };
        assert!(passed.passed());

        let failed = SessionOutcome {
            violation: Some(PolicyError::NoFindings),
            ..passed
        };
        assert!(!failed.passed());
    }

    #[tokio::test]
    async fn noop_reporter_accepts_any_outcome() {
        let outcome = SessionOutcome {
            target: "http://t/".into(),
            findings_total: 0,
            report_path: PathBuf::from("r.html"),
            violation: Some(PolicyError::NoFindings),
        };
        assert!(NoopReporter.report(&outcome).await.is_ok());
    }
}
