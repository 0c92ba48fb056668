//! zapwright host runner
//!
//! Thin orchestration binary around the library: loads configuration,
//! runs one scan session, prints the outcome, and exits nonzero on a
//! policy violation or infrastructure failure. No scan logic lives here;
//! the library is equally usable from a test-runner directly.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use zapwright::{Config, ScanSession};

/// Scan orchestration for ZAP-style security scanning proxies
#[derive(Parser, Debug)]
#[command(name = "zapwright")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ZAPWRIGHT_CONFIG")]
    config: Option<String>,

    /// Target URL (overrides session.target_url)
    #[arg(long)]
    target: Option<String>,

    /// Report output path (overrides session.report_path)
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "ZAPWRIGHT_LOG_LEVEL")]
    log_level: String,

    /// Validate configuration and exit
    #[arg(long)]
    validate_config: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(&cli);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting zapwright");

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(target) = cli.target {
        config.session.target_url = target;
    }
    if let Some(report) = cli.report {
        config.session.report_path = report;
    }

    if cli.validate_config {
        config.validate()?;
        tracing::info!("Configuration is valid");
        return Ok(ExitCode::SUCCESS);
    }

    let mut session = ScanSession::new(config)?;
    let outcome = session.run().await?;

    if let Some(violation) = &outcome.violation {
        println!(
            "FAIL: {violation} ({} findings, report at {})",
            outcome.findings_total,
            outcome.report_path.display()
        );
        Ok(ExitCode::FAILURE)
    } else {
        println!(
            "PASS: {} findings for {}, report at {}",
            outcome.findings_total,
            outcome.target,
            outcome.report_path.display()
        );
        Ok(ExitCode::SUCCESS)
    }
}

fn init_logging(cli: &Cli) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
