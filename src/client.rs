//! Scanner control API client
//!
//! Talks to a ZAP-style scanning proxy over its JSON control endpoints and
//! translates responses into the finding data model. Every call carries the
//! API key resolved at construction and a bounded timeout; a hang surfaces
//! as a typed transport error instead of blocking the session.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::config::{ApiKey, Config};
use crate::error::ScanError;
use crate::findings::{self, FindingSet};

const ASCAN_PATH: &str = "/JSON/ascan/action/scan/";
const SPIDER_PATH: &str = "/JSON/spider/action/scan/";
const ALERTS_PATH: &str = "/JSON/core/view/alerts/";

/// The scanner control operations a session depends on. Implemented by
/// [`ScanClient`]; a host (or a test) can substitute its own transport.
#[async_trait]
pub trait ScanTransport: Send + Sync {
    async fn request_scan(&self, page_url: &str, recurse: bool) -> Result<(), ScanError>;
    async fn fetch_findings(&self, target_url: &str) -> Result<FindingSet, ScanError>;
}

pub struct ScanClient {
    client: reqwest::Client,
    endpoint: Url,
    api_key: ApiKey,
    timeout_secs: u64,
}

impl ScanClient {
    /// Build a client from configuration. Fails fast on a bad endpoint or
    /// unresolved API key, before any network call.
    pub fn new(config: &Config) -> Result<Self, ScanError> {
        let endpoint = Url::parse(&config.scanner.endpoint).map_err(|e| {
            crate::error::ConfigError::InvalidEndpoint {
                endpoint: config.scanner.endpoint.clone(),
                reason: e.to_string(),
            }
        })?;

        let api_key = config.resolved_api_key()?;
        Self::from_parts(endpoint, api_key, config.scanner.request_timeout)
    }

    fn from_parts(endpoint: Url, api_key: ApiKey, timeout_secs: u64) -> Result<Self, ScanError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ScanError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            timeout_secs,
        })
    }

    fn control_url(&self, path: &str) -> Result<Url, ScanError> {
        self.endpoint
            .join(path)
            .map_err(|e| ScanError::FindingsFetch(format!("bad control path {path}: {e}")))
    }

    /// Query parameters common to every control call.
    fn base_params(&self) -> Vec<(&'static str, String)> {
        match &self.api_key {
            ApiKey::Key(key) => vec![("apikey", key.clone())],
            ApiKey::Keyless => Vec::new(),
        }
    }

    /// Trigger an active scan of `page_url`. With `recurse` false the scan
    /// is constrained to the given page and does not crawl beyond it.
    ///
    /// Fire-and-forget relative to scan completion: the scanner processes
    /// asynchronously and this returns as soon as the request is accepted.
    pub async fn request_scan(&self, page_url: &str, recurse: bool) -> Result<(), ScanError> {
        let mut params = self.base_params();
        params.push(("url", page_url.to_string()));
        params.push(("recurse", recurse.to_string()));

        let url = self.control_url(ASCAN_PATH)?;
        let response = self
            .client
            .get(url)
            .query(&params)
            .send()
            .await
            .map_err(|e| self.scan_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::ScanRequest {
                status: Some(status.as_u16()),
                body,
            });
        }

        tracing::info!(url = page_url, recurse, "Active scan started");
        Ok(())
    }

    /// Ask the scanner to spider out from `target_url`, seeding its site
    /// tree before a wider scan.
    pub async fn start_spider(&self, target_url: &str) -> Result<(), ScanError> {
        let mut params = self.base_params();
        params.push(("url", target_url.to_string()));

        let url = self.control_url(SPIDER_PATH)?;
        let response = self
            .client
            .get(url)
            .query(&params)
            .send()
            .await
            .map_err(|e| self.scan_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::ScanRequest {
                status: Some(status.as_u16()),
                body,
            });
        }

        tracing::info!(url = target_url, "Spider scan started");
        Ok(())
    }

    /// Fetch the current findings snapshot for `target_url`.
    ///
    /// The scanner may or may not filter authoritatively by URL; callers
    /// must treat the result as "everything currently known", not a
    /// guaranteed subset. A malformed payload rejects the whole fetch.
    pub async fn fetch_findings(&self, target_url: &str) -> Result<FindingSet, ScanError> {
        let mut params = self.base_params();
        params.push(("url", target_url.to_string()));

        let url = self.control_url(ALERTS_PATH)?;
        let response = self
            .client
            .get(url)
            .query(&params)
            .send()
            .await
            .map_err(|e| self.fetch_error(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ScanError::FindingsFetch(e.to_string()))?;

        if !status.is_success() {
            return Err(ScanError::FindingsFetch(format!(
                "scanner answered {status}: {body}"
            )));
        }

        let findings = findings::parse_alerts(&body)?;
        tracing::info!(count = findings.len(), url = target_url, "Findings fetched");
        Ok(findings)
    }

    fn scan_request_error(&self, e: reqwest::Error) -> ScanError {
        if e.is_timeout() {
            ScanError::Timeout(self.timeout_secs)
        } else {
            ScanError::ScanRequest {
                status: None,
                body: e.to_string(),
            }
        }
    }

    fn fetch_error(&self, e: reqwest::Error) -> ScanError {
        if e.is_timeout() {
            ScanError::Timeout(self.timeout_secs)
        } else {
            ScanError::FindingsFetch(e.to_string())
        }
    }
}

#[async_trait]
impl ScanTransport for ScanClient {
    async fn request_scan(&self, page_url: &str, recurse: bool) -> Result<(), ScanError> {
        ScanClient::request_scan(self, page_url, recurse).await
    }

    async fn fetch_findings(&self, target_url: &str) -> Result<FindingSet, ScanError> {
        ScanClient::fetch_findings(self, target_url).await
    }
}
