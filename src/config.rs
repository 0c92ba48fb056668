//! Configuration management
//!
//! TOML-backed configuration with serde defaults. Read once at session
//! construction and read-only afterwards, so sessions can run in parallel
//! without sharing mutable state.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::assertions::Assertion;
use crate::error::ConfigError;

/// Environment variable that overrides the configured API key.
pub const API_KEY_ENV: &str = "ZAP_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Scanner control API settings
    pub scanner: ScannerConfig,

    /// Per-session settings
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Scanner control endpoint (host:port base URL)
    pub endpoint: String,

    /// API key sent with every control request
    pub api_key: Option<String>,

    /// Explicit opt-in for keyless deployments. An absent key is only
    /// accepted when this is set; it is never defaulted silently.
    pub keyless: bool,

    /// Per-call timeout in seconds
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// URL of the page under test
    pub target_url: String,

    /// Where the HTML report is written (overwritten each run)
    pub report_path: PathBuf,

    /// Whether the scan may crawl beyond the target page
    pub recurse: bool,

    /// Delay between findings fetches while waiting for the scan to settle
    pub poll_interval_ms: u64,

    /// Consecutive unchanged fetches required before the snapshot is taken.
    /// 0 disables polling and fetches exactly once.
    pub stable_fetches: u32,

    /// Overall deadline for the poll loop, in seconds
    pub poll_deadline_secs: u64,

    /// Ordered assertion sequence, run fail-fast
    pub assertions: Vec<Assertion>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8088".to_string(),
            api_key: None,
            keyless: false,
            request_timeout: 30,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target_url: String::new(),
            report_path: PathBuf::from("zap-scan-report.html"),
            recurse: false,
            poll_interval_ms: 2000,
            stable_fetches: 3,
            poll_deadline_secs: 120,
            assertions: vec![
                Assertion::AlertsPresent,
                Assertion::NoHighRisk,
                Assertion::AllHaveSolutions,
                Assertion::BelowRiskLevel {
                    max: "Medium".to_string(),
                },
            ],
        }
    }
}

/// The API key actually used for control requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKey {
    Key(String),
    Keyless,
}

impl Config {
    /// Load configuration from `path`, or from the default location when
    /// none is given. A missing default file yields the defaults.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
                    path: config_path.display().to_string(),
                    source,
                })?;

            let config: Config =
                toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;

            tracing::info!("Loaded configuration from {:?}", config_path);
            Ok(config)
        } else if path.is_some() {
            Err(ConfigError::Read {
                path: config_path.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            })
        } else {
            tracing::info!("No configuration file found, using defaults");
            Ok(Self::default())
        }
    }

    fn default_config_path() -> Result<PathBuf, ConfigError> {
        let dirs = directories::ProjectDirs::from("io", "zapwright", "zapwright").ok_or_else(
            || ConfigError::Validation {
                field: "config".into(),
                reason: "could not determine config directory".into(),
            },
        )?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Resolve the API key, preferring the `ZAP_API_KEY` environment
    /// variable over the file value. Fails unless a key is present or the
    /// deployment opted into keyless mode explicitly.
    pub fn resolved_api_key(&self) -> Result<ApiKey, ConfigError> {
        let env_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        resolve_api_key(env_key, self.scanner.api_key.clone(), self.scanner.keyless)
    }

    /// Validate settings that must hold before any network call.
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.scanner.endpoint).map_err(|e| ConfigError::InvalidEndpoint {
            endpoint: self.scanner.endpoint.clone(),
            reason: e.to_string(),
        })?;

        if self.session.target_url.is_empty() {
            return Err(ConfigError::Validation {
                field: "session.target_url".into(),
                reason: "no target URL configured".into(),
            });
        }

        self.resolved_api_key()?;
        Ok(())
    }
}

fn resolve_api_key(
    env_key: Option<String>,
    file_key: Option<String>,
    keyless: bool,
) -> Result<ApiKey, ConfigError> {
    match env_key.or(file_key) {
        Some(key) => Ok(ApiKey::Key(key)),
        None if keyless => Ok(ApiKey::Keyless),
        None => Err(ConfigError::MissingApiKey),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_expected_scan_flow() {
        let config = Config::default();
        assert_eq!(config.scanner.endpoint, "http://127.0.0.1:8088");
        assert!(!config.session.recurse);
        assert_eq!(config.session.assertions.len(), 4);
    }

    #[test]
    fn missing_key_without_keyless_optin_is_an_error() {
        assert!(matches!(
            resolve_api_key(None, None, false),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn keyless_must_be_explicit() {
        assert_eq!(resolve_api_key(None, None, true).unwrap(), ApiKey::Keyless);
    }

    #[test]
    fn env_key_takes_precedence_over_file_key() {
        assert_eq!(
            resolve_api_key(Some("env-key".into()), Some("file-key".into()), false).unwrap(),
            ApiKey::Key("env-key".into())
        );
        assert_eq!(
            resolve_api_key(None, Some("file-key".into()), false).unwrap(),
            ApiKey::Key("file-key".into())
        );
    }

    #[test]
    fn parses_a_full_config_file() {
        let toml = r#"
            [scanner]
            endpoint = "http://127.0.0.1:8090"
            api_key = "secret"
            request_timeout = 10

            [session]
            target_url = "http://juice-shop.test/"
            report_path = "out/report.html"
            stable_fetches = 0

            [[session.assertions]]
            check = "alerts-present"

            [[session.assertions]]
            check = "no-high-risk"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.scanner.endpoint, "http://127.0.0.1:8090");
        assert_eq!(config.scanner.api_key.as_deref(), Some("secret"));
        assert_eq!(config.session.stable_fetches, 0);
        assert_eq!(config.session.assertions.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_endpoint_and_missing_target() {
        let mut config = Config::default();
        config.scanner.endpoint = "not a url".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEndpoint { .. })
        ));

        let mut config = Config::default();
        config.scanner.keyless = true;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { .. })
        ));
    }
}
