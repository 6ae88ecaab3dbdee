//! Receiver configuration.
//!
//! JSON keys follow the receiver's historical config file:
//!
//! ```json
//! {
//!   "debug": true,
//!   "restrictByTopic": true,
//!   "allowedTopic": "arn:aws:sns:us-east-1:123456789012:MyTopic",
//!   "verifyCertificate": true,
//!   "sourceDomain": "sns.us-east-1.amazonaws.com"
//! }
//! ```

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::confirm::DEFAULT_CONNECT_TIMEOUT;
use crate::fetch::DEFAULT_MAX_CERTIFICATE_BYTES;
use crate::policy::Policy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sourceDomain is required")]
    MissingSourceDomain,
    #[error("allowedTopic is required when restrictByTopic is enabled")]
    MissingAllowedTopic,
    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReceiverConfig {
    /// Emit the decision trail through `tracing`.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub restrict_by_topic: bool,
    #[serde(default)]
    pub allowed_topic: String,
    #[serde(default = "default_true")]
    pub verify_certificate: bool,
    pub source_domain: String,
    #[serde(default = "default_cert_fetch_timeout_ms")]
    pub cert_fetch_timeout_ms: u64,
    #[serde(default = "default_confirm_connect_timeout_ms")]
    pub confirm_connect_timeout_ms: u64,
    #[serde(default = "default_max_certificate_bytes")]
    pub max_certificate_bytes: usize,
}

fn default_true() -> bool {
    true
}

fn default_cert_fetch_timeout_ms() -> u64 {
    5_000
}

fn default_confirm_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT.as_millis() as u64
}

fn default_max_certificate_bytes() -> usize {
    DEFAULT_MAX_CERTIFICATE_BYTES
}

/// Milliseconds, rounded up so a non-zero duration never becomes zero.
fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

impl ReceiverConfig {
    pub fn builder() -> ReceiverConfigBuilder {
        ReceiverConfigBuilder::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ReceiverConfig = serde_json::from_str(json)?;
        config.validated()
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn policy(&self) -> Policy {
        Policy {
            restrict_by_topic: self.restrict_by_topic,
            allowed_topic: self.allowed_topic.clone(),
            verify_certificate: self.verify_certificate,
            expected_origin_domain: self.source_domain.clone(),
        }
    }

    pub fn cert_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.cert_fetch_timeout_ms)
    }

    pub fn confirm_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_connect_timeout_ms)
    }

    fn validated(mut self) -> Result<Self, ConfigError> {
        self.source_domain = self.source_domain.trim().to_ascii_lowercase();
        if self.source_domain.is_empty() {
            return Err(ConfigError::MissingSourceDomain);
        }
        if self.restrict_by_topic && self.allowed_topic.is_empty() {
            return Err(ConfigError::MissingAllowedTopic);
        }
        if self.cert_fetch_timeout_ms == 0 {
            return Err(ConfigError::ZeroLimit("certFetchTimeoutMs"));
        }
        if self.confirm_connect_timeout_ms == 0 {
            return Err(ConfigError::ZeroLimit("confirmConnectTimeoutMs"));
        }
        if self.max_certificate_bytes == 0 {
            return Err(ConfigError::ZeroLimit("maxCertificateBytes"));
        }
        Ok(self)
    }
}

/// Builder for `ReceiverConfig`.
#[derive(Debug, Default)]
pub struct ReceiverConfigBuilder {
    debug: bool,
    allowed_topic: Option<String>,
    skip_certificate_verification: bool,
    source_domain: Option<String>,
    cert_fetch_timeout: Option<Duration>,
    confirm_connect_timeout: Option<Duration>,
    max_certificate_bytes: Option<usize>,
}

impl ReceiverConfigBuilder {
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Only accept messages from this topic.
    #[must_use]
    pub fn allowed_topic(mut self, topic: impl Into<String>) -> Self {
        self.allowed_topic = Some(topic.into());
        self
    }

    #[must_use]
    pub fn source_domain(mut self, domain: impl Into<String>) -> Self {
        self.source_domain = Some(domain.into());
        self
    }

    /// Disables signature checking entirely. Origin and topic checks still run.
    #[must_use]
    pub fn skip_certificate_verification(mut self) -> Self {
        self.skip_certificate_verification = true;
        self
    }

    #[must_use]
    pub fn cert_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.cert_fetch_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn confirm_connect_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_connect_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn max_certificate_bytes(mut self, limit: usize) -> Self {
        self.max_certificate_bytes = Some(limit);
        self
    }

    pub fn build(self) -> Result<ReceiverConfig, ConfigError> {
        let source_domain = self.source_domain.ok_or(ConfigError::MissingSourceDomain)?;
        ReceiverConfig {
            debug: self.debug,
            restrict_by_topic: self.allowed_topic.is_some(),
            allowed_topic: self.allowed_topic.unwrap_or_default(),
            verify_certificate: !self.skip_certificate_verification,
            source_domain,
            cert_fetch_timeout_ms: self
                .cert_fetch_timeout
                .map_or_else(default_cert_fetch_timeout_ms, whole_millis),
            confirm_connect_timeout_ms: self
                .confirm_connect_timeout
                .map_or_else(default_confirm_connect_timeout_ms, whole_millis),
            max_certificate_bytes: self
                .max_certificate_bytes
                .unwrap_or_else(default_max_certificate_bytes),
        }
        .validated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_historical_keys() {
        let config = ReceiverConfig::from_json_str(
            r#"{
                "debug": true,
                "restrictByTopic": true,
                "allowedTopic": "arn:aws:sns:us-east-1:123456789012:MyTopic",
                "verifyCertificate": true,
                "sourceDomain": "sns.us-east-1.amazonaws.com"
            }"#,
        )
        .unwrap();

        assert!(config.debug);
        assert_eq!(
            config.policy(),
            Policy {
                restrict_by_topic: true,
                allowed_topic: "arn:aws:sns:us-east-1:123456789012:MyTopic".into(),
                verify_certificate: true,
                expected_origin_domain: "sns.us-east-1.amazonaws.com".into(),
            }
        );
        assert_eq!(config.confirm_connect_timeout(), Duration::from_secs(2));
        assert_eq!(config.max_certificate_bytes, 8192);
    }

    #[test]
    fn verification_defaults_on() {
        let config = ReceiverConfig::from_json_str(r#"{"sourceDomain": "sns.eu-west-1.amazonaws.com"}"#).unwrap();
        assert!(config.verify_certificate);
        assert!(!config.restrict_by_topic);
        assert!(!config.debug);
    }

    #[test]
    fn source_domain_is_normalized() {
        let config = ReceiverConfig::from_json_str(r#"{"sourceDomain": " SNS.us-east-1.amazonaws.com "}"#).unwrap();
        assert_eq!(config.source_domain, "sns.us-east-1.amazonaws.com");
    }

    #[test]
    fn rejects_incomplete_configs() {
        assert!(matches!(
            ReceiverConfig::from_json_str(r#"{"sourceDomain": ""}"#),
            Err(ConfigError::MissingSourceDomain)
        ));
        assert!(matches!(
            ReceiverConfig::from_json_str(r#"{"sourceDomain": "a", "restrictByTopic": true}"#),
            Err(ConfigError::MissingAllowedTopic)
        ));
        assert!(matches!(
            ReceiverConfig::from_json_str(r#"{"restrictByTopic": false}"#),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            ReceiverConfig::from_json_str(r#"{"sourceDomain": "a", "sourceDomian": "b"}"#),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            ReceiverConfig::from_json_str(r#"{"sourceDomain": "a", "maxCertificateBytes": 0}"#),
            Err(ConfigError::ZeroLimit("maxCertificateBytes"))
        ));
    }

    #[test]
    fn builder_sets_restriction_from_topic() {
        let config = ReceiverConfig::builder()
            .source_domain("sns.us-east-1.amazonaws.com")
            .allowed_topic("arn:aws:sns:us-east-1:123456789012:MyTopic")
            .skip_certificate_verification()
            .cert_fetch_timeout(Duration::from_millis(1500))
            .build()
            .unwrap();

        assert!(config.restrict_by_topic);
        assert!(!config.verify_certificate);
        assert_eq!(config.cert_fetch_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn builder_rounds_sub_millisecond_timeouts_up() {
        let config = ReceiverConfig::builder()
            .source_domain("sns.us-east-1.amazonaws.com")
            .cert_fetch_timeout(Duration::from_micros(300))
            .confirm_connect_timeout(Duration::from_micros(1_500))
            .build()
            .unwrap();

        assert_eq!(config.cert_fetch_timeout_ms, 1);
        assert_eq!(config.confirm_connect_timeout_ms, 2);
        assert_eq!(whole_millis(Duration::from_secs(2)), 2_000);
    }

    #[test]
    fn builder_requires_source_domain() {
        assert!(matches!(
            ReceiverConfig::builder().build(),
            Err(ConfigError::MissingSourceDomain)
        ));
    }
}
