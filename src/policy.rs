//! Stage 2: Policy Gate
//!
//! Topic and origin restrictions, independent of cryptographic validity.
//! Every check runs; findings accumulate instead of short-circuiting.

use crate::envelope::Envelope;
use std::fmt;
use url::Url;

/// Host reported when `SigningCertURL` cannot be parsed. Never a valid domain.
pub const UNPARSABLE_HOST: &str = "ERROR";

/// Immutable receiver policy, built once from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub restrict_by_topic: bool,
    pub allowed_topic: String,
    pub verify_certificate: bool,
    pub expected_origin_domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    TopicMismatch { allowed: String, actual: String },
    OriginMismatch { expected: String, actual: String },
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyViolation::TopicMismatch { allowed, actual } => write!(
                f,
                "Allowed topic ARN '{}' does not match calling topic ARN '{}'",
                allowed, actual
            ),
            PolicyViolation::OriginMismatch { expected, actual } => write!(
                f,
                "Key domain '{}' is not equal to allowed source domain '{}'",
                actual, expected
            ),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PolicyReport {
    pub violations: Vec<PolicyViolation>,
}

impl PolicyReport {
    pub fn ok(&self) -> bool {
        self.violations.is_empty()
    }

    /// True when the certificate URL points at the expected origin.
    pub fn origin_trusted(&self) -> bool {
        !self
            .violations
            .iter()
            .any(|v| matches!(v, PolicyViolation::OriginMismatch { .. }))
    }
}

/// Run the topic check (when enabled) and the origin check (always).
pub fn check(envelope: &Envelope, policy: &Policy) -> PolicyReport {
    let mut report = PolicyReport::default();

    if policy.restrict_by_topic && envelope.topic_arn != policy.allowed_topic {
        report.violations.push(PolicyViolation::TopicMismatch {
            allowed: policy.allowed_topic.clone(),
            actual: envelope.topic_arn.clone(),
        });
    }

    let host = host_of(&envelope.signing_cert_url);
    if host != policy.expected_origin_domain {
        report.violations.push(PolicyViolation::OriginMismatch {
            expected: policy.expected_origin_domain.clone(),
            actual: host,
        });
    }

    report
}

/// Host component of a URL, or [`UNPARSABLE_HOST`] if there is none.
pub fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| UNPARSABLE_HOST.to_string())
}
