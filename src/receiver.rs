//! 💠 Receiver — runs every stage over one inbound message
//!
//! parse → policy gate → canonical form → certificate check → dispatch.
//! Later stages still run after a failed check so the trail shows every
//! finding, but only a clean run is ever accepted.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::canonical;
use crate::confirm::{DispatchError, HttpSubscriptionConfirmer, SubscriptionConfirmer};
use crate::config::ReceiverConfig;
use crate::envelope::{Envelope, MessageType, ParseError};
use crate::fetch::{CertificateSource, CertificateVerifier, FetchError, HttpCertificateSource};
use crate::policy::{self, Policy, PolicyViolation};

/// Emit a trail event only when debug logging is configured.
macro_rules! trail {
    ($self:ident, $level:ident, $($arg:tt)+) => {
        if $self.debug {
            tracing::$level!(target: "snsgate", $($arg)+);
        }
    };
}

/// Furthest stage a message reached, for the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Stage {
    Start,
    PolicyChecked,
    SignatureChecked,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Policy(PolicyViolation),
    SignatureMismatch { detail: String },
    /// Message passed every check but its type needs no action here.
    NoActionRequired(MessageType),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Policy(violation) => violation.fmt(f),
            RejectReason::SignatureMismatch { detail } => write!(f, "Signature check failed: {}", detail),
            RejectReason::NoActionRequired(message_type) => {
                write!(f, "No action required for {} messages", message_type)
            }
        }
    }
}

#[derive(Debug)]
pub enum ErrorKind {
    Parse(ParseError),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

/// Outcome of [`SnsReceiver::handle`]. Only `Accepted` may reach application code.
#[derive(Debug)]
pub enum VerificationResult {
    Accepted(Envelope),
    Rejected(Vec<RejectReason>),
    Error(ErrorKind),
}

impl VerificationResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, VerificationResult::Accepted(_))
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            VerificationResult::Accepted(envelope) => Some(envelope),
            _ => None,
        }
    }

    pub fn into_envelope(self) -> Option<Envelope> {
        match self {
            VerificationResult::Accepted(envelope) => Some(envelope),
            _ => None,
        }
    }

    pub fn reasons(&self) -> &[RejectReason] {
        match self {
            VerificationResult::Rejected(reasons) => reasons,
            _ => &[],
        }
    }
}

/// Failure to set up the HTTP collaborators.
#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("Cannot build certificate client: {0}")]
    CertificateClient(#[from] FetchError),
    #[error("Cannot build confirmation client: {0}")]
    ConfirmationClient(#[from] DispatchError),
}

pub struct SnsReceiver {
    policy: Policy,
    debug: bool,
    certificates: Arc<dyn CertificateSource>,
    confirmer: Arc<dyn SubscriptionConfirmer>,
}

impl SnsReceiver {
    /// Receiver with HTTP collaborators built from `config`.
    pub fn new(config: &ReceiverConfig) -> Result<Self, ReceiverError> {
        let certificates = HttpCertificateSource::new(
            config.cert_fetch_timeout(),
            config.confirm_connect_timeout(),
            config.max_certificate_bytes,
        )?;
        let confirmer = HttpSubscriptionConfirmer::new(
            config.confirm_connect_timeout(),
            config.cert_fetch_timeout(),
        )?;
        Ok(Self::with_collaborators(
            config.policy(),
            config.debug,
            Arc::new(certificates),
            Arc::new(confirmer),
        ))
    }

    pub fn with_collaborators(
        policy: Policy,
        debug: bool,
        certificates: Arc<dyn CertificateSource>,
        confirmer: Arc<dyn SubscriptionConfirmer>,
    ) -> Self {
        Self { policy, debug, certificates, confirmer }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Authenticate one raw request body.
    pub async fn handle(&self, body: &[u8]) -> VerificationResult {
        let (result, stage) = self.run(body).await;
        trail!(self, debug, stage = ?stage, accepted = result.is_accepted(), "message handled");
        result
    }

    async fn run(&self, body: &[u8]) -> (VerificationResult, Stage) {
        let envelope = match Envelope::parse(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                trail!(self, error, error = %e, "cannot parse inbound message");
                return (VerificationResult::Error(ErrorKind::Parse(e)), Stage::Start);
            }
        };
        let message_type = envelope.message_type();
        trail!(
            self,
            debug,
            message_id = %envelope.message_id,
            message_type = %message_type,
            topic_arn = %envelope.topic_arn,
            "parsed inbound message"
        );

        let report = policy::check(&envelope, &self.policy);
        for violation in &report.violations {
            trail!(self, debug, "{}", violation);
        }
        let mut reasons: Vec<RejectReason> =
            report.violations.iter().cloned().map(RejectReason::Policy).collect();
        let mut stage = Stage::PolicyChecked;

        if !self.policy.verify_certificate {
            trail!(self, debug, "Certificate verification disabled");
            stage = Stage::SignatureChecked;
        } else if !report.origin_trusted() {
            trail!(self, debug, "Certificate not fetched from untrusted origin");
        } else {
            if let Some(reason) = self.check_signature(&envelope).await {
                reasons.push(reason);
            }
            stage = Stage::SignatureChecked;
        }

        if !reasons.is_empty() {
            return (VerificationResult::Rejected(reasons), stage);
        }

        match message_type {
            MessageType::SubscriptionConfirmation => {
                if let Some(url) = envelope.subscribe_url() {
                    trail!(self, debug, subscribe_url = url, "confirming subscription");
                    if let Err(e) = self.confirmer.confirm(url).await {
                        trail!(self, error, error = %e, "subscription confirmation failed");
                    }
                }
                trail!(self, info, message_id = %envelope.message_id, "subscription confirmation handled");
                (VerificationResult::Accepted(envelope), Stage::Done)
            }
            MessageType::Notification => {
                trail!(
                    self,
                    info,
                    message_id = %envelope.message_id,
                    "Type: {} Message: {}",
                    message_type,
                    envelope.message
                );
                (VerificationResult::Accepted(envelope), Stage::Done)
            }
            MessageType::UnsubscribeConfirmation => {
                trail!(self, debug, "No action for {}", message_type);
                (
                    VerificationResult::Rejected(vec![RejectReason::NoActionRequired(message_type)]),
                    Stage::Done,
                )
            }
        }
    }

    async fn check_signature(&self, envelope: &Envelope) -> Option<RejectReason> {
        let canonical = canonical::build_string(envelope);
        trail!(self, debug, "Data validation string: {}", canonical);
        if envelope.signature_version != "1" {
            trail!(
                self,
                debug,
                signature_version = %envelope.signature_version,
                "unsupported signature version, expecting RSA/SHA-1"
            );
        }

        let verifier = CertificateVerifier::new(self.certificates.as_ref());
        match verifier
            .verify_detailed(&envelope.signing_cert_url, &envelope.signature, canonical.as_bytes())
            .await
        {
            Ok(fingerprint) => {
                trail!(self, debug, certificate = %fingerprint, "Data validated against certificate");
                None
            }
            Err(e) => {
                trail!(self, debug, error = %e, "Data and signature do not match certificate or certificate error");
                Some(RejectReason::SignatureMismatch { detail: e.to_string() })
            }
        }
    }
}
