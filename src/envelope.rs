//! Stage 1: Envelope Parsing
//!
//! Typed view of one SNS HTTP(S) delivery. Required fields are enforced by
//! serde; the per-type optional fields are checked in `TryFrom<RawEnvelope>`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// SNS message type, as carried in the `Type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    SubscriptionConfirmation,
    Notification,
    UnsubscribeConfirmation,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::SubscriptionConfirmation => "SubscriptionConfirmation",
            MessageType::Notification => "Notification",
            MessageType::UnsubscribeConfirmation => "UnsubscribeConfirmation",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid JSON envelope: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{field} is required for {message_type} messages")]
    MissingField {
        field: &'static str,
        message_type: MessageType,
    },
    #[error("{field} is not allowed on {message_type} messages")]
    UnexpectedField {
        field: &'static str,
        message_type: MessageType,
    },
}

/// Wire shape of the message, field names as the sender writes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "Type")]
    pub message_type: MessageType,
    #[serde(rename = "MessageId")]
    pub message_id: String,
    #[serde(rename = "TopicArn")]
    pub topic_arn: String,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Signature")]
    pub signature: String,
    #[serde(rename = "SignatureVersion")]
    pub signature_version: String,
    #[serde(rename = "SigningCertURL")]
    pub signing_cert_url: String,
    #[serde(rename = "SubscribeURL", default, skip_serializing_if = "Option::is_none")]
    pub subscribe_url: Option<String>,
    #[serde(rename = "Token", default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(rename = "Subject", default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(rename = "UnsubscribeURL", default, skip_serializing_if = "Option::is_none")]
    pub unsubscribe_url: Option<String>,
}

/// Fields that only exist for some message types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    SubscriptionConfirmation {
        subscribe_url: String,
        token: String,
    },
    Notification {
        subject: Option<String>,
        unsubscribe_url: Option<String>,
    },
    UnsubscribeConfirmation {
        subscribe_url: String,
        token: String,
    },
}

/// A parsed inbound message whose optional fields are consistent with its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope", into = "RawEnvelope")]
pub struct Envelope {
    pub message_id: String,
    pub topic_arn: String,
    pub message: String,
    pub timestamp: String,
    /// Base64 encoded signature over the canonical form.
    pub signature: String,
    pub signature_version: String,
    pub signing_cert_url: String,
    pub kind: MessageKind,
}

impl Envelope {
    /// Parse a raw request body.
    pub fn parse(body: &[u8]) -> Result<Self, ParseError> {
        let raw: RawEnvelope = serde_json::from_slice(body)?;
        Envelope::try_from(raw)
    }

    pub fn message_type(&self) -> MessageType {
        match self.kind {
            MessageKind::SubscriptionConfirmation { .. } => MessageType::SubscriptionConfirmation,
            MessageKind::Notification { .. } => MessageType::Notification,
            MessageKind::UnsubscribeConfirmation { .. } => MessageType::UnsubscribeConfirmation,
        }
    }

    /// `SubscribeURL`, present on both confirmation types.
    pub fn subscribe_url(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::SubscriptionConfirmation { subscribe_url, .. }
            | MessageKind::UnsubscribeConfirmation { subscribe_url, .. } => Some(subscribe_url),
            MessageKind::Notification { .. } => None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::SubscriptionConfirmation { token, .. }
            | MessageKind::UnsubscribeConfirmation { token, .. } => Some(token),
            MessageKind::Notification { .. } => None,
        }
    }

    pub fn subject(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::Notification { subject, .. } => subject.as_deref(),
            _ => None,
        }
    }

    /// Serialize back into the sender's JSON shape.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&RawEnvelope::from(self.clone()))
            .expect("envelope holds only strings and a unit enum, serialization cannot fail")
    }
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = ParseError;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        let message_type = raw.message_type;
        let forbid = |field: &'static str, value: &Option<String>| match value {
            Some(_) => Err(ParseError::UnexpectedField { field, message_type }),
            None => Ok(()),
        };
        let require = |field: &'static str, value: Option<String>| {
            value.ok_or(ParseError::MissingField { field, message_type })
        };

        let kind = match message_type {
            MessageType::Notification => {
                forbid("SubscribeURL", &raw.subscribe_url)?;
                forbid("Token", &raw.token)?;
                MessageKind::Notification {
                    subject: raw.subject,
                    unsubscribe_url: raw.unsubscribe_url,
                }
            }
            MessageType::SubscriptionConfirmation | MessageType::UnsubscribeConfirmation => {
                forbid("Subject", &raw.subject)?;
                forbid("UnsubscribeURL", &raw.unsubscribe_url)?;
                let subscribe_url = require("SubscribeURL", raw.subscribe_url)?;
                let token = require("Token", raw.token)?;
                if message_type == MessageType::SubscriptionConfirmation {
                    MessageKind::SubscriptionConfirmation { subscribe_url, token }
                } else {
                    MessageKind::UnsubscribeConfirmation { subscribe_url, token }
                }
            }
        };

        Ok(Envelope {
            message_id: raw.message_id,
            topic_arn: raw.topic_arn,
            message: raw.message,
            timestamp: raw.timestamp,
            signature: raw.signature,
            signature_version: raw.signature_version,
            signing_cert_url: raw.signing_cert_url,
            kind,
        })
    }
}

impl From<Envelope> for RawEnvelope {
    fn from(envelope: Envelope) -> Self {
        let message_type = envelope.message_type();
        let (subscribe_url, token, subject, unsubscribe_url) = match envelope.kind {
            MessageKind::SubscriptionConfirmation { subscribe_url, token }
            | MessageKind::UnsubscribeConfirmation { subscribe_url, token } => {
                (Some(subscribe_url), Some(token), None, None)
            }
            MessageKind::Notification { subject, unsubscribe_url } => {
                (None, None, subject, unsubscribe_url)
            }
        };
        RawEnvelope {
            message_type,
            message_id: envelope.message_id,
            topic_arn: envelope.topic_arn,
            message: envelope.message,
            timestamp: envelope.timestamp,
            signature: envelope.signature,
            signature_version: envelope.signature_version,
            signing_cert_url: envelope.signing_cert_url,
            subscribe_url,
            token,
            subject,
            unsubscribe_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTIFICATION: &str = r#"{
        "Type": "Notification",
        "MessageId": "22b80b92-fdea-4c2c-8f9d-bdfb0c7bf324",
        "TopicArn": "arn:aws:sns:us-west-2:123456789012:MyTopic",
        "Subject": "My First Message",
        "Message": "Hello world!",
        "Timestamp": "2012-05-02T00:54:06.655Z",
        "SignatureVersion": "1",
        "Signature": "EXAMPLEw6JRN...",
        "SigningCertURL": "https://sns.us-west-2.amazonaws.com/SimpleNotificationService-f3ecfb7224c7233fe7bb5f59f96de52f.pem",
        "UnsubscribeURL": "https://sns.us-west-2.amazonaws.com/?Action=Unsubscribe&SubscriptionArn=arn:aws:sns:us-west-2:123456789012:MyTopic:c9135db0",
        "MessageAttributes": {}
    }"#;

    const CONFIRMATION: &str = r#"{
        "Type": "SubscriptionConfirmation",
        "MessageId": "165545c9-2a5c-472c-8df2-7ff2be2b3b1b",
        "Token": "2336412f37f",
        "TopicArn": "arn:aws:sns:us-west-2:123456789012:MyTopic",
        "Message": "You have chosen to subscribe to the topic.",
        "SubscribeURL": "https://sns.us-west-2.amazonaws.com/?Action=ConfirmSubscription&TopicArn=arn:aws:sns:us-west-2:123456789012:MyTopic&Token=2336412f37f",
        "Timestamp": "2012-04-26T20:45:04.751Z",
        "SignatureVersion": "1",
        "Signature": "EXAMPLEpH+DcEwjAPg8O9mY8dReBSwksfg2S7WKQcikcNKWLQjwu6A4VbeS0QHVCkhRS7fUQvi2egU3N858fiTDN6bkkOxYDVrY0Ad8L10Hs3zH81mtnPk5uvvolIC1CXGu43obcgFxeL3khZl8IKvO61GWB6jI9b5+gLPoBc1Q=",
        "SigningCertURL": "https://sns.us-west-2.amazonaws.com/SimpleNotificationService-f3ecfb7224c7233fe7bb5f59f96de52f.pem"
    }"#;

    #[test]
    fn parses_notification_with_extra_fields() {
        let envelope = Envelope::parse(NOTIFICATION.as_bytes()).unwrap();
        assert_eq!(envelope.message_type(), MessageType::Notification);
        assert_eq!(envelope.subject(), Some("My First Message"));
        assert_eq!(envelope.message, "Hello world!");
        assert!(envelope.subscribe_url().is_none());
    }

    #[test]
    fn parses_subscription_confirmation() {
        let envelope = Envelope::parse(CONFIRMATION.as_bytes()).unwrap();
        assert_eq!(envelope.message_type(), MessageType::SubscriptionConfirmation);
        assert_eq!(envelope.token(), Some("2336412f37f"));
        assert!(envelope.subscribe_url().unwrap().contains("ConfirmSubscription"));
        assert!(envelope.subject().is_none());
    }

    #[test]
    fn notification_with_subscribe_url_is_malformed() {
        let mut value: serde_json::Value = serde_json::from_str(NOTIFICATION).unwrap();
        value["SubscribeURL"] = "https://sns.us-west-2.amazonaws.com/?Action=ConfirmSubscription".into();
        let err = Envelope::parse(value.to_string().as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnexpectedField { field: "SubscribeURL", message_type: MessageType::Notification }
        ));
    }

    #[test]
    fn confirmation_without_token_is_malformed() {
        let mut value: serde_json::Value = serde_json::from_str(CONFIRMATION).unwrap();
        value.as_object_mut().unwrap().remove("Token");
        let err = Envelope::parse(value.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { field: "Token", .. }));
    }

    #[test]
    fn confirmation_with_subject_is_malformed() {
        let mut value: serde_json::Value = serde_json::from_str(CONFIRMATION).unwrap();
        value["Subject"] = "hi".into();
        let err = Envelope::parse(value.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedField { field: "Subject", .. }));
    }

    #[test]
    fn missing_required_field_is_json_error() {
        let mut value: serde_json::Value = serde_json::from_str(NOTIFICATION).unwrap();
        value.as_object_mut().unwrap().remove("SigningCertURL");
        assert!(matches!(
            Envelope::parse(value.to_string().as_bytes()),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    fn rejects_unknown_type_and_garbage() {
        let mut value: serde_json::Value = serde_json::from_str(NOTIFICATION).unwrap();
        value["Type"] = "Broadcast".into();
        assert!(Envelope::parse(value.to_string().as_bytes()).is_err());
        assert!(Envelope::parse(b"not json").is_err());
        assert!(Envelope::parse(b"").is_err());
    }

    #[test]
    fn serializes_back_to_sender_shape() {
        let envelope = Envelope::parse(NOTIFICATION.as_bytes()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&envelope.to_json()).unwrap();
        assert_eq!(value["Type"], "Notification");
        assert_eq!(value["SigningCertURL"], envelope.signing_cert_url.as_str());
        assert!(value.get("SubscribeURL").is_none());

        let again: Envelope = serde_json::from_value(value).unwrap();
        assert_eq!(again, envelope);
    }
}
