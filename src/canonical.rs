//! Stage 3: Canonical Form
//!
//! Rebuilds the exact byte string the sender signed. Field order is fixed per
//! message type; any deviation breaks verification against a genuine signature.

use crate::envelope::{Envelope, MessageKind};

/// Build the string-to-sign for an envelope.
pub fn build(envelope: &Envelope) -> Vec<u8> {
    build_string(envelope).into_bytes()
}

/// Same as [`build`], as text (used for debug output).
pub fn build_string(envelope: &Envelope) -> String {
    let mut out = String::with_capacity(256 + envelope.message.len());
    let message_type = envelope.message_type();

    push_pair(&mut out, "Message", &envelope.message);
    push_pair(&mut out, "MessageId", &envelope.message_id);
    match &envelope.kind {
        MessageKind::SubscriptionConfirmation { subscribe_url, token }
        | MessageKind::UnsubscribeConfirmation { subscribe_url, token } => {
            push_pair(&mut out, "SubscribeURL", subscribe_url);
            push_pair(&mut out, "Timestamp", &envelope.timestamp);
            push_pair(&mut out, "Token", token);
        }
        MessageKind::Notification { subject, .. } => {
            if let Some(subject) = subject {
                push_pair(&mut out, "Subject", subject);
            }
            push_pair(&mut out, "Timestamp", &envelope.timestamp);
        }
    }
    push_pair(&mut out, "TopicArn", &envelope.topic_arn);
    push_pair(&mut out, "Type", message_type.as_str());
    out
}

fn push_pair(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push('\n');
    out.push_str(value);
    out.push('\n');
}
