#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha1::Sha1;

use snsgate::canonical;
use snsgate::envelope::{Envelope, MessageKind};

pub const CERT: &str = include_str!("../fixtures/signing-cert.pem");
pub const KEY: &str = include_str!("../fixtures/signing-key.pem");
pub const OTHER_KEY: &str = include_str!("../fixtures/other-key.pem");
pub const TOPIC: &str = "arn:aws:sns:us-east-1:123456789012:MyTopic";

pub fn envelope(kind: MessageKind, cert_url: &str) -> Envelope {
    Envelope {
        message_id: "f3f7f1a4-2bd8-4f2a-9a52-8d7a3c4e1b90".into(),
        topic_arn: TOPIC.into(),
        message: "{\"event\":\"shipment.created\",\"id\":7}".into(),
        timestamp: "2024-06-11T08:15:30.123Z".into(),
        signature: String::new(),
        signature_version: "1".into(),
        signing_cert_url: cert_url.into(),
        kind,
    }
}

pub fn sign_with(key_pem: &str, envelope: &mut Envelope) {
    let private = RsaPrivateKey::from_pkcs8_pem(key_pem).unwrap();
    let signature = SigningKey::<Sha1>::new(private).sign(&canonical::build(envelope));
    envelope.signature = BASE64.encode(signature.to_vec());
}

pub fn signed_body(mut envelope: Envelope) -> Vec<u8> {
    sign_with(KEY, &mut envelope);
    envelope.to_json().into_bytes()
}
