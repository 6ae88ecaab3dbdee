//! Stage 4: Cryptographic Verification (pure part)
//!
//! SNS signature version 1: PKCS#1 v1.5 RSA over SHA-1, key taken from the
//! X.509 certificate named by `SigningCertURL`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid signature base64: {0}")]
    SignatureEncoding(#[from] base64::DecodeError),
    #[error("Certificate is not valid PEM: {0}")]
    Pem(String),
    #[error("Certificate is not valid X.509: {0}")]
    Certificate(String),
    #[error("Certificate does not carry an RSA public key: {0}")]
    PublicKey(String),
}

/// Public key and fingerprint of a signing certificate.
#[derive(Debug, Clone)]
pub struct SigningKey {
    pub key: RsaPublicKey,
    pub fingerprint: String,
}

/// Decode the base64 `Signature` field.
pub fn decode_signature(signature_b64: &str) -> Result<Vec<u8>, CryptoError> {
    Ok(BASE64.decode(signature_b64.trim())?)
}

/// Extract the RSA public key from a PEM encoded X.509 certificate.
pub fn signing_key_from_pem(pem: &[u8]) -> Result<SigningKey, CryptoError> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(pem).map_err(|e| CryptoError::Pem(e.to_string()))?;
    let cert = pem
        .parse_x509()
        .map_err(|e| CryptoError::Certificate(e.to_string()))?;
    let key = RsaPublicKey::from_public_key_der(cert.public_key().raw)
        .map_err(|e| CryptoError::PublicKey(e.to_string()))?;

    Ok(SigningKey {
        key,
        fingerprint: certificate_fingerprint(&pem.contents),
    })
}

/// RSA/SHA-1 check. `true` only on an explicit match; malformed input is a mismatch.
pub fn verify_rsa_sha1(key: &RsaPublicKey, data: &[u8], signature: &[u8]) -> bool {
    let Ok(signature) = Signature::try_from(signature) else {
        return false;
    };
    VerifyingKey::<Sha1>::new(key.clone())
        .verify(data, &signature)
        .is_ok()
}

/// SHA-256 fingerprint of a DER certificate.
pub fn certificate_fingerprint(der: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(der);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
