//! Stage 4: Certificate Retrieval
//!
//! `SigningCertURL` is attacker controlled; callers only get here after the
//! origin check has passed.

use async_trait::async_trait;
use reqwest::redirect;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::crypto::{self, CryptoError};

/// Size cap for a fetched certificate body.
pub const DEFAULT_MAX_CERTIFICATE_BYTES: usize = 8192;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Certificate request failed: {0}")]
    Network(String),
    #[error("Certificate host answered HTTP {0}")]
    Status(u16),
    #[error("Certificate body exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// Everything that can make a signature check come out negative.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("Data and signature do not match certificate")]
    Mismatch,
}

/// Source of PEM certificates.
#[async_trait]
pub trait CertificateSource: Send + Sync {
    async fn fetch_pem(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Plain GET, bounded in time and size, redirects disabled.
#[derive(Debug, Clone)]
pub struct HttpCertificateSource {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpCertificateSource {
    pub fn new(timeout: Duration, connect_timeout: Duration, max_bytes: usize) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client, max_bytes })
    }
}

#[async_trait]
impl CertificateSource for HttpCertificateSource {
    async fn fetch_pem(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        let limit = self.max_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(FetchError::TooLarge { limit });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?
        {
            if body.len() + chunk.len() > limit {
                return Err(FetchError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }
        debug!(url, bytes = body.len(), "fetched signing certificate");
        Ok(body)
    }
}

/// Fetch the certificate and check `canonical` against the signature.
pub struct CertificateVerifier<'a> {
    source: &'a dyn CertificateSource,
}

impl<'a> CertificateVerifier<'a> {
    pub fn new(source: &'a dyn CertificateSource) -> Self {
        Self { source }
    }

    /// Fail-closed boolean form.
    pub async fn verify(&self, signing_cert_url: &str, signature_b64: &str, canonical: &[u8]) -> bool {
        self.verify_detailed(signing_cert_url, signature_b64, canonical)
            .await
            .is_ok()
    }

    /// Returns the certificate fingerprint on success.
    pub async fn verify_detailed(
        &self,
        signing_cert_url: &str,
        signature_b64: &str,
        canonical: &[u8],
    ) -> Result<String, SignatureError> {
        let signature = crypto::decode_signature(signature_b64)?;
        let pem = self.source.fetch_pem(signing_cert_url).await?;
        let key = crypto::signing_key_from_pem(&pem)?;
        if crypto::verify_rsa_sha1(&key.key, canonical, &signature) {
            Ok(key.fingerprint)
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}
