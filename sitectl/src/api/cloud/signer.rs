//! Acquia HTTP HMAC (version 2.0) request signing.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::{Method, RequestBuilder, Url};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

const REALM: &str = "Acquia";
const VERSION: &str = "2.0";

/// Headers produced for one signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub authorization: String,
    pub timestamp: String,
    pub content_sha256: Option<String>,
}

/// Body of a request, as far as signing is concerned.
#[derive(Debug, Clone, Copy)]
pub struct SignedBody<'a> {
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

pub struct RequestSigner {
    key: String,
    secret: Vec<u8>,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner").field("key", &self.key).finish_non_exhaustive()
    }
}

impl RequestSigner {
    /// `secret` is the base64 encoded API secret.
    pub fn new(key: impl Into<String>, secret: &str) -> Result<Self> {
        let secret = STANDARD
            .decode(secret.trim())
            .map_err(|e| Error::config(format!("API secret is not valid base64: {}", e)))?;
        Ok(Self {
            key: key.into(),
            secret,
        })
    }

    /// Sign with the current time and a fresh nonce, then attach headers.
    pub fn apply(&self, builder: RequestBuilder, method: &Method, url: &Url, body: Option<SignedBody<'_>>) -> Result<RequestBuilder> {
        let nonce = uuid::Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().timestamp();
        let headers = self.sign(method, url, body, timestamp, &nonce)?;

        let mut builder = builder
            .header("Authorization", headers.authorization)
            .header("X-Authorization-Timestamp", headers.timestamp);
        if let Some(hash) = headers.content_sha256 {
            builder = builder.header("X-Authorized-Content-SHA256", hash);
        }
        Ok(builder)
    }

    pub fn sign(&self, method: &Method, url: &Url, body: Option<SignedBody<'_>>, timestamp: i64, nonce: &str) -> Result<SignedHeaders> {
        let content_sha256 = body
            .filter(|b| !b.bytes.is_empty())
            .map(|b| STANDARD.encode(Sha256::digest(b.bytes)));

        let base = self.signature_base(method, url, body, content_sha256.as_deref(), timestamp, nonce);

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| Error::config(format!("Unusable API secret: {}", e)))?;
        mac.update(base.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        Ok(SignedHeaders {
            authorization: format!(
                "acquia-http-hmac realm=\"{}\",id=\"{}\",nonce=\"{}\",version=\"{}\",headers=\"\",signature=\"{}\"",
                REALM, self.key, nonce, VERSION, signature
            ),
            timestamp: timestamp.to_string(),
            content_sha256,
        })
    }

    fn signature_base(
        &self,
        method: &Method,
        url: &Url,
        body: Option<SignedBody<'_>>,
        content_sha256: Option<&str>,
        timestamp: i64,
        nonce: &str,
    ) -> String {
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            _ => String::new(),
        };

        let mut parts = vec![
            method.as_str().to_uppercase(),
            host,
            url.path().to_string(),
            url.query().unwrap_or_default().to_string(),
            format!(
                "id={}&nonce={}&realm={}&version={}",
                self.key, nonce, REALM, VERSION
            ),
            timestamp.to_string(),
        ];

        if let (Some(body), Some(hash)) = (body, content_sha256) {
            parts.push(body.content_type.to_string());
            parts.push(hash.to_string());
        }

        parts.join("\n")
    }
}
