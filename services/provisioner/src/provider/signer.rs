//! OCI request signing.
//!
//! OCI authenticates API keys with the draft-cavage HTTP signature scheme:
//! a fixed list of headers is concatenated into a signing string, signed with
//! RSA-SHA256 and sent in the `Authorization` header.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, DATE},
    Method, Url,
};
use rsa::{
    pkcs1::DecodeRsaPrivateKey,
    pkcs1v15::SigningKey,
    pkcs8::DecodePrivateKey,
    signature::{SignatureEncoding as _, Signer as _},
    RsaPrivateKey,
};
use sha2::{Digest, Sha256};

use super::ProviderError;

const CONTENT_SHA256: &str = "x-content-sha256";

/// Signs outgoing OCI requests with an API key.
pub struct RequestSigner {
    key_id: String,
    signing_key: SigningKey<Sha256>,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl RequestSigner {
    /// Build a signer from a PEM key (PKCS#8 or PKCS#1).
    pub fn from_pem(key_id: impl Into<String>, pem: &str) -> Result<Self, ProviderError> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| ProviderError::Signing(format!("invalid private key: {e}")))?;

        Ok(Self {
            key_id: key_id.into(),
            signing_key: SigningKey::<Sha256>::new(key),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Headers to attach to a request, signed as of now.
    pub fn sign(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&[u8]>,
    ) -> Result<HeaderMap, ProviderError> {
        self.sign_at(method, url, body, Utc::now())
    }

    pub fn sign_at(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&[u8]>,
        now: DateTime<Utc>,
    ) -> Result<HeaderMap, ProviderError> {
        let mut signed: Vec<(&'static str, String)> = vec![
            ("date", http_date(now)),
            ("(request-target)", request_target(method, url)),
            ("host", host_header(url)?),
        ];

        if let Some(body) = body {
            signed.push((CONTENT_SHA256, BASE64.encode(Sha256::digest(body))));
            signed.push(("content-type", "application/json".to_string()));
            signed.push(("content-length", body.len().to_string()));
        }

        let signature = self
            .signing_key
            .try_sign(signing_string(&signed).as_bytes())
            .map_err(|e| ProviderError::Signing(e.to_string()))?;

        let header_names: Vec<&str> = signed.iter().map(|(name, _)| *name).collect();
        let authorization = format!(
            "Signature version=\"1\",keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"{}\",signature=\"{}\"",
            self.key_id,
            header_names.join(" "),
            BASE64.encode(signature.to_bytes()),
        );

        let mut headers = HeaderMap::new();
        for (name, value) in &signed {
            let name = match *name {
                "(request-target)" | "host" => continue,
                "date" => DATE,
                "content-type" => CONTENT_TYPE,
                "content-length" => CONTENT_LENGTH,
                other => HeaderName::from_static(other),
            };
            headers.insert(name, header_value(value)?);
        }
        headers.insert(AUTHORIZATION, header_value(&authorization)?);

        Ok(headers)
    }
}

/// `name: value` lines joined by newlines, in signing order.
pub fn signing_string(headers: &[(&str, String)]) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// RFC 7231 date, always GMT.
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn request_target(method: &Method, url: &Url) -> String {
    let mut target = format!("{} {}", method.as_str().to_lowercase(), url.path());
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    target
}

fn host_header(url: &Url) -> Result<String, ProviderError> {
    let host = url
        .host_str()
        .ok_or_else(|| ProviderError::Signing(format!("url has no host: {url}")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn header_value(value: &str) -> Result<HeaderValue, ProviderError> {
    HeaderValue::from_str(value).map_err(|e| ProviderError::Signing(e.to_string()))
}
