// # OCI Request Signer
//
// Implements the OCI HTTP signature scheme (draft-cavage, `rsa-sha256`).
//
// ## Signed Headers
//
// - Every request: `date (request-target) host`
// - Requests with a body additionally: `x-content-sha256 content-type content-length`
//
// The signing string is each signed header as `name: value`, joined with `\n`
// in the order above. The signature is RSASSA-PKCS1-v1_5 over SHA-256 of that
// string, base64 encoded, sent as:
//
// ```text
// Authorization: Signature version="1",keyId="<tenancy>/<user>/<fingerprint>",
//     algorithm="rsa-sha256",headers="<names>",signature="<base64>"
// ```
//
// ## Key Material
//
// Unencrypted PEM keys only, PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1
// (`BEGIN RSA PRIVATE KEY`).

use std::path::Path;

use allowsync_core::config::OciCredentials;
use allowsync_core::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use reqwest::{Method, Url};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha256};

use crate::config_file::{self, DEFAULT_PROFILE};

/// Headers signed on every request
const BASE_HEADERS: [&str; 3] = ["date", "(request-target)", "host"];

/// Headers additionally signed on requests with a body
const BODY_HEADERS: [&str; 3] = ["x-content-sha256", "content-type", "content-length"];

/// API-key request signer
pub struct ApiKeySigner {
    key_id: String,
    private_key: RsaPrivateKey,
    region: Option<String>,
}

impl std::fmt::Debug for ApiKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeySigner")
            .field("key_id", &self.key_id)
            .field("private_key", &"<REDACTED>")
            .field("region", &self.region)
            .finish()
    }
}

impl ApiKeySigner {
    /// Create a signer from already-loaded key material
    pub fn new(tenancy: &str, user: &str, fingerprint: &str, private_key: RsaPrivateKey) -> Self {
        Self {
            key_id: format!("{}/{}/{}", tenancy, user, fingerprint),
            private_key,
            region: None,
        }
    }

    /// Remember the region the credentials came with
    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    /// Build a signer from configured credentials
    pub fn from_credentials(credentials: &OciCredentials) -> Result<Self> {
        match credentials {
            OciCredentials::ConfigFile { path, profile } => {
                let path = match path {
                    Some(path) => path.clone(),
                    None => config_file::default_config_path()?,
                };
                let profile = if profile.is_empty() {
                    DEFAULT_PROFILE
                } else {
                    profile.as_str()
                };

                tracing::debug!(
                    "Loading OCI credentials from {} [{}]",
                    path.display(),
                    profile
                );
                let loaded = config_file::load_profile(&path, profile)?;
                let key = load_private_key(&loaded.key_file)?;

                Ok(Self::new(&loaded.tenancy, &loaded.user, &loaded.fingerprint, key)
                    .with_region(loaded.region))
            }
            OciCredentials::ApiKey {
                tenancy,
                user,
                fingerprint,
                private_key_path,
            } => {
                let key = load_private_key(private_key_path)?;
                Ok(Self::new(tenancy, user, fingerprint, key))
            }
        }
    }

    /// `<tenancy>/<user>/<fingerprint>`
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Region from the credential source, if it carried one
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Sign a signing string, returning the base64 signature
    pub fn sign(&self, signing_string: &str) -> Result<String> {
        let digest = Sha256::digest(signing_string.as_bytes());
        let signature = self
            .private_key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| Error::provider("oci", format!("Request signing failed: {}", e)))?;
        Ok(BASE64.encode(signature))
    }

    /// Headers to attach to a request, `authorization` included
    ///
    /// `host` is signed but not returned; the HTTP client derives the same
    /// value from the URL.
    pub fn signed_headers(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&[u8]>,
        date: DateTime<Utc>,
    ) -> Result<Vec<(&'static str, String)>> {
        let mut headers: Vec<(&'static str, String)> = vec![
            ("date", http_date(date)),
            ("(request-target)", request_target(method, url)),
            ("host", host_header(url)?),
        ];

        if let Some(body) = body {
            headers.push(("x-content-sha256", BASE64.encode(Sha256::digest(body))));
            headers.push(("content-type", "application/json".to_string()));
            headers.push(("content-length", body.len().to_string()));
        }

        let names: Vec<&str> = if body.is_some() {
            BASE_HEADERS.iter().chain(BODY_HEADERS.iter()).copied().collect()
        } else {
            BASE_HEADERS.to_vec()
        };

        let signature = self.sign(&signing_string(&headers))?;
        let authorization = format!(
            "Signature version=\"1\",keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"{}\",signature=\"{}\"",
            self.key_id,
            names.join(" "),
            signature
        );

        let mut out: Vec<(&'static str, String)> = headers
            .into_iter()
            .filter(|(name, _)| *name != "(request-target)" && *name != "host")
            .collect();
        out.push(("authorization", authorization));
        Ok(out)
    }
}

/// Load an unencrypted PEM private key from disk
pub fn load_private_key(path: &Path) -> Result<RsaPrivateKey> {
    let pem = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read OCI private key {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_private_key(&pem)
}

/// Parse a PKCS#8 or PKCS#1 PEM private key
pub fn parse_private_key(pem: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| Error::config(format!("Invalid OCI private key: {}", e)))
}

/// Join signed headers into the signing string
pub fn signing_string(headers: &[(&str, String)]) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// RFC 7231 date, e.g. `Sun, 05 Jan 2014 21:31:40 GMT`
pub fn http_date(date: DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn request_target(method: &Method, url: &Url) -> String {
    let method = method.as_str().to_ascii_lowercase();
    match url.query() {
        Some(query) => format!("{} {}?{}", method, url.path(), query),
        None => format!("{} {}", method, url.path()),
    }
}

fn host_header(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::config(format!("OCI endpoint has no host: {}", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
