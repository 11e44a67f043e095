//! OCI HTTP request signing (signature version 1, `rsa-sha256`).
//!
//! Every request signs `date (request-target) host`; requests with a body
//! also sign `content-length content-type x-content-sha256`.

use crate::config::{ConfigError, OciAuth};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use chrono::Utc;
use extdns_provider::ProviderError;
use reqwest::{
    Method, Url,
    header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, DATE, HeaderMap, HeaderName, HeaderValue},
};
use ring::{rand::SystemRandom, signature};
use rustls_pemfile::Item;
use sha2::{Digest, Sha256};
use std::sync::Arc;

const X_CONTENT_SHA256: HeaderName = HeaderName::from_static("x-content-sha256");

/// Produces the authentication headers for one request.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, method: &Method, url: &Url, body: Option<&[u8]>)
    -> Result<HeaderMap, ProviderError>;
}

/// Signer for the resolved auth mode.
pub fn signer_for(auth: &OciAuth) -> Result<Arc<dyn RequestSigner>, ConfigError> {
    match auth {
        OciAuth::ApiKey {
            tenancy_id,
            user_id,
            fingerprint,
            private_key,
            ..
        } => {
            let key_id = format!("{tenancy_id}/{user_id}/{fingerprint}");
            Ok(Arc::new(ApiKeySigner::new(key_id, private_key)?))
        }
        OciAuth::InstancePrincipal => Err(ConfigError::UnsupportedAuth("instance principal")),
        OciAuth::WorkloadIdentity { .. } => Err(ConfigError::UnsupportedAuth("workload identity")),
    }
}

/*──────── API key signer ────────*/

pub struct ApiKeySigner {
    key_id: String,
    key: signature::RsaKeyPair,
    rng: SystemRandom,
}

impl ApiKeySigner {
    /// `pem` is a PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`) key.
    pub fn new(key_id: impl Into<String>, pem: &str) -> Result<Self, ConfigError> {
        if pem.contains("ENCRYPTED") {
            return Err(ConfigError::EncryptedKey);
        }
        let key = match private_key_der(pem)? {
            KeyDer::Pkcs1(der) => signature::RsaKeyPair::from_der(&der),
            KeyDer::Pkcs8(der) => signature::RsaKeyPair::from_pkcs8(&der),
        }
        .map_err(|e| ConfigError::InvalidKey(e.to_string()))?;

        Ok(Self {
            key_id: key_id.into(),
            key,
            rng: SystemRandom::new(),
        })
    }

    fn signature(&self, signing_string: &str) -> Result<String, ProviderError> {
        let mut sig = vec![0; self.key.public().modulus_len()];
        self.key
            .sign(
                &signature::RSA_PKCS1_SHA256,
                &self.rng,
                signing_string.as_bytes(),
                &mut sig,
            )
            .map_err(|_| ProviderError::Api("signing request failed".into()))?;
        Ok(B64.encode(sig))
    }

    fn sign_at(
        &self,
        date: &str,
        method: &Method,
        url: &Url,
        body: Option<&[u8]>,
    ) -> Result<HeaderMap, ProviderError> {
        let header = |v: &str| {
            HeaderValue::from_str(v).map_err(|e| ProviderError::Api(format!("bad header: {e}")))
        };

        let mut hdr = HeaderMap::new();
        hdr.insert(DATE, header(date)?);

        let mut names = vec!["date", "(request-target)", "host"];
        let mut lines = vec![
            format!("date: {date}"),
            format!("(request-target): {}", request_target(method, url)),
            format!("host: {}", host(url)),
        ];

        if let Some(body) = body {
            let digest = B64.encode(Sha256::digest(body));
            names.extend(["content-length", "content-type", "x-content-sha256"]);
            lines.push(format!("content-length: {}", body.len()));
            lines.push("content-type: application/json".into());
            lines.push(format!("x-content-sha256: {digest}"));
            hdr.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
            hdr.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            hdr.insert(X_CONTENT_SHA256, header(&digest)?);
        }

        let authorization = format!(
            r#"Signature version="1",keyId="{}",algorithm="rsa-sha256",headers="{}",signature="{}""#,
            self.key_id,
            names.join(" "),
            self.signature(&lines.join("\n"))?
        );
        hdr.insert(AUTHORIZATION, header(&authorization)?);
        Ok(hdr)
    }
}

impl RequestSigner for ApiKeySigner {
    fn sign(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&[u8]>,
    ) -> Result<HeaderMap, ProviderError> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        self.sign_at(&date, method, url, body)
    }
}

fn request_target(method: &Method, url: &Url) -> String {
    let mut target = format!("{} {}", method.as_str().to_ascii_lowercase(), url.path());
    if let Some(q) = url.query() {
        target.push('?');
        target.push_str(q);
    }
    target
}

fn host(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    }
}

enum KeyDer {
    Pkcs1(Vec<u8>),
    Pkcs8(Vec<u8>),
}

/// First RSA private key in `pem`; certificates and trailing text are skipped.
fn private_key_der(pem: &str) -> Result<KeyDer, ConfigError> {
    let mut reader = pem.as_bytes();
    loop {
        match rustls_pemfile::read_one(&mut reader)
            .map_err(|e| ConfigError::InvalidKey(format!("bad PEM encoding: {e}")))?
        {
            Some(Item::Pkcs1Key(key)) => return Ok(KeyDer::Pkcs1(key.secret_pkcs1_der().to_vec())),
            Some(Item::Pkcs8Key(key)) => return Ok(KeyDer::Pkcs8(key.secret_pkcs8_der().to_vec())),
            Some(_) => continue,
            None => return Err(ConfigError::InvalidKey("no RSA private key in PEM".into())),
        }
    }
}
