//! API client: the one seam between bound requests and the network.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Response};
use serde_json::Value;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;
use url::Url;

use crate::catalog::{HttpMethod, Operation};
use crate::commands::binder::{PathValue, Request};
use crate::config::{Credentials, Settings};
use crate::error::CliError;

/// Signatures stay valid for this long.
const SIGNATURE_TTL: Duration = Duration::from_secs(600);

/// Everything but RFC 3986 unreserved characters is escaped in a path value.
const PATH_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Perform exactly one call for `op`. No retry, no timeout.
    async fn call(&self, op: &Operation, request: &Request) -> Result<Value, CliError>;
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    endpoint: String,
    credentials: Option<Credentials>,
}

impl HttpClient {
    pub fn new(settings: &Settings) -> Result<Self, CliError> {
        let http = reqwest::Client::builder()
            .user_agent(Self::user_agent())
            .build()?;
        Ok(Self {
            http,
            endpoint: settings.endpoint(),
            credentials: settings.credentials.clone(),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("v3cli/", env!("CARGO_PKG_VERSION"))
    }

    /// Endpoint + rendered path template + query pairs.
    pub fn url(&self, op: &Operation, request: &Request) -> Result<Url, CliError> {
        let path = render_path(&op.path, &request.path)?;
        let mut url = Url::parse(&format!("{}{}", self.endpoint, path))?;
        if !request.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(request.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    async fn handle(resp: Response) -> Result<Value, CliError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        debug!(status = status.as_u16(), len = bytes.len(), "received response");

        if !status.is_success() {
            return Err(CliError::Api {
                status: status.as_u16(),
                message: error_message(&bytes),
            });
        }
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ApiClient for HttpClient {
    async fn call(&self, op: &Operation, request: &Request) -> Result<Value, CliError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(CliError::MissingCredentials)?;
        let url = self.url(op, request)?;
        let body = request
            .body
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let expires = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .saturating_add(SIGNATURE_TTL)
            .as_secs();
        let authorization = sign(credentials, op.method, &url, body.as_deref(), expires)?;

        debug!(method = %op.method, url = %url, "sending request");
        let mut req = self
            .http
            .request(op.method.into(), url)
            .header(AUTHORIZATION, authorization);
        if let Some(body) = body {
            req = req.header(CONTENT_TYPE, "application/json").body(body);
        }

        let resp = req.send().await?;
        Self::handle(resp).await
    }
}

/// Substitute `{name}` placeholders with percent-encoded path values.
///
/// Each value stays one path segment. `.` and `..` are refused: URL parsing
/// resolves them (escaped or not) and the call would hit another resource.
pub fn render_path(template: &str, args: &[(String, PathValue)]) -> Result<String, CliError> {
    let mut path = template.to_string();
    for (name, value) in args {
        let text = value.to_string();
        if text == "." || text == ".." {
            return Err(CliError::Args(format!(
                "--{} cannot be {:?}: it is not a valid path segment",
                name, text
            )));
        }
        let encoded = utf8_percent_encode(&text, PATH_VALUE).to_string();
        path = path.replace(&format!("{{{}}}", name), &encoded);
    }
    Ok(path)
}

/// The server's `message` field when the error body is JSON, else the raw body.
fn error_message(bytes: &[u8]) -> String {
    serde_json::from_slice::<Value>(bytes)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(bytes).trim().to_string())
}

/// `EXO2-HMACSHA256` authorization header for one request.
///
/// The signed message is, newline separated: `METHOD path`, the body, the
/// query values concatenated in key order, the (empty) signed headers and
/// the expiry timestamp.
pub fn sign(
    credentials: &Credentials,
    method: HttpMethod,
    url: &Url,
    body: Option<&str>,
    expires: u64,
) -> Result<String, CliError> {
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url.query_pairs() {
        params.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    let signed_values: String = params.values().flatten().map(String::as_str).collect();

    let message = [
        format!("{} {}", method, url.path()),
        body.unwrap_or_default().to_string(),
        signed_values,
        String::new(),
        expires.to_string(),
    ]
    .join("\n");

    let mut mac = Hmac::<Sha256>::new_from_slice(credentials.secret.as_bytes())
        .map_err(|e| CliError::Signature(e.to_string()))?;
    mac.update(message.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    let mut header = format!("EXO2-HMACSHA256 credential={}", credentials.key);
    if !params.is_empty() {
        let names: Vec<&str> = params.keys().map(String::as_str).collect();
        header.push_str(&format!(",signed-query-args={}", names.join(";")));
    }
    header.push_str(&format!(",expires={},signature={}", expires, signature));
    Ok(header)
}
