use crate::catalog::Method;
use crate::identity::TestUser;
use crate::request::BuiltRequest;
use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use url::Url;

pub const TEST_USER_HEADER: &str = "x-test-user-id";

pub struct HttpClient {
    base_url: String,
    client: Client,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Success {
    pub status: u16,
    pub payload: Value,
    pub elapsed_ms: u64,
}

/// A failed dispatch. `status` is `None` when no response arrived.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct Failure {
    pub status: Option<u16>,
    pub payload: Option<Value>,
    pub message: String,
    pub elapsed_ms: u64,
}

pub type Dispatch = std::result::Result<Success, Failure>;

/// The one response a session keeps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseRecord {
    pub status: Option<u16>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub payload: Value,
}

impl ResponseRecord {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl From<Dispatch> for ResponseRecord {
    fn from(result: Dispatch) -> Self {
        match result {
            Ok(ok) => Self {
                status: Some(ok.status),
                elapsed_ms: ok.elapsed_ms,
                error: None,
                payload: ok.payload,
            },
            Err(err) => Self {
                status: err.status,
                elapsed_ms: err.elapsed_ms,
                error: Some(err.message),
                payload: err.payload.unwrap_or(Value::Null),
            },
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl HttpClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("eventypop-tester/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends `request` as `identity`. Stateless: nothing is retained between
    /// calls.
    pub fn send(&self, identity: Option<&TestUser>, request: &BuiltRequest) -> Dispatch {
        let start = Instant::now();
        let fail = |status: Option<u16>, payload: Option<Value>, message: String| Failure {
            status,
            payload,
            message,
            elapsed_ms: elapsed_ms(start),
        };

        let url = build_url(&self.base_url, &request.path, &request.query)
            .map_err(|e| fail(None, None, format!("{e:#}")))?;

        let mut headers = HeaderMap::new();
        if let Some(user) = identity {
            headers.insert(TEST_USER_HEADER, HeaderValue::from(user.id));
        }

        tracing::debug!(
            method = %request.method,
            url = %url,
            user = identity.map(|u| u.id),
            "sending request"
        );

        let mut req = self
            .client
            .request(request.method.into(), url)
            .headers(headers);
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let resp = match req.send() {
            Ok(resp) => resp,
            Err(err) => {
                let failure = fail(None, None, format!("request failed: {err}"));
                tracing::debug!(elapsed_ms = failure.elapsed_ms, error = %failure.message, "transport error");
                return Err(failure);
            }
        };

        let status = resp.status();
        let outcome = match decode_body(resp) {
            Err(DecodeError { text, reason }) => Err(fail(
                Some(status.as_u16()),
                Some(Value::String(text)),
                format!("invalid JSON response: {reason}"),
            )),
            Ok(payload) if !status.is_success() => Err(fail(
                Some(status.as_u16()),
                (!payload.is_null()).then_some(payload),
                format!("request failed with status {status}"),
            )),
            Ok(payload) => Ok(Success {
                status: status.as_u16(),
                payload,
                elapsed_ms: elapsed_ms(start),
            }),
        };

        match &outcome {
            Ok(ok) => tracing::debug!(status = ok.status, elapsed_ms = ok.elapsed_ms, "response"),
            Err(err) => tracing::debug!(
                status = err.status,
                elapsed_ms = err.elapsed_ms,
                error = %err.message,
                "request failed"
            ),
        }
        outcome
    }
}

struct DecodeError {
    text: String,
    reason: String,
}

fn decode_body(resp: Response) -> std::result::Result<Value, DecodeError> {
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    let text = resp.text().map_err(|e| DecodeError {
        text: String::new(),
        reason: e.to_string(),
    })?;
    if text.is_empty() {
        return Ok(Value::Null);
    }
    if content_type.contains("json") {
        return serde_json::from_str(&text).map_err(|e| DecodeError {
            reason: e.to_string(),
            text,
        });
    }
    Ok(Value::String(text))
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn build_url(base_url: &str, path: &str, query: &[(String, String)]) -> Result<Url> {
    let mut base = base_url.trim_end_matches('/').to_string();
    let path = if path.starts_with('/') { path } else { &format!("/{path}") };
    base.push_str(path);
    let mut url = Url::parse(&base).context("invalid base url")?;
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in query {
            pairs.append_pair(k, v);
        }
    }
    Ok(url)
}
