use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; LotHarvest/1.0)";
const MAX_BODY_BYTES: u64 = 32 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self {
            method: method.trim().to_ascii_uppercase(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, content_type: &str, body: Vec<u8>) -> Self {
        self.headers
            .retain(|(name, _)| !name.eq_ignore_ascii_case("content-type"));
        self.headers
            .push(("Content-Type".to_string(), content_type.to_string()));
        self.body = Some(body);
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Executes one request. Implementations must map transport failures and
/// 5xx/429 responses to errors for which [`EngineError::is_transient`] holds,
/// and other 4xx responses to permanent [`EngineError::HttpStatus`] errors.
pub trait HttpClient {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

impl<T: HttpClient + ?Sized> HttpClient for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        (**self).execute(request)
    }
}

#[derive(Debug, Clone)]
pub struct UreqClient {
    agent: ureq::Agent,
    default_headers: Vec<(String, String)>,
}

impl UreqClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        let mut config = ureq::Agent::config_builder();
        config = config
            .http_status_as_error(false)
            .timeout_global(Some(timeout));
        let agent: ureq::Agent = config.build().into();

        let user_agent = if user_agent.trim().is_empty() {
            DEFAULT_USER_AGENT
        } else {
            user_agent.trim()
        };
        Self {
            agent,
            default_headers: vec![("User-Agent".to_string(), user_agent.to_string())],
        }
    }

    pub fn with_default_header(mut self, name: &str, value: &str) -> Self {
        self.default_headers
            .retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        self.default_headers
            .push((name.to_string(), value.to_string()));
        self
    }

    fn merged_headers<'a>(&'a self, request: &'a HttpRequest) -> Vec<(&'a str, &'a str)> {
        let mut out: Vec<(&str, &str)> = self
            .default_headers
            .iter()
            .filter(|(name, _)| request.header_value(name).is_none())
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        out.extend(
            request
                .headers
                .iter()
                .filter(|(_, value)| !value.is_empty())
                .map(|(name, value)| (name.as_str(), value.as_str())),
        );
        out
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(&str, &str)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder
}

impl HttpClient for UreqClient {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let headers = self.merged_headers(request);
        let body: &[u8] = request.body.as_deref().unwrap_or(&[]);
        let outcome = match request.method.as_str() {
            "GET" => with_headers(self.agent.get(request.url.as_str()), &headers).call(),
            "POST" => with_headers(self.agent.post(request.url.as_str()), &headers).send(body),
            "PUT" => with_headers(self.agent.put(request.url.as_str()), &headers).send(body),
            other => {
                return Err(EngineError::Configuration(format!(
                    "unsupported http method: {other}"
                )));
            }
        };
        let mut response = outcome.map_err(|err| {
            EngineError::TransientNetwork(format!("{}: {err}", redact_url_for_log(&request.url)))
        })?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(EngineError::HttpStatus {
                status,
                url: request.url.clone(),
            });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(|err| {
                EngineError::TransientNetwork(format!(
                    "{}: body read failed: {err}",
                    redact_url_for_log(&request.url)
                ))
            })?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpOptions {
    pub user_agent: String,
    pub timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: 30_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl HttpOptions {
    pub fn client(&self) -> UreqClient {
        UreqClient::new(&self.user_agent, Duration::from_millis(self.timeout_ms))
    }
}

/// Bounded retry with exponential backoff: `base_delay_ms`, then doubling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
        }
    }

    /// Wait after the `failures`-th consecutive failure (1-based).
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(1_u64 << exponent))
    }

    pub fn run<T, F>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let wait = self.delay_for(attempt);
                    tracing::warn!(
                        operation = label,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    if !wait.is_zero() {
                        thread::sleep(wait);
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

pub fn fetch_with_retry<C: HttpClient + ?Sized>(
    client: &C,
    request: &HttpRequest,
    policy: &RetryPolicy,
    label: &str,
) -> Result<HttpResponse> {
    policy.run(label, |_| client.execute(request))
}

pub(crate) fn redact_url_for_log(value: &str) -> String {
    match Url::parse(value) {
        Ok(uri) => {
            let scheme = uri.scheme();
            let authority = uri.host_str().unwrap_or("unknown-host");
            format!("{scheme}://{authority}/...")
        }
        Err(_) => "[invalid-url]".to_string(),
    }
}
