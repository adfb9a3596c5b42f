//! Transport seam shared by the HTTP-backed meeting sources and the webhook
//! style advisory effects.
//!
//! Callers describe a request with [`HttpRequest`] and hand it to an
//! [`HttpClient`]. Production wires in [`ReqwestHttpClient`]; tests script
//! their own clients. Non-success statuses are *not* errors at this layer:
//! each caller decides what a 4xx or 5xx means for its provider.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Boxed future returned by [`HttpClient::execute`].
pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
        }
    }
}

/// Credentials attached to a request as a header.
///
/// Providers that take keys in the query string (Google Sheets, Jotform)
/// build the URL themselves and use [`HttpAuth::None`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpAuth {
    None,
    BearerToken(String),
    Header { name: String, value: String },
}

impl HttpAuth {
    fn header(&self) -> Option<(String, String)> {
        match self {
            Self::None => None,
            Self::BearerToken(token) => Some((String::from("authorization"), format!("Bearer {token}"))),
            Self::Header { name, value } => Some((name.to_ascii_lowercase(), value.clone())),
        }
    }
}

/// Outgoing request. Header names are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::with_method(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::with_method(HttpMethod::Post, url)
    }

    fn with_method(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Serialized JSON body plus its content type.
    pub fn with_json(mut self, value: &serde_json::Value) -> Self {
        self.body = Some(value.to_string());
        self.with_header("content-type", "application/json")
    }

    pub fn with_auth(mut self, auth: &HttpAuth) -> Self {
        if let Some((name, value)) = auth.header() {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// 200 with `body`.
    pub fn ok_json(body: impl Into<String>) -> Self {
        Self::with_status(200, body)
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self.status, 200..=299)
    }

    /// Leading `max_chars` characters of the body, for error messages.
    pub fn body_snippet(&self, max_chars: usize) -> String {
        self.body.chars().take(max_chars).collect()
    }
}

/// The request never produced a response.
///
/// Transient failures (timeouts, refused connections) can succeed on a
/// later run; permanent ones (malformed requests, scripted test clients
/// running dry) cannot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HttpError {
    message: String,
    transient: bool,
}

impl HttpError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn is_transient(&self) -> bool {
        self.transient
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(error: reqwest::Error) -> Self {
        // Several providers carry credentials in the query string.
        let error = error.without_url();
        if error.is_timeout() {
            Self::transient(format!("request timed out: {error}"))
        } else if error.is_connect() {
            Self::transient(format!("connection failed: {error}"))
        } else if error.is_builder() {
            Self::permanent(format!("invalid request: {error}"))
        } else {
            Self::transient(format!("request failed: {error}"))
        }
    }
}

pub trait HttpClient: Send + Sync {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a>;
}

/// Answers every request with `{}`. Used where no provider is reachable,
/// such as the job runner's own unit tests.
#[derive(Debug, Default)]
pub struct NoopHttpClient;

impl HttpClient for NoopHttpClient {
    fn execute<'a>(&'a self, _request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async { Ok(HttpResponse::ok_json("{}")) })
    }
}

/// reqwest-backed client shared by every adapter in the process.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("nextmeeting/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self::with_client(client)
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut builder = self
            .client
            .request(request.method.to_reqwest(), &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(self.send(request))
    }
}
