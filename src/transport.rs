//! HTTP transport seam.
//!
//! The engine only builds [`HttpRequest`] values and interprets
//! [`HttpResponse`] values. Connection pooling, TLS, timeouts and retry all
//! live behind the [`Transport`] trait. [`ReqwestTransport`] is the
//! production implementation.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use reqwest::blocking::Client;
use serde_json::Value;

use crate::constants;
use crate::error::TransportError;

/// HTTP method used by the reconciliation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// DELETE
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// An HTTP-shaped request against the server or the relay.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Bearer token for authenticated server calls.
    pub bearer: Option<String>,
    /// JSON body.
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Unauthenticated GET.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            bearer: None,
            body: None,
        }
    }

    /// Unauthenticated POST with a JSON body.
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            bearer: None,
            body: Some(body),
        }
    }

    /// Unauthenticated DELETE.
    pub fn delete(url: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            url: url.into(),
            bearer: None,
            body: None,
        }
    }

    /// Attach a bearer token.
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Whether this request changes server-side state.
    pub fn is_mutating(&self) -> bool {
        self.method != Method::Get
    }
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A response received from the server or the relay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Reason phrase, if known.
    pub reason: String,
    /// Response headers, lower-cased names.
    pub headers: HashMap<String, String>,
    /// Raw body text.
    pub body_text: String,
    /// Parsed JSON body, when the body is valid JSON.
    pub json: Option<Value>,
}

impl HttpResponse {
    /// Response with a status and a JSON body.
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            reason: reason_phrase(status).to_string(),
            headers: HashMap::new(),
            body_text: body.to_string(),
            json: Some(body),
        }
    }

    /// Response with a status and no body.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            reason: reason_phrase(status).to_string(),
            ..Self::default()
        }
    }

    /// Response from raw parts; the JSON body is parsed if possible.
    pub fn from_parts(
        status: u16,
        reason: impl Into<String>,
        headers: HashMap<String, String>,
        body_text: String,
    ) -> Self {
        let json = serde_json::from_str(&body_text).ok();
        Self {
            status,
            reason: reason.into(),
            headers,
            body_text,
            json,
        }
    }

    /// `"{status} {reason}"`, as written to the operation log.
    pub fn status_line(&self) -> String {
        if self.reason.is_empty() {
            self.status.to_string()
        } else {
            format!("{} {}", self.status, self.reason)
        }
    }

    /// Whether the status is 200.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

fn reason_phrase(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}

/// Executes HTTP-shaped requests.
///
/// A call returns `Err` only when there is no response at all: network
/// failure, timeout or cancellation. Every HTTP status is `Ok`.
pub trait Transport {
    /// Execute one request.
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

/// Blocking reqwest transport with a caller-owned cancellation flag.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    cancel: Arc<AtomicBool>,
}

impl ReqwestTransport {
    /// Creates a transport with the default request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(constants::HTTP_REQUEST_TIMEOUT)
            .user_agent(concat!("pushsync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_client(client))
    }

    /// Creates a transport with a pre-configured HTTP client.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use `flag` for cancellation; setting it aborts subsequent calls.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Handle to the cancellation flag.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        if self.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        log::debug!("[Transport] {}", request);

        let response = builder
            .send()
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body_text = response
            .text()
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        // A response that arrives after cancellation is discarded.
        if self.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        Ok(HttpResponse::from_parts(
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            headers,
            body_text,
        ))
    }
}
