//! HTTP client abstraction for making requests.
//!
//! This module defines the `HttpClient` trait to abstract HTTP request execution.
//! Credentials, retries and TLS belong to the implementation; the batch executor
//! only builds requests and interprets responses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use crate::error::{BatcherError, Result};

/// A fully built request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method (e.g., "POST")
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    /// The request body as a JSON string
    pub body: String,
}

/// Response from an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as a string
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for executing HTTP requests.
///
/// # Errors
/// Implementations return an error if the request could not be sent or no response
/// was received (network failure, timeout). Non-2xx statuses are returned as
/// responses, not errors.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

// ============================================================================
// Production Implementation using reqwest
// ============================================================================

/// Production HTTP client using reqwest.
///
/// An access token, when given, is attached as `Authorization: Bearer`. Acquiring
/// and refreshing that token is the caller's job.
#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    bearer_token: Option<String>,
}

impl ReqwestHttpClient {
    /// Create a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            bearer_token: None,
        })
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    #[tracing::instrument(
        skip(self, request),
        fields(method = %request.method, path = %request.url.path())
    )]
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let method: reqwest::Method = request.method.parse().map_err(|e| {
            tracing::error!(method = %request.method, error = %e, "Invalid HTTP method");
            BatcherError::Plugin(format!("invalid HTTP method '{}': {}", request.method, e))
        })?;

        let mut req = self.client.request(method, request.url.clone());

        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }
        for (name, value) in &request.headers {
            req = req.header(name, value);
        }
        if !request.body.is_empty() {
            req = req.body(request.body.clone());
        }

        let response = req.send().await.map_err(|e| {
            tracing::error!(url = %request.url, error = %e, "HTTP request failed");
            e
        })?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::debug!(status, response_len = body.len(), "HTTP request completed");

        Ok(HttpResponse { status, body })
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

/// Mock HTTP client for testing.
///
/// Returns predetermined responses keyed by "{method} {path}" without making
/// actual HTTP calls.
///
/// # Example
/// ```ignore
/// let mock = MockHttpClient::new();
/// mock.add_response(
///     "POST /subscriptions/sub/metrics:getBatch",
///     Ok(HttpResponse { status: 200, body: r#"{"values": []}"#.to_string() }),
/// );
/// ```
#[derive(Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, Vec<Result<HttpResponse>>>>>,
    calls: Arc<Mutex<Vec<HttpRequest>>>,
    delay: Option<Duration>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response, to exercise cancellation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Add a predetermined response for a method and path.
    ///
    /// Multiple responses for the same key are returned in FIFO order.
    pub fn add_response(&self, key: &str, response: Result<HttpResponse>) {
        self.responses
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(response);
    }

    /// Get all requests that have been made to this mock client.
    pub fn get_calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.calls.lock().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let key = format!("{} {}", request.method, request.url.path());
        let next = {
            let mut responses = self.responses.lock();
            responses
                .get_mut(&key)
                .filter(|queue| !queue.is_empty())
                .map(|queue| queue.remove(0))
        };

        // No response configured - return a default error
        next.unwrap_or_else(|| {
            Err(BatcherError::Other(anyhow::anyhow!(
                "No mock response configured for {key}"
            )))
        })
    }
}
