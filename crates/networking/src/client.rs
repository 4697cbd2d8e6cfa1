//! HTTP client for the Umilax REST backend
//!
//! Thin wrapper around reqwest that speaks the backend's conventions: relative
//! resource paths joined onto a base URL, JSON bodies, and optional bearer
//! authentication. Non-2xx responses are returned as data, not errors, so
//! callers can branch on the status (the offline queue treats 401 specially).

use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use reqwest::Client as ReqwestClient;

/// Default backend base URL
pub const DEFAULT_BASE_URL: &str = "https://umilax.onrender.com";

// =============================================================================
// Error Types
// =============================================================================

/// HTTP client errors
///
/// Only failures to complete an exchange land here. A response with any status
/// code is a successful exchange.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The request could not be sent or the response could not be read
    /// (connection refused, DNS, timeout, broken body stream)
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The request body could not be serialized
    #[error("Failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

impl HttpError {
    /// Whether the failure was a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Transport(e) if e.is_timeout())
    }
}

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, HttpError>;

// =============================================================================
// Request Types
// =============================================================================

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET request
    Get,
    /// POST request
    Post,
    /// PUT request
    Put,
    /// PATCH request
    Patch,
    /// DELETE request
    Delete,
}

impl HttpMethod {
    /// Method name as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// A request against the backend
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Path relative to the base URL (e.g. "/transactions/record/")
    pub path: String,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Bearer token for the Authorization header
    pub bearer: Option<String>,
    /// JSON-encoded request body
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    /// Create a request with no body
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            bearer: None,
            body: None,
        }
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Authenticate with a bearer token, or send anonymously when `None`
    pub fn bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }

    /// Set the request body from JSON
    pub fn json_body<T: Serialize>(mut self, value: &T) -> Result<Self> {
        self.body = Some(serde_json::to_vec(value)?);
        Ok(self)
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// A completed exchange with the backend
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl ApiResponse {
    /// Check if the response is successful (2xx status)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Backend base URL (e.g. "https://umilax.onrender.com")
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Custom headers to include in all requests
    pub default_headers: HashMap<String, String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("Umilax-Mobile/{}", env!("CARGO_PKG_VERSION")),
            default_headers: HashMap::new(),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config with a base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Default::default() }
    }

    /// Build a config from the environment
    ///
    /// Reads `BASE_API_URL` and `UMILAX_HTTP_TIMEOUT_SECS`; anything missing or
    /// unparsable falls back to the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("BASE_API_URL") {
            if !url.trim().is_empty() {
                config.base_url = url.trim().to_string();
            }
        }

        if let Ok(raw) = std::env::var("UMILAX_HTTP_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %raw, "ignoring invalid UMILAX_HTTP_TIMEOUT_SECS"),
            }
        }

        config
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a default header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// Client Implementation
// =============================================================================

/// HTTP client for the backend
///
/// # Examples
/// ```no_run
/// use networking::{ApiRequest, HttpClient, HttpClientConfig, HttpMethod};
///
/// async fn example() -> Result<(), Box<dyn std::error::Error>> {
///     let client = HttpClient::new(HttpClientConfig::new("https://umilax.onrender.com"))?;
///
///     let request = ApiRequest::new(HttpMethod::Post, "/expenses/")
///         .bearer(Some("access-token".to_string()))
///         .json_body(&serde_json::json!({ "amount": 2500 }))?;
///     let response = client.execute(request).await?;
///
///     println!("status {}", response.status);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client, config })
    }

    /// Execute a request
    ///
    /// Returns the response for any status code; errors only when the exchange
    /// itself fails.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(&request.path);

        let mut req = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Put => self.client.put(&url),
            HttpMethod::Patch => self.client.patch(&url),
            HttpMethod::Delete => self.client.delete(&url),
        };

        req = req.header("Content-Type", "application/json");

        for (key, value) in &self.config.default_headers {
            req = req.header(key, value);
        }

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(token) = &request.bearer {
            req = req.bearer_auth(token);
        }

        if let Some(body) = request.body {
            req = req.body(body);
        }

        tracing::trace!(method = request.method.as_str(), %url, "sending request");
        let response = req.send().await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        tracing::trace!(status, %url, "received response");

        Ok(ApiResponse { status, body })
    }

    fn url_for(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}
