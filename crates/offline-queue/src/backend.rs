//! Backend boundary
//!
//! The synchronizer only needs two calls from the REST backend: replay a
//! mutation, and trade a refresh token for a new access token. [`Backend`]
//! captures exactly that so the replay logic can be exercised without a
//! network; [`HttpBackend`] is the production implementation.

use async_trait::async_trait;
use networking::{ApiRequest, HttpClient, HttpError, HttpMethod};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::item::{MutationMethod, PendingItem};

/// Token refresh endpoint, relative to the backend base URL
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh/";

/// The exchange with the backend could not be completed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<HttpError> for TransportError {
    fn from(err: HttpError) -> Self {
        TransportError(err.to_string())
    }
}

/// A mutation ready to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    /// Write method
    pub method: MutationMethod,
    /// Resource path relative to the base URL
    pub endpoint: String,
    /// JSON payload (`Null` sends no body)
    pub body: Value,
    /// Bearer token, if one is available
    pub bearer: Option<String>,
}

impl MutationRequest {
    /// Build the request replaying a queued item
    pub fn for_item(item: &PendingItem, bearer: Option<String>) -> Self {
        Self {
            method: item.method,
            endpoint: item.endpoint.clone(),
            body: item.body.clone(),
            bearer,
        }
    }
}

/// Status and body of a completed exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl BackendResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 401 status
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

/// Payload of a successful token refresh
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RefreshedTokens {
    /// New access token; some deployments omit it and keep the current one
    #[serde(default)]
    pub access: Option<String>,
    /// Rotated refresh token, when the backend rotates them
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Calls the synchronizer makes against the REST backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    /// Send a mutation
    async fn send(&self, request: &MutationRequest) -> Result<BackendResponse, TransportError>;

    /// Exchange a refresh token for new tokens
    async fn refresh(&self, refresh_token: &str) -> Result<BackendResponse, TransportError>;
}

/// [`Backend`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: HttpClient,
    refresh_path: String,
}

impl HttpBackend {
    /// Create a backend using the default refresh endpoint
    pub fn new(client: HttpClient) -> Self {
        Self { client, refresh_path: DEFAULT_REFRESH_PATH.to_string() }
    }

    /// Use a different refresh endpoint
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

}

#[async_trait]
impl Backend for HttpBackend {
    async fn send(&self, request: &MutationRequest) -> Result<BackendResponse, TransportError> {
        let mut api_request = ApiRequest::new(HttpMethod::from(request.method), &request.endpoint)
            .bearer(request.bearer.clone());
        if !request.body.is_null() {
            api_request = api_request.json_body(&request.body).map_err(TransportError::from)?;
        }

        let response = self.client.execute(api_request).await?;
        Ok(BackendResponse::new(response.status, response.body))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<BackendResponse, TransportError> {
        let api_request = ApiRequest::new(HttpMethod::Post, &self.refresh_path)
            .json_body(&serde_json::json!({ "refresh": refresh_token }))
            .map_err(TransportError::from)?;

        let response = self.client.execute(api_request).await?;
        Ok(BackendResponse::new(response.status, response.body))
    }
}
