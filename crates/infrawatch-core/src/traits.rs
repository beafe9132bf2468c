//! Service seams: session storage and HTTP transport.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::watch;

use crate::{
    error::{ApiError, TransportError},
    models::{AuthTokens, QueryParams, User},
};

/// Current credentials.
///
/// Authenticated exactly when a token pair is present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub tokens: Option<AuthTokens>,
    pub user: Option<User>,
}

impl Session {
    /// Whether a token pair is held.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.tokens.is_some()
    }

    /// Current access token.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.access_token.as_str())
    }

    /// Current refresh token, if non-empty.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens
            .as_ref()
            .map(|t| t.refresh_token.as_str())
            .filter(|t| !t.is_empty())
    }
}

/// Trait for session stores.
///
/// Only login, refresh and logout mutate the session. Observers use
/// [`SessionStore::watch`] to follow changes.
pub trait SessionStore: Send + Sync {
    /// Snapshot of the current session.
    fn current(&self) -> Session;

    /// Login: store user and tokens.
    fn set_auth(&self, user: Option<User>, tokens: AuthTokens);

    /// Refresh: replace the tokens, keep the user.
    fn update_tokens(&self, tokens: AuthTokens);

    /// Logout: drop everything.
    fn clear(&self);

    /// Receiver notified on every change.
    fn watch(&self) -> watch::Receiver<Session>;
}

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    /// Upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

/// An outbound REST request relative to the API base path.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: QueryParams,
    pub body: Option<Value>,
    /// Access token sent as `Authorization: Bearer <token>`.
    pub bearer: Option<String>,
}

impl ApiRequest {
    /// New request without query, body or credentials.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: QueryParams::new(),
            body: None,
            bearer: None,
        }
    }

    /// `GET path`.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// `POST path`.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// `DELETE path`.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Append query parameters.
    #[must_use]
    pub fn with_query(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query.extend(params);
        self
    }

    /// Set a JSON body.
    ///
    /// # Errors
    /// Returns error if `body` cannot be serialized.
    pub fn with_json(mut self, body: &impl Serialize) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))?);
        Ok(self)
    }

    /// Set (or clear) the bearer token.
    #[must_use]
    pub fn with_bearer(mut self, token: Option<&str>) -> Self {
        self.bearer = token.map(str::to_string);
        self
    }
}

/// A response: status plus parsed JSON body (`Null` when empty).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// New response.
    #[must_use]
    pub const fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// 2xx status.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// 401 status.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Pass a success through, classify anything else.
    ///
    /// # Errors
    /// Returns the classified [`ApiError`] for non-2xx statuses.
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::from_status(self.status, &self.body))
        }
    }

    /// Decode a success body, or classify the failure.
    ///
    /// # Errors
    /// Returns the classified [`ApiError`] for non-2xx statuses and
    /// [`ApiError::Decode`] if the body does not match `T`.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let response = self.error_for_status()?;
        serde_json::from_value(response.body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Trait for HTTP transports.
///
/// Implementations send the request as-is (including the bearer token) and
/// report every HTTP status as a response; only failures below HTTP are
/// errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue one request.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        (**self).send(request).await
    }
}
