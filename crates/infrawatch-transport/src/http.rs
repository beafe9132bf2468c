//! REST transport over reqwest.

use async_trait::async_trait;
use infrawatch_core::{
    ApiRequest, ApiResponse, ClientConfig, HttpTransport, Method, TransportError,
};
use serde_json::Value;

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Transport for `config.api_url` with the configured request timeout.
    ///
    /// # Errors
    /// Returns error if the base path is not an absolute HTTP(S) URL or the
    /// HTTP client cannot be built (TLS backend).
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let base = config.api_base()?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(TransportError::InvalidUrl(format!(
                "'{}': REST base must be http or https",
                config.api_url
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        Ok(Self::with_client(client, &config.api_url))
    }

    /// Transport reusing an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

const fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn map_reqwest_error(error: &reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else if error.is_connect() || error.is_request() {
        TransportError::Network(error.to_string())
    } else {
        TransportError::Protocol(error.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url(&request.path);
        let mut builder = self.client.request(method(request.method), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = request.bearer.as_deref() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body.as_ref() {
            builder = builder.json(body);
        }

        tracing::trace!(method = request.method.as_str(), %url, "sending request");
        let response = builder.send().await.map_err(|e| map_reqwest_error(&e))?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| map_reqwest_error(&e))?;

        // Empty and non-JSON bodies are reported as null; the caller
        // classifies by status.
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        tracing::debug!(method = request.method.as_str(), %url, status, "request complete");
        Ok(ApiResponse::new(status, body))
    }
}
