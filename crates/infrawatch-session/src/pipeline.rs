//! Credential pipeline.
//!
//! Every authenticated REST call goes through [`CredentialPipeline::send`]:
//! the current access token is attached, and an HTTP 401 triggers one token
//! renew shared by all concurrent failures, followed by exactly one retry.
//! A failed renew ends the session.

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, Weak,
    atomic::{AtomicU64, Ordering},
};

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use infrawatch_core::{
    ApiError, ApiRequest, ApiResponse, HttpTransport, SessionStore, TransportError,
    models::{AuthTokens, RefreshRequest},
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::RenewError;

/// Path of the token renew endpoint. Its own 401s are never renewed.
pub const REFRESH_PATH: &str = "/auth/refresh";

type RenewFuture = Shared<BoxFuture<'static, Result<String, RenewError>>>;

struct PipelineInner {
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn SessionStore>,
    /// The renew in flight, if any.
    renewing: Mutex<Option<RenewFuture>>,
    renews_started: AtomicU64,
}

impl PipelineInner {
    fn renew_slot(&self) -> MutexGuard<'_, Option<RenewFuture>> {
        self.renewing.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Authenticated request path shared by all views.
///
/// Cheap to clone; clones share the renew state.
#[derive(Clone)]
pub struct CredentialPipeline {
    inner: Arc<PipelineInner>,
}

impl CredentialPipeline {
    /// Create a pipeline over `transport`, reading and renewing credentials
    /// in `store`.
    pub fn new(transport: Arc<dyn HttpTransport>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                transport,
                store,
                renewing: Mutex::new(None),
                renews_started: AtomicU64::new(0),
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.inner.store
    }

    /// The raw transport, without credentials or renew.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.inner.transport
    }

    /// Number of renew requests started so far.
    #[must_use]
    pub fn renews_started(&self) -> u64 {
        self.inner.renews_started.load(Ordering::Relaxed)
    }

    /// Send `request` with the current access token.
    ///
    /// On HTTP 401 the request is retried once: with the current token if it
    /// changed while the request was in flight, otherwise after a renew. If
    /// the renew fails the session is cleared and the original 401 response
    /// is returned.
    ///
    /// # Errors
    /// Returns error only for failures below HTTP; every status is a response.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let sent_token = self.inner.store.current().access_token().map(str::to_owned);
        let response = self
            .inner
            .transport
            .send(request.clone().with_bearer(sent_token.as_deref()))
            .await?;

        if !response.is_unauthorized() || request.path == REFRESH_PATH {
            return Ok(response);
        }

        let current_token = self.inner.store.current().access_token().map(str::to_owned);
        if let Some(token) = current_token.filter(|t| Some(t) != sent_token.as_ref()) {
            debug!(path = %request.path, "token changed while request was in flight, retrying");
            return self
                .inner
                .transport
                .send(request.with_bearer(Some(&token)))
                .await;
        }

        match self.renew().await {
            Ok(token) => {
                debug!(path = %request.path, "retrying with renewed token");
                self.inner
                    .transport
                    .send(request.with_bearer(Some(&token)))
                    .await
            }
            Err(e) => {
                warn!(error = %e, path = %request.path, "token renew failed, ending session");
                self.inner.store.clear();
                Ok(response)
            }
        }
    }

    /// [`CredentialPipeline::send`] and decode a success body.
    ///
    /// # Errors
    /// Returns the transport failure or the classified error status.
    pub async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.send(request).await?.into_result()
    }

    /// Renew the access token, joining the renew in flight if there is one.
    ///
    /// On success the store holds the new token pair and the new access
    /// token is returned. The store is left untouched on failure.
    ///
    /// # Errors
    /// Returns why the renew failed; every caller that joined the same renew
    /// sees the same error.
    pub async fn renew(&self) -> Result<String, RenewError> {
        let pending = {
            let mut slot = self.inner.renew_slot();
            if let Some(pending) = slot.as_ref() {
                pending.clone()
            } else {
                let started = start_renew(&self.inner);
                *slot = Some(started.clone());
                started
            }
        };
        pending.await
    }
}

impl std::fmt::Debug for CredentialPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPipeline")
            .field("renews_started", &self.renews_started())
            .finish_non_exhaustive()
    }
}

fn start_renew(inner: &Arc<PipelineInner>) -> RenewFuture {
    inner.renews_started.fetch_add(1, Ordering::Relaxed);
    let transport = Arc::clone(&inner.transport);
    let store = Arc::clone(&inner.store);
    let owner: Weak<PipelineInner> = Arc::downgrade(inner);

    async move {
        let result = refresh(transport.as_ref(), store.as_ref()).await;
        if let Some(inner) = owner.upgrade() {
            inner.renew_slot().take();
        }
        result
    }
    .boxed()
    .shared()
}

async fn refresh(
    transport: &dyn HttpTransport,
    store: &dyn SessionStore,
) -> Result<String, RenewError> {
    let refresh_token = store
        .current()
        .refresh_token()
        .map(str::to_owned)
        .ok_or(RenewError::MissingRefreshToken)?;

    info!("renewing access token");
    let request = ApiRequest::post(REFRESH_PATH)
        .with_json(&RefreshRequest { refresh_token })
        .map_err(|e| RenewError::Decode(e.to_string()))?;
    let response = transport.send(request).await?;
    if !response.is_success() {
        return Err(RenewError::Rejected {
            status: response.status,
        });
    }

    let tokens: AuthTokens =
        serde_json::from_value(response.body).map_err(|e| RenewError::Decode(e.to_string()))?;
    let access_token = tokens.access_token.clone();
    store.update_tokens(tokens);
    info!("access token renewed");
    Ok(access_token)
}
