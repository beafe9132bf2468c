//! Session manager: authentication flows and the push-channel lifecycle.

use std::sync::Arc;

use infrawatch_core::{
    ApiError, ApiRequest, HttpTransport, SessionStore,
    models::{AuthTokens, LoginRequest, RegisterRequest, User},
};
use infrawatch_transport::ConnectionManager;
use tokio::task::JoinHandle;
use tokio_stream::{StreamExt, wrappers::WatchStream};
use tracing::{debug, info};

use crate::{error::AuthError, pipeline::CredentialPipeline};

/// Orchestrates login, registration and logout, and keeps the push channel
/// open exactly while the session is authenticated.
pub struct SessionManager {
    pipeline: CredentialPipeline,
    connection: ConnectionManager,
}

impl SessionManager {
    /// Create a session manager.
    #[must_use]
    pub const fn new(pipeline: CredentialPipeline, connection: ConnectionManager) -> Self {
        Self {
            pipeline,
            connection,
        }
    }

    #[must_use]
    pub const fn pipeline(&self) -> &CredentialPipeline {
        &self.pipeline
    }

    #[must_use]
    pub const fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    fn store(&self) -> &Arc<dyn SessionStore> {
        self.pipeline.store()
    }

    fn transport(&self) -> &Arc<dyn HttpTransport> {
        self.pipeline.transport()
    }

    /// Whether the session holds a token pair.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.store().current().is_authenticated()
    }

    /// The logged-in user, if known.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.store().current().user
    }

    /// Log in and store the session.
    ///
    /// The user profile is fetched with the freshly issued token before
    /// anything is stored, so a failed login leaves the session untouched.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidCredentials`] on HTTP 401, otherwise the
    /// classified API error.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let request = ApiRequest::post("/auth/login").with_json(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let response = self.transport().send(request).await?;
        if response.is_unauthorized() {
            return Err(AuthError::InvalidCredentials);
        }
        let tokens: AuthTokens = response.into_result()?;

        let me = ApiRequest::get("/auth/me").with_bearer(Some(&tokens.access_token));
        let user: User = self.transport().send(me).await?.into_result()?;

        self.store().set_auth(Some(user.clone()), tokens);
        info!(user = %user.username, "logged in");
        Ok(user)
    }

    /// Create an account. Does not log in.
    ///
    /// # Errors
    /// Returns the classified API error (e.g. validation, duplicate email).
    pub async fn register(&self, registration: &RegisterRequest) -> Result<User, AuthError> {
        let request = ApiRequest::post("/auth/register").with_json(registration)?;
        let user: User = self.transport().send(request).await?.into_result()?;
        info!(user = %user.username, "account registered");
        Ok(user)
    }

    /// Re-read the profile of the logged-in user and store it.
    ///
    /// # Errors
    /// Returns the classified API error.
    pub async fn refresh_user(&self) -> Result<User, ApiError> {
        let user: User = self.pipeline.call(ApiRequest::get("/auth/me")).await?;
        let session = self.store().current();
        if let Some(tokens) = session.tokens {
            self.store().set_auth(Some(user.clone()), tokens);
        }
        Ok(user)
    }

    /// Clear the session and tear the push channel down.
    pub async fn logout(&self) {
        self.store().clear();
        self.connection.disconnect().await;
        info!("logged out");
    }

    /// Follow the session store: connect when it becomes authenticated,
    /// disconnect when it is cleared (including a forced logout by the
    /// credential pipeline).
    ///
    /// The task ends when the store is dropped; abort the handle to stop it
    /// earlier.
    #[must_use]
    pub fn spawn_connection_driver(&self) -> JoinHandle<()> {
        let mut sessions = WatchStream::new(self.store().watch());
        let connection = self.connection.clone();

        tokio::spawn(async move {
            let mut authenticated = None;
            while let Some(session) = sessions.next().await {
                let now = session.is_authenticated();
                if authenticated == Some(now) {
                    continue;
                }
                authenticated = Some(now);
                if now {
                    debug!("session authenticated, opening push channel");
                    connection.connect();
                } else {
                    debug!("session ended, closing push channel");
                    connection.disconnect().await;
                }
            }
        })
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("authenticated", &self.is_authenticated())
            .field("connection", &self.connection)
            .finish()
    }
}
