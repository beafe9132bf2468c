//! In-memory session store.

use infrawatch_core::{
    Session, SessionStore,
    models::{AuthTokens, User},
};
use tokio::sync::watch;

/// Session store held in a `watch` channel.
///
/// Nothing is persisted; a restart starts logged out.
pub struct MemorySessionStore {
    tx: watch::Sender<Session>,
}

impl MemorySessionStore {
    /// Create a logged-out store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_session(Session::default())
    }

    /// Create a store holding `session`.
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        let (tx, _) = watch::channel(session);
        Self { tx }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemorySessionStore {
    fn current(&self) -> Session {
        self.tx.borrow().clone()
    }

    fn set_auth(&self, user: Option<User>, tokens: AuthTokens) {
        self.tx.send_replace(Session {
            tokens: Some(tokens),
            user,
        });
    }

    /// Ignored once logged out, so a renew finishing after logout cannot
    /// bring the session back.
    fn update_tokens(&self, tokens: AuthTokens) {
        self.tx.send_if_modified(|session| {
            if session.tokens.is_none() {
                return false;
            }
            session.tokens = Some(tokens);
            true
        });
    }

    fn clear(&self) {
        self.tx.send_if_modified(|session| {
            if *session == Session::default() {
                return false;
            }
            *session = Session::default();
            true
        });
    }

    fn watch(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }
}
