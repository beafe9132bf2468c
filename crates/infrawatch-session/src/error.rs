//! Session error types.

use infrawatch_core::{ApiError, TransportError};
use thiserror::Error;

/// Token renew failure. Any variant ends the session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenewError {
    #[error("No refresh token available")]
    MissingRefreshToken,
    #[error("Refresh rejected with HTTP {status}")]
    Rejected { status: u16 },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Invalid refresh response: {0}")]
    Decode(String),
}

/// Login or registration failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<TransportError> for AuthError {
    fn from(error: TransportError) -> Self {
        Self::Api(ApiError::Transport(error))
    }
}
