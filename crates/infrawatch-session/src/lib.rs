//! Session handling for the InfraWatch client.
//!
//! Provides:
//! - `CredentialPipeline` - bearer injection with single-flight token renew
//! - `SessionManager` - login/register/logout and the connection lifecycle
//! - Session store implementations (memory)

pub mod error;
pub mod manager;
pub mod pipeline;
pub mod storage;

pub use error::{AuthError, RenewError};
pub use manager::SessionManager;
pub use pipeline::CredentialPipeline;

#[cfg(feature = "memory")]
pub use storage::MemorySessionStore;
