//! Core abstractions for the InfraWatch client.
//!
//! This crate provides the fundamental building blocks:
//! - Resource model (`Alert`, `Metric`, `Log`, `Snapshot`, ...)
//! - `PushEvent` - Typed push-channel events
//! - `EventBus` - Subscription registry keyed by event kind
//! - `SessionStore` and `HttpTransport` seams
//! - Error taxonomy and client configuration

pub mod config;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod models;
pub mod traits;

pub use config::{BackoffConfig, ClientConfig, PageSizes};
pub use error::{ApiError, TransportError};
pub use event::{EventKind, PushEvent, decode_frame};
pub use event_bus::{EventBus, ListenerHandle};
pub use models::{Filter, Snapshot};
pub use traits::{ApiRequest, ApiResponse, HttpTransport, Method, Session, SessionStore};
