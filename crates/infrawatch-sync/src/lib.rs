//! Live resource views for the InfraWatch client.
//!
//! Provides:
//! - `DashboardApi` - typed REST endpoints behind the credential pipeline
//! - `Reconciler` - snapshot + push delta reconciliation per resource
//! - Views for alerts, alert rules, metrics and logs
//! - `InfraWatchClient` - wiring of all of the above

pub mod api;
pub mod client;
pub mod reconciler;
pub mod views;

pub use api::DashboardApi;
pub use client::InfraWatchClient;
pub use reconciler::{DeltaOutcome, FetchOutcome, Reconciler, Resource, ViewState, ViewStatus};
pub use views::{
    AlertRules, AlertRulesView, Alerts, AlertsView, Logs, LogsView, Metrics, MetricsView,
};
