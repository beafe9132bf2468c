//! Per-resource views: [`Resource`](crate::reconciler::Resource) markers
//! plus the actions each view supports.

mod alerts;
mod logs;
mod metrics;
mod rules;

pub use alerts::{Alerts, AlertsView};
pub use logs::{Logs, LogsView};
pub use metrics::{Metrics, MetricsView};
pub use rules::{AlertRules, AlertRulesView};
