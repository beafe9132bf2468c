//! Resource model shared by the REST client, the push channel and the views.

pub mod alert;
pub mod log;
pub mod metric;
pub mod timestamp;
pub mod user;

use serde::{Deserialize, Serialize};

pub use alert::{
    Alert, AlertCondition, AlertCreate, AlertQuery, AlertRule, AlertRuleCreate, AlertRuleQuery,
    AlertSeverity, AlertStats, AlertStatus, ConditionOperator, NotificationChannel,
};
pub use log::{Log, LogCreate, LogLevel, LogQuery, LogStats};
pub use metric::{Metric, MetricAggregation, MetricCreate, MetricQuery, MetricType};
pub use user::{AuthTokens, LoginRequest, RefreshRequest, RegisterRequest, User};

/// Query string parameters in request order.
pub type QueryParams = Vec<(String, String)>;

/// A paginated window over a resource, most recent item first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    #[serde(default)]
    pub total_pages: u32,
}

impl<T> Snapshot<T> {
    /// An empty first page.
    #[must_use]
    pub const fn empty(page_size: u32) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: 1,
            page_size,
            total_pages: 0,
        }
    }

    /// Recompute `total_pages` after `total` changed locally.
    pub fn recompute_pages(&mut self) {
        self.total_pages = if self.page_size == 0 {
            0
        } else {
            u32::try_from(self.total.div_ceil(u64::from(self.page_size))).unwrap_or(u32::MAX)
        };
    }

    /// Position of the first item satisfying `pred`.
    pub fn position(&self, pred: impl Fn(&T) -> bool) -> Option<usize> {
        self.items.iter().position(pred)
    }
}

/// Trait for filters that can be evaluated locally against a pushed item.
pub trait Filter<T> {
    /// Whether `item` belongs to the result set described by this filter.
    fn matches(&self, item: &T) -> bool;

    /// Query string parameters for the list endpoint.
    fn to_params(&self) -> QueryParams;
}

pub(crate) fn push_param(params: &mut QueryParams, key: &str, value: Option<impl ToString>) {
    if let Some(value) = value {
        params.push((key.to_string(), value.to_string()));
    }
}

pub(crate) fn eq_or_unset<T: PartialEq + ?Sized>(filter: Option<&T>, value: Option<&T>) -> bool {
    filter.is_none_or(|f| value.is_some_and(|v| v == f))
}
