//! Alerts and alert rules.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Filter, QueryParams, push_param, timestamp};

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl AlertSeverity {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

/// Alert lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    Silenced,
}

impl AlertStatus {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
            Self::Silenced => "silenced",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alert.
///
/// REST responses carry the identifier as `_id`, push payloads as `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub source: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default)]
    pub rule_id: Option<String>,
    #[serde(default)]
    pub acknowledged_by: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Payload for `POST /alerts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertCreate {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub severity: AlertSeverity,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

/// Alert list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertQuery {
    pub status: Option<AlertStatus>,
}

impl AlertQuery {
    /// Filter on a single status.
    #[must_use]
    pub const fn with_status(status: AlertStatus) -> Self {
        Self {
            status: Some(status),
        }
    }
}

impl Filter<Alert> for AlertQuery {
    fn matches(&self, item: &Alert) -> bool {
        self.status.is_none_or(|status| item.status == status)
    }

    fn to_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        push_param(&mut params, "status", self.status.map(AlertStatus::as_str));
        params
    }
}

/// Alert rule list filter. Rules are listed unfiltered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertRuleQuery;

impl Filter<AlertRule> for AlertRuleQuery {
    fn matches(&self, _item: &AlertRule) -> bool {
        true
    }

    fn to_params(&self) -> QueryParams {
        QueryParams::new()
    }
}

/// Aggregate alert counters from `GET /alerts/stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStats {
    pub total_active: u64,
    pub total_acknowledged: u64,
    pub total_resolved: u64,
    #[serde(default)]
    pub by_severity: HashMap<String, u64>,
    #[serde(default)]
    pub by_source: HashMap<String, u64>,
}

impl AlertStats {
    fn counter_mut(&mut self, status: AlertStatus) -> Option<&mut u64> {
        match status {
            AlertStatus::Active => Some(&mut self.total_active),
            AlertStatus::Acknowledged => Some(&mut self.total_acknowledged),
            AlertStatus::Resolved => Some(&mut self.total_resolved),
            AlertStatus::Silenced => None,
        }
    }

    /// Move one alert between status counters.
    ///
    /// `previous == None` records a new alert, which also bumps the
    /// severity and source breakdowns.
    pub fn record(&mut self, previous: Option<AlertStatus>, alert: &Alert) {
        match previous {
            Some(prev) if prev == alert.status => return,
            Some(prev) => {
                if let Some(counter) = self.counter_mut(prev) {
                    *counter = counter.saturating_sub(1);
                }
            }
            None => {
                *self
                    .by_severity
                    .entry(alert.severity.as_str().to_string())
                    .or_default() += 1;
                *self.by_source.entry(alert.source.clone()).or_default() += 1;
            }
        }
        if let Some(counter) = self.counter_mut(alert.status) {
            *counter += 1;
        }
    }

    /// Forget a deleted alert.
    pub fn forget(&mut self, alert: &Alert) {
        if let Some(counter) = self.counter_mut(alert.status) {
            *counter = counter.saturating_sub(1);
        }
        for (map, key) in [
            (&mut self.by_severity, alert.severity.as_str()),
            (&mut self.by_source, alert.source.as_str()),
        ] {
            if let Some(count) = map.get_mut(key) {
                *count = count.saturating_sub(1);
            }
        }
    }
}

/// Comparison used by a rule condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Ne,
}

/// A single threshold condition of an alert rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertCondition {
    pub metric_name: String,
    pub operator: ConditionOperator,
    pub threshold: f64,
    #[serde(default)]
    pub duration_seconds: u64,
}

/// Notification channel for a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Telegram,
    Discord,
    Slack,
    Webhook,
}

/// Alert rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub enabled: bool,
    pub severity: AlertSeverity,
    #[serde(default)]
    pub conditions: Vec<AlertCondition>,
    #[serde(default)]
    pub namespace_filter: Option<String>,
    #[serde(default)]
    pub cluster_filter: Option<String>,
    #[serde(default)]
    pub labels_filter: HashMap<String, String>,
    #[serde(default)]
    pub notification_channels: Vec<NotificationChannel>,
    #[serde(default)]
    pub cooldown_minutes: u32,
    pub user_id: String,
    #[serde(default, with = "timestamp::option")]
    pub last_triggered: Option<DateTime<Utc>>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Payload for `POST /alerts/rules`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRuleCreate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<AlertSeverity>,
    pub conditions: Vec<AlertCondition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_filter: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels_filter: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notification_channels: Vec<NotificationChannel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_minutes: Option<u32>,
}
