//! Log entries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Filter, QueryParams, eq_or_unset, push_param, timestamp};

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

/// A log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub message: String,
    pub level: LogLevel,
    pub source: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub pod_name: Option<String>,
    #[serde(default)]
    pub container_name: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Payload for `POST /logs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogCreate {
    pub message: String,
    pub level: LogLevel,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

/// Log list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    pub level: Option<LogLevel>,
    pub source: Option<String>,
    pub namespace: Option<String>,
    pub cluster: Option<String>,
    pub pod_name: Option<String>,
    pub container_name: Option<String>,
    /// Case-insensitive substring of the message.
    pub search: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Filter<Log> for LogQuery {
    fn matches(&self, item: &Log) -> bool {
        let search_hit = self.search.as_deref().is_none_or(|needle| {
            item.message
                .to_lowercase()
                .contains(&needle.to_lowercase())
        });

        search_hit
            && self.level.is_none_or(|level| level == item.level)
            && eq_or_unset(self.source.as_deref(), Some(item.source.as_str()))
            && eq_or_unset(self.namespace.as_deref(), item.namespace.as_deref())
            && eq_or_unset(self.cluster.as_deref(), item.cluster.as_deref())
            && eq_or_unset(self.pod_name.as_deref(), item.pod_name.as_deref())
            && eq_or_unset(self.container_name.as_deref(), item.container_name.as_deref())
            && self.start_time.is_none_or(|start| item.timestamp >= start)
            && self.end_time.is_none_or(|end| item.timestamp <= end)
    }

    fn to_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        push_param(&mut params, "level", self.level.map(LogLevel::as_str));
        push_param(&mut params, "source", self.source.as_deref());
        push_param(&mut params, "namespace", self.namespace.as_deref());
        push_param(&mut params, "cluster", self.cluster.as_deref());
        push_param(&mut params, "pod_name", self.pod_name.as_deref());
        push_param(&mut params, "container_name", self.container_name.as_deref());
        push_param(&mut params, "search", self.search.as_deref());
        push_param(&mut params, "start_time", self.start_time.map(|t| t.to_rfc3339()));
        push_param(&mut params, "end_time", self.end_time.map(|t| t.to_rfc3339()));
        params
    }
}

/// Aggregate log counters from `GET /logs/stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStats {
    pub total_count: u64,
    #[serde(default)]
    pub by_level: HashMap<String, u64>,
    #[serde(default)]
    pub by_source: HashMap<String, u64>,
    #[serde(default)]
    pub by_namespace: HashMap<String, u64>,
}

impl LogStats {
    /// Count a newly observed entry.
    pub fn record(&mut self, log: &Log) {
        self.total_count += 1;
        *self.by_level.entry(log.level.as_str().to_string()).or_default() += 1;
        *self.by_source.entry(log.source.clone()).or_default() += 1;
        if let Some(namespace) = &log.namespace {
            *self.by_namespace.entry(namespace.clone()).or_default() += 1;
        }
    }

    /// Uncount a deleted entry.
    pub fn forget(&mut self, log: &Log) {
        self.total_count = self.total_count.saturating_sub(1);
        let keys = [
            (&mut self.by_level, Some(log.level.as_str())),
            (&mut self.by_source, Some(log.source.as_str())),
            (&mut self.by_namespace, log.namespace.as_deref()),
        ];
        for (map, key) in keys {
            if let Some(count) = key.and_then(|key| map.get_mut(key)) {
                *count = count.saturating_sub(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn log(message: &str) -> Log {
        serde_json::from_value(json!({
            "_id": "l1",
            "message": message,
            "level": "error",
            "source": "api",
            "pod_name": "api-7f9",
            "timestamp": "2024-05-01T12:00:00"
        }))
        .unwrap()
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let entry = log("Connection REFUSED by upstream");
        let query = LogQuery {
            search: Some("refused".into()),
            ..Default::default()
        };
        assert!(query.matches(&entry));

        let miss = LogQuery {
            search: Some("timeout".into()),
            ..Default::default()
        };
        assert!(!miss.matches(&entry));
    }

    #[test]
    fn test_level_and_pod_filters() {
        let entry = log("boom");
        let query = LogQuery {
            level: Some(LogLevel::Error),
            pod_name: Some("api-7f9".into()),
            ..Default::default()
        };
        assert!(query.matches(&entry));

        let wrong_level = LogQuery {
            level: Some(LogLevel::Info),
            ..Default::default()
        };
        assert!(!wrong_level.matches(&entry));
    }

    #[test]
    fn test_stats_record() {
        let mut stats = LogStats::default();
        stats.record(&log("a"));
        stats.record(&log("b"));
        assert_eq!(stats.total_count, 2);
        assert_eq!(stats.by_level.get("error"), Some(&2));
        assert!(stats.by_namespace.is_empty());

        stats.forget(&log("a"));
        assert_eq!(stats.total_count, 1);
        assert_eq!(stats.by_level.get("error"), Some(&1));
        assert_eq!(stats.by_source.get("api"), Some(&1));
    }
}
