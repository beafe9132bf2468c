//! Metric samples.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Filter, QueryParams, eq_or_unset, push_param, timestamp};

/// Metric category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Cpu,
    Memory,
    Disk,
    Network,
    Pod,
    Node,
    Deployment,
    Container,
    Custom,
}

impl MetricType {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Disk => "disk",
            Self::Network => "network",
            Self::Pod => "pod",
            Self::Node => "node",
            Self::Deployment => "deployment",
            Self::Container => "container",
            Self::Custom => "custom",
        }
    }
}

/// A metric sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    pub metric_type: MetricType,
    pub value: f64,
    #[serde(default)]
    pub unit: Option<String>,
    pub source: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Payload for `POST /metrics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricCreate {
    pub name: String,
    pub metric_type: MetricType,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

/// Metric list filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricQuery {
    pub metric_type: Option<MetricType>,
    pub source: Option<String>,
    pub namespace: Option<String>,
    pub cluster: Option<String>,
    pub name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Filter<Metric> for MetricQuery {
    fn matches(&self, item: &Metric) -> bool {
        self.metric_type.is_none_or(|t| t == item.metric_type)
            && eq_or_unset(self.source.as_deref(), Some(item.source.as_str()))
            && eq_or_unset(self.namespace.as_deref(), item.namespace.as_deref())
            && eq_or_unset(self.cluster.as_deref(), item.cluster.as_deref())
            && eq_or_unset(self.name.as_deref(), Some(item.name.as_str()))
            && self.start_time.is_none_or(|start| item.timestamp >= start)
            && self.end_time.is_none_or(|end| item.timestamp <= end)
    }

    fn to_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        push_param(&mut params, "metric_type", self.metric_type.map(MetricType::as_str));
        push_param(&mut params, "source", self.source.as_deref());
        push_param(&mut params, "namespace", self.namespace.as_deref());
        push_param(&mut params, "cluster", self.cluster.as_deref());
        push_param(&mut params, "name", self.name.as_deref());
        push_param(&mut params, "start_time", self.start_time.map(|t| t.to_rfc3339()));
        push_param(&mut params, "end_time", self.end_time.map(|t| t.to_rfc3339()));
        params
    }
}

/// Per-name aggregation from `GET /metrics/aggregations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAggregation {
    pub name: String,
    pub metric_type: String,
    pub avg_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub count: u64,
}
