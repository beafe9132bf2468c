use async_trait::async_trait;
use infrawatch_core::{
    ApiError, EventKind, PageSizes, PushEvent, Snapshot,
    models::{Metric, MetricAggregation, MetricCreate, MetricQuery},
};

use crate::{
    api::DashboardApi,
    reconciler::{Reconciler, Resource},
};

/// Metric samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct Metrics;

pub type MetricsView = Reconciler<Metrics>;

#[async_trait]
impl Resource for Metrics {
    type Item = Metric;
    type Query = MetricQuery;
    type Stats = ();

    const NAME: &'static str = "metrics";
    const EVENT: Option<EventKind> = Some(EventKind::Metric);

    fn page_size(&self, sizes: &PageSizes) -> u32 {
        sizes.metrics
    }

    fn id<'a>(&self, item: &'a Metric) -> &'a str {
        &item.id
    }

    fn extract<'a>(&self, event: &'a PushEvent) -> Option<&'a Metric> {
        match event {
            PushEvent::Metric(metric) => Some(metric),
            _ => None,
        }
    }

    async fn fetch(
        &self,
        api: &DashboardApi,
        query: &MetricQuery,
        page: u32,
        page_size: u32,
    ) -> Result<Snapshot<Metric>, ApiError> {
        api.list_metrics(query, page, page_size).await
    }
}

impl Reconciler<Metrics> {
    /// Record a sample; it is merged like a pushed one.
    ///
    /// # Errors
    /// Returns the API error; the view is unchanged.
    pub async fn create(&self, metric: &MetricCreate) -> Result<Metric, ApiError> {
        let created = self.shared.api.create_metric(metric).await?;
        self.shared.apply_delta(&created);
        Ok(created)
    }

    /// Delete a sample.
    ///
    /// # Errors
    /// Returns the API error; the view is unchanged.
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.shared.api.delete_metric(id).await?;
        self.shared.remove(id);
        Ok(())
    }

    /// Min/avg/max per metric name under the current filter.
    ///
    /// # Errors
    /// Returns the API error.
    pub async fn aggregations(&self) -> Result<Vec<MetricAggregation>, ApiError> {
        self.shared.api.metric_aggregations(&self.query()).await
    }
}
