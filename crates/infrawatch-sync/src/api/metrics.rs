use infrawatch_core::{
    ApiError, ApiRequest, Filter, Snapshot,
    models::{Metric, MetricAggregation, MetricCreate, MetricQuery},
};
use urlencoding::encode;

use super::{DashboardApi, paged};

impl DashboardApi {
    /// `GET /metrics`
    ///
    /// # Errors
    /// Returns the transport or classified HTTP error.
    pub async fn list_metrics(
        &self,
        query: &MetricQuery,
        page: u32,
        page_size: u32,
    ) -> Result<Snapshot<Metric>, ApiError> {
        let params = paged(query.to_params(), page, page_size);
        self.call(ApiRequest::get("/metrics").with_query(params)).await
    }

    /// `POST /metrics`
    ///
    /// # Errors
    /// Returns the transport or classified HTTP error.
    pub async fn create_metric(&self, metric: &MetricCreate) -> Result<Metric, ApiError> {
        self.call(ApiRequest::post("/metrics").with_json(metric)?).await
    }

    /// `GET /metrics/aggregations`: per-name min/avg/max over the filter.
    ///
    /// # Errors
    /// Returns the transport or classified HTTP error.
    pub async fn metric_aggregations(
        &self,
        query: &MetricQuery,
    ) -> Result<Vec<MetricAggregation>, ApiError> {
        self.call(ApiRequest::get("/metrics/aggregations").with_query(query.to_params()))
            .await
    }

    /// `GET /metrics/source/{source}`: latest samples of one source.
    ///
    /// # Errors
    /// Returns the transport or classified HTTP error.
    pub async fn metrics_by_source(&self, source: &str, limit: u32) -> Result<Vec<Metric>, ApiError> {
        let path = format!("/metrics/source/{}", encode(source));
        let request = ApiRequest::get(path).with_query([("limit".to_string(), limit.to_string())]);
        self.call(request).await
    }

    /// `DELETE /metrics/{id}`
    ///
    /// # Errors
    /// Returns the transport or classified HTTP error.
    pub async fn delete_metric(&self, id: &str) -> Result<(), ApiError> {
        self.call_empty(ApiRequest::delete(format!("/metrics/{}", encode(id))))
            .await
    }
}
