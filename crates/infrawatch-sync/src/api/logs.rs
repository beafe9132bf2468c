use infrawatch_core::{
    ApiError, ApiRequest, Filter, Snapshot,
    models::{Log, LogCreate, LogQuery, LogStats},
};
use urlencoding::encode;

use super::{DashboardApi, paged};

impl DashboardApi {
    /// `GET /logs`
    ///
    /// # Errors
    /// Returns the transport or classified HTTP error.
    pub async fn list_logs(
        &self,
        query: &LogQuery,
        page: u32,
        page_size: u32,
    ) -> Result<Snapshot<Log>, ApiError> {
        let params = paged(query.to_params(), page, page_size);
        self.call(ApiRequest::get("/logs").with_query(params)).await
    }

    /// `GET /logs/stats`
    ///
    /// # Errors
    /// Returns the transport or classified HTTP error.
    pub async fn log_stats(&self) -> Result<LogStats, ApiError> {
        self.call(ApiRequest::get("/logs/stats")).await
    }

    /// `POST /logs`
    ///
    /// # Errors
    /// Returns the transport or classified HTTP error.
    pub async fn create_log(&self, log: &LogCreate) -> Result<Log, ApiError> {
        self.call(ApiRequest::post("/logs").with_json(log)?).await
    }

    /// `DELETE /logs/{id}`
    ///
    /// # Errors
    /// Returns the transport or classified HTTP error.
    pub async fn delete_log(&self, id: &str) -> Result<(), ApiError> {
        self.call_empty(ApiRequest::delete(format!("/logs/{}", encode(id))))
            .await
    }
}
