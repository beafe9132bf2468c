use infrawatch_core::{
    ApiError, ApiRequest, Filter, Snapshot,
    models::{Alert, AlertCreate, AlertQuery, AlertRule, AlertRuleCreate, AlertStats},
};
use urlencoding::encode;

use super::{DashboardApi, paged};

impl DashboardApi {
    /// `GET /alerts`
    ///
    /// # Errors
    /// Returns the transport or classified HTTP error.
    pub async fn list_alerts(
        &self,
        query: &AlertQuery,
        page: u32,
        page_size: u32,
    ) -> Result<Snapshot<Alert>, ApiError> {
        let params = paged(query.to_params(), page, page_size);
        self.call(ApiRequest::get("/alerts").with_query(params)).await
    }

    /// `GET /alerts/stats`
    ///
    /// # Errors
    /// Returns the transport or classified HTTP error.
    pub async fn alert_stats(&self) -> Result<AlertStats, ApiError> {
        self.call(ApiRequest::get("/alerts/stats")).await
    }

    /// `POST /alerts`
    ///
    /// # Errors
    /// Returns the transport or classified HTTP error.
    pub async fn create_alert(&self, alert: &AlertCreate) -> Result<Alert, ApiError> {
        self.call(ApiRequest::post("/alerts").with_json(alert)?).await
    }

    /// `POST /alerts/{id}/acknowledge`
    ///
    /// # Errors
    /// Returns the transport or classified HTTP error.
    pub async fn acknowledge_alert(&self, id: &str) -> Result<Alert, ApiError> {
        let path = format!("/alerts/{}/acknowledge", encode(id));
        self.call(ApiRequest::post(path)).await
    }

    /// `POST /alerts/{id}/resolve`
    ///
    /// # Errors
    /// Returns the transport or classified HTTP error.
    pub async fn resolve_alert(&self, id: &str) -> Result<Alert, ApiError> {
        let path = format!("/alerts/{}/resolve", encode(id));
        self.call(ApiRequest::post(path)).await
    }

    /// `DELETE /alerts/{id}`
    ///
    /// # Errors
    /// Returns the transport or classified HTTP error.
    pub async fn delete_alert(&self, id: &str) -> Result<(), ApiError> {
        self.call_empty(ApiRequest::delete(format!("/alerts/{}", encode(id))))
            .await
    }

    /// `GET /alerts/rules`
    ///
    /// # Errors
    /// Returns the transport or classified HTTP error.
    pub async fn list_alert_rules(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Snapshot<AlertRule>, ApiError> {
        let params = paged(Vec::new(), page, page_size);
        self.call(ApiRequest::get("/alerts/rules").with_query(params))
            .await
    }

    /// `POST /alerts/rules`
    ///
    /// # Errors
    /// Returns the transport or classified HTTP error.
    pub async fn create_alert_rule(&self, rule: &AlertRuleCreate) -> Result<AlertRule, ApiError> {
        self.call(ApiRequest::post("/alerts/rules").with_json(rule)?)
            .await
    }

    /// `POST /alerts/rules/{id}/toggle?enabled=..`
    ///
    /// # Errors
    /// Returns the transport or classified HTTP error.
    pub async fn toggle_alert_rule(&self, id: &str, enabled: bool) -> Result<AlertRule, ApiError> {
        let path = format!("/alerts/rules/{}/toggle", encode(id));
        let request =
            ApiRequest::post(path).with_query([("enabled".to_string(), enabled.to_string())]);
        self.call(request).await
    }

    /// `DELETE /alerts/rules/{id}`
    ///
    /// # Errors
    /// Returns the transport or classified HTTP error.
    pub async fn delete_alert_rule(&self, id: &str) -> Result<(), ApiError> {
        self.call_empty(ApiRequest::delete(format!("/alerts/rules/{}", encode(id))))
            .await
    }
}
