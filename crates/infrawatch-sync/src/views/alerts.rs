use async_trait::async_trait;
use infrawatch_core::{
    ApiError, EventKind, PageSizes, PushEvent, Snapshot,
    models::{Alert, AlertCreate, AlertQuery, AlertStats},
};

use crate::{
    api::DashboardApi,
    reconciler::{Reconciler, Resource},
};

/// Alerts, filtered by status, with status counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Alerts;

pub type AlertsView = Reconciler<Alerts>;

#[async_trait]
impl Resource for Alerts {
    type Item = Alert;
    type Query = AlertQuery;
    type Stats = AlertStats;

    const NAME: &'static str = "alerts";
    const EVENT: Option<EventKind> = Some(EventKind::Alert);

    fn page_size(&self, sizes: &PageSizes) -> u32 {
        sizes.alerts
    }

    fn id<'a>(&self, item: &'a Alert) -> &'a str {
        &item.id
    }

    fn extract<'a>(&self, event: &'a PushEvent) -> Option<&'a Alert> {
        match event {
            PushEvent::Alert(alert) => Some(alert),
            _ => None,
        }
    }

    async fn fetch(
        &self,
        api: &DashboardApi,
        query: &AlertQuery,
        page: u32,
        page_size: u32,
    ) -> Result<Snapshot<Alert>, ApiError> {
        api.list_alerts(query, page, page_size).await
    }

    async fn fetch_stats(&self, api: &DashboardApi) -> Result<Option<AlertStats>, ApiError> {
        api.alert_stats().await.map(Some)
    }

    fn record(&self, stats: &mut AlertStats, previous: Option<&Alert>, item: &Alert) {
        stats.record(previous.map(|alert| alert.status), item);
    }

    fn forget(&self, stats: &mut AlertStats, item: &Alert) {
        stats.forget(item);
    }
}

impl Reconciler<Alerts> {
    /// Acknowledge an alert and update it in place.
    ///
    /// # Errors
    /// Returns the API error; the view is unchanged.
    pub async fn acknowledge(&self, id: &str) -> Result<Alert, ApiError> {
        let alert = self.shared.api.acknowledge_alert(id).await?;
        self.shared.replace(&alert);
        Ok(alert)
    }

    /// Resolve an alert and update it in place.
    ///
    /// # Errors
    /// Returns the API error; the view is unchanged.
    pub async fn resolve(&self, id: &str) -> Result<Alert, ApiError> {
        let alert = self.shared.api.resolve_alert(id).await?;
        self.shared.replace(&alert);
        Ok(alert)
    }

    /// Create an alert; it is merged like a pushed one.
    ///
    /// # Errors
    /// Returns the API error; the view is unchanged.
    pub async fn create(&self, alert: &AlertCreate) -> Result<Alert, ApiError> {
        let created = self.shared.api.create_alert(alert).await?;
        self.shared.apply_delta(&created);
        Ok(created)
    }

    /// Delete an alert.
    ///
    /// # Errors
    /// Returns the API error; the view is unchanged.
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.shared.api.delete_alert(id).await?;
        self.shared.remove(id);
        Ok(())
    }
}
