use async_trait::async_trait;
use infrawatch_core::{
    ApiError, EventKind, PageSizes, PushEvent, Snapshot,
    models::{Log, LogCreate, LogQuery, LogStats},
};

use crate::{
    api::DashboardApi,
    reconciler::{Reconciler, Resource},
};

/// Log entries with level/source counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logs;

pub type LogsView = Reconciler<Logs>;

#[async_trait]
impl Resource for Logs {
    type Item = Log;
    type Query = LogQuery;
    type Stats = LogStats;

    const NAME: &'static str = "logs";
    const EVENT: Option<EventKind> = Some(EventKind::Log);

    fn page_size(&self, sizes: &PageSizes) -> u32 {
        sizes.logs
    }

    fn id<'a>(&self, item: &'a Log) -> &'a str {
        &item.id
    }

    fn extract<'a>(&self, event: &'a PushEvent) -> Option<&'a Log> {
        match event {
            PushEvent::Log(log) => Some(log),
            _ => None,
        }
    }

    async fn fetch(
        &self,
        api: &DashboardApi,
        query: &LogQuery,
        page: u32,
        page_size: u32,
    ) -> Result<Snapshot<Log>, ApiError> {
        api.list_logs(query, page, page_size).await
    }

    async fn fetch_stats(&self, api: &DashboardApi) -> Result<Option<LogStats>, ApiError> {
        api.log_stats().await.map(Some)
    }

    // Entries are immutable; only new ones count.
    fn record(&self, stats: &mut LogStats, previous: Option<&Log>, item: &Log) {
        if previous.is_none() {
            stats.record(item);
        }
    }

    fn forget(&self, stats: &mut LogStats, item: &Log) {
        stats.forget(item);
    }
}

impl Reconciler<Logs> {
    /// Change the message search after the debounce delay, keeping the
    /// other filters.
    pub fn search(&self, text: &str) {
        let mut query = self.query();
        let text = text.trim();
        query.search = (!text.is_empty()).then(|| text.to_string());
        self.set_query_debounced(query);
    }

    /// Ingest an entry; it is merged like a pushed one.
    ///
    /// # Errors
    /// Returns the API error; the view is unchanged.
    pub async fn create(&self, log: &LogCreate) -> Result<Log, ApiError> {
        let created = self.shared.api.create_log(log).await?;
        self.shared.apply_delta(&created);
        Ok(created)
    }

    /// Delete an entry.
    ///
    /// # Errors
    /// Returns the API error; the view is unchanged.
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.shared.api.delete_log(id).await?;
        self.shared.remove(id);
        Ok(())
    }
}
