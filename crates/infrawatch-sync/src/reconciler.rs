//! View-model reconciler.
//!
//! A [`Reconciler`] keeps one paginated, filtered [`Snapshot`] of a resource
//! consistent with the server while the push channel delivers deltas:
//!
//! - every fetch is tagged with a generation and applied only if no newer
//!   fetch was started meanwhile;
//! - matching deltas are merged into the first `page_size` items;
//! - aggregates are adjusted optimistically and overwritten by the next
//!   full fetch or stats reconciliation.
//!
//! All mutations happen inside `watch::Sender::send_modify` /
//! `send_if_modified`, never across an `.await`.

use std::{
    fmt::Debug,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use async_trait::async_trait;
use infrawatch_core::{
    ApiError, ClientConfig, EventBus, EventKind, Filter, ListenerHandle, PageSizes, PushEvent,
    Snapshot,
};
use infrawatch_transport::ConnectionState;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, warn};

use crate::api::DashboardApi;

/// A resource kind a [`Reconciler`] can track.
#[async_trait]
pub trait Resource: Clone + Debug + Send + Sync + 'static {
    type Item: Clone + Debug + Send + Sync + 'static;
    type Query: Filter<Self::Item> + Clone + Debug + Default + PartialEq + Send + Sync + 'static;
    /// Aggregates served next to the list; `()` when there are none.
    type Stats: Clone + Debug + Default + PartialEq + Send + Sync + 'static;

    /// Name used in logs.
    const NAME: &'static str;

    /// Push event carrying new items, if the resource is pushed at all.
    const EVENT: Option<EventKind>;

    fn page_size(&self, sizes: &PageSizes) -> u32;

    fn id<'a>(&self, item: &'a Self::Item) -> &'a str;

    /// The item carried by `event`, if it is of this resource.
    fn extract<'a>(&self, event: &'a PushEvent) -> Option<&'a Self::Item>;

    async fn fetch(
        &self,
        api: &DashboardApi,
        query: &Self::Query,
        page: u32,
        page_size: u32,
    ) -> Result<Snapshot<Self::Item>, ApiError>;

    /// Fetch the aggregates. `None` for resources without any.
    async fn fetch_stats(&self, _api: &DashboardApi) -> Result<Option<Self::Stats>, ApiError> {
        Ok(None)
    }

    /// Adjust aggregates for `item`, which replaces `previous` (or is new).
    fn record(&self, _stats: &mut Self::Stats, _previous: Option<&Self::Item>, _item: &Self::Item) {}

    /// Adjust aggregates for a deleted item.
    fn forget(&self, _stats: &mut Self::Stats, _item: &Self::Item) {}
}

/// Fetch lifecycle of a view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewStatus {
    /// Nothing fetched yet.
    #[default]
    Idle,
    Loading,
    Ready,
    /// The latest fetch failed; the previous snapshot is kept.
    Error(ApiError),
}

/// Everything a consumer renders.
#[derive(Debug, Clone)]
pub struct ViewState<R: Resource> {
    pub snapshot: Snapshot<R::Item>,
    pub stats: Option<R::Stats>,
    pub query: R::Query,
    pub status: ViewStatus,
    /// Generation of the most recently started fetch.
    pub generation: u64,
}

impl<R: Resource> ViewState<R> {
    fn new(page_size: u32) -> Self {
        Self {
            snapshot: Snapshot::empty(page_size),
            stats: None,
            query: R::Query::default(),
            status: ViewStatus::Idle,
            generation: 0,
        }
    }

    fn position(&self, resource: &R, id: &str) -> Option<usize> {
        self.snapshot.position(|item| resource.id(item) == id)
    }
}

/// Whether a fetch result was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// A newer fetch started before this one resolved; the result was
    /// dropped.
    Superseded,
}

/// Effect of one delta on the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// Filtered out; the snapshot is unchanged.
    Ignored,
    /// Prepended and counted.
    Inserted,
    /// An item with the same id was replaced in place.
    Replaced,
}

pub(crate) struct Shared<R: Resource> {
    pub(crate) resource: R,
    pub(crate) api: DashboardApi,
    state: watch::Sender<ViewState<R>>,
}

impl<R: Resource> Shared<R> {
    async fn fetch(&self) -> Result<FetchOutcome, ApiError> {
        let mut generation = 0;
        let mut query = R::Query::default();
        let (mut page, mut page_size) = (1, 1);
        self.state.send_modify(|state| {
            state.generation += 1;
            state.status = ViewStatus::Loading;
            generation = state.generation;
            query.clone_from(&state.query);
            page = state.snapshot.page;
            page_size = state.snapshot.page_size;
        });

        let (snapshot, stats) = tokio::join!(
            self.resource.fetch(&self.api, &query, page, page_size),
            self.resource.fetch_stats(&self.api),
        );
        let result = snapshot.and_then(|snapshot| stats.map(|stats| (snapshot, stats)));

        let mut outcome = Ok(FetchOutcome::Superseded);
        self.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            match result {
                Ok((mut snapshot, stats)) => {
                    if snapshot.page_size == 0 {
                        snapshot.page_size = page_size;
                    }
                    if snapshot.total_pages == 0 {
                        snapshot.recompute_pages();
                    }
                    state.snapshot = snapshot;
                    if stats.is_some() {
                        state.stats = stats;
                    }
                    state.status = ViewStatus::Ready;
                    outcome = Ok(FetchOutcome::Applied);
                }
                Err(e) => {
                    state.status = ViewStatus::Error(e.clone());
                    outcome = Err(e);
                }
            }
            true
        });

        match &outcome {
            Ok(FetchOutcome::Superseded) => {
                debug!(resource = R::NAME, generation, "discarding superseded fetch");
            }
            Ok(FetchOutcome::Applied) => debug!(resource = R::NAME, generation, "fetch applied"),
            Err(e) => warn!(resource = R::NAME, error = %e, "fetch failed"),
        }
        outcome
    }

    /// Merge a pushed or freshly created item.
    pub(crate) fn apply_delta(&self, item: &R::Item) -> DeltaOutcome {
        let resource = &self.resource;
        let id = resource.id(item);
        let mut outcome = DeltaOutcome::Ignored;

        self.state.send_if_modified(|state| {
            let position = state.position(resource, id);
            // Aggregates cover the whole resource, not just this filter.
            if let Some(stats) = state.stats.as_mut() {
                let previous = position.map(|i| &state.snapshot.items[i]);
                resource.record(stats, previous, item);
            }

            if !state.query.matches(item) {
                return state.stats.is_some();
            }

            let snapshot = &mut state.snapshot;
            if let Some(i) = position {
                snapshot.items[i] = item.clone();
                outcome = DeltaOutcome::Replaced;
            } else {
                snapshot.items.insert(0, item.clone());
                snapshot.items.truncate(snapshot.page_size as usize);
                snapshot.total += 1;
                snapshot.recompute_pages();
                outcome = DeltaOutcome::Inserted;
            }
            true
        });

        debug!(resource = R::NAME, id, ?outcome, "delta applied");
        outcome
    }

    /// Replace an item by identity after a successful mutation.
    pub(crate) fn replace(&self, item: &R::Item) -> bool {
        let resource = &self.resource;
        let id = resource.id(item);
        self.state.send_if_modified(|state| {
            let Some(i) = state.position(resource, id) else {
                return false;
            };
            if let Some(stats) = state.stats.as_mut() {
                resource.record(stats, Some(&state.snapshot.items[i]), item);
            }
            state.snapshot.items[i] = item.clone();
            true
        })
    }

    /// Drop an item after a successful delete.
    pub(crate) fn remove(&self, id: &str) -> Option<R::Item> {
        let resource = &self.resource;
        let mut removed = None;
        self.state.send_if_modified(|state| {
            let Some(i) = state.position(resource, id) else {
                return false;
            };
            let item = state.snapshot.items.remove(i);
            state.snapshot.total = state.snapshot.total.saturating_sub(1);
            state.snapshot.recompute_pages();
            if let Some(stats) = state.stats.as_mut() {
                resource.forget(stats, &item);
            }
            removed = Some(item);
            true
        });
        removed
    }

    async fn reconcile_stats(&self) -> Result<(), ApiError> {
        let Some(stats) = self.resource.fetch_stats(&self.api).await? else {
            return Ok(());
        };
        self.state.send_if_modified(|state| {
            if state.stats.as_ref() == Some(&stats) {
                return false;
            }
            state.stats = Some(stats);
            true
        });
        Ok(())
    }
}

#[derive(Default)]
struct Tasks {
    debounce: Option<JoinHandle<()>>,
    background: Vec<JoinHandle<()>>,
}

/// Live view over one resource.
///
/// Dropping the view unsubscribes it from the event bus and cancels its
/// pending debounce and background tasks.
pub struct Reconciler<R: Resource> {
    pub(crate) shared: Arc<Shared<R>>,
    bus: Arc<EventBus>,
    listener: Option<ListenerHandle>,
    debounce: Duration,
    tasks: Mutex<Tasks>,
}

impl<R: Resource> Reconciler<R> {
    /// Create an idle view and subscribe it to the resource's push events.
    ///
    /// Nothing is fetched until [`Reconciler::refetch`] or a query change.
    pub fn new(resource: R, api: DashboardApi, bus: Arc<EventBus>, config: &ClientConfig) -> Self {
        let page_size = resource.page_size(&config.page_sizes).max(1);
        let (state, _) = watch::channel(ViewState::new(page_size));
        let shared = Arc::new(Shared {
            resource,
            api,
            state,
        });

        let listener = R::EVENT.map(|kind| {
            let weak: Weak<Shared<R>> = Arc::downgrade(&shared);
            let handle = ListenerHandle::new(move |event| {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                if let Some(item) = shared.resource.extract(event) {
                    shared.apply_delta(item);
                }
            });
            bus.subscribe(kind, &handle);
            handle
        });

        Self {
            shared,
            bus,
            listener,
            debounce: config.search_debounce,
            tasks: Mutex::new(Tasks::default()),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ViewState<R> {
        self.shared.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ViewState<R>> {
        self.shared.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot<R::Item> {
        self.shared.state.borrow().snapshot.clone()
    }

    #[must_use]
    pub fn stats(&self) -> Option<R::Stats> {
        self.shared.state.borrow().stats.clone()
    }

    #[must_use]
    pub fn status(&self) -> ViewStatus {
        self.shared.state.borrow().status.clone()
    }

    #[must_use]
    pub fn query(&self) -> R::Query {
        self.shared.state.borrow().query.clone()
    }

    /// Fetch the current query and page again.
    ///
    /// # Errors
    /// Returns the fetch error if this was still the latest fetch when it
    /// failed.
    pub async fn refetch(&self) -> Result<FetchOutcome, ApiError> {
        self.shared.fetch().await
    }

    /// Switch to `query`, back to page 1, and fetch.
    ///
    /// # Errors
    /// See [`Reconciler::refetch`].
    pub async fn set_query(&self, query: R::Query) -> Result<FetchOutcome, ApiError> {
        set_query(&self.shared, query).await
    }

    /// Switch to `page` (1-based) and fetch.
    ///
    /// # Errors
    /// See [`Reconciler::refetch`].
    pub async fn set_page(&self, page: u32) -> Result<FetchOutcome, ApiError> {
        self.shared.state.send_modify(|state| {
            state.snapshot.page = page.max(1);
        });
        self.shared.fetch().await
    }

    /// Like [`Reconciler::set_query`] after the debounce delay. A newer call
    /// replaces a pending one. Errors end up in [`ViewStatus::Error`].
    pub fn set_query_debounced(&self, query: R::Query) {
        let shared = Arc::clone(&self.shared);
        let delay = self.debounce;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Failures are already recorded in the view status.
            let _ = set_query(&shared, query).await;
        });
        if let Some(pending) = self.tasks().debounce.replace(task) {
            pending.abort();
        }
    }

    /// Merge one pushed item, as the event bus listener does.
    pub fn apply_delta(&self, item: &R::Item) -> DeltaOutcome {
        self.shared.apply_delta(item)
    }

    /// Overwrite the aggregates with the server's.
    ///
    /// # Errors
    /// Returns the fetch error; the local aggregates are kept.
    pub async fn reconcile_stats(&self) -> Result<(), ApiError> {
        self.shared.reconcile_stats().await
    }

    /// Reconcile aggregates every `period` until the view is dropped.
    pub fn spawn_stats_reconciliation(&self, period: Duration) {
        let weak = Arc::downgrade(&self.shared);
        let task = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period.max(Duration::from_millis(1)));
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                if let Err(e) = shared.reconcile_stats().await {
                    warn!(resource = R::NAME, error = %e, "stats reconciliation failed");
                }
            }
        });
        self.tasks().background.push(task);
    }

    /// Refetch on every transition of the push channel into
    /// [`ConnectionState::Open`], recovering deltas missed while it was not
    /// open. Views that have not fetched yet are left alone.
    pub fn refetch_on_reconnect(&self, mut states: watch::Receiver<ConnectionState>) {
        let weak = Arc::downgrade(&self.shared);
        let task = tokio::spawn(async move {
            let mut was_open = *states.borrow_and_update() == ConnectionState::Open;
            while states.changed().await.is_ok() {
                let open = *states.borrow_and_update() == ConnectionState::Open;
                let opened = open && !was_open;
                was_open = open;
                if !opened {
                    continue;
                }
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                if shared.state.borrow().generation == 0 {
                    continue;
                }
                debug!(resource = R::NAME, "push channel opened, refetching");
                // Failures are already recorded in the view status.
                let _ = shared.fetch().await;
            }
        });
        self.tasks().background.push(task);
    }
}

async fn set_query<R: Resource>(
    shared: &Shared<R>,
    query: R::Query,
) -> Result<FetchOutcome, ApiError> {
    shared.state.send_modify(|state| {
        state.query = query;
        state.snapshot.page = 1;
    });
    shared.fetch().await
}

impl<R: Resource> Drop for Reconciler<R> {
    fn drop(&mut self) {
        if let (Some(kind), Some(listener)) = (R::EVENT, self.listener.take()) {
            self.bus.unsubscribe(kind, &listener);
        }
        let tasks = std::mem::take(
            self.tasks
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if let Some(debounce) = tasks.debounce {
            debounce.abort();
        }
        for task in tasks.background {
            task.abort();
        }
    }
}

impl<R: Resource> Debug for Reconciler<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("Reconciler")
            .field("resource", &R::NAME)
            .field("status", &state.status)
            .field("items", &state.snapshot.items.len())
            .field("total", &state.snapshot.total)
            .finish_non_exhaustive()
    }
}
