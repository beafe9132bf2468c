//! Snapshot fetching, delta merging and stale-result suppression.

mod common;

use std::time::Duration;

use common::{MockBackend, Reply, alert, alert_json, alert_stats, page};
use infrawatch_core::{
    ApiError, ClientConfig, EventKind, Method, PageSizes, PushEvent, Snapshot,
    models::{Alert, AlertQuery, AlertStatus},
};
use infrawatch_sync::{Alerts, DeltaOutcome, FetchOutcome, ViewStatus};
use infrawatch_transport::ConnectionState;
use serde_json::json;
use tokio::sync::watch;

fn ids(snapshot: &Snapshot<Alert>) -> Vec<&str> {
    snapshot.items.iter().map(|a| a.id.as_str()).collect()
}

fn param<'a>(request: &'a infrawatch_core::ApiRequest, key: &str) -> Option<&'a str> {
    request
        .query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn active_backend() -> std::sync::Arc<MockBackend> {
    let backend = MockBackend::new();
    backend
        .on(
            Method::Get,
            "/alerts",
            Reply::ok(page(
                vec![alert_json("a2", "active"), alert_json("a1", "active")],
                2,
                1,
                20,
            )),
        )
        .on(Method::Get, "/alerts/stats", Reply::ok(alert_stats(2, 0, 0)));
    backend
}

#[tokio::test]
async fn test_initial_fetch() {
    let backend = active_backend();
    let (view, _bus) = common::view(&backend, Alerts, &ClientConfig::default());
    assert_eq!(view.status(), ViewStatus::Idle);

    let outcome = view
        .set_query(AlertQuery::with_status(AlertStatus::Active))
        .await;
    assert_eq!(outcome, Ok(FetchOutcome::Applied));

    let state = view.state();
    assert_eq!(state.status, ViewStatus::Ready);
    assert_eq!(ids(&state.snapshot), vec!["a2", "a1"]);
    assert_eq!(state.stats.unwrap().total_active, 2);
    assert_eq!(state.generation, 1);

    let requests = backend.requests();
    let list = requests.iter().find(|r| r.path == "/alerts").unwrap();
    assert_eq!(param(list, "status"), Some("active"));
    assert_eq!(param(list, "page"), Some("1"));
    assert_eq!(param(list, "page_size"), Some("20"));
    assert_eq!(list.bearer.as_deref(), Some("access"));
}

#[tokio::test]
async fn test_matching_delta_is_prepended() {
    let backend = active_backend();
    let (view, bus) = common::view(&backend, Alerts, &ClientConfig::default());
    view.set_query(AlertQuery::with_status(AlertStatus::Active))
        .await
        .unwrap();

    assert_eq!(bus.dispatch(&PushEvent::Alert(alert("x", "active"))), 1);

    let state = view.state();
    assert_eq!(ids(&state.snapshot), vec!["x", "a2", "a1"]);
    assert_eq!(state.snapshot.total, 3);
    assert_eq!(state.stats.unwrap().total_active, 3);
}

#[tokio::test]
async fn test_non_matching_delta_leaves_snapshot_unchanged() {
    let backend = MockBackend::new();
    backend
        .on(
            Method::Get,
            "/alerts",
            Reply::ok(page(vec![alert_json("r1", "resolved")], 1, 1, 20)),
        )
        .on(Method::Get, "/alerts/stats", Reply::ok(alert_stats(0, 0, 1)));
    let (view, bus) = common::view(&backend, Alerts, &ClientConfig::default());
    view.set_query(AlertQuery::with_status(AlertStatus::Resolved))
        .await
        .unwrap();
    let before = view.snapshot();

    bus.dispatch(&PushEvent::Alert(alert("x", "active")));

    assert_eq!(view.snapshot(), before);
    // Counters are resource-wide and still see the new alert.
    assert_eq!(view.stats().unwrap().total_active, 1);
}

#[tokio::test]
async fn test_items_capped_at_page_size() {
    let backend = MockBackend::new();
    backend
        .on(
            Method::Get,
            "/alerts",
            Reply::ok(page(
                vec![
                    alert_json("a3", "active"),
                    alert_json("a2", "active"),
                    alert_json("a1", "active"),
                ],
                10,
                1,
                3,
            )),
        )
        .on(Method::Get, "/alerts/stats", Reply::ok(alert_stats(10, 0, 0)));
    let config = ClientConfig {
        page_sizes: PageSizes {
            alerts: 3,
            ..PageSizes::default()
        },
        ..ClientConfig::default()
    };
    let (view, _bus) = common::view(&backend, Alerts, &config);
    view.refetch().await.unwrap();

    assert_eq!(view.apply_delta(&alert("n1", "active")), DeltaOutcome::Inserted);
    assert_eq!(view.apply_delta(&alert("n2", "active")), DeltaOutcome::Inserted);

    let snapshot = view.snapshot();
    assert_eq!(ids(&snapshot), vec!["n2", "n1", "a3"]);
    assert_eq!(snapshot.total, 12);
    assert_eq!(snapshot.total_pages, 4);
}

#[tokio::test]
async fn test_known_id_is_replaced_in_place() {
    let backend = active_backend();
    let (view, _bus) = common::view(&backend, Alerts, &ClientConfig::default());
    view.refetch().await.unwrap();

    let outcome = view.apply_delta(&alert("a1", "acknowledged"));
    assert_eq!(outcome, DeltaOutcome::Replaced);

    let state = view.state();
    assert_eq!(ids(&state.snapshot), vec!["a2", "a1"]);
    assert_eq!(state.snapshot.items[1].status, AlertStatus::Acknowledged);
    assert_eq!(state.snapshot.total, 2);
    let stats = state.stats.unwrap();
    assert_eq!((stats.total_active, stats.total_acknowledged), (1, 1));
}

#[tokio::test(start_paused = true)]
async fn test_slow_earlier_fetch_does_not_overwrite_later_one() {
    let backend = MockBackend::new();
    backend
        .on(
            Method::Get,
            "/alerts",
            Reply::ok(page(vec![alert_json("old", "active")], 1, 1, 20))
                .after(Duration::from_millis(200)),
        )
        .on(
            Method::Get,
            "/alerts",
            Reply::ok(page(vec![alert_json("new", "resolved")], 1, 1, 20))
                .after(Duration::from_millis(10)),
        )
        .on(Method::Get, "/alerts/stats", Reply::ok(alert_stats(1, 0, 1)));
    let (view, _bus) = common::view(&backend, Alerts, &ClientConfig::default());

    let (first, second) = tokio::join!(
        view.set_query(AlertQuery::with_status(AlertStatus::Active)),
        view.set_query(AlertQuery::with_status(AlertStatus::Resolved)),
    );

    assert_eq!(first, Ok(FetchOutcome::Superseded));
    assert_eq!(second, Ok(FetchOutcome::Applied));
    let state = view.state();
    assert_eq!(ids(&state.snapshot), vec!["new"]);
    assert_eq!(state.query, AlertQuery::with_status(AlertStatus::Resolved));
    assert_eq!(state.status, ViewStatus::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_stale_error_is_ignored() {
    let backend = MockBackend::new();
    backend
        .on(
            Method::Get,
            "/alerts",
            Reply::status(500, json!({"detail": "boom"})).after(Duration::from_millis(200)),
        )
        .on(
            Method::Get,
            "/alerts",
            Reply::ok(page(vec![alert_json("a1", "active")], 1, 1, 20)),
        )
        .on(Method::Get, "/alerts/stats", Reply::ok(alert_stats(1, 0, 0)));
    let (view, _bus) = common::view(&backend, Alerts, &ClientConfig::default());

    let (first, second) = tokio::join!(view.refetch(), view.refetch());

    assert_eq!(first, Ok(FetchOutcome::Superseded));
    assert_eq!(second, Ok(FetchOutcome::Applied));
    assert_eq!(view.status(), ViewStatus::Ready);
}

#[tokio::test]
async fn test_failed_fetch_keeps_previous_snapshot() {
    let backend = active_backend();
    backend.on(
        Method::Get,
        "/alerts",
        Reply::status(503, json!({"message": "database unavailable"})),
    );
    let (view, _bus) = common::view(&backend, Alerts, &ClientConfig::default());
    view.refetch().await.unwrap();
    let before = view.snapshot();

    let err = view.refetch().await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Server {
            status: 503,
            message: "database unavailable".into()
        }
    );
    assert_eq!(view.status(), ViewStatus::Error(err));
    assert_eq!(view.snapshot(), before);
}

#[tokio::test]
async fn test_set_page_requests_that_page() {
    let backend = active_backend();
    let (view, _bus) = common::view(&backend, Alerts, &ClientConfig::default());

    view.set_page(2).await.unwrap();
    let requests = backend.requests();
    let list = requests.iter().find(|r| r.path == "/alerts").unwrap();
    assert_eq!(param(list, "page"), Some("2"));

    // A query change starts over at page 1.
    view.set_query(AlertQuery::default()).await.unwrap();
    let requests = backend.requests();
    let last = requests.iter().rev().find(|r| r.path == "/alerts").unwrap();
    assert_eq!(param(last, "page"), Some("1"));
}

#[tokio::test(start_paused = true)]
async fn test_debounced_query_fetches_once() {
    let backend = active_backend();
    let (view, _bus) = common::view(&backend, Alerts, &ClientConfig::default());

    view.set_query_debounced(AlertQuery::with_status(AlertStatus::Active));
    tokio::time::sleep(Duration::from_millis(100)).await;
    view.set_query_debounced(AlertQuery::with_status(AlertStatus::Acknowledged));
    tokio::time::sleep(Duration::from_millis(100)).await;
    view.set_query_debounced(AlertQuery::with_status(AlertStatus::Resolved));

    tokio::time::sleep(Duration::from_millis(299)).await;
    assert_eq!(backend.count(Method::Get, "/alerts"), 0);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(backend.count(Method::Get, "/alerts"), 1);
    let requests = backend.requests();
    let list = requests.iter().find(|r| r.path == "/alerts").unwrap();
    assert_eq!(param(list, "status"), Some("resolved"));
}

#[tokio::test(start_paused = true)]
async fn test_drop_cancels_pending_work_and_unsubscribes() {
    let backend = active_backend();
    let (view, bus) = common::view(&backend, Alerts, &ClientConfig::default());
    assert_eq!(bus.listener_count(EventKind::Alert), 1);

    view.set_query_debounced(AlertQuery::default());
    drop(view);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(bus.listener_count(EventKind::Alert), 0);
    assert!(backend.requests().is_empty());
    assert_eq!(bus.dispatch(&PushEvent::Alert(alert("x", "active"))), 0);
}

async fn drive(states: &watch::Sender<ConnectionState>, sequence: &[ConnectionState]) {
    for state in sequence {
        states.send_replace(*state);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

const OUTAGE: [ConnectionState; 3] = [
    ConnectionState::Reconnecting {
        attempt: 1,
        delay: Duration::from_secs(3),
    },
    ConnectionState::Connecting,
    ConnectionState::Open,
];

#[tokio::test(start_paused = true)]
async fn test_refetch_after_reconnect() {
    let backend = active_backend();
    let (view, _bus) = common::view(&backend, Alerts, &ClientConfig::default());
    let (states, rx) = watch::channel(ConnectionState::Open);
    view.refetch_on_reconnect(rx);
    view.refetch().await.unwrap();

    // Staying open is not a reconnect.
    drive(&states, &[ConnectionState::Open]).await;
    assert_eq!(backend.count(Method::Get, "/alerts"), 1);

    drive(&states, &OUTAGE).await;
    assert_eq!(backend.count(Method::Get, "/alerts"), 2);
    assert_eq!(view.status(), ViewStatus::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_during_outage_is_redone_on_open() {
    let backend = active_backend();
    let (view, _bus) = common::view(&backend, Alerts, &ClientConfig::default());
    let (states, rx) = watch::channel(OUTAGE[0]);
    view.refetch_on_reconnect(rx);

    view.refetch().await.unwrap();
    assert_eq!(backend.count(Method::Get, "/alerts"), 1);

    drive(&states, &OUTAGE[1..]).await;
    assert_eq!(backend.count(Method::Get, "/alerts"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_open_does_not_fetch_for_unfetched_view() {
    let backend = active_backend();
    let (view, _bus) = common::view(&backend, Alerts, &ClientConfig::default());
    let (states, rx) = watch::channel(ConnectionState::Disconnected);
    view.refetch_on_reconnect(rx);

    drive(&states, &[ConnectionState::Connecting, ConnectionState::Open]).await;
    drive(&states, &OUTAGE).await;

    assert_eq!(backend.count(Method::Get, "/alerts"), 0);
    assert_eq!(view.status(), ViewStatus::Idle);
}

#[tokio::test]
async fn test_reconcile_stats_overwrites_local_adjustments() {
    let backend = active_backend();
    let (view, bus) = common::view(&backend, Alerts, &ClientConfig::default());
    view.refetch().await.unwrap();

    bus.dispatch(&PushEvent::Alert(alert("x", "active")));
    assert_eq!(view.stats().unwrap().total_active, 3);

    // Server counters win over local adjustments.
    view.reconcile_stats().await.unwrap();
    assert_eq!(view.stats().unwrap().total_active, 2);
    // The snapshot is left alone.
    assert_eq!(view.snapshot().total, 3);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_stats_reconciliation() {
    let backend = MockBackend::new();
    backend
        .on(
            Method::Get,
            "/alerts",
            Reply::ok(page(vec![alert_json("a1", "active")], 1, 1, 20)),
        )
        .on(Method::Get, "/alerts/stats", Reply::ok(alert_stats(1, 0, 0)))
        .on(Method::Get, "/alerts/stats", Reply::ok(alert_stats(4, 2, 0)));
    let (view, _bus) = common::view(&backend, Alerts, &ClientConfig::default());
    view.refetch().await.unwrap();
    assert_eq!(view.stats().unwrap().total_active, 1);

    view.spawn_stats_reconciliation(Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(59)).await;
    assert_eq!(backend.count(Method::Get, "/alerts/stats"), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let stats = view.stats().unwrap();
    assert_eq!((stats.total_active, stats.total_acknowledged), (4, 2));
}
