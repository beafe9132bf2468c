//! Scripted backend shared by the view tests.

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use infrawatch_core::{
    ApiRequest, ApiResponse, ClientConfig, EventBus, HttpTransport, Method, Session, SessionStore,
    TransportError,
    models::{Alert, AuthTokens},
};
use infrawatch_session::{CredentialPipeline, MemorySessionStore};
use infrawatch_sync::{DashboardApi, Reconciler, Resource};
use serde_json::{Value, json};

/// One scripted reply.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
    pub delay: Duration,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Backend answering from per-route queues; the last reply of a route is
/// repeated once its queue runs dry.
#[derive(Default)]
pub struct MockBackend {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, method: Method, path: &str, reply: Reply) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    fn next_reply(&self, method: Method, path: &str) -> Option<Reply> {
        let mut routes = self.routes.lock().unwrap();
        let queue = routes.get_mut(&(method, path.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl HttpTransport for MockBackend {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let Some(reply) = self.next_reply(request.method, &request.path) else {
            return Ok(ApiResponse::new(404, json!({"detail": "Not Found"})));
        };
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        Ok(ApiResponse::new(reply.status, reply.body))
    }
}

pub fn alert_json(id: &str, status: &str) -> Value {
    json!({
        "_id": id,
        "title": format!("alert {id}"),
        "severity": "warning",
        "status": status,
        "source": "node-1",
        "created_at": "2024-05-01T12:00:00"
    })
}

pub fn alert(id: &str, status: &str) -> Alert {
    let mut value = alert_json(id, status);
    // Push payloads carry `id`.
    let object = value.as_object_mut().unwrap();
    let id = object.remove("_id").unwrap();
    object.insert("id".to_string(), id);
    serde_json::from_value(value).unwrap()
}

pub fn page(items: Vec<Value>, total: u64, page: u32, page_size: u32) -> Value {
    json!({
        "items": items,
        "total": total,
        "page": page,
        "page_size": page_size,
        "total_pages": total.div_ceil(u64::from(page_size)),
    })
}

pub fn alert_stats(active: u64, acknowledged: u64, resolved: u64) -> Value {
    json!({
        "total_active": active,
        "total_acknowledged": acknowledged,
        "total_resolved": resolved,
        "by_severity": {"warning": active + acknowledged + resolved},
        "by_source": {"node-1": active + acknowledged + resolved}
    })
}

pub fn logged_in_store() -> Arc<MemorySessionStore> {
    Arc::new(MemorySessionStore::with_session(Session {
        tokens: Some(AuthTokens::bearer("access", "refresh")),
        user: None,
    }))
}

pub fn api(backend: &Arc<MockBackend>, store: &Arc<MemorySessionStore>) -> DashboardApi {
    DashboardApi::new(CredentialPipeline::new(
        Arc::clone(backend) as Arc<dyn HttpTransport>,
        Arc::clone(store) as Arc<dyn SessionStore>,
    ))
}

/// A logged-in view over `backend`.
pub fn view<R: Resource>(
    backend: &Arc<MockBackend>,
    resource: R,
    config: &ClientConfig,
) -> (Reconciler<R>, Arc<EventBus>) {
    let bus = Arc::new(EventBus::new());
    let store = logged_in_store();
    let view = Reconciler::new(resource, api(backend, &store), Arc::clone(&bus), config);
    (view, bus)
}
