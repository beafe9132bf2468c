//! Client wiring: one push channel, one session and any number of views.

use std::sync::Arc;

use infrawatch_core::{ClientConfig, EventBus, HttpTransport, SessionStore, TransportError};
use infrawatch_session::{CredentialPipeline, MemorySessionStore, SessionManager};
use infrawatch_transport::{
    ChannelOptions, ConnectionManager, Connector, ReqwestTransport, WsConnector,
};

use crate::{
    api::DashboardApi,
    reconciler::{Reconciler, Resource},
    views::{AlertRules, AlertRulesView, Alerts, AlertsView, Logs, LogsView, Metrics, MetricsView},
};

/// The assembled client.
pub struct InfraWatchClient {
    config: ClientConfig,
    bus: Arc<EventBus>,
    api: DashboardApi,
    session: SessionManager,
}

impl InfraWatchClient {
    /// Client talking to `config.api_url` over reqwest and tokio-tungstenite,
    /// with an in-memory session.
    ///
    /// # Errors
    /// Returns error if `config.api_url` is not an absolute HTTP(S) URL or
    /// the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        let connector = Arc::new(WsConnector::from_config(&config)?);
        Ok(Self::with_parts(
            config,
            transport,
            connector,
            Arc::new(MemorySessionStore::new()),
        ))
    }

    /// Client over custom transports and session store.
    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
        connector: Arc<dyn Connector>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let bus = Arc::new(EventBus::new());
        let pipeline = CredentialPipeline::new(transport, store);
        let connection =
            ConnectionManager::new(connector, Arc::clone(&bus), ChannelOptions::from(&config));
        Self {
            api: DashboardApi::new(pipeline.clone()),
            session: SessionManager::new(pipeline, connection),
            config,
            bus,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub const fn session(&self) -> &SessionManager {
        &self.session
    }

    #[must_use]
    pub const fn connection(&self) -> &ConnectionManager {
        self.session.connection()
    }

    #[must_use]
    pub const fn api(&self) -> &DashboardApi {
        &self.api
    }

    #[must_use]
    pub const fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// A live view that refetches whenever the push channel reconnects.
    ///
    /// Must be called within a Tokio runtime.
    pub fn view<R: Resource>(&self, resource: R) -> Reconciler<R> {
        let view = Reconciler::new(resource, self.api.clone(), Arc::clone(&self.bus), &self.config);
        view.refetch_on_reconnect(self.connection().watch_state());
        view
    }

    pub fn alerts(&self) -> AlertsView {
        self.view(Alerts)
    }

    pub fn alert_rules(&self) -> AlertRulesView {
        self.view(AlertRules)
    }

    pub fn metrics(&self) -> MetricsView {
        self.view(Metrics)
    }

    pub fn logs(&self) -> LogsView {
        self.view(Logs)
    }
}

impl std::fmt::Debug for InfraWatchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfraWatchClient")
            .field("api_url", &self.config.api_url)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
