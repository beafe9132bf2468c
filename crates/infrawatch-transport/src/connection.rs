//! Connection manager for the push channel.
//!
//! Owns at most one live channel at a time, reconnects with [`Backoff`]
//! after any close, and hands every decoded frame to the [`EventBus`].
//! Lifecycle changes are published on a `watch` channel.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use infrawatch_core::{ClientConfig, EventBus, TransportError};
use tokio::{
    sync::{Notify, oneshot, watch},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info, trace, warn};

use crate::{
    backoff::Backoff,
    protocol::{ClientMessage, Inbound, read_frame},
};

/// Lifecycle of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No channel and no reconnect scheduled.
    #[default]
    Disconnected,
    /// Opening a channel.
    Connecting,
    /// Channel open, frames flowing.
    Open,
    /// Waiting `delay` before retry number `attempt` (1-based since the
    /// last successful open).
    Reconnecting { attempt: u32, delay: Duration },
}

/// An open bidirectional text channel.
#[async_trait]
pub trait PushChannel: Send {
    /// Next inbound text frame; `None` once the peer closed.
    ///
    /// Must be cancel-safe: the manager polls it inside `select!`.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Send one text frame.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the channel. Errors are ignored.
    async fn close(&mut self);
}

/// Opens push channels.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn PushChannel>, TransportError>;
}

/// Tunables for the channel loop.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    pub backoff: infrawatch_core::BackoffConfig,
    /// Inbound silence after which a ping is sent; zero disables it.
    pub keepalive_interval: Duration,
    pub max_frame_bytes: usize,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for ChannelOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            backoff: config.backoff.clone(),
            keepalive_interval: config.keepalive_interval,
            max_frame_bytes: config.max_frame_bytes,
        }
    }
}

/// State shared with the background task.
struct Shared {
    connector: Arc<dyn Connector>,
    bus: Arc<EventBus>,
    options: ChannelOptions,
    state_tx: watch::Sender<ConnectionState>,
    /// Epoch of the task allowed to publish state; 0 when none.
    active_epoch: Mutex<u64>,
}

impl Shared {
    fn epoch(&self) -> MutexGuard<'_, u64> {
        self.active_epoch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish `state` on behalf of task `epoch`. Superseded tasks are ignored.
    fn publish(&self, epoch: u64, state: ConnectionState) -> bool {
        let active = self.epoch();
        if *active != epoch {
            return false;
        }
        self.state_tx.send_replace(state);
        true
    }

    fn handle_frame(&self, text: &str) {
        match read_frame(text, self.options.max_frame_bytes) {
            Inbound::Event(event) => {
                let kind = event.kind();
                let delivered = self.bus.dispatch(&event);
                trace!(%kind, delivered, "push event dispatched");
            }
            Inbound::Oversized(len) => {
                warn!(len, limit = self.options.max_frame_bytes, "dropping oversized frame");
            }
            Inbound::Invalid(e) => debug!(error = %e, "dropping undecodable frame"),
        }
    }

    /// Drive an open channel until it closes or shutdown is requested.
    async fn pump(
        &self,
        channel: &mut Box<dyn PushChannel>,
        shutdown: &mut oneshot::Receiver<()>,
    ) -> PumpExit {
        let keepalive = self.options.keepalive_interval;
        let mut idle_deadline = Instant::now() + keepalive;

        loop {
            tokio::select! {
                biased;
                _ = &mut *shutdown => return PumpExit::Shutdown,
                frame = channel.recv() => {
                    idle_deadline = Instant::now() + keepalive;
                    match frame {
                        Some(Ok(text)) => self.handle_frame(&text),
                        Some(Err(e)) => {
                            warn!(error = %e, "push channel error");
                            return PumpExit::Closed;
                        }
                        None => {
                            info!("push channel closed by peer");
                            return PumpExit::Closed;
                        }
                    }
                }
                () = tokio::time::sleep_until(idle_deadline), if !keepalive.is_zero() => {
                    if let Err(e) = channel.send(ClientMessage::Ping.to_text()).await {
                        warn!(error = %e, "keepalive ping failed");
                        return PumpExit::Closed;
                    }
                    trace!("keepalive ping sent");
                    idle_deadline = Instant::now() + keepalive;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpExit {
    Shutdown,
    Closed,
}

struct Worker {
    shutdown: oneshot::Sender<()>,
    wake: Arc<Notify>,
    handle: JoinHandle<()>,
}

struct Inner {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
    next_epoch: Mutex<u64>,
}

/// Manages the single push channel of a client.
///
/// Cheap to clone; clones control the same channel. Dropping the last
/// clone stops the background task.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a manager; nothing is opened until [`ConnectionManager::connect`].
    pub fn new(connector: Arc<dyn Connector>, bus: Arc<EventBus>, options: ChannelOptions) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                shared: Arc::new(Shared {
                    connector,
                    bus,
                    options,
                    state_tx,
                    active_epoch: Mutex::new(0),
                }),
                worker: Mutex::new(None),
                next_epoch: Mutex::new(0),
            }),
        }
    }

    /// The bus frames are dispatched to.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.inner.shared.bus
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.shared.state_tx.borrow()
    }

    /// Whether a channel is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Receiver for lifecycle changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.shared.state_tx.subscribe()
    }

    fn worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the channel.
    ///
    /// No-op while connecting or open. While waiting to reconnect, the wait
    /// is cut short and an attempt starts immediately. Must be called
    /// within a Tokio runtime.
    pub fn connect(&self) {
        let mut worker = self.worker();
        if let Some(running) = worker.as_ref().filter(|w| !w.handle.is_finished()) {
            if matches!(self.state(), ConnectionState::Reconnecting { .. }) {
                debug!("connect requested during backoff, retrying now");
                running.wake.notify_one();
            }
            return;
        }

        let epoch = {
            let mut next = self
                .inner
                .next_epoch
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *next += 1;
            *next
        };
        {
            let mut active = self.inner.shared.epoch();
            *active = epoch;
            self.inner
                .shared
                .state_tx
                .send_replace(ConnectionState::Connecting);
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let wake = Arc::new(Notify::new());
        let handle = tokio::spawn(run(
            Arc::clone(&self.inner.shared),
            epoch,
            shutdown_rx,
            Arc::clone(&wake),
        ));
        *worker = Some(Worker {
            shutdown: shutdown_tx,
            wake,
            handle,
        });
    }

    /// Stop the channel and cancel any pending reconnect.
    ///
    /// Returns once the background task has exited; the state is
    /// [`ConnectionState::Disconnected`] from then on until the next
    /// [`ConnectionManager::connect`].
    pub async fn disconnect(&self) {
        let worker = self.worker().take();
        {
            let mut active = self.inner.shared.epoch();
            *active = 0;
            self.inner
                .shared
                .state_tx
                .send_replace(ConnectionState::Disconnected);
        }

        let Some(worker) = worker else {
            return;
        };
        let _ = worker.shutdown.send(());
        if let Err(e) = worker.handle.await {
            if e.is_panic() {
                warn!("push channel task panicked");
            }
        }
        info!("push channel disconnected");
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Background task: connect, pump, back off, repeat.
async fn run(
    shared: Arc<Shared>,
    epoch: u64,
    mut shutdown: oneshot::Receiver<()>,
    wake: Arc<Notify>,
) {
    let mut backoff = Backoff::new(shared.options.backoff.clone());

    loop {
        shared.publish(epoch, ConnectionState::Connecting);
        let opened = tokio::select! {
            biased;
            _ = &mut shutdown => return,
            result = shared.connector.connect() => result,
        };

        match opened {
            Ok(mut channel) => {
                backoff.reset();
                if !shared.publish(epoch, ConnectionState::Open) {
                    channel.close().await;
                    return;
                }
                info!("push channel open");
                let exit = shared.pump(&mut channel, &mut shutdown).await;
                channel.close().await;
                if exit == PumpExit::Shutdown {
                    return;
                }
            }
            Err(e) => warn!(error = %e, "push channel connect failed"),
        }

        let delay = backoff.next_delay();
        let attempt = backoff.attempt();
        if !shared.publish(epoch, ConnectionState::Reconnecting { attempt, delay }) {
            return;
        }
        debug!(attempt, delay_ms = delay.as_millis(), "reconnect scheduled");

        tokio::select! {
            biased;
            _ = &mut shutdown => return,
            () = wake.notified() => debug!("reconnect wait cut short"),
            () = tokio::time::sleep(delay) => {}
        }
    }
}
