// ── Bridge facade ──
//
// Wires the stream session manager, the shared session context, the
// command router, and the MQTT bus together, and owns their background
// tasks.

use std::sync::Arc;

use gardena_api::SmartClient;
use rumqttc::EventLoop;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bus::{BusBridge, BusState};
use crate::command::{CommandDispatcher, CommandRouter};
use crate::config::BridgeConfig;
use crate::error::CoreError;
use crate::session::SessionContext;
use crate::stream_session::{SessionPhase, StreamSessionManager};

/// The main entry point for the binary.
///
/// Cheaply cloneable via `Arc<BridgeInner>`. [`start`](Self::start)
/// spawns the stream and bus tasks; [`shutdown`](Self::shutdown) cancels
/// and joins them.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    session: SessionContext,
    manager: Arc<StreamSessionManager>,
    bus: Arc<BusBridge>,
    router: CommandRouter,
    eventloop: Mutex<Option<EventLoop>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Bridge {
    /// Build every component. Does NOT connect -- call
    /// [`start()`](Self::start) to begin streaming and publishing.
    pub fn new(config: BridgeConfig) -> Result<Self, CoreError> {
        let client = Arc::new(SmartClient::new(
            config.endpoints.clone(),
            config.credentials.clone(),
            &config.transport,
        )?);
        let session = SessionContext::new();
        let manager = Arc::new(StreamSessionManager::new(
            client.clone(),
            session.clone(),
            config.session.clone(),
        ));
        let router = CommandRouter::new(CommandDispatcher::new(client), session.clone());
        let (bus, eventloop) = BusBridge::new(&config.bus);

        Ok(Self {
            inner: Arc::new(BridgeInner {
                config,
                session,
                manager,
                bus: Arc::new(bus),
                router,
                eventloop: Mutex::new(Some(eventloop)),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &SessionContext {
        &self.inner.session
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the bus network loop, the snapshot publisher, and the stream
    /// session loop.
    pub async fn start(&self) -> Result<(), CoreError> {
        let eventloop = self
            .inner
            .eventloop
            .lock()
            .await
            .take()
            .ok_or_else(|| CoreError::Internal("bridge already started".into()))?;

        let inner = &self.inner;
        let mut handles = inner.task_handles.lock().await;

        handles.push(tokio::spawn(inner.bus.clone().run_network(
            eventloop,
            inner.router.clone(),
            inner.cancel.clone(),
        )));
        handles.push(tokio::spawn(
            inner
                .bus
                .clone()
                .run_publisher(inner.manager.snapshots(), inner.cancel.clone()),
        ));

        let manager = inner.manager.clone();
        let cancel = inner.cancel.clone();
        handles.push(tokio::spawn(async move { manager.run(cancel).await }));

        info!(
            broker = %inner.config.bus.host,
            port = inner.config.bus.port,
            namespace = %inner.config.bus.namespace,
            "Bridge started"
        );
        Ok(())
    }

    /// Cancel every task and wait for them to release their connections.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("Bridge stopped");
    }

    /// Token that stops the bridge when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    // ── State observation ────────────────────────────────────────────

    pub fn session_phase(&self) -> watch::Receiver<SessionPhase> {
        self.inner.manager.phase()
    }

    pub fn bus_state(&self) -> watch::Receiver<BusState> {
        self.inner.bus.state()
    }
}
