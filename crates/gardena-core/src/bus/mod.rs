//! MQTT side of the bridge.
//!
//! [`BusBridge`] owns the broker connection. It republishes snapshot
//! fields as retained messages, subscribes to the command topic of the
//! mower it has seen, and hands inbound commands to the
//! [`CommandRouter`]. The network loop reconnects with bounded
//! exponential backoff and, once that is exhausted, leaves the bridge
//! running without publishing.
//!
//! # Example
//!
//! ```rust,ignore
//! let (bus, eventloop) = BusBridge::new(&config.bus);
//! let bus = Arc::new(bus);
//! tokio::spawn(bus.clone().run_network(eventloop, router, cancel.clone()));
//! tokio::spawn(bus.clone().run_publisher(snapshot_rx, cancel.clone()));
//! ```

pub mod backoff;
pub mod topic;

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, Publish, QoS};
use secrecy::ExposeSecret;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{CommandRouter, MowerCommand};
use crate::config::{BusConfig, ReconnectPolicy};
use crate::error::CoreError;
use crate::model::DeviceSnapshot;

pub use backoff::{Reconnect, ReconnectOutcome, reconnect_with_backoff};
pub use topic::{TopicError, TopicScheme};

const REQUEST_CHANNEL_SIZE: usize = 64;
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

// ── BusState ─────────────────────────────────────────────────────────

/// Broker connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Reconnect attempts are exhausted; nothing is published any more.
    Degraded,
    Stopped,
}

// ── Messages ─────────────────────────────────────────────────────────

/// The retained `(topic, payload)` pairs for `snapshot`, or `None` while
/// its serial is unknown.
pub fn snapshot_messages(
    topics: &TopicScheme,
    snapshot: &DeviceSnapshot,
) -> Option<Vec<(String, String)>> {
    let serial = snapshot.serial?;
    Some(vec![
        (
            topics.state(serial, "battery"),
            snapshot.battery_level.to_string(),
        ),
        (
            topics.state(serial, "battery_state"),
            snapshot.battery_state.name().to_owned(),
        ),
        (
            topics.state(serial, "activity"),
            snapshot.activity.name().to_owned(),
        ),
        (
            topics.state(serial, "last_error"),
            snapshot.last_error_code.name().to_owned(),
        ),
        (
            topics.state(serial, "operating_hours"),
            snapshot.operating_hours.to_string(),
        ),
    ])
}

// ── BusBridge ────────────────────────────────────────────────────────

pub struct BusBridge {
    client: AsyncClient,
    topics: TopicScheme,
    reconnect: ReconnectPolicy,
    /// Command topic currently subscribed to.
    subscription: ArcSwapOption<String>,
    state: watch::Sender<BusState>,
}

impl BusBridge {
    /// Build the client. Nothing is sent until the returned event loop is
    /// polled by [`run_network`](Self::run_network).
    pub fn new(config: &BusConfig) -> (Self, EventLoop) {
        let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(config.keep_alive);
        options.set_clean_session(true);
        if let Some(creds) = &config.credentials {
            options.set_credentials(creds.username.clone(), creds.password.expose_secret());
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_SIZE);
        let (state, _) = watch::channel(BusState::Connecting);

        let bridge = Self {
            client,
            topics: TopicScheme::new(config.namespace.clone()),
            reconnect: config.reconnect,
            subscription: ArcSwapOption::empty(),
            state,
        };
        (bridge, eventloop)
    }

    /// Subscribe to connection state changes.
    pub fn state(&self) -> watch::Receiver<BusState> {
        self.state.subscribe()
    }

    pub fn subscription(&self) -> Option<String> {
        self.subscription.load_full().map(|t| String::clone(&t))
    }

    // ── Outbound ─────────────────────────────────────────────────────

    /// Publish the five state fields of `snapshot` as retained messages.
    ///
    /// Returns `Ok(false)` without touching the broker while the serial
    /// is unknown or the bus is degraded. The first publish for a serial
    /// also subscribes to its command topic.
    pub fn publish_snapshot(&self, snapshot: &DeviceSnapshot) -> Result<bool, CoreError> {
        if matches!(*self.state.borrow(), BusState::Degraded | BusState::Stopped) {
            debug!("Bus unavailable, skipping publish");
            return Ok(false);
        }
        let (Some(serial), Some(messages)) =
            (snapshot.serial, snapshot_messages(&self.topics, snapshot))
        else {
            return Ok(false);
        };

        self.ensure_subscribed(serial)?;
        for (topic, payload) in messages {
            debug!(topic = %topic, payload = %payload, "Publishing");
            self.client
                .try_publish(topic, QoS::AtLeastOnce, true, payload)?;
        }
        Ok(true)
    }

    fn ensure_subscribed(&self, serial: u64) -> Result<(), CoreError> {
        let topic = self.topics.command(serial);
        let current = self.subscription.load_full();
        if current.as_deref() == Some(&topic) {
            return Ok(());
        }

        if let Some(old) = current {
            info!(topic = %old, "Leaving command topic of previous device");
            if let Err(e) = self.client.try_unsubscribe(old.as_str()) {
                warn!(topic = %old, error = %e, "Unsubscribe failed");
            }
        }

        info!(topic = %topic, "Subscribing to command topic");
        self.client.try_subscribe(topic.clone(), QoS::AtLeastOnce)?;
        self.subscription.store(Some(Arc::new(topic)));
        Ok(())
    }

    fn resubscribe(&self) {
        if let Some(topic) = self.subscription.load_full() {
            info!(topic = %topic, "Restoring command subscription");
            if let Err(e) = self.client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                warn!(topic = %topic, error = %e, "Resubscribe failed");
            }
        }
    }

    // ── Inbound ──────────────────────────────────────────────────────

    /// Route one inbound publish and return the spawned command task.
    /// Anything that is not a fresh, well-formed command for a known topic
    /// is dropped. Retained commands would replay on every subscribe.
    fn handle_publish(&self, publish: &Publish, router: &CommandRouter) -> Option<JoinHandle<()>> {
        let serial = match self.topics.parse_command(&publish.topic) {
            Ok(serial) => serial,
            Err(e) => {
                warn!(topic = %publish.topic, error = %e, "Ignoring message on unexpected topic");
                return None;
            }
        };

        if publish.retain {
            debug!(
                serial,
                payload = %String::from_utf8_lossy(&publish.payload),
                "Ignoring retained command"
            );
            return None;
        }

        match MowerCommand::from_payload(&publish.payload) {
            Some(command) => Some(router.spawn(serial, command)),
            None => {
                debug!(
                    serial,
                    payload = %String::from_utf8_lossy(&publish.payload),
                    "Ignoring unrecognized command payload"
                );
                None
            }
        }
    }

    // ── Background tasks ─────────────────────────────────────────────

    /// Drive the MQTT network loop until `cancel` fires.
    pub async fn run_network(
        self: Arc<Self>,
        mut eventloop: EventLoop,
        router: CommandRouter,
        cancel: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected to broker");
                    self.set_state(BusState::Connected);
                    self.resubscribe();
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    // the command task runs detached
                    drop(self.handle_publish(&publish, &router));
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    debug!(pkid = ack.pkid, "Subscription acknowledged");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Broker connection lost");
                    self.set_state(BusState::Reconnecting { attempt: 0 });

                    let outcome = reconnect_with_backoff(
                        &mut eventloop,
                        &self.reconnect,
                        &cancel,
                        |attempt| self.set_state(BusState::Reconnecting { attempt }),
                    )
                    .await;

                    match outcome {
                        ReconnectOutcome::Reconnected { .. } => {
                            self.set_state(BusState::Connected);
                            self.resubscribe();
                        }
                        ReconnectOutcome::Exhausted { .. } => {
                            self.set_state(BusState::Degraded);
                            cancel.cancelled().await;
                            break;
                        }
                        ReconnectOutcome::Cancelled => break,
                    }
                }
            }
        }

        self.shutdown(&mut eventloop).await;
    }

    /// Publish the latest snapshot whenever it changes or the broker
    /// connection comes back.
    pub async fn run_publisher(
        self: Arc<Self>,
        mut snapshots: watch::Receiver<Option<DeviceSnapshot>>,
        cancel: CancellationToken,
    ) {
        let mut state = self.state.subscribe();
        // evaluate once up front in case the broker connected first
        state.mark_changed();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                changed = snapshots.changed() => if changed.is_err() { break },
                changed = state.changed() => if changed.is_err() { break },
            }

            let snapshot = snapshots.borrow_and_update().clone();
            if *state.borrow_and_update() != BusState::Connected {
                continue;
            }
            if let Some(snapshot) = snapshot {
                if let Err(e) = self.publish_snapshot(&snapshot) {
                    warn!(error = %e, "Publishing snapshot failed");
                }
            }
        }
    }

    async fn shutdown(&self, eventloop: &mut EventLoop) {
        let was_connected = *self.state.borrow() == BusState::Connected;
        if was_connected && self.client.try_disconnect().is_ok() {
            // let the event loop flush the DISCONNECT packet
            let _ = tokio::time::timeout(DISCONNECT_GRACE, async {
                loop {
                    match eventloop.poll().await {
                        Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
            })
            .await;
        }
        self.set_state(BusState::Stopped);
        info!("Broker connection closed");
    }

    fn set_state(&self, next: BusState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(?previous, ?next, "Bus state changed");
        }
    }
}
