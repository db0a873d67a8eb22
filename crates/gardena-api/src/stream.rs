//! WebSocket push stream with an application-level heartbeat.
//!
//! Connects to the URL handed out by `POST /v1/websocket` and yields raw
//! text frames one at a time. A ping is sent every
//! [`Heartbeat::interval`]; if the matching pong does not arrive within
//! [`Heartbeat::timeout`] the stream fails with [`Error::PingTimeout`].
//! The stream never reconnects on its own -- the session manager in
//! `gardena-core` owns restart policy.
//!
//! # Example
//!
//! ```rust,ignore
//! use gardena_api::stream::{Heartbeat, PushStream};
//!
//! let mut stream = PushStream::connect(&url, Heartbeat::default(), false).await?;
//! while let Some(frame) = stream.next_frame().await? {
//!     println!("{frame}");
//! }
//! ```

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;

/// Tracing target for raw frame logging when wire tracing is enabled.
pub const WIRE_TARGET: &str = "gardena_api::wire";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Heartbeat ────────────────────────────────────────────────────────

/// Liveness check for the push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    /// Time between pings. Default: 150s.
    pub interval: Duration,
    /// How long to wait for the pong before giving up. Default: 1s.
    pub timeout: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(150),
            timeout: Duration::from_secs(1),
        }
    }
}

// ── PushStream ───────────────────────────────────────────────────────

/// One open push-stream connection.
pub struct PushStream {
    sink: SplitSink<WsStream, Message>,
    source: SplitStream<WsStream>,
    heartbeat: Heartbeat,
    ping_timer: Interval,
    pong_deadline: Option<Instant>,
    trace_wire: bool,
}

impl PushStream {
    /// Open the WebSocket connection.
    ///
    /// With `trace_wire` set, every frame in either direction is logged at
    /// `info` under [`WIRE_TARGET`].
    pub async fn connect(url: &Url, heartbeat: Heartbeat, trace_wire: bool) -> Result<Self, Error> {
        tracing::info!(host = url.host_str().unwrap_or(""), "Connecting to push stream");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        tracing::info!("Push stream connected");

        let (sink, source) = ws_stream.split();
        let mut ping_timer =
            tokio::time::interval_at(Instant::now() + heartbeat.interval, heartbeat.interval);
        ping_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Ok(Self {
            sink,
            source,
            heartbeat,
            ping_timer,
            pong_deadline: None,
            trace_wire,
        })
    }

    /// Wait for the next text frame.
    ///
    /// Returns `Ok(None)` when the server closes the connection cleanly or
    /// the stream ends, and an error on transport failure or a missed pong.
    /// Pings are sent from inside this call, so the caller must keep
    /// polling it for the heartbeat to run.
    pub async fn next_frame(&mut self) -> Result<Option<String>, Error> {
        loop {
            let deadline = self.pong_deadline;

            tokio::select! {
                biased;
                () = wait_for(deadline) => {
                    let timeout_ms =
                        u64::try_from(self.heartbeat.timeout.as_millis()).unwrap_or(u64::MAX);
                    tracing::warn!(timeout_ms, "Push stream pong overdue");
                    return Err(Error::PingTimeout { timeout_ms });
                }
                _ = self.ping_timer.tick() => {
                    self.write(Message::Ping(Default::default())).await?;
                    if self.pong_deadline.is_none() {
                        self.pong_deadline = Some(Instant::now() + self.heartbeat.timeout);
                    }
                }
                frame = self.source.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            self.log_frame("in", &text);
                            return Ok(Some(text.to_string()));
                        }
                        Some(Ok(Message::Pong(_))) => {
                            tracing::trace!("Push stream pong");
                            self.pong_deadline = None;
                        }
                        Some(Ok(Message::Ping(_))) => {
                            // tungstenite queues the pong reply itself
                            tracing::trace!("Push stream ping from server");
                        }
                        Some(Ok(Message::Close(frame))) => {
                            if let Some(ref cf) = frame {
                                tracing::info!(
                                    code = %cf.code,
                                    reason = %cf.reason,
                                    "Push stream close frame received"
                                );
                            } else {
                                tracing::info!("Push stream close frame received (no payload)");
                            }
                            return Ok(None);
                        }
                        Some(Ok(Message::Binary(data))) => {
                            tracing::debug!(len = data.len(), "Ignoring binary push frame");
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(e)) => {
                            return Err(Error::WebSocketConnect(e.to_string()));
                        }
                        None => {
                            tracing::info!("Push stream ended");
                            return Ok(None);
                        }
                    }
                }
            }
        }
    }

    /// Send a close frame and drop the connection.
    pub async fn close(mut self) {
        if let Err(e) = self.sink.send(Message::Close(None)).await {
            tracing::debug!(error = %e, "Push stream close frame not delivered");
        }
        let _ = self.sink.close().await;
    }

    async fn write(&mut self, message: Message) -> Result<(), Error> {
        if self.trace_wire {
            tracing::info!(target: WIRE_TARGET, direction = "out", frame = ?message);
        }
        self.sink
            .send(message)
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))
    }

    fn log_frame(&self, direction: &str, text: &str) {
        if self.trace_wire {
            tracing::info!(target: WIRE_TARGET, direction, frame = %text);
        } else {
            tracing::trace!(direction, frame = %text, "Push frame");
        }
    }
}

/// Sleep until `deadline`, or forever when there is none.
async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

// ── Tests ────────────────────────────────────────────────────────────
