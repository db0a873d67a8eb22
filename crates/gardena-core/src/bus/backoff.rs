// ── Bounded reconnect loop ──
//
// One immediate attempt, then up to `max_attempts` more, each preceded
// by an exponentially growing pause. Cancellation ends the loop at any
// await point.

use std::fmt::Display;
use std::future::Future;

use rumqttc::{ConnectionError, Event, EventLoop, Packet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::ReconnectPolicy;

/// A connection that can be re-established in place.
pub trait Reconnect {
    type Error: Display;

    /// Try once; resolve when the connection is usable again.
    fn reconnect(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

impl Reconnect for EventLoop {
    type Error = ConnectionError;

    /// Polling after an error makes rumqttc dial again; the connection is
    /// back once the broker acknowledges it.
    fn reconnect(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move {
            loop {
                if let Event::Incoming(Packet::ConnAck(_)) = self.poll().await? {
                    return Ok(());
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// Connected again after `attempts` backoff attempts (0 = immediate).
    Reconnected { attempts: u32 },
    /// Every attempt failed.
    Exhausted { attempts: u32 },
    Cancelled,
}

/// Re-establish `conn` under `policy`.
///
/// `on_attempt` is called with the attempt number before every backoff
/// attempt.
pub async fn reconnect_with_backoff<R, F>(
    conn: &mut R,
    policy: &ReconnectPolicy,
    cancel: &CancellationToken,
    mut on_attempt: F,
) -> ReconnectOutcome
where
    R: Reconnect,
    F: FnMut(u32),
{
    info!("Reconnecting to broker");
    match try_once(conn, cancel).await {
        Some(Ok(())) => {
            info!("Reconnected to broker");
            return ReconnectOutcome::Reconnected { attempts: 0 };
        }
        Some(Err(e)) => warn!(error = %e, "Immediate reconnect failed"),
        None => return ReconnectOutcome::Cancelled,
    }

    for attempt in 1..=policy.max_attempts {
        let delay = policy.delay_for(attempt);
        info!(
            attempt,
            delay_secs = delay.as_secs_f64(),
            "Waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => return ReconnectOutcome::Cancelled,
            () = tokio::time::sleep(delay) => {}
        }

        on_attempt(attempt);
        match try_once(conn, cancel).await {
            Some(Ok(())) => {
                info!(attempt, "Reconnected to broker");
                return ReconnectOutcome::Reconnected { attempts: attempt };
            }
            Some(Err(e)) => warn!(attempt, error = %e, "Reconnect failed"),
            None => return ReconnectOutcome::Cancelled,
        }
    }

    error!(
        attempts = policy.max_attempts,
        "Giving up on the broker, state is no longer published"
    );
    ReconnectOutcome::Exhausted {
        attempts: policy.max_attempts,
    }
}

async fn try_once<R: Reconnect>(
    conn: &mut R,
    cancel: &CancellationToken,
) -> Option<Result<(), R::Error>> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        result = conn.reconnect() => Some(result),
    }
}
