//! Real-time channel adapter with a tokio mpsc command/notification pattern.
//!
//! The adapter owns the single connection and runs it in a dedicated tokio
//! task. The rest of the client only sees typed [`ChannelNotification`]s and
//! talks to the task through a [`ChannelHandle`]; it never touches the raw
//! connection.
//!
//! Lifecycle: `disconnected → connecting → connected`, back to `connecting`
//! whenever the connection drops, with exponential backoff between failed
//! connect attempts.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use palaver_shared::constants::{
    backoff_delay_ms, CHANNEL_QUEUE_CAPACITY, RETRY_BASE_DELAY_MS, RETRY_MAX_DELAY_MS,
};
use palaver_shared::protocol::{decode_frame, encode_frame, InboundEvent, JoinPayload, OutboundEvent};
use palaver_shared::{ConnectionState, SyncError};

use crate::transport::{Connection, Transport};

// ---------------------------------------------------------------------------
// Command / notification types
// ---------------------------------------------------------------------------

/// Commands sent *into* the channel task.
#[derive(Debug)]
pub enum ChannelCommand {
    /// Send an event to the backend.
    Emit(OutboundEvent),
    /// Drop the current connection (if any) and connect again now.
    Reconnect,
    /// Close the connection and stop the task.
    Shutdown,
}

/// Notifications sent *from* the channel task to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelNotification {
    /// The connection moved to a new lifecycle state.
    State(ConnectionState),
    /// An event arrived from the backend or a peer.
    Event(InboundEvent),
}

/// Configuration for spawning the channel adapter.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Identity announced with a `join` event after every connect.
    pub join: JoinPayload,
    /// First reconnect delay after a failed connect.
    pub reconnect_base: Duration,
    /// Upper bound of the reconnect delay.
    pub reconnect_max: Duration,
}

impl ChannelConfig {
    pub fn new(join: JoinPayload) -> Self {
        Self {
            join,
            reconnect_base: Duration::from_millis(RETRY_BASE_DELAY_MS),
            reconnect_max: Duration::from_millis(RETRY_MAX_DELAY_MS),
        }
    }

    fn reconnect_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(backoff_delay_ms(
            attempt,
            self.reconnect_base.as_millis() as u64,
            self.reconnect_max.as_millis() as u64,
        ))
    }
}

/// Cheap, cloneable handle to the channel task.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    cmd_tx: mpsc::Sender<ChannelCommand>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl ChannelHandle {
    /// A handle with no adapter behind it: permanently disconnected, every
    /// emission fails with [`SyncError::ChannelUnavailable`].
    pub fn detached() -> Self {
        let (cmd_tx, _cmd_rx) = mpsc::channel(1);
        let (_state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        Self { cmd_tx, state_rx }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Queue an event for emission.
    ///
    /// Fails fast with [`SyncError::ChannelUnavailable`] when the channel is
    /// not connected; the event is dropped, not buffered.
    pub fn emit(&self, event: OutboundEvent) -> Result<(), SyncError> {
        let state = self.state();
        if !state.is_connected() {
            debug!(event = event.name(), state = ?state, "Channel not connected, dropping emission");
            return Err(SyncError::ChannelUnavailable);
        }

        let name = event.name();
        self.cmd_tx
            .try_send(ChannelCommand::Emit(event))
            .map_err(|e| {
                warn!(event = name, error = %e, "Channel command queue rejected emission");
                SyncError::ChannelUnavailable
            })
    }

    /// Ask the adapter to reconnect immediately.
    pub fn reconnect(&self) {
        if self.cmd_tx.try_send(ChannelCommand::Reconnect).is_err() {
            debug!("Channel task gone, reconnect ignored");
        }
    }

    /// Stop the adapter task.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(ChannelCommand::Shutdown).await;
    }
}

/// Spawn the channel adapter in a background tokio task.
///
/// Returns the handle used to emit events and the receiver of
/// notifications. The task stops when [`ChannelHandle::shutdown`] is called,
/// when every handle is dropped, or when the notification receiver is
/// dropped.
pub fn spawn_channel<T: Transport>(
    transport: T,
    config: ChannelConfig,
) -> (ChannelHandle, mpsc::Receiver<ChannelNotification>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_QUEUE_CAPACITY);
    let (notif_tx, notif_rx) = mpsc::channel(CHANNEL_QUEUE_CAPACITY);
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

    let task = ChannelTask {
        config,
        cmd_rx,
        notif_tx,
        state_tx,
    };
    tokio::spawn(task.run(transport));

    (ChannelHandle { cmd_tx, state_rx }, notif_rx)
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Why a connected session ended.
enum SessionEnd {
    Dropped,
    Reconnect,
    Shutdown,
}

struct ChannelTask {
    config: ChannelConfig,
    cmd_rx: mpsc::Receiver<ChannelCommand>,
    notif_tx: mpsc::Sender<ChannelNotification>,
    state_tx: watch::Sender<ConnectionState>,
}

impl ChannelTask {
    async fn run<T: Transport>(mut self, transport: T) {
        let mut attempt: u32 = 0;

        loop {
            if !self.publish_state(ConnectionState::Connecting).await {
                break;
            }

            match transport.connect().await {
                Ok(conn) => {
                    attempt = 0;
                    info!(user = %self.config.join.user_id, "Channel connected");
                    if !self.publish_state(ConnectionState::Connected).await {
                        break;
                    }

                    match self.serve(conn).await {
                        SessionEnd::Dropped => warn!("Channel connection dropped, reconnecting"),
                        SessionEnd::Reconnect => info!("Channel reconnect requested"),
                        SessionEnd::Shutdown => break,
                    }
                }
                Err(e) => {
                    let delay = self.config.reconnect_delay(attempt);
                    attempt = attempt.saturating_add(1);
                    warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Channel connect failed"
                    );
                    if !self.wait_before_retry(delay).await {
                        break;
                    }
                }
            }
        }

        self.state_tx.send_replace(ConnectionState::Disconnected);
        let _ = self
            .notif_tx
            .send(ChannelNotification::State(ConnectionState::Disconnected))
            .await;
        info!("Channel task stopped");
    }

    /// Publish a state change. Returns `false` once nobody listens anymore.
    async fn publish_state(&self, state: ConnectionState) -> bool {
        self.state_tx.send_replace(state);
        self.notif_tx
            .send(ChannelNotification::State(state))
            .await
            .is_ok()
    }

    /// Drive one open connection until it ends.
    async fn serve(&mut self, mut conn: Connection) -> SessionEnd {
        if send_event(&conn, &OutboundEvent::Join(self.config.join.clone()))
            .await
            .is_err()
        {
            return SessionEnd::Dropped;
        }

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(ChannelCommand::Emit(event)) => {
                        let name = event.name();
                        if send_event(&conn, &event).await.is_err() {
                            warn!(event = name, "Emission lost, connection closed");
                            return SessionEnd::Dropped;
                        }
                        debug!(event = name, "Emitted event");
                    }
                    Some(ChannelCommand::Reconnect) => return SessionEnd::Reconnect,
                    Some(ChannelCommand::Shutdown) | None => return SessionEnd::Shutdown,
                },

                frame = conn.inbound.recv() => match frame {
                    Some(frame) => match decode_frame::<InboundEvent>(&frame) {
                        Ok(event) => {
                            debug!(event = event.name(), "Received event");
                            if self.notif_tx.send(ChannelNotification::Event(event)).await.is_err() {
                                return SessionEnd::Shutdown;
                            }
                        }
                        Err(e) => warn!(error = %e, "Skipping undecodable frame"),
                    },
                    None => return SessionEnd::Dropped,
                },
            }
        }
    }

    /// Sleep out a reconnect delay while still serving commands. Returns
    /// `false` if the task should stop.
    async fn wait_before_retry(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(ChannelCommand::Emit(event)) => {
                        warn!(event = event.name(), "Channel not connected, dropping emission");
                    }
                    Some(ChannelCommand::Reconnect) => return true,
                    Some(ChannelCommand::Shutdown) | None => return false,
                },
            }
        }
    }
}

async fn send_event(conn: &Connection, event: &OutboundEvent) -> Result<(), SyncError> {
    let frame = encode_frame(event)?;
    conn.outbound
        .send(frame)
        .await
        .map_err(|_| SyncError::ChannelUnavailable)
}
