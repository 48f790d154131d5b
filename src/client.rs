//! Async client for the Rocket Race typing-race protocol.
//!
//! [`RaceClient`] is a thin handle that communicates with a background
//! transport loop task via an unbounded MPSC channel. Events are emitted on a
//! bounded channel ([`tokio::sync::mpsc::Receiver<RaceEvent>`]) returned from
//! [`RaceClient::start`]. The loop owns the one inbound subscription for the
//! session: it is registered when the loop starts and torn down exactly once
//! when the loop exits, no matter how often the UI re-renders.
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = connect_somehow().await;
//! let config = RaceConfig::new("a1b2c3");
//! let (client, mut events) = RaceClient::start(transport, config);
//!
//! client.join_race(JoinRaceParams::new("Alice", "blue")).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         RaceEvent::PhaseChanged { phase } => { /* route change */ }
//!         RaceEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

use crate::error::{RaceClientError, Result};
use crate::event::RaceEvent;
use crate::phase::Phase;
use crate::protocol::{ClientMessage, JoinRacePayload, RoomId, ServerMessage};
use crate::ranking::{standings, RankingMode, Standing};
use crate::session::{Controls, Session};
use crate::targeting::{validate_power_target, DragResult};
use crate::transport::Transport;

/// Event channel capacity used when the config does not override it.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long `shutdown` waits for the loop before aborting its task.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`RaceClient`] connection.
///
/// The only required field is the room id; all others have sensible defaults.
///
/// # Example
///
/// ```
/// use rocket_race_client::client::RaceConfig;
///
/// let config = RaceConfig::new("a1b2c3");
/// assert_eq!(config.room_id, "a1b2c3");
/// ```
#[derive(Debug, Clone)]
pub struct RaceConfig {
    /// Room routing key, as carried in the room's URL.
    pub room_id: RoomId,
    /// Bounded event channel capacity.
    ///
    /// A consumer that falls behind the broadcast rate loses events (with a
    /// warning logged) rather than stalling the transport loop. The terminal
    /// `Disconnected` event is exempt and always arrives.
    ///
    /// Defaults to 256; values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Grace period for [`RaceClient::shutdown`]: the transport loop gets
    /// this long to close the transport and emit `Disconnected` before its
    /// task is aborted.
    ///
    /// Defaults to 1 second.
    pub shutdown_timeout: Duration,
}

impl RaceConfig {
    /// Create a new configuration for the given room with default values.
    pub fn new(room_id: impl Into<RoomId>) -> Self {
        Self {
            room_id: room_id.into(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Override the event channel capacity (clamped to at least 1).
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Override the shutdown grace period.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

// ── JoinRaceParams ──────────────────────────────────────────────────

/// Display identity chosen on the avatar-selection screen.
#[derive(Debug, Clone, Default)]
pub struct JoinRaceParams {
    /// Display name; also the drop-target id other players see.
    pub user_name: String,
    /// Rocket color key.
    pub color: String,
}

impl JoinRaceParams {
    pub fn new(user_name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            color: color.into(),
        }
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// State shared by the handle and the loop task.
///
/// The session lives behind a single mutex so every derived read reflects one
/// broadcast snapshot; the loop writes while holding the lock, handle-side
/// reads clone under the same lock.
struct ClientState {
    connected: AtomicBool,
    session: Mutex<Session>,
}

impl ClientState {
    fn new(room_id: RoomId) -> Self {
        Self {
            connected: AtomicBool::new(true),
            session: Mutex::new(Session::new(room_id)),
        }
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Async client handle for one race session.
///
/// Created via [`RaceClient::start`], which spawns a background transport loop
/// and returns this handle together with an event receiver.
///
/// The outbound intent methods (`sync_start`, `apply_power`, `play_again`,
/// `next_round`, `send_to_final`) serialize a [`ClientMessage`] and queue it
/// to the transport loop. They return immediately once queued — no retry and
/// no acknowledgment beyond the eventual server broadcast. Host-only intents
/// are mirrored client-side by [`RaceClient::controls`]; the dispatcher does
/// not re-check them because the server is the final authority and rejects
/// out-of-turn intents.
pub struct RaceClient {
    /// Outbound intents flow to the loop through here.
    cmd_tx: mpsc::UnboundedSender<ClientMessage>,
    /// Session and connection flag, written by the loop.
    state: Arc<ClientState>,
    /// The spawned transport loop, taken on shutdown.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Fired once to request a graceful loop exit.
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl RaceClient {
    /// Spawn the transport loop on an already-connected `transport` and
    /// return the handle plus the event receiver.
    ///
    /// The receiver yields [`RaceEvent`]s until the transport closes or the
    /// client shuts down; `Disconnected` is always the last one.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        config: RaceConfig,
    ) -> (Self, mpsc::Receiver<RaceEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientMessage>();
        // tokio channels panic on a zero capacity.
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<RaceEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let state = Arc::new(ClientState::new(config.room_id));
        let loop_state = Arc::clone(&state);

        let task = tokio::spawn(transport_loop(
            transport,
            cmd_rx,
            event_tx,
            loop_state,
            shutdown_rx,
        ));

        let client = Self {
            cmd_tx,
            state,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (client, event_rx)
    }

    // ── Outbound intents ────────────────────────────────────────────

    /// Join the room with the chosen display identity and move the local
    /// phase from avatar selection to the lobby.
    ///
    /// # Errors
    ///
    /// Returns [`RaceClientError::NotConnected`] if the transport has closed.
    pub async fn join_race(&self, params: JoinRaceParams) -> Result<()> {
        let room_id = {
            let mut session = self.state.session.lock().await;
            session.enter_lobby();
            session.room_id().clone()
        };
        self.send(ClientMessage::JoinRace(JoinRacePayload {
            room_id,
            user_name: params.user_name,
            color: params.color,
        }))
    }

    /// Toggle lobby readiness; the server aggregates and rebroadcasts.
    ///
    /// # Errors
    ///
    /// Returns [`RaceClientError::NotConnected`] if the transport has closed.
    pub fn set_ready(&self) -> Result<()> {
        self.send(ClientMessage::PlayerReady)
    }

    /// Host: synchronize the race start for every player in the room.
    ///
    /// Gate this on [`Controls::start_race`] in the UI; an out-of-turn emission
    /// is ignored by the server.
    ///
    /// # Errors
    ///
    /// Returns [`RaceClientError::NotConnected`] if the transport has closed.
    pub fn sync_start(&self) -> Result<()> {
        self.send(ClientMessage::SyncStart)
    }

    /// Validate a power-up drag interaction and emit `applyPower` if it names
    /// a legal target.
    ///
    /// Cancelled drops, drops back into the own pool, self-targets and cards
    /// not held by the local player are silently dropped — that is a normal
    /// interaction outcome, not an error. Returns whether an intent was
    /// emitted.
    ///
    /// # Errors
    ///
    /// Returns [`RaceClientError::NotConnected`] if a valid intent could not
    /// be queued because the transport has closed.
    pub async fn apply_power(&self, result: &DragResult) -> Result<bool> {
        let payload = {
            let session = self.state.session.lock().await;
            let Some(actor) = session.local_player() else {
                debug!("apply_power before local identity resolved, dropping");
                return Ok(false);
            };
            validate_power_target(result, actor)
        };
        match payload {
            Some(payload) => {
                self.send(ClientMessage::ApplyPower(payload))?;
                Ok(true)
            }
            None => {
                debug!(
                    draggable = %result.draggable_id,
                    "power-up drop had no valid target, dropping intent"
                );
                Ok(false)
            }
        }
    }

    /// Host: restart the race after results (single-race mode).
    ///
    /// # Errors
    ///
    /// Returns [`RaceClientError::NotConnected`] if the transport has closed.
    pub fn play_again(&self) -> Result<()> {
        self.send(ClientMessage::PlayAgain)
    }

    /// Host: advance the room to the next round's lobby.
    ///
    /// # Errors
    ///
    /// Returns [`RaceClientError::NotConnected`] if the transport has closed.
    pub fn next_round(&self) -> Result<()> {
        self.send(ClientMessage::NextRound)
    }

    /// Host: move the room to aggregate final standings.
    ///
    /// # Errors
    ///
    /// Returns [`RaceClientError::NotConnected`] if the transport has closed.
    pub fn send_to_final(&self) -> Result<()> {
        self.send(ClientMessage::SendToFinal)
    }

    /// Close the transport and stop the loop task.
    ///
    /// Once the loop has exited the event receiver drains its remaining
    /// events and then yields `None`.
    pub async fn shutdown(&mut self) {
        debug!("RaceClient: shutdown requested");

        // Request a graceful loop exit; a second call finds the slot empty.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Wait out the grace period, then abort rather than leave a detached
        // task running.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                }
            }
        }

        self.state.connected.store(false, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Whether the transport is believed to be up. Flips to `false` on any
    /// disconnect path, including shutdown.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    /// A consistent snapshot of the whole session state.
    pub async fn session(&self) -> Session {
        self.state.session.lock().await.clone()
    }

    /// The current game phase.
    pub async fn phase(&self) -> Phase {
        self.state.session.lock().await.phase()
    }

    /// Per-control enablement of the host-only buttons, for the UI to mirror.
    pub async fn controls(&self) -> Controls {
        self.state.session.lock().await.controls()
    }

    /// Ordered standings for the current roster: per-round WPM order, or
    /// WPM-average order once the session moved to final standings.
    pub async fn standings(&self) -> Vec<Standing> {
        let session = self.state.session.lock().await;
        let mode = if session.final_standings() {
            RankingMode::Final
        } else {
            RankingMode::Round
        };
        standings(session.players(), mode)
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Hand an intent to the transport loop for serialization and send.
    fn send(&self, msg: ClientMessage) -> Result<()> {
        if !self.state.connected.load(Ordering::Acquire) {
            return Err(RaceClientError::NotConnected);
        }
        self.cmd_tx
            .send(msg)
            .map_err(|_| RaceClientError::NotConnected)
    }
}

impl std::fmt::Debug for RaceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaceClient")
            .field("connected", &self.is_connected())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for RaceClient {
    fn drop(&mut self) {
        // No executor context inside a synchronous `Drop`, so the graceful
        // path (which awaits `transport.close()`) is unreachable here.
        // Aborting the task drops the loop future immediately instead; the
        // shutdown oneshot stays unsent on purpose.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Transport loop ──────────────────────────────────────────────────

/// The background task: multiplexes outbound intents, the shutdown signal
/// and inbound broadcasts over `tokio::select!`.
///
/// This loop is the session's one and only inbound subscription: each server
/// broadcast is applied to the session store exactly once, in delivery order,
/// and the subscription ends exactly once when the loop exits — on shutdown,
/// on a dropped handle, on a transport error, or when the server closes the
/// connection.
async fn transport_loop(
    mut transport: impl Transport,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientMessage>,
    event_tx: mpsc::Sender<RaceEvent>,
    state: Arc<ClientState>,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    debug!("transport loop started");

    // Connected is synthetic: it precedes any server traffic.
    emit_event(&event_tx, RaceEvent::Connected).await;

    loop {
        tokio::select! {
            // Branch 1: outgoing intent from the client handle
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(msg) => {
                        debug!("sending client message: {:?}", std::mem::discriminant(&msg));
                        match serde_json::to_string(&msg) {
                            Ok(json) => {
                                if let Err(e) = transport.send(json).await {
                                    error!("transport send error: {e}");
                                    emit_disconnected(
                                        &event_tx,
                                        &state,
                                        Some(format!("transport send error: {e}")),
                                    ).await;
                                    break;
                                }
                            }
                            Err(e) => {
                                error!("failed to serialize ClientMessage: {e}");
                                // A message that fails to serialize is a bug
                                // in this crate, not a dead connection.
                            }
                        }
                    }
                    // Every handle is gone; wind the connection down.
                    None => {
                        debug!("command channel closed, shutting down transport loop");
                        let _ = transport.close().await;
                        emit_disconnected(&event_tx, &state, Some("client shut down".into())).await;
                        break;
                    }
                }
            }

            // Branch 2: graceful shutdown requested by the handle
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                emit_disconnected(&event_tx, &state, Some("client shut down".into())).await;
                break;
            }

            // Branch 3: incoming broadcast from the server
            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(server_msg) => {
                                // Apply under the session lock so no reader
                                // observes a torn update, then forward the
                                // resulting event to the consumer.
                                let event = {
                                    let mut session = state.session.lock().await;
                                    session.apply(&server_msg)
                                };
                                emit_event(&event_tx, event).await;
                            }
                            Err(e) => {
                                warn!("failed to deserialize server message: {e} — raw: {text}");
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        emit_disconnected(
                            &event_tx,
                            &state,
                            Some(format!("transport receive error: {e}")),
                        ).await;
                        break;
                    }
                    // Server ended the stream.
                    None => {
                        debug!("transport closed by server");
                        emit_disconnected(&event_tx, &state, None).await;
                        break;
                    }
                }
            }
        }
    }

    debug!("transport loop exited");
}

/// Forward an event to the consumer without ever blocking the loop: a full
/// channel drops the event with a warning.
async fn emit_event(event_tx: &mpsc::Sender<RaceEvent>, event: RaceEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(
                "event channel full, dropping event: {:?}",
                std::mem::discriminant(&dropped)
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Mark the state disconnected and deliver the terminal
/// [`Disconnected`](RaceEvent::Disconnected) event.
///
/// This one uses an awaiting `send` rather than `try_send`: it is the last
/// event on the channel and must not fall to backpressure.
async fn emit_disconnected(
    event_tx: &mpsc::Sender<RaceEvent>,
    state: &ClientState,
    reason: Option<String>,
) {
    state.connected.store(false, Ordering::Release);
    let event = RaceEvent::Disconnected { reason };
    if event_tx.send(event).await.is_err() {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::{GameData, GameStatePayload, Player, PowerUp};
    use crate::targeting::OWN_POOL_ID;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    // ── Mock transport ──────────────────────────────────────────────

    /// Scripted transport: replays a fixed broadcast sequence and captures
    /// everything the client sends.
    struct MockTransport {
        /// What `recv()` yields, in order; a `None` entry is a clean close.
        incoming: VecDeque<Option<std::result::Result<String, RaceClientError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(
            incoming: Vec<Option<std::result::Result<String, RaceClientError>>>,
        ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let transport = Self {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
            };
            (transport, sent, closed)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), RaceClientError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, RaceClientError>> {
            if let Some(item) = self.incoming.pop_front() {
                item
            } else {
                // Script exhausted: park until the test shuts down.
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), RaceClientError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn player(user_id: &str, user_name: &str, is_host: bool, is_ready: bool) -> Player {
        Player {
            user_id: user_id.into(),
            user_name: user_name.into(),
            color: "blue".into(),
            is_host,
            is_ready,
            game_data: None,
            user_paragraph: "the quick brown fox".into(),
            available_pus: vec![],
            applied_pus: vec![],
            rank: 0,
            wpm_average: None,
        }
    }

    fn with_card(mut p: Player, id: &str) -> Player {
        p.available_pus.push(PowerUp {
            id: id.into(),
            power_up: "freeze".into(),
        });
        p
    }

    fn with_wpm(mut p: Player, wpm: f64) -> Player {
        p.game_data = Some(GameData {
            wpm,
            accuracy: 98.0,
            finish_time: 35.0,
        });
        p
    }

    fn json(msg: &ServerMessage) -> Option<std::result::Result<String, RaceClientError>> {
        Some(Ok(serde_json::to_string(msg).unwrap()))
    }

    fn welcome_json(user_id: &str) -> Option<std::result::Result<String, RaceClientError>> {
        json(&ServerMessage::Welcome {
            user_id: user_id.into(),
        })
    }

    async fn drain<const N: usize>(events: &mut mpsc::Receiver<RaceEvent>) {
        for _ in 0..N {
            let _ = events.recv().await;
        }
    }

    // ── Lifecycle tests ─────────────────────────────────────────────

    #[tokio::test]
    async fn connected_is_first_event() {
        let (transport, _sent, _closed) = MockTransport::new(vec![welcome_json("a")]);

        let (mut client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));

        let first = events.recv().await.unwrap();
        assert!(
            matches!(first, RaceEvent::Connected),
            "expected Connected as first event, got {first:?}"
        );

        client.shutdown().await;
    }

    #[tokio::test]
    async fn disconnected_on_transport_close() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            welcome_json("a"),
            // Explicit None signals clean transport close.
            None,
        ]);

        let (mut client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));

        drain::<2>(&mut events).await; // Connected, Welcome
        let event = events.recv().await.unwrap();
        assert!(matches!(event, RaceEvent::Disconnected { .. }));

        assert!(!client.is_connected());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn not_connected_error_after_shutdown() {
        let (transport, _sent, _closed) = MockTransport::new(vec![welcome_json("a")]);

        let (mut client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));

        drain::<2>(&mut events).await;
        client.shutdown().await;

        let result = client.sync_start();
        assert!(matches!(result, Err(RaceClientError::NotConnected)));
    }

    #[tokio::test]
    async fn shutdown_emits_disconnected() {
        let (transport, _sent, closed) = MockTransport::new(vec![welcome_json("a")]);

        let (mut client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));

        drain::<2>(&mut events).await;
        client.shutdown().await;

        let event = events.recv().await.unwrap();
        assert!(matches!(event, RaceEvent::Disconnected { .. }));
        if let RaceEvent::Disconnected { reason } = event {
            assert_eq!(reason.as_deref(), Some("client shut down"));
        }

        // Graceful path runs the close handshake.
        assert!(closed.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn double_shutdown_does_not_panic() {
        let (transport, _sent, _closed) = MockTransport::new(vec![welcome_json("a")]);

        let (mut client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));

        drain::<2>(&mut events).await;
        client.shutdown().await;
        client.shutdown().await; // should not panic
    }

    #[tokio::test]
    async fn drop_without_explicit_shutdown() {
        let (transport, _sent, _closed) = MockTransport::new(vec![welcome_json("a")]);

        let (client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));

        drain::<2>(&mut events).await;

        // No explicit shutdown: Drop aborts the task and the event
        // channel closes behind it. Draining must terminate.
        drop(client);
        while let Some(_event) = events.recv().await {}
    }

    #[tokio::test]
    async fn transport_recv_error_emits_disconnected() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Err(
            RaceClientError::TransportReceive("boom".into()),
        ))]);

        let (mut client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));

        let _ = events.recv().await; // Connected
        let event = events.recv().await.unwrap();
        assert!(matches!(event, RaceEvent::Disconnected { .. }));
        if let RaceEvent::Disconnected { reason } = event {
            assert!(reason.unwrap().contains("boom"));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn undeserializable_broadcast_is_skipped_not_fatal() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok("not json at all".into())),
            welcome_json("a"),
        ]);

        let (mut client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));

        let _ = events.recv().await; // Connected
        // The garbage frame produces no event; the next real one does.
        let event = events.recv().await.unwrap();
        assert!(matches!(event, RaceEvent::Welcome { .. }));

        client.shutdown().await;
    }

    // ── Outbound intent tests ───────────────────────────────────────

    #[tokio::test]
    async fn join_race_sends_message_and_enters_lobby() {
        let (transport, sent, _closed) = MockTransport::new(vec![welcome_json("a")]);

        let (mut client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));

        drain::<2>(&mut events).await;

        client
            .join_race(JoinRaceParams::new("Alice", "blue"))
            .await
            .unwrap();

        assert_eq!(client.phase().await, Phase::Lobby);

        // Let the loop drain the command channel.
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            let last: ClientMessage = serde_json::from_str(messages.last().unwrap()).unwrap();
            if let ClientMessage::JoinRace(payload) = last {
                assert_eq!(payload.room_id, "room1");
                assert_eq!(payload.user_name, "Alice");
                assert_eq!(payload.color, "blue");
            } else {
                panic!("expected JoinRace message, got {last:?}");
            }
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn set_ready_sends_player_ready() {
        let (transport, sent, _closed) = MockTransport::new(vec![welcome_json("a")]);

        let (mut client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));

        drain::<2>(&mut events).await;
        client.set_ready().unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            let last: ClientMessage = serde_json::from_str(messages.last().unwrap()).unwrap();
            assert!(matches!(last, ClientMessage::PlayerReady));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn sync_start_sends_message() {
        let (transport, sent, _closed) = MockTransport::new(vec![welcome_json("a")]);

        let (mut client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));

        drain::<2>(&mut events).await;
        client.sync_start().unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            let last: ClientMessage = serde_json::from_str(messages.last().unwrap()).unwrap();
            assert!(matches!(last, ClientMessage::SyncStart));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn round_controls_send_messages() {
        let (transport, sent, _closed) = MockTransport::new(vec![welcome_json("a")]);

        let (mut client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));

        drain::<2>(&mut events).await;
        client.play_again().unwrap();
        client.next_round().unwrap();
        client.send_to_final().unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            let parsed: Vec<ClientMessage> = messages
                .iter()
                .map(|m| serde_json::from_str(m).unwrap())
                .collect();
            assert!(parsed.contains(&ClientMessage::PlayAgain));
            assert!(parsed.contains(&ClientMessage::NextRound));
            assert!(parsed.contains(&ClientMessage::SendToFinal));
        }

        client.shutdown().await;
    }

    // ── Power-up targeting through the dispatcher ───────────────────

    async fn lobby_client_with_card(
        self_id: &str,
        self_name: &str,
    ) -> (RaceClient, mpsc::Receiver<RaceEvent>, Arc<StdMutex<Vec<String>>>) {
        let roster = vec![
            player("a", "A", true, true),
            with_card(player(self_id, self_name, false, true), "pu1"),
        ];
        let (transport, sent, _closed) = MockTransport::new(vec![
            welcome_json(self_id),
            json(&ServerMessage::PlayerInfo(roster)),
        ]);

        let (client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));
        drain::<3>(&mut events).await; // Connected, Welcome, RosterUpdated
        (client, events, sent)
    }

    #[tokio::test]
    async fn apply_power_emits_for_valid_target() {
        let (mut client, _events, sent) = lobby_client_with_card("b", "B").await;

        let emitted = client
            .apply_power(&DragResult::dropped_on("pu1", "A"))
            .await
            .unwrap();
        assert!(emitted);

        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            let last: ClientMessage = serde_json::from_str(messages.last().unwrap()).unwrap();
            if let ClientMessage::ApplyPower(payload) = last {
                assert_eq!(payload.power, "pu1");
                assert_eq!(payload.user_name, "A");
            } else {
                panic!("expected ApplyPower message, got {last:?}");
            }
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn apply_power_drops_self_target() {
        let (mut client, _events, sent) = lobby_client_with_card("b", "B").await;

        let emitted = client
            .apply_power(&DragResult::dropped_on("pu1", "B"))
            .await
            .unwrap();
        assert!(!emitted);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sent.lock().unwrap().is_empty());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn apply_power_drops_own_pool_and_cancelled() {
        let (mut client, _events, sent) = lobby_client_with_card("b", "B").await;

        let own_pool = client
            .apply_power(&DragResult::dropped_on("pu1", OWN_POOL_ID))
            .await
            .unwrap();
        let cancelled = client
            .apply_power(&DragResult::cancelled("pu1"))
            .await
            .unwrap();
        assert!(!own_pool);
        assert!(!cancelled);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sent.lock().unwrap().is_empty());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn apply_power_drops_before_identity_resolved() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);

        let (mut client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));
        let _ = events.recv().await; // Connected

        let emitted = client
            .apply_power(&DragResult::dropped_on("pu1", "A"))
            .await
            .unwrap();
        assert!(!emitted);
        assert!(sent.lock().unwrap().is_empty());

        client.shutdown().await;
    }

    // ── Session replication through the loop ────────────────────────

    #[tokio::test]
    async fn roster_broadcast_updates_session_snapshot() {
        let roster = vec![player("a", "A", true, true), player("b", "B", false, true)];
        let (transport, _sent, _closed) = MockTransport::new(vec![
            welcome_json("a"),
            json(&ServerMessage::PlayerInfo(roster)),
        ]);

        let (mut client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));

        drain::<2>(&mut events).await;
        let event = events.recv().await.unwrap();
        assert!(matches!(event, RaceEvent::RosterUpdated { .. }));

        let session = client.session().await;
        assert_eq!(session.players().len(), 2);
        assert!(session.is_host());
        assert!(session.room_ready());
        assert!(client.controls().await.start_race);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn start_race_broadcast_changes_phase() {
        let (transport, _sent, _closed) =
            MockTransport::new(vec![welcome_json("a"), json(&ServerMessage::StartRace)]);

        let (mut client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));

        drain::<2>(&mut events).await;
        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            RaceEvent::PhaseChanged { phase: Phase::Race }
        );
        assert_eq!(client.phase().await, Phase::Race);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn results_broadcast_reports_round_completion() {
        let partial = vec![
            with_wpm(player("a", "A", true, true), 80.0),
            player("b", "B", false, true),
        ];
        let full = vec![
            with_wpm(player("a", "A", true, true), 80.0),
            with_wpm(player("b", "B", false, true), 95.0),
        ];
        let (transport, _sent, _closed) = MockTransport::new(vec![
            welcome_json("a"),
            json(&ServerMessage::Results(partial)),
            json(&ServerMessage::Results(full)),
        ]);

        let (mut client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));

        drain::<2>(&mut events).await;

        let event = events.recv().await.unwrap();
        if let RaceEvent::ResultsUpdated { round_complete, .. } = event {
            assert!(!round_complete);
        } else {
            panic!("expected ResultsUpdated, got {event:?}");
        }
        assert!(!client.controls().await.next_round);

        let event = events.recv().await.unwrap();
        if let RaceEvent::ResultsUpdated { round_complete, .. } = event {
            assert!(round_complete);
        } else {
            panic!("expected ResultsUpdated, got {event:?}");
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn standings_follow_final_mode_switch() {
        let mut fast = with_wpm(player("b", "B", false, true), 95.0);
        fast.wpm_average = Some(60.0);
        let mut slow = with_wpm(player("a", "A", true, true), 80.0);
        slow.wpm_average = Some(90.0);

        let (transport, _sent, _closed) = MockTransport::new(vec![
            welcome_json("a"),
            json(&ServerMessage::Results(vec![slow, fast])),
            json(&ServerMessage::NavigateToFinal),
        ]);

        let (mut client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));

        drain::<3>(&mut events).await; // Connected, Welcome, ResultsUpdated

        // Per-round order: B (95) ahead of A (80).
        let round = client.standings().await;
        assert_eq!(round[0].player.user_id, "b");

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            RaceEvent::PhaseChanged { phase: Phase::Final }
        );

        // Final order flips: A averages 90 over B's 60.
        let final_view = client.standings().await;
        assert_eq!(final_view[0].player.user_id, "a");

        client.shutdown().await;
    }

    #[tokio::test]
    async fn navigate_to_lobby_respects_round_bound() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            welcome_json("a"),
            json(&ServerMessage::GetGameState(GameStatePayload {
                rounds: 2,
                curr_round: 1,
                gamemode: None,
            })),
            json(&ServerMessage::NavigateToLobby),
            json(&ServerMessage::NavigateToLobby),
        ]);

        let (mut client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));

        drain::<5>(&mut events).await;

        let session = client.session().await;
        assert_eq!(session.curr_round(), 2);
        assert_eq!(session.phase(), Phase::Lobby);

        client.shutdown().await;
    }

    // ── Config and channel behavior ─────────────────────────────────

    #[tokio::test]
    async fn config_defaults() {
        let config = RaceConfig::new("room1");
        assert_eq!(config.room_id, "room1");
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn event_channel_capacity_is_clamped_to_one() {
        let config = RaceConfig::new("room1").with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[tokio::test]
    async fn event_channel_backpressure_does_not_block() {
        // Script more broadcasts than the event channel can hold.
        let mut incoming: Vec<Option<std::result::Result<String, RaceClientError>>> = Vec::new();
        incoming.push(welcome_json("a"));
        for _ in 0..20 {
            incoming.push(json(&ServerMessage::StartRace));
        }
        incoming.push(None);

        let (transport, _sent, _closed) = MockTransport::new(incoming);

        let config = RaceConfig::new("room1").with_event_channel_capacity(1);
        let (mut client, mut events) = RaceClient::start(transport, config);

        // Give the loop time to overrun the single-slot channel.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut count = 0;
        while let Some(_event) = events.recv().await {
            count += 1;
        }
        // Connected gets the single slot and Disconnected is always delivered;
        // the rest may be dropped under backpressure.
        assert!(count >= 2, "expected at least 2 events, got {count}");
        assert!(
            count < 22,
            "expected backpressure to drop some events, but got all {count}"
        );

        client.shutdown().await;
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let (transport, _sent, _closed) = MockTransport::new(vec![welcome_json("a")]);

        let (mut client, mut events) = RaceClient::start(transport, RaceConfig::new("room1"));

        drain::<2>(&mut events).await;

        let debug_str = format!("{:?}", client);
        assert!(debug_str.contains("RaceClient"));
        assert!(debug_str.contains("connected"));

        client.shutdown().await;
    }
}
