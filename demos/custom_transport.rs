//! # Custom Transport Example
//!
//! Shows how to implement the [`Transport`] trait yourself. The client
//! never assumes WebSockets; anything that moves strings both ways can
//! carry the protocol — TCP, IPC, or the in-process channel pair built
//! here.
//!
//! The loopback transport below is wired to a scripted "server" task
//! that answers a join with an identity and a roster, which is also a
//! handy pattern for integration-testing code built on top of the
//! client.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example custom_transport
//! ```

use async_trait::async_trait;
use rocket_race_client::client::JoinRaceParams;
use rocket_race_client::{
    RaceClient, RaceClientError, RaceConfig, RaceEvent, Transport,
};
use tokio::sync::mpsc;

/// An in-process transport backed by a pair of channels.
///
/// What the client sends comes out of the server half's `from_client`
/// receiver; what the server half pushes into `to_client` shows up in
/// [`Transport::recv`].
struct LoopbackTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

/// The other end of a [`LoopbackTransport`].
struct LoopbackServer {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl LoopbackTransport {
    /// Builds a connected transport/server pair.
    fn pair() -> (Self, LoopbackServer) {
        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        (
            LoopbackTransport { tx: client_tx, rx: client_rx },
            LoopbackServer { tx: server_tx, rx: server_rx },
        )
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), RaceClientError> {
        self.tx
            .send(message)
            .map_err(|e| RaceClientError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, RaceClientError>> {
        // `None` once the server half is dropped, which the client
        // reports as a disconnect.
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), RaceClientError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (transport, mut server) = LoopbackTransport::pair();

    // A scripted game server: greet the first joiner and broadcast a
    // two-racer roster, then ignore whatever else arrives.
    let server_task = tokio::spawn(async move {
        while let Some(raw) = server.rx.recv().await {
            tracing::info!("[server] received: {raw}");

            if !raw.contains("\"joinRace\"") {
                continue;
            }
            // The JSON must match the shapes the real server emits.
            let welcome = serde_json::json!({
                "event": "welcome",
                "data": { "userId": "racer-1" },
            });
            let roster = serde_json::json!({
                "event": "playerInfo",
                "data": [
                    {
                        "userId": "racer-1",
                        "userName": "LoopbackRacer",
                        "color": "green",
                        "isHost": true,
                        "isReady": false,
                        "gameData": {},
                    },
                    {
                        "userId": "racer-2",
                        "userName": "Scripted",
                        "color": "red",
                        "isHost": false,
                        "isReady": true,
                        "gameData": {},
                    },
                ],
            });
            let _ = server.tx.send(welcome.to_string());
            let _ = server.tx.send(roster.to_string());
        }
        tracing::info!("[server] client hung up");
    });

    let (mut client, mut event_rx) = RaceClient::start(transport, RaceConfig::new("loopback"));

    client
        .join_race(JoinRaceParams::new("LoopbackRacer", "green"))
        .await?;

    // Drain events until the roster lands.
    while let Some(event) = event_rx.recv().await {
        match event {
            RaceEvent::Connected => tracing::info!("connected over the loopback pair"),
            RaceEvent::Welcome { user_id } => tracing::info!("joined as {user_id}"),
            RaceEvent::RosterUpdated { players } => {
                for player in &players {
                    tracing::info!(
                        "  {} ({}){}",
                        player.user_name,
                        player.color,
                        if player.is_host { " [host]" } else { "" },
                    );
                }
                break;
            }
            other => tracing::debug!("ignoring {other:?}"),
        }
    }

    client.shutdown().await;
    server_task.await?;
    Ok(())
}
