//! # Basic Race Example
//!
//! Drives a complete Rocket Race client lifecycle:
//!
//! 1. Connect to a game server via WebSocket
//! 2. Join a room with a display name and rocket color
//! 3. Flag ready, and start the race if we are the host
//! 4. React to phase changes and results as they come in
//! 5. Shut down gracefully on Ctrl+C or disconnect
//!
//! ## Running
//!
//! ```sh
//! # Start a Rocket Race server on localhost:4001, then:
//! cargo run --example basic_race
//!
//! # Override the server URL or room:
//! ROCKET_RACE_URL=ws://my-server:4001 ROCKET_RACE_ROOM=a1b2c3 \
//!     cargo run --example basic_race
//! ```

use rocket_race_client::client::JoinRaceParams;
use rocket_race_client::{RaceClient, RaceConfig, RaceEvent, WebSocketTransport};

/// Default server URL when `ROCKET_RACE_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:4001";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("ROCKET_RACE_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let room = std::env::var("ROCKET_RACE_ROOM").unwrap_or_else(|_| "demo-room".to_string());
    tracing::info!("Connecting to {url}, room {room}");

    // ── Connect ─────────────────────────────────────────────────────
    let transport = WebSocketTransport::connect(&url).await?;

    // Start the client. This spawns a background task that drives the
    // transport and emits events on `event_rx`.
    let (mut client, mut event_rx) = RaceClient::start(transport, RaceConfig::new(room));

    // ── Event loop ──────────────────────────────────────────────────
    // Listen for both race events and Ctrl+C.
    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    // ── Synthetic: transport connected ───────────────
                    RaceEvent::Connected => {
                        tracing::info!("Transport connected, joining race…");
                        client
                            .join_race(JoinRaceParams::new("RustRacer", "blue"))
                            .await?;
                    }

                    // ── Identity assigned by the server ──────────────
                    RaceEvent::Welcome { user_id } => {
                        tracing::info!("Racing as {user_id}");
                        client.set_ready()?;
                    }

                    // ── Lobby roster ─────────────────────────────────
                    RaceEvent::RosterUpdated { players } => {
                        tracing::info!("{} racer(s) in the room", players.len());

                        // The host starts the race once everyone is ready.
                        if client.controls().await.start_race {
                            tracing::info!("Room ready, starting the race");
                            client.sync_start()?;
                        }
                    }

                    RaceEvent::GameStateUpdated { rounds, curr_round, gamemode } => {
                        tracing::info!(
                            "Round {curr_round}/{rounds} (gamemode: {})",
                            gamemode.as_deref().unwrap_or("none")
                        );
                    }

                    // ── Race flow ────────────────────────────────────
                    RaceEvent::PhaseChanged { phase } => {
                        let route = phase.path(client.session().await.room_id());
                        tracing::info!("Phase → {phase} (route {route})");
                    }

                    RaceEvent::ResultsUpdated { round_complete, .. } => {
                        for row in client.standings().await {
                            tracing::info!(
                                "  #{} {}",
                                row.rank,
                                row.player.user_name,
                            );
                        }
                        if round_complete && client.controls().await.play_again {
                            tracing::info!("Everyone finished; another round?");
                        }
                    }

                    // ── Disconnect ───────────────────────────────────
                    RaceEvent::Disconnected { reason } => {
                        tracing::warn!(
                            "Disconnected: {}",
                            reason.as_deref().unwrap_or("unknown")
                        );
                        break;
                    }
                }
            }

            // Ctrl+C — shut down gracefully.
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("Client shut down. Goodbye!");
    Ok(())
}
