//! # Rocket Race Client
//!
//! Transport-agnostic Rust client for the Rocket Race multiplayer typing-race
//! protocol.
//!
//! This crate is the client-side half of the game: it keeps a locally
//! replicated view of room and player state consistent with the authoritative
//! game server, which broadcasts JSON text messages over any persistent
//! bidirectional transport. Route rendering, drag-and-drop visuals and
//! keystroke capture live outside this crate; they consume session snapshots
//! and [`RaceEvent`]s and feed intents back through [`client::RaceClient`].
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement the [`Transport`] trait for any backend
//! - **Replicated session state** — broadcasts replace roster/round metadata
//!   wholesale, so application is idempotent and order-tolerant
//! - **Derived UI permissions** — host-only controls mirrored client-side
//!   ([`session::Controls`]), never authoritative
//! - **WebSocket built-in** — default `transport-websocket` feature provides
//!   [`WebSocketTransport`]
//! - **Event-driven** — receive typed [`RaceEvent`]s via a channel
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rocket_race_client::{RaceClient, RaceConfig, RaceEvent, WebSocketTransport};
//! use rocket_race_client::client::JoinRaceParams;
//!
//! let transport = WebSocketTransport::connect("ws://localhost:4001/ws").await?;
//! let (client, mut events) = RaceClient::start(transport, RaceConfig::new("a1b2c3"));
//!
//! client.join_race(JoinRaceParams::new("Alice", "blue")).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         RaceEvent::PhaseChanged { phase } => {
//!             let route = phase.path(client.session().await.room_id());
//!             // hand `route` to the router
//!         }
//!         RaceEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

#[cfg(feature = "tokio-runtime")]
pub mod client;
pub mod error;
pub mod event;
pub mod phase;
pub mod protocol;
pub mod ranking;
pub mod session;
pub mod targeting;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
#[cfg(feature = "tokio-runtime")]
pub use client::{RaceClient, RaceConfig};
pub use error::RaceClientError;
pub use event::RaceEvent;
pub use phase::Phase;
pub use protocol::{ClientMessage, Player, ServerMessage};
pub use session::{Controls, Session};
pub use transport::Transport;

#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
