//! Bundled [`Transport`](crate::Transport) implementations, one per feature.
//!
//! | Feature                | Transport              |
//! |------------------------|------------------------|
//! | `transport-websocket`  | [`WebSocketTransport`] |
//!
//! With all transport features disabled the module is empty and callers
//! supply their own implementation of the trait.
//!
//! # Example
//!
//! ```rust,ignore
//! # async fn example() -> Result<(), rocket_race_client::RaceClientError> {
//! use rocket_race_client::{Transport, WebSocketTransport};
//!
//! let mut ws = WebSocketTransport::connect("ws://localhost:4001").await?;
//! ws.send(r#"{"event":"playerReady"}"#.to_string()).await?;
//!
//! if let Some(Ok(broadcast)) = ws.recv().await {
//!     println!("server said: {broadcast}");
//! }
//!
//! ws.close().await?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::WebSocketTransport;
