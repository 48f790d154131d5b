//! Transport abstraction between the client and the game server.
//!
//! The race protocol is a stream of self-contained JSON text messages in both
//! directions; [`Transport`] is the seam that carries them. Framing is the
//! implementation's problem (WebSocket frames, length-prefixed TCP, an
//! in-process channel pair in tests) — by the time a message reaches this
//! trait it is one complete JSON string.
//!
//! Connection setup is deliberately outside the trait: a WebSocket wants a
//! URL, raw TCP wants a host and port, a test wants neither. Establish the
//! connection however the transport requires, then hand the connected value
//! to `RaceClient::start`. Reconnection and backoff are likewise the
//! transport's concern.
//!
//! # Implementing a custom transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use rocket_race_client::error::RaceClientError;
//! use rocket_race_client::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), RaceClientError> {
//!         // write one JSON text message
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, RaceClientError>> {
//!         // read the next JSON text message; None once the server closed
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), RaceClientError> {
//!         // run the close handshake and release resources
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::RaceClientError;

/// A bidirectional text-message channel to the game server.
///
/// One `send` transmits one complete JSON message; one `recv` yields one.
/// The trait is object-safe (`Box<dyn Transport>` works), though
/// `RaceClient::start` takes `impl Transport` for the common monomorphized
/// case.
///
/// # Cancel safety
///
/// [`recv`](Transport::recv) is polled inside `tokio::select!` by the
/// transport loop, so it **must** be cancel-safe: cancelling an in-flight
/// `recv` and calling it again must not lose a message. Channel-backed
/// implementations get this for free.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one JSON text message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`RaceClientError::TransportSend`] when the message cannot be
    /// written (connection broken, buffer full).
    async fn send(&mut self, message: String) -> Result<(), RaceClientError>;

    /// Receive the next JSON text message from the server.
    ///
    /// - `Some(Ok(text))` — one complete message
    /// - `Some(Err(e))` — a transport failure, typically
    ///   [`RaceClientError::TransportReceive`]
    /// - `None` — the server closed the connection cleanly
    ///
    /// Must be cancel-safe (see the trait docs).
    async fn recv(&mut self) -> Option<Result<String, RaceClientError>>;

    /// Close the connection gracefully.
    ///
    /// Afterwards `send` and `recv` may error or yield `None`.
    ///
    /// # Errors
    ///
    /// Returns an error when the close handshake fails; implementations
    /// should still release resources in that case.
    async fn close(&mut self) -> Result<(), RaceClientError>;
}
