//! WebSocket transport backed by `tokio-tungstenite`.
//!
//! The game server speaks plain JSON text frames over a WebSocket, so this
//! transport maps [`Transport::send`] / [`Transport::recv`] directly onto text
//! frames and hides the rest of the frame zoo (pings, pongs, close
//! handshakes). Both `ws://` and `wss://` endpoints work; TLS is negotiated by
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! Only compiled with the `transport-websocket` feature (on by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), rocket_race_client::RaceClientError> {
//! use rocket_race_client::{Transport, WebSocketTransport};
//!
//! let mut transport = WebSocketTransport::connect("ws://localhost:4001").await?;
//! transport.send(r#"{"event":"playerReady"}"#.to_string()).await?;
//!
//! while let Some(Ok(broadcast)) = transport.recv().await {
//!     println!("server broadcast: {broadcast}");
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::RaceClientError;
use crate::transport::Transport;

/// The underlying stream type, exposed so callers with bespoke connection
/// needs (custom TLS, proxies, extra headers) can hand a pre-established
/// stream to [`WebSocketTransport::from_stream`].
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// WebSocket-backed [`Transport`] for the race protocol.
///
/// One `send` is one outgoing text frame; one `recv` is the next incoming
/// text frame. Control frames never surface to the caller.
///
/// `recv` is cancel-safe (the underlying stream buffers a partially-read
/// frame), so the transport loop can poll it inside `tokio::select!` without
/// losing broadcasts.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Open a WebSocket connection to the game server.
    ///
    /// # Errors
    ///
    /// Returns [`RaceClientError::Io`] when the URL does not parse or the
    /// connection cannot be established. An underlying I/O error keeps its
    /// [`ErrorKind`](std::io::ErrorKind); handshake-level failures map to
    /// [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn connect(url: &str) -> Result<Self, RaceClientError> {
        tracing::debug!(url = %url, "connecting to game server");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            RaceClientError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::info!(url = %url, "connected to game server");

        Ok(Self {
            stream,
            closed: false,
        })
    }

    /// Wrap an already-established WebSocket stream.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// Like [`connect`](Self::connect), but giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`RaceClientError::Timeout`] when the deadline elapses, or any
    /// error [`connect`](Self::connect) can produce.
    pub async fn connect_with_timeout(
        url: &str,
        timeout: std::time::Duration,
    ) -> Result<Self, RaceClientError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| RaceClientError::Timeout)?
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), RaceClientError> {
        if self.closed {
            return Err(RaceClientError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| RaceClientError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, RaceClientError>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    return Some(Err(RaceClientError::TransportReceive(e.to_string())));
                }
                None => return None,
            };

            match msg {
                // `Utf8Bytes` has no by-value String accessor; copy the payload.
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "game server sent close frame");
                    return None;
                }
                // tungstenite queues the pong reply itself; nothing to surface.
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Binary(_) => {
                    tracing::warn!("unexpected binary frame from game server, skipping");
                }
                // Never produced by the read half; the arm only satisfies
                // exhaustiveness.
                Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), RaceClientError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| RaceClientError::TransportSend(e.to_string()))
    }
}

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
    use tokio::net::TcpListener;

    #[test]
    fn transport_is_send_and_debug() {
        fn assert_send<T: Send>() {}
        fn assert_debug<T: std::fmt::Debug>() {}
        assert_send::<WebSocketTransport>();
        assert_debug::<WebSocketTransport>();
    }

    #[tokio::test]
    async fn connect_rejects_invalid_url() {
        let err = WebSocketTransport::connect("not-a-valid-url")
            .await
            .unwrap_err();
        assert!(matches!(err, RaceClientError::Io(_)));
    }

    #[tokio::test]
    async fn connect_rejects_unreachable_host() {
        let err = WebSocketTransport::connect("ws://127.0.0.1:1")
            .await
            .unwrap_err();
        assert!(matches!(err, RaceClientError::Io(_)));
    }

    #[tokio::test]
    async fn connect_with_timeout_times_out() {
        // Non-routable TEST-NET address guarantees a hang, not a refusal.
        let err = WebSocketTransport::connect_with_timeout(
            "ws://192.0.2.1:1",
            std::time::Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RaceClientError::Timeout));
    }

    /// Run `handler` against one accepted WebSocket connection and return the
    /// URL to reach it.
    async fn serve_once<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn recv_yields_text_frames_in_order() {
        let url = serve_once(|mut ws| async move {
            ws.send(Message::Text(r#"{"event":"startRace"}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"event":"navigateToLobby"}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"event":"startRace"}"#
        );
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"event":"navigateToLobby"}"#
        );
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn binary_frames_are_skipped() {
        let url = serve_once(|mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"event":"startRace"}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"event":"startRace"}"#
        );
    }

    #[tokio::test]
    async fn send_round_trips_through_echo() {
        let url = serve_once(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(text)).await.unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport
            .send(r#"{"event":"playerReady"}"#.to_string())
            .await
            .unwrap();
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"event":"playerReady"}"#
        );
    }

    #[tokio::test]
    async fn send_after_close_reports_closed() {
        let url = serve_once(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();

        let err = transport
            .send(r#"{"event":"syncStart"}"#.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, RaceClientError::TransportClosed));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let url = serve_once(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn recv_after_close_does_not_hang() {
        let url = serve_once(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();

        match transport.recv().await {
            None | Some(Err(_)) => {}
            Some(Ok(msg)) => panic!("expected stream end after close, got Ok({msg:?})"),
        }
    }

    #[tokio::test]
    async fn from_stream_wraps_an_existing_connection() {
        let url = serve_once(|mut ws| async move {
            ws.send(Message::Text(r#"{"event":"navigateToFinal"}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let (ws_stream, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        let mut transport = WebSocketTransport::from_stream(ws_stream);
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"event":"navigateToFinal"}"#
        );
    }
}
