//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! The accepted stream is split into reader and writer halves so the
//! session's inbound loop and outbound pump can run concurrently without
//! blocking each other. Data frames go out as text — the protocol is
//! JSON and browser clients read it directly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Bytes, Message};

use crate::{Connection, ConnectionId, Listener, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// A WebSocket-based [`Listener`] accepting incoming connections.
pub struct WebSocketListener {
    listener: TcpListener,
}

impl WebSocketListener {
    /// Binds a new WebSocket listener to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket listener bound");
        Ok(Self { listener })
    }
}

impl Listener for WebSocketListener {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(TransportError::HandshakeFailed)?;
        let (writer, reader) = ws.split();

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %addr, "accepted WebSocket connection");

        Ok(WebSocketConnection {
            id,
            reader: Arc::new(Mutex::new(reader)),
            writer: Arc::new(Mutex::new(writer)),
            last_activity: Arc::new(StdMutex::new(Instant::now())),
        })
    }

    fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }
}

/// A single WebSocket connection.
///
/// Cheap to clone — the halves are shared behind `Arc`s, so a clone can
/// be handed to the outbound pump task while the inbound loop keeps the
/// original.
#[derive(Clone)]
pub struct WebSocketConnection {
    id: ConnectionId,
    reader: Arc<Mutex<SplitStream<WsStream>>>,
    writer: Arc<Mutex<SplitSink<WsStream, Message>>>,
    last_activity: Arc<StdMutex<Instant>>,
}

impl WebSocketConnection {
    /// Refreshes the activity clock. Called on every inbound frame,
    /// control frames included.
    fn touch(&self) {
        let mut at = self
            .last_activity
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *at = Instant::now();
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let text = std::str::from_utf8(data)
            .map_err(|e| TransportError::InvalidFrame(e.to_string()))?;
        self.writer
            .lock()
            .await
            .send(Message::text(text))
            .await
            .map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        loop {
            let msg = self.reader.lock().await.next().await;
            match msg {
                Some(Ok(msg)) => {
                    self.touch();
                    match msg {
                        Message::Text(text) => {
                            return Ok(Some(text.as_bytes().to_vec()));
                        }
                        Message::Binary(data) => return Ok(Some(data.into())),
                        // Tungstenite queues the pong reply itself; both
                        // directions only matter as liveness here.
                        Message::Ping(_) | Message::Pong(_) => continue,
                        Message::Close(_) => return Ok(None),
                        Message::Frame(_) => continue,
                    }
                }
                Some(Err(e)) => return Err(TransportError::ReceiveFailed(e)),
                None => return Ok(None),
            }
        }
    }

    async fn ping(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .send(Message::Ping(Bytes::new()))
            .await
            .map_err(TransportError::SendFailed)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .send(Message::Close(None))
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn last_activity(&self) -> Instant {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}
