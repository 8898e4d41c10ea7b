// file: src/transport.rs
// description: transport seam between the stream connection and the network

use crate::error::TickStreamError;
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async_with_config,
    tungstenite::{Message, protocol::WebSocketConfig},
};
use tracing::{debug, trace};
use url::Url;

/// One frame as seen by the stream connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFrame {
    Text(String),
    Binary(Vec<u8>),
    Ping,
    Pong,
    Close(Option<String>),
}

/// Opens physical connections. Owned by the connection task, so
/// tests can hand in a scripted fake.
pub trait Transport: Send + Sync + 'static {
    type Session: TransportSession;

    fn connect(
        &self,
        url: &Url,
    ) -> impl Future<Output = Result<Self::Session, TickStreamError>> + Send;
}

/// A single live connection.
pub trait TransportSession: Send + 'static {
    /// Next inbound frame, `None` once the peer has gone away.
    fn next_frame(
        &mut self,
    ) -> impl Future<Output = Option<Result<TransportFrame, TickStreamError>>> + Send;

    fn send_ping(&mut self) -> impl Future<Output = Result<(), TickStreamError>> + Send;

    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

pub type TickWsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    connect_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl Transport for WebSocketTransport {
    type Session = WebSocketSession;

    async fn connect(&self, url: &Url) -> Result<WebSocketSession, TickStreamError> {
        let ws_config = WebSocketConfig {
            max_message_size: Some(16 << 20),
            max_frame_size: Some(4 << 20),
            ..Default::default()
        };

        let handshake = connect_async_with_config(url.as_str(), Some(ws_config), true);
        let (stream, response) = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| TickStreamError::Timeout(self.connect_timeout))??;

        debug!(status = %response.status(), "WebSocket handshake completed");
        Ok(WebSocketSession { stream })
    }
}

pub struct WebSocketSession {
    stream: TickWsStream,
}

impl TransportSession for WebSocketSession {
    async fn next_frame(&mut self) -> Option<Result<TransportFrame, TickStreamError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };

            let frame = match message {
                Message::Text(text) => TransportFrame::Text(text.to_string()),
                Message::Binary(data) => TransportFrame::Binary(data.to_vec()),
                Message::Ping(_) => TransportFrame::Ping,
                Message::Pong(_) => TransportFrame::Pong,
                Message::Close(frame) => {
                    TransportFrame::Close(frame.map(|frame| frame.reason.to_string()))
                }
                Message::Frame(_) => {
                    // Raw frames are only produced when writing
                    trace!("Skipping raw frame");
                    continue;
                }
            };
            return Some(Ok(frame));
        }
    }

    async fn send_ping(&mut self) -> Result<(), TickStreamError> {
        self.stream.send(Message::Ping(Vec::new().into())).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("Error while closing WebSocket: {}", e);
        }
    }
}
