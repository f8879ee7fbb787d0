//! Transport traits and the WebSocket implementation
//!
//! The connection lifecycle only sees these traits, so tests drive it with
//! mocks instead of a live server. `WsConnectionFactory` is the production
//! implementation on top of tokio-tungstenite.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{LiveClientError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Header carrying the credential during the WebSocket handshake
pub const TOKEN_HEADER: &str = "Sec-WebSocket-Protocol";

/// The server only upgrades requests whose Origin matches its domain
pub const ORIGIN_HEADER: &str = "Origin";

/// Both halves of an open connection
pub struct ConnectionPair {
    /// Receives text frames from the server
    pub reader: Box<dyn FrameReader>,
    /// Closes the connection from our side
    pub closer: Box<dyn FrameCloser>,
}

/// Reads text frames from an open connection
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameReader: Send {
    /// Read the next text frame
    ///
    /// Returns `Ok(None)` once the connection has closed.
    async fn read_frame(&mut self) -> Result<Option<String>>;
}

/// Closes an open connection
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameCloser: Send {
    async fn close(&mut self) -> Result<()>;
}

/// Opens authenticated connections
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Connect to `url` as a page served from `origin`, presenting `token`
    /// as the connection credential
    async fn connect(&self, url: &str, origin: &str, token: &str) -> Result<ConnectionPair>;
}

pub struct WsFrameReader {
    stream: SplitStream<WsStream>,
}

impl WsFrameReader {
    pub fn new(stream: SplitStream<WsStream>) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl FrameReader for WsFrameReader {
    async fn read_frame(&mut self) -> Result<Option<String>> {
        loop {
            match self.stream.next().await {
                None => return Ok(None),
                Some(Err(e)) => return Err(LiveClientError::Transport(e.to_string())),
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(frame))) => {
                    debug!("Server sent close frame: {:?}", frame);
                    return Ok(None);
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!("Ignoring binary frame ({} bytes)", data.len());
                }
                Some(Ok(_)) => {}
            }
        }
    }
}

pub struct WsFrameCloser {
    sink: SplitSink<WsStream, Message>,
}

impl WsFrameCloser {
    pub fn new(sink: SplitSink<WsStream, Message>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl FrameCloser for WsFrameCloser {
    async fn close(&mut self) -> Result<()> {
        self.sink
            .close()
            .await
            .map_err(|e| LiveClientError::Transport(e.to_string()))
    }
}

/// tokio-tungstenite implementation of ConnectionFactory
#[derive(Default, Clone)]
pub struct WsConnectionFactory;

impl WsConnectionFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConnectionFactory for WsConnectionFactory {
    async fn connect(&self, url: &str, origin: &str, token: &str) -> Result<ConnectionPair> {
        debug!("Opening WebSocket connection to {} from {}", url, origin);

        let mut request = url
            .into_client_request()
            .map_err(|e| LiveClientError::ConnectionFailed(format!("Bad URL {}: {}", url, e)))?;
        let protocol = HeaderValue::from_str(token).map_err(|_| {
            LiveClientError::InvalidToken("token is not a valid header value".to_string())
        })?;
        let origin = HeaderValue::from_str(origin).map_err(|_| {
            LiveClientError::InvalidConfig(format!(
                "origin '{}' is not a valid header value",
                origin
            ))
        })?;
        request.headers_mut().insert(TOKEN_HEADER, protocol);
        request.headers_mut().insert(ORIGIN_HEADER, origin);

        let (stream, response) = connect_async(request).await.map_err(|e| {
            LiveClientError::ConnectionFailed(format!("Failed to connect to {}: {}", url, e))
        })?;

        debug!("WebSocket handshake complete: {}", response.status());

        let (sink, stream) = stream.split();
        Ok(ConnectionPair {
            reader: Box::new(WsFrameReader::new(stream)),
            closer: Box::new(WsFrameCloser::new(sink)),
        })
    }
}
