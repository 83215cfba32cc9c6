//! Transport seam: a [`Connector`] opens a [`Link`] for one session.
//!
//! [`WsConnector`] is the production implementation over `tokio-tungstenite`.
//! The session only ever sees [`Frame`] and [`Outbound`], so tests can drive
//! it with a scripted link (see [`crate::mock`]).

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use lgwatch_core::{Identity, TransportError};
use lgwatch_settings::EndpointSettings;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header};
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on the closing handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// An inbound transport message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
    /// Ping control frame.
    Ping,
    /// Pong control frame.
    Pong,
    /// The peer started the closing handshake.
    Close {
        /// Close code, if one was sent.
        code: Option<u16>,
        /// Close reason.
        reason: String,
    },
}

/// An outbound transport message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// Text frame.
    Text(String),
    /// Empty ping frame.
    Ping,
}

/// One live connection.
#[async_trait]
pub trait Link: Send {
    /// Write one message.
    async fn send(&mut self, message: Outbound) -> Result<(), TransportError>;

    /// Next inbound frame; `None` once the connection is gone.
    ///
    /// Must be cancel-safe: the session polls it inside `select!`.
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>>;

    /// Close the connection. Never fails.
    async fn close(&mut self);
}

/// Opens links.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and authenticate as `identity`.
    async fn connect(&self, identity: &Identity) -> Result<Box<dyn Link>, TransportError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// tokio-tungstenite
// ─────────────────────────────────────────────────────────────────────────────

/// WebSocket connector carrying the cookie and browser headers.
pub struct WsConnector {
    endpoint: EndpointSettings,
}

impl WsConnector {
    /// Connector for `endpoint`.
    pub fn new(endpoint: EndpointSettings) -> Self {
        Self { endpoint }
    }
}

/// Build the handshake request for `identity`.
pub fn build_request(
    endpoint: &EndpointSettings,
    identity: &Identity,
) -> Result<Request, TransportError> {
    let mut request = endpoint.url.as_str().into_client_request().map_err(|e| {
        TransportError::InvalidEndpoint {
            url: endpoint.url.clone(),
            reason: e.to_string(),
        }
    })?;

    let mut cookie = header_value("Cookie", &identity.cookie_header())?;
    cookie.set_sensitive(true);

    let headers = request.headers_mut();
    let _ = headers.insert(header::COOKIE, cookie);
    let _ = headers.insert(header::USER_AGENT, header_value("User-Agent", &endpoint.user_agent)?);
    let _ = headers.insert(header::ORIGIN, header_value("Origin", &endpoint.origin)?);
    let _ = headers.insert(header::REFERER, header_value("Referer", &endpoint.referer)?);
    Ok(request)
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, TransportError> {
    HeaderValue::from_str(value).map_err(|e| TransportError::InvalidHeader {
        name,
        reason: e.to_string(),
    })
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, identity: &Identity) -> Result<Box<dyn Link>, TransportError> {
        let request = build_request(&self.endpoint, identity)?;
        debug!(url = %self.endpoint.url, "connecting");
        let (stream, response) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        debug!(status = %response.status(), "handshake complete");
        Ok(Box::new(WsLink { stream }))
    }
}

/// A `tokio-tungstenite` stream.
pub struct WsLink {
    stream: WsStream,
}

#[async_trait]
impl Link for WsLink {
    async fn send(&mut self, message: Outbound) -> Result<(), TransportError> {
        let message = match message {
            Outbound::Text(text) => Message::Text(text.into()),
            Outbound::Ping => Message::Ping(Bytes::new()),
        };
        self.stream
            .send(message)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            };
            let frame = match message {
                Message::Text(text) => Frame::Text(text.as_str().to_owned()),
                Message::Binary(bytes) => Frame::Binary(bytes.to_vec()),
                Message::Ping(_) => Frame::Ping,
                Message::Pong(_) => Frame::Pong,
                Message::Close(close) => Frame::Close {
                    code: close.as_ref().map(|c| u16::from(c.code)),
                    reason: close.map(|c| c.reason.as_str().to_owned()).unwrap_or_default(),
                },
                // Raw frames never surface from a read.
                Message::Frame(_) => continue,
            };
            return Some(Ok(frame));
        }
    }

    async fn close(&mut self) {
        match tokio::time::timeout(CLOSE_TIMEOUT, self.stream.close(None)).await {
            Ok(Ok(())) => debug!("connection closed"),
            Ok(Err(e)) => debug!(error = %e, "close after failure"),
            Err(_) => debug!("closing handshake timed out"),
        }
    }
}
