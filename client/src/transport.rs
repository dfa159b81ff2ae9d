//! # Transport Seam
//!
//! The client never touches a socket directly. It asks a [`Connector`] to
//! open a [`Connection`], which is two halves:
//! - `inbound`: text frames from the server; the stream ending means the
//!   connection closed, an `Err` item is a transport error
//! - `outbound`: a sink accepting text frames for the server
//!
//! [`WsConnector`] is the production implementation on top of
//! `tokio-tungstenite`.

use crate::error::TransportError;
use async_trait::async_trait;
use futures::future;
use futures::stream::BoxStream;
use futures::{Sink, SinkExt, StreamExt};
use std::pin::Pin;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::debug;
use url::Url;

pub type InboundFrames = BoxStream<'static, Result<String, TransportError>>;
pub type OutboundFrames = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// One live physical connection.
pub struct Connection {
    pub inbound: InboundFrames,
    pub outbound: OutboundFrames,
}

/// Opens physical connections. One call per connection attempt.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn open(&self, url: &Url) -> Result<Connection, TransportError>;
}

// ─── WebSocket Connector ────────────────────────────────────────

/// Connects with `tokio-tungstenite`.
///
/// Pings are answered by tungstenite itself; binary frames are ignored and a
/// close frame ends the inbound stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &Url) -> Result<Connection, TransportError> {
        let (ws_stream, response) = connect_async(url.as_str()).await?;
        debug!("WebSocket handshake completed ({})", response.status());

        // Split the WebSocket into read and write halves
        let (ws_sink, ws_rx) = ws_stream.split();

        let inbound = ws_rx
            .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| {
                future::ready(match msg {
                    Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Ok(_) => None,
                    Err(e) => Some(Err(TransportError::from(e))),
                })
            })
            .boxed();

        let outbound = ws_sink
            .with(|text: String| future::ready(Ok::<_, tungstenite::Error>(Message::Text(text.into()))))
            .sink_map_err(TransportError::from);

        Ok(Connection {
            inbound,
            outbound: Box::pin(outbound),
        })
    }
}
