// ── WebSocket transport ──
//
// Owns a single bidirectional message stream to the hub. No payload
// interpretation beyond frame classification: I/O failures surface as
// `Err`, a clean close as `Ok(None)` -- the connection manager decides
// what to do with either.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{info, trace};
use url::Url;

use crate::error::Error;
use crate::protocol::{ClientRequest, ServerFrame, decode_frame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A live WebSocket connection to the hub.
pub struct HubSocket {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
}

impl HubSocket {
    /// Open a connection to the hub's stream endpoint.
    pub async fn connect(ws_url: &Url) -> Result<Self, Error> {
        info!(url = %ws_url, "connecting to hub WebSocket");

        let (stream, _response) = tokio_tungstenite::connect_async(ws_url.as_str())
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        info!("hub WebSocket connected");

        let (write, read) = stream.split();
        Ok(Self { write, read })
    }

    /// Send one encoded request frame.
    ///
    /// The frame body is not logged; auth frames carry the token.
    pub async fn send(&mut self, request: &ClientRequest) -> Result<(), Error> {
        trace!("sending frame");
        self.write
            .send(Message::Text(request.encode().into()))
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))
    }

    /// Read until the next classified frame.
    ///
    /// Ping/pong and binary messages are skipped (tungstenite replies to
    /// pings automatically). Returns `Ok(None)` on a clean close or when
    /// the stream ends without a close frame.
    pub async fn next_frame(&mut self) -> Result<Option<ServerFrame>, Error> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(decode_frame(&text))),
                Some(Ok(Message::Ping(_))) => {
                    trace!("WebSocket ping");
                }
                Some(Ok(Message::Close(frame))) => {
                    if let Some(ref cf) = frame {
                        info!(code = %cf.code, reason = %cf.reason, "hub sent close frame");
                    } else {
                        info!("hub sent close frame (no payload)");
                    }
                    return Ok(None);
                }
                Some(Err(e)) => return Err(Error::WebSocket(e.to_string())),
                None => {
                    info!("hub WebSocket stream ended");
                    return Ok(None);
                }
                _ => {
                    // Binary, Pong, Frame -- ignore
                }
            }
        }
    }
}
