//! WebSocket transport for a single gateway connection
//!
//! The socket is split on connect: the read half stays with the
//! connection loop, while the write half is owned by a dedicated writer
//! task fed through a channel. Both the heartbeat task and the reader
//! send through that channel, so the bytes of one frame can never
//! interleave with another.

use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use discord_gateway_protocol::API_VERSION;

use crate::error::ClientError;

/// One frame received from the gateway socket.
#[derive(Debug)]
pub(crate) enum Frame {
    Text(String),
    Binary(Vec<u8>),
    /// The server closed the connection, possibly with a close code.
    Close { code: Option<u16>, reason: String },
}

/// Appends the gateway query parameters to a base URL.
pub(crate) fn gateway_query_url(base: &str, zlib_stream: bool) -> String {
    let base = base.trim_end_matches('/');
    if zlib_stream {
        format!("{base}/?v={API_VERSION}&encoding=json&compress=zlib-stream")
    } else {
        format!("{base}/?v={API_VERSION}&encoding=json")
    }
}

/// An open WebSocket connection to the gateway.
pub(crate) struct GatewaySocket {
    reader: SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    writer: mpsc::Sender<Message>,
}

impl GatewaySocket {
    /// Opens the connection and spawns the writer task.
    pub(crate) async fn connect(url: &str) -> Result<Self, ClientError> {
        debug!(%url, "opening websocket connection");
        let (stream, _response) = connect_async(url).await?;
        let (mut sink, reader) = stream.split();

        let (writer, mut outgoing) = mpsc::channel::<Message>(16);
        tokio::spawn(async move {
            while let Some(message) = outgoing.recv().await {
                let closing = matches!(message, Message::Close(_));
                if sink.send(message).await.is_err() {
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        Ok(Self { reader, writer })
    }

    /// A channel into the writer task, shared with the heartbeat task and
    /// the presence-update handle.
    pub(crate) fn sender(&self) -> mpsc::Sender<Message> {
        self.writer.clone()
    }

    /// Queues a text frame for sending.
    pub(crate) async fn send_text(&self, text: String) -> Result<(), ClientError> {
        self.writer
            .send(Message::Text(text))
            .await
            .map_err(|_| ClientError::ConnectionClosed {
                code: None,
                reason: "websocket writer closed".to_string(),
            })
    }

    /// Receives the next data or close frame. Ping/pong control frames
    /// are handled by the WebSocket layer and skipped here.
    pub(crate) async fn next_frame(&mut self) -> Result<Frame, ClientError> {
        loop {
            match self.reader.next().await {
                Some(Ok(Message::Text(text))) => {
                    trace!(len = text.len(), "received text frame");
                    return Ok(Frame::Text(text));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    trace!(len = bytes.len(), "received binary frame");
                    return Ok(Frame::Binary(bytes));
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.into_owned()),
                        None => (None, String::new()),
                    };
                    return Ok(Frame::Close { code, reason });
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Ok(Frame::Close {
                        code: None,
                        reason: "connection lost".to_string(),
                    })
                }
            }
        }
    }

    /// Queues a close frame; the writer task shuts the sink down after
    /// sending it.
    pub(crate) async fn close(&self, code: u16, reason: &str) {
        trace!(code, reason, "closing websocket");
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        let _ = self.writer.send(Message::Close(Some(frame))).await;
    }
}
