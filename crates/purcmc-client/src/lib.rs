// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! A client-side helper for talking to a PURCMC renderer: connect over
//! either transport (chosen by [`RendererUri`] schema), wait for the
//! initial greeting, send requests and correlate their responses by
//! `requestId`, and drain unsolicited events.
//!
//! A reduced but real counterpart to `purc-pcrdr.h`'s `pcrdr_send_request`/
//! `pcrdr_wait_and_dispatch_message`/`pcrdr_ping_renderer` trio, grounded
//! on `echo-session-client`'s connect/send/poll shape and on
//! `tokio-tungstenite`'s usage in the WebSocket retrieval examples.

mod uri;

pub use uri::{RendererUri, UriError};

use std::collections::VecDeque;
use std::path::Path;

use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use purcmc_proto::wire::{decode_websocket_payload, encode_stream_frames, encode_websocket_payload, FrameError, StreamReassembler};
use purcmc_proto::{Message, MsgType, Target};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::MaybeTlsStream;

type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = futures_util::stream::SplitSink<WsStream, WsMessage>;
type WsSource = futures_util::stream::SplitStream<WsStream>;

/// Failure modes for [`RendererConn`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The renderer URI couldn't be parsed.
    #[error(transparent)]
    Uri(#[from] UriError),
    /// A transport-level I/O error.
    #[error("transport i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The frame codec rejected a message.
    #[error("frame codec error: {0}")]
    Frame(#[from] FrameError),
    /// The WebSocket library reported an error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    /// The connection closed before a complete message arrived.
    #[error("connection closed")]
    Closed,
}

enum Transport {
    Stream {
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
        reassembler: StreamReassembler,
        acc: BytesMut,
        pending: VecDeque<Message>,
    },
    WebSocket {
        sink: WsSink,
        source: WsSource,
    },
}

/// One connection to a PURCMC renderer, over either transport.
pub struct RendererConn {
    transport: Transport,
    next_request_id: u64,
    pending_events: VecDeque<Message>,
}

impl RendererConn {
    /// Connect to `uri`, wait for the renderer's initial greeting, and
    /// return both the connection and that greeting message.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the URI is unsupported, the transport
    /// connection fails, or the peer closes before sending a greeting.
    pub async fn connect(uri: &str) -> Result<(Self, Message), ClientError> {
        let parsed = RendererUri::parse(uri)?;
        let mut conn = match parsed {
            RendererUri::Stream(path) => Self::connect_stream(&path).await?,
            RendererUri::WebSocket(url) => Self::connect_websocket(&url).await?,
        };
        let greeting = conn.recv_message().await?;
        Ok((conn, greeting))
    }

    async fn connect_stream(path: &Path) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(path).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            transport: Transport::Stream {
                reader,
                writer,
                reassembler: StreamReassembler::new(),
                acc: BytesMut::with_capacity(16 * 1024),
                pending: VecDeque::new(),
            },
            next_request_id: 1,
            pending_events: VecDeque::new(),
        })
    }

    async fn connect_websocket(url: &str) -> Result<Self, ClientError> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url).await?;
        let (sink, source) = ws_stream.split();
        Ok(Self {
            transport: Transport::WebSocket { sink, source },
            next_request_id: 1,
            pending_events: VecDeque::new(),
        })
    }

    /// Send `request`, stamping it with a fresh `requestId`, and return
    /// that id so the caller can later match it via
    /// [`RendererConn::wait_for_response`].
    pub async fn send_request(&mut self, mut request: Message) -> Result<String, ClientError> {
        let request_id = format!("r{}", self.next_request_id);
        self.next_request_id += 1;
        request.request_id = Some(request_id.clone());
        self.send_message(&request).await?;
        Ok(request_id)
    }

    /// Read messages until the response correlated to `request_id`
    /// arrives, buffering any events seen along the way for
    /// [`RendererConn::drain_events`].
    pub async fn wait_for_response(&mut self, request_id: &str) -> Result<Message, ClientError> {
        loop {
            let message = self.recv_message().await?;
            match message.msg_type {
                MsgType::Response if message.request_id.as_deref() == Some(request_id) => {
                    return Ok(message);
                }
                MsgType::Event => self.pending_events.push_back(message),
                _ => {}
            }
        }
    }

    /// Generate inbound traffic to keep this endpoint's living-time fresh.
    ///
    /// The protocol has no dedicated ping operation; any request resets
    /// the renderer's liveness clock for this endpoint (see
    /// `EndpointRegistry::touch`), so this sends a cheap, deliberately
    /// unrecognized request and discards its (`UNKNOWN_REQUEST`)
    /// response.
    pub async fn ping(&mut self) -> Result<(), ClientError> {
        let request_id = self.send_request(Message::request("ping", Target::Session, 0)).await?;
        self.wait_for_response(&request_id).await?;
        Ok(())
    }

    /// Drain every event buffered by [`RendererConn::wait_for_response`]
    /// since the last call.
    pub fn drain_events(&mut self) -> Vec<Message> {
        self.pending_events.drain(..).collect()
    }

    async fn send_message(&mut self, message: &Message) -> Result<(), ClientError> {
        match &mut self.transport {
            Transport::Stream { writer, .. } => {
                let bytes = encode_stream_frames(message)?;
                writer.write_all(&bytes).await?;
                Ok(())
            }
            Transport::WebSocket { sink, .. } => {
                let bytes = encode_websocket_payload(message)?;
                sink.send(WsMessage::Binary(bytes.into())).await?;
                Ok(())
            }
        }
    }

    async fn recv_message(&mut self) -> Result<Message, ClientError> {
        match &mut self.transport {
            Transport::Stream { reader, reassembler, acc, pending, .. } => {
                if let Some(message) = pending.pop_front() {
                    return Ok(message);
                }
                let mut buf = [0u8; 16 * 1024];
                loop {
                    let n = reader.read(&mut buf).await?;
                    if n == 0 {
                        return Err(ClientError::Closed);
                    }
                    acc.extend_from_slice(&buf[..n]);
                    let mut messages = reassembler.feed(acc)?;
                    if messages.is_empty() {
                        continue;
                    }
                    let first = messages.remove(0);
                    pending.extend(messages);
                    return Ok(first);
                }
            }
            Transport::WebSocket { source, .. } => loop {
                match source.next().await {
                    Some(Ok(WsMessage::Binary(payload))) => {
                        return Ok(decode_websocket_payload(&payload)?);
                    }
                    Some(Ok(WsMessage::Close(_))) | None => return Err(ClientError::Closed),
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => return Err(ClientError::WebSocket(err)),
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_schema_negotiation_is_reexported() {
        assert!(matches!(RendererUri::parse("unix:///tmp/x.sock"), Ok(RendererUri::Stream(_))));
        assert!(matches!(RendererUri::parse("ws://localhost/ws"), Ok(RendererUri::WebSocket(_))));
    }

    #[tokio::test]
    async fn stream_round_trip_over_a_socket_pair() {
        let dir = std::env::temp_dir().join(format!("purcmc-client-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let socket_path = dir.join("test.sock");
        let _ = std::fs::remove_file(&socket_path);

        let listener = tokio::net::UnixListener::bind(&socket_path).unwrap();

        let accept_path = socket_path.clone();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (mut reader, mut writer) = stream.into_split();

            let greeting = Message::greeting("test-renderer", "0.1.0", "HTML:5.3");
            writer.write_all(&encode_stream_frames(&greeting).unwrap()).await.unwrap();

            let mut reassembler = StreamReassembler::new();
            let mut acc = BytesMut::with_capacity(4096);
            let mut buf = [0u8; 4096];
            loop {
                let n = reader.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                acc.extend_from_slice(&buf[..n]);
                let messages = reassembler.feed(&mut acc).unwrap();
                for request in messages {
                    let response = request.respond().status(purcmc_proto::StatusCode::Ok).result_value(7).build();
                    writer.write_all(&encode_stream_frames(&response).unwrap()).await.unwrap();
                    return;
                }
            }
            let _ = accept_path;
        });

        let (mut conn, greeting) = RendererConn::connect(&format!("unix://{}", socket_path.display())).await.unwrap();
        assert_eq!(greeting.msg_type, MsgType::Response);

        let request_id = conn
            .send_request(Message::request("startSession", Target::Session, 0))
            .await
            .unwrap();
        let response = conn.wait_for_response(&request_id).await.unwrap();
        assert_eq!(response.result_value, Some(7));

        server.await.unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }
}
