// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The PURCMC renderer daemon: a Unix-socket stream listener applying
//! `purcmc-proto::wire`'s stream frame codec, wiring accepted
//! connections into `purcmc-core`'s transport-agnostic event loop.
//!
//! Grounded on `echo-session-service`'s hub shape: one shared inbound
//! channel the event loop drains, one shared outbound channel a router
//! task fans back out to per-connection writer tasks, keyed by `ConnId`.
//! Unlike the teacher's hub, the protocol state machine itself lives
//! entirely in `purcmc-core`; this binary only owns sockets.

mod backend;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::BytesMut;
use clap::Parser;
use purcmc_config::{ConfigService, FsConfigStore, RendererConfig};
use purcmc_core::{ConnId, EventLoop, Inbound, Outbound, Renderer};
use purcmc_proto::wire::{encode_stream_frames, StreamReassembler};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use backend::ReferenceBackend;

/// PURCMC renderer daemon.
#[derive(Parser, Debug)]
#[command(author, version, about = "PURCMC renderer daemon")]
struct Args {
    /// Unix domain socket path to listen on (overrides the saved config).
    #[arg(long)]
    socket: Option<PathBuf>,
    /// `tracing-subscriber` `EnvFilter` directive (overrides the saved config).
    #[arg(long)]
    log_filter: Option<String>,
}

type WriterMap = Arc<Mutex<HashMap<ConnId, mpsc::Sender<Vec<u8>>>>>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_service: Option<ConfigService<FsConfigStore>> =
        FsConfigStore::new().map(ConfigService::new).ok();
    let mut config: RendererConfig = config_service
        .as_ref()
        .and_then(|svc| svc.load_renderer_config().ok())
        .unwrap_or_default();
    if let Some(svc) = &config_service {
        let _ = svc.save_renderer_config(&config);
    }

    if let Some(socket) = &args.socket {
        config.socket_path = socket.display().to_string();
    }
    if let Some(filter) = &args.log_filter {
        config.log_filter = filter.clone();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    let renderer = Renderer::with_timeouts(ReferenceBackend::default(), config.ping_time(), config.no_responding_time());
    let mut event_loop = EventLoop::new(renderer, std::time::Duration::from_secs(1));

    let (inbound_tx, inbound_rx) = mpsc::channel::<Inbound>(1024);
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(1024);
    let writers: WriterMap = Arc::new(Mutex::new(HashMap::new()));

    let loop_handle = tokio::spawn(async move {
        event_loop.run(inbound_rx, outbound_tx).await;
    });

    let router_writers = writers.clone();
    let router_handle = tokio::spawn(async move {
        while let Some(action) = outbound_rx.recv().await {
            match action {
                Outbound::Send(conn, message) => {
                    let tx = router_writers.lock().await.get(&conn).cloned();
                    let Some(tx) = tx else {
                        warn!(conn = conn.0, "no writer registered for connection");
                        continue;
                    };
                    match encode_stream_frames(&message) {
                        Ok(bytes) => {
                            if tx.send(bytes).await.is_err() {
                                debug!(conn = conn.0, "writer channel closed before send");
                            }
                        }
                        Err(err) => warn!(?err, conn = conn.0, "failed to encode outbound frame"),
                    }
                }
                Outbound::Close(conn) => {
                    router_writers.lock().await.remove(&conn);
                }
            }
        }
    });

    let _ = std::fs::remove_file(&config.socket_path);
    let listener = UnixListener::bind(&config.socket_path)
        .with_context(|| format!("binding unix socket at {}", config.socket_path))?;
    info!(socket = %config.socket_path, "purcmcd listening");

    let next_conn = AtomicU64::new(1);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted.context("accept failed")?;
                let conn = ConnId(next_conn.fetch_add(1, Ordering::Relaxed));
                spawn_connection(stream, conn, inbound_tx.clone(), writers.clone()).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down on ctrl-c");
                break;
            }
        }
    }

    drop(inbound_tx);
    let _ = loop_handle.await;
    let _ = router_handle.await;

    Ok(())
}

async fn spawn_connection(stream: UnixStream, conn: ConnId, inbound_tx: mpsc::Sender<Inbound>, writers: WriterMap) {
    let (mut reader, mut writer) = stream.into_split();
    let (writer_tx, mut writer_rx) = mpsc::channel::<Vec<u8>>(256);
    writers.lock().await.insert(conn, writer_tx);

    tokio::spawn(async move {
        while let Some(bytes) = writer_rx.recv().await {
            if writer.write_all(&bytes).await.is_err() {
                break;
            }
        }
    });

    let _ = inbound_tx.send(Inbound::Connected(conn)).await;

    tokio::spawn(async move {
        let mut reassembler = StreamReassembler::new();
        let mut acc = BytesMut::with_capacity(16 * 1024);
        let mut read_buf = vec![0u8; 16 * 1024];

        loop {
            let n = match reader.read(&mut read_buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            acc.extend_from_slice(&read_buf[..n]);

            match reassembler.feed(&mut acc) {
                Ok(messages) => {
                    for message in messages {
                        if inbound_tx.send(Inbound::Frame(conn, message)).await.is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    warn!(?err, conn = conn.0, "frame decode error, closing connection");
                    break;
                }
            }
        }

        writers.lock().await.remove(&conn);
        let _ = inbound_tx.send(Inbound::Disconnected(conn)).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use purcmc_proto::{Message, MsgType, Target};
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn connection_receives_a_greeting_then_a_startsession_response() {
        let renderer = Renderer::with_timeouts(ReferenceBackend::default(), Duration::from_secs(60), Duration::from_secs(90));
        let mut event_loop = EventLoop::new(renderer, Duration::from_secs(3600));
        let (inbound_tx, inbound_rx) = mpsc::channel::<Inbound>(8);
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(8);

        let loop_handle = tokio::spawn(async move {
            event_loop.run(inbound_rx, outbound_tx).await;
        });

        let conn = ConnId(1);
        inbound_tx.send(Inbound::Connected(conn)).await.unwrap();
        let Outbound::Send(greeted, greeting) = timeout(Duration::from_secs(1), outbound_rx.recv())
            .await
            .expect("greeting arrives")
            .expect("outbound channel open")
        else {
            panic!("expected a Send action");
        };
        assert_eq!(greeted, conn);
        assert_eq!(greeting.msg_type, MsgType::Response);

        let mut request = Message::request("startSession", Target::Session, 0);
        request.request_id = Some("r1".into());
        request.source_uri = Some("edpt://localhost/app/runner".into());
        inbound_tx.send(Inbound::Frame(conn, request)).await.unwrap();

        let Outbound::Send(responded, response) = timeout(Duration::from_secs(1), outbound_rx.recv())
            .await
            .expect("response arrives")
            .expect("outbound channel open")
        else {
            panic!("expected a Send action");
        };
        assert_eq!(responded, conn);
        assert_eq!(response.msg_type, MsgType::Response);
        assert_eq!(response.request_id.as_deref(), Some("r1"));

        drop(inbound_tx);
        let _ = loop_handle.await;
    }
}
