// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! RFC-6455 WebSocket transport for the PURCMC renderer. Each accepted
//! connection becomes one more `ConnId` feeding the same shared
//! `purcmc-core` event loop `purcmc-service` drives over Unix sockets,
//! so the identical dispatch logic is reachable over `ws://`/`wss://`
//! without a second implementation of the protocol.
//!
//! Grounded on `echo-session-ws-gateway`'s `axum`/`axum-server` wiring
//! and its `GatewayMetrics` shape, simplified to this protocol's needs
//! (no WARP stream bookkeeping — PURCMC has no analogous concept).

mod backend;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::ws::{Message as WsMessage, WebSocket},
    extract::{ConnectInfo, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use purcmc_config::{ConfigService, FsConfigStore, RendererConfig};
use purcmc_core::{ConnId, EventLoop, Inbound, Outbound, Renderer};
use purcmc_proto::wire::{decode_websocket_payload, encode_websocket_payload};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use backend::ReferenceBackend;

#[derive(Debug, Default, Serialize)]
struct GatewayMetrics {
    total_connections: u64,
    active_connections: usize,
    frames_in: u64,
    frames_out: u64,
    bytes_in: u64,
    bytes_out: u64,
    decode_errors: u64,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "PURCMC WebSocket gateway")]
struct Args {
    /// TCP listener for WebSocket clients.
    #[arg(long, default_value = "0.0.0.0:9417")]
    listen: SocketAddr,
    /// Optional allowed `Origin` header values (repeatable). If none are
    /// given, every origin is accepted.
    #[arg(long)]
    allow_origin: Vec<String>,
    /// TLS certificate (PEM). Requires `--tls-key` as well.
    #[arg(long)]
    tls_cert: Option<PathBuf>,
    /// TLS private key (PEM). Requires `--tls-cert` as well.
    #[arg(long)]
    tls_key: Option<PathBuf>,
    /// `tracing-subscriber` `EnvFilter` directive (overrides saved config).
    #[arg(long)]
    log_filter: Option<String>,
}

type WriterMap = Arc<Mutex<HashMap<ConnId, mpsc::Sender<WsMessage>>>>;

struct AppState {
    allow_origins: Option<std::collections::HashSet<String>>,
    inbound_tx: mpsc::Sender<Inbound>,
    writers: WriterMap,
    next_conn: AtomicU64,
    metrics: Mutex<GatewayMetrics>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_service: Option<ConfigService<FsConfigStore>> =
        FsConfigStore::new().map(ConfigService::new).ok();
    let mut config: RendererConfig = config_service
        .as_ref()
        .and_then(|svc| svc.load_renderer_config().ok())
        .unwrap_or_default();
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

    let allow_origins = if args.allow_origin.is_empty() {
        None
    } else {
        Some(args.allow_origin.iter().cloned().collect())
    };

    let state = Arc::new(AppState {
        allow_origins,
        inbound_tx,
        writers: writers.clone(),
        next_conn: AtomicU64::new(1),
        metrics: Mutex::new(GatewayMetrics::default()),
    });

    let router_state = state.clone();
    let router_handle = tokio::spawn(async move {
        while let Some(action) = outbound_rx.recv().await {
            match action {
                Outbound::Send(conn, message) => {
                    let tx = router_state.writers.lock().await.get(&conn).cloned();
                    let Some(tx) = tx else {
                        warn!(conn = conn.0, "no writer registered for connection");
                        continue;
                    };
                    match encode_websocket_payload(&message) {
                        Ok(bytes) => {
                            let mut metrics = router_state.metrics.lock().await;
                            metrics.frames_out += 1;
                            metrics.bytes_out += bytes.len() as u64;
                            drop(metrics);
                            let _ = tx.send(WsMessage::Binary(bytes.into())).await;
                        }
                        Err(err) => warn!(?err, conn = conn.0, "failed to encode outbound frame"),
                    }
                }
                Outbound::Close(conn) => {
                    if let Some(tx) = router_state.writers.lock().await.remove(&conn) {
                        let _ = tx.send(WsMessage::Close(None)).await;
                    }
                }
            }
        }
    });

    let app = Router::new()
        .route("/api/metrics", get(metrics_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let handle = Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        shutdown.shutdown();
    });

    match (args.tls_cert, args.tls_key) {
        (Some(cert), Some(key)) => {
            let tls_config = load_tls(cert, key).await.context("load tls config")?;
            info!(listen = %args.listen, "purcmc-ws-gatewayd listening (TLS)");
            axum_server::bind_rustls(args.listen, tls_config)
                .handle(handle)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await?;
        }
        (None, None) => {
            info!(listen = %args.listen, "purcmc-ws-gatewayd listening");
            axum_server::bind(args.listen)
                .handle(handle)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await?;
        }
        _ => return Err(anyhow!("must provide both --tls-cert and --tls-key or neither")),
    }

    let _ = loop_handle.await;
    let _ = router_handle.await;
    Ok(())
}

async fn load_tls(cert_path: PathBuf, key_path: PathBuf) -> Result<RustlsConfig> {
    let cfg = RustlsConfig::from_pem_file(cert_path, key_path).await?;
    Ok(cfg)
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.metrics.lock().await;
    Json(serde_json::to_value(&*snapshot).unwrap_or(serde_json::Value::Null))
}

fn origin_allowed(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(allowed) = &state.allow_origins else {
        return true;
    };
    headers
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|origin| allowed.contains(origin))
}

async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if !origin_allowed(&state, &headers) {
        warn!(?addr, "origin rejected");
        return StatusCode::FORBIDDEN.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, peer: SocketAddr) {
    let conn = ConnId(state.next_conn.fetch_add(1, Ordering::Relaxed));
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (writer_tx, mut writer_rx) = mpsc::channel::<WsMessage>(256);
    state.writers.lock().await.insert(conn, writer_tx);
    {
        let mut metrics = state.metrics.lock().await;
        metrics.total_connections += 1;
        metrics.active_connections += 1;
    }

    let writer = tokio::spawn(async move {
        while let Some(msg) = writer_rx.recv().await {
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    let _ = state.inbound_tx.send(Inbound::Connected(conn)).await;

    while let Some(frame) = ws_rx.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                warn!(?err, ?peer, conn = conn.0, "websocket read error");
                break;
            }
        };
        match frame {
            WsMessage::Binary(payload) => {
                {
                    let mut metrics = state.metrics.lock().await;
                    metrics.frames_in += 1;
                    metrics.bytes_in += payload.len() as u64;
                }
                match decode_websocket_payload(&payload) {
                    Ok(message) => {
                        if state.inbound_tx.send(Inbound::Frame(conn, message)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(?err, conn = conn.0, "failed to decode inbound frame");
                        let mut metrics = state.metrics.lock().await;
                        metrics.decode_errors += 1;
                    }
                }
            }
            WsMessage::Close(_) => break,
            // Ping/Pong/Text are handled in-band by axum, or never sent by a
            // conforming client; neither reaches the dispatcher as protocol
            // messages.
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Text(_) => {}
        }
    }

    state.writers.lock().await.remove(&conn);
    let _ = state.inbound_tx.send(Inbound::Disconnected(conn)).await;
    writer.abort();
    {
        let mut metrics = state.metrics.lock().await;
        metrics.active_connections = metrics.active_connections.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_allowlist_accepts_listed_origin_only() {
        let state = AppState {
            allow_origins: Some(["https://example.com".to_owned()].into_iter().collect()),
            inbound_tx: mpsc::channel(1).0,
            writers: Arc::new(Mutex::new(HashMap::new())),
            next_conn: AtomicU64::new(1),
            metrics: Mutex::new(GatewayMetrics::default()),
        };

        let mut allowed = HeaderMap::new();
        allowed.insert("origin", "https://example.com".parse().unwrap());
        assert!(origin_allowed(&state, &allowed));

        let mut rejected = HeaderMap::new();
        rejected.insert("origin", "https://evil.example".parse().unwrap());
        assert!(!origin_allowed(&state, &rejected));

        assert!(!origin_allowed(&state, &HeaderMap::new()));
    }

    #[test]
    fn no_allowlist_accepts_every_origin() {
        let state = AppState {
            allow_origins: None,
            inbound_tx: mpsc::channel(1).0,
            writers: Arc::new(Mutex::new(HashMap::new())),
            next_conn: AtomicU64::new(1),
            metrics: Mutex::new(GatewayMetrics::default()),
        };
        assert!(origin_allowed(&state, &HeaderMap::new()));
    }
}
