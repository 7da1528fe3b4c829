// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! A transport-agnostic event loop: one cooperative task that drains
//! inbound frames from every connection, drives them through
//! [`crate::dispatch`], and routes responses and side-channel events back
//! to whichever connection owns the addressed endpoint.
//!
//! Grounded on the session hub's per-connection channel pattern (a
//! reader task feeds frames in, a writer task drains frames out, the hub
//! itself never touches a socket): `purcmc-service` and
//! `purcmc-ws-gateway` each spawn one reader/writer pair per connection
//! and hand this loop an [`Inbound`]/[`Outbound`] channel pair, so the
//! state-machine logic is shared between the stream and WebSocket
//! transports instead of duplicated.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use purcmc_proto::{Message, StatusCode};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::backend::RendererBackend;
use crate::dispatch::dispatch;
use crate::endpoint::{EndpointId, RemovalCause};
use crate::renderer::Renderer;
use crate::session::SessionId;

/// A transport-assigned connection identity. Opaque to the core: stream
/// sockets can number connections however they like, a WebSocket
/// gateway likewise, as long as each stays unique for the connection's
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(pub u64);

/// One event arriving from a transport's accept/read loop.
pub enum Inbound {
    /// A new connection came up; no endpoint is associated with it yet
    /// (that only happens once its first `startSession` succeeds).
    Connected(ConnId),
    /// A complete frame was decoded on a connection.
    Frame(ConnId, Message),
    /// The connection was closed by its peer or by a transport error.
    Disconnected(ConnId),
}

/// One event the loop wants a transport to act on.
pub enum Outbound {
    /// Send `message` out over `conn`.
    Send(ConnId, Message),
    /// Close `conn`; its endpoint (if any) has already been torn down.
    Close(ConnId),
}

/// Drives a [`Renderer`] from a transport-fed [`Inbound`] channel,
/// writing [`Outbound`] actions to a paired channel. One loop instance
/// owns exactly one renderer, matching the "single cooperative thread
/// per renderer" model (§B.4.5): nothing here ever spawns a task of its
/// own.
pub struct EventLoop<B> {
    renderer: Renderer<B>,
    conn_to_endpoint: HashMap<ConnId, EndpointId>,
    endpoint_to_conn: HashMap<EndpointId, ConnId>,
    sweep_interval: Duration,
}

impl<B: RendererBackend> EventLoop<B> {
    /// Build a loop around `renderer`, sweeping for stale endpoints every
    /// `sweep_interval`.
    #[must_use]
    pub fn new(renderer: Renderer<B>, sweep_interval: Duration) -> Self {
        Self {
            renderer,
            conn_to_endpoint: HashMap::new(),
            endpoint_to_conn: HashMap::new(),
            sweep_interval,
        }
    }

    /// Borrow the renderer, e.g. for test setup or introspection.
    pub fn renderer(&self) -> &Renderer<B> {
        &self.renderer
    }

    /// Run until `inbound` is closed, driving `outbound` as a side
    /// effect. Each iteration either handles one transport event or runs
    /// a liveness sweep; nothing here blocks on a specific connection, so
    /// a single slow peer cannot starve the others.
    pub async fn run(&mut self, mut inbound: mpsc::Receiver<Inbound>, outbound: mpsc::Sender<Outbound>) {
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = inbound.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    self.handle_inbound(event, &outbound).await;
                }
                _ = sweep.tick() => {
                    self.handle_sweep(&outbound).await;
                }
            }
        }
    }

    async fn handle_inbound(&mut self, event: Inbound, outbound: &mpsc::Sender<Outbound>) {
        match event {
            Inbound::Connected(conn) => {
                debug!(conn = conn.0, "connection opened");
                let _ = outbound.send(Outbound::Send(conn, self.renderer.greeting())).await;
            }
            Inbound::Frame(conn, message) => {
                if let Some(&endpoint) = self.conn_to_endpoint.get(&conn) {
                    self.renderer.endpoints.touch(endpoint, Instant::now());
                }

                let op = message.operation.clone();
                let outcome = dispatch(&mut self.renderer, message);

                if let Some(op) = op.as_deref() {
                    self.track_session_lifecycle(conn, op, &outcome.response);
                }

                for (endpoint, event_msg) in outcome.events {
                    if let Some(&target_conn) = self.endpoint_to_conn.get(&endpoint) {
                        let _ = outbound.send(Outbound::Send(target_conn, event_msg)).await;
                    } else {
                        warn!(endpoint = endpoint.as_u64(), "event target has no live connection");
                    }
                }

                let _ = outbound.send(Outbound::Send(conn, outcome.response)).await;
            }
            Inbound::Disconnected(conn) => {
                if let Some(endpoint) = self.conn_to_endpoint.remove(&conn) {
                    self.endpoint_to_conn.remove(&endpoint);
                    let session_id = SessionId::from(endpoint);
                    self.renderer.sessions.remove(session_id);
                    let _ = self.renderer.backend_mut().remove_session(session_id);
                    self.renderer.endpoints.remove(endpoint, RemovalCause::PeerClosed);
                }
            }
        }
    }

    /// After a `startSession`/`endSession` request completes, learn or
    /// forget which connection an endpoint lives on. A failed
    /// `startSession` still carries `resultValue = Some(0)` (every error
    /// response does, per `MessageBuilder::status`), so this must check
    /// `retCode` too — otherwise a rejected `startSession` would bind the
    /// connection to the bogus endpoint handle `0`.
    fn track_session_lifecycle(&mut self, conn: ConnId, op: &str, response: &Message) {
        match op.to_ascii_lowercase().as_str() {
            "startsession" => {
                if response.ret_code.is_some_and(StatusCode::is_success) {
                    if let Some(value) = response.result_value {
                        let endpoint = EndpointId::from_handle(value);
                        self.conn_to_endpoint.insert(conn, endpoint);
                        self.endpoint_to_conn.insert(endpoint, conn);
                    }
                }
            }
            "endsession" => {
                if let Some(endpoint) = self.conn_to_endpoint.remove(&conn) {
                    self.endpoint_to_conn.remove(&endpoint);
                }
            }
            _ => {}
        }
    }

    async fn handle_sweep(&mut self, outbound: &mpsc::Sender<Outbound>) {
        let actions = self.renderer.sweep(Instant::now());
        for action in actions {
            self.apply_sweep_action(action, outbound).await;
        }
    }

    async fn apply_sweep_action(&mut self, action: crate::endpoint::SweepAction, outbound: &mpsc::Sender<Outbound>) {
        use crate::endpoint::SweepAction;
        match action {
            SweepAction::Ping(endpoint) => {
                if let Some(&conn) = self.endpoint_to_conn.get(&endpoint) {
                    let ping = Message::event("ping", purcmc_proto::Target::Session, endpoint.as_u64());
                    let _ = outbound.send(Outbound::Send(conn, ping)).await;
                }
            }
            SweepAction::Evict(endpoint) => {
                let session_id = SessionId::from(endpoint);
                self.renderer.sessions.remove(session_id);
                let _ = self.renderer.backend_mut().remove_session(session_id);
                if let Some(conn) = self.endpoint_to_conn.remove(&endpoint) {
                    self.conn_to_endpoint.remove(&conn);
                    let _ = outbound.send(Outbound::Close(conn)).await;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backend::NullBackend;
    use purcmc_proto::{MsgType, Target};

    /// A backend that actually accepts session creation, unlike
    /// [`NullBackend`] — needed to exercise the post-`startSession`
    /// tracking logic, which only runs once the handler's rollback
    /// doesn't fire.
    struct AcceptingBackend;

    impl RendererBackend for AcceptingBackend {
        fn create_session(&mut self, _session: SessionId) -> crate::error::Result<()> {
            Ok(())
        }

        fn remove_session(&mut self, _session: SessionId) -> crate::error::Result<()> {
            Ok(())
        }
    }

    fn sample_start_session(source_uri: &str) -> Message {
        let mut msg = Message::request("startSession", Target::Session, 0);
        msg.source_uri = Some(source_uri.into());
        msg
    }

    #[tokio::test]
    async fn start_session_binds_conn_to_endpoint() {
        let renderer = Renderer::new(AcceptingBackend);
        let mut event_loop = EventLoop::new(renderer, Duration::from_secs(3600));
        let (outbound_tx, mut outbound_rx) = mpsc::channel(8);

        event_loop
            .handle_inbound(
                Inbound::Frame(ConnId(1), sample_start_session("edpt://localhost/app/runner")),
                &outbound_tx,
            )
            .await;

        assert_eq!(event_loop.conn_to_endpoint.len(), 1);
        assert!(event_loop.conn_to_endpoint.contains_key(&ConnId(1)));

        let Outbound::Send(conn, response) = outbound_rx.try_recv().expect("a response was queued") else {
            panic!("expected a Send action");
        };
        assert_eq!(conn, ConnId(1));
        assert_eq!(response.msg_type, MsgType::Response);
        assert_eq!(response.ret_code, Some(purcmc_proto::StatusCode::Ok));
        assert!(response.result_value.is_some());
    }

    #[tokio::test]
    async fn failed_start_session_does_not_bind_the_connection() {
        // NullBackend rejects `create_session`, so the handler rolls the
        // endpoint back; the response still carries `resultValue =
        // Some(0)` (every error response does), which must not be
        // mistaken for a real endpoint handle.
        let renderer = Renderer::new(NullBackend);
        let mut event_loop = EventLoop::new(renderer, Duration::from_secs(3600));
        let (outbound_tx, mut outbound_rx) = mpsc::channel(8);

        event_loop
            .handle_inbound(
                Inbound::Frame(ConnId(1), sample_start_session("edpt://localhost/app/runner")),
                &outbound_tx,
            )
            .await;

        assert!(event_loop.conn_to_endpoint.is_empty());
        assert!(event_loop.endpoint_to_conn.is_empty());

        let Outbound::Send(_, response) = outbound_rx.try_recv().expect("a response was queued") else {
            panic!("expected a Send action");
        };
        assert_eq!(response.ret_code, Some(purcmc_proto::StatusCode::NotImplemented));
        assert_eq!(response.result_value, Some(0));
    }

    #[tokio::test]
    async fn connected_sends_an_unsolicited_greeting() {
        let renderer = Renderer::new(NullBackend);
        let mut event_loop = EventLoop::new(renderer, Duration::from_secs(3600));
        let (outbound_tx, mut outbound_rx) = mpsc::channel(8);

        event_loop
            .handle_inbound(Inbound::Connected(ConnId(7)), &outbound_tx)
            .await;

        let Outbound::Send(conn, greeting) = outbound_rx.try_recv().expect("a greeting was queued") else {
            panic!("expected a Send action");
        };
        assert_eq!(conn, ConnId(7));
        assert_eq!(greeting.msg_type, MsgType::Response);
        assert_eq!(greeting.request_id.as_deref(), Some(purcmc_proto::GREETING_REQUEST_ID));
    }

    #[tokio::test]
    async fn disconnect_tears_down_bound_endpoint() {
        let renderer = Renderer::new(AcceptingBackend);
        let mut event_loop = EventLoop::new(renderer, Duration::from_secs(3600));
        let (outbound_tx, _outbound_rx) = mpsc::channel(8);

        event_loop
            .handle_inbound(
                Inbound::Frame(ConnId(1), sample_start_session("edpt://localhost/app/runner")),
                &outbound_tx,
            )
            .await;
        assert_eq!(event_loop.conn_to_endpoint.len(), 1);

        event_loop
            .handle_inbound(Inbound::Disconnected(ConnId(1)), &outbound_tx)
            .await;
        assert!(event_loop.conn_to_endpoint.is_empty());
        assert!(event_loop.endpoint_to_conn.is_empty());
    }
}
