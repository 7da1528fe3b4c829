// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The top-level state a single renderer instance owns: its endpoint
//! registry, session store, workspace table, and back end. Passed
//! explicitly to every handler rather than reached via a thread-local,
//! per §B.4.5.

use std::time::{Duration, Instant};

use purcmc_proto::{Message, DEFAULT_NO_RESPONDING_TIME_SECS, DEFAULT_PING_TIME_SECS};

use crate::backend::RendererBackend;
use crate::endpoint::EndpointRegistry;
use crate::session::SessionStore;
use crate::workspace::WorkspaceStore;

/// One renderer instance: a single cooperative owner of its endpoint,
/// session, and workspace state, parameterized over the back end that
/// performs the actual rendering work.
pub struct Renderer<B> {
    pub(crate) endpoints: EndpointRegistry,
    pub(crate) sessions: SessionStore,
    pub(crate) workspaces: WorkspaceStore,
    pub(crate) backend: B,
}

impl<B: RendererBackend> Renderer<B> {
    /// Build a renderer with the default liveness timeouts
    /// (`PING_TIME=60s`, `NO_RESPONDING_TIME=90s`).
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_timeouts(
            backend,
            Duration::from_secs(DEFAULT_PING_TIME_SECS),
            Duration::from_secs(DEFAULT_NO_RESPONDING_TIME_SECS),
        )
    }

    /// Build a renderer with explicit liveness timeouts, as loaded from
    /// `purcmc-config`.
    #[must_use]
    pub fn with_timeouts(backend: B, ping_time: Duration, no_responding_time: Duration) -> Self {
        Self {
            endpoints: EndpointRegistry::new(ping_time, no_responding_time),
            sessions: SessionStore::new(),
            workspaces: WorkspaceStore::new(),
            backend,
        }
    }

    /// The endpoint registry.
    #[must_use]
    pub const fn endpoints(&self) -> &EndpointRegistry {
        &self.endpoints
    }

    /// The session store.
    #[must_use]
    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// The workspace table.
    #[must_use]
    pub const fn workspaces(&self) -> &WorkspaceStore {
        &self.workspaces
    }

    /// The back end.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Run one liveness sweep at `now`, returning what the embedding
    /// transport should do with each stale endpoint.
    pub fn sweep(&mut self, now: Instant) -> Vec<crate::endpoint::SweepAction> {
        self.endpoints.sweep(now)
    }

    /// The unsolicited greeting to send a freshly-accepted connection
    /// before it has sent `startSession`, naming this back end and the
    /// protocol it speaks.
    #[must_use]
    pub fn greeting(&self) -> Message {
        Message::greeting(self.backend.renderer_name(), self.backend.renderer_version(), "HTML:5.3")
    }
}
