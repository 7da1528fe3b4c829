// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Session store and handle validation.
//!
//! Every handle a client ever sees (a workspace, a page, a widget, a
//! uDOM) is minted from the session that created it and recorded there
//! with its kind, so validation never trusts a bare number from the
//! wire without checking it against the issuing session.

use std::collections::HashMap;

use crate::endpoint::EndpointId;
use crate::error::{PurcmcError, Result};

/// A numeric handle minted by a session. Unlike the original's
/// pointer-as-handle, this is a per-session monotonic counter value —
/// there is no shared arena or generation scheme, since handles from one
/// session are never valid in another (see `SessionHandles::validate`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(u64);

impl HandleId {
    /// The raw numeric value, as carried in `targetValue`/`elementValue`.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Wrap a raw value already fixed by some other arena (workspace,
    /// widget, or uDOM index) as a session handle.
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }
}

/// What kind of object a [`HandleId`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// A workspace.
    Workspace,
    /// A plain-window page.
    PlainWindow,
    /// A tabbed-window widget.
    TabbedWindow,
    /// A generic container widget.
    Container,
    /// A tabbed-page widget.
    Widget,
    /// A uDOM bound to a page.
    Udom,
}

/// One client session, owning every handle it has ever been issued.
pub struct Session {
    endpoint_id: EndpointId,
    all_handles: HashMap<HandleId, HandleKind>,
    next_handle: u64,
}

impl Session {
    /// Create a new, empty session for the given endpoint.
    #[must_use]
    pub fn new(endpoint_id: EndpointId) -> Self {
        Self {
            endpoint_id,
            all_handles: HashMap::new(),
            next_handle: 1,
        }
    }

    /// The endpoint this session belongs to.
    #[must_use]
    pub const fn endpoint_id(&self) -> EndpointId {
        self.endpoint_id
    }

    /// Mint a new handle of the given kind, owned by this session, using
    /// this session's own counter. Used for handles with no natural
    /// underlying arena index of their own.
    pub fn mint_handle(&mut self, kind: HandleKind) -> HandleId {
        let id = HandleId(self.next_handle);
        self.next_handle += 1;
        self.all_handles.insert(id, kind);
        id
    }

    /// Record a handle whose numeric value is already fixed by some
    /// other arena (a workspace, widget, or uDOM index) rather than this
    /// session's own counter.
    pub fn record_handle(&mut self, handle: HandleId, kind: HandleKind) {
        self.all_handles.insert(handle, kind);
    }

    /// Drop a handle this session no longer owns (its target was
    /// destroyed).
    pub fn forget_handle(&mut self, handle: HandleId) {
        self.all_handles.remove(&handle);
    }

    /// Look up the kind of a handle owned by this session.
    #[must_use]
    pub fn find_handle(&self, handle: HandleId) -> Option<HandleKind> {
        self.all_handles.get(&handle).copied()
    }

    /// Validate that `handle` belongs to this session and has the
    /// expected kind, mapping absence/kind-mismatch onto the wire-level
    /// error kinds a handler should surface.
    pub fn validate(&self, handle: HandleId, expected: HandleKind) -> Result<()> {
        match self.all_handles.get(&handle) {
            None => Err(PurcmcError::NotFound(format!(
                "handle {} not found in session",
                handle.value()
            ))),
            Some(kind) if *kind == expected => Ok(()),
            Some(_) => Err(PurcmcError::WrongHandleKind),
        }
    }

    /// Number of live handles owned by this session.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.all_handles.len()
    }
}

/// Opaque identity for a session, one per registered endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub(crate) EndpointId);

impl SessionId {
    /// Wrap an `EndpointId` as a `SessionId`, for use by tests in other
    /// modules that need a distinct identity without a full registry.
    #[cfg(test)]
    #[must_use]
    pub(crate) const fn from_endpoint_for_test(id: EndpointId) -> Self {
        Self(id)
    }

    /// The endpoint this session is attached to; every session has
    /// exactly one, since sessions are created one-per-endpoint.
    #[must_use]
    pub const fn endpoint_id(self) -> EndpointId {
        self.0
    }
}

impl From<EndpointId> for SessionId {
    fn from(id: EndpointId) -> Self {
        Self(id)
    }
}

/// The renderer-wide table of sessions, one per connected endpoint.
#[derive(Default)]
pub struct SessionStore {
    sessions: HashMap<EndpointId, Session>,
}

impl SessionStore {
    /// Create an empty session store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a session for a freshly-registered endpoint.
    pub fn create(&mut self, endpoint_id: EndpointId) -> SessionId {
        self.sessions.insert(endpoint_id, Session::new(endpoint_id));
        SessionId(endpoint_id)
    }

    /// Remove a session, e.g. on `endSession` or endpoint teardown.
    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        self.sessions.remove(&id.0)
    }

    /// Borrow a session.
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id.0)
    }

    /// Mutably borrow a session.
    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id.0)
    }
}
