// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Endpoint registry: tracks every connected client by URI and by
//! living-time, and sweeps silent endpoints on a timer.

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use crate::error::{PurcmcError, Result};

/// Opaque identity for a registered endpoint, stable for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointId(u64);

/// Why an endpoint was removed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
    /// The peer closed its transport cleanly.
    PeerClosed,
    /// The liveness sweep evicted it after `NO_RESPONDING_TIME`.
    NoResponding,
    /// The renderer is shutting down.
    Shutdown,
}

/// What the sweep wants the caller to do about one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepAction {
    /// Send a liveness ping; the endpoint is still within its grace window.
    Ping(EndpointId),
    /// The endpoint exceeded `NO_RESPONDING_TIME`; it has already been
    /// removed from the registry and should be disconnected.
    Evict(EndpointId),
}

/// A single registered client connection.
#[derive(Debug, Clone)]
pub struct Endpoint {
    id: EndpointId,
    uri: String,
    t_created: Instant,
    t_living: Instant,
}

impl EndpointId {
    /// Construct an `EndpointId` from a raw value, for use by tests in
    /// other modules that need a distinct identity without going
    /// through a full registry.
    #[cfg(test)]
    #[must_use]
    pub(crate) const fn from_raw_for_test(value: u64) -> Self {
        Self(value)
    }

    /// The raw numeric value, used directly as the session handle
    /// carried in `targetValue` for session-scoped requests.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Reconstruct an `EndpointId` from a session handle taken off the
    /// wire (`targetValue` on a `SESSION`-scoped request).
    #[must_use]
    pub const fn from_handle(value: u64) -> Self {
        Self(value)
    }
}

impl Endpoint {
    /// This endpoint's stable identity.
    #[must_use]
    pub const fn id(&self) -> EndpointId {
        self.id
    }

    /// The endpoint's `edpt://host/app/runner` URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// When this endpoint first registered.
    #[must_use]
    pub const fn created_at(&self) -> Instant {
        self.t_created
    }
}

/// Per-renderer table of connected endpoints, ordered by living-time for
/// cheap oldest-first liveness sweeps.
///
/// The ordering structure is a `BTreeSet<(Instant, EndpointId)>` rather
/// than the original's AVL tree — any balanced ordered structure keyed on
/// `(t_living, endpoint_id)` satisfies the oldest-first sweep contract,
/// and `BTreeSet` is the idiomatic choice for that shape in Rust.
pub struct EndpointRegistry {
    by_uri: HashMap<String, EndpointId>,
    endpoints: HashMap<EndpointId, Endpoint>,
    by_living_time: BTreeSet<(Instant, EndpointId)>,
    next_id: u64,
    master: Option<EndpointId>,
    ping_time: Duration,
    no_responding_time: Duration,
}

impl EndpointRegistry {
    /// Build a registry using the given liveness timeouts.
    #[must_use]
    pub fn new(ping_time: Duration, no_responding_time: Duration) -> Self {
        Self {
            by_uri: HashMap::new(),
            endpoints: HashMap::new(),
            by_living_time: BTreeSet::new(),
            next_id: 1,
            master: None,
            ping_time,
            no_responding_time,
        }
    }

    /// Register a newly-connected endpoint. Fails with
    /// [`PurcmcError::Duplicated`] if `uri` is already registered.
    pub fn register(&mut self, uri: impl Into<String>, now: Instant) -> Result<EndpointId> {
        let uri = uri.into();
        if self.by_uri.contains_key(&uri) {
            return Err(PurcmcError::Duplicated);
        }
        let id = EndpointId(self.next_id);
        self.next_id += 1;

        self.by_uri.insert(uri.clone(), id);
        self.by_living_time.insert((now, id));
        self.endpoints.insert(
            id,
            Endpoint {
                id,
                uri,
                t_created: now,
                t_living: now,
            },
        );
        if self.master.is_none() {
            self.master = Some(id);
        }
        Ok(id)
    }

    /// Look up an endpoint by URI.
    #[must_use]
    pub fn retrieve(&self, uri: &str) -> Option<&Endpoint> {
        self.by_uri.get(uri).and_then(|id| self.endpoints.get(id))
    }

    /// Look up an endpoint by id.
    #[must_use]
    pub fn get(&self, id: EndpointId) -> Option<&Endpoint> {
        self.endpoints.get(&id)
    }

    /// The first endpoint ever registered; immutable until the renderer
    /// tears down.
    #[must_use]
    pub const fn master(&self) -> Option<EndpointId> {
        self.master
    }

    /// Number of currently-registered endpoints.
    #[must_use]
    pub fn count(&self) -> usize {
        self.endpoints.len()
    }

    /// Remove an endpoint, dropping both indices. `master` is left as-is
    /// even when the removed endpoint was master — it stays immutable
    /// until the renderer itself tears down, so no later registration
    /// can be promoted in its place.
    pub fn remove(&mut self, id: EndpointId, _cause: RemovalCause) -> Option<Endpoint> {
        let endpoint = self.endpoints.remove(&id)?;
        self.by_uri.remove(&endpoint.uri);
        self.by_living_time.remove(&(endpoint.t_living, id));
        Some(endpoint)
    }

    /// Re-key an endpoint's living-time entry after a successful
    /// response/ping exchange.
    pub fn touch(&mut self, id: EndpointId, now: Instant) {
        if let Some(endpoint) = self.endpoints.get_mut(&id) {
            let old_key = (endpoint.t_living, id);
            endpoint.t_living = now;
            self.by_living_time.remove(&old_key);
            self.by_living_time.insert((now, id));
        }
    }

    /// Walk the oldest-living endpoints, evicting anything past
    /// `no_responding_time` and requesting a ping for anything past
    /// `ping_time`, stopping at the first endpoint still within its
    /// grace window.
    pub fn sweep(&mut self, now: Instant) -> Vec<SweepAction> {
        let mut actions = Vec::new();
        let stale: Vec<(Instant, EndpointId)> = self
            .by_living_time
            .iter()
            .copied()
            .take_while(|(t_living, _)| {
                now.saturating_duration_since(*t_living) > self.ping_time
            })
            .collect();

        for (t_living, id) in stale {
            if now.saturating_duration_since(t_living) > self.no_responding_time {
                self.remove(id, RemovalCause::NoResponding);
                actions.push(SweepAction::Evict(id));
            } else {
                actions.push(SweepAction::Ping(id));
            }
        }
        actions
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn registry() -> EndpointRegistry {
        EndpointRegistry::new(Duration::from_secs(30), Duration::from_secs(60))
    }

    #[test]
    fn master_survives_its_own_removal() {
        let mut reg = registry();
        let now = Instant::now();
        let first = reg.register("edpt://localhost/app/a", now).expect("register");
        let second = reg.register("edpt://localhost/app/b", now).expect("register");
        assert_eq!(reg.master(), Some(first));

        reg.remove(first, RemovalCause::PeerClosed);
        assert_eq!(reg.master(), Some(first), "master is immutable until renderer teardown");

        let third = reg.register("edpt://localhost/app/c", now).expect("register");
        assert_ne!(reg.master(), Some(second));
        assert_ne!(reg.master(), Some(third));
        assert_eq!(reg.master(), Some(first));
    }
}
