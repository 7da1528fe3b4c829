// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Renderer configuration and the storage port it is loaded through.

use std::time::Duration;

use purcmc_proto::{
    DEFAULT_NO_RESPONDING_TIME_SECS, DEFAULT_PING_TIME_SECS, MAX_INMEM_PAYLOAD_SIZE,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Storage port for raw config blobs (keyed by logical name).
pub trait ConfigStore {
    /// Load a raw config blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw config blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Thin service that serializes config values and delegates storage to a
/// [`ConfigStore`].
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Consume the service and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> ConfigService<S>
where
    S: ConfigStore,
{
    /// Load and deserialize a config value for `key`. Returns `Ok(None)` if missing.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: DeserializeOwned,
    {
        match self.store.load_raw(key) {
            Ok(bytes) => {
                if bytes.is_empty() {
                    return Ok(None);
                }
                let value = serde_json::from_slice(&bytes)?;
                Ok(Some(value))
            }
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serialize and persist a config value for `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), ConfigError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }

    /// Load the renderer configuration, falling back to
    /// [`RendererConfig::default`] when nothing has been saved yet.
    pub fn load_renderer_config(&self) -> Result<RendererConfig, ConfigError> {
        Ok(self.load("renderer")?.unwrap_or_default())
    }

    /// Persist the renderer configuration.
    pub fn save_renderer_config(&self, config: &RendererConfig) -> Result<(), ConfigError> {
        self.save("renderer", config)
    }
}

/// Renderer-wide tunables: endpoint liveness timeouts, payload caps, the
/// stream-transport bind path, and the name new sessions get parked under
/// before they request a workspace of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererConfig {
    /// Seconds of silence from an endpoint before the renderer pings it.
    pub ping_time_secs: u64,
    /// Seconds of silence from an endpoint before it is evicted as
    /// unresponsive.
    pub no_responding_time_secs: u64,
    /// Ceiling on a fully-reassembled in-memory message payload, in bytes.
    pub max_inmem_payload_size: usize,
    /// Filesystem path of the Unix domain socket `purcmc-service` listens
    /// on.
    pub socket_path: String,
    /// TCP address `purcmc-ws-gateway` binds its WebSocket listener to.
    pub ws_bind_addr: String,
    /// Name of the workspace created for a session when it has not yet
    /// asked for one by name.
    pub default_workspace_name: String,
    /// `tracing-subscriber` `EnvFilter` directive used when no
    /// `RUST_LOG`/`PURCMC_LOG` environment override is present.
    pub log_filter: String,
}

impl RendererConfig {
    /// The configured ping interval as a [`Duration`].
    #[must_use]
    pub fn ping_time(&self) -> Duration {
        Duration::from_secs(self.ping_time_secs)
    }

    /// The configured no-responding eviction interval as a [`Duration`].
    #[must_use]
    pub fn no_responding_time(&self) -> Duration {
        Duration::from_secs(self.no_responding_time_secs)
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            ping_time_secs: DEFAULT_PING_TIME_SECS,
            no_responding_time_secs: DEFAULT_NO_RESPONDING_TIME_SECS,
            max_inmem_payload_size: MAX_INMEM_PAYLOAD_SIZE,
            socket_path: "/tmp/purcmc.sock".to_owned(),
            ws_bind_addr: "127.0.0.1:9417".to_owned(),
            default_workspace_name: "_default".to_owned(),
            log_filter: "info".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemStore {
        data: RefCell<HashMap<String, Vec<u8>>>,
    }

    impl ConfigStore for MemStore {
        fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
            self.data
                .borrow()
                .get(key)
                .cloned()
                .ok_or(ConfigError::NotFound)
        }

        fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
            self.data
                .borrow_mut()
                .insert(key.to_owned(), data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn missing_key_loads_default_renderer_config() {
        let service = ConfigService::new(MemStore::default());
        let loaded = service.load_renderer_config().expect("load should succeed");
        assert_eq!(loaded, RendererConfig::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let service = ConfigService::new(MemStore::default());
        let mut config = RendererConfig::default();
        config.socket_path = "/run/purcmc/custom.sock".to_owned();
        config.ping_time_secs = 30;

        service
            .save_renderer_config(&config)
            .expect("save should succeed");
        let loaded = service.load_renderer_config().expect("load should succeed");
        assert_eq!(loaded, config);
    }

    #[test]
    fn durations_derive_from_seconds_fields() {
        let config = RendererConfig {
            ping_time_secs: 5,
            no_responding_time_secs: 15,
            ..RendererConfig::default()
        };
        assert_eq!(config.ping_time(), Duration::from_secs(5));
        assert_eq!(config.no_responding_time(), Duration::from_secs(15));
    }
}
