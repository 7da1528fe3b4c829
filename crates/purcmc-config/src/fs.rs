// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed [`ConfigStore`] rooted at the platform config directory.

use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;

use crate::config::{ConfigError, ConfigStore};

/// Store configs as JSON files under the platform config directory (e.g.
/// `~/.config/purcmc` on Linux).
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Create a store rooted at the user config directory.
    pub fn new() -> Result<Self, ConfigError> {
        let proj = ProjectDirs::from("dev", "flyingrobots", "purcmc")
            .ok_or_else(|| ConfigError::Other("could not resolve config dir".into()))?;
        let base = proj.config_dir().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// Create a store rooted at an arbitrary directory, bypassing platform
    /// resolution. Used by tests and by deployments that pin config under a
    /// specific directory.
    pub fn at(base: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let base = base.into();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let filename = format!("{key}.json");
        self.base.join(filename)
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let path = self.path_for(key);
        match fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigService, RendererConfig};

    #[test]
    fn round_trips_through_a_temp_directory() {
        let dir = std::env::temp_dir().join(format!(
            "purcmc-config-test-{:?}",
            std::thread::current().id()
        ));
        let store = FsConfigStore::at(&dir).expect("store should create its directory");
        let service = ConfigService::new(store);

        let mut config = RendererConfig::default();
        config.ws_bind_addr = "0.0.0.0:9000".to_owned();
        service
            .save_renderer_config(&config)
            .expect("save should succeed");

        let loaded = service.load_renderer_config().expect("load should succeed");
        assert_eq!(loaded, config);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_key_reports_not_found() {
        let dir = std::env::temp_dir().join(format!(
            "purcmc-config-test-missing-{:?}",
            std::thread::current().id()
        ));
        let store = FsConfigStore::at(&dir).expect("store should create its directory");
        let err = store.load_raw("nonexistent").expect_err("key should be absent");
        assert!(matches!(err, ConfigError::NotFound));
        let _ = fs::remove_dir_all(&dir);
    }
}
