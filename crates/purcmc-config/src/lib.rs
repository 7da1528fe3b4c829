// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed configuration for PurCMC renderers: the [`RendererConfig`] values
//! (liveness timeouts, payload caps, transport bind points), the generic
//! [`ConfigService`]/[`ConfigStore`] port it is loaded and saved through, and
//! a filesystem-backed [`FsConfigStore`] implementation.

mod config;
mod fs;

pub use config::{ConfigError, ConfigService, ConfigStore, RendererConfig};
pub use fs::FsConfigStore;
