//! Core types shared by every stagehand crate: presenter identities, per-type
//! configuration, presenter sets and the configuration ingestion bundle.

/// Per-type presenter configuration and set definitions.
pub mod config;
/// Configuration error types.
pub mod error;
/// Async future aliases.
pub mod future;
/// Presenter type names and instance identities.
pub mod identity;

pub use config::{LAYER_RANGE, SetId, UiConfig, UiConfigs, UiSetConfig};
pub use error::{ConfigError, Result};
pub use future::BoxFutureStatic;
pub use identity::{InstanceIdentity, PresenterType};
