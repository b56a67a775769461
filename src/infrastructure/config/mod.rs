//! Configuration loading
//!
//! Layers serialized defaults, the project and local YAML files under
//! `.cofsync/` and `COFSYNC_*` environment variables with figment, then
//! validates the merged [`Config`](crate::domain::models::Config).

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
