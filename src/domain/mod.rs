//! Domain layer for the appearance sync engine
//!
//! This module contains the inventory and wearable models, the error types and
//! the ports the services drive.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{AppearanceError, AppearanceResult, AssetError, InventoryError, SyncError};
