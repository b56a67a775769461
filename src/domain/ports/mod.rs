//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - InventoryStore: inventory tree access and mutation
//! - AssetFetcher: wearable asset loading
//! - AppearanceService: the server-side appearance capabilities
//! - AvatarSink: the local avatar's wearable model
//!
//! These traits define the contracts that keep the sync engine independent
//! of a concrete viewer or transport.

pub mod appearance_service;
pub mod asset_fetcher;
pub mod avatar_sink;
pub mod inventory_store;

pub use appearance_service::{AppearanceService, AppearanceUpdateResponse};
pub use asset_fetcher::AssetFetcher;
pub use avatar_sink::AvatarSink;
pub use inventory_store::InventoryStore;
