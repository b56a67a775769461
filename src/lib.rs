//! cofsync - Current Outfit Folder appearance sync engine
//!
//! Keeps an avatar's worn outfit, the Current Outfit Folder (COF) that
//! describes it, and the server's baked appearance consistent while outfit
//! changes, asset loads and server replies arrive out of order.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): inventory and wearable models, errors, ports
//! - **Service Layer** (`services`): COF composition, batched link/copy
//!   operations, wearable resolution, server sync and the manager facade
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging, the
//!   HTTP capability client and in-memory adapters
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use cofsync::{AppearanceDeps, AppearanceManager, Config};
//!
//! async fn wear(deps: AppearanceDeps, outfit: cofsync::FolderId) -> anyhow::Result<()> {
//!     let manager = AppearanceManager::bootstrap(deps, Config::default()).await?;
//!     manager.replace_current_outfit(outfit).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{AppearanceError, AppearanceResult, AssetError, InventoryError, SyncError};
pub use domain::models::{
    AssetId, AssetType, Config, FolderId, FolderType, FoundWearable, InventoryCategory,
    InventoryItem, ItemId, WearableAsset, WearableType,
};
pub use domain::ports::{AppearanceService, AssetFetcher, AvatarSink, InventoryStore};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    AppearanceDeps, AppearanceEvent, AppearanceEventPayload, AppearanceManager, SyncOutcome,
};
