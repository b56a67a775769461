pub mod config;
pub mod ids;
pub mod inventory;
pub mod wearable;

pub use config::{
    BatchConfig, Config, LoggingConfig, OutfitConfig, ResolutionConfig, RetryConfig, ServerConfig,
};
pub use ids::{AssetId, FolderId, ItemId};
pub use inventory::{
    AssetType, FolderType, InventoryCategory, InventoryItem, ItemFilter, LinkTarget, NewItem,
    NewLink,
};
pub use wearable::{FoundWearable, WearableAsset, WearableType};
