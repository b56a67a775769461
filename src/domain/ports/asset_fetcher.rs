use async_trait::async_trait;

use crate::domain::errors::AssetError;
use crate::domain::models::{AssetId, WearableAsset, WearableType};

/// Loads wearable asset data.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Fetch a wearable asset. `Ok(None)` means the asset does not exist or
    /// could not be loaded; the caller treats it as a missing wearable.
    async fn fetch_wearable_asset(
        &self,
        asset_id: AssetId,
        wearable_type: WearableType,
    ) -> Result<Option<WearableAsset>, AssetError>;

    /// Synthesize a default wearable of the given type.
    async fn create_default_wearable(
        &self,
        wearable_type: WearableType,
    ) -> Result<WearableAsset, AssetError>;
}
