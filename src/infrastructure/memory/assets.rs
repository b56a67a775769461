//! In-memory asset fetcher with per-asset latency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time;

use crate::domain::errors::AssetError;
use crate::domain::models::{AssetId, InventoryItem, WearableAsset, WearableType};
use crate::domain::ports::AssetFetcher;

#[derive(Debug, Default)]
struct AssetTable {
    assets: HashMap<AssetId, WearableAsset>,
    delays: HashMap<AssetId, Duration>,
}

/// Serves registered wearable assets; unregistered ids fetch as missing.
#[derive(Debug, Default)]
pub struct InMemoryAssets {
    table: Mutex<AssetTable>,
    default_delay: Mutex<Duration>,
    fail_defaults: AtomicBool,
    fetches: AtomicUsize,
}

impl InMemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, AssetTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, asset: WearableAsset) {
        self.table().assets.insert(asset.asset_id, asset);
    }

    /// Register the asset behind a wearable inventory item. Items that are
    /// not wearables are ignored.
    pub fn register_item(&self, item: &InventoryItem) {
        if let (Some(asset_id), Some(wearable_type)) = (item.asset_id, item.wearable_type) {
            self.register(WearableAsset::new(asset_id, wearable_type, item.name.clone()));
        }
    }

    pub fn remove(&self, asset_id: AssetId) {
        self.table().assets.remove(&asset_id);
    }

    /// Delay fetches of `asset_id` by `delay`.
    pub fn delay(&self, asset_id: AssetId, delay: Duration) {
        self.table().delays.insert(asset_id, delay);
    }

    pub fn set_default_delay(&self, delay: Duration) {
        *self.default_delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Make `create_default_wearable` fail.
    pub fn fail_default_wearables(&self, fail: bool) {
        self.fail_defaults.store(fail, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetFetcher for InMemoryAssets {
    async fn fetch_wearable_asset(
        &self,
        asset_id: AssetId,
        wearable_type: WearableType,
    ) -> Result<Option<WearableAsset>, AssetError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = self
            .table()
            .delays
            .get(&asset_id)
            .copied()
            .unwrap_or_else(|| *self.default_delay.lock().unwrap_or_else(PoisonError::into_inner));
        if !delay.is_zero() {
            time::sleep(delay).await;
        }
        Ok(self
            .table()
            .assets
            .get(&asset_id)
            .filter(|asset| asset.wearable_type == wearable_type)
            .cloned())
    }

    async fn create_default_wearable(
        &self,
        wearable_type: WearableType,
    ) -> Result<WearableAsset, AssetError> {
        if self.fail_defaults.load(Ordering::SeqCst) {
            return Err(AssetError::DefaultUnavailable(wearable_type));
        }
        let asset = WearableAsset::new(AssetId::new(), wearable_type, format!("New {wearable_type}"));
        self.register(asset.clone());
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fetch_honours_delay() {
        let assets = InMemoryAssets::new();
        let asset = WearableAsset::new(AssetId::new(), WearableType::Hair, "Hair");
        assets.register(asset.clone());
        assets.delay(asset.asset_id, Duration::from_secs(5));

        let start = time::Instant::now();
        let fetched = assets
            .fetch_wearable_asset(asset.asset_id, WearableType::Hair)
            .await
            .unwrap();
        assert_eq!(fetched, Some(asset));
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unknown_asset_is_missing() {
        let assets = InMemoryAssets::new();
        let fetched = assets
            .fetch_wearable_asset(AssetId::new(), WearableType::Shirt)
            .await
            .unwrap();
        assert!(fetched.is_none());
        assert_eq!(assets.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_default_wearable_is_registered() {
        let assets = InMemoryAssets::new();
        let created = assets.create_default_wearable(WearableType::Pants).await.unwrap();
        let fetched = assets
            .fetch_wearable_asset(created.asset_id, WearableType::Pants)
            .await
            .unwrap();
        assert_eq!(fetched, Some(created));

        assets.fail_default_wearables(true);
        assert!(assets.create_default_wearable(WearableType::Pants).await.is_err());
    }
}
