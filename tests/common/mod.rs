//! Common test utilities for integration tests
//!
//! Builds an appearance manager over the in-memory adapters with a seeded
//! inventory, and a recording appearance service.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cofsync::domain::models::{AssetType, Config, FolderId, FolderType, InventoryItem, ItemId, WearableType};
use cofsync::domain::ports::{AppearanceService, AppearanceUpdateResponse};
use cofsync::infrastructure::memory::{InMemoryAssets, InMemoryInventory, RecordingAvatar};
use cofsync::services::{AppearanceDeps, AppearanceEvent, AppearanceManager};
use cofsync::SyncError;
use tokio::sync::broadcast;

/// Accepts every appearance update and records the versions sent.
#[derive(Default)]
pub struct RecordingService {
    pub sent: Mutex<Vec<i64>>,
}

impl RecordingService {
    pub fn sent(&self) -> Vec<i64> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl AppearanceService for RecordingService {
    async fn update_appearance(&self, cof_version: i64) -> Result<AppearanceUpdateResponse, SyncError> {
        self.sent.lock().unwrap().push(cof_version);
        Ok(AppearanceUpdateResponse {
            success: true,
            ..Default::default()
        })
    }

    async fn increment_cof_version(&self) -> Result<i64, SyncError> {
        Err(SyncError::MissingCapability("IncrementCOFVersion"))
    }
}

pub struct World {
    pub inventory: Arc<InMemoryInventory>,
    pub assets: Arc<InMemoryAssets>,
    pub avatar: Arc<RecordingAvatar>,
    pub service: Arc<RecordingService>,
    pub manager: AppearanceManager,
    pub root: FolderId,
    pub cof: FolderId,
    pub clothing: FolderId,
}

pub async fn world() -> World {
    world_with(Config::default()).await
}

pub async fn world_with(config: Config) -> World {
    let inventory = Arc::new(InMemoryInventory::new());
    let assets = Arc::new(InMemoryAssets::new());
    let avatar = Arc::new(RecordingAvatar::new());
    let service = Arc::new(RecordingService::default());

    let deps = AppearanceDeps {
        store: inventory.clone(),
        assets: assets.clone(),
        avatar: avatar.clone(),
        service: service.clone(),
    };
    let manager = AppearanceManager::bootstrap(deps, config)
        .await
        .expect("manager should bootstrap");

    World {
        root: inventory.root().expect("root folder"),
        cof: inventory.cof().expect("COF"),
        clothing: inventory
            .system_folder(FolderType::Clothing)
            .expect("Clothing folder"),
        inventory,
        assets,
        avatar,
        service,
        manager,
    }
}

impl World {
    /// Create wearables in the Clothing folder, register their assets and
    /// link them into the COF.
    pub fn wearing(&self, wearables: &[(WearableType, &str)]) -> Vec<InventoryItem> {
        wearables
            .iter()
            .map(|&(wearable_type, name)| {
                let item = self.inventory.add_wearable(self.clothing, name, wearable_type);
                self.assets.register_item(&item);
                self.inventory.add_link(self.cof, &item, "");
                item
            })
            .collect()
    }

    /// Create an outfit folder holding the given wearables, with their
    /// assets registered.
    pub fn outfit(&self, name: &str, wearables: &[(WearableType, &str)]) -> (FolderId, Vec<InventoryItem>) {
        let folder = self.inventory.add_folder(self.root, FolderType::Outfit, name);
        let items = wearables
            .iter()
            .map(|&(wearable_type, item_name)| {
                let item = self.inventory.add_wearable(folder, item_name, wearable_type);
                self.assets.register_item(&item);
                item
            })
            .collect();
        (folder, items)
    }

    pub fn attachment(&self, folder: FolderId, name: &str) -> InventoryItem {
        self.inventory.add_object(folder, name, AssetType::Object)
    }

    /// Ids of the items the COF's item links point at.
    pub fn cof_linked_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self
            .inventory
            .items_in(self.cof)
            .iter()
            .filter(|item| !item.is_folder_link())
            .map(InventoryItem::linked_item_id)
            .collect();
        ids.sort();
        ids
    }

    pub fn cof_folder_links(&self) -> Vec<InventoryItem> {
        self.inventory
            .items_in(self.cof)
            .into_iter()
            .filter(InventoryItem::is_folder_link)
            .collect()
    }

    /// Names of the worn wearables of `wearable_type`.
    pub fn worn_names(&self, wearable_type: WearableType) -> Vec<String> {
        self.avatar
            .worn_of_type(wearable_type)
            .into_iter()
            .map(|w| w.name)
            .collect()
    }
}

pub fn sorted_ids(items: &[InventoryItem]) -> Vec<ItemId> {
    let mut ids: Vec<ItemId> = items.iter().map(|i| i.id).collect();
    ids.sort();
    ids
}

/// Everything published so far.
pub fn drain_events(receiver: &mut broadcast::Receiver<AppearanceEvent>) -> Vec<AppearanceEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

/// Setup test logging
#[allow(dead_code)]
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
