//! In-memory inventory store.
//!
//! Keeps items in insertion order so collections are deterministic. Each
//! folder carries a local version (what the client has seen) and a remote
//! version (what the authority holds); mutations bump both, `fetch_category`
//! brings the local one up to date.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::errors::InventoryError;
use crate::domain::models::{
    AssetId, AssetType, FolderId, FolderType, InventoryCategory, InventoryItem, ItemFilter, ItemId,
    LinkTarget, NewItem, NewLink, WearableType,
};
use crate::domain::ports::InventoryStore;

#[derive(Debug, Clone)]
enum StoredKind {
    Plain {
        asset_type: AssetType,
        wearable_type: Option<WearableType>,
        asset_id: AssetId,
    },
    Link(LinkTarget),
}

#[derive(Debug, Clone)]
struct StoredItem {
    id: ItemId,
    parent_id: FolderId,
    name: String,
    description: String,
    kind: StoredKind,
}

#[derive(Debug, Default)]
struct InventoryState {
    items: Vec<StoredItem>,
    categories: Vec<InventoryCategory>,
    remote_versions: HashMap<FolderId, i64>,
    failing_links: HashMap<ItemId, usize>,
    unanswered_links: HashSet<ItemId>,
}

impl InventoryState {
    fn item(&self, id: ItemId) -> Option<&StoredItem> {
        self.items.iter().find(|i| i.id == id)
    }

    fn category(&self, id: FolderId) -> Option<&InventoryCategory> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Resolve an item to the view callers see, following links.
    fn view(&self, stored: &StoredItem) -> InventoryItem {
        let mut view = InventoryItem {
            id: stored.id,
            parent_id: stored.parent_id,
            name: stored.name.clone(),
            description: stored.description.clone(),
            link: None,
            asset_type: None,
            wearable_type: None,
            asset_id: None,
        };
        match &stored.kind {
            StoredKind::Plain {
                asset_type,
                wearable_type,
                asset_id,
            } => {
                view.asset_type = Some(*asset_type);
                view.wearable_type = *wearable_type;
                view.asset_id = Some(*asset_id);
            }
            StoredKind::Link(LinkTarget::Folder(folder)) => {
                view.link = Some(LinkTarget::Folder(*folder));
                view.asset_type = Some(AssetType::Category);
            }
            StoredKind::Link(LinkTarget::Item(target)) => {
                view.link = Some(LinkTarget::Item(*target));
                if let Some(StoredItem {
                    kind:
                        StoredKind::Plain {
                            asset_type,
                            wearable_type,
                            asset_id,
                        },
                    ..
                }) = self.item(*target)
                {
                    view.asset_type = Some(*asset_type);
                    view.wearable_type = *wearable_type;
                    view.asset_id = Some(*asset_id);
                }
            }
        }
        view
    }

    fn is_within(&self, folder: FolderId, ancestor: FolderId) -> bool {
        let mut current = Some(folder);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.category(id).and_then(|c| c.parent_id);
        }
        false
    }

    fn bump(&mut self, folder: FolderId) {
        let remote = self.remote_versions.entry(folder).or_insert(0);
        *remote += 1;
        let remote = *remote;
        if let Some(category) = self.categories.iter_mut().find(|c| c.id == folder) {
            category.version = Some(remote);
        }
    }

    fn insert_category(&mut self, parent: Option<FolderId>, folder_type: FolderType, name: &str) -> FolderId {
        let id = FolderId::new();
        self.categories.push(InventoryCategory {
            id,
            parent_id: parent,
            name: name.to_string(),
            folder_type,
            version: Some(1),
        });
        self.remote_versions.insert(id, 1);
        id
    }

    fn insert_item(&mut self, item: StoredItem) -> ItemId {
        let id = item.id;
        let parent = item.parent_id;
        self.items.push(item);
        self.bump(parent);
        id
    }
}

/// Inventory store backed by process memory, with fault injection for links.
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    state: Mutex<InventoryState>,
    link_requests: AtomicUsize,
}

impl InMemoryInventory {
    /// An inventory with a root folder and the usual system folders.
    pub fn new() -> Self {
        let inventory = Self::bare();
        {
            let mut state = inventory.lock();
            let root = state
                .categories
                .first()
                .map(|c| c.id)
                .unwrap_or_default();
            state.insert_category(Some(root), FolderType::CurrentOutfit, "Current Outfit");
            state.insert_category(Some(root), FolderType::MyOutfits, "My Outfits");
            state.insert_category(Some(root), FolderType::LostAndFound, "Lost And Found");
            state.insert_category(Some(root), FolderType::Clothing, "Clothing");
            state.insert_category(Some(root), FolderType::Trash, "Trash");
        }
        inventory
    }

    /// An inventory holding only a root folder.
    pub fn bare() -> Self {
        let inventory = Self::default();
        inventory
            .lock()
            .insert_category(None, FolderType::Root, "My Inventory");
        inventory
    }

    fn lock(&self) -> MutexGuard<'_, InventoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn system_folder(&self, folder_type: FolderType) -> Option<FolderId> {
        self.lock()
            .categories
            .iter()
            .find(|c| c.folder_type == folder_type)
            .map(|c| c.id)
    }

    pub fn root(&self) -> Option<FolderId> {
        self.system_folder(FolderType::Root)
    }

    pub fn cof(&self) -> Option<FolderId> {
        self.system_folder(FolderType::CurrentOutfit)
    }

    pub fn add_folder(&self, parent: FolderId, folder_type: FolderType, name: &str) -> FolderId {
        let mut state = self.lock();
        let id = state.insert_category(Some(parent), folder_type, name);
        state.bump(parent);
        id
    }

    pub fn add_wearable(&self, folder: FolderId, name: &str, wearable_type: WearableType) -> InventoryItem {
        self.add_plain(folder, name, wearable_type.asset_type(), Some(wearable_type))
    }

    pub fn add_object(&self, folder: FolderId, name: &str, asset_type: AssetType) -> InventoryItem {
        self.add_plain(folder, name, asset_type, None)
    }

    fn add_plain(
        &self,
        folder: FolderId,
        name: &str,
        asset_type: AssetType,
        wearable_type: Option<WearableType>,
    ) -> InventoryItem {
        let mut state = self.lock();
        let stored = StoredItem {
            id: ItemId::new(),
            parent_id: folder,
            name: name.to_string(),
            description: String::new(),
            kind: StoredKind::Plain {
                asset_type,
                wearable_type,
                asset_id: AssetId::new(),
            },
        };
        let view = state.view(&stored);
        state.insert_item(stored);
        view
    }

    /// Link `target` into `folder` directly, bypassing fault injection.
    pub fn add_link(&self, folder: FolderId, target: &InventoryItem, description: &str) -> ItemId {
        let mut state = self.lock();
        state.insert_item(StoredItem {
            id: ItemId::new(),
            parent_id: folder,
            name: target.name.clone(),
            description: description.to_string(),
            kind: StoredKind::Link(LinkTarget::Item(target.linked_item_id())),
        })
    }

    /// Direct children of `folder`.
    pub fn items_in(&self, folder: FolderId) -> Vec<InventoryItem> {
        let state = self.lock();
        state
            .items
            .iter()
            .filter(|i| i.parent_id == folder)
            .map(|i| state.view(i))
            .collect()
    }

    /// Make the next `times` link requests to `target` fail.
    pub fn fail_links_to(&self, target: ItemId, times: usize) {
        self.lock().failing_links.insert(target, times);
    }

    /// Make link requests to `target` never answer.
    pub fn never_answer_links_to(&self, target: ItemId) {
        self.lock().unanswered_links.insert(target);
    }

    /// Advance the authoritative version without the local view noticing.
    pub fn bump_remote_version(&self, folder: FolderId) {
        let mut state = self.lock();
        *state.remote_versions.entry(folder).or_insert(0) += 1;
    }

    pub fn link_requests(&self) -> usize {
        self.link_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventory {
    async fn get_item(&self, id: ItemId) -> Result<Option<InventoryItem>, InventoryError> {
        let state = self.lock();
        Ok(state.item(id).map(|i| state.view(i)))
    }

    async fn get_category(&self, id: FolderId) -> Result<Option<InventoryCategory>, InventoryError> {
        Ok(self.lock().category(id).cloned())
    }

    async fn find_category_for_type(&self, folder_type: FolderType) -> Result<Option<FolderId>, InventoryError> {
        Ok(self.system_folder(folder_type))
    }

    async fn find_categories_by_name(&self, name: &str) -> Result<Vec<InventoryCategory>, InventoryError> {
        let state = self.lock();
        let trash = state
            .categories
            .iter()
            .find(|c| c.folder_type == FolderType::Trash)
            .map(|c| c.id);
        Ok(state
            .categories
            .iter()
            .filter(|c| c.name == name)
            .filter(|c| trash.is_none_or(|trash| !state.is_within(c.id, trash)))
            .cloned()
            .collect())
    }

    async fn create_category(
        &self,
        parent: Option<FolderId>,
        folder_type: FolderType,
        name: &str,
    ) -> Result<FolderId, InventoryError> {
        let mut state = self.lock();
        let parent = parent.or_else(|| {
            state
                .categories
                .iter()
                .find(|c| c.folder_type == FolderType::Root)
                .map(|c| c.id)
        });
        if let Some(parent) = parent {
            if state.category(parent).is_none() {
                return Err(InventoryError::CategoryNotFound(parent));
            }
        }
        let id = state.insert_category(parent, folder_type, name);
        if let Some(parent) = parent {
            state.bump(parent);
        }
        Ok(id)
    }

    async fn create_link(&self, link: NewLink) -> Result<ItemId, InventoryError> {
        self.link_requests.fetch_add(1, Ordering::SeqCst);

        let never_answer = match link.target {
            LinkTarget::Item(target) => self.lock().unanswered_links.contains(&target),
            LinkTarget::Folder(_) => false,
        };
        if never_answer {
            debug!(?link.target, "link request left unanswered");
            std::future::pending::<()>().await;
        }

        let mut state = self.lock();
        if state.category(link.parent).is_none() {
            return Err(InventoryError::CategoryNotFound(link.parent));
        }
        match link.target {
            LinkTarget::Item(target) => {
                if let Some(remaining) = state.failing_links.get_mut(&target) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(InventoryError::OperationFailed(format!(
                            "injected link failure for {target}"
                        )));
                    }
                }
                if state.item(target).is_none() {
                    return Err(InventoryError::ItemNotFound(target));
                }
            }
            LinkTarget::Folder(folder) => {
                if state.category(folder).is_none() {
                    return Err(InventoryError::CategoryNotFound(folder));
                }
            }
        }
        Ok(state.insert_item(StoredItem {
            id: ItemId::new(),
            parent_id: link.parent,
            name: link.name,
            description: link.description,
            kind: StoredKind::Link(link.target),
        }))
    }

    async fn copy_item(&self, item: ItemId, parent: FolderId) -> Result<ItemId, InventoryError> {
        let mut state = self.lock();
        if state.category(parent).is_none() {
            return Err(InventoryError::CategoryNotFound(parent));
        }
        let source = state.item(item).cloned().ok_or(InventoryError::ItemNotFound(item))?;
        Ok(state.insert_item(StoredItem {
            id: ItemId::new(),
            parent_id: parent,
            ..source
        }))
    }

    async fn create_item(&self, item: NewItem) -> Result<ItemId, InventoryError> {
        let mut state = self.lock();
        if state.category(item.parent).is_none() {
            return Err(InventoryError::CategoryNotFound(item.parent));
        }
        Ok(state.insert_item(StoredItem {
            id: ItemId::new(),
            parent_id: item.parent,
            name: item.name,
            description: String::new(),
            kind: StoredKind::Plain {
                asset_type: item.asset_type,
                wearable_type: item.wearable_type,
                asset_id: item.asset_id,
            },
        }))
    }

    async fn purge_object(&self, id: ItemId) -> Result<(), InventoryError> {
        let mut state = self.lock();
        let position = state
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or(InventoryError::ItemNotFound(id))?;
        let removed = state.items.remove(position);
        state.bump(removed.parent_id);
        Ok(())
    }

    async fn update_item_description(&self, id: ItemId, description: &str) -> Result<(), InventoryError> {
        let mut state = self.lock();
        let item = state
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(InventoryError::ItemNotFound(id))?;
        item.description = description.to_string();
        let parent = item.parent_id;
        state.bump(parent);
        Ok(())
    }

    async fn collect_descendants(
        &self,
        folder: FolderId,
        filter: ItemFilter,
    ) -> Result<Vec<InventoryItem>, InventoryError> {
        let state = self.lock();
        if state.category(folder).is_none() {
            return Err(InventoryError::CategoryNotFound(folder));
        }
        Ok(state
            .items
            .iter()
            .filter(|i| state.is_within(i.parent_id, folder))
            .map(|i| state.view(i))
            .filter(|i| filter.matches(i))
            .collect())
    }

    async fn category_version(&self, folder: FolderId) -> Result<Option<i64>, InventoryError> {
        let state = self.lock();
        let category = state
            .category(folder)
            .ok_or(InventoryError::CategoryNotFound(folder))?;
        Ok(category.version)
    }

    async fn fetch_category(&self, folder: FolderId) -> Result<Option<i64>, InventoryError> {
        let mut state = self.lock();
        let remote = state.remote_versions.get(&folder).copied();
        let category = state
            .categories
            .iter_mut()
            .find(|c| c.id == folder)
            .ok_or(InventoryError::CategoryNotFound(folder))?;
        category.version = remote;
        Ok(remote)
    }
}
