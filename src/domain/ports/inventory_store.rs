//! Inventory store port.
//!
//! The store owns every inventory object and is the single source of truth
//! for folder versions. All mutations are asynchronous and may fail or never
//! answer; callers bound their waits.

use async_trait::async_trait;

use crate::domain::errors::InventoryError;
use crate::domain::models::{
    FolderId, FolderType, InventoryCategory, InventoryItem, ItemFilter, ItemId, NewItem, NewLink,
};

/// Access to the user's inventory tree.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Look up an item or link by id.
    ///
    /// # Returns
    /// * `Ok(Some(item))` if present
    /// * `Ok(None)` if unknown
    async fn get_item(&self, id: ItemId) -> Result<Option<InventoryItem>, InventoryError>;

    /// Look up a folder by id.
    async fn get_category(&self, id: FolderId)
        -> Result<Option<InventoryCategory>, InventoryError>;

    /// Find the system folder of a preferred type (COF, Lost And Found, ...).
    async fn find_category_for_type(
        &self,
        folder_type: FolderType,
    ) -> Result<Option<FolderId>, InventoryError>;

    /// Folders called `name` outside the trash, oldest first.
    async fn find_categories_by_name(&self, name: &str)
        -> Result<Vec<InventoryCategory>, InventoryError>;

    /// Create a folder and return its id.
    async fn create_category(
        &self,
        parent: Option<FolderId>,
        folder_type: FolderType,
        name: &str,
    ) -> Result<FolderId, InventoryError>;

    /// Create a link and return the new link's id.
    async fn create_link(&self, link: NewLink) -> Result<ItemId, InventoryError>;

    /// Copy an item into `parent` and return the copy's id.
    async fn copy_item(&self, item: ItemId, parent: FolderId) -> Result<ItemId, InventoryError>;

    /// Create a plain item and return its id.
    async fn create_item(&self, item: NewItem) -> Result<ItemId, InventoryError>;

    /// Remove an item or link permanently.
    async fn purge_object(&self, id: ItemId) -> Result<(), InventoryError>;

    /// Replace an item's description (ordering tags live here).
    async fn update_item_description(
        &self,
        id: ItemId,
        description: &str,
    ) -> Result<(), InventoryError>;

    /// All items below `folder` (recursively) that match `filter`.
    async fn collect_descendants(
        &self,
        folder: FolderId,
        filter: ItemFilter,
    ) -> Result<Vec<InventoryItem>, InventoryError>;

    /// Locally known version of a folder, `None` if unknown.
    async fn category_version(&self, folder: FolderId) -> Result<Option<i64>, InventoryError>;

    /// Refetch a folder from the authority and return its fresh version.
    async fn fetch_category(&self, folder: FolderId) -> Result<Option<i64>, InventoryError>;
}
