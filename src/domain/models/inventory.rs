//! Inventory items, folders and the request shapes used to mutate them.

use serde::{Deserialize, Serialize};

use super::ids::{AssetId, FolderId, ItemId};
use super::wearable::WearableType;

/// Asset type of an inventory item, after following any link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Clothing,
    BodyPart,
    /// Attachment.
    Object,
    Gesture,
    Category,
    Other,
}

impl AssetType {
    pub const fn is_wearable(self) -> bool {
        matches!(self, Self::Clothing | Self::BodyPart)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clothing => "clothing",
            Self::BodyPart => "body_part",
            Self::Object => "object",
            Self::Gesture => "gesture",
            Self::Category => "category",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preferred type of an inventory folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderType {
    CurrentOutfit,
    Outfit,
    MyOutfits,
    LostAndFound,
    Clothing,
    Gesture,
    Trash,
    Root,
    None,
}

/// What a link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LinkTarget {
    Item(ItemId),
    Folder(FolderId),
}

/// An inventory item or link.
///
/// For links, `asset_type`, `wearable_type` and `asset_id` describe the linked
/// item. A broken link (target missing) has all three set to `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub parent_id: FolderId,
    pub name: String,
    /// The item's own description. On COF links this carries the ordering tag.
    pub description: String,
    pub link: Option<LinkTarget>,
    pub asset_type: Option<AssetType>,
    pub wearable_type: Option<WearableType>,
    pub asset_id: Option<AssetId>,
}

impl InventoryItem {
    /// Plain (non-link) wearable item.
    pub fn wearable(
        parent_id: FolderId,
        name: impl Into<String>,
        wearable_type: WearableType,
        asset_id: AssetId,
    ) -> Self {
        Self {
            id: ItemId::new(),
            parent_id,
            name: name.into(),
            description: String::new(),
            link: None,
            asset_type: Some(wearable_type.asset_type()),
            wearable_type: Some(wearable_type),
            asset_id: Some(asset_id),
        }
    }

    /// Plain item of a non-wearable asset type (attachment, gesture, ...).
    pub fn object(
        parent_id: FolderId,
        name: impl Into<String>,
        asset_type: AssetType,
        asset_id: AssetId,
    ) -> Self {
        Self {
            id: ItemId::new(),
            parent_id,
            name: name.into(),
            description: String::new(),
            link: None,
            asset_type: Some(asset_type),
            wearable_type: None,
            asset_id: Some(asset_id),
        }
    }

    pub const fn is_link(&self) -> bool {
        self.link.is_some()
    }

    pub const fn is_folder_link(&self) -> bool {
        matches!(self.link, Some(LinkTarget::Folder(_)))
    }

    /// Link whose target could not be found.
    pub const fn is_broken_link(&self) -> bool {
        matches!(self.link, Some(LinkTarget::Item(_))) && self.asset_type.is_none()
    }

    /// Identity of the underlying item: the link target for item links, the
    /// item itself otherwise.
    pub const fn linked_item_id(&self) -> ItemId {
        match self.link {
            Some(LinkTarget::Item(target)) => target,
            _ => self.id,
        }
    }

    pub const fn linked_folder_id(&self) -> Option<FolderId> {
        match self.link {
            Some(LinkTarget::Folder(folder)) => Some(folder),
            _ => None,
        }
    }

    pub fn is_wearable(&self) -> bool {
        self.asset_type.is_some_and(AssetType::is_wearable) && self.wearable_type.is_some()
    }

    pub fn is_body_part(&self) -> bool {
        self.asset_type == Some(AssetType::BodyPart)
    }

    pub fn is_clothing(&self) -> bool {
        self.asset_type == Some(AssetType::Clothing)
    }

    pub fn is_of_asset_type(&self, asset_type: AssetType) -> bool {
        self.asset_type == Some(asset_type)
    }
}

/// An inventory folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryCategory {
    pub id: FolderId,
    pub parent_id: Option<FolderId>,
    pub name: String,
    pub folder_type: FolderType,
    /// Incremented by the store on every content change. `None` when unknown.
    pub version: Option<i64>,
}

/// Selects items when collecting folder descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemFilter {
    AssetType(AssetType),
    Wearables,
    WearableOfType(WearableType),
    Links,
    FolderLinks,
    All,
}

impl ItemFilter {
    pub fn matches(self, item: &InventoryItem) -> bool {
        match self {
            Self::AssetType(asset_type) => item.is_of_asset_type(asset_type),
            Self::Wearables => item.is_wearable(),
            Self::WearableOfType(wearable_type) => item.wearable_type == Some(wearable_type),
            Self::Links => item.is_link(),
            Self::FolderLinks => item.is_folder_link(),
            Self::All => true,
        }
    }
}

/// Request to create a link inside `parent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLink {
    pub target: LinkTarget,
    pub parent: FolderId,
    pub name: String,
    pub description: String,
}

/// Request to create a plain item inside `parent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub parent: FolderId,
    pub name: String,
    pub asset_type: AssetType,
    pub wearable_type: Option<WearableType>,
    pub asset_id: AssetId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link_to(target: &InventoryItem, parent: FolderId) -> InventoryItem {
        InventoryItem {
            id: ItemId::new(),
            parent_id: parent,
            name: target.name.clone(),
            description: "@400".to_string(),
            link: Some(LinkTarget::Item(target.id)),
            asset_type: target.asset_type,
            wearable_type: target.wearable_type,
            asset_id: target.asset_id,
        }
    }

    #[test]
    fn test_linked_item_id_follows_links() {
        let folder = FolderId::new();
        let shirt = InventoryItem::wearable(folder, "Shirt", WearableType::Shirt, AssetId::new());
        let link = link_to(&shirt, FolderId::new());

        assert_eq!(shirt.linked_item_id(), shirt.id);
        assert_eq!(link.linked_item_id(), shirt.id);
        assert!(link.is_link());
        assert!(!link.is_broken_link());
    }

    #[test]
    fn test_broken_link_detection() {
        let broken = InventoryItem {
            id: ItemId::new(),
            parent_id: FolderId::new(),
            name: "gone".to_string(),
            description: String::new(),
            link: Some(LinkTarget::Item(ItemId::new())),
            asset_type: None,
            wearable_type: None,
            asset_id: None,
        };
        assert!(broken.is_broken_link());
        assert!(!broken.is_wearable());
    }

    #[test]
    fn test_item_filters() {
        let folder = FolderId::new();
        let hair = InventoryItem::wearable(folder, "Hair", WearableType::Hair, AssetId::new());
        let hat = InventoryItem::object(folder, "Hat", AssetType::Object, AssetId::new());
        let link = link_to(&hair, folder);

        assert!(ItemFilter::Wearables.matches(&hair));
        assert!(!ItemFilter::Wearables.matches(&hat));
        assert!(ItemFilter::AssetType(AssetType::Object).matches(&hat));
        assert!(ItemFilter::WearableOfType(WearableType::Hair).matches(&link));
        assert!(ItemFilter::Links.matches(&link));
        assert!(!ItemFilter::Links.matches(&hair));
        assert!(!ItemFilter::FolderLinks.matches(&link));
    }
}
