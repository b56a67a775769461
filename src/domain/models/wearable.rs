//! Wearable types and the records tracked while resolving an outfit.

use serde::{Deserialize, Serialize};

use super::ids::{AssetId, ItemId};
use super::inventory::AssetType;

/// Slot a wearable occupies on the avatar.
///
/// The declaration order is significant: it drives the numeric index used
/// in clothing ordering tags and the order in which wearables are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WearableType {
    Shape,
    Skin,
    Hair,
    Eyes,
    Shirt,
    Pants,
    Shoes,
    Socks,
    Jacket,
    Gloves,
    Undershirt,
    Underpants,
    Skirt,
    Alpha,
    Tattoo,
    Physics,
}

impl WearableType {
    /// Every wearable type, in index order.
    pub const ALL: [Self; 16] = [
        Self::Shape,
        Self::Skin,
        Self::Hair,
        Self::Eyes,
        Self::Shirt,
        Self::Pants,
        Self::Shoes,
        Self::Socks,
        Self::Jacket,
        Self::Gloves,
        Self::Undershirt,
        Self::Underpants,
        Self::Skirt,
        Self::Alpha,
        Self::Tattoo,
        Self::Physics,
    ];

    pub const fn index(self) -> u32 {
        self as u32
    }

    /// Body parts may appear at most once in the COF.
    pub const fn is_body_part(self) -> bool {
        matches!(self, Self::Shape | Self::Skin | Self::Hair | Self::Eyes)
    }

    pub const fn is_clothing(self) -> bool {
        !self.is_body_part()
    }

    /// Inventory asset type that carries this wearable.
    pub const fn asset_type(self) -> AssetType {
        if self.is_body_part() {
            AssetType::BodyPart
        } else {
            AssetType::Clothing
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shape => "shape",
            Self::Skin => "skin",
            Self::Hair => "hair",
            Self::Eyes => "eyes",
            Self::Shirt => "shirt",
            Self::Pants => "pants",
            Self::Shoes => "shoes",
            Self::Socks => "socks",
            Self::Jacket => "jacket",
            Self::Gloves => "gloves",
            Self::Undershirt => "undershirt",
            Self::Underpants => "underpants",
            Self::Skirt => "skirt",
            Self::Alpha => "alpha",
            Self::Tattoo => "tattoo",
            Self::Physics => "physics",
        }
    }
}

impl std::fmt::Display for WearableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WearableType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown wearable type: {s}"))
    }
}

/// Loaded wearable asset data handed back by the asset fetch service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WearableAsset {
    pub asset_id: AssetId,
    pub wearable_type: WearableType,
    pub name: String,
}

impl WearableAsset {
    pub fn new(asset_id: AssetId, wearable_type: WearableType, name: impl Into<String>) -> Self {
        Self {
            asset_id,
            wearable_type,
            name: name.into(),
        }
    }
}

/// A wearable implied by a COF link, tracked through resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundWearable {
    /// The linked (underlying) inventory item, not the COF link itself.
    pub item_id: ItemId,
    pub asset_id: AssetId,
    pub name: String,
    pub asset_type: AssetType,
    pub wearable_type: WearableType,
    /// True when this record stands in for a wearable that could not be fetched.
    pub is_replacement: bool,
    /// Description of the COF link, used to restore a pruned link in order.
    pub link_description: String,
    pub resolved: Option<WearableAsset>,
}

impl FoundWearable {
    pub fn new(
        item_id: ItemId,
        asset_id: AssetId,
        name: impl Into<String>,
        wearable_type: WearableType,
    ) -> Self {
        Self {
            item_id,
            asset_id,
            name: name.into(),
            asset_type: wearable_type.asset_type(),
            wearable_type,
            is_replacement: false,
            link_description: String::new(),
            resolved: None,
        }
    }

    pub fn with_link_description(mut self, description: impl Into<String>) -> Self {
        self.link_description = description.into();
        self
    }

    /// Replacement record for a synthesized default wearable.
    pub fn replacement(item_id: ItemId, asset: WearableAsset) -> Self {
        Self {
            item_id,
            asset_id: asset.asset_id,
            name: asset.name.clone(),
            asset_type: asset.wearable_type.asset_type(),
            wearable_type: asset.wearable_type,
            is_replacement: true,
            link_description: String::new(),
            resolved: Some(asset),
        }
    }

    pub const fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// Resolved and still referring to the asset the inventory item names.
    pub fn is_applicable(&self) -> bool {
        self.resolved
            .as_ref()
            .is_some_and(|asset| asset.asset_id == self.asset_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_part_classification() {
        let body_parts: Vec<_> = WearableType::ALL
            .iter()
            .filter(|t| t.is_body_part())
            .collect();
        assert_eq!(body_parts.len(), 4);
        assert!(WearableType::Shirt.is_clothing());
        assert_eq!(WearableType::Eyes.asset_type(), AssetType::BodyPart);
        assert_eq!(WearableType::Jacket.asset_type(), AssetType::Clothing);
    }

    #[test]
    fn test_index_follows_declaration_order() {
        for (i, t) in WearableType::ALL.iter().enumerate() {
            assert_eq!(t.index() as usize, i);
        }
    }

    #[test]
    fn test_parse_wearable_type() {
        assert_eq!("Pants".parse::<WearableType>(), Ok(WearableType::Pants));
        assert!("cape".parse::<WearableType>().is_err());
    }

    #[test]
    fn test_is_applicable_requires_matching_asset() {
        let asset_id = AssetId::new();
        let mut found = FoundWearable::new(ItemId::new(), asset_id, "shirt", WearableType::Shirt);
        assert!(!found.is_applicable());

        found.resolved = Some(WearableAsset::new(AssetId::new(), WearableType::Shirt, "other"));
        assert!(!found.is_applicable());

        found.resolved = Some(WearableAsset::new(asset_id, WearableType::Shirt, "shirt"));
        assert!(found.is_applicable());
    }
}
