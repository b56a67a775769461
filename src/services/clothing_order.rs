//! Clothing layer ordering tags.
//!
//! Each clothing link in the COF carries `@<type*100 + index>` in its
//! description; lower indices are worn closer to the body. Tags that do not
//! have the exact shape expected for the link's type sort after valid ones.

use std::cmp::Ordering;

use crate::domain::models::config::CLOTHING_SLOTS_PER_TYPE;
use crate::domain::models::{InventoryItem, ItemId, WearableType};

pub const ORDER_TAG_PREFIX: char = '@';

pub fn build_order_tag(wearable_type: WearableType, index: usize) -> String {
    format!(
        "{ORDER_TAG_PREFIX}{}",
        wearable_type.index() as usize * CLOTHING_SLOTS_PER_TYPE + index
    )
}

/// Tag has the prefix and the length of a tag for `wearable_type`.
pub fn has_valid_tag(description: &str, wearable_type: WearableType) -> bool {
    description.starts_with(ORDER_TAG_PREFIX)
        && description.len() == build_order_tag(wearable_type, 0).len()
}

/// Order two links of the same wearable type: valid tags first, then by tag.
pub fn compare_same_type(a: &InventoryItem, b: &InventoryItem, wearable_type: WearableType) -> Ordering {
    let a_valid = has_valid_tag(&a.description, wearable_type);
    let b_valid = has_valid_tag(&b.description, wearable_type);
    b_valid
        .cmp(&a_valid)
        .then_with(|| a.description.cmp(&b.description))
}

/// Sort links by wearable type, then by ordering tag within each type.
/// Items without a wearable type go last, in their original order.
pub fn sort_by_order_tag(items: &mut [InventoryItem]) {
    items.sort_by(|a, b| match (a.wearable_type, b.wearable_type) {
        (Some(ta), Some(tb)) if ta == tb => compare_same_type(a, b, ta),
        (Some(ta), Some(tb)) => ta.cmp(&tb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Description changes needed so every clothing type's links carry
/// consecutive tags `@t00, @t01, ...` in their current order.
pub fn compute_order_updates(cof_links: &[InventoryItem]) -> Vec<(ItemId, String)> {
    let mut updates = Vec::new();
    for wearable_type in WearableType::ALL.iter().copied().filter(|t| t.is_clothing()) {
        let mut of_type: Vec<&InventoryItem> = cof_links
            .iter()
            .filter(|item| item.is_clothing() && item.wearable_type == Some(wearable_type))
            .collect();
        of_type.sort_by(|a, b| compare_same_type(a, b, wearable_type));

        for (index, item) in of_type.iter().enumerate() {
            let tag = build_order_tag(wearable_type, index);
            if item.description != tag {
                updates.push((item.id, tag));
            }
        }
    }
    updates
}

/// Swap the tag of `link` with its neighbour of the same type.
///
/// `closer_to_body` moves the link towards index 0. Returns the two
/// description updates, or `None` when the link is already at that end or
/// is not a clothing link among `cof_links`.
pub fn swap_with_neighbour(
    cof_links: &[InventoryItem],
    link: ItemId,
    closer_to_body: bool,
) -> Option<[(ItemId, String); 2]> {
    let item = cof_links.iter().find(|i| i.id == link)?;
    if !item.is_clothing() {
        return None;
    }
    let wearable_type = item.wearable_type?;

    let mut of_type: Vec<&InventoryItem> = cof_links
        .iter()
        .filter(|i| i.wearable_type == Some(wearable_type))
        .collect();
    of_type.sort_by(|a, b| compare_same_type(a, b, wearable_type));

    let position = of_type.iter().position(|i| i.id == link)?;
    let neighbour = if closer_to_body {
        position.checked_sub(1)?
    } else {
        position + 1
    };
    let other = of_type.get(neighbour)?;

    Some([
        (item.id, other.description.clone()),
        (other.id, item.description.clone()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{AssetId, FolderId};

    fn clothing(wearable_type: WearableType, description: &str) -> InventoryItem {
        let mut item =
            InventoryItem::wearable(FolderId::new(), "item", wearable_type, AssetId::new());
        item.description = description.to_string();
        item
    }

    #[test]
    fn test_build_order_tag() {
        assert_eq!(build_order_tag(WearableType::Shape, 0), "@0");
        assert_eq!(build_order_tag(WearableType::Shirt, 0), "@400");
        assert_eq!(build_order_tag(WearableType::Jacket, 3), "@803");
        assert_eq!(build_order_tag(WearableType::Skirt, 1), "@1201");
    }

    #[test]
    fn test_tag_validity_depends_on_type() {
        assert!(has_valid_tag("@401", WearableType::Shirt));
        assert!(!has_valid_tag("@1201", WearableType::Shirt));
        assert!(!has_valid_tag("401", WearableType::Shirt));
        assert!(!has_valid_tag("", WearableType::Shirt));
        assert!(has_valid_tag("@1201", WearableType::Skirt));
    }

    #[test]
    fn test_invalid_tags_sort_last() {
        let mut items = vec![
            clothing(WearableType::Shirt, "garbage"),
            clothing(WearableType::Shirt, "@401"),
            clothing(WearableType::Shirt, "@400"),
        ];
        sort_by_order_tag(&mut items);
        let order: Vec<_> = items.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(order, vec!["@400", "@401", "garbage"]);
    }

    #[test]
    fn test_compute_order_updates_renumbers_gaps() {
        let items = vec![
            clothing(WearableType::Pants, "@503"),
            clothing(WearableType::Pants, "@500"),
            clothing(WearableType::Pants, ""),
        ];
        let updates = compute_order_updates(&items);
        assert_eq!(
            updates,
            vec![(items[0].id, "@501".to_string()), (items[2].id, "@502".to_string())]
        );
    }

    #[test]
    fn test_compute_order_updates_ignores_body_parts() {
        let mut shape = InventoryItem::wearable(FolderId::new(), "shape", WearableType::Shape, AssetId::new());
        shape.description = "whatever".into();
        assert!(compute_order_updates(&[shape]).is_empty());
    }

    #[test]
    fn test_swap_with_neighbour() {
        let items = vec![
            clothing(WearableType::Jacket, "@800"),
            clothing(WearableType::Jacket, "@801"),
        ];
        assert!(swap_with_neighbour(&items, items[0].id, true).is_none());
        assert!(swap_with_neighbour(&items, items[1].id, false).is_none());

        let swap = swap_with_neighbour(&items, items[1].id, true).unwrap();
        assert_eq!(swap[0], (items[1].id, "@800".to_string()));
        assert_eq!(swap[1], (items[0].id, "@801".to_string()));
    }
}
