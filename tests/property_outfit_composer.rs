//! Property-based tests for COF planning.

use std::collections::HashSet;

use cofsync::domain::models::{AssetId, AssetType, FolderId, InventoryItem, ItemId, WearableType};
use cofsync::services::outfit_composer::{plan_cof, OutfitContents};
use proptest::prelude::*;
use proptest::sample::Index;

fn items(parent: FolderId, types: &[usize], objects: usize) -> Vec<InventoryItem> {
    let mut items: Vec<InventoryItem> = types
        .iter()
        .enumerate()
        .map(|(n, &t)| {
            let wearable_type = WearableType::ALL[t % WearableType::ALL.len()];
            InventoryItem::wearable(parent, format!("{wearable_type} {n}"), wearable_type, AssetId::new())
        })
        .collect();
    items.extend(
        (0..objects).map(|n| InventoryItem::object(parent, format!("Object {n}"), AssetType::Object, AssetId::new())),
    );
    items
}

fn contents_strategy() -> impl Strategy<Value = (Vec<InventoryItem>, Vec<InventoryItem>)> {
    (
        prop::collection::vec(0usize..16, 0..20),
        0usize..4,
        prop::collection::vec(0usize..16, 0..20),
        0usize..4,
        prop::collection::vec(any::<Index>(), 0..5),
    )
        .prop_map(|(cof_types, cof_objects, source_types, source_objects, shared)| {
            let cof = items(FolderId::new(), &cof_types, cof_objects);
            let mut source = items(FolderId::new(), &source_types, source_objects);
            if !cof.is_empty() {
                source.extend(shared.iter().map(|i| i.get(&cof).clone()));
            }
            (cof, source)
        })
}

fn ids<'a>(items: impl IntoIterator<Item = &'a InventoryItem>) -> HashSet<ItemId> {
    items.into_iter().map(|i| i.id).collect()
}

proptest! {
    #[test]
    fn prop_plan_respects_caps_and_uniqueness(
        (cof, source) in contents_strategy(),
        append in any::<bool>(),
        max in 1usize..6,
    ) {
        let plan = plan_cof(
            &OutfitContents::from_items(cof),
            &OutfitContents::from_items(source),
            append,
            max,
        );
        prop_assert!(plan.verify(max).is_ok());
    }

    #[test]
    fn prop_replace_clothing_comes_from_source(
        (cof, source) in contents_strategy(),
        max in 1usize..6,
    ) {
        let source_ids = ids(&source);
        let plan = plan_cof(
            &OutfitContents::from_items(cof),
            &OutfitContents::from_items(source),
            false,
            max,
        );
        for item in plan.clothing.iter().chain(&plan.attachments) {
            prop_assert!(source_ids.contains(&item.id));
        }
    }

    #[test]
    fn prop_body_parts_survive_every_plan(
        (cof, source) in contents_strategy(),
        append in any::<bool>(),
    ) {
        let planned_types: HashSet<WearableType> = cof
            .iter()
            .chain(&source)
            .filter(|i| i.is_body_part())
            .filter_map(|i| i.wearable_type)
            .collect();
        let plan = plan_cof(
            &OutfitContents::from_items(cof),
            &OutfitContents::from_items(source),
            append,
            5,
        );
        let kept: HashSet<WearableType> = plan.body_parts.iter().filter_map(|i| i.wearable_type).collect();
        prop_assert_eq!(kept, planned_types);
    }

    #[test]
    fn prop_append_prefers_worn_body_parts(
        (cof, source) in contents_strategy(),
    ) {
        let cof_ids = ids(&cof);
        let worn_types: HashSet<WearableType> = cof
            .iter()
            .filter(|i| i.is_body_part())
            .filter_map(|i| i.wearable_type)
            .collect();
        let plan = plan_cof(
            &OutfitContents::from_items(cof),
            &OutfitContents::from_items(source),
            true,
            5,
        );
        for part in &plan.body_parts {
            if part.wearable_type.is_some_and(|t| worn_types.contains(&t)) {
                prop_assert!(cof_ids.contains(&part.id));
            }
        }
    }

    #[test]
    fn prop_replace_is_idempotent(
        (cof, source) in contents_strategy(),
        max in 1usize..6,
    ) {
        let source = OutfitContents::from_items(source);
        let first = plan_cof(&OutfitContents::from_items(cof), &source, false, max);
        let second = plan_cof(
            &OutfitContents::from_items(first.items().cloned().collect::<Vec<_>>()),
            &source,
            false,
            max,
        );
        prop_assert_eq!(first.linked_ids(), second.linked_ids());
    }
}
