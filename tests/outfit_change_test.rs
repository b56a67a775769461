//! Integration tests for outfit changes driven through the appearance manager.
//!
//! All tests run on paused time; asset delays and batch polling advance the
//! virtual clock only.

mod common;

use std::time::Duration;

use cofsync::domain::models::{Config, FolderType, WearableType};
use cofsync::services::{AppearanceEventPayload, ResolutionOutcome};
use common::{drain_events, sorted_ids, world, world_with};

const BASE: [(WearableType, &str); 6] = [
    (WearableType::Shape, "Shape"),
    (WearableType::Skin, "Skin"),
    (WearableType::Hair, "Hair"),
    (WearableType::Eyes, "Eyes"),
    (WearableType::Shirt, "Grey Tee"),
    (WearableType::Pants, "Jeans"),
];

const EVENING: [(WearableType, &str); 3] = [
    (WearableType::Shirt, "Silk Shirt"),
    (WearableType::Pants, "Slacks"),
    (WearableType::Shoes, "Oxfords"),
];

#[tokio::test(start_paused = true)]
async fn test_replace_outfit_keeps_body_parts_and_swaps_clothing() {
    let w = world().await;
    let worn = w.wearing(&BASE);
    let (outfit, evening) = w.outfit("Evening", &EVENING);
    let mut events = w.manager.subscribe();

    let changed = w.manager.replace_current_outfit(outfit).await.unwrap();
    assert!(changed);

    let mut expected: Vec<_> = worn[..4].iter().chain(&evening).map(|i| i.id).collect();
    expected.sort();
    assert_eq!(w.cof_linked_ids(), expected);

    let folder_links = w.cof_folder_links();
    assert_eq!(folder_links.len(), 1);
    assert_eq!(folder_links[0].linked_folder_id(), Some(outfit));

    assert_eq!(w.worn_names(WearableType::Shirt), vec!["Silk Shirt"]);
    assert_eq!(w.worn_names(WearableType::Shape), vec!["Shape"]);
    assert_eq!(w.avatar.worn().len(), 7);

    let state = w.manager.sync_state();
    assert!(state.last_acknowledged.is_some());
    assert_eq!(state.last_acknowledged, state.last_requested);
    assert_eq!(w.service.sent().len(), 1);

    let payloads: Vec<_> = drain_events(&mut events).into_iter().map(|e| e.payload).collect();
    assert!(matches!(
        payloads.first(),
        Some(AppearanceEventPayload::OutfitChangeRequested { append: false, .. })
    ));
    assert!(payloads.contains(&AppearanceEventPayload::CofUpdated { linked: 4, purged: 2 }));
    assert!(payloads.contains(&AppearanceEventPayload::WearablesApplied {
        applied: 7,
        unresolved: 0,
    }));
    assert!(matches!(
        payloads.last(),
        Some(AppearanceEventPayload::ServerSyncCompleted { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_wearing_the_same_outfit_twice_is_stable() {
    let w = world().await;
    w.wearing(&BASE);
    let (outfit, _) = w.outfit("Evening", &EVENING);

    assert!(w.manager.replace_current_outfit(outfit).await.unwrap());
    let first_links: Vec<_> = w
        .inventory
        .items_in(w.cof)
        .into_iter()
        .filter(|l| !l.is_folder_link())
        .map(|l| l.id)
        .collect();

    assert!(w.manager.replace_current_outfit(outfit).await.unwrap());
    let second_links: Vec<_> = w
        .inventory
        .items_in(w.cof)
        .into_iter()
        .filter(|l| !l.is_folder_link())
        .map(|l| l.id)
        .collect();

    assert_eq!(first_links, second_links);
    assert_eq!(w.cof_folder_links().len(), 1);

    let sent = w.service.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0] < sent[1], "versions sent must increase: {sent:?}");
}

#[tokio::test(start_paused = true)]
async fn test_newer_outfit_supersedes_one_still_loading() {
    let w = world().await;
    w.wearing(&BASE);
    let (slow, slow_items) = w.outfit("Slow", &[(WearableType::Shirt, "Slow Shirt")]);
    let (fast, _) = w.outfit("Fast", &[(WearableType::Shirt, "Fast Shirt")]);
    w.assets
        .delay(slow_items[0].asset_id.unwrap(), Duration::from_secs(10));

    let (first, second) = tokio::join!(w.manager.replace_current_outfit(slow), async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        w.manager.replace_current_outfit(fast).await
    });
    first.unwrap();
    assert!(second.unwrap());

    let applications = w.avatar.applications();
    assert_eq!(applications.len(), 1, "only the newest outfit is applied");
    assert!(applications[0].iter().any(|f| f.name == "Fast Shirt"));
    assert!(applications[0].iter().all(|f| f.name != "Slow Shirt"));
    assert_eq!(w.worn_names(WearableType::Shirt), vec!["Fast Shirt"]);

    w.manager.join_late_arrivals().await;
    assert_eq!(w.manager.active_resolutions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unloadable_shirt_is_replaced_with_a_default() {
    let w = world().await;
    w.wearing(&BASE[..4]);
    let (outfit, _) = w.outfit("Evening", &[(WearableType::Pants, "Slacks")]);
    let broken = w
        .inventory
        .add_wearable(outfit, "Lost Shirt", WearableType::Shirt);
    let mut events = w.manager.subscribe();

    assert!(w.manager.replace_current_outfit(outfit).await.unwrap());

    let shirts = w.avatar.worn_of_type(WearableType::Shirt);
    assert_eq!(shirts.len(), 1);
    assert!(shirts[0].is_replacement);
    assert_ne!(shirts[0].item_id, broken.id);

    let lost_and_found = w
        .inventory
        .system_folder(FolderType::LostAndFound)
        .unwrap();
    let created = w.inventory.items_in(lost_and_found);
    assert_eq!(created.len(), 1);
    assert!(w.cof_linked_ids().contains(&created[0].id));
    // The original link stays so a later load can still take over.
    assert!(w.cof_linked_ids().contains(&broken.id));

    let payloads: Vec<_> = drain_events(&mut events).into_iter().map(|e| e.payload).collect();
    assert!(payloads.contains(&AppearanceEventPayload::ReplacedMissingWearable {
        wearable_type: WearableType::Shirt,
    }));
}

#[tokio::test(start_paused = true)]
async fn test_unloadable_non_recoverable_wearable_is_pruned() {
    let w = world().await;
    w.wearing(&BASE[..4]);
    let (outfit, _) = w.outfit("Evening", &[(WearableType::Shirt, "Silk Shirt")]);
    let gloves = w
        .inventory
        .add_wearable(outfit, "Phantom Gloves", WearableType::Gloves);

    let changed = w
        .manager
        .update_cof(outfit, false)
        .await
        .unwrap();
    assert!(changed);

    assert!(!w.cof_linked_ids().contains(&gloves.id));
    assert!(w.avatar.worn_of_type(WearableType::Gloves).is_empty());
    assert_eq!(w.worn_names(WearableType::Shirt), vec!["Silk Shirt"]);
}

#[tokio::test(start_paused = true)]
async fn test_late_shirt_takes_over_from_its_replacement() {
    let mut config = Config::default();
    config.resolution.max_wearable_wait_secs = 5;
    let w = world_with(config).await;
    w.wearing(&BASE[..4]);
    let (outfit, items) = w.outfit("Evening", &[(WearableType::Shirt, "Silk Shirt")]);
    w.assets
        .delay(items[0].asset_id.unwrap(), Duration::from_secs(8));
    let mut events = w.manager.subscribe();

    assert!(w.manager.replace_current_outfit(outfit).await.unwrap());
    let shirts = w.avatar.worn_of_type(WearableType::Shirt);
    assert_eq!(shirts.len(), 1);
    assert!(shirts[0].is_replacement);

    assert_eq!(w.manager.join_late_arrivals().await, 1);

    assert_eq!(w.worn_names(WearableType::Shirt), vec!["Silk Shirt"]);
    let lost_and_found = w
        .inventory
        .system_folder(FolderType::LostAndFound)
        .unwrap();
    let replacements = sorted_ids(&w.inventory.items_in(lost_and_found));
    assert!(replacements.iter().all(|id| !w.cof_linked_ids().contains(id)));
    assert!(w.cof_linked_ids().contains(&items[0].id));

    let payloads: Vec<_> = drain_events(&mut events).into_iter().map(|e| e.payload).collect();
    assert!(payloads.contains(&AppearanceEventPayload::LateArrivalsApplied {
        wearable_types: vec![WearableType::Shirt],
    }));
}

#[tokio::test(start_paused = true)]
async fn test_failed_link_batch_leaves_avatar_alone() {
    let w = world().await;
    w.wearing(&BASE);
    let (outfit, items) = w.outfit("Evening", &EVENING);
    w.inventory.fail_links_to(items[0].id, 10);
    let mut events = w.manager.subscribe();

    let changed = w.manager.replace_current_outfit(outfit).await.unwrap();
    assert!(!changed);

    assert!(w.avatar.applications().is_empty());
    assert!(w.service.sent().is_empty());

    let payloads: Vec<_> = drain_events(&mut events).into_iter().map(|e| e.payload).collect();
    assert!(payloads.iter().any(|p| matches!(
        p,
        AppearanceEventPayload::OutfitChangeFailed { failed_items: 1, .. }
    )));
    assert!(!payloads
        .iter()
        .any(|p| matches!(p, AppearanceEventPayload::WearablesApplied { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_flaky_link_recovers_within_retries() {
    let w = world().await;
    w.wearing(&BASE);
    let (outfit, items) = w.outfit("Evening", &EVENING);
    w.inventory.fail_links_to(items[0].id, 1);

    assert!(w.manager.replace_current_outfit(outfit).await.unwrap());
    assert!(w.cof_linked_ids().contains(&items[0].id));
    assert_eq!(w.worn_names(WearableType::Shirt), vec!["Silk Shirt"]);
}

#[tokio::test(start_paused = true)]
async fn test_append_adds_to_what_is_worn() {
    let w = world().await;
    w.wearing(&BASE);
    let (outfit, items) = w.outfit("Layer", &[(WearableType::Jacket, "Blazer")]);
    let watch = w.attachment(outfit, "Pocket Watch");

    assert!(w.manager.add_category_to_current_outfit(outfit).await.unwrap());

    assert_eq!(w.worn_names(WearableType::Shirt), vec!["Grey Tee"]);
    assert_eq!(w.worn_names(WearableType::Jacket), vec!["Blazer"]);
    assert!(w.cof_linked_ids().contains(&items[0].id));
    assert_eq!(w.avatar.attachments().len(), 1);
    assert_eq!(w.avatar.attachments()[0].linked_item_id(), watch.id);
    assert!(w.cof_folder_links().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_wearing_a_body_part_replaces_the_old_one() {
    let w = world().await;
    w.wearing(&BASE);
    let shape = w
        .inventory
        .add_wearable(w.clothing, "Tall Shape", WearableType::Shape);
    w.assets.register_item(&shape);

    assert!(w.manager.wear_item_on_avatar(shape.id, true, false).await.unwrap());

    let shapes: Vec<_> = w
        .inventory
        .items_in(w.cof)
        .into_iter()
        .filter(|l| l.wearable_type == Some(WearableType::Shape))
        .collect();
    assert_eq!(shapes.len(), 1);
    assert_eq!(shapes[0].linked_item_id(), shape.id);
    assert_eq!(w.worn_names(WearableType::Shape), vec!["Tall Shape"]);
}

#[tokio::test(start_paused = true)]
async fn test_remove_all_clothes_keeps_body_parts() {
    let w = world().await;
    let worn = w.wearing(&BASE);

    let removed = w.manager.remove_all_clothes_from_avatar().await.unwrap();
    assert_eq!(removed, 2);

    assert_eq!(w.cof_linked_ids(), sorted_ids(&worn[..4]));
    assert!(w.avatar.worn().iter().all(|f| f.wearable_type.is_body_part()));
    assert_eq!(w.avatar.worn().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_take_off_outfit_removes_its_clothing_and_attachments() {
    let w = world().await;
    let worn = w.wearing(&BASE[..4]);
    let (outfit, _) = w.outfit("Evening", &EVENING);
    w.attachment(outfit, "Pocket Watch");
    assert!(w.manager.replace_current_outfit(outfit).await.unwrap());

    let removed = w.manager.take_off_outfit(outfit).await.unwrap();
    assert_eq!(removed, 4);

    assert_eq!(w.cof_linked_ids(), sorted_ids(&worn));
    assert!(w.avatar.attachments().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_outfit_dirty_tracking_against_saved_outfit() {
    let w = world().await;
    w.wearing(&BASE);
    let saved = w.manager.make_new_outfit_links("Saved").await.unwrap();
    assert!(!w.manager.is_outfit_dirty());
    assert_eq!(w.manager.base_outfit_name().await.unwrap().as_deref(), Some("Saved"));

    let jacket = w
        .inventory
        .add_wearable(w.clothing, "Blazer", WearableType::Jacket);
    w.assets.register_item(&jacket);
    assert!(w.manager.wear_item_on_avatar(jacket.id, true, false).await.unwrap());
    assert!(w.manager.is_outfit_dirty());

    assert!(w.manager.update_base_outfit().await.unwrap());
    assert!(!w.manager.is_outfit_dirty());
    assert!(!w.manager.composer().is_outfit_dirty().await.unwrap());
    assert_eq!(w.manager.base_outfit_id().await.unwrap(), Some(saved));
}

#[tokio::test(start_paused = true)]
async fn test_editing_appearance_skips_server_update() {
    let w = world().await;
    w.wearing(&BASE);
    w.avatar.set_editing_appearance(true);
    let mut events = w.manager.subscribe();

    let report = w
        .manager
        .update_appearance_from_cof(false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.outcome, ResolutionOutcome::Applied);
    assert!(w.service.sent().is_empty());

    let payloads: Vec<_> = drain_events(&mut events).into_iter().map(|e| e.payload).collect();
    assert!(payloads
        .iter()
        .any(|p| matches!(p, AppearanceEventPayload::ServerSyncSkipped { .. })));
}
