//! Avatar sink that records what was put on.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::models::{FoundWearable, InventoryItem, ItemId, WearableType};
use crate::domain::ports::AvatarSink;

#[derive(Debug, Default)]
struct AvatarState {
    applications: Vec<Vec<FoundWearable>>,
    worn: BTreeMap<WearableType, Vec<FoundWearable>>,
    attachments: Vec<InventoryItem>,
    gestures: Vec<ItemId>,
}

#[derive(Debug, Default)]
pub struct RecordingAvatar {
    state: Mutex<AvatarState>,
    editing: AtomicBool,
}

impl RecordingAvatar {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AvatarState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_editing_appearance(&self, editing: bool) {
        self.editing.store(editing, Ordering::SeqCst);
    }

    /// Every `apply_wearables` call, oldest first.
    pub fn applications(&self) -> Vec<Vec<FoundWearable>> {
        self.lock().applications.clone()
    }

    /// Wearables currently worn, in type order.
    pub fn worn(&self) -> Vec<FoundWearable> {
        self.lock().worn.values().flatten().cloned().collect()
    }

    pub fn worn_of_type(&self, wearable_type: WearableType) -> Vec<FoundWearable> {
        self.lock()
            .worn
            .get(&wearable_type)
            .cloned()
            .unwrap_or_default()
    }

    pub fn attachments(&self) -> Vec<InventoryItem> {
        self.lock().attachments.clone()
    }

    /// Linked ids of the active gestures.
    pub fn active_gestures(&self) -> Vec<ItemId> {
        self.lock().gestures.clone()
    }
}

#[async_trait]
impl AvatarSink for RecordingAvatar {
    async fn apply_wearables(&self, wearables: &[FoundWearable], replace_existing: bool) {
        debug!(count = wearables.len(), replace_existing, "applying wearables");
        let mut state = self.lock();
        state.applications.push(wearables.to_vec());
        if replace_existing {
            state.worn.clear();
        }
        for wearable in wearables {
            let slot = state.worn.entry(wearable.wearable_type).or_default();
            if wearable.wearable_type.is_body_part() {
                slot.clear();
            }
            slot.retain(|w| w.item_id != wearable.item_id);
            slot.push(wearable.clone());
        }
    }

    async fn update_attachments(&self, attachments: &[InventoryItem]) {
        self.lock().attachments = attachments.to_vec();
    }

    async fn activate_gestures(&self, gestures: &[InventoryItem]) {
        let mut state = self.lock();
        for gesture in gestures {
            let id = gesture.linked_item_id();
            if !state.gestures.contains(&id) {
                state.gestures.push(id);
            }
        }
    }

    async fn deactivate_gestures(&self, gestures: &[InventoryItem]) {
        let mut state = self.lock();
        state
            .gestures
            .retain(|id| !gestures.iter().any(|g| g.linked_item_id() == *id));
    }

    fn is_editing_appearance(&self) -> bool {
        self.editing.load(Ordering::SeqCst)
    }
}
