use async_trait::async_trait;

use crate::domain::models::{FoundWearable, InventoryItem};

/// The wearable model of the local avatar.
///
/// Applying is fire-and-forget; the avatar has no failure mode visible here.
#[async_trait]
pub trait AvatarSink: Send + Sync {
    /// Put the given resolved wearables on, ordered by type.
    async fn apply_wearables(&self, wearables: &[FoundWearable], replace_existing: bool);

    /// Make the attached objects match `attachments`.
    async fn update_attachments(&self, attachments: &[InventoryItem]);

    async fn activate_gestures(&self, gestures: &[InventoryItem]);

    async fn deactivate_gestures(&self, gestures: &[InventoryItem]);

    /// True while the user is in appearance editing mode.
    fn is_editing_appearance(&self) -> bool;
}
