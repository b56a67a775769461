//! Appearance event bus.
//!
//! Broadcasts what the sync engine did (COF rewritten, wearables applied,
//! server acknowledged) to any number of subscribers, with sequence numbering
//! so consumers can detect gaps after lagging.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::models::{FolderId, WearableType};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonically increasing sequence number assigned by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
}

/// Event envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppearanceEvent {
    pub id: EventId,
    pub sequence: SequenceNumber,
    pub timestamp: DateTime<Utc>,
    pub severity: EventSeverity,
    /// Outfit-change generation the event belongs to, when known.
    pub generation: Option<u64>,
    pub payload: AppearanceEventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AppearanceEventPayload {
    OutfitChangeRequested {
        folder: FolderId,
        append: bool,
    },
    OutfitChangeFailed {
        folder: FolderId,
        failed_items: usize,
    },
    CofUpdated {
        linked: usize,
        purged: usize,
    },
    WearablesApplied {
        applied: usize,
        unresolved: usize,
    },
    LateArrivalsApplied {
        wearable_types: Vec<WearableType>,
    },
    ReplacedMissingWearable {
        wearable_type: WearableType,
    },
    CouldNotPutOnOutfit,
    ServerSyncCompleted {
        cof_version: i64,
    },
    ServerSyncDeferred {
        reason: String,
    },
    ServerSyncSkipped {
        reason: String,
    },
}

impl AppearanceEventPayload {
    pub const fn severity(&self) -> EventSeverity {
        match self {
            Self::OutfitChangeFailed { .. } | Self::CouldNotPutOnOutfit => EventSeverity::Error,
            Self::ReplacedMissingWearable { .. }
            | Self::ServerSyncDeferred { .. }
            | Self::ServerSyncSkipped { .. } => EventSeverity::Warning,
            _ => EventSeverity::Info,
        }
    }
}

/// Broadcast bus for appearance events.
pub struct AppearanceEventBus {
    sender: broadcast::Sender<AppearanceEvent>,
    sequence: AtomicU64,
}

impl AppearanceEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Publish an event and return its sequence number.
    pub fn publish(&self, generation: Option<u64>, payload: AppearanceEventPayload) -> SequenceNumber {
        let sequence = SequenceNumber(self.sequence.fetch_add(1, Ordering::SeqCst));
        let event = AppearanceEvent {
            id: EventId::new(),
            sequence,
            timestamp: Utc::now(),
            severity: payload.severity(),
            generation,
            payload,
        };
        // No subscribers is fine.
        let _ = self.sender.send(event);
        sequence
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppearanceEvent> {
        self.sender.subscribe()
    }

    pub fn current_sequence(&self) -> SequenceNumber {
        SequenceNumber(self.sequence.load(Ordering::SeqCst))
    }
}

impl Default for AppearanceEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
