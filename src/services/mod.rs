//! Service layer: the components of the appearance sync engine.

pub mod appearance_events;
pub mod appearance_manager;
pub mod batch_operation;
pub mod clothing_order;
pub mod outfit_composer;
pub mod retry_policy;
pub mod server_sync;
pub mod wearable_resolution;

pub use appearance_events::{AppearanceEvent, AppearanceEventBus, AppearanceEventPayload, EventSeverity};
pub use appearance_manager::{AppearanceDeps, AppearanceManager};
pub use batch_operation::{
    BatchOperation, BatchOperationCoordinator, BatchOutcome, BatchReport, CopyItemsOperation,
    LinkItemsOperation, LinkSource,
};
pub use outfit_composer::{CofPlan, CofUpdate, OutfitComposer};
pub use retry_policy::{AdaptiveRetryPolicy, AlwaysRetryImmediately, RetryPolicy};
pub use server_sync::{ServerSyncCoordinator, SyncOutcome, SyncState};
pub use wearable_resolution::{
    ResolutionOutcome, ResolutionRegistry, ResolutionReport, ResolutionToken, WearableResolutionPattern,
};
