//! Domain errors for the appearance sync engine.

use thiserror::Error;

use super::models::{AssetId, FolderId, ItemId, WearableType};

/// Errors reported by the inventory store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Category not found: {0}")]
    CategoryNotFound(FolderId),

    #[error("Item {0} is not a link")]
    NotALink(ItemId),

    #[error("Inventory operation failed: {0}")]
    OperationFailed(String),

    #[error("Inventory unavailable: {0}")]
    Unavailable(String),
}

/// Errors reported by the asset fetch service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(AssetId),

    #[error("Cannot create default wearable of type {0}")]
    DefaultUnavailable(WearableType),

    #[error("Asset fetch failed: {0}")]
    FetchFailed(String),
}

/// Errors from the appearance capability endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("Capability not available: {0}")]
    MissingCapability(&'static str),

    #[error("COF version conflict: expected {expected:?}, observed {observed:?}")]
    Conflict {
        expected: Option<i64>,
        observed: Option<i64>,
    },

    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl SyncError {
    /// Whether the request may succeed if retried unchanged.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::MissingCapability(_) | Self::Conflict { .. } | Self::InvalidResponse(_) => false,
        }
    }

    /// HTTP status for retry policies; `0` when no status was received.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Http { status, .. } => *status,
            Self::Conflict { .. } => 409,
            Self::MissingCapability(_)
            | Self::Network(_)
            | Self::Timeout
            | Self::InvalidResponse(_) => 0,
        }
    }
}

/// Errors surfaced by the appearance manager and its components.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppearanceError {
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Current outfit folder unavailable")]
    CofUnavailable,

    #[error("Category not found: {0}")]
    CategoryNotFound(FolderId),
}

pub type AppearanceResult<T> = Result<T, AppearanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SyncError::Timeout.is_transient());
        assert!(SyncError::Network("reset".into()).is_transient());
        assert!(SyncError::Http { status: 503, body: String::new() }.is_transient());
        assert!(SyncError::Http { status: 429, body: String::new() }.is_transient());
        assert!(!SyncError::Http { status: 404, body: String::new() }.is_transient());
        assert!(!SyncError::Conflict { expected: Some(3), observed: Some(4) }.is_transient());
    }

    #[test]
    fn test_status_code() {
        assert_eq!(SyncError::Timeout.status_code(), 0);
        assert_eq!(
            SyncError::Conflict { expected: None, observed: None }.status_code(),
            409
        );
        assert_eq!(
            SyncError::Http { status: 502, body: "bad gateway".into() }.status_code(),
            502
        );
    }

    #[test]
    fn test_wrapping() {
        let err: AppearanceError = InventoryError::ItemNotFound(ItemId::new()).into();
        assert!(matches!(err, AppearanceError::Inventory(_)));
        assert!(err.to_string().starts_with("Inventory error"));
    }
}
