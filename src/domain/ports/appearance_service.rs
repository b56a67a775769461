//! Appearance capability port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::SyncError;

/// Body returned by the UpdateAvatarAppearance capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppearanceUpdateResponse {
    pub success: bool,
    /// COF version the server expected, reported on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<i64>,
    /// COF version the server observed, reported on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Remote appearance-baking service.
#[async_trait]
pub trait AppearanceService: Send + Sync {
    /// Ask the server to rebake appearance for `cof_version`.
    ///
    /// A 409 reply maps to [`SyncError::Conflict`]. A 200 reply is returned
    /// as-is, including `success: false`.
    async fn update_appearance(
        &self,
        cof_version: i64,
    ) -> Result<AppearanceUpdateResponse, SyncError>;

    /// Bump the COF version server-side and return the new version.
    async fn increment_cof_version(&self) -> Result<i64, SyncError>;
}
