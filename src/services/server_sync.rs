//! Keeps the server's baked appearance in step with the COF version.
//!
//! Every COF mutation ends in an appearance update request carrying the COF
//! version the client believes is current. The server rejects stale versions
//! with a conflict; the coordinator then refetches the COF and retries, but
//! only while no newer sync request has been made.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::time;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::SyncError;
use crate::domain::models::{FolderId, ServerConfig};
use crate::domain::ports::{AppearanceService, InventoryStore};
use crate::services::retry_policy::{AdaptiveRetryPolicy, AlwaysRetryImmediately, RetryPolicy};

/// Client-side view of COF versions exchanged with the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncState {
    pub last_requested: Option<i64>,
    pub last_acknowledged: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The server acknowledged `version`.
    Synced { version: i64 },
    /// Gave up for now; a later COF change will try again.
    Deferred { reason: String },
    /// Nothing was sent.
    Skipped { reason: String },
    /// A newer sync request took over.
    Superseded,
}

pub struct ServerSyncCoordinator {
    service: Arc<dyn AppearanceService>,
    store: Arc<dyn InventoryStore>,
    cof: FolderId,
    config: ServerConfig,
    state: Mutex<SyncState>,
    generation: AtomicU64,
}

impl ServerSyncCoordinator {
    pub fn new(
        service: Arc<dyn AppearanceService>,
        store: Arc<dyn InventoryStore>,
        cof: FolderId,
        config: ServerConfig,
    ) -> Self {
        Self {
            service,
            store,
            cof,
            config,
            state: Mutex::new(SyncState::default()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SyncState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_state(&self, f: impl FnOnce(&mut SyncState)) {
        f(&mut self.state.lock().unwrap_or_else(PoisonError::into_inner));
    }

    fn is_latest(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Local COF version, refetched when unknown or behind what the server
    /// already acknowledged.
    async fn current_cof_version(&self) -> Result<Option<i64>, String> {
        let local = self
            .store
            .category_version(self.cof)
            .await
            .map_err(|e| e.to_string())?;
        let acknowledged = self.state().last_acknowledged;

        let behind = match (local, acknowledged) {
            (None, _) => true,
            (Some(local), Some(acked)) => local < acked,
            (Some(_), None) => false,
        };
        if !behind {
            return Ok(local);
        }

        debug!(?local, ?acknowledged, "refetching COF before appearance request");
        self.store
            .fetch_category(self.cof)
            .await
            .map_err(|e| e.to_string())
    }

    async fn refetch_cof(&self) {
        if let Err(err) = self.store.fetch_category(self.cof).await {
            warn!(error = %err, "COF refetch failed");
        }
    }

    /// Ask the server to rebake appearance for the current COF version.
    #[instrument(skip(self), fields(cof = %self.cof))]
    pub async fn request_server_appearance_update(&self) -> SyncOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut transient_policy = AdaptiveRetryPolicy::from_config(&self.config.appearance_retry);
        let mut conflict_policy = AlwaysRetryImmediately::default();

        loop {
            if !self.is_latest(generation) {
                debug!(generation, "appearance request superseded");
                return SyncOutcome::Superseded;
            }

            let version = match self.current_cof_version().await {
                Ok(Some(version)) => version,
                Ok(None) => {
                    return SyncOutcome::Skipped {
                        reason: "COF version unknown".to_string(),
                    }
                }
                Err(reason) => return SyncOutcome::Deferred { reason },
            };
            if let Some(acked) = self.state().last_acknowledged {
                if version < acked {
                    warn!(version, acked, "local COF version still behind acknowledged version");
                    return SyncOutcome::Skipped {
                        reason: format!("COF version {version} is older than acknowledged {acked}"),
                    };
                }
            }
            self.update_state(|s| {
                s.last_requested = Some(s.last_requested.map_or(version, |r| r.max(version)));
            });

            let status = match self.service.update_appearance(version).await {
                Ok(response) if response.success => {
                    self.update_state(|s| {
                        s.last_acknowledged =
                            Some(s.last_acknowledged.map_or(version, |a| a.max(version)));
                    });
                    info!(version, "server acknowledged appearance update");
                    return SyncOutcome::Synced { version };
                }
                Ok(response) => {
                    warn!(
                        version,
                        expected = ?response.expected,
                        observed = ?response.observed,
                        error = ?response.error,
                        "server declined appearance update"
                    );
                    if response.expected.is_some() && response.expected != response.observed {
                        self.refetch_cof().await;
                    }
                    200
                }
                Err(SyncError::Conflict { expected, observed }) => {
                    warn!(version, ?expected, ?observed, "appearance update conflicted with server COF version");
                    self.refetch_cof().await;
                    if !self.is_latest(generation) {
                        return SyncOutcome::Superseded;
                    }
                    let budget = self.config.appearance_retry.max_retries;
                    if conflict_policy.retry_count() >= budget {
                        return SyncOutcome::Deferred {
                            reason: "COF version kept conflicting".to_string(),
                        };
                    }
                    conflict_policy.should_retry(409);
                    continue;
                }
                Err(SyncError::MissingCapability(name)) => {
                    warn!(capability = name, "capability unavailable, appearance update skipped");
                    return SyncOutcome::Skipped {
                        reason: format!("{name} capability unavailable"),
                    };
                }
                Err(err) if err.is_transient() => {
                    warn!(version, error = %err, "appearance update failed");
                    err.status_code()
                }
                Err(err) => {
                    warn!(version, error = %err, "appearance update rejected");
                    return SyncOutcome::Deferred {
                        reason: err.to_string(),
                    };
                }
            };

            match transient_policy.should_retry(status) {
                Some(wait) => time::sleep(wait).await,
                None => {
                    warn!(retries = transient_policy.retry_count(), "appearance update deferred");
                    return SyncOutcome::Deferred {
                        reason: "retries exhausted".to_string(),
                    };
                }
            }
        }
    }

    /// Bump the COF version server-side. The new version becomes the last
    /// requested one and must exceed it.
    #[instrument(skip(self))]
    pub async fn increment_cof_version(&self) -> Result<i64, SyncError> {
        let mut policy = AdaptiveRetryPolicy::from_config(&self.config.increment_retry);
        loop {
            match self.service.increment_cof_version().await {
                Ok(version) => {
                    let last = self.state().last_requested;
                    if last.is_some_and(|last| version <= last) {
                        warn!(version, ?last, "COF version did not increase");
                        return Err(SyncError::InvalidResponse(format!(
                            "COF version {version} does not exceed last requested {}",
                            last.unwrap_or_default()
                        )));
                    }
                    self.update_state(|s| s.last_requested = Some(version));
                    info!(version, "COF version incremented");
                    return Ok(version);
                }
                Err(err) if err.is_transient() => match policy.should_retry(err.status_code()) {
                    Some(wait) => {
                        warn!(error = %err, wait_ms = wait.as_millis() as u64, "COF version increment failed, retrying");
                        time::sleep(wait).await;
                    }
                    None => return Err(err),
                },
                Err(err) => return Err(err),
            }
        }
    }
}
