//! Resolves the wearables linked from the COF into loaded assets.
//!
//! One [`WearableResolutionPattern`] exists per outfit application. It fetches
//! every wearable asset, replaces required wearables that failed to load with
//! freshly created defaults, applies the result to the avatar, and keeps
//! listening for assets that arrive after it gave up waiting.
//!
//! Patterns are superseded by newer ones through [`ResolutionRegistry`]. A
//! superseded pattern stops at its next checkpoint and never touches the COF
//! or the avatar again.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use tokio::time;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::AssetError;
use crate::domain::models::{
    AssetId, FolderId, FolderType, FoundWearable, InventoryItem, ItemId, LinkTarget, NewItem,
    NewLink, ResolutionConfig, WearableAsset, WearableType,
};
use crate::domain::ports::{AssetFetcher, AvatarSink, InventoryStore};
use crate::services::appearance_events::{AppearanceEventBus, AppearanceEventPayload};
use crate::services::clothing_order::sort_by_order_tag;
use crate::services::outfit_composer::OutfitComposer;

/// Hands out resolution tokens; creating one supersedes all earlier ones.
#[derive(Debug, Default)]
pub struct ResolutionRegistry {
    current: Arc<AtomicU64>,
    active: Arc<AtomicUsize>,
    latest: Mutex<Option<CancellationToken>>,
}

impl ResolutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, cancelling the previous one.
    pub fn begin(&self) -> ResolutionToken {
        let generation = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();

        let previous = self
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(cancel.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        self.active.fetch_add(1, Ordering::SeqCst);
        ResolutionToken {
            watch: TokenWatch {
                generation,
                current: Arc::clone(&self.current),
                cancel,
            },
            active: Arc::clone(&self.active),
        }
    }

    pub fn current_generation(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Patterns still alive, including superseded ones that are draining.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Cheap, cloneable view of a token used inside spawned steps.
#[derive(Debug, Clone)]
pub struct TokenWatch {
    generation: u64,
    current: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl TokenWatch {
    pub fn is_most_recent(&self) -> bool {
        !self.cancel.is_cancelled() && self.current.load(Ordering::SeqCst) == self.generation
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

/// Identity of one outfit application.
#[derive(Debug)]
pub struct ResolutionToken {
    watch: TokenWatch,
    active: Arc<AtomicUsize>,
}

impl ResolutionToken {
    pub fn is_most_recent(&self) -> bool {
        self.watch.is_most_recent()
    }

    pub const fn generation(&self) -> u64 {
        self.watch.generation
    }

    pub fn watch(&self) -> TokenWatch {
        self.watch.clone()
    }

    /// Resolves once a newer generation has started.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.watch.cancel.cancelled()
    }
}

impl Drop for ResolutionToken {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    Fetching,
    CheckingMissing,
    RecoveringMissing,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Applied,
    Superseded,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    pub generation: u64,
    pub outcome: ResolutionOutcome,
    /// Wearables the COF asked for.
    pub requested: usize,
    /// Wearables applied to the avatar, replacements included.
    pub applied: usize,
    /// The asset wait ended on its deadline rather than on the last reply.
    pub timed_out: bool,
    pub recovered: Vec<WearableType>,
    pub pruned: usize,
}

/// Progress of recovering one missing wearable type.
#[derive(Debug, Clone)]
pub enum RecoveryStep {
    ItemCreated {
        wearable_type: WearableType,
        item_id: ItemId,
        asset: WearableAsset,
    },
    Linked {
        wearable_type: WearableType,
        item_id: ItemId,
        asset: WearableAsset,
    },
    Failed {
        wearable_type: WearableType,
        reason: String,
    },
}

/// Collaborators a pattern needs.
#[derive(Clone)]
pub struct ResolutionContext {
    pub store: Arc<dyn InventoryStore>,
    pub assets: Arc<dyn AssetFetcher>,
    pub avatar: Arc<dyn AvatarSink>,
    pub composer: Arc<OutfitComposer>,
    pub events: Arc<AppearanceEventBus>,
}

/// What to resolve: the wearables, attachments and gestures of the COF.
#[derive(Debug, Clone, Default)]
pub struct ResolutionRequest {
    pub wearables: Vec<FoundWearable>,
    pub attachments: Vec<InventoryItem>,
    pub gestures: Vec<InventoryItem>,
}

/// Build wearable records from COF links.
///
/// Non-links and broken links are dropped; the rest keep ordering-tag order.
pub fn build_found_wearables(mut links: Vec<InventoryItem>) -> Vec<FoundWearable> {
    sort_by_order_tag(&mut links);
    links
        .into_iter()
        .filter_map(|link| {
            if !link.is_link() {
                warn!(item = %link.id, name = %link.name, "non-link in COF ignored");
                return None;
            }
            if link.is_broken_link() {
                warn!(item = %link.id, name = %link.name, "attempt to wear a broken link");
                return None;
            }
            let (Some(wearable_type), Some(asset_id)) = (link.wearable_type, link.asset_id) else {
                return None;
            };
            Some(
                FoundWearable::new(link.linked_item_id(), asset_id, link.name, wearable_type)
                    .with_link_description(link.description),
            )
        })
        .collect()
}

type AssetFetch = BoxFuture<'static, (AssetId, WearableType, Result<Option<WearableAsset>, AssetError>)>;

/// One outfit application's wearable resolution.
pub struct WearableResolutionPattern {
    ctx: ResolutionContext,
    token: ResolutionToken,
    config: ResolutionConfig,
    recoverable: Vec<WearableType>,
    state: ResolutionState,
    found: Vec<FoundWearable>,
    attachments: Vec<InventoryItem>,
    gestures: Vec<InventoryItem>,
    fetches: FuturesUnordered<AssetFetch>,
    fetches_issued: usize,
    fetches_done: usize,
    timed_out: bool,
    recoveries: FuturesUnordered<BoxFuture<'static, RecoveryStep>>,
    recovering: HashSet<WearableType>,
    recovered: Vec<WearableType>,
    pruned: HashSet<ItemId>,
}

impl WearableResolutionPattern {
    pub fn new(
        ctx: ResolutionContext,
        token: ResolutionToken,
        config: ResolutionConfig,
        recoverable: Vec<WearableType>,
        request: ResolutionRequest,
    ) -> Self {
        Self {
            ctx,
            token,
            config,
            recoverable,
            state: ResolutionState::Fetching,
            found: request.wearables,
            attachments: request.attachments,
            gestures: request.gestures,
            fetches: FuturesUnordered::new(),
            fetches_issued: 0,
            fetches_done: 0,
            timed_out: false,
            recoveries: FuturesUnordered::new(),
            recovering: HashSet::new(),
            recovered: Vec::new(),
            pruned: HashSet::new(),
        }
    }

    pub const fn state(&self) -> ResolutionState {
        self.state
    }

    pub const fn generation(&self) -> u64 {
        self.token.generation()
    }

    pub fn is_most_recent(&self) -> bool {
        self.token.is_most_recent()
    }

    pub fn found(&self) -> &[FoundWearable] {
        &self.found
    }

    /// Mark every unresolved record matching `asset` as resolved.
    /// Returns `true` if any record changed.
    pub fn on_asset_resolved(&mut self, asset: &WearableAsset) -> bool {
        let mut matched = false;
        for found in &mut self.found {
            if !found.is_replacement
                && found.resolved.is_none()
                && found.asset_id == asset.asset_id
                && found.wearable_type == asset.wearable_type
            {
                found.resolved = Some(asset.clone());
                matched = true;
            }
        }
        matched
    }

    /// Recoverable types that were requested but have no resolved record.
    pub fn missing_required_types(&self) -> Vec<WearableType> {
        self.recoverable
            .iter()
            .copied()
            .filter(|wearable_type| {
                let mut of_type = self.found.iter().filter(|f| f.wearable_type == *wearable_type);
                let requested = of_type.clone().any(|f| !f.is_replacement);
                requested && !of_type.any(FoundWearable::is_resolved)
            })
            .collect()
    }

    /// Resolved records in application order (by wearable type).
    pub fn applicable_wearables(&self) -> Vec<FoundWearable> {
        let mut applicable: Vec<FoundWearable> = self
            .found
            .iter()
            .filter(|f| f.is_applicable())
            .cloned()
            .collect();
        applicable.sort_by_key(|f| f.wearable_type);
        applicable
    }

    /// Remove and return the replacement records of the given types.
    pub fn take_replacements_of(&mut self, types: &[WearableType]) -> Vec<FoundWearable> {
        let (dropped, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.found)
            .into_iter()
            .partition(|f| f.is_replacement && types.contains(&f.wearable_type));
        self.found = kept;
        dropped
    }

    fn record_fetch(
        &mut self,
        asset_id: AssetId,
        wearable_type: WearableType,
        result: Result<Option<WearableAsset>, AssetError>,
    ) -> bool {
        self.fetches_done += 1;
        match result {
            Ok(Some(asset)) => self.on_asset_resolved(&asset),
            Ok(None) => {
                warn!(%asset_id, %wearable_type, "wearable asset not found");
                false
            }
            Err(err) => {
                warn!(%asset_id, %wearable_type, error = %err, "wearable asset fetch failed");
                false
            }
        }
    }

    fn issue_fetches(&mut self) {
        for found in self.found.iter().filter(|f| !f.is_replacement) {
            let assets = Arc::clone(&self.ctx.assets);
            let (asset_id, wearable_type) = (found.asset_id, found.wearable_type);
            self.fetches.push(
                async move {
                    let result = assets.fetch_wearable_asset(asset_id, wearable_type).await;
                    (asset_id, wearable_type, result)
                }
                .boxed(),
            );
            self.fetches_issued += 1;
        }
    }

    fn superseded(&self) -> ResolutionReport {
        info!(generation = self.generation(), state = ?self.state, "resolution superseded by a newer outfit");
        self.report(ResolutionOutcome::Superseded, 0)
    }

    fn report(&self, outcome: ResolutionOutcome, applied: usize) -> ResolutionReport {
        ResolutionReport {
            generation: self.generation(),
            outcome,
            requested: self.found.iter().filter(|f| !f.is_replacement).count(),
            applied,
            timed_out: self.timed_out,
            recovered: self.recovered.clone(),
            pruned: self.pruned.len(),
        }
    }

    /// Fetch, recover and apply. Returns once the avatar has been updated or
    /// the pattern has been superseded.
    #[instrument(skip(self), fields(generation = self.generation()))]
    pub async fn resolve(&mut self) -> ResolutionReport {
        info!(wearables = self.found.len(), "resolving wearables");
        self.issue_fetches();

        self.fetch_phase().await;
        if !self.is_most_recent() {
            return self.superseded();
        }

        self.state = ResolutionState::CheckingMissing;
        let missing = self.missing_required_types();
        if !missing.is_empty() {
            self.state = ResolutionState::RecoveringMissing;
            for wearable_type in missing {
                self.begin_recovery(wearable_type);
            }
            self.recovery_phase().await;
            if !self.is_most_recent() {
                return self.superseded();
            }
        }

        self.state = ResolutionState::Complete;
        match self.complete().await {
            Some(applied) => self.report(ResolutionOutcome::Applied, applied),
            None => self.superseded(),
        }
    }

    async fn fetch_phase(&mut self) {
        let deadline = time::sleep(Duration::from_secs(self.config.max_wearable_wait_secs));
        tokio::pin!(deadline);

        while self.fetches_done < self.fetches_issued {
            let reply = tokio::select! {
                Some(reply) = self.fetches.next() => Some(reply),
                () = &mut deadline => None,
                () = self.token.cancelled() => return,
            };
            match reply {
                Some((asset_id, wearable_type, result)) => {
                    self.record_fetch(asset_id, wearable_type, result);
                }
                None => {
                    self.timed_out = true;
                    warn!(
                        done = self.fetches_done,
                        issued = self.fetches_issued,
                        "gave up waiting for wearable assets"
                    );
                    return;
                }
            }
        }
        debug!(fetched = self.fetches_done, "all wearable fetches answered");
    }

    fn begin_recovery(&mut self, wearable_type: WearableType) {
        warn!(%wearable_type, "wearable could not be loaded, replacing with a default");
        self.ctx.events.publish(
            Some(self.generation()),
            AppearanceEventPayload::ReplacedMissingWearable { wearable_type },
        );
        self.recovering.insert(wearable_type);
        self.recoveries.push(
            create_recovery_item(
                Arc::clone(&self.ctx.store),
                Arc::clone(&self.ctx.assets),
                wearable_type,
            )
            .boxed(),
        );
    }

    async fn recovery_phase(&mut self) {
        let deadline = time::sleep(Duration::from_secs(self.config.missing_wait_secs));
        tokio::pin!(deadline);

        while !self.recovering.is_empty() {
            let step = tokio::select! {
                Some(step) = self.recoveries.next() => Some(step),
                () = &mut deadline => None,
                () = self.token.cancelled() => return,
            };
            match step {
                Some(RecoveryStep::ItemCreated { wearable_type, item_id, asset }) => {
                    self.recoveries.push(
                        link_recovery_item(
                            Arc::clone(&self.ctx.store),
                            self.ctx.composer.cof(),
                            self.token.watch(),
                            wearable_type,
                            item_id,
                            asset,
                        )
                        .boxed(),
                    );
                }
                Some(RecoveryStep::Linked { wearable_type, item_id, asset }) => {
                    debug!(%wearable_type, %item_id, "missing wearable recovered");
                    self.found.insert(0, FoundWearable::replacement(item_id, asset));
                    self.recovering.remove(&wearable_type);
                    self.recovered.push(wearable_type);
                }
                Some(RecoveryStep::Failed { wearable_type, reason }) => {
                    warn!(%wearable_type, %reason, "could not recover missing wearable");
                    self.recovering.remove(&wearable_type);
                }
                None => {
                    warn!(pending = self.recovering.len(), "gave up recovering missing wearables");
                    return;
                }
            }
        }
    }

    /// Push the resolved set to the avatar. `None` when a newer resolution
    /// took over part way through; nothing is touched after that point.
    async fn complete(&mut self) -> Option<usize> {
        if !self.gestures.is_empty() {
            self.ctx.avatar.activate_gestures(&self.gestures).await;
            if !self.is_most_recent() {
                return None;
            }
        }

        let applicable = self.applicable_wearables();
        self.ctx.avatar.apply_wearables(&applicable, true).await;
        if !self.is_most_recent() {
            return None;
        }
        self.ctx.avatar.update_attachments(&self.attachments).await;
        if !self.is_most_recent() {
            return None;
        }

        if self.config.prune_unresolved_links {
            self.prune_unresolved_links().await;
            if !self.is_most_recent() {
                return None;
            }
        }

        let unresolved = self
            .found
            .iter()
            .filter(|f| !f.is_replacement && !f.is_resolved())
            .count();
        info!(applied = applicable.len(), unresolved, "wearables applied");
        self.ctx.events.publish(
            Some(self.generation()),
            AppearanceEventPayload::WearablesApplied {
                applied: applicable.len(),
                unresolved,
            },
        );
        Some(applicable.len())
    }

    /// Drop COF links of wearables that never loaded and were not replaced.
    async fn prune_unresolved_links(&mut self) {
        let stale: Vec<ItemId> = self
            .found
            .iter()
            .filter(|f| {
                !f.is_replacement
                    && !f.is_resolved()
                    && !self.recovered.contains(&f.wearable_type)
                    && !self.recovering.contains(&f.wearable_type)
            })
            .map(|f| f.item_id)
            .collect();

        for item_id in stale {
            if !self.is_most_recent() {
                return;
            }
            match self.ctx.composer.remove_cof_item_links(item_id).await {
                Ok(removed) if removed > 0 => {
                    debug!(%item_id, "pruned link to unloadable wearable");
                    self.pruned.insert(item_id);
                }
                Ok(_) => {}
                Err(err) => warn!(%item_id, error = %err, "could not prune stale COF link"),
            }
        }
    }

    /// Keep applying assets that arrive after completion, for the configured
    /// window or until superseded. Returns how many late arrivals were applied.
    #[instrument(skip(self), fields(generation = self.generation()))]
    pub async fn watch_late_arrivals(mut self) -> usize {
        if self.fetches.is_empty() || self.config.late_arrival_window_secs == 0 {
            return 0;
        }
        let deadline = time::sleep(Duration::from_secs(self.config.late_arrival_window_secs));
        tokio::pin!(deadline);

        let mut applied = 0;
        while !self.fetches.is_empty() {
            let reply = tokio::select! {
                Some(reply) = self.fetches.next() => Some(reply),
                () = &mut deadline => None,
                () = self.token.cancelled() => None,
            };
            let Some((asset_id, wearable_type, result)) = reply else {
                break;
            };
            if !self.is_most_recent() {
                debug!("late arrival ignored by superseded resolution");
                break;
            }
            if self.record_fetch(asset_id, wearable_type, result)
                && self.apply_late_arrivals(&[wearable_type]).await
            {
                applied += 1;
            }
        }
        applied
    }

    /// Returns false if superseded before the avatar was updated.
    async fn apply_late_arrivals(&mut self, types: &[WearableType]) -> bool {
        info!(?types, "applying late-arriving wearables");

        for replacement in self.take_replacements_of(types) {
            if !self.is_most_recent() {
                return false;
            }
            if let Err(err) = self.ctx.composer.remove_cof_item_links(replacement.item_id).await {
                warn!(item = %replacement.item_id, error = %err, "could not unlink replacement wearable");
            }
        }

        let restorable: Vec<FoundWearable> = self
            .found
            .iter()
            .filter(|f| f.is_resolved() && self.pruned.contains(&f.item_id))
            .cloned()
            .collect();
        for found in restorable {
            if !self.is_most_recent() {
                return false;
            }
            match self
                .ctx
                .composer
                .add_cof_item_link(found.item_id, Some(&found.link_description))
                .await
            {
                Ok(_) => {
                    self.pruned.remove(&found.item_id);
                }
                Err(err) => warn!(item = %found.item_id, error = %err, "could not restore pruned link"),
            }
        }

        if !self.is_most_recent() {
            return false;
        }
        let applicable = self.applicable_wearables();
        self.ctx.avatar.apply_wearables(&applicable, true).await;
        if !self.is_most_recent() {
            return false;
        }
        self.ctx.events.publish(
            Some(self.generation()),
            AppearanceEventPayload::LateArrivalsApplied {
                wearable_types: types.to_vec(),
            },
        );
        true
    }
}

async fn create_recovery_item(
    store: Arc<dyn InventoryStore>,
    assets: Arc<dyn AssetFetcher>,
    wearable_type: WearableType,
) -> RecoveryStep {
    let failed = |reason: String| RecoveryStep::Failed {
        wearable_type,
        reason,
    };

    let asset = match assets.create_default_wearable(wearable_type).await {
        Ok(asset) => asset,
        Err(err) => return failed(err.to_string()),
    };
    let lost_and_found = match store.find_category_for_type(FolderType::LostAndFound).await {
        Ok(Some(folder)) => folder,
        Ok(None) => match store
            .create_category(None, FolderType::LostAndFound, "Lost And Found")
            .await
        {
            Ok(folder) => folder,
            Err(err) => return failed(err.to_string()),
        },
        Err(err) => return failed(err.to_string()),
    };

    let item = NewItem {
        parent: lost_and_found,
        name: asset.name.clone(),
        asset_type: wearable_type.asset_type(),
        wearable_type: Some(wearable_type),
        asset_id: asset.asset_id,
    };
    match store.create_item(item).await {
        Ok(item_id) => RecoveryStep::ItemCreated {
            wearable_type,
            item_id,
            asset,
        },
        Err(err) => failed(err.to_string()),
    }
}

async fn link_recovery_item(
    store: Arc<dyn InventoryStore>,
    cof: FolderId,
    watch: TokenWatch,
    wearable_type: WearableType,
    item_id: ItemId,
    asset: WearableAsset,
) -> RecoveryStep {
    if !watch.is_most_recent() {
        return RecoveryStep::Failed {
            wearable_type,
            reason: "superseded before linking".to_string(),
        };
    }
    let link = NewLink {
        target: LinkTarget::Item(item_id),
        parent: cof,
        name: asset.name.clone(),
        description: String::new(),
    };
    match store.create_link(link).await {
        Ok(_) => RecoveryStep::Linked {
            wearable_type,
            item_id,
            asset,
        },
        Err(err) => RecoveryStep::Failed {
            wearable_type,
            reason: err.to_string(),
        },
    }
}
