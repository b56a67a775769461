//! Appearance manager.
//!
//! Entry point for everything that changes what the avatar wears. Owns the
//! COF id, rewrites the COF through the [`OutfitComposer`], hands the result
//! to a fresh [`WearableResolutionPattern`] and finally asks the server to
//! rebake appearance through the [`ServerSyncCoordinator`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::errors::{AppearanceError, AppearanceResult, InventoryError, SyncError};
use crate::domain::models::{
    AssetType, Config, FolderId, FolderType, InventoryCategory, InventoryItem, ItemFilter, ItemId,
    WearableType,
};
use crate::domain::ports::{AppearanceService, AssetFetcher, AvatarSink, InventoryStore};
use crate::services::appearance_events::{AppearanceEvent, AppearanceEventBus, AppearanceEventPayload};
use crate::services::clothing_order::{build_order_tag, sort_by_order_tag, swap_with_neighbour};
use crate::services::outfit_composer::OutfitComposer;
use crate::services::server_sync::{ServerSyncCoordinator, SyncOutcome, SyncState};
use crate::services::wearable_resolution::{
    build_found_wearables, ResolutionContext, ResolutionOutcome, ResolutionRegistry, ResolutionReport,
    ResolutionRequest, WearableResolutionPattern,
};

/// External collaborators of the manager.
#[derive(Clone)]
pub struct AppearanceDeps {
    pub store: Arc<dyn InventoryStore>,
    pub assets: Arc<dyn AssetFetcher>,
    pub avatar: Arc<dyn AvatarSink>,
    pub service: Arc<dyn AppearanceService>,
}

pub struct AppearanceManager {
    store: Arc<dyn InventoryStore>,
    assets: Arc<dyn AssetFetcher>,
    avatar: Arc<dyn AvatarSink>,
    config: Config,
    cof: FolderId,
    composer: Arc<OutfitComposer>,
    sync: ServerSyncCoordinator,
    registry: ResolutionRegistry,
    events: Arc<AppearanceEventBus>,
    /// Serializes the COF clean-up that precedes a resolution.
    prelude: tokio::sync::Mutex<()>,
    outfit_generation: AtomicU64,
    outfit_dirty: AtomicBool,
    late_arrivals: Mutex<Option<JoinHandle<usize>>>,
    /// Attachments attached or detached outside an outfit change are
    /// mirrored into the COF only while this is set.
    attachment_links: AtomicBool,
}

impl AppearanceManager {
    /// Locate the COF, creating it when the inventory has none.
    #[instrument(skip_all)]
    pub async fn bootstrap(deps: AppearanceDeps, config: Config) -> AppearanceResult<Self> {
        let cof = match deps.store.find_category_for_type(FolderType::CurrentOutfit).await? {
            Some(cof) => cof,
            None => {
                warn!("no Current Outfit Folder found, creating one");
                deps.store
                    .create_category(None, FolderType::CurrentOutfit, "Current Outfit")
                    .await?
            }
        };
        info!(%cof, "appearance manager ready");

        let composer = Arc::new(OutfitComposer::new(
            Arc::clone(&deps.store),
            Arc::clone(&deps.avatar),
            cof,
            config.outfit.clone(),
            config.batch.clone(),
        ));
        let sync = ServerSyncCoordinator::new(
            deps.service,
            Arc::clone(&deps.store),
            cof,
            config.server.clone(),
        );

        Ok(Self {
            store: deps.store,
            assets: deps.assets,
            avatar: deps.avatar,
            config,
            cof,
            composer,
            sync,
            registry: ResolutionRegistry::new(),
            events: Arc::new(AppearanceEventBus::default()),
            prelude: tokio::sync::Mutex::new(()),
            outfit_generation: AtomicU64::new(0),
            outfit_dirty: AtomicBool::new(false),
            late_arrivals: Mutex::new(None),
            attachment_links: AtomicBool::new(true),
        })
    }

    pub const fn cof(&self) -> FolderId {
        self.cof
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub fn composer(&self) -> &OutfitComposer {
        &self.composer
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    /// Resolution patterns still alive, superseded ones included.
    pub fn active_resolutions(&self) -> usize {
        self.registry.active_count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppearanceEvent> {
        self.events.subscribe()
    }

    fn publish(&self, generation: Option<u64>, payload: AppearanceEventPayload) {
        self.events.publish(generation, payload);
    }

    fn is_latest_outfit_change(&self, generation: u64) -> bool {
        self.outfit_generation.load(Ordering::SeqCst) == generation
    }

    // ---- outfit changes ----

    /// Wear `folder` in place of the current outfit.
    pub async fn replace_current_outfit(&self, folder: FolderId) -> AppearanceResult<bool> {
        self.wear_inventory_category(folder, false, false).await
    }

    /// Add the contents of `folder` to what is worn.
    pub async fn add_category_to_current_outfit(&self, folder: FolderId) -> AppearanceResult<bool> {
        self.wear_inventory_category(folder, false, true).await
    }

    /// Wear the first folder called `name` outside the trash in place of the
    /// current outfit.
    #[instrument(skip(self))]
    pub async fn wear_outfit_by_name(&self, name: &str) -> AppearanceResult<bool> {
        let Some(category) = self.store.find_categories_by_name(name).await?.into_iter().next() else {
            warn!(name, "could not find outfit");
            return Ok(false);
        };
        info!(name, folder = %category.id, "wearing outfit by name");
        self.wear_inventory_category(category.id, false, false).await
    }

    /// Wear a folder, optionally copying its items into a new folder first.
    #[instrument(skip(self))]
    pub async fn wear_inventory_category(
        &self,
        folder: FolderId,
        copy: bool,
        append: bool,
    ) -> AppearanceResult<bool> {
        let category = self
            .store
            .get_category(folder)
            .await?
            .ok_or(AppearanceError::CategoryNotFound(folder))?;
        if !copy {
            return self.update_cof(folder, append).await;
        }

        let folder_type = if category.folder_type == FolderType::Outfit {
            FolderType::Outfit
        } else {
            FolderType::None
        };
        let copy_folder = self
            .store
            .create_category(None, folder_type, &category.name)
            .await?;
        if !self.composer.copy_category_items(folder, copy_folder).await? {
            error!(%folder, %copy_folder, "could not copy folder before wearing it");
            self.publish(
                None,
                AppearanceEventPayload::OutfitChangeFailed {
                    folder,
                    failed_items: 0,
                },
            );
            return Ok(false);
        }
        self.update_cof(copy_folder, append).await
    }

    /// Rewrite the COF from `folder` and, if the batch fully succeeds and no
    /// newer change has started meanwhile, update the avatar from it.
    #[instrument(skip(self))]
    pub async fn update_cof(&self, folder: FolderId, append: bool) -> AppearanceResult<bool> {
        let generation = self.outfit_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.publish(
            Some(generation),
            AppearanceEventPayload::OutfitChangeRequested { folder, append },
        );

        let update = self.composer.update_cof(folder, append).await?;
        self.publish(
            Some(generation),
            AppearanceEventPayload::CofUpdated {
                linked: update.batch.created.len(),
                purged: update.purged,
            },
        );

        if !update.batch.is_success() {
            error!(
                %folder,
                failed = update.batch.failed.len(),
                "outfit change failed, avatar left as it was"
            );
            self.publish(
                Some(generation),
                AppearanceEventPayload::OutfitChangeFailed {
                    folder,
                    failed_items: update.batch.failed.len(),
                },
            );
            return Ok(false);
        }
        if !self.is_latest_outfit_change(generation) {
            debug!(generation, "outfit change superseded before the avatar update");
            return Ok(false);
        }

        self.update_appearance_from_cof(false).await?;
        Ok(true)
    }

    /// Bring the avatar in line with the COF.
    ///
    /// Cleans the COF up, then resolves its wearables under a new resolution
    /// token and, once applied, requests the server update. Returns `None`
    /// when the COF held nothing wearable.
    #[instrument(skip(self))]
    pub async fn update_appearance_from_cof(
        &self,
        update_base_outfit_ordering: bool,
    ) -> AppearanceResult<Option<ResolutionReport>> {
        let mut pattern = {
            let _prelude = self.prelude.lock().await;

            if update_base_outfit_ordering {
                if let Some((_, base)) = self.composer.base_outfit_link().await? {
                    self.composer.update_clothing_ordering_info(base).await?;
                }
            }
            self.composer.update_clothing_ordering_info(self.cof).await?;
            self.composer.enforce_item_restrictions().await?;
            self.refresh_outfit_dirty().await?;

            let contents = self.composer.collect_contents(self.cof).await?;
            let wearable_links: Vec<InventoryItem> = contents
                .body_parts
                .into_iter()
                .chain(contents.clothing)
                .collect();
            let wearables = build_found_wearables(wearable_links);
            if wearables.is_empty() {
                error!(cof = %self.cof, "COF holds no wearables, nothing to put on");
                self.publish(None, AppearanceEventPayload::CouldNotPutOnOutfit);
                return Ok(None);
            }

            let ctx = ResolutionContext {
                store: Arc::clone(&self.store),
                assets: Arc::clone(&self.assets),
                avatar: Arc::clone(&self.avatar),
                composer: Arc::clone(&self.composer),
                events: Arc::clone(&self.events),
            };
            WearableResolutionPattern::new(
                ctx,
                self.registry.begin(),
                self.config.resolution.clone(),
                self.config.outfit.recoverable_types.clone(),
                ResolutionRequest {
                    wearables,
                    attachments: contents.attachments,
                    gestures: contents.gestures,
                },
            )
        };

        let report = pattern.resolve().await;
        if report.outcome == ResolutionOutcome::Superseded {
            debug!(generation = report.generation, "resolution superseded");
            return Ok(Some(report));
        }

        let watch = tokio::spawn(pattern.watch_late_arrivals());
        if let Some(previous) = self
            .late_arrivals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(watch)
        {
            previous.abort();
        }

        if self.avatar.is_editing_appearance() {
            debug!("appearance editing in progress, server update skipped");
            self.publish(
                Some(report.generation),
                AppearanceEventPayload::ServerSyncSkipped {
                    reason: "appearance editing in progress".to_string(),
                },
            );
        } else {
            self.request_server_appearance_update().await;
        }
        Ok(Some(report))
    }

    /// Wait for the most recent late-arrival watch to end. Returns how many
    /// late wearables it applied.
    pub async fn join_late_arrivals(&self) -> usize {
        let watch = self
            .late_arrivals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match watch {
            Some(watch) => watch.await.unwrap_or_default(),
            None => 0,
        }
    }

    // ---- single items ----

    /// Put one item on.
    ///
    /// Items in the trash or already linked from the COF are refused. With
    /// `replace`, or when the type is full, clothing takes the place of the
    /// outermost layer of its type; body parts always replace.
    #[instrument(skip(self))]
    pub async fn wear_item_on_avatar(
        &self,
        item_id: ItemId,
        do_update: bool,
        replace: bool,
    ) -> AppearanceResult<bool> {
        let item = self
            .store
            .get_item(item_id)
            .await?
            .ok_or(InventoryError::ItemNotFound(item_id))?;
        if self.is_in_trash(item.parent_id).await? {
            warn!(item = %item.name, "refusing to wear an item from the trash");
            return Ok(false);
        }

        let linked_id = item.linked_item_id();
        let mut cof_links = self.composer.cof_item_links().await?;
        if cof_links.iter().any(|l| l.linked_item_id() == linked_id) {
            debug!(item = %item.name, "already worn");
            return Ok(false);
        }

        let description = match (item.asset_type, item.wearable_type) {
            (Some(AssetType::Clothing), Some(wearable_type)) => {
                cof_links.retain(|l| l.wearable_type == Some(wearable_type));
                sort_by_order_tag(&mut cof_links);
                let mut count = cof_links.len();
                if (replace && count != 0) || count >= self.composer.max_clothing_per_type() {
                    if let Some(top) = cof_links.last() {
                        debug!(item = %top.name, "taking off outermost layer");
                        self.composer.purge_cof_link(top).await?;
                        count -= 1;
                    }
                }
                Some(build_order_tag(wearable_type, count))
            }
            (Some(AssetType::BodyPart), Some(wearable_type)) => {
                self.composer.remove_cof_links_of_type(wearable_type).await?;
                None
            }
            (Some(AssetType::Object | AssetType::Gesture), _) => None,
            _ => {
                warn!(item = %item.name, asset_type = ?item.asset_type, "item cannot be worn");
                return Ok(false);
            }
        };

        self.composer
            .add_cof_item_link(item_id, description.as_deref())
            .await?;
        if do_update {
            self.update_appearance_from_cof(false).await?;
        }
        Ok(true)
    }

    /// Link an item into the COF without the wear rules of
    /// [`Self::wear_item_on_avatar`].
    pub async fn add_cof_item_link(&self, item_id: ItemId, do_update: bool) -> AppearanceResult<Option<ItemId>> {
        let link = self.composer.add_cof_item_link(item_id, None).await?;
        if do_update && link.is_some() {
            self.update_appearance_from_cof(false).await?;
        }
        Ok(link)
    }

    pub async fn remove_item_from_avatar(&self, item_id: ItemId) -> AppearanceResult<usize> {
        self.remove_items_from_avatar(&[item_id]).await
    }

    /// Unlink the given items (or the items the given links point at) and
    /// update the avatar if anything changed.
    #[instrument(skip(self))]
    pub async fn remove_items_from_avatar(&self, item_ids: &[ItemId]) -> AppearanceResult<usize> {
        let mut removed = 0;
        for &item_id in item_ids {
            let linked_id = self
                .store
                .get_item(item_id)
                .await?
                .map_or(item_id, |item| item.linked_item_id());
            removed += self.composer.remove_cof_item_links(linked_id).await?;
        }
        if removed > 0 {
            self.update_appearance_from_cof(false).await?;
        }
        Ok(removed)
    }

    /// Take off every piece of clothing, keeping body parts and attachments.
    pub async fn remove_all_clothes_from_avatar(&self) -> AppearanceResult<usize> {
        let clothing: Vec<ItemId> = self
            .composer
            .cof_item_links()
            .await?
            .into_iter()
            .filter(InventoryItem::is_clothing)
            .map(|link| link.linked_item_id())
            .collect();
        info!(count = clothing.len(), "removing all clothes");
        self.remove_items_from_avatar(&clothing).await
    }

    /// Take off what is worn from `folder`: clothing and attachments, never
    /// body parts.
    #[instrument(skip(self))]
    pub async fn take_off_outfit(&self, folder: FolderId) -> AppearanceResult<usize> {
        let items: Vec<ItemId> = self
            .store
            .collect_descendants(folder, ItemFilter::All)
            .await?
            .into_iter()
            .filter(|item| item.is_clothing() || item.is_of_asset_type(AssetType::Object))
            .map(|item| item.linked_item_id())
            .collect();
        self.remove_items_from_avatar(&items).await
    }

    /// Take off every attachment linked from the COF.
    pub async fn remove_all_attachments_from_avatar(&self) -> AppearanceResult<usize> {
        let attachments: Vec<ItemId> = self
            .composer
            .cof_item_links()
            .await?
            .into_iter()
            .filter(|link| link.is_of_asset_type(AssetType::Object))
            .map(|link| link.linked_item_id())
            .collect();
        info!(count = attachments.len(), "removing all attachments");
        self.remove_items_from_avatar(&attachments).await
    }

    // ---- attachments changed outside outfit changes ----

    pub fn set_attachment_links_enabled(&self, enabled: bool) {
        self.attachment_links.store(enabled, Ordering::SeqCst);
    }

    /// An object was attached on its own: link it from the COF without
    /// updating the avatar.
    #[instrument(skip(self))]
    pub async fn register_attachment(&self, item_id: ItemId) -> AppearanceResult<Option<ItemId>> {
        if !self.attachment_links.load(Ordering::SeqCst) {
            debug!("attachment links disabled, COF unchanged");
            return Ok(None);
        }
        self.composer.add_cof_item_link(item_id, None).await
    }

    /// An object was detached on its own: drop its COF links.
    #[instrument(skip(self))]
    pub async fn unregister_attachment(&self, item_id: ItemId) -> AppearanceResult<usize> {
        if !self.attachment_links.load(Ordering::SeqCst) {
            debug!("attachment links disabled, COF unchanged");
            return Ok(0);
        }
        self.composer.remove_cof_item_links(item_id).await
    }

    // ---- COF membership ----

    /// The object sits somewhere below the COF.
    pub async fn is_in_cof(&self, item_id: ItemId) -> AppearanceResult<bool> {
        let Some(item) = self.store.get_item(item_id).await? else {
            return Ok(false);
        };
        let cof = self.cof;
        self.has_ancestor(item.parent_id, |category| category.id == cof)
            .await
    }

    /// Some COF link points at the same item as `item_id`.
    pub async fn is_link_in_cof(&self, item_id: ItemId) -> AppearanceResult<bool> {
        let linked_id = self
            .store
            .get_item(item_id)
            .await?
            .map_or(item_id, |item| item.linked_item_id());
        Ok(self
            .store
            .collect_descendants(self.cof, ItemFilter::Links)
            .await?
            .iter()
            .any(|link| link.linked_item_id() == linked_id))
    }

    /// COF links may only go away through take off or detach. A non-link
    /// that ended up in the COF can be deleted.
    pub async fn is_protected_cof_item(&self, item_id: ItemId) -> AppearanceResult<bool> {
        if !self.is_in_cof(item_id).await? {
            return Ok(false);
        }
        Ok(self
            .store
            .get_item(item_id)
            .await?
            .is_some_and(|item| item.is_link()))
    }

    pub async fn remove_cof_item_links(&self, item_id: ItemId) -> AppearanceResult<usize> {
        self.composer.remove_cof_item_links(item_id).await
    }

    pub async fn remove_cof_links_of_type(&self, wearable_type: WearableType) -> AppearanceResult<usize> {
        self.composer.remove_cof_links_of_type(wearable_type).await
    }

    /// Move a clothing link one layer towards (or away from) the body.
    #[instrument(skip(self))]
    pub async fn move_wearable(&self, link_id: ItemId, closer_to_body: bool) -> AppearanceResult<bool> {
        let cof_links = self.composer.cof_item_links().await?;
        if !cof_links.iter().any(|l| l.id == link_id) {
            return Err(InventoryError::ItemNotFound(link_id).into());
        }
        let Some(updates) = swap_with_neighbour(&cof_links, link_id, closer_to_body) else {
            debug!(%link_id, closer_to_body, "wearable already at the end of its layers");
            return Ok(false);
        };
        for (id, description) in &updates {
            self.store.update_item_description(*id, description).await?;
        }
        self.refresh_outfit_dirty().await?;
        Ok(true)
    }

    // ---- base outfit ----

    pub async fn base_outfit_id(&self) -> AppearanceResult<Option<FolderId>> {
        Ok(self.composer.base_outfit_link().await?.map(|(_, folder)| folder))
    }

    pub async fn base_outfit_name(&self) -> AppearanceResult<Option<String>> {
        let Some(folder) = self.base_outfit_id().await? else {
            return Ok(None);
        };
        Ok(self.store.get_category(folder).await?.map(|c| c.name))
    }

    /// Re-wear the outfit the COF was last based on.
    pub async fn wear_base_outfit(&self) -> AppearanceResult<bool> {
        match self.base_outfit_id().await? {
            Some(folder) => self.update_cof(folder, false).await,
            None => {
                debug!("no base outfit to wear");
                Ok(false)
            }
        }
    }

    /// Save what is worn as a new outfit folder under My Outfits and make it
    /// the base outfit.
    #[instrument(skip(self))]
    pub async fn make_new_outfit_links(&self, name: &str) -> AppearanceResult<FolderId> {
        let my_outfits = match self.store.find_category_for_type(FolderType::MyOutfits).await? {
            Some(folder) => folder,
            None => {
                self.store
                    .create_category(None, FolderType::MyOutfits, "My Outfits")
                    .await?
            }
        };
        let folder = self
            .store
            .create_category(Some(my_outfits), FolderType::Outfit, name)
            .await?;

        self.composer.update_clothing_ordering_info(self.cof).await?;
        if !self
            .composer
            .shallow_copy_category_contents(self.cof, folder)
            .await?
        {
            warn!(%folder, "some COF items were not copied into the new outfit");
        }
        self.composer.create_base_outfit_link(folder).await?;
        self.outfit_dirty.store(false, Ordering::SeqCst);
        info!(%folder, name, "outfit saved");
        Ok(folder)
    }

    /// Overwrite the base outfit folder with what is worn.
    #[instrument(skip(self))]
    pub async fn update_base_outfit(&self) -> AppearanceResult<bool> {
        let Some(base) = self.base_outfit_id().await? else {
            warn!("no base outfit to update");
            return Ok(false);
        };

        let old_links: Vec<InventoryItem> = self
            .store
            .collect_descendants(base, ItemFilter::Links)
            .await?
            .into_iter()
            .filter(|link| link.parent_id == base)
            .collect();
        for link in &old_links {
            self.composer.purge_cof_link(link).await?;
        }

        self.composer.update_clothing_ordering_info(self.cof).await?;
        let copied = self
            .composer
            .shallow_copy_category_contents(self.cof, base)
            .await?;
        self.outfit_dirty.store(false, Ordering::SeqCst);
        Ok(copied)
    }

    /// Whether the worn outfit differs from its base outfit, as of the last
    /// COF refresh.
    pub fn is_outfit_dirty(&self) -> bool {
        self.outfit_dirty.load(Ordering::SeqCst)
    }

    async fn refresh_outfit_dirty(&self) -> AppearanceResult<bool> {
        let dirty = self.composer.is_outfit_dirty().await?;
        self.outfit_dirty.store(dirty, Ordering::SeqCst);
        Ok(dirty)
    }

    // ---- server ----

    pub async fn request_server_appearance_update(&self) -> SyncOutcome {
        let outcome = self.sync.request_server_appearance_update().await;
        let payload = match &outcome {
            SyncOutcome::Synced { version } => Some(AppearanceEventPayload::ServerSyncCompleted {
                cof_version: *version,
            }),
            SyncOutcome::Deferred { reason } => Some(AppearanceEventPayload::ServerSyncDeferred {
                reason: reason.clone(),
            }),
            SyncOutcome::Skipped { reason } => Some(AppearanceEventPayload::ServerSyncSkipped {
                reason: reason.clone(),
            }),
            SyncOutcome::Superseded => None,
        };
        if let Some(payload) = payload {
            self.publish(None, payload);
        }
        outcome
    }

    pub async fn increment_cof_version(&self) -> Result<i64, SyncError> {
        self.sync.increment_cof_version().await
    }

    async fn is_in_trash(&self, folder: FolderId) -> AppearanceResult<bool> {
        self.has_ancestor(folder, |category| category.folder_type == FolderType::Trash)
            .await
    }

    /// `folder` or one of its parents matches `pred`.
    async fn has_ancestor(
        &self,
        folder: FolderId,
        pred: impl Fn(&InventoryCategory) -> bool + Send,
    ) -> AppearanceResult<bool> {
        let mut current = Some(folder);
        while let Some(id) = current {
            let Some(category) = self.store.get_category(id).await? else {
                return Ok(false);
            };
            if pred(&category) {
                return Ok(true);
            }
            current = category.parent_id;
        }
        Ok(false)
    }
}
