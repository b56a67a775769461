//! Computes and applies new Current Outfit Folder contents.
//!
//! The planning half is pure: given what the COF and a source folder hold, it
//! decides which items the COF should link to. The applying half diffs that
//! plan against the live COF, links what is missing through a
//! [`BatchOperationCoordinator`] and purges links that are no longer wanted.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::domain::errors::{AppearanceError, AppearanceResult, InventoryError};
use crate::domain::models::{
    AssetType, BatchConfig, FolderId, FolderType, InventoryItem, ItemFilter, ItemId, LinkTarget,
    NewLink, OutfitConfig, WearableType,
};
use crate::domain::ports::{AvatarSink, InventoryStore};
use crate::services::batch_operation::{
    BatchOperationCoordinator, BatchReport, CopyItemsOperation, LinkItemsOperation, LinkSource,
};
use crate::services::clothing_order::{compute_order_updates, sort_by_order_tag};

/// Keep the last occurrence of each linked item, preserving relative order.
pub fn remove_duplicate_items(items: Vec<InventoryItem>) -> Vec<InventoryItem> {
    let mut seen = HashSet::new();
    let mut kept: Vec<InventoryItem> = items
        .into_iter()
        .rev()
        .filter(|item| seen.insert(item.linked_item_id()))
        .collect();
    kept.reverse();
    kept
}

/// Keep the last `max_per_type` items of each wearable type, grouped by type
/// in index order. Items without a wearable type are dropped.
pub fn filter_wearable_items(items: Vec<InventoryItem>, max_per_type: usize) -> Vec<InventoryItem> {
    let mut by_type: HashMap<WearableType, Vec<InventoryItem>> = HashMap::new();
    for item in items {
        if let Some(wearable_type) = item.wearable_type {
            by_type.entry(wearable_type).or_default().push(item);
        }
    }

    let mut filtered = Vec::new();
    for wearable_type in WearableType::ALL {
        if let Some(mut of_type) = by_type.remove(&wearable_type) {
            let start = of_type.len().saturating_sub(max_per_type);
            filtered.extend(of_type.drain(start..));
        }
    }
    filtered
}

/// Items of a folder split by what they put on the avatar.
#[derive(Debug, Clone, Default)]
pub struct OutfitContents {
    pub body_parts: Vec<InventoryItem>,
    pub clothing: Vec<InventoryItem>,
    pub attachments: Vec<InventoryItem>,
    pub gestures: Vec<InventoryItem>,
}

impl OutfitContents {
    pub fn from_items(items: impl IntoIterator<Item = InventoryItem>) -> Self {
        let mut contents = Self::default();
        for item in items {
            match item.asset_type {
                Some(AssetType::BodyPart) => contents.body_parts.push(item),
                Some(AssetType::Clothing) => contents.clothing.push(item),
                Some(AssetType::Object) => contents.attachments.push(item),
                Some(AssetType::Gesture) => contents.gestures.push(item),
                _ => {}
            }
        }
        contents
    }
}

/// The COF contents an outfit change should produce.
#[derive(Debug, Clone, Default)]
pub struct CofPlan {
    pub body_parts: Vec<InventoryItem>,
    pub clothing: Vec<InventoryItem>,
    pub attachments: Vec<InventoryItem>,
    pub gestures: Vec<InventoryItem>,
    pub append: bool,
}

impl CofPlan {
    pub fn items(&self) -> impl Iterator<Item = &InventoryItem> {
        self.body_parts
            .iter()
            .chain(&self.clothing)
            .chain(&self.attachments)
            .chain(&self.gestures)
    }

    pub fn len(&self) -> usize {
        self.body_parts.len() + self.clothing.len() + self.attachments.len() + self.gestures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn linked_ids(&self) -> HashSet<ItemId> {
        self.items().map(InventoryItem::linked_item_id).collect()
    }

    /// Check the per-type caps and linked-item uniqueness.
    pub fn verify(&self, max_clothing_per_type: usize) -> AppearanceResult<()> {
        let mut counts: HashMap<WearableType, usize> = HashMap::new();
        for item in self.body_parts.iter().chain(&self.clothing) {
            if let Some(wearable_type) = item.wearable_type {
                *counts.entry(wearable_type).or_default() += 1;
            }
        }
        for (wearable_type, count) in counts {
            let cap = if wearable_type.is_body_part() { 1 } else { max_clothing_per_type };
            if count > cap {
                return Err(AppearanceError::InvariantViolation(format!(
                    "{count} {wearable_type} items planned, at most {cap} allowed"
                )));
            }
        }
        if self.linked_ids().len() != self.len() {
            return Err(AppearanceError::InvariantViolation(
                "planned COF links to the same item twice".to_string(),
            ));
        }
        Ok(())
    }
}

/// Merge current COF contents with a source folder's contents.
///
/// Body parts always fall back to the COF so a required part missing from
/// the source stays worn; when appending the COF's body parts win. Clothing,
/// attachments and gestures from the COF survive only when appending.
pub fn plan_cof(
    cof: &OutfitContents,
    source: &OutfitContents,
    append: bool,
    max_clothing_per_type: usize,
) -> CofPlan {
    let merge = |from_cof: &[InventoryItem], from_source: &[InventoryItem]| {
        let mut merged = Vec::with_capacity(from_cof.len() + from_source.len());
        if append {
            merged.extend_from_slice(from_cof);
        }
        merged.extend_from_slice(from_source);
        remove_duplicate_items(merged)
    };

    let mut body_parts: Vec<InventoryItem> = cof
        .body_parts
        .iter()
        .chain(&source.body_parts)
        .cloned()
        .collect();
    if append {
        body_parts.reverse();
    }
    let body_parts = filter_wearable_items(remove_duplicate_items(body_parts), 1);
    let clothing = filter_wearable_items(
        merge(&cof.clothing, &source.clothing),
        max_clothing_per_type,
    );

    CofPlan {
        body_parts,
        clothing,
        attachments: merge(&cof.attachments, &source.attachments),
        gestures: merge(&cof.gestures, &source.gestures),
        append,
    }
}

/// Differences between the COF and a base outfit that make the outfit dirty.
pub fn outfit_differs(cof_links: &[InventoryItem], outfit_links: &[InventoryItem]) -> bool {
    if cof_links.len() != outfit_links.len() {
        return true;
    }
    let mut cof: Vec<&InventoryItem> = cof_links.iter().collect();
    let mut outfit: Vec<&InventoryItem> = outfit_links.iter().collect();
    cof.sort_by_key(|item| item.linked_item_id());
    outfit.sort_by_key(|item| item.linked_item_id());

    cof.iter().zip(&outfit).any(|(a, b)| {
        a.linked_item_id() != b.linked_item_id()
            || a.name != b.name
            || a.description != b.description
    })
}

/// Result of rewriting the COF for an outfit change.
#[derive(Debug, Clone)]
pub struct CofUpdate {
    pub plan: CofPlan,
    /// Links created (or attempted) through the batch.
    pub batch: BatchReport<LinkSource>,
    /// COF links removed because the new outfit no longer wants them.
    pub purged: usize,
}

/// Rewrites and maintains the Current Outfit Folder.
pub struct OutfitComposer {
    store: Arc<dyn InventoryStore>,
    avatar: Arc<dyn AvatarSink>,
    cof: FolderId,
    outfit: OutfitConfig,
    batch: BatchConfig,
}

impl OutfitComposer {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        avatar: Arc<dyn AvatarSink>,
        cof: FolderId,
        outfit: OutfitConfig,
        batch: BatchConfig,
    ) -> Self {
        Self {
            store,
            avatar,
            cof,
            outfit,
            batch,
        }
    }

    pub const fn cof(&self) -> FolderId {
        self.cof
    }

    pub const fn max_clothing_per_type(&self) -> usize {
        self.outfit.max_clothing_per_type
    }

    pub async fn collect_contents(&self, folder: FolderId) -> Result<OutfitContents, InventoryError> {
        let items = self.store.collect_descendants(folder, ItemFilter::All).await?;
        Ok(OutfitContents::from_items(items))
    }

    /// Item links (not folder links) currently in the COF.
    pub async fn cof_item_links(&self) -> Result<Vec<InventoryItem>, InventoryError> {
        let links = self.store.collect_descendants(self.cof, ItemFilter::Links).await?;
        Ok(links.into_iter().filter(|l| !l.is_folder_link()).collect())
    }

    /// Replace or extend the COF with the contents of `source`.
    #[instrument(skip(self), fields(cof = %self.cof))]
    pub async fn update_cof(&self, source: FolderId, append: bool) -> AppearanceResult<CofUpdate> {
        let cof_contents = self.collect_contents(self.cof).await?;
        if !append && !cof_contents.gestures.is_empty() {
            self.avatar.deactivate_gestures(&cof_contents.gestures).await;
        }
        let source_contents = self.collect_contents(source).await?;

        let plan = plan_cof(
            &cof_contents,
            &source_contents,
            append,
            self.outfit.max_clothing_per_type,
        );
        if let Err(err) = plan.verify(self.outfit.max_clothing_per_type) {
            error!(error = %err, "refusing to apply COF plan");
            return Err(err);
        }

        let cof_links = self.store.collect_descendants(self.cof, ItemFilter::Links).await?;
        let existing: HashMap<ItemId, ItemId> = cof_links
            .iter()
            .filter(|link| !link.is_folder_link())
            .map(|link| (link.linked_item_id(), link.id))
            .collect();

        let mut keep = HashSet::new();
        let mut sources = Vec::new();
        for item in plan.items() {
            if item.parent_id == self.cof {
                keep.insert(item.id);
            } else if let Some(link) = existing.get(&item.linked_item_id()) {
                keep.insert(*link);
            } else {
                sources.push(LinkSource::Item(item.id));
            }
        }
        if !append {
            sources.push(LinkSource::Folder(source));
        }

        let stale: Vec<InventoryItem> = cof_links
            .into_iter()
            .filter(|link| !keep.contains(&link.id))
            .filter(|link| !(append && link.is_folder_link()))
            .collect();

        info!(
            planned = plan.len(),
            to_link = sources.len(),
            to_purge = stale.len(),
            append,
            "updating COF"
        );

        let coordinator = BatchOperationCoordinator::new(
            LinkItemsOperation::new(Arc::clone(&self.store), self.cof),
            &self.batch,
        );
        let (batch, purged) = tokio::join!(coordinator.run(sources), self.purge_links(&stale));

        Ok(CofUpdate {
            plan,
            batch,
            purged: purged?,
        })
    }

    async fn purge_links(&self, links: &[InventoryItem]) -> AppearanceResult<usize> {
        let mut purged = 0;
        for link in links {
            if self.purge_cof_link(link).await? {
                purged += 1;
            }
        }
        Ok(purged)
    }

    /// Purge one COF link. Returns `false` if it was already gone.
    pub async fn purge_cof_link(&self, item: &InventoryItem) -> AppearanceResult<bool> {
        if !item.is_link() {
            let err = AppearanceError::InvariantViolation(format!(
                "attempted to purge non-link {} ({}) from the COF",
                item.id, item.name
            ));
            error!(error = %err, "COF purge rejected");
            return Err(err);
        }
        match self.store.purge_object(item.id).await {
            Ok(()) => Ok(true),
            Err(InventoryError::ItemNotFound(_)) => {
                debug!(link = %item.id, "link already purged");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Purge excess or duplicate body parts, clothing and attachments.
    pub async fn enforce_item_restrictions(&self) -> AppearanceResult<usize> {
        let contents = self.collect_contents(self.cof).await?;
        let groups = [
            (contents.body_parts, Some(1)),
            (contents.clothing, Some(self.outfit.max_clothing_per_type)),
            (contents.attachments, None),
        ];

        let mut purged = 0;
        for (mut items, cap) in groups {
            sort_by_order_tag(&mut items);
            let mut kept = remove_duplicate_items(items.clone());
            if let Some(cap) = cap {
                kept = filter_wearable_items(kept, cap);
            }
            let kept_ids: HashSet<ItemId> = kept.iter().map(|i| i.id).collect();
            for item in items.iter().filter(|i| !kept_ids.contains(&i.id)) {
                debug!(item = %item.name, "purging duplicate or excess COF item");
                if self.purge_cof_link(item).await? {
                    purged += 1;
                }
            }
        }
        if purged > 0 {
            warn!(purged, "COF held duplicate or excess items");
        }
        Ok(purged)
    }

    /// Renumber clothing ordering tags of the links in `folder`.
    pub async fn update_clothing_ordering_info(&self, folder: FolderId) -> AppearanceResult<usize> {
        let links = self
            .store
            .collect_descendants(folder, ItemFilter::AssetType(AssetType::Clothing))
            .await?;
        let updates = compute_order_updates(&links);
        for (id, tag) in &updates {
            self.store.update_item_description(*id, tag).await?;
        }
        if !updates.is_empty() {
            debug!(%folder, updated = updates.len(), "clothing ordering tags renumbered");
        }
        Ok(updates.len())
    }

    /// Link a single item into the COF.
    ///
    /// Body parts replace any other link of their type; clothing drops older
    /// links of its type beyond the per-type cap. Returns `None` when the item
    /// was already linked.
    pub async fn add_cof_item_link(
        &self,
        item_id: ItemId,
        description: Option<&str>,
    ) -> AppearanceResult<Option<ItemId>> {
        let item = self
            .store
            .get_item(item_id)
            .await?
            .ok_or(InventoryError::ItemNotFound(item_id))?;
        let linked_id = item.linked_item_id();

        let mut cof_links = self.cof_item_links().await?;
        sort_by_order_tag(&mut cof_links);

        let mut linked_already = false;
        let mut same_type = 0;
        for link in &cof_links {
            if link.linked_item_id() == linked_id {
                linked_already = true;
            } else if item.is_wearable() && item.wearable_type == link.wearable_type {
                same_type += 1;
                if link.is_body_part() || same_type >= self.outfit.max_clothing_per_type {
                    self.purge_cof_link(link).await?;
                }
            }
        }
        if linked_already {
            debug!(item = %linked_id, "already linked in COF");
            return Ok(None);
        }

        let description = if item.is_link() {
            item.description.clone()
        } else {
            description.unwrap_or_default().to_string()
        };
        let link = self
            .store
            .create_link(NewLink {
                target: item.link.unwrap_or(LinkTarget::Item(item.id)),
                parent: self.cof,
                name: item.name,
                description,
            })
            .await?;
        Ok(Some(link))
    }

    /// Remove every COF link to `linked_id`.
    pub async fn remove_cof_item_links(&self, linked_id: ItemId) -> AppearanceResult<usize> {
        let mut removed = 0;
        for link in self.cof_item_links().await? {
            if link.linked_item_id() == linked_id && self.purge_cof_link(&link).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove every COF link to a wearable of `wearable_type`.
    pub async fn remove_cof_links_of_type(&self, wearable_type: WearableType) -> AppearanceResult<usize> {
        let links = self
            .store
            .collect_descendants(self.cof, ItemFilter::WearableOfType(wearable_type))
            .await?;
        let mut removed = 0;
        for link in links.iter().filter(|l| l.is_link()) {
            if self.purge_cof_link(link).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// The COF's folder link to an outfit folder, if any.
    pub async fn base_outfit_link(&self) -> AppearanceResult<Option<(InventoryItem, FolderId)>> {
        let folder_links = self
            .store
            .collect_descendants(self.cof, ItemFilter::FolderLinks)
            .await?;
        for link in folder_links {
            let Some(folder) = link.linked_folder_id() else {
                continue;
            };
            if let Some(category) = self.store.get_category(folder).await? {
                if category.folder_type == FolderType::Outfit {
                    return Ok(Some((link, folder)));
                }
            }
        }
        Ok(None)
    }

    pub async fn purge_base_outfit_link(&self) -> AppearanceResult<()> {
        let folder_links = self
            .store
            .collect_descendants(self.cof, ItemFilter::FolderLinks)
            .await?;
        for link in folder_links {
            let Some(folder) = link.linked_folder_id() else {
                continue;
            };
            let is_outfit = self
                .store
                .get_category(folder)
                .await?
                .is_some_and(|c| c.folder_type == FolderType::Outfit);
            if is_outfit {
                self.purge_cof_link(&link).await?;
            }
        }
        Ok(())
    }

    /// Point the COF's base outfit link at `folder`.
    pub async fn create_base_outfit_link(&self, folder: FolderId) -> AppearanceResult<Option<ItemId>> {
        let category = self
            .store
            .get_category(folder)
            .await?
            .ok_or(AppearanceError::CategoryNotFound(folder))?;
        self.purge_base_outfit_link().await?;
        if category.folder_type != FolderType::Outfit {
            return Ok(None);
        }
        let link = self
            .store
            .create_link(NewLink {
                target: LinkTarget::Folder(folder),
                parent: self.cof,
                name: category.name,
                description: String::new(),
            })
            .await?;
        Ok(Some(link))
    }

    /// Whether the COF no longer matches its base outfit.
    pub async fn is_outfit_dirty(&self) -> AppearanceResult<bool> {
        let Some((_, base)) = self.base_outfit_link().await? else {
            return Ok(false);
        };
        let cof_links = self.cof_item_links().await?;
        let outfit_links: Vec<InventoryItem> = self
            .store
            .collect_descendants(base, ItemFilter::Links)
            .await?
            .into_iter()
            .filter(|l| !l.is_folder_link())
            .collect();
        Ok(outfit_differs(&cof_links, &outfit_links))
    }

    /// Copy the direct contents of `src` into `dst`.
    ///
    /// Item links are re-linked with their descriptions, plain outfit items
    /// are copied, folder links are re-linked unless they point at an outfit.
    pub async fn shallow_copy_category_contents(
        &self,
        src: FolderId,
        dst: FolderId,
    ) -> AppearanceResult<bool> {
        let children: Vec<InventoryItem> = self
            .store
            .collect_descendants(src, ItemFilter::All)
            .await?
            .into_iter()
            .filter(|item| item.parent_id == src)
            .collect();

        let mut to_link = Vec::new();
        let mut to_copy = Vec::new();
        for item in &children {
            match item.link {
                Some(LinkTarget::Item(_)) => to_link.push(LinkSource::Item(item.id)),
                Some(LinkTarget::Folder(folder)) => {
                    let is_outfit = self
                        .store
                        .get_category(folder)
                        .await?
                        .is_some_and(|c| c.folder_type == FolderType::Outfit);
                    if !is_outfit {
                        self.store
                            .create_link(NewLink {
                                target: LinkTarget::Folder(folder),
                                parent: dst,
                                name: item.name.clone(),
                                description: item.description.clone(),
                            })
                            .await?;
                    }
                }
                None => {
                    let copyable = matches!(
                        item.asset_type,
                        Some(AssetType::Clothing | AssetType::BodyPart | AssetType::Object | AssetType::Gesture)
                    );
                    if copyable {
                        to_copy.push(item.id);
                    }
                }
            }
        }

        info!(%src, %dst, links = to_link.len(), copies = to_copy.len(), "copying folder contents");
        let links = BatchOperationCoordinator::new(
            LinkItemsOperation::new(Arc::clone(&self.store), dst),
            &self.batch,
        );
        let copies = BatchOperationCoordinator::new(
            CopyItemsOperation::new(Arc::clone(&self.store), dst),
            &self.batch,
        );
        let (links, copies) = tokio::join!(links.run(to_link), copies.run(to_copy));
        Ok(links.is_success() && copies.is_success())
    }

    /// Copy every item of `src` into `dst`, returning whether all copies landed.
    pub async fn copy_category_items(&self, src: FolderId, dst: FolderId) -> AppearanceResult<bool> {
        let items: Vec<ItemId> = self
            .store
            .collect_descendants(src, ItemFilter::All)
            .await?
            .into_iter()
            .filter(|item| !item.is_link())
            .map(|item| item.id)
            .collect();
        let report = BatchOperationCoordinator::new(
            CopyItemsOperation::new(Arc::clone(&self.store), dst),
            &self.batch,
        )
        .run(items)
        .await;
        Ok(report.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AssetId;

    fn wearable(folder: FolderId, name: &str, wearable_type: WearableType) -> InventoryItem {
        InventoryItem::wearable(folder, name, wearable_type, AssetId::new())
    }

    fn link_in(folder: FolderId, target: &InventoryItem) -> InventoryItem {
        InventoryItem {
            id: ItemId::new(),
            parent_id: folder,
            name: target.name.clone(),
            description: String::new(),
            link: Some(LinkTarget::Item(target.id)),
            asset_type: target.asset_type,
            wearable_type: target.wearable_type,
            asset_id: target.asset_id,
        }
    }

    fn names(items: &[InventoryItem]) -> Vec<&str> {
        items.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn test_remove_duplicate_items_keeps_last() {
        let folder = FolderId::new();
        let a = wearable(folder, "a", WearableType::Shirt);
        let b = wearable(folder, "b", WearableType::Pants);
        let mut a_again = link_in(FolderId::new(), &a);
        a_again.name = "a-link".into();

        let result = remove_duplicate_items(vec![a, b, a_again]);
        assert_eq!(names(&result), vec!["b", "a-link"]);
    }

    #[test]
    fn test_filter_wearable_items_keeps_last_n_by_type() {
        let folder = FolderId::new();
        let items = vec![
            wearable(folder, "pants1", WearableType::Pants),
            wearable(folder, "shirt1", WearableType::Shirt),
            wearable(folder, "shirt2", WearableType::Shirt),
            wearable(folder, "shirt3", WearableType::Shirt),
            InventoryItem::object(folder, "hat", AssetType::Object, AssetId::new()),
        ];
        let result = filter_wearable_items(items, 2);
        assert_eq!(names(&result), vec!["shirt2", "shirt3", "pants1"]);
    }

    #[test]
    fn test_plan_replace_keeps_missing_body_parts() {
        let cof = FolderId::new();
        let source = FolderId::new();
        let old_shape = wearable(FolderId::new(), "old shape", WearableType::Shape);
        let old_skin = wearable(FolderId::new(), "old skin", WearableType::Skin);
        let old_shirt = wearable(FolderId::new(), "old shirt", WearableType::Shirt);

        let cof_contents = OutfitContents::from_items(vec![
            link_in(cof, &old_shape),
            link_in(cof, &old_skin),
            link_in(cof, &old_shirt),
        ]);
        let source_contents = OutfitContents::from_items(vec![
            wearable(source, "new skin", WearableType::Skin),
            wearable(source, "new shirt", WearableType::Shirt),
        ]);

        let plan = plan_cof(&cof_contents, &source_contents, false, 5);
        assert_eq!(names(&plan.body_parts), vec!["old shape", "new skin"]);
        assert_eq!(names(&plan.clothing), vec!["new shirt"]);
        assert!(plan.verify(5).is_ok());
    }

    #[test]
    fn test_plan_append_prefers_cof_body_parts() {
        let cof = FolderId::new();
        let old_hair = wearable(FolderId::new(), "old hair", WearableType::Hair);
        let old_shirt = wearable(FolderId::new(), "old shirt", WearableType::Shirt);
        let cof_contents =
            OutfitContents::from_items(vec![link_in(cof, &old_hair), link_in(cof, &old_shirt)]);
        let source_contents = OutfitContents::from_items(vec![
            wearable(FolderId::new(), "new hair", WearableType::Hair),
            wearable(FolderId::new(), "new shirt", WearableType::Shirt),
        ]);

        let plan = plan_cof(&cof_contents, &source_contents, true, 5);
        assert_eq!(names(&plan.body_parts), vec!["old hair"]);
        assert_eq!(names(&plan.clothing), vec!["old shirt", "new shirt"]);
    }

    #[test]
    fn test_plan_verify_rejects_two_body_parts_of_a_type() {
        let folder = FolderId::new();
        let plan = CofPlan {
            body_parts: vec![
                wearable(folder, "eyes1", WearableType::Eyes),
                wearable(folder, "eyes2", WearableType::Eyes),
            ],
            ..CofPlan::default()
        };
        assert!(matches!(
            plan.verify(5),
            Err(AppearanceError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_outfit_differs() {
        let folder = FolderId::new();
        let shirt = wearable(folder, "shirt", WearableType::Shirt);
        let mut cof_link = link_in(FolderId::new(), &shirt);
        let mut outfit_link = link_in(FolderId::new(), &shirt);
        cof_link.description = "@400".into();
        outfit_link.description = "@400".into();
        assert!(!outfit_differs(&[cof_link.clone()], &[outfit_link.clone()]));

        outfit_link.description = "@401".into();
        assert!(outfit_differs(&[cof_link.clone()], &[outfit_link]));
        assert!(outfit_differs(&[cof_link], &[]));
    }
}
