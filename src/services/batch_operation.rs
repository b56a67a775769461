//! Retrying batch of independent inventory requests.
//!
//! A batch issues one request per key, tracks which keys are still waiting for
//! a reply, re-issues requests that time out or fail, and settles exactly once
//! when nothing is waiting any more. The request itself is supplied by a
//! [`BatchOperation`] strategy (link into a folder, copy into a folder).

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domain::errors::InventoryError;
use crate::domain::models::{
    BatchConfig, FolderId, FolderType, ItemFilter, ItemId, LinkTarget, NewLink,
};
use crate::domain::ports::InventoryStore;

/// One kind of bulk inventory request.
#[async_trait]
pub trait BatchOperation: Send + Sync + 'static {
    /// Identifies an item within a batch.
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether `key` needs a request at all. Keys that need none count as done.
    async fn prepare(&self, key: &Self::Key) -> Result<bool, InventoryError>;

    /// Issue the request for `key`, returning the id of the created object.
    async fn perform(&self, key: Self::Key) -> Result<ItemId, InventoryError>;
}

/// Wait-set entry for an item whose reply has not arrived yet.
#[derive(Debug, Clone)]
pub struct PendingBatchItem<K> {
    pub key: K,
    pub retry_count: u32,
    pub last_attempt: Instant,
    pub attempt_failed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    Completed,
    Failed,
}

/// Reply latency statistics over successful replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: usize,
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
}

impl LatencyStats {
    fn from_samples(samples: &[Duration]) -> Self {
        let Some(min) = samples.iter().min().copied() else {
            return Self::default();
        };
        let max = samples.iter().max().copied().unwrap_or(min);
        let total: Duration = samples.iter().sum();
        let count = samples.len();
        Self {
            count,
            min,
            max,
            mean: total / u32::try_from(count).unwrap_or(u32::MAX),
        }
    }
}

/// Summary of a settled batch.
#[derive(Debug, Clone)]
pub struct BatchReport<K> {
    pub outcome: BatchOutcome,
    /// Keys that exhausted their retries.
    pub failed: Vec<K>,
    /// Objects created by successful replies.
    pub created: Vec<(K, ItemId)>,
    /// Keys that needed no request.
    pub skipped: usize,
    /// Total re-issued requests.
    pub retry_count: u32,
    pub latency: LatencyStats,
    /// Replies received after the key was no longer waiting.
    pub late_replies: usize,
}

impl<K> BatchReport<K> {
    pub fn is_success(&self) -> bool {
        self.outcome == BatchOutcome::Completed
    }
}

/// Bookkeeping for one batch, independent of how requests are dispatched.
#[derive(Debug)]
pub struct BatchState<K> {
    waiting: HashMap<K, PendingBatchItem<K>>,
    failed: Vec<K>,
    created: Vec<(K, ItemId)>,
    skipped: usize,
    latencies: Vec<Duration>,
    pending_requests: usize,
    retry_count: u32,
    late_replies: usize,
    retry_after: Duration,
    max_retries: u32,
}

impl<K: Clone + Eq + Hash + Debug> BatchState<K> {
    pub fn new(retry_after: Duration, max_retries: u32) -> Self {
        Self {
            waiting: HashMap::new(),
            failed: Vec::new(),
            created: Vec::new(),
            skipped: 0,
            latencies: Vec::new(),
            pending_requests: 0,
            retry_count: 0,
            late_replies: 0,
            retry_after,
            max_retries,
        }
    }

    /// Register (or re-register) `key` as waiting for a reply sent at `now`.
    pub fn register(&mut self, key: K, now: Instant) {
        match self.waiting.get_mut(&key) {
            Some(entry) => {
                entry.retry_count += 1;
                entry.last_attempt = now;
                entry.attempt_failed = false;
                self.retry_count += 1;
            }
            None => {
                self.waiting.insert(
                    key.clone(),
                    PendingBatchItem {
                        key,
                        retry_count: 0,
                        last_attempt: now,
                        attempt_failed: false,
                    },
                );
            }
        }
        self.pending_requests += 1;
    }

    pub fn mark_skipped(&mut self) {
        self.skipped += 1;
    }

    /// Record a key that could not even be prepared.
    pub fn mark_failed(&mut self, key: K) {
        self.waiting.remove(&key);
        self.failed.push(key);
    }

    /// Apply a reply. Returns `false` when the key was not waiting.
    pub fn on_operation_result(
        &mut self,
        key: &K,
        result: &Result<ItemId, InventoryError>,
        now: Instant,
    ) -> bool {
        self.pending_requests = self.pending_requests.saturating_sub(1);

        let Some(entry) = self.waiting.get_mut(key) else {
            self.late_replies += 1;
            warn!(?key, "duplicate or late batch reply ignored");
            return false;
        };

        match result {
            Ok(created) => {
                let latency = now.saturating_duration_since(entry.last_attempt);
                self.latencies.push(latency);
                self.created.push((key.clone(), *created));
                self.waiting.remove(key);
            }
            Err(err) => {
                debug!(?key, error = %err, "batch request failed, will retry on next tick");
                entry.attempt_failed = true;
            }
        }
        true
    }

    /// Sweep the wait set. Returns the keys to re-issue; keys out of retries
    /// move to the failed list.
    pub fn tick(&mut self, now: Instant) -> Vec<K> {
        let mut reissue = Vec::new();
        let mut exhausted = Vec::new();

        for (key, entry) in &self.waiting {
            let timed_out = now.saturating_duration_since(entry.last_attempt) > self.retry_after;
            if !(entry.attempt_failed || timed_out) {
                continue;
            }
            if entry.retry_count < self.max_retries {
                reissue.push(key.clone());
            } else {
                exhausted.push(key.clone());
            }
        }

        for key in exhausted {
            warn!(?key, "batch item exhausted its retries");
            self.waiting.remove(&key);
            self.failed.push(key);
        }
        reissue
    }

    pub fn is_waiting(&self, key: &K) -> bool {
        self.waiting.contains_key(key)
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    pub const fn pending_requests(&self) -> usize {
        self.pending_requests
    }

    pub fn is_settled(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn report(&self) -> BatchReport<K> {
        BatchReport {
            outcome: if self.failed.is_empty() {
                BatchOutcome::Completed
            } else {
                BatchOutcome::Failed
            },
            failed: self.failed.clone(),
            created: self.created.clone(),
            skipped: self.skipped,
            retry_count: self.retry_count,
            latency: LatencyStats::from_samples(&self.latencies),
            late_replies: self.late_replies,
        }
    }
}

type BatchCallback<K> = Box<dyn FnOnce(&BatchReport<K>) + Send>;
type InFlight<K> = FuturesUnordered<BoxFuture<'static, (K, Result<ItemId, InventoryError>)>>;

/// Drives a [`BatchOperation`] over a set of keys.
pub struct BatchOperationCoordinator<O: BatchOperation> {
    operation: Arc<O>,
    state: BatchState<O::Key>,
    in_flight: InFlight<O::Key>,
    poll_interval: Duration,
    drain_grace: Duration,
    on_completion: Option<BatchCallback<O::Key>>,
    on_failure: Option<BatchCallback<O::Key>>,
    settled: bool,
}

impl<O: BatchOperation> BatchOperationCoordinator<O> {
    pub fn new(operation: O, config: &BatchConfig) -> Self {
        Self {
            operation: Arc::new(operation),
            state: BatchState::new(
                Duration::from_secs(config.retry_after_secs),
                config.max_retries,
            ),
            in_flight: FuturesUnordered::new(),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            drain_grace: Duration::from_secs(config.drain_grace_secs),
            on_completion: None,
            on_failure: None,
            settled: false,
        }
    }

    /// Callback fired once if every item succeeded.
    #[must_use]
    pub fn on_completion(mut self, callback: impl FnOnce(&BatchReport<O::Key>) + Send + 'static) -> Self {
        self.on_completion = Some(Box::new(callback));
        self
    }

    /// Callback fired once if any item permanently failed.
    #[must_use]
    pub fn on_failure(mut self, callback: impl FnOnce(&BatchReport<O::Key>) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(callback));
        self
    }

    pub const fn state(&self) -> &BatchState<O::Key> {
        &self.state
    }

    /// Prepare `key` and, if it needs a request, register and dispatch it.
    pub async fn add_item(&mut self, key: O::Key) {
        match self.operation.prepare(&key).await {
            Ok(true) => self.dispatch(key),
            Ok(false) => {
                debug!(op = self.operation.name(), ?key, "no request needed");
                self.state.mark_skipped();
            }
            Err(err) => {
                warn!(op = self.operation.name(), ?key, error = %err, "could not prepare batch item");
                self.state.mark_failed(key);
            }
        }
    }

    fn dispatch(&mut self, key: O::Key) {
        self.state.register(key.clone(), Instant::now());
        let operation = Arc::clone(&self.operation);
        self.in_flight.push(
            async move {
                let result = operation.perform(key.clone()).await;
                (key, result)
            }
            .boxed(),
        );
    }

    /// Feed a reply into the batch and settle if nothing is left waiting.
    pub fn on_operation_result(&mut self, key: &O::Key, result: &Result<ItemId, InventoryError>) {
        self.state.on_operation_result(key, result, Instant::now());
        self.settle_if_done();
    }

    /// Retry sweep: re-issue timed-out or failed items, then settle if done.
    pub fn tick(&mut self) {
        for key in self.state.tick(Instant::now()) {
            debug!(op = self.operation.name(), ?key, "re-issuing batch request");
            self.dispatch(key);
        }
        self.settle_if_done();
    }

    fn settle_if_done(&mut self) {
        if self.settled || !self.state.is_settled() {
            return;
        }
        self.settled = true;

        let report = self.state.report();
        let callback = match report.outcome {
            BatchOutcome::Completed => {
                info!(
                    op = self.operation.name(),
                    created = report.created.len(),
                    skipped = report.skipped,
                    retries = report.retry_count,
                    "batch completed"
                );
                self.on_completion.take()
            }
            BatchOutcome::Failed => {
                warn!(
                    op = self.operation.name(),
                    failed = report.failed.len(),
                    retries = report.retry_count,
                    "batch failed"
                );
                self.on_failure.take()
            }
        };
        self.on_completion = None;
        self.on_failure = None;
        if let Some(callback) = callback {
            callback(&report);
        }
    }

    pub const fn is_settled(&self) -> bool {
        self.settled
    }

    /// Run the batch over `items` to completion.
    ///
    /// After settling, replies still in flight are drained for the configured
    /// grace period so late replies are observed and logged.
    pub async fn run(mut self, items: Vec<O::Key>) -> BatchReport<O::Key> {
        for key in items {
            self.add_item(key).await;
        }
        self.settle_if_done();

        let mut interval = time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        while !self.settled {
            let reply = tokio::select! {
                Some(reply) = self.in_flight.next() => Some(reply),
                _ = interval.tick() => None,
            };
            match reply {
                Some((key, result)) => self.on_operation_result(&key, &result),
                None => self.tick(),
            }
        }

        let settled_report = self.state.report();

        if !self.in_flight.is_empty() {
            let grace = self.drain_grace;
            let drain = async {
                while let Some((key, result)) = self.in_flight.next().await {
                    self.state.on_operation_result(&key, &result, Instant::now());
                }
            };
            if time::timeout(grace, drain).await.is_err() {
                debug!(
                    op = self.operation.name(),
                    abandoned = self.in_flight.len(),
                    "stopped draining unanswered batch requests"
                );
            }
        }

        BatchReport {
            late_replies: self.state.late_replies,
            ..settled_report
        }
    }
}

/// Source of a link: a single item (or item link) or a whole folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkSource {
    Item(ItemId),
    Folder(FolderId),
}

/// Links items into a destination folder.
///
/// Item links are re-pointed at their target so links never chain. Folder
/// sources become folder links only for outfit folders, replacing any
/// previous folder link in the destination.
pub struct LinkItemsOperation {
    store: Arc<dyn InventoryStore>,
    destination: FolderId,
}

impl LinkItemsOperation {
    pub fn new(store: Arc<dyn InventoryStore>, destination: FolderId) -> Self {
        Self { store, destination }
    }
}

#[async_trait]
impl BatchOperation for LinkItemsOperation {
    type Key = LinkSource;

    fn name(&self) -> &'static str {
        "link_items"
    }

    async fn prepare(&self, key: &LinkSource) -> Result<bool, InventoryError> {
        match *key {
            LinkSource::Item(id) => {
                let item = self
                    .store
                    .get_item(id)
                    .await?
                    .ok_or(InventoryError::ItemNotFound(id))?;
                Ok(item.parent_id != self.destination)
            }
            LinkSource::Folder(id) => {
                let category = self
                    .store
                    .get_category(id)
                    .await?
                    .ok_or(InventoryError::CategoryNotFound(id))?;
                Ok(category.folder_type == FolderType::Outfit)
            }
        }
    }

    async fn perform(&self, key: LinkSource) -> Result<ItemId, InventoryError> {
        match key {
            LinkSource::Item(id) => {
                let item = self
                    .store
                    .get_item(id)
                    .await?
                    .ok_or(InventoryError::ItemNotFound(id))?;
                let target = item.link.unwrap_or(LinkTarget::Item(item.id));
                self.store
                    .create_link(NewLink {
                        target,
                        parent: self.destination,
                        name: item.name,
                        description: item.description,
                    })
                    .await
            }
            LinkSource::Folder(id) => {
                let category = self
                    .store
                    .get_category(id)
                    .await?
                    .ok_or(InventoryError::CategoryNotFound(id))?;
                let previous = self
                    .store
                    .collect_descendants(self.destination, ItemFilter::FolderLinks)
                    .await?;
                for link in previous.iter().filter(|l| l.parent_id == self.destination) {
                    match self.store.purge_object(link.id).await {
                        Ok(()) | Err(InventoryError::ItemNotFound(_)) => {}
                        Err(err) => return Err(err),
                    }
                }
                self.store
                    .create_link(NewLink {
                        target: LinkTarget::Folder(id),
                        parent: self.destination,
                        name: category.name,
                        description: String::new(),
                    })
                    .await
            }
        }
    }
}

/// Copies items into a destination folder.
pub struct CopyItemsOperation {
    store: Arc<dyn InventoryStore>,
    destination: FolderId,
}

impl CopyItemsOperation {
    pub fn new(store: Arc<dyn InventoryStore>, destination: FolderId) -> Self {
        Self { store, destination }
    }
}

#[async_trait]
impl BatchOperation for CopyItemsOperation {
    type Key = ItemId;

    fn name(&self) -> &'static str {
        "copy_items"
    }

    async fn prepare(&self, key: &ItemId) -> Result<bool, InventoryError> {
        Ok(self.store.get_item(*key).await?.is_some())
    }

    async fn perform(&self, key: ItemId) -> Result<ItemId, InventoryError> {
        self.store.copy_item(key, self.destination).await
    }
}
