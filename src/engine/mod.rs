//! Feed synchronization engine
//!
//! Composes the window, access gate and poll controller behind the public
//! feed operations. One engine instance is one logical actor: state sits
//! behind a single mutex that is never held across a backing store call, so
//! every transition between suspension points is atomic for observers.
//!
//! Each operation captures the window epoch before calling the store and
//! re-checks it afterwards; a result that comes back after the window was
//! replaced, revoked or torn down is discarded.

mod state;

pub use state::{DropReason, EnginePhase, FeedSnapshot, Outcome, PendingOperationFlags};

use crate::access::AccessGate;
use crate::config::EngineConfig;
use crate::error::{FeedError, Result};
use crate::feeds::{FeedKind, Messages, Posts};
use crate::identity::{CallerIdentity, Credential, TargetIdentity};
use crate::poll::PollController;
use crate::reaction;
use crate::store::BackingStore;
use crate::types::{Draft, ItemId, PageDirection, Reaction, Upload};
use crate::window::FeedWindow;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::ops::ControlFlow;
use std::sync::{Arc, Weak};
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Engine over the posts feed
pub type PostFeed<S> = FeedSyncEngine<Posts, S>;

/// Engine over the messages feed
pub type MessageFeed<S> = FeedSyncEngine<Messages, S>;

struct EngineState<A> {
    phase: EnginePhase,
    target: TargetIdentity,
    caller: CallerIdentity,
    window: FeedWindow<A>,
    gate: AccessGate,
    flags: PendingOperationFlags,
    reacting: HashSet<ItemId>,
    pending_delete: Option<ItemId>,
    poll: PollController,
    /// Bumped whenever the window is replaced or torn down
    epoch: u64,
    last_error: Option<FeedError>,
}

impl<A: Clone> EngineState<A> {
    fn new(config: &EngineConfig) -> Self {
        Self {
            phase: EnginePhase::Uninitialized,
            target: TargetIdentity::All,
            caller: CallerIdentity::anonymous(),
            window: FeedWindow::new(),
            gate: AccessGate::anonymous(),
            flags: PendingOperationFlags::default(),
            reacting: HashSet::new(),
            pending_delete: None,
            poll: PollController::new(config.poll_interval),
            epoch: 0,
            last_error: None,
        }
    }

    fn snapshot(&self) -> FeedSnapshot<A> {
        let mut reacting: Vec<ItemId> = self.reacting.iter().cloned().collect();
        reacting.sort();
        FeedSnapshot {
            phase: self.phase,
            target: self.target.clone(),
            items: self.window.items().to_vec(),
            is_first_page: self.window.is_first_page(),
            is_last_page: self.window.is_last_page(),
            pending_new_count: self.window.pending_new_count(),
            flags: self.flags,
            has_full_access: self.gate.has_full_access(),
            pending_delete: self.pending_delete.clone(),
            reacting,
            last_error: self.last_error.clone(),
        }
    }

    /// Reason an operation that needs a live, trusted window cannot run
    fn blocked(&self) -> Option<DropReason> {
        if self.phase == EnginePhase::Closed {
            Some(DropReason::Closed)
        } else if !self.gate.can_operate() {
            Some(DropReason::AccessRevoked)
        } else if self.phase != EnginePhase::Ready {
            Some(DropReason::NotReady)
        } else {
            None
        }
    }

    fn credential(&self) -> Credential {
        self.caller.credential.clone()
    }

    /// Close the gate and stop polling after a rejected credential
    fn revoke(&mut self) {
        if self.gate.downgrade() {
            warn!(target_feed = %self.target, "Credential rejected, feed access revoked");
        }
        self.poll.stop();
        if self.phase != EnginePhase::Closed {
            self.phase = EnginePhase::Unauthorized;
        }
    }

    fn record_failure(&mut self, operation: &'static str, err: &FeedError) {
        if err.is_unauthorized() {
            self.revoke();
        } else {
            warn!(operation, error = %err, "Feed operation failed");
        }
        self.last_error = Some(err.clone());
    }

    fn record_success(&mut self) {
        self.last_error = None;
    }
}

struct Inner<K: FeedKind, S> {
    store: Arc<S>,
    config: EngineConfig,
    state: Mutex<EngineState<K::Attachment>>,
    snapshots: watch::Sender<FeedSnapshot<K::Attachment>>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: FeedKind, S: BackingStore<K>> Inner<K, S> {
    fn publish(&self, state: &EngineState<K::Attachment>) {
        self.snapshots.send_replace(state.snapshot());
    }

    /// Lock the state for the window an operation started on, or `None`
    /// if that window is gone
    async fn settle(&self, epoch: u64) -> Option<MutexGuard<'_, EngineState<K::Attachment>>> {
        let state = self.state.lock().await;
        if state.epoch == epoch {
            Some(state)
        } else {
            debug!(epoch, current = state.epoch, "Discarding result for a replaced window");
            None
        }
    }

    fn start_polling(inner: &Arc<Self>, state: &mut EngineState<K::Attachment>) {
        let weak: Weak<Self> = Arc::downgrade(inner);
        let epoch = state.epoch;
        state.poll.start(move |generation| {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(inner) => inner.poll_tick(epoch, generation).await,
                    None => ControlFlow::Break(()),
                }
            }
        });
    }

    async fn poll_tick(&self, epoch: u64, generation: u64) -> ControlFlow<()> {
        let (credential, target, since) = {
            let state = self.state.lock().await;
            if state.epoch != epoch || !state.poll.is_current(generation) || !state.gate.can_operate() {
                return ControlFlow::Break(());
            }
            (state.credential(), state.target.clone(), state.window.top_id().cloned())
        };

        let result = self
            .store
            .fetch_new_count(&credential, &target, since.as_ref())
            .await;

        let mut state = self.state.lock().await;
        if state.epoch != epoch || !state.poll.is_current(generation) {
            return ControlFlow::Break(());
        }

        match result {
            Ok(new_count) => {
                if new_count.count != state.window.pending_new_count() {
                    debug!(count = new_count.count, "New items available");
                }
                state.window.set_pending_new_count(new_count.count);
                self.publish(&state);
                ControlFlow::Continue(())
            }
            Err(err) if err.is_unauthorized() => {
                state.record_failure("poll", &err);
                self.publish(&state);
                ControlFlow::Break(())
            }
            Err(err) => {
                // Next tick retries
                debug!(error = %err, "Poll for new items failed");
                ControlFlow::Continue(())
            }
        }
    }
}

/// Live, windowed view over one remote feed.
///
/// # Example
///
/// ```rust,ignore
/// use fitfeed_sync::{CallerIdentity, Credential, EngineConfig, HttpBackingStore, PostFeed, TargetIdentity};
///
/// let store = Arc::new(HttpBackingStore::new(HttpStoreConfig::default())?);
/// let feed = PostFeed::new(store, EngineConfig::for_posts());
///
/// let caller = CallerIdentity::authenticated("42", Credential::Bearer(token));
/// feed.load_initial(TargetIdentity::All, caller).await?;
///
/// let mut updates = feed.subscribe();
/// while updates.changed().await.is_ok() {
///     let snapshot = updates.borrow().clone();
///     if snapshot.has_new_items() {
///         feed.load_newer().await?;
///     }
/// }
/// ```
pub struct FeedSyncEngine<K: FeedKind, S> {
    inner: Arc<Inner<K, S>>,
}

impl<K: FeedKind, S> Clone for FeedSyncEngine<K, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: FeedKind, S: BackingStore<K>> FeedSyncEngine<K, S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        let state = EngineState::new(&config);
        let (snapshots, _) = watch::channel(state.snapshot());
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                state: Mutex::new(state),
                snapshots,
                _kind: PhantomData,
            }),
        }
    }

    /// Engine with the feed kind's default tuning
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, K::default_config())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    /// Receive a fresh snapshot after every state transition
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot<K::Attachment>> {
        self.inner.snapshots.subscribe()
    }

    pub async fn snapshot(&self) -> FeedSnapshot<K::Attachment> {
        self.inner.state.lock().await.snapshot()
    }

    pub async fn phase(&self) -> EnginePhase {
        self.inner.state.lock().await.phase
    }

    pub async fn has_full_access(&self) -> bool {
        self.inner.state.lock().await.gate.has_full_access()
    }

    pub async fn flags(&self) -> PendingOperationFlags {
        self.inner.state.lock().await.flags
    }

    pub async fn is_polling(&self) -> bool {
        self.inner.state.lock().await.poll.is_running()
    }

    /// Open a window on `target` as seen by `caller`.
    ///
    /// Always starts a new window: the previous window's items, flags and
    /// poll timer are discarded and any of its in-flight results will be
    /// ignored. A second call for the same identities while the first is
    /// still loading is dropped.
    pub async fn load_initial(&self, target: TargetIdentity, caller: CallerIdentity) -> Result<Outcome> {
        let (epoch, credential, target) = {
            let mut state = self.inner.state.lock().await;
            if state.phase == EnginePhase::Closed {
                return Ok(Outcome::Dropped(DropReason::Closed));
            }
            if state.flags.loading_initial && state.target == target && state.caller == caller {
                debug!(target_feed = %target, "Initial load already in flight");
                return Ok(Outcome::Dropped(DropReason::InFlight));
            }

            state.poll.reset();
            state.epoch += 1;
            state.window = FeedWindow::new();
            state.flags = PendingOperationFlags::default();
            state.reacting.clear();
            state.pending_delete = None;
            state.last_error = None;
            state.gate.reset(caller.is_authenticated());
            state.target = target;
            state.caller = caller;

            if !state.gate.caller_authenticated() {
                state.phase = EnginePhase::Unauthorized;
                info!(target_feed = %state.target, "Caller not authenticated, feed not loaded");
                self.inner.publish(&state);
                return Ok(Outcome::Dropped(DropReason::NotAuthenticated));
            }

            state.flags.loading_initial = true;
            state.phase = EnginePhase::Loading;
            info!(target_feed = %state.target, feed = K::resource(), "Opening feed window");
            self.inner.publish(&state);
            (state.epoch, state.credential(), state.target.clone())
        };

        let result = self
            .inner
            .store
            .fetch_page(&credential, &target, None, PageDirection::Initial)
            .await;

        let Some(mut state) = self.inner.settle(epoch).await else {
            return Ok(Outcome::Dropped(DropReason::Stale));
        };
        state.flags.loading_initial = false;

        match result {
            Ok(page) => {
                debug!(items = page.items.len(), is_last = page.is_last, "Initial page loaded");
                state.window.replace(page);
                state.phase = EnginePhase::Ready;
                if state.gate.can_operate() {
                    Inner::start_polling(&self.inner, &mut state);
                }
                self.inner.publish(&state);
                Ok(Outcome::Applied)
            }
            Err(err) => {
                state.record_failure("load_initial", &err);
                if !err.is_unauthorized() {
                    state.phase = EnginePhase::Failed;
                }
                self.inner.publish(&state);
                Err(err)
            }
        }
    }

    /// Fetch the page older than the bottom of the window and append it
    pub async fn load_older(&self) -> Result<Outcome> {
        let (epoch, credential, target, cursor) = {
            let mut state = self.inner.state.lock().await;
            if let Some(reason) = state.blocked() {
                return Ok(Outcome::Dropped(reason));
            }
            if state.flags.loading_older {
                return Ok(Outcome::Dropped(DropReason::InFlight));
            }
            if state.window.is_last_page() {
                return Ok(Outcome::Dropped(DropReason::EndOfFeed));
            }
            let Some(cursor) = state.window.bottom_id().cloned() else {
                return Ok(Outcome::Dropped(DropReason::NothingToLoad));
            };
            state.flags.loading_older = true;
            self.inner.publish(&state);
            (state.epoch, state.credential(), state.target.clone(), cursor)
        };

        let result = self
            .inner
            .store
            .fetch_page(&credential, &target, Some(&cursor), PageDirection::Before)
            .await;

        let Some(mut state) = self.inner.settle(epoch).await else {
            return Ok(Outcome::Dropped(DropReason::Stale));
        };
        state.flags.loading_older = false;
        if state.phase != EnginePhase::Ready {
            self.inner.publish(&state);
            return Ok(Outcome::Dropped(DropReason::Stale));
        }

        let outcome = match result {
            Ok(page) => {
                let added = state.window.append_older(page);
                state.record_success();
                debug!(cursor = %cursor, added, is_last = state.window.is_last_page(), "Older page appended");
                Ok(Outcome::Applied)
            }
            Err(err) => {
                state.record_failure("load_older", &err);
                Err(err)
            }
        };
        self.inner.publish(&state);
        outcome
    }

    /// Merge in the items the poller has counted above the top of the
    /// window. Polling is paused for the duration of the fetch.
    pub async fn load_newer(&self) -> Result<Outcome> {
        let (epoch, credential, target, since) = {
            let mut state = self.inner.state.lock().await;
            if let Some(reason) = state.blocked() {
                return Ok(Outcome::Dropped(reason));
            }
            if state.flags.loading_newer {
                return Ok(Outcome::Dropped(DropReason::InFlight));
            }
            if state.window.pending_new_count() == 0 {
                return Ok(Outcome::Dropped(DropReason::NothingToLoad));
            }
            state.flags.loading_newer = true;
            state.poll.pause_for_exclusive_fetch();
            self.inner.publish(&state);
            (
                state.epoch,
                state.credential(),
                state.target.clone(),
                state.window.top_id().cloned(),
            )
        };

        let result = self
            .inner
            .store
            .fetch_new_items(&credential, &target, since.as_ref())
            .await;

        let Some(mut state) = self.inner.settle(epoch).await else {
            return Ok(Outcome::Dropped(DropReason::Stale));
        };
        state.flags.loading_newer = false;

        let outcome = if state.phase != EnginePhase::Ready {
            Ok(Outcome::Dropped(DropReason::Stale))
        } else {
            match result {
                Ok(items) => {
                    let added = state.window.prepend_newer(items);
                    state.record_success();
                    debug!(added, "Newer items prepended");
                    Ok(Outcome::Applied)
                }
                Err(err) => {
                    state.record_failure("load_newer", &err);
                    Err(err)
                }
            }
        };

        if state.phase == EnginePhase::Ready && state.gate.can_operate() {
            state.poll.resume();
        }
        self.inner.publish(&state);
        outcome
    }

    /// Toggle the caller's reaction on an item. Counts change only after
    /// the backing store acknowledges.
    pub async fn toggle_reaction(&self, item_id: &ItemId, requested: Reaction) -> Result<Outcome> {
        let (epoch, credential) = {
            let mut state = self.inner.state.lock().await;
            if let Some(reason) = state.blocked() {
                return Ok(Outcome::Dropped(reason));
            }
            if !state.window.contains(item_id) {
                return Ok(Outcome::Dropped(DropReason::NotInWindow));
            }
            if !state.reacting.insert(item_id.clone()) {
                return Ok(Outcome::Dropped(DropReason::InFlight));
            }
            self.inner.publish(&state);
            (state.epoch, state.credential())
        };

        let result = self
            .inner
            .store
            .toggle_reaction(&credential, item_id, requested)
            .await;

        let Some(mut state) = self.inner.settle(epoch).await else {
            return Ok(Outcome::Dropped(DropReason::Stale));
        };
        state.reacting.remove(item_id);

        let outcome = if state.phase != EnginePhase::Ready {
            Ok(Outcome::Dropped(DropReason::Stale))
        } else {
            match result {
                Ok(_) => match state.window.get(item_id).map(|item| item.reactions) {
                    Some(prior) => {
                        let next = reaction::resolve(prior, requested);
                        state.window.update_reaction(item_id, next);
                        state.record_success();
                        debug!(item_id = %item_id, reaction = %requested, "Reaction applied");
                        Ok(Outcome::Applied)
                    }
                    // Deleted while the toggle was in flight
                    None => Ok(Outcome::Dropped(DropReason::NotInWindow)),
                },
                Err(err) => {
                    state.record_failure("toggle_reaction", &err);
                    Err(err)
                }
            }
        };
        self.inner.publish(&state);
        outcome
    }

    /// First phase of a delete: remember which item the host asked to
    /// delete until it confirms
    pub async fn request_delete(&self, item_id: &ItemId) -> Outcome {
        let mut state = self.inner.state.lock().await;
        if let Some(reason) = state.blocked() {
            return Outcome::Dropped(reason);
        }
        if !state.window.contains(item_id) {
            return Outcome::Dropped(DropReason::NotInWindow);
        }
        state.pending_delete = Some(item_id.clone());
        self.inner.publish(&state);
        Outcome::Applied
    }

    /// Abandon a requested delete. Returns whether one was pending.
    pub async fn cancel_delete(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        let had = state.pending_delete.take().is_some();
        if had {
            self.inner.publish(&state);
        }
        had
    }

    /// Second phase of a delete: commit the pending request
    pub async fn confirm_delete(&self) -> Result<Outcome> {
        let pending = self.inner.state.lock().await.pending_delete.clone();
        match pending {
            Some(item_id) => self.delete_item(&item_id).await,
            None => Ok(Outcome::Dropped(DropReason::NoPendingDelete)),
        }
    }

    /// Delete an item now. Deleting an item that is already gone is a
    /// no-op; a `NotFound` from the backing store counts as success.
    pub async fn delete_item(&self, item_id: &ItemId) -> Result<Outcome> {
        let (epoch, credential) = {
            let mut state = self.inner.state.lock().await;
            if let Some(reason) = state.blocked() {
                return Ok(Outcome::Dropped(reason));
            }
            if state.flags.deleting {
                return Ok(Outcome::Dropped(DropReason::InFlight));
            }
            if !state.window.contains(item_id) {
                if state.pending_delete.as_ref() == Some(item_id) {
                    state.pending_delete = None;
                    self.inner.publish(&state);
                }
                return Ok(Outcome::Dropped(DropReason::NotInWindow));
            }
            state.flags.deleting = true;
            self.inner.publish(&state);
            (state.epoch, state.credential())
        };

        let result = self.inner.store.delete_item(&credential, item_id).await;

        let Some(mut state) = self.inner.settle(epoch).await else {
            return Ok(Outcome::Dropped(DropReason::Stale));
        };
        state.flags.deleting = false;

        let outcome = if state.phase != EnginePhase::Ready {
            Ok(Outcome::Dropped(DropReason::Stale))
        } else {
            match result {
                Ok(_) => {
                    state.window.remove_item(item_id);
                    state.record_success();
                    info!(item_id = %item_id, "Item deleted");
                    Ok(Outcome::Applied)
                }
                Err(err) if err.is_not_found() => {
                    state.window.remove_item(item_id);
                    state.record_success();
                    debug!(item_id = %item_id, "Item already deleted upstream");
                    Ok(Outcome::Applied)
                }
                Err(err) => {
                    state.record_failure("delete_item", &err);
                    Err(err)
                }
            }
        };
        if outcome.is_ok() && state.pending_delete.as_ref() == Some(item_id) {
            state.pending_delete = None;
        }
        self.inner.publish(&state);
        outcome
    }

    /// Publish a new item. The window is left alone: the item shows up
    /// through the new-item count and [`FeedSyncEngine::load_newer`], so
    /// ordering stays with the backing store.
    pub async fn submit_item(&self, draft: Draft<K::Attachment>) -> Result<Outcome> {
        if draft.is_empty() {
            return Err(FeedError::Invalid("nothing to publish".to_string()));
        }

        let (epoch, credential) = match self.mutation_credential().await {
            Ok(granted) => granted,
            Err(reason) => return Ok(Outcome::Dropped(reason)),
        };

        if let Err(err) = self.inner.store.create_item(&credential, &draft).await {
            self.record_mutation_failure(epoch, "submit_item", &err).await;
            return Err(err);
        }
        self.record_mutation_success(epoch).await;
        info!(feed = K::resource(), "Item submitted");
        Ok(Outcome::Applied)
    }

    /// Upload an attachment for a later [`FeedSyncEngine::submit_item`]
    pub async fn upload_attachment(&self, upload: Upload) -> Result<K::Attachment> {
        let (epoch, credential) = match self.mutation_credential().await {
            Ok(granted) => granted,
            Err(DropReason::Closed) => return Err(FeedError::Invalid("feed engine closed".to_string())),
            Err(_) => return Err(FeedError::Unauthorized("feed access revoked".to_string())),
        };

        let size = upload.bytes.len();
        match self.inner.store.upload_attachment(&credential, upload).await {
            Ok(attachment) => {
                self.record_mutation_success(epoch).await;
                debug!(bytes = size, "Attachment uploaded");
                Ok(attachment)
            }
            Err(err) => {
                self.record_mutation_failure(epoch, "upload_attachment", &err).await;
                Err(err)
            }
        }
    }

    /// Stop polling and close the engine. Later operations are dropped and
    /// results of calls still in flight are discarded.
    pub async fn teardown(&self) {
        let mut state = self.inner.state.lock().await;
        if state.phase == EnginePhase::Closed {
            return;
        }
        state.poll.reset();
        state.epoch += 1;
        state.flags = PendingOperationFlags::default();
        state.reacting.clear();
        state.pending_delete = None;
        state.phase = EnginePhase::Closed;
        info!(target_feed = %state.target, "Feed window closed");
        self.inner.publish(&state);
    }

    /// Credential for a mutation that doesn't touch the window. Unlike
    /// window operations these only need an open gate.
    async fn mutation_credential(&self) -> std::result::Result<(u64, Credential), DropReason> {
        let state = self.inner.state.lock().await;
        if state.phase == EnginePhase::Closed {
            return Err(DropReason::Closed);
        }
        if !state.gate.can_operate() {
            return Err(DropReason::AccessRevoked);
        }
        Ok((state.epoch, state.credential()))
    }

    async fn record_mutation_success(&self, epoch: u64) {
        if let Some(mut state) = self.inner.settle(epoch).await {
            if state.last_error.take().is_some() {
                self.inner.publish(&state);
            }
        }
    }

    async fn record_mutation_failure(&self, epoch: u64, operation: &'static str, err: &FeedError) {
        if let Some(mut state) = self.inner.settle(epoch).await {
            state.record_failure(operation, err);
            self.inner.publish(&state);
        }
    }
}
