//! Scripted in-memory backing store shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use fitfeed_sync::{
    Ack, BackingStore, CallerIdentity, Credential, Draft, EngineConfig, FeedError, FeedItem, FeedSyncEngine,
    ItemId, NewCount, Page, PageDirection, PhotoRef, Posts, Reaction, ReactionSummary, Result, TargetIdentity,
    Upload, UserId,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub type TestFeed = FeedSyncEngine<Posts, MockStore>;

pub fn item(id: u64) -> FeedItem<PhotoRef> {
    FeedItem {
        id: ItemId::from(id),
        author_id: UserId::from("coach"),
        content: format!("workout {}", id),
        created_at: Utc.timestamp_opt(1_700_000_000 + id as i64 * 60, 0).unwrap(),
        attachment: None,
        reactions: ReactionSummary::new(5, 7, None),
    }
}

pub fn page(ids: &[u64], is_last: bool) -> Page<PhotoRef> {
    Page::new(ids.iter().map(|id| item(*id)).collect(), false, is_last)
}

pub fn ids(items: &[FeedItem<PhotoRef>]) -> Vec<ItemId> {
    items.iter().map(|item| item.id.clone()).collect()
}

pub fn id_list(ids: &[u64]) -> Vec<ItemId> {
    ids.iter().map(|id| ItemId::from(*id)).collect()
}

pub fn athlete() -> CallerIdentity {
    CallerIdentity::authenticated("athlete-1", Credential::Bearer("session-token".into()))
}

#[derive(Default)]
struct Script {
    initial: Vec<u64>,
    initial_is_last: bool,
    initial_error: Option<FeedError>,
    older: VecDeque<Result<Page<PhotoRef>>>,
    new_count: Option<Result<NewCount>>,
    new_items: Option<Result<Vec<FeedItem<PhotoRef>>>>,
    reaction_error: Option<FeedError>,
    delete_error: Option<FeedError>,
    create_error: Option<FeedError>,
    calls: HashMap<&'static str, usize>,
    holds: HashMap<&'static str, Arc<Notify>>,
    since: Vec<Option<ItemId>>,
    cursors: Vec<Option<ItemId>>,
    targets: Vec<TargetIdentity>,
    drafts: Vec<Draft<PhotoRef>>,
}

/// Backing store whose answers are set up by the test.
///
/// Every call is counted. `hold` gates the next call of one kind until
/// the returned `Notify` is released, which lets a test observe the
/// engine while that call is in flight.
#[derive(Default)]
pub struct MockStore {
    script: Mutex<Script>,
}

impl MockStore {
    /// Store whose initial page holds `ids`, newest first
    pub fn with_initial(ids: &[u64], is_last: bool) -> Self {
        let store = Self::default();
        {
            let mut script = store.script.lock().unwrap();
            script.initial = ids.to_vec();
            script.initial_is_last = is_last;
        }
        store
    }

    pub fn fail_initial(&self, err: FeedError) {
        self.script.lock().unwrap().initial_error = Some(err);
    }

    pub fn clear_initial_error(&self) {
        self.script.lock().unwrap().initial_error = None;
    }

    pub fn push_older(&self, result: Result<Page<PhotoRef>>) {
        self.script.lock().unwrap().older.push_back(result);
    }

    pub fn set_new_count(&self, result: Result<NewCount>) {
        self.script.lock().unwrap().new_count = Some(result);
    }

    pub fn set_new_items(&self, result: Result<Vec<FeedItem<PhotoRef>>>) {
        self.script.lock().unwrap().new_items = Some(result);
    }

    pub fn fail_reactions(&self, err: Option<FeedError>) {
        self.script.lock().unwrap().reaction_error = err;
    }

    pub fn fail_deletes(&self, err: Option<FeedError>) {
        self.script.lock().unwrap().delete_error = err;
    }

    pub fn fail_creates(&self, err: Option<FeedError>) {
        self.script.lock().unwrap().create_error = err;
    }

    /// Gate the next `call` until the returned notify is released
    pub fn hold(&self, call: &'static str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.script.lock().unwrap().holds.insert(call, Arc::clone(&notify));
        notify
    }

    pub fn calls(&self, call: &str) -> usize {
        self.script.lock().unwrap().calls.get(call).copied().unwrap_or(0)
    }

    /// `since` cursor of every fetch_new_count / fetch_new_items call
    pub fn since(&self) -> Vec<Option<ItemId>> {
        self.script.lock().unwrap().since.clone()
    }

    /// Cursor of every fetch_page call
    pub fn cursors(&self) -> Vec<Option<ItemId>> {
        self.script.lock().unwrap().cursors.clone()
    }

    pub fn targets(&self) -> Vec<TargetIdentity> {
        self.script.lock().unwrap().targets.clone()
    }

    pub fn drafts(&self) -> Vec<Draft<PhotoRef>> {
        self.script.lock().unwrap().drafts.clone()
    }

    /// Count the call, then wait if the test is holding it
    async fn enter(&self, call: &'static str) {
        let hold = {
            let mut script = self.script.lock().unwrap();
            *script.calls.entry(call).or_default() += 1;
            script.holds.remove(call)
        };
        if let Some(notify) = hold {
            notify.notified().await;
        }
    }
}

#[async_trait]
impl BackingStore<Posts> for MockStore {
    async fn fetch_page(
        &self,
        _credential: &Credential,
        target: &TargetIdentity,
        cursor: Option<&ItemId>,
        direction: PageDirection,
    ) -> Result<Page<PhotoRef>> {
        {
            let mut script = self.script.lock().unwrap();
            script.cursors.push(cursor.cloned());
            script.targets.push(target.clone());
        }
        self.enter("fetch_page").await;

        let mut script = self.script.lock().unwrap();
        match direction {
            PageDirection::Initial => match &script.initial_error {
                Some(err) => Err(err.clone()),
                None => Ok(Page::new(
                    script.initial.iter().map(|id| item(*id)).collect(),
                    true,
                    script.initial_is_last,
                )),
            },
            _ => script
                .older
                .pop_front()
                .unwrap_or_else(|| Ok(Page::new(Vec::new(), false, true))),
        }
    }

    async fn fetch_new_count(
        &self,
        _credential: &Credential,
        _target: &TargetIdentity,
        since: Option<&ItemId>,
    ) -> Result<NewCount> {
        self.script.lock().unwrap().since.push(since.cloned());
        self.enter("fetch_new_count").await;
        self.script
            .lock()
            .unwrap()
            .new_count
            .clone()
            .unwrap_or_else(|| Ok(NewCount::default()))
    }

    async fn fetch_new_items(
        &self,
        _credential: &Credential,
        _target: &TargetIdentity,
        since: Option<&ItemId>,
    ) -> Result<Vec<FeedItem<PhotoRef>>> {
        self.script.lock().unwrap().since.push(since.cloned());
        self.enter("fetch_new_items").await;
        self.script
            .lock()
            .unwrap()
            .new_items
            .clone()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn toggle_reaction(&self, _credential: &Credential, _item_id: &ItemId, _reaction: Reaction) -> Result<Ack> {
        self.enter("toggle_reaction").await;
        match &self.script.lock().unwrap().reaction_error {
            Some(err) => Err(err.clone()),
            None => Ok(Ack::default()),
        }
    }

    async fn delete_item(&self, _credential: &Credential, _item_id: &ItemId) -> Result<Ack> {
        self.enter("delete_item").await;
        match &self.script.lock().unwrap().delete_error {
            Some(err) => Err(err.clone()),
            None => Ok(Ack::default()),
        }
    }

    async fn create_item(&self, _credential: &Credential, draft: &Draft<PhotoRef>) -> Result<Ack> {
        self.enter("create_item").await;
        let mut script = self.script.lock().unwrap();
        match &script.create_error {
            Some(err) => Err(err.clone()),
            None => {
                script.drafts.push(draft.clone());
                Ok(Ack::default())
            }
        }
    }

    async fn upload_attachment(&self, _credential: &Credential, upload: Upload) -> Result<PhotoRef> {
        self.enter("upload_attachment").await;
        Ok(PhotoRef {
            url: format!(
                "https://cdn.fitfeed.test/{}",
                upload.file_name.unwrap_or_else(|| "upload".to_string())
            ),
            width: None,
            height: None,
        })
    }
}

pub fn engine(store: MockStore) -> (TestFeed, Arc<MockStore>) {
    let store = Arc::new(store);
    let feed = FeedSyncEngine::new(Arc::clone(&store), EngineConfig::default().with_poll_interval(POLL_INTERVAL));
    (feed, store)
}

/// Engine with an initial window already loaded for [`athlete`]
pub async fn ready_engine(ids: &[u64], is_last: bool) -> (TestFeed, Arc<MockStore>) {
    let (feed, store) = engine(MockStore::with_initial(ids, is_last));
    feed.load_initial(TargetIdentity::All, athlete()).await.unwrap();
    (feed, store)
}

/// Yield until the store has seen `count` calls of one kind
pub async fn wait_for_calls(store: &MockStore, call: &str, count: usize) {
    while store.calls(call) < count {
        tokio::task::yield_now().await;
    }
}
