//! Backing store contract
//!
//! The engine never talks to the network itself; it drives a
//! [`BackingStore`] implementation. [`crate::client::HttpBackingStore`] is
//! the REST/JSON one; tests use in-memory stores.

use crate::error::Result;
use crate::feeds::FeedKind;
use crate::identity::{Credential, TargetIdentity};
use crate::types::{Ack, Draft, FeedItem, ItemId, NewCount, Page, PageDirection, Reaction, Upload};
use async_trait::async_trait;

/// Remote paginated collection plus its mutation endpoints.
///
/// Every call takes the caller's credential explicitly. Implementations
/// must report a rejected credential as [`crate::FeedError::Unauthorized`]
/// and keep it distinct from other failures; it is the only failure that
/// closes the engine's access gate.
#[async_trait]
pub trait BackingStore<K: FeedKind>: Send + Sync + 'static {
    /// Fetch one page. `cursor` is `None` for [`PageDirection::Initial`].
    async fn fetch_page(
        &self,
        credential: &Credential,
        target: &TargetIdentity,
        cursor: Option<&ItemId>,
        direction: PageDirection,
    ) -> Result<Page<K::Attachment>>;

    /// Count items newer than `since` (all items when `since` is `None`)
    async fn fetch_new_count(
        &self,
        credential: &Credential,
        target: &TargetIdentity,
        since: Option<&ItemId>,
    ) -> Result<NewCount>;

    /// Fetch items newer than `since`, newest first
    async fn fetch_new_items(
        &self,
        credential: &Credential,
        target: &TargetIdentity,
        since: Option<&ItemId>,
    ) -> Result<Vec<FeedItem<K::Attachment>>>;

    async fn toggle_reaction(
        &self,
        credential: &Credential,
        item_id: &ItemId,
        reaction: Reaction,
    ) -> Result<Ack>;

    async fn delete_item(&self, credential: &Credential, item_id: &ItemId) -> Result<Ack>;

    async fn create_item(&self, credential: &Credential, draft: &Draft<K::Attachment>) -> Result<Ack>;

    async fn upload_attachment(&self, credential: &Credential, upload: Upload) -> Result<K::Attachment>;
}
