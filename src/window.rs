//! Client-held slice of a remote feed
//!
//! Items are kept in the order the backing store delivered them (newest
//! first) and are never re-sorted locally. Every merge is keyed by item id
//! rather than by position, so merges from overlapping in-flight requests
//! commute.

use crate::types::{FeedItem, ItemId, Page, ReactionSummary};
use std::collections::HashSet;

/// Ordered window over a feed plus its pagination state
#[derive(Debug, Clone, PartialEq)]
pub struct FeedWindow<A> {
    items: Vec<FeedItem<A>>,
    is_first_page: bool,
    is_last_page: bool,
    /// Last polled count of items newer than `items[0]`
    pending_new_count: u32,
}

impl<A> Default for FeedWindow<A> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            is_first_page: true,
            is_last_page: false,
            pending_new_count: 0,
        }
    }
}

impl<A> FeedWindow<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard everything and start over from `page`
    pub fn replace(&mut self, page: Page<A>) {
        self.items = dedup(page.items, &HashSet::new());
        self.is_first_page = page.is_first;
        self.is_last_page = page.is_last;
        self.pending_new_count = 0;
    }

    /// Grow the tail with an older page. Returns the number of items added.
    pub fn append_older(&mut self, page: Page<A>) -> usize {
        let known = self.id_set();
        let fresh = dedup(page.items, &known);
        let added = fresh.len();
        self.items.extend(fresh);
        self.is_last_page = page.is_last;
        added
    }

    /// Grow the head with newer items, in the order received. Returns the
    /// number of items added.
    pub fn prepend_newer(&mut self, items: Vec<FeedItem<A>>) -> usize {
        let known = self.id_set();
        let mut fresh = dedup(items, &known);
        let added = fresh.len();
        fresh.append(&mut self.items);
        self.items = fresh;
        self.pending_new_count = 0;
        added
    }

    /// Record the latest poll result; always supersedes the prior value
    pub fn set_pending_new_count(&mut self, count: u32) {
        self.pending_new_count = count;
    }

    /// Drop an item. Returns whether it was present.
    pub fn remove_item(&mut self, id: &ItemId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.id != id);
        self.items.len() != before
    }

    /// Replace the reaction summary of one item. Returns whether it was present.
    pub fn update_reaction(&mut self, id: &ItemId, reactions: ReactionSummary) -> bool {
        match self.items.iter_mut().find(|item| &item.id == id) {
            Some(item) => {
                item.reactions = reactions;
                true
            }
            None => false,
        }
    }

    /// Cursor for "newer than" queries
    pub fn top_id(&self) -> Option<&ItemId> {
        self.items.first().map(|item| &item.id)
    }

    /// Cursor for "older than" queries
    pub fn bottom_id(&self) -> Option<&ItemId> {
        self.items.last().map(|item| &item.id)
    }

    pub fn get(&self, id: &ItemId) -> Option<&FeedItem<A>> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.get(id).is_some()
    }

    pub fn items(&self) -> &[FeedItem<A>] {
        &self.items
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_first_page(&self) -> bool {
        self.is_first_page
    }

    pub fn is_last_page(&self) -> bool {
        self.is_last_page
    }

    pub fn pending_new_count(&self) -> u32 {
        self.pending_new_count
    }

    fn id_set(&self) -> HashSet<ItemId> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }
}

/// Keep the first occurrence of each id not already in `known`
fn dedup<A>(items: Vec<FeedItem<A>>, known: &HashSet<ItemId>) -> Vec<FeedItem<A>> {
    let mut seen = known.clone();
    items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}
