//! Observable engine state and operation outcomes

use crate::error::FeedError;
use crate::identity::TargetIdentity;
use crate::types::{FeedItem, ItemId};

/// Lifecycle of one feed window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EnginePhase {
    /// No initial load yet
    #[default]
    Uninitialized,
    /// Initial page in flight
    Loading,
    /// Window loaded, polling (when allowed)
    Ready,
    /// The initial load failed for a non-authorization reason; retry with
    /// another initial load
    Failed,
    /// Caller is unauthenticated or its credential was rejected
    Unauthorized,
    /// Host tore the engine down
    Closed,
}

impl EnginePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Unauthorized => "unauthorized",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One in-flight call at most per flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingOperationFlags {
    pub loading_initial: bool,
    pub loading_older: bool,
    pub loading_newer: bool,
    pub deleting: bool,
}

impl PendingOperationFlags {
    pub fn any(&self) -> bool {
        self.loading_initial || self.loading_older || self.loading_newer || self.deleting
    }
}

/// Why an operation did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// Same operation already in flight
    InFlight,
    /// Access gate is closed
    AccessRevoked,
    /// Caller has no session; nothing was fetched
    NotAuthenticated,
    /// Window is not in the `Ready` phase
    NotReady,
    /// Nothing to fetch (empty window, or no pending new items)
    NothingToLoad,
    /// Oldest page already loaded
    EndOfFeed,
    /// Item is not in the window (already deleted, or never loaded)
    NotInWindow,
    /// `confirm_delete` without a preceding `request_delete`
    NoPendingDelete,
    /// Window was replaced, revoked, or torn down while the call was in
    /// flight; its result was discarded
    Stale,
    /// Engine was torn down
    Closed,
}

/// Result of a successful operation call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The backing store accepted the call and its effect was applied
    Applied,
    /// The call was dropped without touching state
    Dropped(DropReason),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }

    pub fn dropped_because(&self) -> Option<DropReason> {
        match self {
            Outcome::Applied => None,
            Outcome::Dropped(reason) => Some(*reason),
        }
    }
}

/// Everything a UI host needs to render a feed
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot<A> {
    pub phase: EnginePhase,
    pub target: TargetIdentity,
    /// Newest first
    pub items: Vec<FeedItem<A>>,
    pub is_first_page: bool,
    pub is_last_page: bool,
    pub pending_new_count: u32,
    pub flags: PendingOperationFlags,
    pub has_full_access: bool,
    /// Item awaiting delete confirmation
    pub pending_delete: Option<ItemId>,
    /// Items with a reaction toggle in flight
    pub reacting: Vec<ItemId>,
    /// Most recent failure, cleared by the next successful operation or initial load
    pub last_error: Option<FeedError>,
}

impl<A> Default for FeedSnapshot<A> {
    fn default() -> Self {
        Self {
            phase: EnginePhase::Uninitialized,
            target: TargetIdentity::All,
            items: Vec::new(),
            is_first_page: true,
            is_last_page: false,
            pending_new_count: 0,
            flags: PendingOperationFlags::default(),
            has_full_access: false,
            pending_delete: None,
            reacting: Vec::new(),
            last_error: None,
        }
    }
}

impl<A> FeedSnapshot<A> {
    /// Whether a "show N new" affordance should be offered
    pub fn has_new_items(&self) -> bool {
        self.pending_new_count > 0
    }

    /// Whether a "load more" affordance should be offered
    pub fn can_load_older(&self) -> bool {
        self.phase == EnginePhase::Ready
            && self.has_full_access
            && !self.items.is_empty()
            && !self.is_last_page
            && !self.flags.loading_older
    }
}
