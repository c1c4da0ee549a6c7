//! FitFeed sync - live feed synchronization engine
//!
//! Keeps a windowed, continuously-updating view over a paginated remote feed
//! (workout posts, direct messages) for the FitFeed client.
//!
//! # Architecture
//!
//! - [`reaction::resolve`]: pure like/dislike state transitions
//! - [`FeedWindow`]: ordered items, cursors, pagination flags
//! - [`AccessGate`]: closes on a rejected credential, reopens on re-login
//! - [`PollController`]: the "are there new items" timer
//! - [`FeedSyncEngine`]: public operations with single-flight guards
//!
//! The engine drives a [`BackingStore`]; [`HttpBackingStore`] implements it
//! over REST/JSON.
//!
//! # Example
//!
//! ```rust,ignore
//! use fitfeed_sync::{
//!     CallerIdentity, Credential, HttpBackingStore, HttpStoreConfig, PostFeed, Reaction, TargetIdentity,
//! };
//! use std::sync::Arc;
//!
//! let store = Arc::new(HttpBackingStore::new(HttpStoreConfig {
//!     base_url: "https://api.fitfeed.app/v1".into(),
//!     ..Default::default()
//! })?);
//! let feed = PostFeed::with_defaults(store);
//!
//! let caller = CallerIdentity::authenticated("42", Credential::Bearer(token));
//! feed.load_initial(TargetIdentity::All, caller).await?;
//! feed.load_older().await?;
//! feed.toggle_reaction(&post_id, Reaction::Like).await?;
//!
//! // On unmount
//! feed.teardown().await;
//! ```

// Leaf components
pub mod access;
pub mod poll;
pub mod reaction;
pub mod window;

// Engine and its collaborators
pub mod config;
pub mod engine;
pub mod feeds;
pub mod identity;
pub mod store;
pub mod types;

// HTTP backing store
#[cfg(feature = "http")]
pub mod client;

// Error types
pub mod error;

pub use access::AccessGate;
pub use config::EngineConfig;
pub use engine::{
    DropReason, EnginePhase, FeedSnapshot, FeedSyncEngine, MessageFeed, Outcome, PendingOperationFlags, PostFeed,
};
pub use error::{ErrorKind, FeedError, Result};
pub use feeds::{FeedKind, FileRef, Messages, PhotoRef, Posts};
pub use identity::{CallerIdentity, Credential, TargetIdentity};
pub use poll::PollController;
pub use store::BackingStore;
pub use types::{
    Ack, Draft, FeedItem, ItemId, NewCount, Page, PageDirection, Reaction, ReactionSummary, Upload, UserId,
};
pub use window::FeedWindow;

#[cfg(feature = "http")]
pub use client::{HttpBackingStore, HttpStoreConfig};
