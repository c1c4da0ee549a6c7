//! Feed kinds
//!
//! Posts and messages run on the same engine; a [`FeedKind`] supplies the
//! bits that differ between them: where the collection lives on the
//! backing store, what an attachment looks like, and default tuning.

use crate::config::EngineConfig;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::Debug;

/// Describes one kind of feed.
///
/// # Example
///
/// ```rust,ignore
/// use fitfeed_sync::{FeedKind, EngineConfig};
///
/// struct Comments;
///
/// impl FeedKind for Comments {
///     type Attachment = ();
///     fn resource() -> &'static str { "comments" }
/// }
/// ```
pub trait FeedKind: Send + Sync + 'static {
    /// Attachment reference carried by items of this feed
    type Attachment: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Collection name on the backing store (e.g., "posts")
    fn resource() -> &'static str;

    /// Default engine tuning for this feed
    fn default_config() -> EngineConfig {
        EngineConfig::default()
    }
}

/// Photo attached to a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// File attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub url: String,
    pub file_name: String,
    pub mime_type: String,
    #[serde(default)]
    pub size_bytes: u64,
}

/// Public workout posts
#[derive(Debug, Clone, Copy, Default)]
pub struct Posts;

impl FeedKind for Posts {
    type Attachment = PhotoRef;

    fn resource() -> &'static str {
        "posts"
    }

    fn default_config() -> EngineConfig {
        EngineConfig::for_posts()
    }
}

/// Messages between users
#[derive(Debug, Clone, Copy, Default)]
pub struct Messages;

impl FeedKind for Messages {
    type Attachment = FileRef;

    fn resource() -> &'static str {
        "messages"
    }

    fn default_config() -> EngineConfig {
        EngineConfig::for_messages()
    }
}
