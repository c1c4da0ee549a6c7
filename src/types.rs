//! Wire and state types shared by the engine and backing stores

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Opaque item identifier, also used as a pagination cursor.
///
/// Servers hand these out either as JSON strings or as integers; both
/// deserialize to the same id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

/// Identifier of a user account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawId::deserialize(deserializer).map(|raw| Self(raw.into()))
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawId::deserialize(deserializer).map(|raw| Self(raw.into()))
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u64> for ItemId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reaction the caller can cast on an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Like,
    Dislike,
}

impl Reaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
        }
    }
}

impl std::fmt::Display for Reaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate reaction counts plus the current caller's own vote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReactionSummary {
    #[serde(default)]
    pub like_count: u32,
    #[serde(default)]
    pub dislike_count: u32,
    /// Only the caller's vote, never the aggregate
    #[serde(default)]
    pub caller_reaction: Option<Reaction>,
}

impl ReactionSummary {
    pub fn new(like_count: u32, dislike_count: u32, caller_reaction: Option<Reaction>) -> Self {
        Self {
            like_count,
            dislike_count,
            caller_reaction,
        }
    }

    pub fn count(&self, reaction: Reaction) -> u32 {
        match reaction {
            Reaction::Like => self.like_count,
            Reaction::Dislike => self.dislike_count,
        }
    }

    pub fn total(&self) -> u64 {
        u64::from(self.like_count) + u64::from(self.dislike_count)
    }
}

/// One entry in a feed.
///
/// `A` is the attachment reference shape of the feed (image for posts,
/// file for messages). Everything except `reactions` is immutable once
/// loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem<A> {
    pub id: ItemId,
    pub author_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub attachment: Option<A>,
    #[serde(default)]
    pub reactions: ReactionSummary,
}

/// Which slice of the remote collection a page request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageDirection {
    /// The newest page
    Initial,
    /// Items older than the cursor
    Before,
    /// Items newer than the cursor
    After,
}

/// One page of a feed as delivered by the backing store, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<A> {
    pub items: Vec<FeedItem<A>>,
    pub is_first: bool,
    pub is_last: bool,
}

impl<A> Page<A> {
    pub fn new(items: Vec<FeedItem<A>>, is_first: bool, is_last: bool) -> Self {
        Self {
            items,
            is_first,
            is_last,
        }
    }
}

/// Count of items newer than a cursor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCount {
    pub count: u32,
}

/// Acknowledgement of a mutating call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A new item to be created by the backing store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft<A> {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<A>,
}

impl<A> Draft<A> {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: A) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// A draft with no text and no attachment has nothing to publish
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.attachment.is_none()
    }
}

/// Raw bytes to upload as an attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: Option<String>,
}

impl Upload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }
}
