use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// What kind of trackable unit an item is. Drives icon/color in the portal
/// UI; the sync engine itself only carries it through. Kinds added by newer
/// servers fold into `Other` instead of failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    ApplicationStatus,
    Message,
    BlogPublished,
    JobPosted,
    System,
    #[serde(other)]
    Other,
}

impl ItemKind {
    /// Wire form, as used in list-filter query parameters.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApplicationStatus => "application_status",
            Self::Message => "message",
            Self::BlogPublished => "blog_published",
            Self::JobPosted => "job_posted",
            Self::System => "system",
            Self::Other => "other",
        }
    }
}

/// One notification or trackable content unit.
///
/// `id` is stable across channels: the gateway's `entityId` for an item and
/// the REST id for the same item always match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    /// Associated data (related entity ids, display strings). Opaque to the
    /// sync engine.
    #[serde(default)]
    pub payload: Value,
}

/// A category of unread-tracked content. Each domain owns its own counter,
/// item list, REST path prefix and gateway stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnreadDomain {
    Notifications,
    BlogPosts,
}

impl UnreadDomain {
    pub const ALL: [UnreadDomain; 2] = [UnreadDomain::Notifications, UnreadDomain::BlogPosts];

    /// Path segment under the API base URL.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Notifications => "notifications",
            Self::BlogPosts => "blog-posts",
        }
    }

    /// Gateway stream name for the subscribe handshake.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Notifications => "notifications",
            Self::BlogPosts => "blog",
        }
    }

    /// Map a push event's `entityType` tag to its domain.
    pub fn from_entity_type(entity_type: &str) -> Option<Self> {
        match entity_type {
            "notification" => Some(Self::Notifications),
            "blog_post" => Some(Self::BlogPosts),
            _ => None,
        }
    }
}

/// Read-only projection of one domain's state, published to the presentation
/// layer. Always internally consistent: `unread_count` covers the unread
/// items in `items` plus any unread items known to exist beyond them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadView {
    /// Loaded items, newest first.
    pub items: Vec<Item>,
    pub unread_count: u32,
    pub has_more: bool,
    /// Set when the last snapshot fetch failed and the data shown may be
    /// outdated. Cleared by the next applied snapshot.
    pub stale: bool,
}
