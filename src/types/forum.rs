//! Forum-side records: author profiles, topic seeds, threads and posts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::persona::ActivityKind;

/// Longest slug prefix taken from a thread title.
pub const MAX_SLUG_TITLE_LEN: usize = 80;

// ─────────────────────────────────────────────────────────────────
// Profile
// ─────────────────────────────────────────────────────────────────

/// An author identity. Threads and posts reference profiles, never personas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: String,

    /// Unique contact address. Persona profiles use a synthetic one.
    pub address: String,

    /// Capability flag: posts by this profile are persona activity.
    #[serde(default)]
    pub is_persona_controlled: bool,

    /// Backing persona, when persona-controlled.
    #[serde(default)]
    pub persona_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// A profile for a real (human) forum member.
    pub fn member(
        display_name: impl Into<String>,
        address: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            display_name: display_name.into(),
            address: address.into(),
            is_persona_controlled: false,
            persona_id: None,
            created_at: now,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Topic Seed
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSeed {
    pub id: String,
    pub topic: String,

    /// Group affinity (forum group slug)
    #[serde(default)]
    pub group: Option<String>,

    /// Extra steer for the generator
    #[serde(default)]
    pub prompt_hint: Option<String>,

    /// Higher wins among seeds with the same usage
    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub used_count: u32,

    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl TopicSeed {
    pub fn new(topic: impl Into<String>, group: Option<&str>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.into(),
            group: group.map(str::to_string),
            prompt_hint: None,
            priority: 0,
            used_count: 0,
            last_used_at: None,
            created_at,
        }
    }
}

/// Admin request for a new topic seed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTopicSeed {
    pub topic: String,
    /// Group affinity; `category` is accepted as an alias
    #[serde(default, alias = "category")]
    pub group: Option<String>,
    #[serde(default)]
    pub prompt_hint: Option<String>,
    /// Defaults to [`crate::engine::DEFAULT_TOPIC_PRIORITY`]
    #[serde(default)]
    pub priority: Option<i32>,
}

// ─────────────────────────────────────────────────────────────────
// Threads & Posts
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub title: String,
    pub body: String,
    pub slug: String,
    pub group: String,
    pub author_id: String,
    #[serde(default)]
    pub is_locked: bool,
    /// Cached number of replies (posts) in the thread
    #[serde(default)]
    pub reply_count: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub thread_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Insert request for a thread; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewThread {
    pub title: String,
    pub body: String,
    pub slug: String,
    pub group: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
}

/// Insert request for a reply; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub thread_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A post joined with its author, as handed to the generator and the guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostView {
    pub post_id: String,
    pub author_id: String,
    pub author_name: String,
    pub author_is_persona: bool,
    pub author_persona_id: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// One entry of the persona activity log: a thread or reply a persona
/// posted, with a short preview of its content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub persona_id: String,
    pub persona_name: String,
    pub action: ActivityKind,
    pub thread_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    pub content_preview: String,
    pub created_at: DateTime<Utc>,
}

/// Per-profile counts used by the workflow overview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorActivity {
    pub threads: u32,
    pub replies: u32,
}

// ─────────────────────────────────────────────────────────────────
// Slugs
// ─────────────────────────────────────────────────────────────────

/// Lowercase, hyphen-separated ASCII slug of `title`, at most 80 chars.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug.truncate(MAX_SLUG_TITLE_LEN);
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Thread slug: title slug plus the creation time in base 36 milliseconds.
pub fn thread_slug(title: &str, created_at: DateTime<Utc>) -> String {
    let stamp = to_base36(created_at.timestamp_millis().max(0) as u64);
    let base = slugify(title);
    if base.is_empty() {
        format!("thread-{}", stamp)
    } else {
        format!("{}-{}", base, stamp)
    }
}

pub(crate) fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
