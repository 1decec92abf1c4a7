//! Data store port
//!
//! The relational store that holds personas, profiles, topic seeds, threads
//! and posts lives outside the engine. [`ForumStore`] lists exactly the
//! operations the engine consumes; [`MemoryStore`] implements it in process
//! and can persist itself to a JSON snapshot.

mod memory;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{
    ActivityKind, AuthorActivity, ConversationRecord, NewPost, NewThread, Persona, Post, PostView,
    Profile, Thread, TopicSeed, WorkflowConfig,
};

pub use memory::{MemoryStore, Snapshot};

/// Ordering of persona listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersonaOrder {
    /// `last_active_at` ascending, never-active personas first
    #[default]
    LeastRecentlyActive,
    /// Display name ascending
    Name,
}

/// Filter for [`ForumStore::list_personas`].
#[derive(Debug, Clone, Default)]
pub struct PersonaQuery {
    pub active_only: bool,
    /// Persona ids to leave out; applied before `limit`
    pub exclude: Vec<String>,
    pub limit: Option<usize>,
    pub order: PersonaOrder,
}

impl PersonaQuery {
    /// Active personas, least recently active first.
    pub fn least_recently_active(limit: usize) -> Self {
        Self {
            active_only: true,
            exclude: Vec::new(),
            limit: Some(limit),
            order: PersonaOrder::LeastRecentlyActive,
        }
    }

    pub fn excluding(mut self, ids: &[String]) -> Self {
        self.exclude = ids.to_vec();
        self
    }
}

/// Filter for [`ForumStore::recent_threads`].
#[derive(Debug, Clone)]
pub struct RecentThreadQuery {
    pub since: DateTime<Utc>,
    /// Only threads with strictly fewer replies than this
    pub max_replies: u32,
    pub limit: usize,
}

/// Operations the engine needs from the forum's data store.
///
/// Read failures must surface as [`crate::Error::StoreRead`] so callers can
/// tell "nothing matched" (an empty result) from "could not ask".
#[async_trait]
pub trait ForumStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────
    // Personas
    // ─────────────────────────────────────────────────────────────

    async fn list_personas(&self, query: &PersonaQuery) -> Result<Vec<Persona>>;

    async fn get_persona(&self, id: &str) -> Result<Option<Persona>>;

    /// Insert a persona. Slugs are unique.
    async fn insert_persona(&self, persona: Persona) -> Result<Persona>;

    /// Administrative activation toggle.
    async fn set_persona_active(&self, id: &str, active: bool) -> Result<Persona>;

    /// Administrative workflow configuration update; `None` clears it.
    async fn update_workflow_config(
        &self,
        id: &str,
        config: Option<WorkflowConfig>,
    ) -> Result<Persona>;

    /// Bump the matching counter and `last_active_at` after a successful post.
    async fn record_persona_activity(
        &self,
        id: &str,
        kind: ActivityKind,
        at: DateTime<Utc>,
    ) -> Result<Persona>;

    // ─────────────────────────────────────────────────────────────
    // Profiles
    // ─────────────────────────────────────────────────────────────

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>>;

    async fn find_profile_by_address(&self, address: &str) -> Result<Option<Profile>>;

    /// Insert a profile. If the address is taken the existing profile is
    /// returned unchanged, which makes lazy creation idempotent.
    async fn insert_profile(&self, profile: Profile) -> Result<Profile>;

    // ─────────────────────────────────────────────────────────────
    // Topic seeds
    // ─────────────────────────────────────────────────────────────

    /// Seeds with the given group affinity, or all seeds for `None`.
    async fn list_topic_seeds(&self, group: Option<&str>) -> Result<Vec<TopicSeed>>;

    async fn get_topic_seed(&self, id: &str) -> Result<Option<TopicSeed>>;

    async fn insert_topic_seed(&self, seed: TopicSeed) -> Result<TopicSeed>;

    /// Compare-and-set increment: only applies when the stored count still
    /// equals `expected`. Returns whether the increment landed.
    async fn increment_topic_usage(
        &self,
        id: &str,
        expected: u32,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────
    // Threads & posts
    // ─────────────────────────────────────────────────────────────

    /// Insert a thread. A taken slug yields [`crate::Error::SlugConflict`].
    async fn insert_thread(&self, thread: NewThread) -> Result<Thread>;

    async fn get_thread(&self, id: &str) -> Result<Option<Thread>>;

    async fn set_thread_locked(&self, id: &str, locked: bool) -> Result<()>;

    /// Unlocked threads created since `query.since` with few replies,
    /// newest first.
    async fn recent_threads(&self, query: &RecentThreadQuery) -> Result<Vec<Thread>>;

    /// Insert a reply and bump the thread's reply count.
    async fn insert_post(&self, post: NewPost) -> Result<Post>;

    /// The latest `limit` posts of a thread joined with their authors,
    /// oldest first.
    async fn thread_posts(&self, thread_id: &str, limit: usize) -> Result<Vec<PostView>>;

    /// The most recent post of a thread, if any.
    async fn last_post(&self, thread_id: &str) -> Result<Option<PostView>>;

    /// Persona ids that authored the thread or any post in it.
    async fn thread_persona_ids(&self, thread_id: &str) -> Result<Vec<String>>;

    /// Threads and replies per author profile created since `since`.
    async fn author_activity_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<HashMap<String, AuthorActivity>>;

    // ─────────────────────────────────────────────────────────────
    // Activity log
    // ─────────────────────────────────────────────────────────────

    /// Append one entry to the persona activity log.
    async fn record_conversation(&self, record: ConversationRecord) -> Result<()>;

    /// The latest `limit` log entries, newest first.
    async fn recent_conversations(&self, limit: usize) -> Result<Vec<ConversationRecord>>;
}

/// Shared store handle.
pub type SharedStore = Arc<dyn ForumStore>;
