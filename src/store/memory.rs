//! In-process [`ForumStore`] with JSON snapshot persistence.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ForumStore, PersonaOrder, PersonaQuery, RecentThreadQuery};
use crate::error::{Error, Result};
use crate::types::{
    ActivityKind, AuthorActivity, ConversationRecord, NewPost, NewThread, Persona, Post, PostView,
    Profile, Thread, TopicSeed, WorkflowConfig,
};

// ─────────────────────────────────────────────────────────────────
// Snapshot
// ─────────────────────────────────────────────────────────────────

/// Full store contents. Also the format of `persona-engine seed` files,
/// where every table is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub personas: Vec<Persona>,
    pub profiles: Vec<Profile>,
    pub topic_seeds: Vec<TopicSeed>,
    pub threads: Vec<Thread>,
    pub posts: Vec<Post>,
    /// Persona activity log, oldest first
    pub conversations: Vec<ConversationRecord>,
}

impl Snapshot {
    /// Read a snapshot from a JSON file.
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Fold in records another process wrote to the same file.
    ///
    /// Records are only ever added, so every table is a union by id. For a
    /// record both sides hold, counters keep the larger value and admin
    /// fields (activation, workflow, lock) keep whichever side changed them
    /// last: ours if we touched the record since the previous save,
    /// otherwise theirs.
    fn absorb(&mut self, theirs: Snapshot, touched: &Touched) {
        for other in theirs.personas {
            let Some(ours) = self.personas.iter_mut().find(|p| p.id == other.id) else {
                self.personas.push(other);
                continue;
            };
            let thread_count = ours.thread_count.max(other.thread_count);
            let reply_count = ours.reply_count.max(other.reply_count);
            let last_active_at = ours.last_active_at.max(other.last_active_at);
            if !touched.personas.contains(&other.id) {
                *ours = other;
            }
            ours.thread_count = thread_count;
            ours.reply_count = reply_count;
            ours.last_active_at = last_active_at;
        }

        for other in theirs.profiles {
            if !self.profiles.iter().any(|p| p.id == other.id) {
                self.profiles.push(other);
            }
        }

        for other in theirs.topic_seeds {
            match self.topic_seeds.iter_mut().find(|s| s.id == other.id) {
                Some(ours) => {
                    // used_count never goes backwards
                    if other.used_count > ours.used_count {
                        *ours = other;
                    } else if other.used_count == ours.used_count {
                        ours.last_used_at = ours.last_used_at.max(other.last_used_at);
                    }
                }
                None => self.topic_seeds.push(other),
            }
        }

        for other in theirs.threads {
            let Some(ours) = self.threads.iter_mut().find(|t| t.id == other.id) else {
                self.threads.push(other);
                continue;
            };
            ours.reply_count = ours.reply_count.max(other.reply_count);
            if !touched.threads.contains(&other.id) {
                ours.is_locked = other.is_locked;
            }
        }

        for other in theirs.posts {
            if !self.posts.iter().any(|p| p.id == other.id) {
                self.posts.push(other);
            }
        }
        // Replies written on both sides add up
        for thread in &mut self.threads {
            let posts = self.posts.iter().filter(|p| p.thread_id == thread.id).count();
            thread.reply_count = thread.reply_count.max(posts as u32);
        }

        for other in theirs.conversations {
            if !self.conversations.iter().any(|c| c.id == other.id) {
                self.conversations.push(other);
            }
        }
        self.conversations.sort_by_key(|c| c.created_at);
    }

    fn profile(&self, id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    fn persona_mut(&mut self, id: &str) -> Result<&mut Persona> {
        self.personas
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::PersonaNotFound {
                persona_id: id.to_string(),
            })
    }

    fn post_view(&self, post: &Post) -> PostView {
        let author = self.profile(&post.author_id);
        PostView {
            post_id: post.id.clone(),
            author_id: post.author_id.clone(),
            author_name: author
                .map(|a| a.display_name.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            author_is_persona: author.map_or(false, |a| a.is_persona_controlled),
            author_persona_id: author.and_then(|a| a.persona_id.clone()),
            body: post.body.clone(),
            created_at: post.created_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Memory Store
// ─────────────────────────────────────────────────────────────────

/// Records whose admin fields this process changed since the last save.
#[derive(Debug, Default)]
struct Touched {
    personas: HashSet<String>,
    threads: HashSet<String>,
}

/// Thread-safe in-memory store.
///
/// Each operation takes the lock once, so compare-and-set updates are atomic
/// with respect to concurrent callers. Several processes may share one
/// snapshot file: [`MemoryStore::save`] merges what is on disk before
/// writing.
pub struct MemoryStore {
    tables: RwLock<Snapshot>,
    touched: Mutex<Touched>,
    unavailable: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_snapshot(Snapshot::default())
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            tables: RwLock::new(snapshot),
            touched: Mutex::new(Touched::default()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Load from `path`, or start empty when the file does not exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No snapshot yet, starting empty");
            return Ok(Self::new());
        }
        let snapshot = Snapshot::read(path)?;
        info!(
            path = %path.display(),
            personas = snapshot.personas.len(),
            threads = snapshot.threads.len(),
            "Loaded store snapshot"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Snapshot {
        self.tables.read().clone()
    }

    /// Merge the snapshot at `path` into memory, then write the result back
    /// (temp file, then rename).
    ///
    /// Another process (a CLI action next to a running scheduler) may have
    /// saved since this store was opened; its records are kept and this
    /// store sees them from now on.
    pub fn save(&self, path: &Path) -> Result<()> {
        let on_disk = if path.exists() {
            Some(Snapshot::read(path)?)
        } else {
            None
        };

        // Held until the file is in place so saves from this process queue up
        let mut tables = self.tables.write();
        let mut touched = self.touched.lock();
        if let Some(theirs) = on_disk {
            tables.absorb(theirs, &touched);
        }
        let json = serde_json::to_string_pretty(&*tables)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| Error::IoWrite {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, path).map_err(|e| Error::IoWrite {
            path: path.to_path_buf(),
            source: e,
        })?;

        *touched = Touched::default();
        debug!(path = %path.display(), "Saved store snapshot");
        Ok(())
    }

    fn touch_persona(&self, id: &str) {
        self.touched.lock().personas.insert(id.to_string());
    }

    fn touch_thread(&self, id: &str) {
        self.touched.lock().threads.insert(id.to_string());
    }

    /// Simulate an outage: every operation fails until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::store_read("store unavailable"));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::store_write("store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ForumStore for MemoryStore {
    async fn list_personas(&self, query: &PersonaQuery) -> Result<Vec<Persona>> {
        self.check_read()?;
        let tables = self.tables.read();

        let mut personas: Vec<Persona> = tables
            .personas
            .iter()
            .filter(|p| !query.active_only || p.is_active)
            .filter(|p| !query.exclude.contains(&p.id))
            .cloned()
            .collect();

        match query.order {
            // None sorts before Some, so never-active personas come first
            PersonaOrder::LeastRecentlyActive => {
                personas.sort_by_key(|p| (p.last_active_at, p.created_at))
            }
            PersonaOrder::Name => personas.sort_by(|a, b| a.name.cmp(&b.name)),
        }

        if let Some(limit) = query.limit {
            personas.truncate(limit);
        }
        Ok(personas)
    }

    async fn get_persona(&self, id: &str) -> Result<Option<Persona>> {
        self.check_read()?;
        Ok(self.tables.read().personas.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_persona(&self, persona: Persona) -> Result<Persona> {
        self.check_write()?;
        let mut tables = self.tables.write();
        if tables
            .personas
            .iter()
            .any(|p| p.id == persona.id || p.slug == persona.slug)
        {
            return Err(Error::store_write(format!(
                "persona '{}' already exists",
                persona.slug
            )));
        }
        tables.personas.push(persona.clone());
        Ok(persona)
    }

    async fn set_persona_active(&self, id: &str, active: bool) -> Result<Persona> {
        self.check_write()?;
        let mut tables = self.tables.write();
        let persona = tables.persona_mut(id)?;
        persona.is_active = active;
        self.touch_persona(id);
        Ok(persona.clone())
    }

    async fn update_workflow_config(
        &self,
        id: &str,
        config: Option<WorkflowConfig>,
    ) -> Result<Persona> {
        self.check_write()?;
        let mut tables = self.tables.write();
        let persona = tables.persona_mut(id)?;
        persona.workflow_config = config;
        self.touch_persona(id);
        Ok(persona.clone())
    }

    async fn record_persona_activity(
        &self,
        id: &str,
        kind: ActivityKind,
        at: DateTime<Utc>,
    ) -> Result<Persona> {
        self.check_write()?;
        let mut tables = self.tables.write();
        let persona = tables.persona_mut(id)?;
        match kind {
            ActivityKind::CreatedThread => persona.thread_count += 1,
            ActivityKind::Replied => persona.reply_count += 1,
        }
        persona.last_active_at = Some(at);
        Ok(persona.clone())
    }

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        self.check_read()?;
        Ok(self.tables.read().profile(id).cloned())
    }

    async fn find_profile_by_address(&self, address: &str) -> Result<Option<Profile>> {
        self.check_read()?;
        Ok(self
            .tables
            .read()
            .profiles
            .iter()
            .find(|p| p.address == address)
            .cloned())
    }

    async fn insert_profile(&self, profile: Profile) -> Result<Profile> {
        self.check_write()?;
        let mut tables = self.tables.write();
        if let Some(existing) = tables.profiles.iter().find(|p| p.address == profile.address) {
            return Ok(existing.clone());
        }
        tables.profiles.push(profile.clone());
        Ok(profile)
    }

    async fn list_topic_seeds(&self, group: Option<&str>) -> Result<Vec<TopicSeed>> {
        self.check_read()?;
        Ok(self
            .tables
            .read()
            .topic_seeds
            .iter()
            .filter(|s| group.map_or(true, |g| s.group.as_deref() == Some(g)))
            .cloned()
            .collect())
    }

    async fn get_topic_seed(&self, id: &str) -> Result<Option<TopicSeed>> {
        self.check_read()?;
        Ok(self
            .tables
            .read()
            .topic_seeds
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn insert_topic_seed(&self, seed: TopicSeed) -> Result<TopicSeed> {
        self.check_write()?;
        self.tables.write().topic_seeds.push(seed.clone());
        Ok(seed)
    }

    async fn increment_topic_usage(
        &self,
        id: &str,
        expected: u32,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.check_write()?;
        let mut tables = self.tables.write();
        let seed = tables
            .topic_seeds
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::store_write(format!("topic seed {} does not exist", id)))?;

        if seed.used_count != expected {
            return Ok(false);
        }
        seed.used_count += 1;
        seed.last_used_at = Some(at);
        Ok(true)
    }

    async fn insert_thread(&self, thread: NewThread) -> Result<Thread> {
        self.check_write()?;
        let mut tables = self.tables.write();
        if tables.threads.iter().any(|t| t.slug == thread.slug) {
            return Err(Error::SlugConflict { slug: thread.slug });
        }
        let thread = Thread {
            id: uuid::Uuid::new_v4().to_string(),
            title: thread.title,
            body: thread.body,
            slug: thread.slug,
            group: thread.group,
            author_id: thread.author_id,
            is_locked: false,
            reply_count: 0,
            created_at: thread.created_at,
        };
        tables.threads.push(thread.clone());
        Ok(thread)
    }

    async fn get_thread(&self, id: &str) -> Result<Option<Thread>> {
        self.check_read()?;
        Ok(self.tables.read().threads.iter().find(|t| t.id == id).cloned())
    }

    async fn set_thread_locked(&self, id: &str, locked: bool) -> Result<()> {
        self.check_write()?;
        let mut tables = self.tables.write();
        let thread = tables
            .threads
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::ThreadNotFound {
                thread_id: id.to_string(),
            })?;
        thread.is_locked = locked;
        self.touch_thread(id);
        Ok(())
    }

    async fn recent_threads(&self, query: &RecentThreadQuery) -> Result<Vec<Thread>> {
        self.check_read()?;
        let tables = self.tables.read();
        let mut threads: Vec<Thread> = tables
            .threads
            .iter()
            .filter(|t| !t.is_locked)
            .filter(|t| t.created_at >= query.since)
            .filter(|t| t.reply_count < query.max_replies)
            .cloned()
            .collect();
        threads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        threads.truncate(query.limit);
        Ok(threads)
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post> {
        self.check_write()?;
        let mut tables = self.tables.write();
        let thread = tables
            .threads
            .iter_mut()
            .find(|t| t.id == post.thread_id)
            .ok_or_else(|| {
                Error::store_write(format!("thread {} does not exist", post.thread_id))
            })?;
        thread.reply_count += 1;

        let post = Post {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: post.thread_id,
            author_id: post.author_id,
            body: post.body,
            created_at: post.created_at,
        };
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn thread_posts(&self, thread_id: &str, limit: usize) -> Result<Vec<PostView>> {
        self.check_read()?;
        let tables = self.tables.read();
        let mut posts: Vec<&Post> = tables
            .posts
            .iter()
            .filter(|p| p.thread_id == thread_id)
            .collect();
        posts.sort_by_key(|p| p.created_at);
        let skip = posts.len().saturating_sub(limit);
        Ok(posts
            .into_iter()
            .skip(skip)
            .map(|p| tables.post_view(p))
            .collect())
    }

    async fn last_post(&self, thread_id: &str) -> Result<Option<PostView>> {
        self.check_read()?;
        let tables = self.tables.read();
        // Ties on created_at resolve to the later insert
        let last = tables
            .posts
            .iter()
            .filter(|p| p.thread_id == thread_id)
            .fold(None::<&Post>, |best, p| match best {
                Some(b) if b.created_at > p.created_at => Some(b),
                _ => Some(p),
            });
        Ok(last.map(|p| tables.post_view(p)))
    }

    async fn thread_persona_ids(&self, thread_id: &str) -> Result<Vec<String>> {
        self.check_read()?;
        let tables = self.tables.read();

        let starter = tables
            .threads
            .iter()
            .find(|t| t.id == thread_id)
            .map(|t| t.author_id.as_str());
        let authors = starter.into_iter().chain(
            tables
                .posts
                .iter()
                .filter(|p| p.thread_id == thread_id)
                .map(|p| p.author_id.as_str()),
        );

        let mut ids: Vec<String> = Vec::new();
        for author in authors {
            if let Some(persona_id) = tables.profile(author).and_then(|a| a.persona_id.as_ref()) {
                if !ids.contains(persona_id) {
                    ids.push(persona_id.clone());
                }
            }
        }
        Ok(ids)
    }

    async fn author_activity_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<HashMap<String, AuthorActivity>> {
        self.check_read()?;
        let tables = self.tables.read();
        let mut activity: HashMap<String, AuthorActivity> = HashMap::new();

        for thread in tables.threads.iter().filter(|t| t.created_at >= since) {
            activity.entry(thread.author_id.clone()).or_default().threads += 1;
        }
        for post in tables.posts.iter().filter(|p| p.created_at >= since) {
            activity.entry(post.author_id.clone()).or_default().replies += 1;
        }
        Ok(activity)
    }

    async fn record_conversation(&self, record: ConversationRecord) -> Result<()> {
        self.check_write()?;
        self.tables.write().conversations.push(record);
        Ok(())
    }

    async fn recent_conversations(&self, limit: usize) -> Result<Vec<ConversationRecord>> {
        self.check_read()?;
        let tables = self.tables.read();
        // Later entries win ties on `created_at`
        let mut records: Vec<_> = tables.conversations.iter().rev().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
