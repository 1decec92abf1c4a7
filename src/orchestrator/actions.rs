//! Single units of work: seed one thread, post one reply.

use tracing::{debug, info, warn};

use super::{Orchestrator, ReplyOutcome, SeedOutcome, ThreadRef, MAX_PRIOR_POSTS, PREVIEW_CHARS};
use crate::error::{Error, Result};
use crate::generation::{truncate_chars, PriorPost, ThreadContext};
use crate::random::pick;
use crate::types::{
    thread_slug, ActivityKind, ConversationRecord, NewPost, NewThread, Persona, Thread,
};

/// Fallback group when neither generator, topic nor persona names one.
const DEFAULT_GROUP: &str = "general";

/// Insert attempts before a slug conflict is reported.
const SLUG_ATTEMPTS: usize = 3;

impl Orchestrator {
    // ─────────────────────────────────────────────────────────────
    // On-demand Actions
    // ─────────────────────────────────────────────────────────────

    /// Seed a thread as `persona_id`, or as one persona drawn uniformly from
    /// the least recently active. Admission is not applied here.
    pub async fn seed_thread(&self, persona_id: Option<&str>) -> Result<SeedOutcome> {
        let persona = match persona_id {
            Some(id) => self.registry.get(id).await?,
            None => self
                .selector
                .select_any(self.engine.on_demand_sample_size)
                .await?
                .ok_or_else(|| Error::no_persona("No active personas"))?,
        };
        self.seed_as(&persona).await
    }

    /// Reply to `thread_id` as `persona_id`, or as the best-ranked persona
    /// not yet in the thread. Lock, depth and anti-echo always apply.
    pub async fn reply(&self, thread_id: &str, persona_id: Option<&str>) -> Result<ReplyOutcome> {
        let thread = self.reply_target(thread_id).await?;
        let in_thread = self.guard.thread_persona_ids(&thread.id).await?;

        let persona = match persona_id {
            Some(id) => {
                let persona = self.registry.get(id).await?;
                if in_thread.contains(&persona.id) {
                    return Err(Error::AlreadyParticipated {
                        persona: persona.name,
                        thread_id: thread.id,
                    });
                }
                persona
            }
            None => self
                .selector
                .select_for_reply(&thread.title, &thread.body, &in_thread)
                .await?
                .ok_or_else(|| Error::no_persona("No suitable persona found for this thread"))?,
        };

        self.reply_as(&thread, &persona).await
    }

    // ─────────────────────────────────────────────────────────────
    // Units
    // ─────────────────────────────────────────────────────────────

    /// The thread, if it may take another persona reply right now.
    pub(crate) async fn reply_target(&self, thread_id: &str) -> Result<Thread> {
        let thread = self.guard.thread(thread_id).await?;
        if let Some(rejection) = self.guard.rejection(&thread) {
            return Err(rejection);
        }
        if self.guard.last_reply_is_from_persona(&thread.id).await? {
            return Err(Error::EchoBlocked { thread_id: thread.id });
        }
        Ok(thread)
    }

    /// Seed one thread as `persona`: resolve profile, pick a topic for one of
    /// its groups, generate, persist, then record usage and activity.
    pub(crate) async fn seed_as(&self, persona: &Persona) -> Result<SeedOutcome> {
        let profile = self.registry.resolve_profile(persona).await?;
        let group = pick(self.rng.as_ref(), &persona.preferred_groups).cloned();
        let topic = self.topics.pick_topic_seed(group.as_deref()).await?;

        let generated = self
            .generator
            .generate_thread(persona, topic.as_ref())
            .await?;

        let group = [
            Some(generated.group_slug.clone()),
            topic.as_ref().and_then(|t| t.group.clone()),
            group,
        ]
        .into_iter()
        .flatten()
        .find(|g| !g.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_GROUP.to_string());

        let thread = self
            .insert_thread(NewThread {
                title: generated.title,
                body: generated.body,
                slug: String::new(),
                group,
                author_id: profile.id,
                created_at: self.clock.now(),
            })
            .await?;

        if let Some(ref seed) = topic {
            if let Err(e) = self.topics.mark_topic_used(&seed.id, seed.used_count).await {
                warn!(topic = %seed.id, error = %e, "Failed to record topic usage");
            }
        }
        self.note_activity(persona, ActivityKind::CreatedThread).await;
        self.log_conversation(
            persona,
            ActivityKind::CreatedThread,
            &thread.id,
            None,
            &thread.title,
        )
        .await;

        if let Some(ref poster) = self.crosspost {
            poster.announce(persona, &thread, self.clock.now()).await;
        }

        info!(
            persona = %persona.slug,
            thread_id = %thread.id,
            topic_id = topic.as_ref().map(|t| t.id.as_str()),
            group = %thread.group,
            "Thread seeded"
        );

        Ok(SeedOutcome {
            persona: persona.name.clone(),
            persona_id: persona.id.clone(),
            thread: ThreadRef {
                id: thread.id,
                slug: thread.slug,
                title: thread.title,
            },
            topic_id: topic.map(|t| t.id),
        })
    }

    /// Post one reply to `thread` as `persona`. Callers run the guard first.
    pub(crate) async fn reply_as(
        &self,
        thread: &Thread,
        persona: &Persona,
    ) -> Result<ReplyOutcome> {
        let profile = self.registry.resolve_profile(persona).await?;

        let posts = self.store.thread_posts(&thread.id, MAX_PRIOR_POSTS).await?;
        let prior: Vec<PriorPost> = posts.iter().map(PriorPost::from).collect();

        let generated = self
            .generator
            .generate_reply(persona, &ThreadContext::from_thread(thread), &prior)
            .await?;

        let post = self
            .store
            .insert_post(NewPost {
                thread_id: thread.id.clone(),
                author_id: profile.id,
                body: generated.body,
                created_at: self.clock.now(),
            })
            .await?;

        self.note_activity(persona, ActivityKind::Replied).await;
        self.log_conversation(
            persona,
            ActivityKind::Replied,
            &thread.id,
            Some(&post.id),
            &post.body,
        )
        .await;

        info!(
            persona = %persona.slug,
            thread_id = %thread.id,
            post_id = %post.id,
            "Reply posted"
        );

        Ok(ReplyOutcome {
            persona: persona.name.clone(),
            persona_id: persona.id.clone(),
            thread_id: thread.id.clone(),
            post_id: post.id,
            preview: ReplyOutcome::preview_of(&post.body),
        })
    }

    /// Recent entries of the persona activity log, newest first.
    pub async fn recent_activity(&self, limit: usize) -> Result<Vec<ConversationRecord>> {
        self.store.recent_conversations(limit).await
    }

    /// Insert with a time-based slug; on collision retry with a random suffix.
    async fn insert_thread(&self, mut thread: NewThread) -> Result<Thread> {
        let base = thread_slug(&thread.title, thread.created_at);
        thread.slug = base.clone();

        let mut attempt = 1;
        loop {
            match self.store.insert_thread(thread.clone()).await {
                Err(Error::SlugConflict { slug }) if attempt < SLUG_ATTEMPTS => {
                    attempt += 1;
                    let suffix = (self.rng.next_f64() * 65_536.0) as u32;
                    thread.slug = format!("{}-{:04x}", base, suffix);
                    debug!(taken = %slug, retry = %thread.slug, "Slug taken, retrying");
                }
                other => return other,
            }
        }
    }

    /// Stamp `last_active_at` after a successful post. The post stands even
    /// if this fails.
    async fn note_activity(&self, persona: &Persona, kind: ActivityKind) {
        if let Err(e) = self.registry.record_activity(&persona.id, kind).await {
            warn!(
                persona = %persona.slug,
                activity = %kind,
                error = %e,
                "Failed to record persona activity"
            );
        }
    }

    /// Append to the activity log. Best-effort like `note_activity`.
    async fn log_conversation(
        &self,
        persona: &Persona,
        action: ActivityKind,
        thread_id: &str,
        post_id: Option<&str>,
        content: &str,
    ) {
        let record = ConversationRecord {
            id: uuid::Uuid::new_v4().to_string(),
            persona_id: persona.id.clone(),
            persona_name: persona.name.clone(),
            action,
            thread_id: thread_id.to_string(),
            post_id: post_id.map(str::to_string),
            content_preview: truncate_chars(content, PREVIEW_CHARS),
            created_at: self.clock.now(),
        };
        if let Err(e) = self.store.record_conversation(record).await {
            warn!(persona = %persona.slug, error = %e, "Failed to log persona conversation");
        }
    }
}
