//! Conversation guard: depth, lock and anti-echo data.

use std::sync::Arc;

use chrono::Duration;
use tracing::debug;

use crate::clock::Clock;
use crate::config::EngineSettings;
use crate::error::{Error, Result};
use crate::store::{ForumStore, RecentThreadQuery};
use crate::types::Thread;

/// Answers whether a thread may receive another persona reply.
///
/// The guard only reports; enforcing anti-echo is the orchestrator's job.
pub struct ConversationGuard {
    store: Arc<dyn ForumStore>,
    clock: Arc<dyn Clock>,
    max_depth: u32,
    reply_window: Duration,
    reply_max_existing: u32,
}

impl ConversationGuard {
    pub fn new(
        store: Arc<dyn ForumStore>,
        clock: Arc<dyn Clock>,
        settings: &EngineSettings,
    ) -> Self {
        Self {
            store,
            clock,
            max_depth: settings.max_conversation_depth,
            reply_window: Duration::hours(settings.reply_window_hours),
            reply_max_existing: settings.reply_max_existing,
        }
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Fetch a thread or fail with `ThreadNotFound`.
    pub async fn thread(&self, thread_id: &str) -> Result<Thread> {
        self.store
            .get_thread(thread_id)
            .await?
            .ok_or_else(|| Error::ThreadNotFound {
                thread_id: thread_id.to_string(),
            })
    }

    /// Why `thread` may not get another reply, if it may not.
    pub fn rejection(&self, thread: &Thread) -> Option<Error> {
        if thread.is_locked {
            return Some(Error::ThreadLocked {
                thread_id: thread.id.clone(),
            });
        }
        if thread.reply_count >= self.max_depth {
            return Some(Error::DepthReached {
                thread_id: thread.id.clone(),
                max_depth: self.max_depth,
            });
        }
        None
    }

    /// False when the thread is locked or already at max depth.
    pub async fn should_respond(&self, thread_id: &str) -> Result<bool> {
        let thread = self.thread(thread_id).await?;
        let verdict = self.rejection(&thread);
        if let Some(ref reason) = verdict {
            debug!(thread_id, reason = %reason, "Thread does not take replies");
        }
        Ok(verdict.is_none())
    }

    /// Whether the most recent post came from a persona-controlled profile.
    /// A thread with no replies yet is `false`.
    pub async fn last_reply_is_from_persona(&self, thread_id: &str) -> Result<bool> {
        Ok(self
            .store
            .last_post(thread_id)
            .await?
            .map_or(false, |post| post.author_is_persona))
    }

    /// Personas that started or replied to the thread.
    pub async fn thread_persona_ids(&self, thread_id: &str) -> Result<Vec<String>> {
        self.store.thread_persona_ids(thread_id).await
    }

    /// Recent unlocked threads with few replies, newest first.
    pub async fn threads_needing_replies(&self, limit: usize) -> Result<Vec<Thread>> {
        let query = RecentThreadQuery {
            since: self.clock.now() - self.reply_window,
            max_replies: self.reply_max_existing.min(self.max_depth),
            limit,
        };
        self.store.recent_threads(&query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use crate::types::{NewPost, NewThread, Persona, Profile};
    use chrono::{TimeZone, Utc};

    struct Fixture {
        guard: ConversationGuard,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
    }

    fn fixture(max_depth: u32) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 3, 12, 0, 0).unwrap(),
        ));
        let settings = EngineSettings {
            max_conversation_depth: max_depth,
            ..Default::default()
        };
        Fixture {
            guard: ConversationGuard::new(store.clone(), clock.clone(), &settings),
            store,
            clock,
        }
    }

    impl Fixture {
        async fn thread(&self, slug: &str, age_hours: i64) -> Thread {
            self.store
                .insert_thread(NewThread {
                    title: slug.into(),
                    body: "body".into(),
                    slug: slug.into(),
                    group: "general".into(),
                    author_id: "human".into(),
                    created_at: self.clock.now() - Duration::hours(age_hours),
                })
                .await
                .unwrap()
        }

        async fn reply(&self, thread: &Thread, author: &str) {
            self.store
                .insert_post(NewPost {
                    thread_id: thread.id.clone(),
                    author_id: author.into(),
                    body: "reply".into(),
                    created_at: self.clock.now(),
                })
                .await
                .unwrap();
            self.clock.advance(Duration::seconds(1));
        }
    }

    #[tokio::test]
    async fn test_fresh_thread_should_respond() {
        let fx = fixture(20);
        let thread = fx.thread("fresh", 1).await;
        assert!(fx.guard.should_respond(&thread.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let fx = fixture(3);
        let thread = fx.thread("deep", 1).await;
        for _ in 0..2 {
            fx.reply(&thread, "human").await;
        }
        assert!(fx.guard.should_respond(&thread.id).await.unwrap());

        fx.reply(&thread, "human").await;
        assert!(!fx.guard.should_respond(&thread.id).await.unwrap());

        let stored = fx.guard.thread(&thread.id).await.unwrap();
        assert!(matches!(
            fx.guard.rejection(&stored),
            Some(Error::DepthReached { max_depth: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_locked_thread() {
        let fx = fixture(20);
        let thread = fx.thread("locked", 1).await;
        fx.store.set_thread_locked(&thread.id, true).await.unwrap();
        assert!(!fx.guard.should_respond(&thread.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_thread() {
        let fx = fixture(20);
        let err = fx.guard.should_respond("nope").await.unwrap_err();
        assert!(matches!(err, Error::ThreadNotFound { .. }));
    }

    #[tokio::test]
    async fn test_last_reply_is_from_persona() {
        let fx = fixture(20);
        let persona = fx
            .store
            .insert_persona(Persona::new("Bot", "bot", fx.clock.now()))
            .await
            .unwrap();
        let profile = fx
            .store
            .insert_profile(Profile {
                is_persona_controlled: true,
                persona_id: Some(persona.id.clone()),
                ..Profile::member("Bot", "persona-bot@forum.test", fx.clock.now())
            })
            .await
            .unwrap();
        let human = fx
            .store
            .insert_profile(Profile::member("Hu", "hu@forum.test", fx.clock.now()))
            .await
            .unwrap();

        let thread = fx.thread("echo", 1).await;
        assert!(!fx.guard.last_reply_is_from_persona(&thread.id).await.unwrap());

        fx.reply(&thread, &profile.id).await;
        assert!(fx.guard.last_reply_is_from_persona(&thread.id).await.unwrap());

        fx.reply(&thread, &human.id).await;
        assert!(!fx.guard.last_reply_is_from_persona(&thread.id).await.unwrap());

        let ids = fx.guard.thread_persona_ids(&thread.id).await.unwrap();
        assert_eq!(ids, vec![persona.id]);
    }

    #[tokio::test]
    async fn test_threads_needing_replies() {
        let fx = fixture(20);
        let old = fx.thread("old", 72).await;
        let busy = fx.thread("busy", 2).await;
        let quiet = fx.thread("quiet", 3).await;
        let newest = fx.thread("newest", 1).await;
        for _ in 0..3 {
            fx.reply(&busy, "human").await;
        }

        let ids: Vec<String> = fx
            .guard
            .threads_needing_replies(10)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![newest.id, quiet.id]);
        assert!(!ids.contains(&old.id));
    }
}
