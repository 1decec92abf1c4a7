//! Topic seed rotation.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::store::ForumStore;
use crate::types::{NewTopicSeed, TopicSeed};

/// Priority of a seed added without one.
pub const DEFAULT_TOPIC_PRIORITY: i32 = 5;

/// Candidate topics per group, least used first.
pub struct TopicPool {
    store: Arc<dyn ForumStore>,
    clock: Arc<dyn Clock>,
}

/// Rotation order: lowest `used_count`, then highest `priority`, then the
/// newest seed, then id. Total, so the pick is deterministic.
fn rotation_order(a: &TopicSeed, b: &TopicSeed) -> Ordering {
    a.used_count
        .cmp(&b.used_count)
        .then_with(|| b.priority.cmp(&a.priority))
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

impl TopicPool {
    pub fn new(store: Arc<dyn ForumStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Next seed for `group`. Seeds with that group affinity are preferred;
    /// if there are none, every seed is a candidate.
    pub async fn pick_topic_seed(&self, group: Option<&str>) -> Result<Option<TopicSeed>> {
        let mut candidates = match group {
            Some(g) => self.store.list_topic_seeds(Some(g)).await?,
            None => Vec::new(),
        };
        if candidates.is_empty() {
            candidates = self.store.list_topic_seeds(None).await?;
        }

        let seed = candidates.into_iter().min_by(rotation_order);
        debug!(
            group = group.unwrap_or("-"),
            topic = seed.as_ref().map(|s| s.id.as_str()),
            "Topic seed picked"
        );
        Ok(seed)
    }

    /// Add a seed to the pool. The topic must not be blank; blank group and
    /// hint are treated as absent.
    pub async fn add_topic_seed(&self, new: NewTopicSeed) -> Result<TopicSeed> {
        let topic = new.topic.trim();
        if topic.is_empty() {
            return Err(Error::bad_request("Topic is required"));
        }
        let non_blank = |v: Option<String>| {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let seed = TopicSeed {
            prompt_hint: non_blank(new.prompt_hint),
            priority: new.priority.unwrap_or(DEFAULT_TOPIC_PRIORITY),
            group: non_blank(new.group),
            ..TopicSeed::new(topic, None, self.clock.now())
        };
        let seed = self.store.insert_topic_seed(seed).await?;
        info!(
            topic = %seed.id,
            group = seed.group.as_deref().unwrap_or("-"),
            priority = seed.priority,
            "Topic seed added"
        );
        Ok(seed)
    }

    /// All seeds in rotation order.
    pub async fn list(&self) -> Result<Vec<TopicSeed>> {
        let mut seeds = self.store.list_topic_seeds(None).await?;
        seeds.sort_by(rotation_order);
        Ok(seeds)
    }

    /// Count one use of seed `id`, observed at `previous_used_count`.
    ///
    /// Returns `false` (and logs) when another writer got there first; the
    /// stale increment is dropped rather than applied twice.
    pub async fn mark_topic_used(&self, id: &str, previous_used_count: u32) -> Result<bool> {
        let applied = self
            .store
            .increment_topic_usage(id, previous_used_count, self.clock.now())
            .await?;
        if applied {
            debug!(topic = %id, used_count = previous_used_count + 1, "Topic seed marked used");
        } else {
            warn!(
                topic = %id,
                observed = previous_used_count,
                "Topic usage changed concurrently, increment skipped"
            );
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).unwrap()
    }

    fn seed(topic: &str, group: Option<&str>, used: u32, priority: i32, day: u32) -> TopicSeed {
        TopicSeed {
            used_count: used,
            priority,
            ..TopicSeed::new(topic, group, at(day))
        }
    }

    async fn pool(seeds: Vec<TopicSeed>) -> (TopicPool, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        for s in seeds {
            store.insert_topic_seed(s).await.unwrap();
        }
        let clock = Arc::new(ManualClock::new(at(20)));
        (TopicPool::new(store.clone(), clock), store)
    }

    #[tokio::test]
    async fn test_empty_pool() {
        let (pool, _) = pool(vec![]).await;
        assert!(pool.pick_topic_seed(Some("help")).await.unwrap().is_none());
        assert!(pool.pick_topic_seed(None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lowest_usage_wins() {
        let (pool, _) = pool(vec![
            seed("worn", None, 4, 9, 1),
            seed("fresh", None, 0, 0, 1),
        ])
        .await;
        assert_eq!(pool.pick_topic_seed(None).await.unwrap().unwrap().topic, "fresh");
    }

    #[tokio::test]
    async fn test_tie_break_priority_then_newest() {
        let (pool, _) = pool(vec![
            seed("old-low", None, 1, 0, 1),
            seed("old-high", None, 1, 5, 1),
            seed("new-high", None, 1, 5, 9),
        ])
        .await;
        assert_eq!(pool.pick_topic_seed(None).await.unwrap().unwrap().topic, "new-high");
    }

    #[tokio::test]
    async fn test_group_preferred_with_fallback() {
        let (pool, _) = pool(vec![
            seed("general", None, 0, 0, 1),
            seed("help-topic", Some("help"), 3, 0, 1),
        ])
        .await;

        let picked = pool.pick_topic_seed(Some("help")).await.unwrap().unwrap();
        assert_eq!(picked.topic, "help-topic");

        // No seed for this group: any seed will do
        let picked = pool.pick_topic_seed(Some("showcase")).await.unwrap().unwrap();
        assert_eq!(picked.topic, "general");
    }

    #[tokio::test]
    async fn test_mark_used_counts_each_use() {
        let (pool, store) = pool(vec![seed("t", None, 2, 0, 1)]).await;
        let id = store.snapshot().topic_seeds[0].id.clone();

        for n in 0..3 {
            let current = pool.pick_topic_seed(None).await.unwrap().unwrap();
            assert_eq!(current.used_count, 2 + n);
            assert!(pool.mark_topic_used(&id, current.used_count).await.unwrap());
        }

        let stored = store.get_topic_seed(&id).await.unwrap().unwrap();
        assert_eq!(stored.used_count, 5);
        assert_eq!(stored.last_used_at, Some(at(20)));
    }

    #[tokio::test]
    async fn test_stale_mark_is_noop() {
        let (pool, store) = pool(vec![seed("t", None, 0, 0, 1)]).await;
        let id = store.snapshot().topic_seeds[0].id.clone();

        assert!(pool.mark_topic_used(&id, 0).await.unwrap());
        assert!(!pool.mark_topic_used(&id, 0).await.unwrap());
        assert_eq!(store.get_topic_seed(&id).await.unwrap().unwrap().used_count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_stale_marks_land_once() {
        let (pool, store) = pool(vec![seed("t", None, 7, 0, 1)]).await;
        let id = store.snapshot().topic_seeds[0].id.clone();
        let pool = Arc::new(pool);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                let id = id.clone();
                tokio::spawn(async move { pool.mark_topic_used(&id, 7).await.unwrap() })
            })
            .collect();

        let mut landed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                landed += 1;
            }
        }

        assert_eq!(landed, 1);
        assert_eq!(store.get_topic_seed(&id).await.unwrap().unwrap().used_count, 8);
    }

    #[tokio::test]
    async fn test_add_seed_defaults() {
        let (pool, store) = pool(vec![]).await;
        let added = pool
            .add_topic_seed(NewTopicSeed {
                topic: "  Webhook retries  ".into(),
                group: Some("integrations".into()),
                prompt_hint: Some("   ".into()),
                priority: None,
            })
            .await
            .unwrap();

        assert_eq!(added.topic, "Webhook retries");
        assert_eq!(added.group.as_deref(), Some("integrations"));
        assert_eq!(added.prompt_hint, None);
        assert_eq!(added.priority, DEFAULT_TOPIC_PRIORITY);
        assert_eq!(added.used_count, 0);
        assert_eq!(added.created_at, at(20));
        assert_eq!(store.snapshot().topic_seeds.len(), 1);
    }

    #[tokio::test]
    async fn test_add_seed_requires_topic() {
        let (pool, store) = pool(vec![]).await;
        let err = pool
            .add_topic_seed(NewTopicSeed {
                topic: " ".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
        assert!(store.snapshot().topic_seeds.is_empty());
    }

    #[tokio::test]
    async fn test_added_seed_enters_rotation() {
        let (pool, _) = pool(vec![seed("used", None, 1, 9, 1)]).await;
        pool.add_topic_seed(NewTopicSeed {
            topic: "brand new".into(),
            priority: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();

        assert_eq!(pool.pick_topic_seed(None).await.unwrap().unwrap().topic, "brand new");
        let listed: Vec<String> = pool.list().await.unwrap().into_iter().map(|s| s.topic).collect();
        assert_eq!(listed, vec!["brand new", "used"]);
    }
}
