//! Conversation orchestrator
//!
//! Composes the selector, topic pool, guard, registry and generator into the
//! three entry points of the engine:
//! - the batch cycle ([`Orchestrator::run_cycle`])
//! - on-demand single actions ([`Orchestrator::seed_thread`], [`Orchestrator::reply`])
//! - batch helpers over many personas or threads
//!
//! Every unit of work catches its own failure. Work items run one at a time
//! with a pause in between.

mod actions;
mod batch;
mod crosspost;
mod cycle;
mod outcome;

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::config::{BatchSettings, EngineConfig, EngineSettings};
use crate::engine::{ConversationGuard, FairnessSelector, TopicPool};
use crate::error::Result;
use crate::generation::ContentGenerator;
use crate::random::RandomSource;
use crate::registry::PersonaRegistry;
use crate::store::ForumStore;

pub use crosspost::{CrossPostPayload, CrossPoster};
pub use outcome::*;

/// Prior posts handed to the generator for a reply.
pub const MAX_PRIOR_POSTS: usize = 20;

pub struct Orchestrator {
    store: Arc<dyn ForumStore>,
    registry: PersonaRegistry,
    selector: FairnessSelector,
    topics: TopicPool,
    guard: ConversationGuard,
    generator: Arc<dyn ContentGenerator>,
    rng: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
    engine: EngineSettings,
    batch: BatchSettings,
    crosspost: Option<CrossPoster>,
}

impl Orchestrator {
    /// Wire the engine components over `store` and `generator`.
    pub fn new(
        config: &EngineConfig,
        store: Arc<dyn ForumStore>,
        generator: Arc<dyn ContentGenerator>,
        rng: Arc<dyn RandomSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let registry = PersonaRegistry::new(
            store.clone(),
            clock.clone(),
            config.store.profile_domain.clone(),
        );
        Ok(Self {
            registry,
            selector: FairnessSelector::new(store.clone(), rng.clone(), config.engine.clone()),
            topics: TopicPool::new(store.clone(), clock.clone()),
            guard: ConversationGuard::new(store.clone(), clock.clone(), &config.engine),
            crosspost: CrossPoster::from_settings(&config.crosspost)?,
            store,
            generator,
            rng,
            clock,
            engine: config.engine.clone(),
            batch: config.batch.clone(),
        })
    }

    pub fn registry(&self) -> &PersonaRegistry {
        &self.registry
    }

    pub fn guard(&self) -> &ConversationGuard {
        &self.guard
    }

    pub fn topics(&self) -> &TopicPool {
        &self.topics
    }

    pub fn generator_name(&self) -> &'static str {
        self.generator.name()
    }

    /// Throttle between work items.
    async fn pause(&self, ms: u64) {
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}
