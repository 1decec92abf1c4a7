//! Common test utilities and fixtures
//!
//! An orchestrator over the in-memory store, wired to the mock generator, a
//! manual clock and scripted randomness.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use persona_engine::clock::{Clock, ManualClock};
use persona_engine::config::EngineConfig;
use persona_engine::generation::{MockConfig, MockGenerator};
use persona_engine::random::{RandomSource, SequenceRandom};
use persona_engine::store::{ForumStore, MemoryStore};
use persona_engine::types::{
    ActivityLevel, NewPost, NewThread, Persona, Post, Profile, Thread, TopicSeed, WorkflowConfig,
};
use persona_engine::Orchestrator;

/// Get the path to the test fixtures directory
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Get a path to a specific fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap()
}

/// Defaults with every pause switched off.
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.generator.provider = "mock".into();
    config.engine.unit_delay_ms = 0;
    config.batch.batch_delay_ms = 0;
    config.batch.run_all_delay_ms = 0;
    config
}

pub struct Fixture {
    pub orchestrator: Orchestrator,
    pub store: Arc<MemoryStore>,
    pub generator: Arc<MockGenerator>,
    pub clock: Arc<ManualClock>,
}

impl Fixture {
    /// Default config, well-behaved generator, every draw returns 0.0.
    pub fn new() -> Self {
        Self::with(test_config(), MockConfig::default(), SequenceRandom::constant(0.0))
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with(config, MockConfig::default(), SequenceRandom::constant(0.0))
    }

    pub fn with_mock(mock: MockConfig) -> Self {
        Self::with(test_config(), mock, SequenceRandom::constant(0.0))
    }

    pub fn with(config: EngineConfig, mock: MockConfig, rng: impl RandomSource + 'static) -> Self {
        let store = Arc::new(MemoryStore::new());
        let generator = Arc::new(MockGenerator::with_config(mock));
        let clock = Arc::new(ManualClock::new(start_time()));
        let orchestrator = Orchestrator::new(
            &config,
            store.clone(),
            generator.clone(),
            Arc::new(rng),
            clock.clone(),
        )
        .unwrap();

        Self {
            orchestrator,
            store,
            generator,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ─────────────────────────────────────────────────────────────
    // Records
    // ─────────────────────────────────────────────────────────────

    /// Active persona with a backing profile.
    pub async fn add_persona(&self, slug: &str, level: ActivityLevel) -> Persona {
        let persona = Persona {
            activity_level: level,
            ..Persona::new(capitalize(slug), slug, start_time() - Duration::days(30))
        };
        let (persona, _) = self
            .orchestrator
            .registry()
            .create_persona(persona)
            .await
            .unwrap();
        persona
    }

    pub async fn add_persona_with_workflow(&self, slug: &str, workflow: WorkflowConfig) -> Persona {
        let persona = self.add_persona(slug, ActivityLevel::High).await;
        self.orchestrator
            .registry()
            .update_workflow_config(&persona.id, Some(workflow))
            .await
            .unwrap()
    }

    pub async fn profile_of(&self, persona: &Persona) -> Profile {
        self.orchestrator
            .registry()
            .resolve_profile(persona)
            .await
            .unwrap()
    }

    /// A human forum member.
    pub async fn add_member(&self, name: &str) -> Profile {
        self.store
            .insert_profile(Profile::member(
                name,
                format!("{}@members.example.com", name.to_lowercase()),
                self.now(),
            ))
            .await
            .unwrap()
    }

    pub async fn add_topic(&self, topic: &str, group: Option<&str>) -> TopicSeed {
        self.store
            .insert_topic_seed(TopicSeed::new(topic, group, start_time() - Duration::days(1)))
            .await
            .unwrap()
    }

    pub async fn add_thread(&self, author: &Profile, title: &str) -> Thread {
        let thread = self
            .store
            .insert_thread(NewThread {
                title: title.to_string(),
                body: format!("{} - opening post", title),
                slug: format!("{}-{}", persona_engine::types::slugify(title), uuid::Uuid::new_v4()),
                group: "general".into(),
                author_id: author.id.clone(),
                created_at: self.now(),
            })
            .await
            .unwrap();
        self.clock.advance(Duration::minutes(1));
        thread
    }

    /// Post as `author`; the clock moves one minute so posts stay ordered.
    pub async fn add_post(&self, thread: &Thread, author: &Profile, body: &str) -> Post {
        let post = self
            .store
            .insert_post(NewPost {
                thread_id: thread.id.clone(),
                author_id: author.id.clone(),
                body: body.to_string(),
                created_at: self.now(),
            })
            .await
            .unwrap();
        self.clock.advance(Duration::minutes(1));
        post
    }

    pub async fn thread(&self, id: &str) -> Thread {
        self.store.get_thread(id).await.unwrap().unwrap()
    }

    pub async fn persona(&self, id: &str) -> Persona {
        self.store.get_persona(id).await.unwrap().unwrap()
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
