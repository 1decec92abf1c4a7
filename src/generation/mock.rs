//! Mock generator for testing and offline runs
//!
//! Produces deterministic text from the persona and topic so the engine can
//! run end to end without a model server.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::types::{Persona, TopicSeed};

use super::{ContentGenerator, GeneratedReply, GeneratedThread, PriorPost, ThreadContext};

// ─────────────────────────────────────────────────────────────────
// Mock Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for mock generator behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Simulated latency per call (ms)
    pub latency_ms: u64,

    /// Whether to fail on certain operations
    pub fail_thread: bool,
    pub fail_reply: bool,

    /// Return output that fails validation (empty text)
    pub malformed: bool,

    /// Fixed output (for deterministic testing)
    pub fixed_title: Option<String>,
    pub fixed_body: Option<String>,

    /// Group slug to report instead of the topic/persona default
    pub group: Option<String>,
}

// ─────────────────────────────────────────────────────────────────
// Mock Generator
// ─────────────────────────────────────────────────────────────────

pub struct MockGenerator {
    config: MockConfig,
    call_counts: RwLock<CallCounts>,
}

#[derive(Debug, Default)]
struct CallCounts {
    generate_thread: u32,
    generate_reply: u32,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            call_counts: RwLock::new(CallCounts::default()),
        }
    }

    /// Get the number of times a method was called
    pub fn call_count(&self, method: &str) -> u32 {
        let counts = self.call_counts.read();
        match method {
            "generate_thread" => counts.generate_thread,
            "generate_reply" => counts.generate_reply,
            _ => 0,
        }
    }

    pub fn reset_counts(&self) {
        *self.call_counts.write() = CallCounts::default();
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentGenerator for MockGenerator {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate_thread(
        &self,
        persona: &Persona,
        topic: Option<&TopicSeed>,
    ) -> Result<GeneratedThread> {
        self.call_counts.write().generate_thread += 1;
        self.simulate_latency().await;

        if self.config.fail_thread {
            return Err(Error::generation("mock", "simulated thread generation failure"));
        }
        if self.config.malformed {
            return GeneratedThread {
                title: String::new(),
                body: String::new(),
                group_slug: String::new(),
            }
            .validated();
        }

        let subject = topic
            .map(|t| t.topic.clone())
            .or_else(|| persona.expertise.first().cloned())
            .unwrap_or_else(|| "getting started".to_string());

        let group = self
            .config
            .group
            .clone()
            .or_else(|| topic.and_then(|t| t.group.clone()))
            .or_else(|| persona.preferred_groups.first().cloned())
            .unwrap_or_default();

        let title = self
            .config
            .fixed_title
            .clone()
            .unwrap_or_else(|| format!("Notes on {}", subject));

        let body = self.config.fixed_body.clone().unwrap_or_else(|| {
            let mut body = format!(
                "Hi all, {} here. I have been spending time on {} lately and wanted to \
                 compare notes.",
                persona.name, subject
            );
            if let Some(hint) = topic.and_then(|t| t.prompt_hint.as_deref()) {
                body.push_str(&format!("\n\nSpecifically: {}.", hint));
            }
            if persona.personality.asks_followups {
                body.push_str("\n\nHow are you handling this?");
            }
            body
        });

        GeneratedThread {
            title,
            body,
            group_slug: group,
        }
        .validated()
    }

    async fn generate_reply(
        &self,
        persona: &Persona,
        thread: &ThreadContext,
        prior_posts: &[PriorPost],
    ) -> Result<GeneratedReply> {
        self.call_counts.write().generate_reply += 1;
        self.simulate_latency().await;

        if self.config.fail_reply {
            return Err(Error::generation("mock", "simulated reply generation failure"));
        }
        if self.config.malformed {
            return GeneratedReply {
                body: String::new(),
            }
            .validated();
        }

        let body = self.config.fixed_body.clone().unwrap_or_else(|| {
            match prior_posts.last() {
                Some(last) => format!(
                    "{} here. Building on what {} said about \"{}\": this matches my experience.",
                    persona.name, last.author_name, thread.title
                ),
                None => format!(
                    "{} here. Good question on \"{}\". Here is what worked for me.",
                    persona.name, thread.title
                ),
            }
        });

        GeneratedReply { body }.validated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn persona() -> Persona {
        Persona {
            expertise: vec!["zapier".into()],
            preferred_groups: vec!["automation".into()],
            ..Persona::new("Sam Ortiz", "sam-ortiz", Utc::now())
        }
    }

    fn context() -> ThreadContext {
        ThreadContext {
            title: "Zap keeps timing out".into(),
            body: "body".into(),
            slug: "zap".into(),
        }
    }

    #[tokio::test]
    async fn test_thread_uses_topic_and_group() {
        let generator = MockGenerator::new();
        let seed = TopicSeed::new("Rate limits", Some("help"), Utc::now());

        let thread = generator.generate_thread(&persona(), Some(&seed)).await.unwrap();
        assert_eq!(thread.title, "Notes on Rate limits");
        assert_eq!(thread.group_slug, "help");

        let freeform = generator.generate_thread(&persona(), None).await.unwrap();
        assert_eq!(freeform.title, "Notes on zapier");
        assert_eq!(freeform.group_slug, "automation");

        assert_eq!(generator.call_count("generate_thread"), 2);
        assert_eq!(generator.call_count("generate_reply"), 0);
    }

    #[tokio::test]
    async fn test_reply_mentions_previous_author() {
        let generator = MockGenerator::new();
        let prior = vec![PriorPost {
            author_name: "Lee".into(),
            body: "try a webhook".into(),
        }];
        let reply = generator
            .generate_reply(&persona(), &context(), &prior)
            .await
            .unwrap();
        assert!(reply.body.contains("what Lee said"));
    }

    #[tokio::test]
    async fn test_failure_modes() {
        let failing = MockGenerator::with_config(MockConfig {
            fail_thread: true,
            fail_reply: true,
            ..Default::default()
        });
        assert!(matches!(
            failing.generate_thread(&persona(), None).await,
            Err(Error::GenerationFailed { .. })
        ));
        assert!(matches!(
            failing.generate_reply(&persona(), &context(), &[]).await,
            Err(Error::GenerationFailed { .. })
        ));

        let malformed = MockGenerator::with_config(MockConfig {
            malformed: true,
            ..Default::default()
        });
        assert!(matches!(
            malformed.generate_reply(&persona(), &context(), &[]).await,
            Err(Error::GenerationMalformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_reset_counts() {
        let generator = MockGenerator::new();
        generator.generate_thread(&persona(), None).await.unwrap();
        generator.reset_counts();
        assert_eq!(generator.call_count("generate_thread"), 0);
    }
}
