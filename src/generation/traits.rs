//! Content generation port
//!
//! Natural-language generation is external. The engine hands the generator
//! read-only persona and thread data and receives plain text back; it never
//! depends on how the text is produced.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Persona, PostView, Thread, TopicSeed};

/// Thread body characters shown to the generator.
pub const THREAD_CONTEXT_CHARS: usize = 500;

/// Characters of each prior post shown to the generator.
pub const PRIOR_POST_CHARS: usize = 300;

/// Longest title accepted from a generator.
pub const MAX_TITLE_CHARS: usize = 200;

// ─────────────────────────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────────────────────────

/// The thread being replied to, trimmed for the prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadContext {
    pub title: String,
    pub body: String,
    pub slug: String,
}

impl ThreadContext {
    pub fn from_thread(thread: &Thread) -> Self {
        Self {
            title: thread.title.clone(),
            body: truncate_chars(&thread.body, THREAD_CONTEXT_CHARS),
            slug: thread.slug.clone(),
        }
    }
}

/// One earlier post of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorPost {
    pub author_name: String,
    pub body: String,
}

impl From<&PostView> for PriorPost {
    fn from(post: &PostView) -> Self {
        Self {
            author_name: post.author_name.clone(),
            body: truncate_chars(&post.body, PRIOR_POST_CHARS),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Outputs
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedThread {
    pub title: String,
    pub body: String,
    /// Group the generator chose; empty means "let the engine decide"
    #[serde(default)]
    pub group_slug: String,
}

impl GeneratedThread {
    /// Trim and reject output that cannot be posted.
    pub fn validated(self) -> Result<Self> {
        let title = self.title.trim();
        let body = self.body.trim();
        if title.is_empty() {
            return Err(Error::malformed("generated thread has an empty title"));
        }
        if body.is_empty() {
            return Err(Error::malformed("generated thread has an empty body"));
        }
        Ok(Self {
            title: truncate_chars(title, MAX_TITLE_CHARS),
            body: body.to_string(),
            group_slug: self.group_slug.trim().to_lowercase(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedReply {
    pub body: String,
}

impl GeneratedReply {
    pub fn validated(self) -> Result<Self> {
        let body = self.body.trim();
        if body.is_empty() {
            return Err(Error::malformed("generated reply is empty"));
        }
        Ok(Self {
            body: body.to_string(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────
// ContentGenerator Trait
// ─────────────────────────────────────────────────────────────────

/// External text generation.
///
/// Inputs are read-only. Failures are ordinary errors and stay inside the
/// unit of work that asked.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Provider name used in logs and errors
    fn name(&self) -> &'static str;

    /// Opening post for a new thread by `persona`, about `topic` when given.
    async fn generate_thread(
        &self,
        persona: &Persona,
        topic: Option<&TopicSeed>,
    ) -> Result<GeneratedThread>;

    /// Reply by `persona` to `thread`, given the conversation so far.
    async fn generate_reply(
        &self,
        persona: &Persona,
        thread: &ThreadContext,
        prior_posts: &[PriorPost],
    ) -> Result<GeneratedReply>;
}

/// First `max` characters of `text`, on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
