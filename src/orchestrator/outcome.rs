//! Result shapes returned by the orchestrator and serialized by the triggers.

use serde::Serialize;

use crate::error::Error;
use crate::generation::truncate_chars;

/// Characters of a reply echoed back as a preview.
pub const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadRef {
    pub id: String,
    pub slug: String,
    pub title: String,
}

/// A thread seeded by a persona.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedOutcome {
    /// Persona display name
    pub persona: String,
    pub persona_id: String,
    pub thread: ThreadRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
}

/// A reply posted by a persona.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyOutcome {
    pub persona: String,
    pub persona_id: String,
    pub thread_id: String,
    pub post_id: String,
    pub preview: String,
}

impl ReplyOutcome {
    pub(crate) fn preview_of(body: &str) -> String {
        truncate_chars(body, PREVIEW_CHARS)
    }
}

// ─────────────────────────────────────────────────────────────────
// Batch Cycle
// ─────────────────────────────────────────────────────────────────

/// Summary of one batch cycle. Always produced, whatever failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleSummary {
    pub threads_seeded: u32,
    pub replies_made: u32,
    /// One line per seeded thread
    pub threads: Vec<String>,
    /// One line per reply
    pub replies: Vec<String>,
    pub errors: Vec<String>,
}

impl CycleSummary {
    pub(crate) fn record_thread(&mut self, outcome: &SeedOutcome) {
        self.threads_seeded += 1;
        self.threads.push(format!(
            "{}: \"{}\" -> /forum/{}",
            outcome.persona, outcome.thread.title, outcome.thread.slug
        ));
    }

    pub(crate) fn record_reply(&mut self, outcome: &ReplyOutcome, thread_title: &str) {
        self.replies_made += 1;
        self.replies.push(format!(
            "{} replied to \"{}\"",
            outcome.persona,
            truncate_chars(thread_title, 50)
        ));
    }

    pub(crate) fn record_error(&mut self, context: &str, error: &Error) {
        self.errors.push(format!("{}: {}", context, error.format_for_log()));
    }

    /// "N threads seeded, M replies generated"
    pub fn headline(&self) -> String {
        format!(
            "{} threads seeded, {} replies generated",
            self.threads_seeded, self.replies_made
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Batch Helpers
// ─────────────────────────────────────────────────────────────────

/// One entry of a `run_persona` result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RunStep {
    Thread(SeedOutcome),
    Reply(ReplyOutcome),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunPersonaReport {
    pub success: bool,
    pub persona: String,
    pub results: Vec<RunStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonaRunResult {
    pub persona: String,
    pub success: bool,
    /// Title of the created thread
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
    /// Persona that answered the new thread, when a reply was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunAllReport {
    pub success: bool,
    pub ran: u32,
    pub failed: u32,
    pub results: Vec<PersonaRunResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchThreadResult {
    pub persona_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchThreadsReport {
    pub success: bool,
    pub created: u32,
    pub results: Vec<BatchThreadResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReplyResult {
    pub thread_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRepliesReport {
    pub success: bool,
    pub replied: u32,
    pub results: Vec<BatchReplyResult>,
}
