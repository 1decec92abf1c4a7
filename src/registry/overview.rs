//! Workflow overview returned by `GET /api/personas/workflows`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{ActivityLevel, AuthorActivity, Persona, WorkflowConfig};

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOverview {
    pub generated_at: DateTime<Utc>,
    pub window_days: i64,
    pub personas: Vec<PersonaOverview>,
}

/// One persona with its workflow config and recent counts.
#[derive(Debug, Clone, Serialize)]
pub struct PersonaOverview {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub role: Option<String>,
    pub expertise: Vec<String>,
    pub preferred_groups: Vec<String>,
    pub is_active: bool,
    pub activity_level: ActivityLevel,
    pub thread_count: u32,
    pub reply_count: u32,
    pub last_active_at: Option<DateTime<Utc>>,
    pub workflow_config: Option<WorkflowConfig>,
    pub profile_id: Option<String>,
    pub weekly_threads: u32,
    pub weekly_replies: u32,
}

impl PersonaOverview {
    pub(crate) fn new(
        persona: Persona,
        profile_id: Option<String>,
        recent: AuthorActivity,
    ) -> Self {
        Self {
            id: persona.id,
            name: persona.name,
            slug: persona.slug,
            role: persona.role,
            expertise: persona.expertise,
            preferred_groups: persona.preferred_groups,
            is_active: persona.is_active,
            activity_level: persona.activity_level,
            thread_count: persona.thread_count,
            reply_count: persona.reply_count,
            last_active_at: persona.last_active_at,
            workflow_config: persona.workflow_config,
            profile_id,
            weekly_threads: recent.threads,
            weekly_replies: recent.replies,
        }
    }
}
