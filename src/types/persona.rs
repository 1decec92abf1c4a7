//! Persona records and their activity metadata.
//!
//! A persona is a synthetic, scheduled forum participant. Its traits feed the
//! content generator, its activity metadata feeds the fairness selector.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────
// Activity Level
// ─────────────────────────────────────────────────────────────────

/// How often a persona should be admitted when it is drawn for a new thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Low,
    Moderate,
    High,
}

impl ActivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::Low => "low",
            ActivityLevel::Moderate => "moderate",
            ActivityLevel::High => "high",
        }
    }

    /// Ranking bonus used by reply selection.
    pub fn reply_bonus(&self) -> i32 {
        match self {
            ActivityLevel::Low => 0,
            ActivityLevel::Moderate => 1,
            ActivityLevel::High => 2,
        }
    }

    pub fn all() -> &'static [ActivityLevel] {
        &[ActivityLevel::Low, ActivityLevel::Moderate, ActivityLevel::High]
    }
}

impl Default for ActivityLevel {
    fn default() -> Self {
        ActivityLevel::Moderate
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(ActivityLevel::Low),
            "moderate" | "medium" => Ok(ActivityLevel::Moderate),
            "high" => Ok(ActivityLevel::High),
            _ => Err(format!(
                "Unknown activity level '{}'. Valid: low, moderate, high",
                s
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Knowledge Level
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeLevel {
    Beginner,
    Intermediate,
    Expert,
}

impl Default for KnowledgeLevel {
    fn default() -> Self {
        KnowledgeLevel::Intermediate
    }
}

impl fmt::Display for KnowledgeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnowledgeLevel::Beginner => write!(f, "beginner"),
            KnowledgeLevel::Intermediate => write!(f, "intermediate"),
            KnowledgeLevel::Expert => write!(f, "expert"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Personality
// ─────────────────────────────────────────────────────────────────

/// Writing style handed to the content generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Personality {
    /// casual, professional, enthusiastic, analytical, helpful
    pub tone: String,
    /// concise, moderate, detailed
    pub verbosity: String,
    /// none, minimal, moderate
    pub emoji_usage: String,
    /// Whether the persona tends to end posts with a question
    pub asks_followups: bool,
}

impl Default for Personality {
    fn default() -> Self {
        Self {
            tone: "casual".to_string(),
            verbosity: "moderate".to_string(),
            emoji_usage: "minimal".to_string(),
            asks_followups: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Workflow Config
// ─────────────────────────────────────────────────────────────────

/// Per-persona opt-in for `run_all` and scheduling hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub enabled: bool,

    /// Threads to seed each time the persona's workflow runs
    pub threads_per_run: u32,

    /// Ask another persona to reply to the freshly seeded thread
    pub reply_after_seed: bool,

    /// Free-form schedule hint ("weekdays", "mornings", ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threads_per_run: 1,
            reply_after_seed: false,
            schedule: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Persona
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub slug: String,

    #[serde(default)]
    pub bio: Option<String>,

    #[serde(default)]
    pub role: Option<String>,

    /// Expertise tags, matched against thread text during reply selection
    #[serde(default)]
    pub expertise: Vec<String>,

    #[serde(default)]
    pub personality: Personality,

    #[serde(default)]
    pub knowledge_level: KnowledgeLevel,

    /// Forum group slugs, most preferred first
    #[serde(default)]
    pub preferred_groups: Vec<String>,

    #[serde(default)]
    pub activity_level: ActivityLevel,

    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default)]
    pub last_active_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub thread_count: u32,

    #[serde(default)]
    pub reply_count: u32,

    #[serde(default)]
    pub workflow_config: Option<WorkflowConfig>,

    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Persona {
    /// Minimal active persona; the rest is filled in with struct update syntax.
    pub fn new(
        name: impl Into<String>,
        slug: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            slug: slug.into(),
            bio: None,
            role: None,
            expertise: Vec::new(),
            personality: Personality::default(),
            knowledge_level: KnowledgeLevel::default(),
            preferred_groups: Vec::new(),
            activity_level: ActivityLevel::default(),
            is_active: true,
            last_active_at: None,
            thread_count: 0,
            reply_count: 0,
            workflow_config: None,
            created_at,
        }
    }

    /// Whether `run_all` should include this persona.
    pub fn workflow_enabled(&self) -> bool {
        self.is_active && self.workflow_config.as_ref().map_or(false, |c| c.enabled)
    }
}

/// Kind of successful post recorded against a persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    CreatedThread,
    Replied,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityKind::CreatedThread => write!(f, "created_thread"),
            ActivityKind::Replied => write!(f, "replied"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
