//! Configuration system for the persona engine
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (PERSONA_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::ActivityLevel;

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Selection, guard and cycle tuning
    pub engine: EngineSettings,

    /// Pauses and caps for the batch helpers
    pub batch: BatchSettings,

    /// Recurring cycle settings for `persona-engine run`
    pub scheduler: SchedulerSettings,

    /// Data store settings
    pub store: StoreSettings,

    /// Content generation provider
    pub generator: GeneratorSettings,

    /// HTTP trigger surface
    pub server: ServerSettings,

    /// Optional community cross-post webhook
    pub crosspost: CrossPostSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Selection, guard and cycle tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Replies after which no persona joins a thread
    pub max_conversation_depth: u32,

    /// Least-recently-active personas drawn for a new thread
    pub thread_sample_size: usize,

    /// Least-recently-active personas drawn for on-demand actions
    pub on_demand_sample_size: usize,

    /// Least-recently-active personas ranked for a reply
    pub reply_candidate_pool: usize,

    /// Random pick among the N best-ranked responders (1 = strict top)
    pub reply_pick_top_n: usize,

    /// Upper bound of the coin flip for threads per cycle
    pub max_threads_per_cycle: usize,

    /// Upper bound of replies per cycle
    pub max_replies_per_cycle: usize,

    /// How far back a thread still counts as recent
    pub reply_window_hours: i64,

    /// Threads with this many replies or more are left alone by the cycle
    pub reply_max_existing: u32,

    /// Threads fetched as reply candidates per cycle
    pub reply_candidate_limit: usize,

    /// Pause between work items inside a cycle phase
    pub unit_delay_ms: u64,

    /// Fixed seed for reproducible runs (unset = entropy)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
    /// Admission probability per activity level
    pub admission: AdmissionSettings,
}

/// Admission probability per activity level
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionSettings {
    pub low: f64,
    pub moderate: f64,
    pub high: f64,
}

/// Batch helper settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Pause between personas in `run_all`
    pub run_all_delay_ms: u64,

    /// Pause between units in `batch_threads` / `batch_replies`
    pub batch_delay_ms: u64,

    /// Cap on threads per persona in `batch_threads`
    pub max_threads_per_persona: u32,
}

/// Scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Seconds between cycles
    pub interval_secs: u64,

    /// Upper bound for a single cycle; persisted work stays committed
    pub cycle_timeout_secs: u64,

    /// Run one cycle immediately at startup
    pub run_on_start: bool,
}

/// Data store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// JSON snapshot the in-memory store is loaded from and saved to
    pub snapshot_path: String,

    /// Domain of the synthetic persona profile address
    pub profile_domain: String,
}

/// Content generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Provider: openai, mock
    pub provider: String,

    /// API base URL (OpenAI, Ollama, vLLM, LM Studio, etc.)
    pub base_url: String,

    /// API key (empty string for local servers)
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries on transient failures
    pub max_retries: u32,

    pub temperature: f32,

    /// Token budget for a new thread
    pub thread_max_tokens: u32,

    /// Token budget for a reply
    pub reply_max_tokens: u32,

    /// Description of the community, included in every prompt
    pub forum_context: String,
}

/// HTTP trigger settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Listen address
    pub bind: String,

    /// Shared secret for the scheduled trigger (unset = trigger disabled)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron_secret: Option<String>,

    /// Bearer tokens accepted on admin endpoints
    pub admin_tokens: Vec<String>,
}

/// Community cross-post settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossPostSettings {
    /// Inbound webhook notified after a persona thread is created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// Public forum URL prefix for the "discuss on the forum" link
    pub forum_base_url: String,

    /// Community group the post lands in
    pub group: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_conversation_depth: 20,
            thread_sample_size: 5,
            on_demand_sample_size: 5,
            reply_candidate_pool: 10,
            reply_pick_top_n: 1,
            max_threads_per_cycle: 2,
            max_replies_per_cycle: 3,
            reply_window_hours: 48,
            reply_max_existing: 3,
            reply_candidate_limit: 10,
            unit_delay_ms: 1000,
            rng_seed: None,
            admission: AdmissionSettings::default(),
        }
    }
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            low: 0.3,
            moderate: 0.7,
            high: 1.0,
        }
    }
}

impl AdmissionSettings {
    /// Admission probability for `level`.
    pub fn probability(&self, level: ActivityLevel) -> f64 {
        match level {
            ActivityLevel::Low => self.low,
            ActivityLevel::Moderate => self.moderate,
            ActivityLevel::High => self.high,
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            run_all_delay_ms: 500,
            batch_delay_ms: 300,
            max_threads_per_persona: 3,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval_secs: 7200,
            cycle_timeout_secs: 900,
            run_on_start: true,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            snapshot_path: "~/.persona-engine/store.json".to_string(),
            profile_domain: "personas.internal".to_string(),
        }
    }
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "http://localhost:11434/v1".to_string(),
            api_key: String::new(),
            model: "llama3".to_string(),
            timeout_secs: 120,
            max_retries: 2,
            temperature: 0.8,
            thread_max_tokens: 1500,
            reply_max_tokens: 1024,
            forum_context: DEFAULT_FORUM_CONTEXT.to_string(),
        }
    }
}

const DEFAULT_FORUM_CONTEXT: &str = "This is a technical community forum for developers, \
agency owners, founders and automation builders. \
Forum groups: general, help, showcase, feature-requests, bug-reports, tutorials, \
workflows, integrations, off-topic.";

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
            cron_secret: None,
            admin_tokens: vec![],
        }
    }
}

impl Default for CrossPostSettings {
    fn default() -> Self {
        Self {
            webhook_url: None,
            forum_base_url: "https://forum.example.com/forum".to_string(),
            group: "general".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            config = Self::from_file(&path)?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration file without overrides or validation
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse {
            message: format!("{}: {}", path.display(), e.message()),
            source: Some(e),
        })
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::ConfigNotFound { path });
        }

        // Search in standard locations
        let search_paths = [
            // Current directory
            PathBuf::from("persona-engine.toml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("persona-engine").join("config.toml"))
                .unwrap_or_default(),
            // Home directory
            dirs::home_dir()
                .map(|p| p.join(".persona-engine").join("config.toml"))
                .unwrap_or_default(),
            // System config (Linux)
            PathBuf::from("/etc/persona-engine/config.toml"),
        ];

        for path in &search_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        // Engine settings
        if let Some(n) = env_parse("PERSONA_MAX_DEPTH") {
            self.engine.max_conversation_depth = n;
        }
        if let Some(n) = env_parse("PERSONA_THREAD_SAMPLE_SIZE") {
            self.engine.thread_sample_size = n;
        }
        if let Some(n) = env_parse("PERSONA_UNIT_DELAY_MS") {
            self.engine.unit_delay_ms = n;
        }
        if let Some(n) = env_parse("PERSONA_RNG_SEED") {
            self.engine.rng_seed = Some(n);
        }

        // Scheduler settings
        if let Some(n) = env_parse("PERSONA_INTERVAL_SECS") {
            self.scheduler.interval_secs = n;
        }
        if let Some(n) = env_parse("PERSONA_CYCLE_TIMEOUT_SECS") {
            self.scheduler.cycle_timeout_secs = n;
        }

        // Store settings
        if let Ok(val) = std::env::var("PERSONA_SNAPSHOT_PATH") {
            self.store.snapshot_path = val;
        }
        if let Ok(val) = std::env::var("PERSONA_PROFILE_DOMAIN") {
            self.store.profile_domain = val;
        }

        // Generator settings
        if let Ok(val) = std::env::var("PERSONA_GENERATOR") {
            self.generator.provider = val;
        }
        if let Ok(val) = std::env::var("PERSONA_OPENAI_BASE_URL") {
            self.generator.base_url = val;
        }
        if let Ok(val) = std::env::var("PERSONA_OPENAI_API_KEY") {
            self.generator.api_key = val;
        }
        if let Ok(val) = std::env::var("PERSONA_OPENAI_MODEL") {
            self.generator.model = val;
        }
        if let Some(n) = env_parse("PERSONA_OPENAI_TIMEOUT_SECS") {
            self.generator.timeout_secs = n;
        }

        // Server settings
        if let Ok(val) = std::env::var("PERSONA_BIND") {
            self.server.bind = val;
        }
        if let Ok(val) = std::env::var("PERSONA_CRON_SECRET") {
            self.server.cron_secret = Some(val);
        }
        if let Ok(val) = std::env::var("PERSONA_ADMIN_TOKENS") {
            self.server.admin_tokens = val
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }

        // Cross-post settings
        if let Ok(val) = std::env::var("PERSONA_CROSSPOST_WEBHOOK_URL") {
            self.crosspost.webhook_url = Some(val);
        }

        // Logging settings
        if let Ok(val) = std::env::var("PERSONA_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("PERSONA_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("PERSONA_LOG_JSON") {
            self.logging.json_format = env_bool(&val);
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        self.store.snapshot_path = expand_path(&self.store.snapshot_path);

        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let engine = &self.engine;
        if engine.max_conversation_depth == 0 {
            return Err(Error::config_field_invalid(
                "engine.max_conversation_depth",
                "max_conversation_depth must be greater than 0",
            ));
        }
        for (field, value) in [
            ("engine.thread_sample_size", engine.thread_sample_size),
            ("engine.on_demand_sample_size", engine.on_demand_sample_size),
            ("engine.reply_candidate_pool", engine.reply_candidate_pool),
            ("engine.reply_pick_top_n", engine.reply_pick_top_n),
            ("engine.max_threads_per_cycle", engine.max_threads_per_cycle),
        ] {
            if value == 0 {
                return Err(Error::config_field_invalid(
                    field,
                    format!("{} must be greater than 0", field),
                ));
            }
        }
        if engine.reply_window_hours <= 0 {
            return Err(Error::config_field_invalid(
                "engine.reply_window_hours",
                "reply_window_hours must be positive",
            ));
        }

        // Scheduler
        if self.scheduler.interval_secs == 0 || self.scheduler.cycle_timeout_secs == 0 {
            return Err(Error::config_field_invalid(
                "scheduler",
                "interval_secs and cycle_timeout_secs must be greater than 0",
            ));
        }

        // Admission probabilities
        for (level, p) in [
            ("low", engine.admission.low),
            ("moderate", engine.admission.moderate),
            ("high", engine.admission.high),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::config_field_invalid(
                    format!("engine.admission.{}", level),
                    format!("admission probability for '{}' must be between 0 and 1", level),
                ));
            }
        }

        // Generator
        match self.generator.provider.as_str() {
            "mock" => {}
            "openai" => validate_url("generator.base_url", &self.generator.base_url)?,
            other => {
                return Err(Error::config_field_invalid(
                    "generator.provider",
                    format!("Unknown generator provider '{}'. Must be one of: openai, mock", other),
                ))
            }
        }

        // Server
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(Error::config_field_invalid(
                "server.bind",
                format!("'{}' is not a valid socket address", self.server.bind),
            ));
        }

        // Cross-post
        if let Some(ref url) = self.crosspost.webhook_url {
            validate_url("crosspost.webhook_url", url)?;
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Snapshot file of the in-memory store
    pub fn snapshot_path(&self) -> PathBuf {
        PathBuf::from(&self.store.snapshot_path)
    }
}

fn validate_url(field: &str, value: &str) -> Result<()> {
    let url = url::Url::parse(value).map_err(|e| {
        Error::config_field_invalid(field, format!("'{}' is not a valid URL: {}", value, e))
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Error::config_field_invalid(
            field,
            format!("'{}' must start with http:// or https://", value),
        ));
    }
    Ok(())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_bool(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Default location written by `config init`
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".persona-engine")
        .join("config.toml")
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(default_config_path);

    // Check if file exists
    if config_path.exists() && !force {
        return Err(Error::config_validation(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    // Create parent directories
    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    info!(path = %config_path.display(), "Configuration file created");
    Ok(config_path)
}

/// Generate default configuration content with comments
pub fn generate_default_config() -> String {
    r#"# Persona Engine Configuration

[engine]
# Replies after which no persona joins a thread
max_conversation_depth = 20

# Least-recently-active personas drawn for a new thread
thread_sample_size = 5

# Least-recently-active personas drawn for on-demand actions
on_demand_sample_size = 5

# Least-recently-active personas ranked for a reply
reply_candidate_pool = 10

# Random pick among the N best-ranked responders (1 = strict top)
reply_pick_top_n = 1

# Threads per cycle is a coin flip between 1 and this value
max_threads_per_cycle = 2

# Upper bound of replies per cycle
max_replies_per_cycle = 3

# Reply candidates: threads from the last N hours with fewer than M replies
reply_window_hours = 48
reply_max_existing = 3
reply_candidate_limit = 10

# Pause between work items inside a cycle (milliseconds)
unit_delay_ms = 1000

# Fixed seed for reproducible runs
# rng_seed = 42

[engine.admission]
# Chance that a drawn persona is admitted to start a thread
low = 0.3
moderate = 0.7
high = 1.0

[batch]
run_all_delay_ms = 500
batch_delay_ms = 300
max_threads_per_persona = 3

[scheduler]
# Seconds between cycles (7200 = every two hours)
interval_secs = 7200

# Upper bound for one cycle in seconds
cycle_timeout_secs = 900

# Run a cycle immediately at startup
run_on_start = true

[store]
# JSON snapshot of the in-memory store
snapshot_path = "~/.persona-engine/store.json"

# Persona profiles get the address persona-<slug>@<profile_domain>
profile_domain = "personas.internal"

[generator]
# Provider: openai (any OpenAI-compatible API), mock
provider = "openai"

# API base URL (OpenAI, Ollama, vLLM, LM Studio, etc.)
base_url = "http://localhost:11434/v1"

# API key (leave empty for local servers like Ollama)
api_key = ""

model = "llama3"
timeout_secs = 120
max_retries = 2
temperature = 0.8
thread_max_tokens = 1500
reply_max_tokens = 1024

# forum_context = "Describe your community here"

[server]
bind = "127.0.0.1:8787"

# Shared secret for GET /api/cron/personas (unset = scheduled trigger rejects everything)
# cron_secret = "change-me"

# Bearer tokens accepted on admin endpoints
admin_tokens = []

[crosspost]
# Inbound webhook notified after a persona thread is created
# webhook_url = "https://hooks.example.com/community"
forum_base_url = "https://forum.example.com/forum"
group = "general"
timeout_secs = 10

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.persona-engine/logs/engine.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}
