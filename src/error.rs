//! Error types for the persona engine
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - A failure kind per error, used to decide whether a unit is skipped
//!   or the whole request is rejected
//! - HTTP status mapping for the trigger endpoints
//! - User-friendly messages with suggestions and CLI exit codes

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO / serialization errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    Serialization = 202,

    // Selection-empty outcomes (3xx)
    NoEligiblePersona = 300,
    PersonaNotFound = 302,
    ThreadNotFound = 303,

    // Profile resolution (4xx)
    ProfileUnresolved = 400,

    // Guard rejections (5xx)
    ThreadLocked = 500,
    DepthReached = 501,
    EchoBlocked = 502,
    AlreadyParticipated = 503,

    // Generation errors (6xx)
    GenerationFailed = 600,
    GenerationMalformed = 601,

    // Persistence errors (7xx)
    StoreRead = 700,
    StoreWrite = 701,
    SlugConflict = 702,

    // Transport / auth errors (8xx)
    Unauthorized = 800,
    Forbidden = 801,
    BadRequest = 802,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10,
            200..=299 => 20,
            300..=399 => 30,
            400..=499 => 40,
            500..=599 => 50,
            600..=699 => 60,
            700..=799 => 70,
            800..=899 => 80,
            900..=999 => 90,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a failure propagates through the orchestrator.
///
/// Kinds other than `Auth` and `Internal` stay inside the unit of work that
/// produced them and end up in the result list of the cycle or batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Nobody / nothing eligible. A normal skip.
    SelectionEmpty,
    /// Persona has no resolvable backing profile.
    Resolution,
    /// Thread locked, at max depth, or blocked by anti-echo.
    GuardRejection,
    /// Content generation port errored or returned unusable output.
    Generation,
    /// Store read or write failed.
    Persistence,
    /// Missing secret or admin privilege; rejects the whole request.
    Auth,
    /// Configuration, IO or programming errors.
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::SelectionEmpty => "selection_empty",
            FailureKind::Resolution => "resolution",
            FailureKind::GuardRejection => "guard_rejection",
            FailureKind::Generation => "generation",
            FailureKind::Persistence => "persistence",
            FailureKind::Auth => "auth",
            FailureKind::Internal => "internal",
        }
    }
}

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // Selection-Empty
    // ─────────────────────────────────────────────────────────────

    /// No active persona was eligible for the requested action
    #[error("No eligible persona: {reason}")]
    NoEligiblePersona { reason: String },

    #[error("Persona not found: {persona_id}")]
    PersonaNotFound { persona_id: String },

    #[error("Thread not found: {thread_id}")]
    ThreadNotFound { thread_id: String },

    // ─────────────────────────────────────────────────────────────
    // Resolution
    // ─────────────────────────────────────────────────────────────

    /// Persona has no backing profile and one could not be created
    #[error("No profile for persona {persona}: {message}")]
    ProfileUnresolved { persona: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // Guard Rejections
    // ─────────────────────────────────────────────────────────────

    #[error("Thread {thread_id} is locked")]
    ThreadLocked { thread_id: String },

    #[error("Thread {thread_id} reached max conversation depth ({max_depth})")]
    DepthReached { thread_id: String, max_depth: u32 },

    #[error("Last reply in thread {thread_id} is already from a persona")]
    EchoBlocked { thread_id: String },

    #[error("Persona {persona} already posted in thread {thread_id}")]
    AlreadyParticipated { persona: String, thread_id: String },

    // ─────────────────────────────────────────────────────────────
    // Generation
    // ─────────────────────────────────────────────────────────────

    #[error("Content generation failed ({provider}): {message}")]
    GenerationFailed { provider: String, message: String },

    #[error("Content generation returned unusable output: {message}")]
    GenerationMalformed { message: String },

    // ─────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────

    /// Read from the data store failed (selector/guard retrieval error)
    #[error("Store read failed: {message}")]
    StoreRead { message: String },

    #[error("Store write failed: {message}")]
    StoreWrite { message: String },

    #[error("Thread slug already exists: {slug}")]
    SlugConflict { slug: String },

    // ─────────────────────────────────────────────────────────────
    // Transport / Auth
    // ─────────────────────────────────────────────────────────────

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Admin access required")]
    Forbidden,

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Json(_) | Error::Toml(_) => ErrorCode::Serialization,

            Error::NoEligiblePersona { .. } => ErrorCode::NoEligiblePersona,
            Error::PersonaNotFound { .. } => ErrorCode::PersonaNotFound,
            Error::ThreadNotFound { .. } => ErrorCode::ThreadNotFound,

            Error::ProfileUnresolved { .. } => ErrorCode::ProfileUnresolved,

            Error::ThreadLocked { .. } => ErrorCode::ThreadLocked,
            Error::DepthReached { .. } => ErrorCode::DepthReached,
            Error::EchoBlocked { .. } => ErrorCode::EchoBlocked,
            Error::AlreadyParticipated { .. } => ErrorCode::AlreadyParticipated,

            Error::GenerationFailed { .. } => ErrorCode::GenerationFailed,
            Error::GenerationMalformed { .. } => ErrorCode::GenerationMalformed,

            Error::StoreRead { .. } => ErrorCode::StoreRead,
            Error::StoreWrite { .. } => ErrorCode::StoreWrite,
            Error::SlugConflict { .. } => ErrorCode::SlugConflict,

            Error::Unauthorized { .. } => ErrorCode::Unauthorized,
            Error::Forbidden => ErrorCode::Forbidden,
            Error::BadRequest { .. } => ErrorCode::BadRequest,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Classify the error for per-unit containment
    pub fn kind(&self) -> FailureKind {
        match self.code() as u16 {
            300..=399 => FailureKind::SelectionEmpty,
            400..=499 => FailureKind::Resolution,
            500..=599 => FailureKind::GuardRejection,
            600..=699 => FailureKind::Generation,
            700..=799 => FailureKind::Persistence,
            800..=899 => FailureKind::Auth,
            _ => FailureKind::Internal,
        }
    }

    /// Whether this error stays inside its unit of work
    pub fn is_unit_scoped(&self) -> bool {
        !matches!(self.kind(), FailureKind::Auth | FailureKind::Internal)
    }

    /// Whether an on-demand single action answers with an error status.
    ///
    /// Guard rejections, auth failures and an empty selection do; resolution,
    /// generation and persistence failures are per-unit results reported in
    /// a success response.
    pub fn rejects_on_demand(&self) -> bool {
        !matches!(
            self.kind(),
            FailureKind::Resolution | FailureKind::Generation | FailureKind::Persistence
        )
    }

    /// HTTP status for the on-demand trigger endpoints
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Unauthorized { .. } => 401,
            Error::Forbidden => 403,
            Error::BadRequest { .. } => 400,
            _ => match self.kind() {
                FailureKind::SelectionEmpty => 404,
                FailureKind::GuardRejection => 409,
                _ => 500,
            },
        }
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'persona-engine config init' to create a default configuration file.",
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'persona-engine config validate' to see details.",
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values.",
            ),
            Error::NoEligiblePersona { .. } => Some(
                "Activate more personas or import some with 'persona-engine seed'.",
            ),
            Error::ProfileUnresolved { .. } => Some(
                "Check that the store accepts profile inserts and that the persona slug is unique.",
            ),
            Error::GenerationFailed { .. } => Some(
                "Verify [generator] base_url, model and api_key, or switch provider to \"mock\".",
            ),
            Error::Unauthorized { .. } => Some(
                "Send 'Authorization: Bearer <cron_secret>' as configured under [server].",
            ),
            Error::Forbidden => Some(
                "Send an admin token listed under [server] admin_tokens.",
            ),
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!("\x1b[31mError [{}]\x1b[0m: {}\n", self.code().as_str(), self);
        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }
        output
    }

    /// Format the error for logging and result lists (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors (for ergonomic error creation)
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: None,
        }
    }

    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn store_read(message: impl Into<String>) -> Self {
        Error::StoreRead {
            message: message.into(),
        }
    }

    pub fn store_write(message: impl Into<String>) -> Self {
        Error::StoreWrite {
            message: message.into(),
        }
    }

    pub fn generation(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::GenerationFailed {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Error::GenerationMalformed {
            message: message.into(),
        }
    }

    pub fn no_persona(reason: impl Into<String>) -> Self {
        Error::NoEligiblePersona {
            reason: reason.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
