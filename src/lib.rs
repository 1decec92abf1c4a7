//! Persona Engine
//!
//! Keeps a community forum lively with scheduled synthetic participants.
//! Personas are drawn fairly, conversations are kept from becoming
//! persona-only echo chains, and every post goes through a pluggable
//! content generator.

pub mod cli;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod logging;
pub mod orchestrator;
pub mod random;
pub mod registry;
pub mod server;
pub mod store;
pub mod types;
pub mod version;

pub use config::EngineConfig;
pub use error::{Error, ErrorCode, FailureKind, Result};
pub use orchestrator::Orchestrator;
pub use version::VERSION;
