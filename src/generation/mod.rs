//! Content generation
//!
//! The [`ContentGenerator`] port plus two providers:
//! - `openai`: any OpenAI-compatible chat completion endpoint
//! - `mock`: deterministic text for tests and offline runs

mod mock;
mod openai;
pub mod prompts;
mod traits;

use std::sync::Arc;

use tracing::info;

use crate::config::GeneratorSettings;
use crate::error::{Error, Result};

pub use mock::{MockConfig, MockGenerator};
pub use openai::OpenAiGenerator;
pub use traits::*;

/// Provider names accepted by `[generator] provider`.
pub const PROVIDERS: &[&str] = &["openai", "mock"];

/// Build the configured generator.
pub fn build_generator(settings: &GeneratorSettings) -> Result<Arc<dyn ContentGenerator>> {
    let generator: Arc<dyn ContentGenerator> = match settings.provider.as_str() {
        "openai" => Arc::new(OpenAiGenerator::new(settings.clone())?),
        "mock" => Arc::new(MockGenerator::new()),
        other => {
            return Err(Error::config_field_invalid(
                "generator.provider",
                format!("Unknown provider '{}'. Valid: {}", other, PROVIDERS.join(", ")),
            ))
        }
    };
    info!(provider = generator.name(), model = %settings.model, "Content generator ready");
    Ok(generator)
}
