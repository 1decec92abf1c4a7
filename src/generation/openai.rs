//! OpenAI-compatible generator
//!
//! Sends chat completion requests to any OpenAI-compatible endpoint (OpenAI,
//! Ollama, vLLM, LM Studio, ...) and parses the JSON object the model is
//! asked to answer with.

use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::GeneratorSettings;
use crate::error::{Error, Result};
use crate::types::{Persona, TopicSeed};

use super::prompts::{extract_json, reply_prompt, thread_prompt};
use super::{ContentGenerator, GeneratedReply, GeneratedThread, PriorPost, ThreadContext};

const PROVIDER: &str = "openai";

// ─────────────────────────────────────────────────────────────────
// API Types
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    total_tokens: u32,
}

/// One failed attempt, and whether another one is worth making.
struct AttemptError {
    error: Error,
    retryable: bool,
}

// ─────────────────────────────────────────────────────────────────
// Generator
// ─────────────────────────────────────────────────────────────────

pub struct OpenAiGenerator {
    settings: GeneratorSettings,
    client: Client,
    retry_interval: Duration,
    total_requests: RwLock<u64>,
    total_tokens: RwLock<u64>,
}

impl OpenAiGenerator {
    pub fn new(settings: GeneratorSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| {
                Error::generation(PROVIDER, format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            settings,
            client,
            retry_interval: Duration::from_millis(500),
            total_requests: RwLock::new(0),
            total_tokens: RwLock::new(0),
        })
    }

    /// First retry delay; later delays grow exponentially.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Completed requests and tokens reported by the provider.
    pub fn usage(&self) -> (u64, u64) {
        (*self.total_requests.read(), *self.total_tokens.read())
    }

    fn auth_header(&self) -> Option<String> {
        if self.settings.api_key.is_empty() {
            None
        } else {
            Some(format!("Bearer {}", self.settings.api_key))
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'))
    }

    /// Run one prompt, retrying rate limits, server errors and transport
    /// failures with exponential backoff.
    async fn complete(&self, prompt: String, max_tokens: u32) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.settings.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            max_tokens,
            temperature: self.settings.temperature,
        };

        let mut backoff = ExponentialBackoff {
            initial_interval: self.retry_interval,
            max_interval: self.retry_interval * 8,
            max_elapsed_time: None,
            ..Default::default()
        };
        backoff.reset();

        let mut attempt = 0;
        loop {
            match self.attempt(&request).await {
                Ok(text) => return Ok(text),
                Err(failure) if failure.retryable && attempt < self.settings.max_retries => {
                    attempt += 1;
                    let delay = backoff.next_backoff().unwrap_or(backoff.max_interval);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure.error,
                        "Retryable generation error"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }

    async fn attempt(
        &self,
        request: &ChatCompletionRequest,
    ) -> std::result::Result<String, AttemptError> {
        let mut req = self.client.post(self.endpoint()).json(request);
        if let Some(auth) = self.auth_header() {
            req = req.header("Authorization", auth);
        }

        let response = req.send().await.map_err(|e| AttemptError {
            retryable: e.is_timeout() || e.is_connect(),
            error: Error::generation(PROVIDER, format!("Request failed: {}", e)),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError {
                retryable: status.as_u16() == 429 || status.is_server_error(),
                error: Error::generation(PROVIDER, format!("API error {}: {}", status, body)),
            });
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| AttemptError {
            retryable: false,
            error: Error::malformed(format!("Failed to parse API response: {}", e)),
        })?;

        *self.total_requests.write() += 1;
        if let Some(usage) = parsed.usage {
            *self.total_tokens.write() += usage.total_tokens as u64;
        }

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AttemptError {
                retryable: false,
                error: Error::malformed("No choices in API response"),
            })?;

        debug!(chars = text.len(), "Completion received");
        Ok(text)
    }
}

#[async_trait]
impl ContentGenerator for OpenAiGenerator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn generate_thread(
        &self,
        persona: &Persona,
        topic: Option<&TopicSeed>,
    ) -> Result<GeneratedThread> {
        let prompt = thread_prompt(persona, topic, &self.settings.forum_context);
        let text = self.complete(prompt, self.settings.thread_max_tokens).await?;
        extract_json::<GeneratedThread>(&text)?.validated()
    }

    async fn generate_reply(
        &self,
        persona: &Persona,
        thread: &ThreadContext,
        prior_posts: &[PriorPost],
    ) -> Result<GeneratedReply> {
        let prompt = reply_prompt(persona, thread, prior_posts, &self.settings.forum_context);
        let text = self.complete(prompt, self.settings.reply_max_tokens).await?;
        extract_json::<GeneratedReply>(&text)?.validated()
    }
}
