//! Community cross-posting
//!
//! After a persona seeds a thread, an optional inbound webhook is told about
//! it. Delivery is best effort: failures are logged and never fail the unit.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::CrossPostSettings;
use crate::error::{Error, Result};
use crate::types::{Persona, Thread};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CrossPostPayload {
    pub title: String,
    pub content: String,
    pub author: String,
    pub group: String,
    pub channel: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub source: &'static str,
    pub timestamp: DateTime<Utc>,
}

pub struct CrossPoster {
    client: Client,
    webhook_url: String,
    forum_base_url: String,
    group: String,
}

impl CrossPoster {
    /// `None` when no webhook is configured.
    pub fn from_settings(settings: &CrossPostSettings) -> Result<Option<Self>> {
        let Some(ref webhook_url) = settings.webhook_url else {
            return Ok(None);
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build cross-post client: {}", e)))?;

        Ok(Some(Self {
            client,
            webhook_url: webhook_url.clone(),
            forum_base_url: settings.forum_base_url.trim_end_matches('/').to_string(),
            group: settings.group.clone(),
        }))
    }

    pub fn payload(
        &self,
        persona: &Persona,
        thread: &Thread,
        now: DateTime<Utc>,
    ) -> CrossPostPayload {
        CrossPostPayload {
            title: thread.title.clone(),
            content: format!(
                "{}\n\n---\nDiscuss on the forum: {}/{}",
                thread.body, self.forum_base_url, thread.slug
            ),
            author: persona.name.clone(),
            group: self.group.clone(),
            channel: "general",
            kind: "community_post",
            source: "persona_engine",
            timestamp: now,
        }
    }

    /// Announce `thread`. Returns whether the webhook accepted it.
    pub async fn announce(&self, persona: &Persona, thread: &Thread, now: DateTime<Utc>) -> bool {
        let payload = self.payload(persona, thread, now);
        match self.client.post(&self.webhook_url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(thread_id = %thread.id, persona = %persona.slug, "Cross-posted thread");
                true
            }
            Ok(resp) => {
                warn!(thread_id = %thread.id, status = %resp.status(), "Cross-post rejected");
                false
            }
            Err(e) => {
                warn!(thread_id = %thread.id, error = %e, "Cross-post failed");
                false
            }
        }
    }
}
