//! Persona registry over the forum store.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use super::overview::{PersonaOverview, WorkflowOverview};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::store::{ForumStore, PersonaOrder, PersonaQuery};
use crate::types::{slugify, ActivityKind, Persona, Profile, WorkflowConfig};

/// Days covered by the workflow overview's recent counts.
const OVERVIEW_WINDOW_DAYS: i64 = 7;

/// Reads and administers personas and resolves each one to exactly one
/// author profile.
#[derive(Clone)]
pub struct PersonaRegistry {
    store: Arc<dyn ForumStore>,
    clock: Arc<dyn Clock>,
    profile_domain: String,
}

impl PersonaRegistry {
    pub fn new(
        store: Arc<dyn ForumStore>,
        clock: Arc<dyn Clock>,
        profile_domain: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            profile_domain: profile_domain.into(),
        }
    }

    /// Synthetic address of the profile backing `slug`.
    pub fn profile_address(&self, slug: &str) -> String {
        format!("persona-{}@{}", slug, self.profile_domain)
    }

    // ─────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────

    /// All personas by name, optionally only the active ones.
    pub async fn list(&self, active_only: bool) -> Result<Vec<Persona>> {
        self.store
            .list_personas(&PersonaQuery {
                active_only,
                order: PersonaOrder::Name,
                ..Default::default()
            })
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Persona> {
        self.store
            .get_persona(id)
            .await?
            .ok_or_else(|| Error::PersonaNotFound {
                persona_id: id.to_string(),
            })
    }

    /// Look a persona up by id, falling back to its slug.
    pub async fn find(&self, id_or_slug: &str) -> Result<Persona> {
        if let Some(persona) = self.store.get_persona(id_or_slug).await? {
            return Ok(persona);
        }
        self.list(false)
            .await?
            .into_iter()
            .find(|p| p.slug == id_or_slug)
            .ok_or_else(|| Error::PersonaNotFound {
                persona_id: id_or_slug.to_string(),
            })
    }

    // ─────────────────────────────────────────────────────────────
    // Profile resolution
    // ─────────────────────────────────────────────────────────────

    /// The persona's backing profile, created on first use.
    ///
    /// Keyed by the synthetic address, so repeated or concurrent calls end
    /// up with the same profile. Any failure maps to `ProfileUnresolved`.
    pub async fn resolve_profile(&self, persona: &Persona) -> Result<Profile> {
        let address = self.profile_address(&persona.slug);
        let unresolved = |message: String| Error::ProfileUnresolved {
            persona: persona.name.clone(),
            message,
        };

        let existing = self
            .store
            .find_profile_by_address(&address)
            .await
            .map_err(|e| unresolved(e.to_string()))?;

        let profile = match existing {
            Some(profile) => profile,
            None => {
                let created = self
                    .store
                    .insert_profile(Profile {
                        id: uuid::Uuid::new_v4().to_string(),
                        display_name: persona.name.clone(),
                        address: address.clone(),
                        is_persona_controlled: true,
                        persona_id: Some(persona.id.clone()),
                        created_at: self.clock.now(),
                    })
                    .await
                    .map_err(|e| unresolved(e.to_string()))?;
                info!(persona = %persona.slug, profile = %created.id, "Created persona profile");
                created
            }
        };

        if !profile.is_persona_controlled {
            return Err(unresolved(format!(
                "profile {} at {} is not persona-controlled",
                profile.id, address
            )));
        }
        Ok(profile)
    }

    // ─────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────

    /// Insert a persona together with its backing profile.
    pub async fn create_persona(&self, mut persona: Persona) -> Result<(Persona, Profile)> {
        if persona.name.trim().is_empty() {
            return Err(Error::bad_request("persona name must not be empty"));
        }
        if persona.slug.trim().is_empty() {
            persona.slug = slugify(&persona.name);
        }
        if persona.slug.is_empty() {
            return Err(Error::bad_request(format!(
                "cannot derive a slug from '{}'",
                persona.name
            )));
        }

        let persona = self.store.insert_persona(persona).await?;
        let profile = self.resolve_profile(&persona).await?;
        info!(persona = %persona.slug, id = %persona.id, "Persona created");
        Ok((persona, profile))
    }

    /// Stamp a successful post. Only called after the insert landed.
    pub async fn record_activity(&self, persona_id: &str, kind: ActivityKind) -> Result<Persona> {
        let at = self.clock.now();
        let persona = self
            .store
            .record_persona_activity(persona_id, kind, at)
            .await?;
        debug!(persona = %persona.slug, activity = %kind, "Recorded persona activity");
        Ok(persona)
    }

    pub async fn set_active(&self, persona_id: &str, active: bool) -> Result<Persona> {
        let persona = self.store.set_persona_active(persona_id, active).await?;
        info!(persona = %persona.slug, active, "Persona activation changed");
        Ok(persona)
    }

    /// Replace (or clear) a persona's workflow configuration.
    pub async fn update_workflow_config(
        &self,
        persona_id: &str,
        config: Option<WorkflowConfig>,
    ) -> Result<Persona> {
        let persona = self
            .store
            .update_workflow_config(persona_id, config)
            .await?;
        info!(
            persona = %persona.slug,
            enabled = persona.workflow_enabled(),
            "Workflow config updated"
        );
        Ok(persona)
    }

    // ─────────────────────────────────────────────────────────────
    // Overview
    // ─────────────────────────────────────────────────────────────

    /// Every persona with its workflow config and recent activity.
    pub async fn workflow_overview(&self) -> Result<WorkflowOverview> {
        let now = self.clock.now();
        let since = now - Duration::days(OVERVIEW_WINDOW_DAYS);
        let personas = self.list(false).await?;
        let activity = self.store.author_activity_since(since).await?;

        let mut entries = Vec::with_capacity(personas.len());
        for persona in personas {
            let address = self.profile_address(&persona.slug);
            let profile_id = match self.store.find_profile_by_address(&address).await {
                Ok(profile) => profile.map(|p| p.id),
                Err(e) => {
                    warn!(persona = %persona.slug, error = %e, "Profile lookup failed");
                    None
                }
            };
            let recent = profile_id
                .as_ref()
                .and_then(|id| activity.get(id))
                .copied()
                .unwrap_or_default();

            entries.push(PersonaOverview::new(persona, profile_id, recent));
        }

        Ok(WorkflowOverview {
            generated_at: now,
            window_days: OVERVIEW_WINDOW_DAYS,
            personas: entries,
        })
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
