//! Fairness selector: thread starters and responders.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::EngineSettings;
use crate::error::Result;
use crate::random::{pick, RandomSource};
use crate::store::{ForumStore, PersonaQuery};
use crate::types::Persona;

/// Score added per expertise tag found in the thread text.
const EXPERTISE_MATCH_SCORE: i32 = 3;

/// Score added for a persona that has never posted.
const NEVER_ACTIVE_SCORE: i32 = 2;

/// Relevance of `persona` as a responder to a thread whose lowercased title
/// and body are `thread_text`.
pub fn score_for_reply(persona: &Persona, thread_text: &str) -> i32 {
    let mut score = 0;
    for tag in &persona.expertise {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && thread_text.contains(&tag) {
            score += EXPERTISE_MATCH_SCORE;
        }
    }
    if persona.last_active_at.is_none() {
        score += NEVER_ACTIVE_SCORE;
    }
    score + persona.activity_level.reply_bonus()
}

/// Picks personas with recency and activity-level weighting.
///
/// Read-only: nothing here touches `last_active_at`. Two concurrent callers
/// may pick the same persona; the next cycle evens that out.
pub struct FairnessSelector {
    store: Arc<dyn ForumStore>,
    rng: Arc<dyn RandomSource>,
    settings: EngineSettings,
}

impl FairnessSelector {
    pub fn new(
        store: Arc<dyn ForumStore>,
        rng: Arc<dyn RandomSource>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            rng,
            settings,
        }
    }

    /// The `sample_size` active personas that have waited longest.
    pub async fn least_recently_active(&self, sample_size: usize) -> Result<Vec<Persona>> {
        self.store
            .list_personas(&PersonaQuery::least_recently_active(sample_size))
            .await
    }

    /// Run the admission draw over `candidates` and pick one admitted
    /// persona uniformly. `None` when nobody is admitted.
    pub fn admit_and_pick(&self, candidates: Vec<Persona>) -> Option<Persona> {
        let admitted: Vec<Persona> = candidates
            .into_iter()
            .filter(|p| {
                let admitted = self
                    .rng
                    .chance(self.settings.admission.probability(p.activity_level));
                trace!(persona = %p.slug, level = %p.activity_level, admitted, "Admission draw");
                admitted
            })
            .collect();

        pick(self.rng.as_ref(), &admitted).cloned()
    }

    /// Thread starter for the batch cycle: sample by recency, admit by
    /// activity level, pick uniformly. `None` is a normal outcome.
    pub async fn select_for_thread_creation(&self, sample_size: usize) -> Result<Option<Persona>> {
        let candidates = self.least_recently_active(sample_size).await?;
        let drawn = candidates.len();
        let selected = self.admit_and_pick(candidates);
        debug!(
            drawn,
            selected = selected.as_ref().map(|p| p.slug.as_str()),
            "Thread starter selection"
        );
        Ok(selected)
    }

    /// On-demand thread starter: one draw over the least recently active,
    /// no admission filter.
    pub async fn select_any(&self, sample_size: usize) -> Result<Option<Persona>> {
        let candidates = self.least_recently_active(sample_size).await?;
        Ok(pick(self.rng.as_ref(), &candidates).cloned())
    }

    /// Best-ranked active persona for a reply, never one in `exclude_ids`.
    ///
    /// Ranking looks at the `reply_candidate_pool` least recently active
    /// personas. Ties keep recency order. With `reply_pick_top_n > 1` the
    /// result is a uniform pick among the top entries.
    pub async fn select_for_reply(
        &self,
        title: &str,
        body: &str,
        exclude_ids: &[String],
    ) -> Result<Option<Persona>> {
        let pool = self
            .store
            .list_personas(
                &PersonaQuery::least_recently_active(self.settings.reply_candidate_pool)
                    .excluding(exclude_ids),
            )
            .await?;

        let thread_text = format!("{} {}", title, body).to_lowercase();
        let mut ranked: Vec<(i32, Persona)> = pool
            .into_iter()
            .filter(|p| !exclude_ids.contains(&p.id))
            .map(|p| (score_for_reply(&p, &thread_text), p))
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0));

        let top_n = self.settings.reply_pick_top_n.max(1).min(ranked.len());
        let top = &ranked[..top_n];
        let selected = pick(self.rng.as_ref(), top).map(|(score, p)| {
            debug!(persona = %p.slug, score, "Responder selected");
            p.clone()
        });
        Ok(selected)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
