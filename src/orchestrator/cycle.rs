//! The scheduled batch cycle.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{CycleSummary, Orchestrator};
use crate::error::FailureKind;
use crate::random::shuffle;

impl Orchestrator {
    /// One batch cycle: seed one or two threads, then reply to one or two
    /// recent quiet threads.
    ///
    /// Never fails. Per-unit failures land in `errors`; guard rejections and
    /// empty selections are silent skips.
    pub async fn run_cycle(&self) -> CycleSummary {
        let mut summary = CycleSummary::default();
        self.fill_cycle(&mut summary).await;
        summary
    }

    /// [`run_cycle`](Self::run_cycle) bounded by `limit`. On timeout the
    /// units already persisted stay committed and are reported.
    pub async fn run_cycle_within(&self, limit: Duration) -> CycleSummary {
        let mut summary = CycleSummary::default();
        if tokio::time::timeout(limit, self.fill_cycle(&mut summary))
            .await
            .is_err()
        {
            warn!(limit_secs = limit.as_secs(), "Cycle timed out");
            summary
                .errors
                .push(format!("Cycle timed out after {}s", limit.as_secs()));
        }
        summary
    }

    async fn fill_cycle(&self, summary: &mut CycleSummary) {
        info!(generator = self.generator.name(), "Cycle started");

        self.seed_phase(summary).await;
        self.reply_phase(summary).await;

        info!(
            threads_seeded = summary.threads_seeded,
            replies_made = summary.replies_made,
            errors = summary.errors.len(),
            "Cycle finished"
        );
    }

    async fn seed_phase(&self, summary: &mut CycleSummary) {
        let count = self.rng.coin(1, 2).min(self.engine.max_threads_per_cycle);

        for i in 0..count {
            if i > 0 {
                self.pause(self.engine.unit_delay_ms).await;
            }

            let candidates = match self
                .selector
                .least_recently_active(self.engine.thread_sample_size)
                .await
            {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "Persona sample failed");
                    summary.record_error("Thread seed error", &e);
                    continue;
                }
            };
            if candidates.is_empty() {
                summary.errors.push("No active personas available".to_string());
                break;
            }

            let Some(persona) = self.selector.admit_and_pick(candidates) else {
                debug!(slot = i, "No persona admitted");
                continue;
            };

            match self.seed_as(&persona).await {
                Ok(outcome) => summary.record_thread(&outcome),
                Err(e) => {
                    warn!(persona = %persona.slug, error = %e, "Thread seed failed");
                    summary.record_error(&format!("Thread seed error ({})", persona.name), &e);
                }
            }
        }
    }

    async fn reply_phase(&self, summary: &mut CycleSummary) {
        let mut candidates = match self
            .guard
            .threads_needing_replies(self.engine.reply_candidate_limit)
            .await
        {
            Ok(threads) => threads,
            Err(e) => {
                warn!(error = %e, "Reply candidates unavailable");
                summary.record_error("Reply error", &e);
                return;
            }
        };

        shuffle(self.rng.as_ref(), &mut candidates);
        let count = self
            .rng
            .coin(1, 2)
            .min(self.engine.max_replies_per_cycle)
            .min(candidates.len());

        for (i, thread) in candidates.into_iter().take(count).enumerate() {
            if i > 0 {
                self.pause(self.engine.unit_delay_ms).await;
            }

            match self.reply(&thread.id, None).await {
                Ok(outcome) => summary.record_reply(&outcome, &thread.title),
                Err(e)
                    if matches!(
                        e.kind(),
                        FailureKind::GuardRejection | FailureKind::SelectionEmpty
                    ) =>
                {
                    debug!(thread_id = %thread.id, reason = %e, "Thread skipped");
                }
                Err(e) => {
                    warn!(thread_id = %thread.id, error = %e, "Reply failed");
                    summary.record_error("Reply error", &e);
                }
            }
        }
    }
}
