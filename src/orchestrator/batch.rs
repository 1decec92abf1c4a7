//! Batch helpers: one action over many personas or threads, one at a time.

use tracing::{debug, info, warn};

use super::{
    BatchRepliesReport, BatchReplyResult, BatchThreadResult, BatchThreadsReport, Orchestrator,
    PersonaRunResult, RunAllReport, RunPersonaReport, RunStep,
};
use crate::error::{Error, Result};

impl Orchestrator {
    /// Seed a thread for one persona, then try to get a reply on it from a
    /// different persona. The reply is best effort.
    pub async fn run_persona(&self, persona_id: &str) -> Result<RunPersonaReport> {
        let seeded = self.seed_thread(Some(persona_id)).await?;
        let mut results = vec![RunStep::Thread(seeded.clone())];

        match self.reply(&seeded.thread.id, None).await {
            Ok(reply) => results.push(RunStep::Reply(reply)),
            Err(e) => debug!(thread_id = %seeded.thread.id, reason = %e, "Follow-up reply skipped"),
        }

        Ok(RunPersonaReport {
            success: true,
            persona: seeded.persona,
            results,
        })
    }

    /// Run every active persona whose workflow is configured and enabled.
    ///
    /// Fails with `NoEligiblePersona` only when no active persona has a
    /// workflow configuration at all.
    pub async fn run_all(&self) -> Result<RunAllReport> {
        let personas: Vec<_> = self
            .registry
            .list(true)
            .await?
            .into_iter()
            .filter(|p| p.workflow_config.is_some())
            .collect();
        if personas.is_empty() {
            return Err(Error::no_persona("No active personas with workflow configs"));
        }

        let cap = self.batch.max_threads_per_persona.max(1);
        let mut results = Vec::new();
        for persona in personas.iter().filter(|p| p.workflow_enabled()) {
            let Some(ref workflow) = persona.workflow_config else {
                continue;
            };

            for _ in 0..workflow.threads_per_run.clamp(1, cap) {
                if !results.is_empty() {
                    self.pause(self.batch.run_all_delay_ms).await;
                }

                let entry = match self.seed_as(persona).await {
                    Ok(seeded) => {
                        let reply = if workflow.reply_after_seed {
                            self.reply(&seeded.thread.id, None)
                                .await
                                .map(|r| r.persona)
                                .map_err(|e| debug!(reason = %e, "Follow-up reply skipped"))
                                .ok()
                        } else {
                            None
                        };
                        PersonaRunResult {
                            persona: persona.name.clone(),
                            success: true,
                            thread: Some(seeded.thread.title),
                            reply,
                            error: None,
                        }
                    }
                    Err(e) => {
                        warn!(persona = %persona.slug, error = %e, "Workflow run failed");
                        PersonaRunResult {
                            persona: persona.name.clone(),
                            success: false,
                            thread: None,
                            reply: None,
                            error: Some(e.to_string()),
                        }
                    }
                };
                results.push(entry);
            }
        }

        let ran = results.iter().filter(|r| r.success).count() as u32;
        let failed = results.len() as u32 - ran;
        info!(ran, failed, "Workflows run");
        Ok(RunAllReport {
            success: true,
            ran,
            failed,
            results,
        })
    }

    /// Seed `count` threads (capped) for each listed persona.
    pub async fn batch_threads(
        &self,
        persona_ids: &[String],
        count: u32,
    ) -> Result<BatchThreadsReport> {
        if persona_ids.is_empty() {
            return Err(Error::bad_request("persona_ids required"));
        }
        let per_persona = count.min(self.batch.max_threads_per_persona);

        let mut results = Vec::new();
        for persona_id in persona_ids {
            for _ in 0..per_persona {
                if !results.is_empty() {
                    self.pause(self.batch.batch_delay_ms).await;
                }
                let entry = match self.seed_thread(Some(persona_id)).await {
                    Ok(seeded) => BatchThreadResult {
                        persona_id: persona_id.clone(),
                        persona: Some(seeded.persona),
                        success: true,
                        thread: Some(seeded.thread.title),
                        error: None,
                    },
                    Err(e) => {
                        warn!(persona_id = %persona_id, error = %e, "Batch thread failed");
                        BatchThreadResult {
                            persona_id: persona_id.clone(),
                            persona: None,
                            success: false,
                            thread: None,
                            error: Some(e.to_string()),
                        }
                    }
                };
                results.push(entry);
            }
        }

        let created = results.iter().filter(|r| r.success).count() as u32;
        info!(created, attempted = results.len(), "Batch threads done");
        Ok(BatchThreadsReport {
            success: true,
            created,
            results,
        })
    }

    /// One reply on each listed thread, by whichever persona ranks best.
    pub async fn batch_replies(&self, thread_ids: &[String]) -> Result<BatchRepliesReport> {
        if thread_ids.is_empty() {
            return Err(Error::bad_request("thread_ids required"));
        }

        let mut results = Vec::with_capacity(thread_ids.len());
        for (i, thread_id) in thread_ids.iter().enumerate() {
            if i > 0 {
                self.pause(self.batch.batch_delay_ms).await;
            }
            let entry = match self.reply(thread_id, None).await {
                Ok(reply) => BatchReplyResult {
                    thread_id: thread_id.clone(),
                    persona: Some(reply.persona),
                    success: true,
                    error: None,
                },
                Err(e) => {
                    warn!(thread_id = %thread_id, error = %e, "Batch reply failed");
                    BatchReplyResult {
                        thread_id: thread_id.clone(),
                        persona: None,
                        success: false,
                        error: Some(e.to_string()),
                    }
                }
            };
            results.push(entry);
        }

        let replied = results.iter().filter(|r| r.success).count() as u32;
        info!(replied, attempted = results.len(), "Batch replies done");
        Ok(BatchRepliesReport {
            success: true,
            replied,
            results,
        })
    }
}
