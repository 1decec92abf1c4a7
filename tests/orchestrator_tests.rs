//! Orchestrator integration tests
//!
//! End-to-end scenarios over the in-memory store and the mock generator.

mod common;

use std::sync::Arc;
use std::time::Duration;

use persona_engine::engine::TopicPool;
use persona_engine::generation::MockConfig;
use persona_engine::random::StdRandom;
use persona_engine::store::ForumStore;
use persona_engine::types::{ActivityLevel, WorkflowConfig};
use persona_engine::{Error, FailureKind};

use common::{test_config, Fixture};

// ─────────────────────────────────────────────────────────────────
// Batch Cycle
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_cycle_with_no_personas() {
    let fx = Fixture::new();
    let summary = tokio_test::block_on(fx.orchestrator.run_cycle());

    assert_eq!(summary.threads_seeded, 0);
    assert_eq!(summary.replies_made, 0);
    assert_eq!(summary.errors, vec!["No active personas available".to_string()]);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["threadsSeeded"], 0);
    assert_eq!(json["repliesMade"], 0);
}

#[tokio::test]
async fn test_cycle_seeds_with_high_activity_persona_and_topic() {
    let fx = Fixture::new();
    let persona = fx.add_persona("ana", ActivityLevel::High).await;
    let topic = fx.add_topic("Webhook retries", None).await;

    let summary = fx.orchestrator.run_cycle().await;

    assert_eq!(summary.threads_seeded, 1);
    assert!(summary.errors.is_empty(), "{:?}", summary.errors);
    assert!(summary.threads[0].contains("Notes on Webhook retries"));

    let topic = fx.store.get_topic_seed(&topic.id).await.unwrap().unwrap();
    assert_eq!(topic.used_count, 1);
    assert_eq!(topic.last_used_at, Some(fx.now()));

    let persona = fx.persona(&persona.id).await;
    assert_eq!(persona.last_active_at, Some(fx.now()));
    assert_eq!(persona.thread_count, 1);
}

#[tokio::test]
async fn test_cycle_skips_echo_thread_before_generation() {
    let mut config = test_config();
    config.engine.max_threads_per_cycle = 0;
    let fx = Fixture::with_config(config);

    let ana = fx.add_persona("ana", ActivityLevel::High).await;
    fx.add_persona("ben", ActivityLevel::High).await;
    let member = fx.add_member("Carla").await;
    let thread = fx.add_thread(&member, "How do you price retainers?").await;
    let ana_profile = fx.profile_of(&ana).await;
    fx.add_post(&thread, &ana_profile, "Monthly, with a cap.").await;

    let summary = fx.orchestrator.run_cycle().await;

    assert_eq!(summary.replies_made, 0);
    assert!(summary.errors.is_empty(), "{:?}", summary.errors);
    assert_eq!(fx.generator.call_count("generate_reply"), 0);
    assert_eq!(fx.thread(&thread.id).await.reply_count, 1);
}

#[tokio::test]
async fn test_cycle_replies_to_quiet_member_thread() {
    let mut config = test_config();
    config.engine.max_threads_per_cycle = 0;
    let fx = Fixture::with_config(config);

    let ana = fx.add_persona("ana", ActivityLevel::Moderate).await;
    let member = fx.add_member("Carla").await;
    let thread = fx.add_thread(&member, "First automation?").await;

    let summary = fx.orchestrator.run_cycle().await;

    assert_eq!(summary.replies_made, 1);
    assert_eq!(summary.replies.len(), 1);
    assert_eq!(fx.thread(&thread.id).await.reply_count, 1);
    assert_eq!(fx.persona(&ana.id).await.reply_count, 1);
}

#[tokio::test]
async fn test_cycle_records_generation_failure() {
    let fx = Fixture::with_mock(MockConfig {
        fail_thread: true,
        ..Default::default()
    });
    let persona = fx.add_persona("ana", ActivityLevel::High).await;

    let summary = fx.orchestrator.run_cycle().await;

    assert_eq!(summary.threads_seeded, 0);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].starts_with("Thread seed error (Ana)"));
    assert!(summary.errors[0].contains("E600"));

    // Nothing was posted, so the persona keeps its place in the queue
    assert_eq!(fx.persona(&persona.id).await.last_active_at, None);
}

#[tokio::test]
async fn test_cycle_survives_store_outage() {
    let fx = Fixture::new();
    fx.add_persona("ana", ActivityLevel::High).await;
    fx.store.set_unavailable(true);

    let summary = fx.orchestrator.run_cycle().await;

    assert_eq!(summary.threads_seeded, 0);
    assert_eq!(summary.replies_made, 0);
    assert_eq!(summary.errors.len(), 2);
    assert!(summary.errors[0].starts_with("Thread seed error"));
    assert!(summary.errors[1].starts_with("Reply error"));
    assert!(summary.errors.iter().all(|e| e.contains("E700")));
}

#[tokio::test]
async fn test_cycle_timeout_reports_partial_summary() {
    let fx = Fixture::with_mock(MockConfig {
        latency_ms: 500,
        ..Default::default()
    });
    fx.add_persona("ana", ActivityLevel::High).await;

    let summary = fx
        .orchestrator
        .run_cycle_within(Duration::from_millis(50))
        .await;

    assert_eq!(summary.threads_seeded, 0);
    assert!(summary
        .errors
        .last()
        .map_or(false, |e| e.starts_with("Cycle timed out")));
}

// ─────────────────────────────────────────────────────────────────
// Conversation Guard
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_reply_never_picks_a_participant() {
    let fx = Fixture::new();
    let ana = fx.add_persona("ana", ActivityLevel::High).await;
    fx.add_persona("ben", ActivityLevel::Moderate).await;
    fx.add_persona("cid", ActivityLevel::Low).await;
    let member = fx.add_member("Carla").await;

    let started = fx.orchestrator.seed_thread(Some(&ana.id)).await.unwrap();
    let thread = fx.thread(&started.thread.id).await;

    let mut seen = fx.orchestrator.guard().thread_persona_ids(&thread.id).await.unwrap();
    assert_eq!(seen, vec![ana.id.clone()]);

    for round in 0..2 {
        fx.add_post(&thread, &member, "Interesting, go on.").await;
        let reply = fx.orchestrator.reply(&thread.id, None).await.unwrap();
        assert!(!seen.contains(&reply.persona_id), "round {} repeated a persona", round);

        let now = fx.orchestrator.guard().thread_persona_ids(&thread.id).await.unwrap();
        assert!(seen.iter().all(|id| now.contains(id)), "participant set shrank");
        assert_eq!(now.len(), seen.len() + 1);
        seen = now;
    }

    // Everyone has taken part
    fx.add_post(&thread, &member, "Anyone else?").await;
    let err = fx.orchestrator.reply(&thread.id, None).await.unwrap_err();
    assert!(matches!(err, Error::NoEligiblePersona { .. }));
    assert_eq!(err.kind(), FailureKind::SelectionEmpty);
}

#[tokio::test]
async fn test_depth_limit() {
    let mut config = test_config();
    config.engine.max_conversation_depth = 3;
    let fx = Fixture::with_config(config);
    fx.add_persona("ana", ActivityLevel::High).await;
    fx.add_persona("ben", ActivityLevel::High).await;

    let member = fx.add_member("Carla").await;
    let thread = fx.add_thread(&member, "Scaling a two-person agency").await;
    fx.add_post(&thread, &member, "Some context.").await;
    fx.add_post(&thread, &member, "More context.").await;
    assert!(fx.orchestrator.guard().should_respond(&thread.id).await.unwrap());

    fx.orchestrator.reply(&thread.id, None).await.unwrap();

    assert_eq!(fx.thread(&thread.id).await.reply_count, 3);
    assert!(!fx.orchestrator.guard().should_respond(&thread.id).await.unwrap());

    let err = fx.orchestrator.reply(&thread.id, None).await.unwrap_err();
    assert!(matches!(err, Error::DepthReached { max_depth: 3, .. }));
}

#[tokio::test]
async fn test_reply_on_locked_thread_is_conflict() {
    let fx = Fixture::new();
    fx.add_persona("ana", ActivityLevel::High).await;
    let member = fx.add_member("Carla").await;
    let thread = fx.add_thread(&member, "Archived announcement").await;
    fx.store.set_thread_locked(&thread.id, true).await.unwrap();

    let err = fx.orchestrator.reply(&thread.id, None).await.unwrap_err();

    assert!(matches!(err, Error::ThreadLocked { .. }));
    assert_eq!(err.http_status(), 409);
    assert_eq!(fx.generator.call_count("generate_reply"), 0);
    assert_eq!(fx.thread(&thread.id).await.reply_count, 0);
}

#[tokio::test]
async fn test_on_demand_reply_enforces_anti_echo() {
    let fx = Fixture::new();
    let ana = fx.add_persona("ana", ActivityLevel::High).await;
    let ben = fx.add_persona("ben", ActivityLevel::High).await;
    let member = fx.add_member("Carla").await;
    let thread = fx.add_thread(&member, "Zapier or Make?").await;

    fx.orchestrator.reply(&thread.id, Some(&ana.id)).await.unwrap();

    let err = fx
        .orchestrator
        .reply(&thread.id, Some(&ben.id))
        .await
        .unwrap_err();
    assert_eq!(err.code().as_str(), "E502");

    // A human answer re-opens the thread, but not to a repeat participant
    fx.add_post(&thread, &member, "Thanks! What about n8n?").await;
    let err = fx
        .orchestrator
        .reply(&thread.id, Some(&ana.id))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyParticipated { .. }));

    let reply = fx.orchestrator.reply(&thread.id, Some(&ben.id)).await.unwrap();
    assert_eq!(reply.persona, "Ben");
}

// ─────────────────────────────────────────────────────────────────
// Topic Rotation
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_topic_usage_counts_every_use() {
    let fx = Fixture::new();
    let seed = fx.add_topic("Client onboarding", Some("general")).await;
    let pool = TopicPool::new(fx.store.clone(), fx.clock.clone());

    for n in 0..4 {
        assert!(pool.mark_topic_used(&seed.id, n).await.unwrap());
    }

    let seed = fx.store.get_topic_seed(&seed.id).await.unwrap().unwrap();
    assert_eq!(seed.used_count, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_topic_marks_land_once() {
    let fx = Fixture::new();
    let seed = fx.add_topic("Client onboarding", None).await;
    let pool = Arc::new(TopicPool::new(fx.store.clone(), fx.clock.clone()));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let pool = pool.clone();
            let id = seed.id.clone();
            tokio::spawn(async move { pool.mark_topic_used(&id, 0).await.unwrap() })
        })
        .collect();

    let mut applied = 0;
    for handle in handles {
        if handle.await.unwrap() {
            applied += 1;
        }
    }

    assert_eq!(applied, 1);
    let seed = fx.store.get_topic_seed(&seed.id).await.unwrap().unwrap();
    assert_eq!(seed.used_count, 1);
}

// ─────────────────────────────────────────────────────────────────
// On-demand & Batch Helpers
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_slug_collision_retries_then_gives_up() {
    let fx = Fixture::with_mock(MockConfig {
        fixed_title: Some("Same title every time".into()),
        ..Default::default()
    });
    let ana = fx.add_persona("ana", ActivityLevel::High).await;

    let first = fx.orchestrator.seed_thread(Some(&ana.id)).await.unwrap();
    let second = fx.orchestrator.seed_thread(Some(&ana.id)).await.unwrap();
    assert_eq!(second.thread.slug, format!("{}-0000", first.thread.slug));

    // Base slug and the only suffix this scripted rng produces are both taken
    let err = fx.orchestrator.seed_thread(Some(&ana.id)).await.unwrap_err();
    assert!(matches!(err, Error::SlugConflict { .. }));
    assert_eq!(err.kind(), FailureKind::Persistence);
}

#[tokio::test]
async fn test_seed_thread_without_personas() {
    let fx = Fixture::new();
    let err = fx.orchestrator.seed_thread(None).await.unwrap_err();
    assert_eq!(err.http_status(), 404);

    let err = fx.orchestrator.seed_thread(Some("missing")).await.unwrap_err();
    assert!(matches!(err, Error::PersonaNotFound { .. }));
}

#[tokio::test]
async fn test_run_persona_seeds_then_replies() {
    let fx = Fixture::new();
    let ana = fx.add_persona("ana", ActivityLevel::High).await;
    fx.add_persona("ben", ActivityLevel::High).await;

    let report = fx.orchestrator.run_persona(&ana.id).await.unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["success"], true);
    assert_eq!(json["persona"], "Ana");
    assert_eq!(json["results"][0]["action"], "thread");
    assert_eq!(json["results"][1]["action"], "reply");
    assert_eq!(json["results"][1]["persona"], "Ben");
}

#[tokio::test]
async fn test_batch_threads_caps_per_persona() {
    let fx = Fixture::new();
    let ana = fx.add_persona("ana", ActivityLevel::Low).await;
    for topic in ["Pricing", "Hiring", "Tooling", "Reporting"] {
        fx.add_topic(topic, None).await;
    }

    let report = fx
        .orchestrator
        .batch_threads(&[ana.id.clone(), "ghost".to_string()], 10)
        .await
        .unwrap();

    // Three for ana, three failed attempts for the unknown id
    assert_eq!(report.results.len(), 6);
    assert_eq!(report.created, 3);
    assert!(report.results[3..].iter().all(|r| !r.success && r.error.is_some()));
    assert_eq!(fx.persona(&ana.id).await.thread_count, 3);

    let err = fx.orchestrator.batch_threads(&[], 1).await.unwrap_err();
    assert!(matches!(err, Error::BadRequest { .. }));
}

#[tokio::test]
async fn test_batch_replies_reports_each_thread() {
    let fx = Fixture::new();
    fx.add_persona("ana", ActivityLevel::High).await;
    let member = fx.add_member("Carla").await;
    let open = fx.add_thread(&member, "Open question").await;
    let locked = fx.add_thread(&member, "Locked question").await;
    fx.store.set_thread_locked(&locked.id, true).await.unwrap();

    let report = fx
        .orchestrator
        .batch_replies(&[open.id.clone(), locked.id.clone()])
        .await
        .unwrap();

    assert_eq!(report.replied, 1);
    assert!(report.results[0].success);
    assert!(!report.results[1].success);
    assert!(report.results[1]
        .error
        .as_deref()
        .map_or(false, |e| e.contains("locked")));
}

#[tokio::test]
async fn test_run_all_honours_workflow_config() {
    let fx = Fixture::new();
    let ana = fx
        .add_persona_with_workflow(
            "ana",
            WorkflowConfig {
                threads_per_run: 2,
                ..Default::default()
            },
        )
        .await;
    fx.add_persona_with_workflow(
        "ben",
        WorkflowConfig {
            enabled: false,
            ..Default::default()
        },
    )
    .await;
    fx.add_persona("cid", ActivityLevel::High).await;
    fx.add_topic("Pricing", None).await;
    fx.add_topic("Hiring", None).await;

    let report = fx.orchestrator.run_all().await.unwrap();

    assert_eq!(report.ran, 2);
    assert_eq!(report.failed, 0);
    assert!(report.results.iter().all(|r| r.persona == "Ana"));
    assert_eq!(fx.persona(&ana.id).await.thread_count, 2);
}

#[tokio::test]
async fn test_run_all_without_workflows() {
    let fx = Fixture::new();
    fx.add_persona("ana", ActivityLevel::High).await;

    let err = fx.orchestrator.run_all().await.unwrap_err();
    assert!(matches!(err, Error::NoEligiblePersona { .. }));
}

#[tokio::test]
async fn test_seeded_rng_runs_a_full_cycle() {
    let fx = Fixture::with(test_config(), MockConfig::default(), StdRandom::from_seed(42));
    for slug in ["ana", "ben", "cid", "dee"] {
        fx.add_persona(slug, ActivityLevel::High).await;
    }
    fx.add_topic("Pricing", None).await;

    let summary = fx.orchestrator.run_cycle().await;

    assert!(summary.threads_seeded >= 1);
    assert!(summary.errors.is_empty(), "{:?}", summary.errors);
    assert_eq!(summary.threads.len(), summary.threads_seeded as usize);
}

// ─────────────────────────────────────────────────────────────────
// Activity Log
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_seed_and_reply_are_logged() {
    let fx = Fixture::with_mock(MockConfig {
        fixed_body: Some("z".repeat(300)),
        ..Default::default()
    });
    let ana = fx.add_persona("ana", ActivityLevel::High).await;
    let ben = fx.add_persona("ben", ActivityLevel::High).await;

    let seeded = fx.orchestrator.seed_thread(Some(&ana.id)).await.unwrap();
    fx.clock.advance(chrono::Duration::minutes(5));
    let replied = fx
        .orchestrator
        .reply(&seeded.thread.id, Some(&ben.id))
        .await
        .unwrap();

    let log = fx.orchestrator.recent_activity(10).await.unwrap();
    assert_eq!(log.len(), 2);

    assert_eq!(log[0].persona_id, ben.id);
    assert_eq!(log[0].action.to_string(), "replied");
    assert_eq!(log[0].post_id.as_deref(), Some(replied.post_id.as_str()));
    assert_eq!(log[0].content_preview.chars().count(), 200);

    assert_eq!(log[1].persona_id, ana.id);
    assert_eq!(log[1].action.to_string(), "created_thread");
    assert_eq!(log[1].content_preview, seeded.thread.title);
    assert!(log[1].post_id.is_none());
    assert_eq!(log[1].created_at, fx.now() - chrono::Duration::minutes(5));
}

#[tokio::test]
async fn test_failed_seed_is_not_logged() {
    let fx = Fixture::with_mock(MockConfig {
        fail_thread: true,
        ..Default::default()
    });
    let ana = fx.add_persona("ana", ActivityLevel::High).await;

    assert!(fx.orchestrator.seed_thread(Some(&ana.id)).await.is_err());
    assert!(fx.orchestrator.recent_activity(10).await.unwrap().is_empty());
}
