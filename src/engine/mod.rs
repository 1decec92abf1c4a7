//! Selection and guard rules
//!
//! - [`FairnessSelector`] decides who starts a thread and who replies.
//! - [`TopicPool`] rotates topic seeds by usage.
//! - [`ConversationGuard`] answers whether a thread may get another persona
//!   reply and who already took part.
//!
//! None of these write forum content; the orchestrator enforces their answers.

mod fairness;
mod guard;
mod topics;

pub use fairness::{score_for_reply, FairnessSelector};
pub use guard::ConversationGuard;
pub use topics::{TopicPool, DEFAULT_TOPIC_PRIORITY};
