//! Prompt construction and response parsing for LLM-backed generators.

use serde::de::DeserializeOwned;

use super::{PriorPost, ThreadContext};
use crate::error::{Error, Result};
use crate::types::{Persona, TopicSeed};

fn profile_block(persona: &Persona) -> String {
    let p = &persona.personality;
    format!(
        "YOUR PROFILE:\n\
         - Role: {role}\n\
         - Bio: {bio}\n\
         - Expertise: {expertise}\n\
         - Tone: {tone}\n\
         - Verbosity: {verbosity}\n\
         - Emoji usage: {emoji}\n\
         - Knowledge level: {level}",
        role = persona.role.as_deref().unwrap_or("member"),
        bio = persona.bio.as_deref().unwrap_or("(none)"),
        expertise = persona.expertise.join(", "),
        tone = p.tone,
        verbosity = p.verbosity,
        emoji = p.emoji_usage,
        level = persona.knowledge_level,
    )
}

/// Prompt for a new thread.
pub fn thread_prompt(persona: &Persona, topic: Option<&TopicSeed>, forum_context: &str) -> String {
    let topic_block = match topic {
        Some(seed) => {
            let mut block = format!("TOPIC TO DISCUSS: {}\n", seed.topic);
            if let Some(ref hint) = seed.prompt_hint {
                block.push_str(&format!("HINT: {}\n", hint));
            }
            let target = seed
                .group
                .as_deref()
                .or_else(|| persona.preferred_groups.first().map(String::as_str))
                .unwrap_or("general");
            block.push_str(&format!("TARGET GROUP: {}", target));
            block
        }
        None => format!(
            "Pick a topic that fits your expertise: {}\nPost in one of your preferred groups: {}",
            persona.expertise.join(", "),
            persona.preferred_groups.join(", ")
        ),
    };

    let followup = if persona.personality.asks_followups {
        "End with a follow-up question to encourage discussion."
    } else {
        ""
    };

    format!(
        "You are {name}, posting on a community forum.\n\n\
         {profile}\n\n\
         {context}\n\n\
         {topic_block}\n\n\
         Write a forum thread: a question you genuinely have, a workflow you built, \
         a discussion starter, or a request for help with a specific integration.\n\
         Be authentic and write as this person would. Do not be promotional.\n\
         If you are a beginner, ask beginner questions. \
         If you are an expert, share nuanced insights.\n\
         {followup}\n\n\
         Respond in JSON:\n\
         {{\"title\": \"Thread title (10-80 chars)\", \
         \"body\": \"Thread body (2-6 paragraphs, markdown ok)\", \
         \"group_slug\": \"the group slug to post in\"}}",
        name = persona.name,
        profile = profile_block(persona),
        context = forum_context,
        topic_block = topic_block,
        followup = followup,
    )
}

/// Prompt for a reply.
pub fn reply_prompt(
    persona: &Persona,
    thread: &ThreadContext,
    prior_posts: &[PriorPost],
    forum_context: &str,
) -> String {
    let conversation = if prior_posts.is_empty() {
        "(No replies yet. You are the first to respond.)".to_string()
    } else {
        prior_posts
            .iter()
            .map(|p| format!("**{}**: {}", p.author_name, p.body))
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    let followup = if persona.personality.asks_followups {
        "Consider asking a follow-up question."
    } else {
        ""
    };

    format!(
        "You are {name}, replying to a forum thread.\n\n\
         {profile}\n\n\
         {context}\n\n\
         THREAD TITLE: {title}\n\
         ORIGINAL POST: {body}\n\n\
         CONVERSATION SO FAR:\n{conversation}\n\n\
         Write a reply in character and add something new: answer from experience, \
         share a tip or gotcha, ask a clarifying question, \
         or agree or disagree with a specific point.\n\
         Do NOT repeat what others said. Vary length naturally.\n\
         {followup}\n\n\
         Respond in JSON:\n\
         {{\"body\": \"Your reply (markdown ok, 1-4 paragraphs)\"}}",
        name = persona.name,
        profile = profile_block(persona),
        context = forum_context,
        title = thread.title,
        body = thread.body,
        conversation = conversation,
        followup = followup,
    )
}

/// Parse the outermost JSON object embedded in free text.
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let start = text.find('{');
    let end = text.rfind('}');
    let object = match (start, end) {
        (Some(s), Some(e)) if e > s => &text[s..=e],
        _ => return Err(Error::malformed("no JSON object in generator response")),
    };
    serde_json::from_str(object)
        .map_err(|e| Error::malformed(format!("invalid JSON in generator response: {}", e)))
}
