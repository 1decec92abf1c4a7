//! Route handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::{ApiError, AppState};
use crate::error::{Error, Result};
use crate::types::{NewTopicSeed, WorkflowConfig};

/// Activity log entries returned by `GET /api/personas?activity=true`.
const ACTIVITY_LIMIT: usize = 50;

type ApiResult = std::result::Result<Response, ApiError>;

fn created<T: Serialize>(body: T) -> Response {
    (StatusCode::CREATED, Json(body)).into_response()
}

fn body<T>(
    payload: std::result::Result<Json<T>, JsonRejection>,
) -> std::result::Result<T, ApiError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| ApiError(Error::bad_request(e.body_text())))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::version::VERSION,
        "generator": state.orchestrator.generator_name(),
    }))
}

// ─────────────────────────────────────────────────────────────────
// Scheduled Trigger
// ─────────────────────────────────────────────────────────────────

/// GET /api/cron/personas
///
/// Once authorized, always 200 with the cycle summary.
pub async fn cron(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    state.credentials.check_cron(&headers)?;

    let summary = state.orchestrator.run_cycle_within(state.cycle_timeout).await;
    info!(summary = %summary.headline(), "Scheduled cycle served");

    let headline = summary.headline();
    let mut payload = serde_json::to_value(&summary).map_err(|e| ApiError(Error::Json(e)))?;
    if let Some(map) = payload.as_object_mut() {
        map.insert("ok".to_string(), json!(true));
        map.insert("summary".to_string(), json!(headline));
    }
    Ok(Json(payload).into_response())
}

// ─────────────────────────────────────────────────────────────────
// On-demand Conversation
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ConverseRequest {
    pub action: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub persona_id: Option<String>,
}

#[derive(Serialize)]
struct Tagged<T: Serialize> {
    action: &'static str,
    success: bool,
    #[serde(flatten)]
    outcome: T,
}

/// 201 with the outcome. A failure that stays inside the unit (resolution,
/// generation, persistence) is a 200 with `success: false`; anything else is
/// an error response.
fn unit_response<T: Serialize>(action: &'static str, result: Result<T>) -> ApiResult {
    match result {
        Ok(outcome) => Ok(created(Tagged {
            action,
            success: true,
            outcome,
        })),
        Err(e) if !e.rejects_on_demand() => {
            warn!(action, error = %e.format_for_log(), "On-demand action failed");
            let payload = json!({
                "action": action,
                "success": false,
                "error": e.to_string(),
                "code": e.code().as_str(),
                "kind": e.kind().as_str(),
            });
            Ok(Json(payload).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /api/personas/converse
pub async fn converse(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<ConverseRequest>, JsonRejection>,
) -> ApiResult {
    state.credentials.check_admin(&headers)?;
    let req = body(payload)?;
    let orchestrator = &state.orchestrator;

    match req.action.as_str() {
        "seed_thread" => unit_response(
            "seed_thread",
            orchestrator.seed_thread(req.persona_id.as_deref()).await,
        ),
        "reply" => {
            let thread_id = req
                .thread_id
                .ok_or_else(|| Error::bad_request("thread_id required for reply action"))?;
            unit_response(
                "reply",
                orchestrator
                    .reply(&thread_id, req.persona_id.as_deref())
                    .await,
            )
        }
        _ => Err(Error::bad_request("Invalid action. Use seed_thread or reply").into()),
    }
}

// ─────────────────────────────────────────────────────────────────
// Workflows
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WorkflowRequest {
    pub action: String,
    #[serde(default)]
    pub persona_id: Option<String>,
    /// Outer `None`: field absent. `Some(None)`: explicit `null`, which
    /// clears the persona's workflow configuration.
    #[serde(default, deserialize_with = "present")]
    pub config: Option<Option<WorkflowConfig>>,
    #[serde(default)]
    pub persona_ids: Vec<String>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub thread_ids: Vec<String>,
}

/// Keeps a present `null` apart from an absent field.
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// GET /api/personas/workflows
pub async fn workflows_overview(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    state.credentials.check_admin(&headers)?;
    let overview = state.orchestrator.registry().workflow_overview().await?;
    Ok(Json(overview).into_response())
}

/// POST /api/personas/workflows
pub async fn workflows_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<WorkflowRequest>, JsonRejection>,
) -> ApiResult {
    state.credentials.check_admin(&headers)?;
    let req = body(payload)?;
    let orchestrator = &state.orchestrator;
    let persona_id = || {
        req.persona_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError(Error::bad_request("persona_id required")))
    };

    match req.action.as_str() {
        "update_config" => {
            let id = persona_id()?;
            let config = req.config.clone().ok_or_else(|| {
                ApiError(Error::bad_request(
                    "config required for update_config (null clears it)",
                ))
            })?;
            orchestrator
                .registry()
                .update_workflow_config(&id, config)
                .await?;
            Ok(Json(json!({ "success": true, "persona_id": id })).into_response())
        }
        "run_persona" => {
            let id = persona_id()?;
            Ok(created(orchestrator.run_persona(&id).await?))
        }
        "run_all" => Ok(created(orchestrator.run_all().await?)),
        "batch_threads" => Ok(created(
            orchestrator
                .batch_threads(&req.persona_ids, req.count.unwrap_or(1))
                .await?,
        )),
        "batch_replies" => Ok(created(orchestrator.batch_replies(&req.thread_ids).await?)),
        _ => Err(Error::bad_request("Invalid action").into()),
    }
}

// ─────────────────────────────────────────────────────────────────
// Personas & Topic Seeds
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct PersonaListQuery {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub seeds: bool,
    #[serde(default)]
    pub activity: bool,
}

/// GET /api/personas
///
/// Personas by name; `seeds=true` adds the topic pool in rotation order and
/// `activity=true` the latest activity log entries.
pub async fn personas_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PersonaListQuery>,
) -> ApiResult {
    state.credentials.check_admin(&headers)?;
    let orchestrator = &state.orchestrator;

    let personas = orchestrator.registry().list(query.active).await?;
    let mut payload = json!({ "total": personas.len(), "personas": personas });
    if query.seeds {
        payload["seeds"] = json!(orchestrator.topics().list().await?);
    }
    if query.activity {
        payload["activity"] = json!(orchestrator.recent_activity(ACTIVITY_LIMIT).await?);
    }
    Ok(Json(payload).into_response())
}

#[derive(Debug, Deserialize)]
pub struct PersonasRequest {
    #[serde(rename = "_action", default)]
    pub action: Option<String>,
    #[serde(flatten)]
    pub seed: NewTopicSeed,
}

/// POST /api/personas
///
/// `{"_action": "add_seed", "topic": ..., "category": ..., "prompt_hint": ...,
/// "priority": ...}` adds a topic seed.
pub async fn personas_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<PersonasRequest>, JsonRejection>,
) -> ApiResult {
    state.credentials.check_admin(&headers)?;
    let req = body(payload)?;

    match req.action.as_deref() {
        Some("add_seed") => {
            let seed = state.orchestrator.topics().add_topic_seed(req.seed).await?;
            Ok(created(json!({ "seed": seed })))
        }
        _ => Err(Error::bad_request("Invalid action. Use add_seed").into()),
    }
}
