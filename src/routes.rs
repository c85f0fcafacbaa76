//! HTTP routes.
//!
//! Handlers are thin: they pull path and body values out of the request,
//! call the service and map engine errors onto status codes.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::error::{DialogueError, QuestError};
use crate::protocol::{ErrorResponse, PlayerSnapshot, SelectOptionRequest, TriggerRequest};
use crate::service::QuestService;

pub type AppState = Arc<QuestService>;

/// Engine failure carried out of a handler
#[derive(Debug)]
pub enum ApiError {
    Quest(QuestError),
    Dialogue(DialogueError),
}

impl From<QuestError> for ApiError {
    fn from(e: QuestError) -> Self {
        ApiError::Quest(e)
    }
}

impl From<DialogueError> for ApiError {
    fn from(e: DialogueError) -> Self {
        ApiError::Dialogue(e)
    }
}

fn quest_status_code(e: &QuestError) -> StatusCode {
    match e {
        QuestError::QuestNotFound(_) | QuestError::ObjectiveNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        QuestError::InvalidProgress { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        QuestError::NoStages(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::CONFLICT,
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Quest(e) => quest_status_code(e),
            ApiError::Dialogue(DialogueError::Quest(e)) => quest_status_code(e),
            ApiError::Dialogue(
                DialogueError::NpcNotFound(_) | DialogueError::OptionNotFound { .. },
            ) => StatusCode::NOT_FOUND,
            ApiError::Dialogue(DialogueError::RequirementNotMet { .. }) => StatusCode::CONFLICT,
            ApiError::Dialogue(
                DialogueError::MissingQuestId(_) | DialogueError::MissingObjectiveId(_),
            ) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = match &self {
            ApiError::Quest(e) => e.to_string(),
            ApiError::Dialogue(e) => e.to_string(),
        };
        (self.status(), Json(ErrorResponse { error })).into_response()
    }
}

pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/quests", get(list_quests))
        .route("/api/players/:player/quests", get(journal))
        .route("/api/players/:player/quests/available", get(available_quests))
        .route("/api/players/:player/quests/:quest", get(quest_details))
        .route("/api/players/:player/quests/:quest/start", post(start_quest))
        .route("/api/players/:player/quests/:quest/complete", post(complete_quest))
        .route("/api/players/:player/quests/:quest/confirm", post(confirm_stage))
        .route("/api/players/:player/quests/:quest/abandon", post(abandon_quest))
        .route(
            "/api/players/:player/quests/:quest/objectives/:objective/reveal",
            post(reveal_objective),
        )
        .route("/api/players/:player/events", post(trigger))
        .route("/api/players/:player/npcs/:npc/dialogue", get(dialogue))
        .route("/api/players/:player/npcs/:npc/select", post(select_option))
        .route("/api/players/:player/snapshot", get(snapshot).put(restore))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .with_state(service)
}

async fn health_check() -> impl IntoResponse {
    "OK"
}

async fn list_quests(State(service): State<AppState>) -> impl IntoResponse {
    Json(service.list_quests().await)
}

async fn journal(
    State(service): State<AppState>,
    Path(player): Path<String>,
) -> impl IntoResponse {
    Json(service.journal(&player).await)
}

async fn available_quests(
    State(service): State<AppState>,
    Path(player): Path<String>,
) -> impl IntoResponse {
    Json(service.available_quests(&player).await)
}

async fn quest_details(
    State(service): State<AppState>,
    Path((player, quest)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(service.quest_details(&player, &quest).await?))
}

async fn start_quest(
    State(service): State<AppState>,
    Path((player, quest)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let details = service.start_quest(&player, &quest).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

async fn complete_quest(
    State(service): State<AppState>,
    Path((player, quest)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let rewards = service.complete_quest(&player, &quest).await?;
    Ok(Json(json!({ "quest_id": quest, "rewards": rewards })))
}

async fn confirm_stage(
    State(service): State<AppState>,
    Path((player, quest)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let (advance, rewards) = service.confirm_stage(&player, &quest).await?;
    Ok(Json(json!({ "advance": advance, "rewards": rewards })))
}

async fn abandon_quest(
    State(service): State<AppState>,
    Path((player, quest)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    service.abandon_quest(&player, &quest).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reveal_objective(
    State(service): State<AppState>,
    Path((player, quest, objective)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let newly_revealed = service.reveal_objective(&player, &quest, &objective).await?;
    Ok(Json(json!({ "revealed": newly_revealed })))
}

async fn trigger(
    State(service): State<AppState>,
    Path(player): Path<String>,
    Json(request): Json<TriggerRequest>,
) -> impl IntoResponse {
    let (action, target, quantity) = request.trigger();
    Json(service.trigger(&player, action, target, quantity).await)
}

async fn dialogue(
    State(service): State<AppState>,
    Path((player, npc)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(service.dialogue(&player, &npc).await?))
}

async fn select_option(
    State(service): State<AppState>,
    Path((player, npc)): Path<(String, String)>,
    Json(request): Json<SelectOptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(service.select_option(&player, &npc, &request.option_id).await?))
}

async fn snapshot(
    State(service): State<AppState>,
    Path(player): Path<String>,
) -> impl IntoResponse {
    Json(service.snapshot(&player).await)
}

async fn restore(
    State(service): State<AppState>,
    Path(player): Path<String>,
    Json(snapshot): Json<PlayerSnapshot>,
) -> Result<impl IntoResponse, ApiError> {
    service.restore(&player, snapshot).await?;
    Ok(StatusCode::NO_CONTENT)
}
