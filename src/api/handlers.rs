//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    ActionResponse, AnswerRequest, BudgetTiersResponse, ErrorResponse, ModelsResponse,
    QuestionsResponse, StartRequest, SuccessResponse,
};
use super::AppState;
use crate::runtime::{SessionError, SessionHandle, SessionView, SseEvent};
use crate::state_machine::{Event, TransitionError};
use crate::trip::{BudgetTier, TripMetadata};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session lifecycle
        .route("/api/sessions", post(create_session))
        .route(
            "/api/sessions/:id",
            get(get_session).delete(delete_session),
        )
        // SSE streaming
        .route("/api/sessions/:id/stream", get(stream_session))
        // User actions
        .route("/api/sessions/:id/start", post(start_interview))
        .route("/api/sessions/:id/answer", post(answer_question))
        .route("/api/sessions/:id/cancel", post(cancel_session))
        // Form and model info
        .route("/api/questions", get(list_questions))
        .route("/api/budget-tiers", get(list_budget_tiers))
        .route("/api/models", get(list_models))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

async fn find_session(state: &AppState, id: &str) -> Result<SessionHandle, AppError> {
    state
        .runtime
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))
}

// ============================================================
// Session Lifecycle
// ============================================================

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let handle = state.runtime.create_session().await;
    (StatusCode::CREATED, Json(handle.view()))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let handle = find_session(&state, &id).await?;
    Ok(Json(handle.view()))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if state.runtime.remove(&id).await {
        Ok(Json(SuccessResponse { success: true }))
    } else {
        Err(AppError::NotFound(format!("Session not found: {id}")))
    }
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = find_session(&state, &id).await?;

    // Subscribe before taking the snapshot so no update falls in between
    let broadcast_rx = handle.subscribe();
    let init_event = SseEvent::Init {
        view: handle.view(),
    };

    Ok(sse_stream(init_event, broadcast_rx))
}

// ============================================================
// User Actions
// ============================================================

async fn start_interview(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StartRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let handle = find_session(&state, &id).await?;

    let metadata = match TripMetadata::new(
        &req.destination,
        req.start_date,
        req.end_date,
        req.party_size,
        req.budget,
    ) {
        Ok(metadata) => metadata,
        Err(e) => return Ok(Json(ActionResponse::rejected(e.to_string(), handle.view()))),
    };

    let result = handle.send(Event::Start { metadata }).await;
    action_response(&handle, result)
}

async fn answer_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let handle = find_session(&state, &id).await?;
    let result = handle.send(Event::Answer { text: req.text }).await;
    action_response(&handle, result)
}

async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    let handle = find_session(&state, &id).await?;
    let result = handle.send(Event::Cancel).await;
    action_response(&handle, result)
}

/// Validation failures are absorbed into `accepted: false`; actions that do
/// not fit the current state are conflicts.
fn action_response(
    handle: &SessionHandle,
    result: Result<SessionView, SessionError>,
) -> Result<Json<ActionResponse>, AppError> {
    match result {
        Ok(view) => Ok(Json(ActionResponse::accepted(view))),
        Err(SessionError::Transition(e)) if e.is_validation() => {
            Ok(Json(ActionResponse::rejected(e.to_string(), handle.view())))
        }
        Err(SessionError::Transition(
            e @ (TransitionError::NoActiveInterview
            | TransitionError::GenerationInProgress
            | TransitionError::InvalidTransition(_)),
        )) => Err(AppError::Conflict(e.to_string())),
        Err(SessionError::Transition(e)) => Err(AppError::Internal(e.to_string())),
        Err(SessionError::Closed) => Err(AppError::NotFound(format!(
            "Session not found: {}",
            handle.session_id
        ))),
    }
}

// ============================================================
// Form and Model Info
// ============================================================

async fn list_questions(State(state): State<AppState>) -> Json<QuestionsResponse> {
    Json(QuestionsResponse {
        questions: state
            .runtime
            .questions()
            .iter()
            .map(str::to_string)
            .collect(),
    })
}

async fn list_budget_tiers() -> Json<BudgetTiersResponse> {
    Json(BudgetTiersResponse {
        budget_tiers: BudgetTier::ALL.iter().map(|tier| tier.label()).collect(),
    })
}

async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.llm_registry.available_model_info(),
        default: state.llm_registry.default_model_id().to_string(),
    })
}

async fn get_version() -> &'static str {
    concat!("itinerary-wizard ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
