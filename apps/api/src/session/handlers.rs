use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::pipeline::decision::RoundEvaluation;
use crate::session::{Round, Session, SessionSummary};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct OwnerQuery {
    pub owner_id: String,
}

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub owner_id: String,
    pub role: String,
}

#[derive(Deserialize)]
pub struct AddRoundRequest {
    pub owner_id: String,
    pub round_evaluation: RoundEvaluation,
}

#[derive(Deserialize)]
pub struct CompleteSessionRequest {
    pub owner_id: String,
}

fn require_owner(owner_id: &str) -> Result<(), AppError> {
    if owner_id.trim().is_empty() {
        return Err(AppError::Validation("owner_id must not be empty".to_string()));
    }
    Ok(())
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionSummary>), AppError> {
    require_owner(&req.owner_id)?;
    if req.role.trim().is_empty() {
        return Err(AppError::Validation("role must not be empty".to_string()));
    }
    let session = state.sessions.create(&req.owner_id, req.role.trim()).await?;
    Ok((StatusCode::CREATED, Json(session.summary())))
}

/// GET /api/v1/sessions?owner_id=
pub async fn handle_list_sessions(
    State(state): State<AppState>,
    Query(params): Query<OwnerQuery>,
) -> Result<Json<Vec<SessionSummary>>, AppError> {
    require_owner(&params.owner_id)?;
    Ok(Json(state.sessions.list_for_owner(&params.owner_id).await?))
}

/// GET /api/v1/sessions/:id?owner_id=
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<OwnerQuery>,
) -> Result<Json<Session>, AppError> {
    require_owner(&params.owner_id)?;
    Ok(Json(state.sessions.get(&params.owner_id, id).await?))
}

/// POST /api/v1/sessions/:id/rounds
pub async fn handle_add_round(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddRoundRequest>,
) -> Result<(StatusCode, Json<Round>), AppError> {
    require_owner(&req.owner_id)?;
    let round = state
        .sessions
        .add_round(&req.owner_id, id, &req.round_evaluation)
        .await?;
    Ok((StatusCode::CREATED, Json(round)))
}

/// POST /api/v1/sessions/:id/complete
pub async fn handle_complete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CompleteSessionRequest>,
) -> Result<Json<Session>, AppError> {
    require_owner(&req.owner_id)?;
    Ok(Json(state.sessions.complete(&req.owner_id, id).await?))
}
