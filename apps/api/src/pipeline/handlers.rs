use axum::{extract::State, Json};
use serde::Deserialize;

use crate::errors::AppError;
use crate::pipeline::audit::{Audit, AuditRequest};
use crate::pipeline::decision::{Decision, DecisionRequest};
use crate::pipeline::evaluation::{Evaluation, EvaluationRequest};
use crate::pipeline::question::QuestionSet;
use crate::pipeline::StageResponse;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct QuestionsRequest {
    pub role: String,
}

/// POST /api/v1/interview/questions
pub async fn handle_questions(
    State(state): State<AppState>,
    Json(req): Json<QuestionsRequest>,
) -> Result<Json<StageResponse<QuestionSet>>, AppError> {
    let role = req.role.trim();
    if role.is_empty() {
        return Err(AppError::Validation("role must not be empty".to_string()));
    }
    let outcome = state.pipeline.questions_for_role(role).await?;
    Ok(Json(outcome.into()))
}

/// POST /api/v1/interview/evaluate
pub async fn handle_evaluate(
    State(state): State<AppState>,
    Json(req): Json<EvaluationRequest>,
) -> Result<Json<StageResponse<Evaluation>>, AppError> {
    Ok(Json(state.pipeline.evaluate(&req).await.into()))
}

/// POST /api/v1/interview/audit
pub async fn handle_audit(
    State(state): State<AppState>,
    Json(req): Json<AuditRequest>,
) -> Result<Json<StageResponse<Audit>>, AppError> {
    if !req.evaluation_json.is_object() {
        return Err(AppError::Validation(
            "evaluation_json must be a JSON object".to_string(),
        ));
    }
    Ok(Json(state.pipeline.audit(&req).await.into()))
}

/// POST /api/v1/interview/decision
pub async fn handle_decision(
    State(state): State<AppState>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<StageResponse<Decision>>, AppError> {
    if req.rounds.is_empty() {
        return Err(AppError::Validation("rounds must not be empty".to_string()));
    }
    Ok(Json(state.pipeline.decide(&req).await.into()))
}
