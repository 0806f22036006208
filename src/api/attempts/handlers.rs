use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_own_attempt, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::AttemptStatus;
use crate::repositories;
use crate::schemas::attempt::{attempt_response, ResponseUpsert, SavedResponse, SubmitRequest};
use crate::services::attempt_submission::{load_result, submit_attempt as submit, SubmitTrigger};
use crate::services::attempt_timing;
use crate::session::model::{Attempt, GradeResult};

pub(super) async fn get_attempt(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<Json<Attempt>, ApiError> {
    let attempt = require_own_attempt(&state, &user, &attempt_id).await?;
    Ok(Json(attempt_response(&attempt)))
}

pub(super) async fn list_responses(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<Json<HashMap<String, String>>, ApiError> {
    let attempt = require_own_attempt(&state, &user, &attempt_id).await?;
    let answers = repositories::responses::answers_by_attempt(state.db(), &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load responses"))?;
    Ok(Json(answers))
}

pub(super) async fn save_response(
    user: CurrentUser,
    State(state): State<AppState>,
    Path((attempt_id, question_id)): Path<(String, String)>,
    Json(payload): Json<ResponseUpsert>,
) -> Result<Json<SavedResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let attempt = require_own_attempt(&state, &user, &attempt_id).await?;
    if attempt.status == AttemptStatus::Submitted {
        return Err(ApiError::Conflict("Attempt already submitted".to_string()));
    }

    let exam = repositories::exams::find_by_id(state.db(), &attempt.exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    let now = primitive_now_utc();
    let grace = state.settings().attempts().grace_seconds();
    if !attempt_timing::accepts_writes(exam.time_limit_minutes, attempt.started_at, grace, now) {
        return Err(ApiError::Conflict("Time limit exceeded".to_string()));
    }

    let known = repositories::questions::exists_in_exam(state.db(), &exam.id, &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check question"))?;
    if !known {
        return Err(ApiError::NotFound("Question not found".to_string()));
    }

    let saved = repositories::responses::upsert(
        state.db(),
        &attempt.id,
        &question_id,
        &payload.answer,
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to save response"))?;

    tracing::debug!(attempt_id = %attempt.id, question_id = %question_id, "Response saved");
    Ok(Json(SavedResponse::from(saved)))
}

pub(super) async fn submit_attempt(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<GradeResult>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let attempt = require_own_attempt(&state, &user, &attempt_id).await?;
    if attempt.status == AttemptStatus::Submitted {
        let result = load_result(state.db(), &attempt)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load result"))?;
        return Ok(Json(result));
    }

    let exam = repositories::exams::find_by_id(state.db(), &attempt.exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    let time_spent = attempt_timing::clamp_time_spent(
        payload.time_spent_seconds,
        exam.time_limit_minutes,
        attempt.started_at,
        primitive_now_utc(),
    );

    let submitted =
        submit(state.db(), state.essays(), &attempt.id, time_spent, SubmitTrigger::Student).await?;
    Ok(Json(submitted.result))
}

pub(super) async fn get_result(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<Json<GradeResult>, ApiError> {
    let attempt = require_own_attempt(&state, &user, &attempt_id).await?;
    if attempt.status != AttemptStatus::Submitted {
        return Err(ApiError::Conflict("Attempt has not been submitted".to_string()));
    }

    let result = load_result(state.db(), &attempt)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load result"))?;
    Ok(Json(result))
}
