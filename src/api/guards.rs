use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::models::{Exam, ExamAttempt};
use crate::repositories;

/// Student identified by the auth provider's bearer token.
#[derive(Debug, Clone)]
pub(crate) struct CurrentUser {
    pub(crate) id: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        if claims.is_anonymous() {
            return Err(ApiError::Unauthorized("Sign in to take exams"));
        }

        Ok(CurrentUser { id: claims.sub })
    }
}

/// Loads an exam the user may see. Hidden exams are reported as missing.
pub(crate) async fn require_visible_exam(
    state: &AppState,
    user: &CurrentUser,
    exam_id: &str,
) -> Result<Exam, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam"))?;

    match exam {
        Some(exam) if exam.visible_to(&user.id) => Ok(exam),
        _ => Err(ApiError::NotFound("Exam not found".to_string())),
    }
}

pub(crate) async fn require_own_attempt(
    state: &AppState,
    user: &CurrentUser,
    attempt_id: &str,
) -> Result<ExamAttempt, ApiError> {
    let attempt = repositories::attempts::find_by_id(state.db(), attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    if attempt.user_id != user.id {
        return Err(ApiError::Forbidden("Not enough permissions"));
    }

    Ok(attempt)
}
