use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_visible_exam, CurrentUser};
use crate::api::pagination::{PageParams, PaginatedResponse};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::attempt::attempt_response;
use crate::schemas::exam::{exam_response, ExamCreate, ExamSummary};
use crate::session::model::{Attempt, Exam as ExamView};

pub(super) async fn create_exam(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ExamCreate>,
) -> Result<(StatusCode, Json<ExamView>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    payload.check_questions().map_err(ApiError::BadRequest)?;

    let now = primitive_now_utc();
    let exam_id = Uuid::new_v4().to_string();
    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let exam = repositories::exams::create(
        &mut *tx,
        repositories::exams::CreateExam {
            id: &exam_id,
            user_id: &user.id,
            title: payload.title.trim(),
            description: payload.description.as_deref(),
            time_limit_minutes: payload.time_limit_minutes,
            is_public: payload.is_public,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create exam"))?;

    let mut questions = Vec::with_capacity(payload.questions.len());
    for (position, question) in payload.questions.into_iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| ApiError::BadRequest("too many questions".to_string()))?;
        let created = repositories::questions::create(
            &mut *tx,
            repositories::questions::CreateQuestion {
                id: &Uuid::new_v4().to_string(),
                exam_id: &exam_id,
                question_type: question.question_type,
                question: &question.question,
                options: question.options,
                correct_answer: question.correct_answer.as_deref().map(str::trim),
                points: question.points,
                position,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create question"))?;
        questions.push(created);
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit exam"))?;

    tracing::info!(exam_id = %exam.id, user_id = %user.id, questions = questions.len(), "Exam created");
    Ok((StatusCode::CREATED, Json(exam_response(exam, questions))))
}

pub(super) async fn list_exams(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> Result<Json<PaginatedResponse<ExamSummary>>, ApiError> {
    let exams = repositories::exams::list_visible(state.db(), &user.id, page.skip(), page.limit())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;
    let total_count = repositories::exams::count_visible(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count exams"))?;

    Ok(Json(PaginatedResponse::new(
        exams.into_iter().map(ExamSummary::from).collect(),
        total_count,
        page,
    )))
}

pub(super) async fn get_exam(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(exam_id): Path<String>,
) -> Result<Json<ExamView>, ApiError> {
    let exam = require_visible_exam(&state, &user, &exam_id).await?;
    let questions = repositories::questions::list_by_exam(state.db(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;

    Ok(Json(exam_response(exam, questions)))
}

pub(super) async fn get_in_progress_attempt(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(exam_id): Path<String>,
) -> Result<Json<Option<Attempt>>, ApiError> {
    let exam = require_visible_exam(&state, &user, &exam_id).await?;
    let attempt = repositories::attempts::find_in_progress(state.db(), &exam.id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load attempt"))?;

    Ok(Json(attempt.as_ref().map(attempt_response)))
}

/// Creates an attempt, or returns the one already in progress for this exam.
pub(super) async fn start_attempt(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(exam_id): Path<String>,
) -> Result<(StatusCode, Json<Attempt>), ApiError> {
    let exam = require_visible_exam(&state, &user, &exam_id).await?;

    if let Some(existing) = repositories::attempts::find_in_progress(state.db(), &exam.id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load attempt"))?
    {
        return Ok((StatusCode::OK, Json(attempt_response(&existing))));
    }

    let now = primitive_now_utc();
    let attempt_id = Uuid::new_v4().to_string();
    let created = repositories::attempts::create(
        state.db(),
        repositories::attempts::CreateAttempt {
            id: &attempt_id,
            exam_id: &exam.id,
            user_id: &user.id,
            started_at: now,
            created_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create attempt"))?;

    let attempt = repositories::attempts::find_in_progress(state.db(), &exam.id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load attempt"))?
        .ok_or_else(|| ApiError::Internal("Attempt missing after create".to_string()))?;

    if !created {
        tracing::debug!(exam_id = %exam.id, user_id = %user.id, "Concurrent start resolved to existing attempt");
        return Ok((StatusCode::OK, Json(attempt_response(&attempt))));
    }

    metrics::counter!("exam_attempts_started_total").increment(1);
    tracing::info!(exam_id = %exam.id, attempt_id = %attempt.id, user_id = %user.id, "Attempt started");
    Ok((StatusCode::CREATED, Json(attempt_response(&attempt))))
}
