use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::ExamAttempt;
use crate::db::types::AttemptStatus;

pub(crate) const COLUMNS: &str = "\
    id, exam_id, user_id, status, started_at, submitted_at, time_spent_seconds, \
    score, max_score, percentage, created_at, updated_at";

pub(crate) struct CreateAttempt<'a> {
    pub(crate) id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) struct MarkSubmitted<'a> {
    pub(crate) id: &'a str,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) time_spent_seconds: i64,
    pub(crate) score: f64,
    pub(crate) max_score: f64,
    pub(crate) percentage: f64,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ExpiredAttemptRow {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) user_id: String,
    pub(crate) time_limit_minutes: i32,
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!("SELECT {COLUMNS} FROM exam_attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Row-locks the attempt for the rest of the surrounding transaction.
pub(crate) async fn lock_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_in_progress(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    user_id: &str,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts \
         WHERE exam_id = $1 AND user_id = $2 AND status = $3"
    ))
    .bind(exam_id)
    .bind(user_id)
    .bind(AttemptStatus::InProgress)
    .fetch_optional(executor)
    .await
}

/// Inserts an in-progress attempt. Returns `false` when another in-progress attempt
/// for the same exam and user won the race.
pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    attempt: CreateAttempt<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO exam_attempts (
            id, exam_id, user_id, status, started_at, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$6)
        ON CONFLICT DO NOTHING",
    )
    .bind(attempt.id)
    .bind(attempt.exam_id)
    .bind(attempt.user_id)
    .bind(AttemptStatus::InProgress)
    .bind(attempt.started_at)
    .bind(attempt.created_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn mark_submitted(
    executor: impl sqlx::PgExecutor<'_>,
    params: MarkSubmitted<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE exam_attempts
         SET status = $1,
             submitted_at = $2,
             time_spent_seconds = $3,
             score = $4,
             max_score = $5,
             percentage = $6,
             updated_at = $2
         WHERE id = $7 AND status = $8",
    )
    .bind(AttemptStatus::Submitted)
    .bind(params.submitted_at)
    .bind(params.time_spent_seconds)
    .bind(params.score)
    .bind(params.max_score)
    .bind(params.percentage)
    .bind(params.id)
    .bind(AttemptStatus::InProgress)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Timed attempts still in progress whose limit plus `grace_seconds` has elapsed at `now`.
pub(crate) async fn list_expired_in_progress(
    pool: &PgPool,
    now: PrimitiveDateTime,
    grace_seconds: i64,
    limit: i64,
) -> Result<Vec<ExpiredAttemptRow>, sqlx::Error> {
    sqlx::query_as::<_, ExpiredAttemptRow>(
        "SELECT a.id, a.exam_id, a.user_id, e.time_limit_minutes
         FROM exam_attempts a
         JOIN exams e ON e.id = a.exam_id
         WHERE a.status = $1
           AND e.time_limit_minutes IS NOT NULL
           AND a.started_at + (e.time_limit_minutes::bigint * 60 + $2) * INTERVAL '1 second' <= $3
         ORDER BY a.started_at
         LIMIT $4",
    )
    .bind(AttemptStatus::InProgress)
    .bind(grace_seconds)
    .bind(now)
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}
