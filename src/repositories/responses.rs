use std::collections::HashMap;

use time::PrimitiveDateTime;

use crate::db::models::ExamResponse;

pub(crate) const COLUMNS: &str = "attempt_id, question_id, answer, created_at, updated_at";

pub(crate) async fn list_by_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<ExamResponse>, sqlx::Error> {
    sqlx::query_as::<_, ExamResponse>(&format!(
        "SELECT {COLUMNS} FROM exam_responses WHERE attempt_id = $1"
    ))
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn answers_by_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<HashMap<String, String>, sqlx::Error> {
    let rows = list_by_attempt(executor, attempt_id).await?;
    Ok(rows.into_iter().map(|row| (row.question_id, row.answer)).collect())
}

/// Creates the response on first save and overwrites it afterwards.
pub(crate) async fn upsert(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    question_id: &str,
    answer: &str,
    now: PrimitiveDateTime,
) -> Result<ExamResponse, sqlx::Error> {
    sqlx::query_as::<_, ExamResponse>(&format!(
        "INSERT INTO exam_responses (attempt_id, question_id, answer, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $4)
         ON CONFLICT (attempt_id, question_id)
         DO UPDATE SET answer = EXCLUDED.answer, updated_at = EXCLUDED.updated_at
         RETURNING {COLUMNS}"
    ))
    .bind(attempt_id)
    .bind(question_id)
    .bind(answer)
    .bind(now)
    .fetch_one(executor)
    .await
}
