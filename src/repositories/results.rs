use time::PrimitiveDateTime;

use crate::db::models::QuestionResult;

pub(crate) struct CreateResult<'a> {
    pub(crate) attempt_id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) answer: Option<&'a str>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) points_earned: f64,
    pub(crate) max_points: f64,
    pub(crate) feedback: Option<&'a str>,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn insert(
    executor: impl sqlx::PgExecutor<'_>,
    result: CreateResult<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO exam_question_results (
            attempt_id, question_id, answer, is_correct, points_earned, max_points, feedback, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
    )
    .bind(result.attempt_id)
    .bind(result.question_id)
    .bind(result.answer)
    .bind(result.is_correct)
    .bind(result.points_earned)
    .bind(result.max_points)
    .bind(result.feedback)
    .bind(result.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// Stored results ordered like the exam's questions.
pub(crate) async fn list_by_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<QuestionResult>, sqlx::Error> {
    sqlx::query_as::<_, QuestionResult>(
        "SELECT r.attempt_id, r.question_id, q.question_type, r.answer, r.is_correct, r.points_earned,
                r.max_points, r.feedback, r.created_at
         FROM exam_question_results r
         JOIN exam_questions q ON q.id = r.question_id
         WHERE r.attempt_id = $1
         ORDER BY q.position, q.id",
    )
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}
