use sqlx::types::Json;

use crate::db::models::ExamQuestion;
use crate::db::types::QuestionType;

pub(crate) const COLUMNS: &str =
    "id, exam_id, question_type, question, options, correct_answer, points, position";

pub(crate) struct CreateQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) question_type: QuestionType,
    pub(crate) question: &'a str,
    pub(crate) options: Option<Vec<String>>,
    pub(crate) correct_answer: Option<&'a str>,
    pub(crate) points: i32,
    pub(crate) position: i32,
}

/// Questions of an exam in the order students traverse them.
pub(crate) async fn list_by_exam(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
) -> Result<Vec<ExamQuestion>, sqlx::Error> {
    sqlx::query_as::<_, ExamQuestion>(&format!(
        "SELECT {COLUMNS} FROM exam_questions WHERE exam_id = $1 ORDER BY position, id"
    ))
    .bind(exam_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn exists_in_exam(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    question_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM exam_questions WHERE exam_id = $1 AND id = $2)",
    )
    .bind(exam_id)
    .bind(question_id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    question: CreateQuestion<'_>,
) -> Result<ExamQuestion, sqlx::Error> {
    sqlx::query_as::<_, ExamQuestion>(&format!(
        "INSERT INTO exam_questions (
            id, exam_id, question_type, question, options, correct_answer, points, position
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
        RETURNING {COLUMNS}"
    ))
    .bind(question.id)
    .bind(question.exam_id)
    .bind(question.question_type)
    .bind(question.question)
    .bind(question.options.map(Json))
    .bind(question.correct_answer)
    .bind(question.points)
    .bind(question.position)
    .fetch_one(executor)
    .await
}
