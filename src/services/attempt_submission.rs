use sqlx::PgPool;
use thiserror::Error;

use crate::core::time::primitive_now_utc;
use crate::db::models::ExamAttempt;
use crate::db::types::AttemptStatus;
use crate::repositories;
use crate::schemas::attempt::{graded_result, stored_grade_result};
use crate::services::grading::{grade_attempt, EssayEvaluator, GradingError};
use crate::session::model::GradeResult;

#[derive(Debug, Error)]
pub(crate) enum SubmitError {
    #[error("attempt {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Grading(#[from] GradingError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubmitTrigger {
    Student,
    Expired,
}

impl SubmitTrigger {
    fn as_str(self) -> &'static str {
        match self {
            SubmitTrigger::Student => "student",
            SubmitTrigger::Expired => "expired",
        }
    }
}

#[derive(Debug)]
pub(crate) struct SubmittedAttempt {
    pub(crate) result: GradeResult,
    /// `false` when the attempt had already been submitted before this call.
    pub(crate) newly_submitted: bool,
}

/// Grades the persisted responses of an attempt and marks it submitted.
///
/// Grading runs before any row lock is taken. Results and the status change are
/// written in one transaction, so a failed grade leaves the attempt in progress
/// with nothing stored. Submitting an attempt that is already submitted returns
/// the stored result.
pub(crate) async fn submit_attempt(
    db: &PgPool,
    essays: &dyn EssayEvaluator,
    attempt_id: &str,
    time_spent_seconds: i64,
    trigger: SubmitTrigger,
) -> Result<SubmittedAttempt, SubmitError> {
    let attempt = repositories::attempts::find_by_id(db, attempt_id)
        .await?
        .ok_or_else(|| SubmitError::NotFound(attempt_id.to_string()))?;

    if attempt.status == AttemptStatus::Submitted {
        return already_submitted(db, &attempt).await;
    }

    let questions = repositories::questions::list_by_exam(db, &attempt.exam_id).await?;
    let answers = repositories::responses::answers_by_attempt(db, attempt_id).await?;

    let graded = match grade_attempt(&questions, &answers, essays).await {
        Ok(graded) => graded,
        Err(err) => {
            metrics::counter!(
                "exam_submissions_total",
                "status" => "grading_failed",
                "trigger" => trigger.as_str()
            )
            .increment(1);
            tracing::warn!(attempt_id, error = %err, "Attempt grading failed");
            return Err(err.into());
        }
    };

    let now = primitive_now_utc();
    let mut tx = db.begin().await?;

    let locked = repositories::attempts::lock_by_id(&mut *tx, attempt_id)
        .await?
        .ok_or_else(|| SubmitError::NotFound(attempt_id.to_string()))?;
    if locked.status == AttemptStatus::Submitted {
        tx.rollback().await?;
        return already_submitted(db, &locked).await;
    }

    for question in &graded.questions {
        repositories::results::insert(
            &mut *tx,
            repositories::results::CreateResult {
                attempt_id,
                question_id: &question.question_id,
                answer: question.answer.as_deref(),
                is_correct: question.is_correct,
                points_earned: question.points_earned,
                max_points: question.max_points,
                feedback: question.feedback.as_deref(),
                created_at: now,
            },
        )
        .await?;
    }

    repositories::attempts::mark_submitted(
        &mut *tx,
        repositories::attempts::MarkSubmitted {
            id: attempt_id,
            submitted_at: now,
            time_spent_seconds,
            score: graded.score,
            max_score: graded.max_score,
            percentage: graded.percentage,
        },
    )
    .await?;

    tx.commit().await?;

    metrics::counter!(
        "exam_submissions_total",
        "status" => "submitted",
        "trigger" => trigger.as_str()
    )
    .increment(1);
    tracing::info!(
        attempt_id,
        exam_id = %attempt.exam_id,
        score = graded.score,
        max_score = graded.max_score,
        trigger = trigger.as_str(),
        "Attempt submitted"
    );

    Ok(SubmittedAttempt {
        result: graded_result(attempt_id, graded, time_spent_seconds),
        newly_submitted: true,
    })
}

/// Stored result of a submitted attempt.
pub(crate) async fn load_result(db: &PgPool, attempt: &ExamAttempt) -> Result<GradeResult, sqlx::Error> {
    let results = repositories::results::list_by_attempt(db, &attempt.id).await?;
    Ok(stored_grade_result(attempt, results))
}

async fn already_submitted(
    db: &PgPool,
    attempt: &ExamAttempt,
) -> Result<SubmittedAttempt, SubmitError> {
    tracing::debug!(attempt_id = %attempt.id, "Attempt already submitted, returning stored result");
    Ok(SubmittedAttempt { result: load_result(db, attempt).await?, newly_submitted: false })
}
