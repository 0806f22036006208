use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{ExamAttempt, ExamResponse, QuestionResult};
use crate::services::grading::GradedAttempt;
use crate::session::model::{Attempt, GradeResult, QuestionOutcome};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ResponseUpsert {
    #[validate(length(max = 20000, message = "answer must be at most 20000 characters"))]
    pub(crate) answer: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmitRequest {
    #[serde(default)]
    #[validate(range(min = 0, message = "time_spent_seconds must be non-negative"))]
    pub(crate) time_spent_seconds: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct SavedResponse {
    pub(crate) attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) answer: String,
    pub(crate) updated_at: String,
}

impl From<ExamResponse> for SavedResponse {
    fn from(response: ExamResponse) -> Self {
        Self {
            attempt_id: response.attempt_id,
            question_id: response.question_id,
            answer: response.answer,
            updated_at: format_primitive(response.updated_at),
        }
    }
}

pub(crate) fn attempt_response(attempt: &ExamAttempt) -> Attempt {
    Attempt {
        id: attempt.id.clone(),
        exam_id: attempt.exam_id.clone(),
        status: attempt.status,
        started_at: attempt.started_at.assume_utc(),
        submitted_at: attempt.submitted_at.map(|value| value.assume_utc()),
        time_spent_seconds: attempt.time_spent_seconds,
        score: attempt.score,
        max_score: attempt.max_score,
        percentage: attempt.percentage,
    }
}

/// Rebuilds the result of a submitted attempt from stored rows.
pub(crate) fn stored_grade_result(attempt: &ExamAttempt, results: Vec<QuestionResult>) -> GradeResult {
    GradeResult {
        attempt_id: attempt.id.clone(),
        score: attempt.score.unwrap_or_default(),
        max_score: attempt.max_score.unwrap_or_default(),
        percentage: attempt.percentage.unwrap_or_default(),
        time_spent_seconds: attempt.time_spent_seconds.unwrap_or_default(),
        results: results
            .into_iter()
            .map(|result| QuestionOutcome {
                question_id: result.question_id,
                question_type: result.question_type,
                answer: result.answer,
                is_correct: result.is_correct,
                points_earned: result.points_earned,
                max_points: result.max_points,
                feedback: result.feedback,
            })
            .collect(),
    }
}

pub(crate) fn graded_result(
    attempt_id: &str,
    graded: GradedAttempt,
    time_spent_seconds: i64,
) -> GradeResult {
    GradeResult {
        attempt_id: attempt_id.to_string(),
        score: graded.score,
        max_score: graded.max_score,
        percentage: graded.percentage,
        time_spent_seconds,
        results: graded
            .questions
            .into_iter()
            .map(|question| QuestionOutcome {
                question_id: question.question_id,
                question_type: question.question_type,
                answer: question.answer,
                is_correct: question.is_correct,
                points_earned: question.points_earned,
                max_points: question.max_points,
                feedback: question.feedback,
            })
            .collect(),
    }
}
