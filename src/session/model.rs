//! Wire types shared by the session core and the exam API.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub use crate::db::types::{AttemptStatus, QuestionType};

/// An exam as presented to the student. Answer keys are never part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub time_limit_minutes: Option<i32>,
    pub questions: Vec<Question>,
}

impl Exam {
    pub fn is_timed(&self) -> bool {
        self.time_limit_minutes.is_some_and(|minutes| minutes > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub question_type: QuestionType,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub points: i32,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: String,
    pub exam_id: String,
    pub status: AttemptStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub submitted_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub time_spent_seconds: Option<i64>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub percentage: Option<f64>,
}

/// Per-question grading outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_id: String,
    pub question_type: QuestionType,
    pub answer: Option<String>,
    /// `None` for essays and for questions that could not be scored.
    pub is_correct: Option<bool>,
    pub points_earned: f64,
    pub max_points: f64,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeResult {
    pub attempt_id: String,
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub time_spent_seconds: i64,
    pub results: Vec<QuestionOutcome>,
}
