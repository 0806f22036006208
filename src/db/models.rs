use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AttemptStatus, QuestionType};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) time_limit_minutes: Option<i32>,
    pub(crate) is_public: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl Exam {
    pub(crate) fn visible_to(&self, user_id: &str) -> bool {
        self.is_public || self.user_id == user_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamQuestion {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) question_type: QuestionType,
    pub(crate) question: String,
    pub(crate) options: Option<Json<Vec<String>>>,
    pub(crate) correct_answer: Option<String>,
    pub(crate) points: i32,
    pub(crate) position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamAttempt {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) user_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) time_spent_seconds: Option<i64>,
    pub(crate) score: Option<f64>,
    pub(crate) max_score: Option<f64>,
    pub(crate) percentage: Option<f64>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamResponse {
    pub(crate) attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) answer: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuestionResult {
    pub(crate) attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) question_type: QuestionType,
    pub(crate) answer: Option<String>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) points_earned: f64,
    pub(crate) max_points: f64,
    pub(crate) feedback: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
}
