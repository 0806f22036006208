use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::session::model::{Attempt, Exam, GradeResult};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The server refused the request and repeating it will not change that.
    pub fn is_final(&self) -> bool {
        matches!(self.status(), Some(status) if (400..500).contains(&status) && status != 408 && status != 429)
    }
}

/// Data access and grading operations consumed by an exam session.
///
/// All calls are scoped to the authenticated student.
#[async_trait]
pub trait ExamBackend: Send + Sync {
    /// `Ok(None)` when the exam does not exist or is not visible.
    async fn resolve_exam(&self, exam_id: &str) -> Result<Option<Exam>, BackendError>;

    async fn find_in_progress_attempt(&self, exam_id: &str)
        -> Result<Option<Attempt>, BackendError>;

    async fn create_attempt(&self, exam_id: &str) -> Result<Attempt, BackendError>;

    /// Persisted answers keyed by question id.
    async fn load_responses(&self, attempt_id: &str)
        -> Result<HashMap<String, String>, BackendError>;

    /// Upserts the answer for one question.
    async fn save_response(
        &self,
        attempt_id: &str,
        question_id: &str,
        answer: &str,
    ) -> Result<(), BackendError>;

    /// Grades the persisted answers and marks the attempt submitted.
    /// Returns the stored result when the attempt was already submitted.
    async fn grade_and_submit(
        &self,
        attempt_id: &str,
        time_spent_seconds: i64,
    ) -> Result<GradeResult, BackendError>;
}
