use thiserror::Error;

use crate::session::backend::BackendError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("exam {0} not found")]
    ExamNotFound(String),
    #[error("failed to load exam session")]
    Load(#[source] BackendError),
    #[error("question {0} is not part of this exam")]
    UnknownQuestion(String),
    #[error("a submission is already in progress")]
    SubmissionInFlight,
    #[error("the attempt has already been submitted")]
    AlreadySubmitted,
    #[error("{count} answer(s) could not be saved; submission aborted")]
    UnsavedAnswers { count: usize },
    #[error("grading failed")]
    Grading(#[source] BackendError),
}

impl SessionError {
    /// Whether the user can retry the failed operation from the same session.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::UnsavedAnswers { .. } | SessionError::Grading(_))
    }
}
