//! Exam-taking session: loads or resumes an attempt, runs the countdown, caches
//! answers locally and writes them through on navigation, and submits for grading.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use verso::session::{ExamSession, HttpExamBackend, SessionOptions};
//!
//! let backend = HttpExamBackend::new("http://localhost:8000/api/v1", "<access token>")?;
//! let session = ExamSession::start(backend, "exam-id", SessionOptions::default()).await?;
//! session.set_current_answer("B").await?;
//! session.next().await?;
//! let outcome = session.submit().await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

mod backend;
pub mod cache;
mod error;
mod exam_session;
mod http;
pub mod model;
mod timer;


pub use backend::{BackendError, ExamBackend};
pub use cache::{AnswerCache, Progress};
pub use error::SessionError;
pub use exam_session::{
    ExamSession, FlushOutcome, Phase, SessionOptions, SessionSnapshot, SubmitOutcome,
    SubmitTrigger,
};
pub use http::HttpExamBackend;
pub use model::{Attempt, AttemptStatus, Exam, GradeResult, Question, QuestionOutcome, QuestionType};
pub use timer::{format_remaining, remaining_seconds};
