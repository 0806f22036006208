use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock, PoisonError};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

use crate::session::backend::ExamBackend;
use crate::session::cache::{AnswerCache, Progress};
use crate::session::error::SessionError;
use crate::session::model::{Attempt, Exam, GradeResult, Question};
use crate::session::timer::{self, Countdown, TimerHandle};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// How often the countdown refreshes `remaining_seconds`.
    pub tick: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { tick: Duration::from_secs(1) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    TimeUp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    InProgress,
    Submitting { trigger: SubmitTrigger },
    /// The last submission failed; the attempt is still in progress and can be retried.
    Failed { message: String },
    Submitted { result: GradeResult },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub attempt_id: String,
    pub phase: Phase,
    pub current_index: usize,
    pub total_questions: usize,
    pub remaining_seconds: Option<u64>,
    pub progress: Progress,
}

impl SessionSnapshot {
    pub fn remaining_display(&self) -> Option<String> {
        self.remaining_seconds.map(timer::format_remaining)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Entry was clean or absent; nothing was written.
    Skipped,
    Saved,
    /// The write failed and the entry stays dirty.
    Failed(String),
    /// The server refused the write for good; retrying will not help.
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Submitted(GradeResult),
    /// Another submission is running; this call had no effect.
    InFlight,
    AlreadySubmitted(GradeResult),
}

struct SessionState {
    cache: AnswerCache,
    cursor: usize,
}

struct SessionInner<B> {
    backend: B,
    exam: Exam,
    attempt: Attempt,
    options: SessionOptions,
    /// Monotonic point at which a timed attempt runs out.
    deadline: Option<Instant>,
    state: Mutex<SessionState>,
    submitting: AtomicBool,
    result: OnceLock<GradeResult>,
    snapshot: watch::Sender<SessionSnapshot>,
    timer: StdMutex<Option<TimerHandle>>,
}

/// One student's run through an exam.
///
/// Handles are cheap to clone. The countdown stops once the last handle is dropped.
pub struct ExamSession<B> {
    inner: Arc<SessionInner<B>>,
}

impl<B> Clone for ExamSession<B> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<B: ExamBackend + 'static> ExamSession<B> {
    /// Resolves the exam and resumes the student's in-progress attempt, or creates one.
    pub async fn start(
        backend: B,
        exam_id: &str,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        let exam = backend
            .resolve_exam(exam_id)
            .await
            .map_err(SessionError::Load)?
            .ok_or_else(|| SessionError::ExamNotFound(exam_id.to_string()))?;

        let existing =
            backend.find_in_progress_attempt(exam_id).await.map_err(SessionError::Load)?;
        let (attempt, cache, remaining_seconds) = match existing {
            Some(attempt) => {
                let answers =
                    backend.load_responses(&attempt.id).await.map_err(SessionError::Load)?;
                let remaining = timer::remaining_seconds(
                    exam.time_limit_minutes,
                    attempt.started_at,
                    OffsetDateTime::now_utc(),
                );
                tracing::info!(
                    exam_id,
                    attempt_id = %attempt.id,
                    saved_answers = answers.len(),
                    remaining_seconds = ?remaining,
                    "Resuming exam attempt"
                );
                (attempt, AnswerCache::from_persisted(answers), remaining)
            }
            None => {
                let attempt = backend.create_attempt(exam_id).await.map_err(SessionError::Load)?;
                tracing::info!(exam_id, attempt_id = %attempt.id, "Started exam attempt");
                let remaining = exam
                    .time_limit_minutes
                    .filter(|minutes| *minutes > 0)
                    .map(|minutes| u64::from(minutes.unsigned_abs()) * 60);
                (attempt, AnswerCache::new(), remaining)
            }
        };

        let progress = cache.progress(exam.questions.iter().map(|q| q.id.as_str()));
        let (snapshot, _) = watch::channel(SessionSnapshot {
            attempt_id: attempt.id.clone(),
            phase: Phase::InProgress,
            current_index: 0,
            total_questions: exam.questions.len(),
            remaining_seconds,
            progress,
        });

        let session = Self {
            inner: Arc::new(SessionInner {
                backend,
                exam,
                attempt,
                options,
                deadline: remaining_seconds.map(|left| Instant::now() + Duration::from_secs(left)),
                state: Mutex::new(SessionState { cache, cursor: 0 }),
                submitting: AtomicBool::new(false),
                result: OnceLock::new(),
                snapshot,
                timer: StdMutex::new(None),
            }),
        };

        match remaining_seconds {
            Some(0) => {
                tracing::info!(attempt_id = %session.inner.attempt.id, "Time already expired, submitting");
                Arc::clone(&session.inner).expire();
            }
            Some(_) => session.inner.start_timer(),
            None => {}
        }

        Ok(session)
    }

    pub fn exam(&self) -> &Exam {
        &self.inner.exam
    }

    pub fn attempt(&self) -> &Attempt {
        &self.inner.attempt
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Receives every state change. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn current_index(&self) -> usize {
        self.inner.snapshot.borrow().current_index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.inner.exam.questions.get(self.current_index())
    }

    pub fn result(&self) -> Option<&GradeResult> {
        self.inner.result.get()
    }

    pub async fn answer(&self, question_id: &str) -> Option<String> {
        self.inner.state.lock().await.cache.get(question_id).map(str::to_string)
    }

    pub async fn is_answered(&self, question_id: &str) -> bool {
        self.inner.state.lock().await.cache.is_answered(question_id)
    }

    /// Updates the local answer for a question. No I/O.
    pub async fn set_answer(&self, question_id: &str, text: &str) -> Result<(), SessionError> {
        self.inner.ensure_open()?;
        self.inner.ensure_question(question_id)?;
        let mut state = self.inner.state.lock().await;
        state.cache.set(question_id, text);
        self.inner.publish_progress(&state);
        Ok(())
    }

    /// Updates the answer of the question under the cursor.
    pub async fn set_current_answer(&self, text: &str) -> Result<(), SessionError> {
        self.inner.ensure_open()?;
        let mut state = self.inner.state.lock().await;
        let Some(question) = self.inner.exam.questions.get(state.cursor) else {
            return Ok(());
        };
        state.cache.set(&question.id, text);
        self.inner.publish_progress(&state);
        Ok(())
    }

    /// Writes the answer through to the backend if it changed since the last save.
    pub async fn flush(&self, question_id: &str) -> Result<FlushOutcome, SessionError> {
        self.inner.ensure_open()?;
        self.inner.ensure_question(question_id)?;
        let mut state = self.inner.state.lock().await;
        Ok(self.inner.flush_entry(&mut state, question_id).await)
    }

    /// Moves to the following question. A no-op on the last question.
    pub async fn next(&self) -> Result<usize, SessionError> {
        self.navigate(|current| current.checked_add(1)).await
    }

    /// Moves to the preceding question. A no-op on the first question.
    pub async fn previous(&self) -> Result<usize, SessionError> {
        self.navigate(|current| current.checked_sub(1)).await
    }

    pub async fn jump_to(&self, index: usize) -> Result<usize, SessionError> {
        self.navigate(|_| Some(index)).await
    }

    async fn navigate(
        &self,
        target: impl FnOnce(usize) -> Option<usize>,
    ) -> Result<usize, SessionError> {
        self.inner.ensure_open()?;
        let mut state = self.inner.state.lock().await;
        let current = state.cursor;
        let Some(target) = target(current)
            .filter(|index| *index < self.inner.exam.questions.len() && *index != current)
        else {
            return Ok(current);
        };

        if let Some(leaving) = self.inner.exam.questions.get(current) {
            self.inner.flush_entry(&mut state, &leaving.id).await;
        }
        state.cursor = target;
        self.inner.snapshot.send_modify(|snapshot| snapshot.current_index = target);
        Ok(target)
    }

    /// Flushes every unsaved answer, then grades and submits the attempt.
    pub async fn submit(&self) -> Result<SubmitOutcome, SessionError> {
        self.inner.submit(SubmitTrigger::Manual).await
    }

    /// Same path as [`submit`](Self::submit); offered after a failed submission.
    pub async fn retry_submit(&self) -> Result<SubmitOutcome, SessionError> {
        self.inner.submit(SubmitTrigger::Manual).await
    }
}

impl<B: ExamBackend + 'static> SessionInner<B> {
    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.result.get().is_some() {
            return Err(SessionError::AlreadySubmitted);
        }
        if self.submitting.load(Ordering::Acquire) {
            return Err(SessionError::SubmissionInFlight);
        }
        Ok(())
    }

    fn ensure_question(&self, question_id: &str) -> Result<(), SessionError> {
        if self.exam.questions.iter().any(|question| question.id == question_id) {
            Ok(())
        } else {
            Err(SessionError::UnknownQuestion(question_id.to_string()))
        }
    }

    fn publish_progress(&self, state: &SessionState) {
        let progress = state.cache.progress(self.exam.questions.iter().map(|q| q.id.as_str()));
        self.snapshot.send_modify(|snapshot| snapshot.progress = progress);
    }

    fn set_phase(&self, phase: Phase) {
        self.snapshot.send_modify(|snapshot| snapshot.phase = phase);
    }

    async fn flush_entry(&self, state: &mut SessionState, question_id: &str) -> FlushOutcome {
        let Some(value) = state.cache.pending(question_id).map(str::to_string) else {
            return FlushOutcome::Skipped;
        };

        match self.backend.save_response(&self.attempt.id, question_id, &value).await {
            Ok(()) => {
                state.cache.mark_persisted(question_id, &value);
                tracing::debug!(attempt_id = %self.attempt.id, question_id, "Answer saved");
                FlushOutcome::Saved
            }
            Err(err) if err.is_final() => {
                tracing::warn!(
                    attempt_id = %self.attempt.id,
                    question_id,
                    error = %err,
                    "Server rejected answer"
                );
                FlushOutcome::Rejected(err.to_string())
            }
            Err(err) => {
                tracing::warn!(
                    attempt_id = %self.attempt.id,
                    question_id,
                    error = %err,
                    "Failed to save answer; keeping it for a later flush"
                );
                FlushOutcome::Failed(err.to_string())
            }
        }
    }

    /// Whole seconds until the deadline, rounded up.
    fn seconds_left(&self) -> Option<u64> {
        self.deadline.map(|deadline| {
            let left = deadline.saturating_duration_since(Instant::now());
            left.as_secs() + u64::from(left.subsec_nanos() > 0)
        })
    }

    fn start_timer(self: &Arc<Self>) {
        let handle = TimerHandle::start(Arc::downgrade(self), self.options.tick);
        let previous = self.timer.lock().unwrap_or_else(PoisonError::into_inner).replace(handle);
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    fn stop_timer(&self) {
        let handle = self.timer.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.cancel();
        }
    }

    async fn submit(self: &Arc<Self>, trigger: SubmitTrigger) -> Result<SubmitOutcome, SessionError> {
        if let Some(result) = self.result.get() {
            return Ok(SubmitOutcome::AlreadySubmitted(result.clone()));
        }
        if self
            .submitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(attempt_id = %self.attempt.id, ?trigger, "Submission already in flight");
            return Ok(SubmitOutcome::InFlight);
        }

        self.stop_timer();
        self.set_phase(Phase::Submitting { trigger });
        tracing::info!(attempt_id = %self.attempt.id, ?trigger, "Submitting attempt");

        let outcome = self.run_submission().await;
        let mut expired = false;
        match &outcome {
            Ok(result) => {
                // Stored before the flag clears.
                let _ = self.result.set(result.clone());
                self.set_phase(Phase::Submitted { result: result.clone() });
            }
            Err(err) => {
                tracing::warn!(attempt_id = %self.attempt.id, error = %err, "Submission failed");
                let left = self.seconds_left();
                self.snapshot.send_modify(|snapshot| {
                    snapshot.phase = Phase::Failed { message: err.to_string() };
                    snapshot.remaining_seconds = left;
                });
                match left {
                    Some(0) => expired = trigger == SubmitTrigger::Manual,
                    Some(_) => self.start_timer(),
                    None => {}
                }
            }
        }
        self.submitting.store(false, Ordering::Release);

        if expired {
            tracing::info!(attempt_id = %self.attempt.id, "Time ran out during submission");
            Arc::clone(self).expire();
        }
        outcome.map(SubmitOutcome::Submitted)
    }

    async fn run_submission(&self) -> Result<GradeResult, SessionError> {
        {
            let mut state = self.state.lock().await;
            let mut unsaved = 0;
            for question in &self.exam.questions {
                match self.flush_entry(&mut state, &question.id).await {
                    FlushOutcome::Failed(_) => unsaved += 1,
                    FlushOutcome::Rejected(reason) => {
                        tracing::warn!(
                            attempt_id = %self.attempt.id,
                            question_id = %question.id,
                            reason = %reason,
                            "Submitting without rejected answer"
                        );
                    }
                    FlushOutcome::Skipped | FlushOutcome::Saved => {}
                }
            }
            if unsaved > 0 {
                return Err(SessionError::UnsavedAnswers { count: unsaved });
            }
        }

        let time_spent = (OffsetDateTime::now_utc() - self.attempt.started_at).whole_seconds().max(0);
        self.backend
            .grade_and_submit(&self.attempt.id, time_spent)
            .await
            .map_err(SessionError::Grading)
    }
}

impl<B: ExamBackend + 'static> Countdown for SessionInner<B> {
    fn tick(&self) -> u64 {
        let left = self.seconds_left().unwrap_or(0);
        self.snapshot.send_modify(|snapshot| snapshot.remaining_seconds = Some(left));
        left
    }

    fn expire(self: Arc<Self>) {
        tokio::spawn(async move {
            match self.submit(SubmitTrigger::TimeUp).await {
                Ok(SubmitOutcome::Submitted(result)) => {
                    tracing::info!(attempt_id = %result.attempt_id, "Attempt auto-submitted at time up");
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(attempt_id = %self.attempt.id, error = %err, "Auto-submit failed");
                }
            }
        });
    }
}
