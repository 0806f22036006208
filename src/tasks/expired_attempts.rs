use anyhow::{Context, Result};

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::services::attempt_submission::{submit_attempt, SubmitTrigger};
use crate::services::attempt_timing;

const SWEEP_BATCH_SIZE: i64 = 100;

/// Grades and submits timed attempts left in progress past their limit plus grace,
/// e.g. when the student closed the tab. Returns how many were submitted.
///
/// An attempt whose grading fails stays in progress and is picked up by the next sweep.
pub(crate) async fn submit_expired_attempts(state: &AppState) -> Result<usize> {
    let grace = state.settings().attempts().grace_seconds();
    let expired = repositories::attempts::list_expired_in_progress(
        state.db(),
        primitive_now_utc(),
        grace,
        SWEEP_BATCH_SIZE,
    )
    .await
    .context("Failed to fetch expired attempts")?;

    let mut submitted = 0;
    for attempt in expired {
        let time_spent =
            attempt_timing::limit_seconds(Some(attempt.time_limit_minutes)).unwrap_or_default();

        match submit_attempt(state.db(), state.essays(), &attempt.id, time_spent, SubmitTrigger::Expired)
            .await
        {
            Ok(outcome) if outcome.newly_submitted => {
                submitted += 1;
                tracing::info!(
                    attempt_id = %attempt.id,
                    exam_id = %attempt.exam_id,
                    user_id = %attempt.user_id,
                    score = outcome.result.score,
                    "Expired attempt submitted"
                );
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(attempt_id = %attempt.id, error = %err, "Failed to submit expired attempt");
            }
        }
    }

    if submitted > 0 {
        tracing::info!(submitted, "Expired attempt sweep finished");
    }
    metrics::counter!("expired_attempts_submitted_total").increment(submitted as u64);

    Ok(submitted)
}
