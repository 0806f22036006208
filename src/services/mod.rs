pub(crate) mod ai_grading;
pub(crate) mod attempt_submission;
pub(crate) mod attempt_timing;
pub(crate) mod grading;
