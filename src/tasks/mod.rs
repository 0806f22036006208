pub(crate) mod expired_attempts;
pub(crate) mod scheduler;
