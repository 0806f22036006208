use std::sync::{Arc, Weak};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Seconds left on a timed attempt, floored at zero. `None` for untimed exams.
pub fn remaining_seconds(
    time_limit_minutes: Option<i32>,
    started_at: OffsetDateTime,
    now: OffsetDateTime,
) -> Option<u64> {
    let limit = i64::from(time_limit_minutes.filter(|minutes| *minutes > 0)?) * 60;
    let elapsed = (now - started_at).whole_seconds().max(0);
    Some(u64::try_from(limit - elapsed).unwrap_or(0))
}

/// `mm:ss`, with minutes allowed past 59.
pub fn format_remaining(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Something counting down once per timer tick.
pub(crate) trait Countdown: Send + Sync + 'static {
    /// Called once per period; returns the seconds left.
    fn tick(&self) -> u64;

    /// Called once when the countdown reaches zero.
    fn expire(self: Arc<Self>);
}

/// Running countdown task. Aborted on drop.
#[derive(Debug)]
pub(crate) struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// The task holds only a weak reference, so it ends once the target is gone.
    pub(crate) fn start<C: Countdown>(target: Weak<C>, period: Duration) -> Self {
        let task = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let Some(target) = target.upgrade() else {
                    break;
                };
                if target.tick() == 0 {
                    target.expire();
                    break;
                }
            }
        });
        Self { task }
    }

    pub(crate) fn cancel(self) {
        self.task.abort();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
