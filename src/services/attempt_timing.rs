use time::{Duration, PrimitiveDateTime};

use crate::core::time::elapsed_seconds;

pub(crate) fn limit_seconds(time_limit_minutes: Option<i32>) -> Option<i64> {
    time_limit_minutes.filter(|minutes| *minutes > 0).map(|minutes| i64::from(minutes) * 60)
}

/// Last instant at which a timed attempt still accepts writes.
pub(crate) fn hard_deadline(
    time_limit_minutes: Option<i32>,
    started_at: PrimitiveDateTime,
    grace_seconds: i64,
) -> Option<PrimitiveDateTime> {
    limit_seconds(time_limit_minutes).and_then(|limit| {
        started_at.checked_add(Duration::seconds(limit.saturating_add(grace_seconds.max(0))))
    })
}

pub(crate) fn accepts_writes(
    time_limit_minutes: Option<i32>,
    started_at: PrimitiveDateTime,
    grace_seconds: i64,
    now: PrimitiveDateTime,
) -> bool {
    hard_deadline(time_limit_minutes, started_at, grace_seconds)
        .map_or(true, |deadline| now <= deadline)
}

/// Bounds a client-reported duration by the server clock and the exam limit.
pub(crate) fn clamp_time_spent(
    reported_seconds: i64,
    time_limit_minutes: Option<i32>,
    started_at: PrimitiveDateTime,
    now: PrimitiveDateTime,
) -> i64 {
    let elapsed = elapsed_seconds(started_at, now);
    let bounded = reported_seconds.clamp(0, elapsed);
    match limit_seconds(time_limit_minutes) {
        Some(limit) => bounded.min(limit),
        None => bounded,
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const START: PrimitiveDateTime = datetime!(2026-03-01 10:00:00);

    #[test]
    fn untimed_attempts_have_no_limit_or_deadline() {
        assert_eq!(limit_seconds(None), None);
        assert_eq!(limit_seconds(Some(0)), None);
        assert_eq!(limit_seconds(Some(10)), Some(600));
        assert_eq!(hard_deadline(Some(0), START, 120), None);
        assert!(accepts_writes(None, START, 0, datetime!(2027-01-01 00:00:00)));
    }

    #[test]
    fn writes_close_after_limit_plus_grace() {
        assert_eq!(hard_deadline(Some(10), START, 120), Some(datetime!(2026-03-01 10:12:00)));
        assert!(accepts_writes(Some(10), START, 120, datetime!(2026-03-01 10:11:59)));
        assert!(!accepts_writes(Some(10), START, 120, datetime!(2026-03-01 10:12:01)));
    }

    #[test]
    fn time_spent_is_bounded_by_clock_and_limit() {
        let now = datetime!(2026-03-01 10:05:00);
        assert_eq!(clamp_time_spent(200, Some(10), START, now), 200);
        assert_eq!(clamp_time_spent(9_000, None, START, now), 300);
        assert_eq!(clamp_time_spent(-5, None, START, now), 0);
        let late = datetime!(2026-03-01 10:30:00);
        assert_eq!(clamp_time_spent(1_800, Some(10), START, late), 600);
    }
}
