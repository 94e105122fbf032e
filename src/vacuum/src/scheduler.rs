//! Due-time computation for vacuuming policies.

use chrono::{DateTime, Utc};
use common::model::{Snapshot, VacuumingPolicy};

/// When `policy` is next due, or `None` if it has never run.
///
/// A period too large to add to the last execution yields
/// `Some(DateTime::<Utc>::MAX_UTC)`, i.e. never due.
pub fn next_execution(policy: &VacuumingPolicy) -> Option<DateTime<Utc>> {
    let last = policy.last_execution?;
    Some(
        policy
            .duration()
            .add_to(last)
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
    )
}

/// Whether `policy` should run at `now`.
///
/// A policy that never ran is due. Otherwise it is due once
/// `last_execution + duration <= now`, with the duration added calendar-wise.
pub fn should_execute(policy: &VacuumingPolicy, now: DateTime<Utc>) -> bool {
    match next_execution(policy) {
        None => true,
        Some(next) => next <= now,
    }
}

/// Vacuuming policies of `snapshot` that should run at `now`, in id order.
pub fn due_policies(snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<&VacuumingPolicy> {
    snapshot
        .vacuuming_policies()
        .filter(|policy| should_execute(policy, now))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use common::testing::SnapshotBuilder;

    #[test]
    fn test_never_executed_is_due() {
        let policy = VacuumingPolicy::new("p", "1y").unwrap();
        assert!(should_execute(&policy, Utc::now()));
        assert!(next_execution(&policy).is_none());
    }

    #[test]
    fn test_due_after_duration_elapsed() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let epsilon = TimeDelta::seconds(1);
        let duration = TimeDelta::days(2) + TimeDelta::hours(3) + TimeDelta::minutes(4);

        let overdue = VacuumingPolicy::new("p", "2d 3h 4M")
            .unwrap()
            .with_last_execution(now - (duration + epsilon));
        assert!(should_execute(&overdue, now));

        let not_yet = VacuumingPolicy::new("p", "2d 3h 4M")
            .unwrap()
            .with_last_execution(now - (duration - epsilon));
        assert!(!should_execute(&not_yet, now));

        let exactly = VacuumingPolicy::new("p", "2d 3h 4M")
            .unwrap()
            .with_last_execution(now - duration);
        assert!(should_execute(&exactly, now));
    }

    #[test]
    fn test_months_are_calendar_months() {
        // Jan 31 + 1m clamps to Feb 29 in a leap year.
        let last = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        let policy = VacuumingPolicy::new("p", "1m")
            .unwrap()
            .with_last_execution(last);

        let feb_28 = Utc.with_ymd_and_hms(2024, 2, 28, 23, 59, 0).unwrap();
        let feb_29 = Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap();
        assert!(!should_execute(&policy, feb_28));
        assert!(should_execute(&policy, feb_29));
        assert_eq!(next_execution(&policy), Some(feb_29));
    }

    #[test]
    fn test_overflowing_period_is_never_due() {
        let policy = VacuumingPolicy::new("p", "4000000000y")
            .unwrap()
            .with_last_execution(Utc::now());
        assert!(!should_execute(&policy, Utc::now()));
    }

    #[test]
    fn test_due_policies_filters_and_orders() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let snapshot = SnapshotBuilder::new()
            .vacuuming_policy("hourly", "1h", &[])
            .last_execution("hourly", now - TimeDelta::minutes(90))
            .vacuuming_policy("daily", "1d", &[])
            .last_execution("daily", now - TimeDelta::hours(2))
            .vacuuming_policy("fresh", "1y", &[])
            .build();

        let due: Vec<&str> = due_policies(&snapshot, now)
            .into_iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(due, vec!["fresh", "hourly"]);
    }
}
