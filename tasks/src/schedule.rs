use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;
use thiserror::Error;

/// A parsed cron expression driving one of the periodic jobs (§4.4,
/// `VERIFICATION_SCHEDULE` / `SHARE_CLEANUP_SCHEDULE` in §6).
pub struct PeriodicSchedule {
    schedule: Schedule,
}

#[derive(Debug, Error)]
#[error("invalid cron expression: {0}")]
pub struct ScheduleParseError(String);

impl PeriodicSchedule {
    pub fn parse(expr: &str) -> Result<Self, ScheduleParseError> {
        // The `cron` crate expects a leading seconds field; §6 schedules are
        // given in the conventional 5-field cron form, so pin seconds to 0.
        let with_seconds = format!("0 {expr}");
        Schedule::from_str(&with_seconds)
            .map(|schedule| Self { schedule })
            .map_err(|e| ScheduleParseError(e.to_string()))
    }

    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&now).next()
    }
}

/// Convenience wrapper for call sites that just want the next fire time.
pub fn next_fire(expr: &str, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, ScheduleParseError> {
    Ok(PeriodicSchedule::parse(expr)?.next_after(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn verification_schedule_fires_at_3am() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let next = next_fire("0 3 * * *", now).unwrap().unwrap();
        assert_eq!(next.hour(), 3);
    }

    #[test]
    fn share_cleanup_schedule_fires_at_2am() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let next = next_fire("0 2 * * *", now).unwrap().unwrap();
        assert_eq!(next.hour(), 2);
    }

    #[test]
    fn malformed_schedule_is_rejected() {
        assert!(PeriodicSchedule::parse("not a cron expression").is_err());
    }
}
