use std::fmt;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ── Period ────────────────────────────────────────────────────────────────────

/// Calendar bucket used when grouping a time series.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    /// ISO weeks, starting on Monday.
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl Period {
    /// First day of the period containing `ts`.
    ///
    /// A week whose Monday falls before the earliest representable date is
    /// bucketed under `ts`'s own date.
    pub fn truncate(&self, ts: NaiveDateTime) -> NaiveDate {
        let date = ts.date();
        match self {
            Period::Daily => date,
            Period::Weekly => {
                let offset = u64::from(date.weekday().num_days_from_monday());
                date.checked_sub_days(Days::new(offset)).unwrap_or(date)
            }
            Period::Monthly => date.with_day(1).unwrap_or(date),
            Period::Quarterly => {
                let month = (date.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
            }
            Period::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        }
    }

    /// Short label for a period start, e.g. `2024-01` for a month.
    pub fn label(&self, start: NaiveDate) -> String {
        match self {
            Period::Daily | Period::Weekly => start.format("%Y-%m-%d").to_string(),
            Period::Monthly => start.format("%Y-%m").to_string(),
            Period::Quarterly => format!("{}-T{}", start.year(), start.month0() / 3 + 1),
            Period::Yearly => start.year().to_string(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
            Period::Quarterly => "quarterly",
            Period::Yearly => "yearly",
        };
        f.write_str(name)
    }
}

// ── Day arithmetic ────────────────────────────────────────────────────────────

/// Whole days from `start` to `end` (negative when `end` is earlier).
///
/// Matches a pandas `(end - start).dt.days`: partial days are floored.
pub fn days_between(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    let secs = (end - start).num_seconds();
    secs.div_euclid(86_400)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_truncate_monthly() {
        assert_eq!(Period::Monthly.truncate(ts(2024, 2, 29, 13)), date(2024, 2, 1));
    }

    #[test]
    fn test_truncate_weekly_starts_monday() {
        // 2024-01-17 is a Wednesday.
        assert_eq!(Period::Weekly.truncate(ts(2024, 1, 17, 0)), date(2024, 1, 15));
        // A Monday maps to itself.
        assert_eq!(Period::Weekly.truncate(ts(2024, 1, 15, 8)), date(2024, 1, 15));
    }

    #[test]
    fn test_truncate_weekly_at_calendar_floor() {
        // The earliest date is not a Monday; its week start is unrepresentable.
        let floor = NaiveDate::MIN;
        assert_ne!(floor.weekday(), chrono::Weekday::Mon);
        let at_floor = floor.and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(Period::Weekly.truncate(at_floor), floor);
    }

    #[test]
    fn test_truncate_quarterly_and_yearly() {
        assert_eq!(Period::Quarterly.truncate(ts(2024, 5, 20, 0)), date(2024, 4, 1));
        assert_eq!(Period::Quarterly.truncate(ts(2024, 12, 31, 0)), date(2024, 10, 1));
        assert_eq!(Period::Yearly.truncate(ts(2024, 7, 4, 0)), date(2024, 1, 1));
    }

    #[test]
    fn test_labels() {
        assert_eq!(Period::Monthly.label(date(2024, 3, 1)), "2024-03");
        assert_eq!(Period::Quarterly.label(date(2024, 4, 1)), "2024-T2");
        assert_eq!(Period::Yearly.label(date(2024, 1, 1)), "2024");
    }

    #[test]
    fn test_default_period_is_monthly() {
        assert_eq!(Period::default(), Period::Monthly);
    }

    #[test]
    fn test_days_between_floors_partial_days() {
        assert_eq!(days_between(ts(2024, 1, 1, 0), ts(2024, 1, 31, 0)), 30);
        assert_eq!(days_between(ts(2024, 1, 1, 12), ts(2024, 1, 2, 6)), 0);
        assert_eq!(days_between(ts(2024, 1, 2, 0), ts(2024, 1, 1, 0)), -1);
    }
}
