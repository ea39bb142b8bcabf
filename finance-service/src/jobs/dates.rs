//! Calendar arithmetic for recurring transactions and report schedules.
//!
//! All functions are pure and operate in UTC. Month and year steps use
//! chrono's `checked_add_months`, which clamps to the last valid day of the
//! target month: 2024-01-31 + 1 month is 2024-02-29, 2023-01-31 + 1 month is
//! 2023-02-28, and 2024-02-29 + 1 year is 2025-02-28. Time of day is kept.
//! `None` is only returned when the result falls outside chrono's range.

use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Utc};

use crate::models::RecurringInterval;

/// The date one `interval` after `anchor`.
pub fn next_occurrence(
    anchor: DateTime<Utc>,
    interval: RecurringInterval,
) -> Option<DateTime<Utc>> {
    match interval {
        RecurringInterval::Daily => anchor.checked_add_signed(Duration::days(1)),
        RecurringInterval::Weekly => anchor.checked_add_signed(Duration::weeks(1)),
        RecurringInterval::Monthly => anchor.checked_add_months(Months::new(1)),
        RecurringInterval::Yearly => anchor.checked_add_months(Months::new(12)),
    }
}

/// When the next monthly report becomes due: midnight on the first day of
/// the month after `last_sent`, or after `now` when nothing was sent yet.
///
/// Anchoring on the first of the month keeps the cadence from drifting with
/// the time the job happens to run.
pub fn next_report_date(
    last_sent: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    start_of_next_month(last_sent.unwrap_or(now))
}

pub fn start_of_month(at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
        .single()
}

pub fn start_of_next_month(at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    start_of_month(at)?.checked_add_months(Months::new(1))
}

/// Last representable instant of the month containing `at`, at the
/// millisecond precision the store keeps.
pub fn end_of_month(at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    start_of_next_month(at)?.checked_sub_signed(Duration::milliseconds(1))
}

/// Inclusive date range a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ReportWindow {
    /// The last fully completed calendar month before the one containing `now`.
    pub fn previous_month(now: DateTime<Utc>) -> Option<Self> {
        let prior = now.checked_sub_months(Months::new(1))?;
        Some(Self {
            from: start_of_month(prior)?,
            to: end_of_month(prior)?,
        })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at <= self.to
    }

    /// Label such as `February 1 - 29, 2024`.
    pub fn label(&self) -> String {
        period_label(self.from, self.to)
    }
}

pub fn period_label(from: DateTime<Utc>, to: DateTime<Utc>) -> String {
    format!("{} - {}", from.format("%B %-d"), to.format("%-d, %Y"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_daily_and_weekly_keep_time_of_day() {
        let anchor = at(2024, 2, 28, 9, 15);
        assert_eq!(
            next_occurrence(anchor, RecurringInterval::Daily),
            Some(at(2024, 2, 29, 9, 15))
        );
        assert_eq!(
            next_occurrence(anchor, RecurringInterval::Weekly),
            Some(at(2024, 3, 6, 9, 15))
        );
    }

    #[test]
    fn test_monthly_clamps_to_month_end() {
        assert_eq!(
            next_occurrence(at(2024, 1, 31, 8, 0), RecurringInterval::Monthly),
            Some(at(2024, 2, 29, 8, 0))
        );
        assert_eq!(
            next_occurrence(at(2023, 1, 31, 8, 0), RecurringInterval::Monthly),
            Some(at(2023, 2, 28, 8, 0))
        );
        assert_eq!(
            next_occurrence(at(2024, 12, 15, 8, 0), RecurringInterval::Monthly),
            Some(at(2025, 1, 15, 8, 0))
        );
    }

    #[test]
    fn test_yearly_keeps_month_and_day() {
        assert_eq!(
            next_occurrence(at(2024, 6, 10, 12, 0), RecurringInterval::Yearly),
            Some(at(2025, 6, 10, 12, 0))
        );
        assert_eq!(
            next_occurrence(at(2024, 2, 29, 12, 0), RecurringInterval::Yearly),
            Some(at(2025, 2, 28, 12, 0))
        );
    }

    #[test]
    fn test_next_report_date_when_never_sent() {
        let now = at(2024, 3, 15, 10, 42);
        assert_eq!(next_report_date(None, now), Some(at(2024, 4, 1, 0, 0)));
    }

    #[test]
    fn test_next_report_date_follows_last_sent() {
        let now = at(2024, 6, 1, 2, 30);
        let last_sent = at(2024, 3, 1, 2, 31);
        assert_eq!(
            next_report_date(Some(last_sent), now),
            Some(at(2024, 4, 1, 0, 0))
        );
        assert_eq!(
            next_report_date(Some(at(2024, 12, 1, 2, 30)), now),
            Some(at(2025, 1, 1, 0, 0))
        );
    }

    #[test]
    fn test_next_report_date_is_after_the_run_that_computed_it() {
        // The report job fires a little after midnight on the 1st; the next
        // due date must be the following month, never the current one.
        let run = at(2024, 3, 1, 2, 30);
        let next = next_report_date(None, run).unwrap();
        assert!(next > run);
        assert_eq!(next, at(2024, 4, 1, 0, 0));
    }

    #[test]
    fn test_previous_month_window() {
        let window = ReportWindow::previous_month(at(2024, 3, 1, 2, 30)).unwrap();
        assert_eq!(window.from, at(2024, 2, 1, 0, 0));
        assert_eq!(
            window.to,
            at(2024, 3, 1, 0, 0) - Duration::milliseconds(1)
        );
        assert!(window.contains(at(2024, 2, 29, 23, 59)));
        assert!(!window.contains(at(2024, 3, 1, 0, 0)));
        assert_eq!(window.label(), "February 1 - 29, 2024");
    }

    #[test]
    fn test_previous_month_window_at_exact_month_boundary() {
        let window = ReportWindow::previous_month(at(2025, 1, 1, 0, 0)).unwrap();
        assert_eq!(window.from, at(2024, 12, 1, 0, 0));
        assert_eq!(window.label(), "December 1 - 31, 2024");
    }
}
