//! Weekly statistics over a hospital's patient records.
//!
//! Everything here is a pure function of the record set, the current instant
//! and the UTC offset that defines local week boundaries. Weeks start at local
//! midnight on Sunday and are half-open: `[start, start + 7 days)`.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Timelike, Utc};

use crate::models::{Patient, TrendPoint, WeekOverWeek, WeeklySnapshot, WeeklyStats};

/// Risk strictly above this counts as high risk.
pub const HIGH_RISK_CUTOFF: f64 = 30.0;
pub const TREND_WEEKS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    offset: FixedOffset,
}

impl WeekWindow {
    /// The calendar week containing `now` in the given offset.
    pub fn containing(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local = now.with_timezone(&offset);
        let since_midnight = Duration::seconds(local.num_seconds_from_midnight() as i64)
            + Duration::nanoseconds(local.nanosecond() as i64);
        let days_back = Duration::days(local.weekday().num_days_from_sunday() as i64);

        let start = (local - since_midnight - days_back).with_timezone(&Utc);
        Self {
            start,
            end: start + Duration::days(7),
            offset,
        }
    }

    pub fn previous(&self) -> Self {
        Self {
            start: self.start - Duration::days(7),
            end: self.start,
            offset: self.offset,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// `Mar 1-7`, or `Feb 26-Mar 4` when the week spans two months.
    pub fn label(&self) -> String {
        let first = self.start.with_timezone(&self.offset);
        let last = first + Duration::days(6);

        if first.month() == last.month() {
            format!("{} {}-{}", first.format("%b"), first.day(), last.day())
        } else {
            format!(
                "{} {}-{} {}",
                first.format("%b"),
                first.day(),
                last.format("%b"),
                last.day()
            )
        }
    }
}

pub fn snapshot<'a, I>(patients: I) -> WeeklySnapshot
where
    I: IntoIterator<Item = &'a Patient>,
{
    let mut stats = WeeklySnapshot::default();
    let mut risk_sum = 0.0;
    let mut assessed = 0usize;

    for patient in patients {
        stats.total_patients += 1;
        if !patient.is_approved() {
            stats.unapproved_assessments += 1;
        }
        match patient.readmission_risk {
            Some(risk) => {
                assessed += 1;
                risk_sum += risk;
                if risk > HIGH_RISK_CUTOFF {
                    stats.high_risk_patients += 1;
                }
            }
            None => stats.pending_assessments += 1,
        }
    }

    if assessed > 0 {
        stats.average_readmission_risk = risk_sum / assessed as f64;
    }
    stats
}

/// `(current - previous) / previous * 100`, or 0 when there is no baseline.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        0.0
    } else {
        (current - previous) / previous * 100.0
    }
}

impl WeekOverWeek {
    pub fn between(current: &WeeklySnapshot, previous: &WeeklySnapshot) -> Self {
        let change = |c: usize, p: usize| percent_change(c as f64, p as f64);
        Self {
            total_patients: change(current.total_patients, previous.total_patients),
            pending_assessments: change(current.pending_assessments, previous.pending_assessments),
            unapproved_assessments: change(
                current.unapproved_assessments,
                previous.unapproved_assessments,
            ),
            average_readmission_risk: percent_change(
                current.average_readmission_risk,
                previous.average_readmission_risk,
            ),
            high_risk_patients: change(current.high_risk_patients, previous.high_risk_patients),
        }
    }
}

pub fn weekly_stats(patients: &[Patient], now: DateTime<Utc>, offset: FixedOffset) -> WeeklyStats {
    let window_snapshot = |w: &WeekWindow| snapshot(patients.iter().filter(|p| w.contains(p.date)));

    let current = WeekWindow::containing(now, offset);
    let last = current.previous();

    let mut trend_data: Vec<TrendPoint> = std::iter::successors(Some(last), |w| Some(w.previous()))
        .take(TREND_WEEKS)
        .map(|w| TrendPoint {
            week: w.label(),
            stats: window_snapshot(&w),
        })
        .collect();
    trend_data.reverse();

    let current_week = window_snapshot(&current);
    let last_week = window_snapshot(&last);

    WeeklyStats {
        changes: WeekOverWeek::between(&current_week, &last_week),
        current_week,
        last_week,
        trend_data,
    }
}
