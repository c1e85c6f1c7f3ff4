//! Calendar periods and date ranges
//!
//! Period filters (jour / semaine / mois / annee) resolve to half-open
//! `[start, end)` ranges anchored on the server's local time zone, then
//! converted to UTC for querying. Unknown period strings are ignored by
//! filters (legacy permissive behavior) after a warning; once parsed into
//! the enum an invalid period cannot exist.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar period relative to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Jour,
    Semaine,
    Mois,
    Annee,
}

impl Period {
    /// Parse a period filter value. Unknown values return `None` and are
    /// logged; callers skip the period clause entirely in that case.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "jour" => Some(Period::Jour),
            "semaine" => Some(Period::Semaine),
            "mois" => Some(Period::Mois),
            "annee" => Some(Period::Annee),
            other => {
                tracing::warn!(period = %other, "Unknown period value, filter ignored");
                None
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Jour => "jour",
            Period::Semaine => "semaine",
            Period::Mois => "mois",
            Period::Annee => "annee",
        }
    }

    /// Resolve the period against the current local date.
    pub fn to_range(&self) -> DateRange {
        self.range_from(Local::now().date_naive())
    }

    /// Resolve the period against an explicit local date (pure, testable).
    pub fn range_from(&self, today: NaiveDate) -> DateRange {
        let (start, end) = match self {
            Period::Jour => (today, today + Duration::days(1)),
            Period::Semaine => {
                let monday =
                    today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
                (monday, monday + Duration::days(7))
            }
            Period::Mois => {
                let first = today.with_day(1).unwrap();
                let next = if first.month() == 12 {
                    NaiveDate::from_ymd_opt(first.year() + 1, 1, 1).unwrap()
                } else {
                    NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1).unwrap()
                };
                (first, next)
            }
            Period::Annee => (
                NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(today.year() + 1, 1, 1).unwrap(),
            ),
        };

        DateRange {
            start: local_midnight_utc(start),
            end: local_midnight_utc(end),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Half-open `[start, end)` UTC range used by every replaying query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }

    /// True when the range covers more than one local calendar day.
    pub fn spans_multiple_days(&self) -> bool {
        self.start.with_timezone(&Local).date_naive() != (self.end
            - Duration::nanoseconds(1))
        .with_timezone(&Local)
        .date_naive()
    }

    /// Local calendar days covered by the range, in date order.
    pub fn days(&self) -> Vec<NaiveDate> {
        let first = self.start.with_timezone(&Local).date_naive();
        let last = (self.end - Duration::nanoseconds(1))
            .with_timezone(&Local)
            .date_naive();

        let mut days = Vec::new();
        let mut day = first;
        while day <= last {
            days.push(day);
            day += Duration::days(1);
        }
        days
    }
}

/// Local midnight of `date`, expressed in UTC. On a DST gap the earliest
/// valid instant is used.
fn local_midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap();
    match Local.from_local_datetime(&midnight).earliest() {
        Some(at) => at.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&midnight),
    }
}

/// UTC bounds of a single local calendar day.
pub fn day_bounds(date: NaiveDate) -> DateRange {
    DateRange {
        start: local_midnight_utc(date),
        end: local_midnight_utc(date + Duration::days(1)),
    }
}
