use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

use crate::errors::AppError;

/// Symbolic reporting period. The window always ends at "now".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Timeframe {
    #[default]
    Today,
    Weekly,
    Monthly,
    Yearly,
}

impl Timeframe {
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::Today => "today",
            Timeframe::Weekly => "weekly",
            Timeframe::Monthly => "monthly",
            Timeframe::Yearly => "yearly",
        }
    }

    /// Start boundary for a window ending at `now`.
    fn start_for(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let day = match self {
            Timeframe::Today => today,
            Timeframe::Weekly => {
                today - Duration::days(i64::from(now.weekday().num_days_from_monday()))
            }
            Timeframe::Monthly => today.with_day(1).unwrap_or(today),
            Timeframe::Yearly => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
        };
        Utc.from_utc_datetime(&day.and_time(chrono::NaiveTime::MIN))
    }
}

impl FromStr for Timeframe {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_lowercase();
        match normalized.as_str() {
            "today" => Ok(Timeframe::Today),
            "weekly" => Ok(Timeframe::Weekly),
            "monthly" => Ok(Timeframe::Monthly),
            "yearly" => Ok(Timeframe::Yearly),
            _ => Err(AppError::InvalidTimeframe(normalized)),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Concrete half-open reporting interval, with an inclusive upper bound on scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub timeframe: Timeframe,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn label(&self) -> &'static str {
        self.timeframe.label()
    }

    /// True when `timestamp` parses and lies in `[start, end]`.
    pub fn contains(&self, timestamp: &str) -> bool {
        match parse_record_timestamp(timestamp) {
            Some(ts) => ts >= self.start && ts <= self.end,
            None => false,
        }
    }

    pub fn start_date(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_date(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

/// Resolve an optional label into a window. A missing or empty label means
/// `today`; anything unrecognized, whitespace included, is rejected.
pub fn resolve(label: Option<&str>, now: DateTime<Utc>) -> Result<TimeWindow, AppError> {
    let timeframe = match label.filter(|l| !l.is_empty()) {
        Some(l) => l.parse::<Timeframe>()?,
        None => Timeframe::default(),
    };

    Ok(TimeWindow {
        timeframe,
        start: timeframe.start_for(now),
        end: now,
    })
}

/// Record timestamps are written as ISO-8601, with or without an offset.
/// Naive values are read as UTC.
pub fn parse_record_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
