//! Calendar periods
//!
//! Fixed granularities used to bucket timestamps. A period is identified by the
//! date it starts on, taken in the timestamp's own offset.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Calendar bucket size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    Day,
    /// Weeks start on Monday
    Week,
    Month,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }

    /// Start date of the period containing `date`
    pub fn truncate_date(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Week => {
                date - Days::new(u64::from(date.weekday().num_days_from_monday()))
            }
            Granularity::Month => date.with_day(1).unwrap_or(date),
        }
    }

    /// Start date of the period containing `ts`, in its own offset
    pub fn truncate<Tz: TimeZone>(&self, ts: &DateTime<Tz>) -> NaiveDate {
        self.truncate_date(ts.date_naive())
    }

    /// Start of the period following the one starting at `start`
    pub fn next(&self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Day => start.checked_add_days(Days::new(1)),
            Granularity::Week => start.checked_add_days(Days::new(7)),
            Granularity::Month => start.checked_add_months(Months::new(1)),
        }
    }

    /// Every period start from `first` through `last`, inclusive, with no gaps
    pub fn range(&self, first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
        let mut periods = Vec::new();
        let mut current = Some(self.truncate_date(first));
        let last = self.truncate_date(last);

        while let Some(period) = current {
            if period > last {
                break;
            }
            periods.push(period);
            current = self.next(period);
        }
        periods
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "d" | "day" | "days" => Ok(Granularity::Day),
            "w" | "week" | "weeks" => Ok(Granularity::Week),
            "m" | "month" | "months" => Ok(Granularity::Month),
            other => Err(format!("unknown granularity: {other}")),
        }
    }
}
