//! Bar granularities and calendar bucketing.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Bar granularity, ordered fine to coarse.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TimeFrame {
    Minutes,
    Days,
    Weeks,
    Months,
    Years,
}

impl TimeFrame {
    /// Index of the period containing `dt` when bars are grouped
    /// `compression` periods at a time. Two datetimes share a period exactly
    /// when their indices are equal; a change of index is a period boundary.
    pub fn period_index(self, dt: NaiveDateTime, compression: u32) -> i64 {
        let comp = i64::from(compression.max(1));
        match self {
            TimeFrame::Minutes => {
                let minutes =
                    i64::from(dt.num_days_from_ce()) * 24 * 60 + i64::from(dt.hour()) * 60
                        + i64::from(dt.minute());
                minutes / comp
            }
            TimeFrame::Days => i64::from(dt.num_days_from_ce()) / comp,
            // ISO-ish weeks: day 1 of year 1 CE was a Monday, so this puts
            // every Monday..Sunday run in one bucket.
            TimeFrame::Weeks => (i64::from(dt.num_days_from_ce()) - 1) / 7 / comp,
            TimeFrame::Months => {
                (i64::from(dt.year()) * 12 + i64::from(dt.month0())) / comp
            }
            TimeFrame::Years => i64::from(dt.year()) / comp,
        }
    }
}
