//! OHLCV bar and the actions a source can apply to its stream.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One price bar. `volume` and `openinterest` are floats so synthetic and
/// aggregated data round-trip without truncation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub datetime: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub openinterest: f64,
}

impl Bar {
    /// Basic shape check: high is the top, low is the bottom, nothing NaN.
    pub fn is_sane(&self) -> bool {
        !self.open.is_nan()
            && !self.high.is_nan()
            && !self.low.is_nan()
            && !self.close.is_nan()
            && self.high >= self.low
            && self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
    }
}

/// How a bar enters a stream.
///
/// `Append` adds a new bar at the end. `Amend` rewrites the newest bar in
/// place without growing the stream; only replaying sources emit it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BarAction {
    Append(Bar),
    Amend(Bar),
}

impl BarAction {
    pub fn bar(&self) -> &Bar {
        match self {
            BarAction::Append(b) | BarAction::Amend(b) => b,
        }
    }
}

/// Line indices of a bar source in the graph.
pub mod line {
    pub const OPEN: usize = 0;
    pub const HIGH: usize = 1;
    pub const LOW: usize = 2;
    pub const CLOSE: usize = 3;
    pub const VOLUME: usize = 4;
    pub const OPENINTEREST: usize = 5;

    pub const COUNT: usize = 6;
}

impl Bar {
    /// The bar's lines in graph order.
    pub fn row(&self) -> [f64; line::COUNT] {
        [
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
            self.openinterest,
        ]
    }
}

#[cfg(test)]
pub(crate) fn sample_bar(day: u32, open: f64, high: f64, low: f64, close: f64) -> Bar {
    use chrono::NaiveDate;
    Bar {
        datetime: NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
        open,
        high,
        low,
        close,
        volume: 1_000.0,
        openinterest: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sane_bar_passes_shape_check() {
        assert!(sample_bar(1, 10.0, 12.0, 9.0, 11.0).is_sane());
    }

    #[test]
    fn inverted_range_fails_shape_check() {
        assert!(!sample_bar(1, 10.0, 9.0, 12.0, 11.0).is_sane());
    }

    #[test]
    fn close_outside_range_fails_shape_check() {
        let mut bar = sample_bar(1, 10.0, 12.0, 9.0, 11.0);
        bar.close = 13.0;
        assert!(!bar.is_sane());
    }

    #[test]
    fn row_matches_line_order() {
        let bar = sample_bar(1, 1.0, 2.0, 0.5, 1.5);
        let row = bar.row();
        assert_eq!(row[line::OPEN], 1.0);
        assert_eq!(row[line::HIGH], 2.0);
        assert_eq!(row[line::LOW], 0.5);
        assert_eq!(row[line::CLOSE], 1.5);
        assert_eq!(row[line::VOLUME], 1_000.0);
        assert_eq!(row[line::OPENINTEREST], 0.0);
    }
}
