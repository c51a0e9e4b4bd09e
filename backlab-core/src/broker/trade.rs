//! Round-trip trades: one open position from first entry to flat.

use crate::feed::FeedId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Open,
    Closed,
}

/// One fill portion as it landed on the trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub datetime: NaiveDateTime,
    /// Bar index in the trade's own feed.
    pub bar: usize,
    /// Signed portion folded in: extensions carry the trade's sign,
    /// reductions the opposite.
    pub size: f64,
    pub price: f64,
    pub commission: f64,
    /// Profit realized by this portion; zero for extensions.
    pub pnl: f64,
    /// Open size after the fold.
    pub position: f64,
}

/// Accumulated view of one position from the fill that opened it to the
/// fill that flattened it. A reversal closes the running trade and starts
/// a fresh one for the residual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub feed: FeedId,
    pub is_long: bool,
    pub status: TradeStatus,
    /// Signed size still open.
    pub size: f64,
    /// Volume-weighted entry price.
    pub price: f64,
    /// Entry notional of the open size, signed.
    pub value: f64,
    pub commission: f64,
    /// Profit realized by closing fills, gross of commission.
    pub pnl: f64,
    /// `pnl` net of all commission charged to this trade.
    pub pnl_comm: f64,
    pub opened: NaiveDateTime,
    pub closed: Option<NaiveDateTime>,
    /// Bar index in the trade's own feed at the opening fill.
    pub bar_open: usize,
    /// Bar index in the trade's own feed at the flattening fill.
    pub bar_close: Option<usize>,
    /// Every fill portion in arrival order, the opening one included.
    pub history: Vec<TradeEvent>,
}

impl Trade {
    pub fn open(
        feed: FeedId,
        datetime: NaiveDateTime,
        bar: usize,
        size: f64,
        price: f64,
        commission: f64,
    ) -> Self {
        debug_assert!(size != 0.0, "a trade opens with a nonzero fill");
        Self {
            feed,
            is_long: size > 0.0,
            status: TradeStatus::Open,
            size,
            price,
            value: size * price,
            commission,
            pnl: 0.0,
            pnl_comm: -commission,
            opened: datetime,
            closed: None,
            bar_open: bar,
            bar_close: None,
            history: vec![TradeEvent {
                datetime,
                bar,
                size,
                price,
                commission,
                pnl: 0.0,
                position: size,
            }],
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    /// Fold one fill portion into the trade. Extensions update the entry
    /// vwap; reductions realize `pnl`. Reaching zero closes the trade.
    pub fn update(
        &mut self,
        datetime: NaiveDateTime,
        bar: usize,
        size: f64,
        price: f64,
        commission: f64,
        pnl: f64,
    ) {
        debug_assert!(self.is_open(), "closed trades take no further fills");
        let oldsize = self.size;
        self.size += size;
        if oldsize != 0.0 && size.signum() == oldsize.signum() {
            self.price = (self.price * oldsize + price * size) / self.size;
        }
        self.value = self.price * self.size;
        self.commission += commission;
        self.pnl += pnl;
        self.pnl_comm = self.pnl - self.commission;
        self.history.push(TradeEvent {
            datetime,
            bar,
            size,
            price,
            commission,
            pnl,
            position: self.size,
        });
        if self.size == 0.0 {
            self.status = TradeStatus::Closed;
            self.closed = Some(datetime);
            self.bar_close = Some(bar);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn long_round_trip() {
        let mut trade = Trade::open(FeedId(0), dt(1), 0, 100.0, 10.0, 5.0);
        assert!(trade.is_open());
        assert!(trade.is_long);
        assert_eq!(trade.value, 1000.0);
        assert_eq!(trade.pnl_comm, -5.0);

        trade.update(dt(3), 2, -100.0, 12.0, 6.0, 200.0);
        assert_eq!(trade.status, TradeStatus::Closed);
        assert_eq!(trade.size, 0.0);
        assert_eq!(trade.pnl, 200.0);
        assert_eq!(trade.pnl_comm, 189.0);
        assert_eq!(trade.closed, Some(dt(3)));
        assert_eq!(trade.bar_close, Some(2));
    }

    #[test]
    fn extension_reprices_entry() {
        let mut trade = Trade::open(FeedId(0), dt(1), 0, 100.0, 10.0, 0.0);
        trade.update(dt(2), 1, 100.0, 12.0, 0.0, 0.0);
        assert_eq!(trade.size, 200.0);
        assert_eq!(trade.price, 11.0);
        assert_eq!(trade.value, 2200.0);
        assert!(trade.is_open());
    }

    #[test]
    fn partial_close_keeps_entry_price() {
        let mut trade = Trade::open(FeedId(0), dt(1), 0, 100.0, 10.0, 0.0);
        trade.update(dt(2), 1, -40.0, 13.0, 0.0, 120.0);
        assert!(trade.is_open());
        assert_eq!(trade.size, 60.0);
        assert_eq!(trade.price, 10.0);
        assert_eq!(trade.pnl, 120.0);
    }

    #[test]
    fn history_logs_each_fill_portion() {
        let mut trade = Trade::open(FeedId(0), dt(1), 0, 60.0, 10.0, 1.0);
        trade.update(dt(2), 1, 60.0, 11.0, 1.0, 0.0);
        trade.update(dt(3), 2, -70.0, 12.0, 1.0, 105.0);
        trade.update(dt(5), 4, -50.0, 13.0, 1.0, 125.0);
        assert_eq!(trade.status, TradeStatus::Closed);

        let sizes: Vec<f64> = trade.history.iter().map(|e| e.size).collect();
        assert_eq!(sizes, vec![60.0, 60.0, -70.0, -50.0]);
        let held: Vec<f64> = trade.history.iter().map(|e| e.position).collect();
        assert_eq!(held, vec![60.0, 120.0, 50.0, 0.0]);
        assert_eq!(trade.history[2].bar, 2);
        assert_eq!(trade.history[2].pnl, 105.0);
        assert_eq!(trade.history[3].datetime, dt(5));
        // Scalar aggregates remain the fold of the event log.
        assert_eq!(trade.pnl, 230.0);
        assert_eq!(trade.commission, 4.0);
    }

    #[test]
    fn short_trade_closes_on_buyback() {
        let mut trade = Trade::open(FeedId(1), dt(1), 0, -100.0, 10.0, 1.0);
        assert!(!trade.is_long);
        trade.update(dt(4), 3, 100.0, 8.0, 1.0, 200.0);
        assert_eq!(trade.status, TradeStatus::Closed);
        assert_eq!(trade.pnl_comm, 198.0);
    }
}
