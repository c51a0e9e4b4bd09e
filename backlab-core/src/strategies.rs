//! Reference strategies.
//!
//! These two cover the dispatch surface end to end: `BuyHold` exercises the
//! single `nextstart` transition, `MaCross` trades a crossover signal line
//! and reacts to order and trade notifications. Anything fancier belongs to
//! the caller; the engine only needs a [`Strategy`].

use crate::feed::FeedId;
use crate::graph::NodeId;
use crate::strategy::{StartOutcome, Strategy, StrategyCtx};

/// Buys once on the first warmed-up bar and holds to the end.
#[derive(Debug)]
pub struct BuyHold {
    feed: FeedId,
    size: f64,
}

impl BuyHold {
    pub fn new(feed: FeedId, size: f64) -> Self {
        assert!(size > 0.0, "size must be positive");
        Self { feed, size }
    }
}

impl Strategy for BuyHold {
    fn nextstart(&mut self, ctx: &mut StrategyCtx<'_>) {
        ctx.buy(self.feed, self.size);
    }

    fn next(&mut self, _ctx: &mut StrategyCtx<'_>) {}
}

/// Long-only moving-average crossover.
///
/// Reads a signal line (a `CrossOver` over a fast and a slow average): goes
/// long on +1 when flat, exits on -1. The fast and slow periods are carried
/// only to refuse degenerate parameter combinations at start.
#[derive(Debug)]
pub struct MaCross {
    feed: FeedId,
    signal: NodeId,
    fast: usize,
    slow: usize,
    size: f64,
}

impl MaCross {
    pub fn new(feed: FeedId, signal: NodeId, fast: usize, slow: usize, size: f64) -> Self {
        assert!(size > 0.0, "size must be positive");
        Self {
            feed,
            signal,
            fast,
            slow,
            size,
        }
    }
}

impl Strategy for MaCross {
    fn on_start(&mut self) -> StartOutcome {
        if self.fast >= self.slow {
            return StartOutcome::Skip(format!(
                "fast period {} must be below slow period {}",
                self.fast, self.slow
            ));
        }
        StartOutcome::Run
    }

    fn next(&mut self, ctx: &mut StrategyCtx<'_>) {
        let signal = ctx.value_of(self.signal, 0);
        let position = ctx.position(self.feed).size;
        if signal > 0.0 && position == 0.0 {
            ctx.buy(self.feed, self.size);
        } else if signal < 0.0 && position > 0.0 {
            ctx.close_position(self.feed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::OrderStatus;
    use crate::engine::Engine;
    use crate::feed::{line, Bar, VecFeed};
    use crate::graph::Input;
    use crate::indicators::{CrossOver, Sma};
    use chrono::NaiveDate;

    fn flat_bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                datetime: NaiveDate::from_ymd_opt(2024, 3, 1 + i as u32)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1_000.0,
                openinterest: 0.0,
            })
            .collect()
    }

    fn crossover_engine(closes: &[f64], fast: usize, slow: usize) -> (Engine, FeedId, NodeId) {
        let mut engine = Engine::new();
        let feed = engine.add_feed(VecFeed::daily(flat_bars(closes)));
        let src = engine.feed_node(feed);
        let fast_ma = engine
            .add_node(
                Box::new(Sma::new(fast)),
                vec![Input::new(src, line::CLOSE, fast - 1)],
            )
            .unwrap();
        let slow_ma = engine
            .add_node(
                Box::new(Sma::new(slow)),
                vec![Input::new(src, line::CLOSE, slow - 1)],
            )
            .unwrap();
        let signal = engine
            .add_node(
                Box::new(CrossOver::new()),
                vec![Input::new(fast_ma, 0, 1), Input::new(slow_ma, 0, 1)],
            )
            .unwrap();
        (engine, feed, signal)
    }

    #[test]
    fn buy_hold_enters_once_and_stays() {
        let mut engine = Engine::new();
        let feed = engine.add_feed(VecFeed::daily(flat_bars(&[10.0, 11.0, 12.0, 13.0])));
        let mut strategy = BuyHold::new(feed, 2.0);
        let summary = engine.run(&mut strategy).unwrap();

        assert_eq!(summary.orders.len(), 1);
        assert_eq!(summary.orders[0].status, OrderStatus::Completed);
        assert_eq!(engine.broker().position(feed).size, 2.0);
        assert!(summary.trades.is_empty(), "the position never closes");
    }

    #[test]
    fn ma_cross_round_trips_a_position() {
        // Flat at 10, jump to 20, collapse to 5: SMA(2) crosses over and
        // back under SMA(3) once each.
        let closes = [10.0, 10.0, 10.0, 20.0, 20.0, 5.0, 5.0, 5.0];
        let (mut engine, feed, signal) = crossover_engine(&closes, 2, 3);
        let mut strategy = MaCross::new(feed, signal, 2, 3, 1.0);
        let summary = engine.run(&mut strategy).unwrap();

        assert_eq!(summary.trades.len(), 1);
        let trade = &summary.trades[0];
        assert!(trade.is_long);
        // Entry meets the day-5 open (20), exit the day-7 open (5).
        assert_eq!(trade.price, 20.0);
        assert_eq!(trade.pnl, -15.0);
        assert_eq!(engine.broker().position(feed).size, 0.0);
    }

    #[test]
    fn ma_cross_refuses_inverted_periods() {
        let closes = [10.0, 11.0, 12.0];
        let (mut engine, feed, signal) = crossover_engine(&closes, 3, 3);
        let mut strategy = MaCross::new(feed, signal, 3, 3, 1.0);
        let summary = engine.run(&mut strategy).unwrap();
        assert_eq!(summary.ticks, 0);
        assert!(summary.skipped.is_some());
    }
}
