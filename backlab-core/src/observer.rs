//! Observers and analyzers: read-only per-tick consumers of run state.
//!
//! Observers record series for inspection; analyzers additionally fold
//! notifications and report a JSON summary at the end of a run. Both run
//! after the strategy and the cheat-on-close sweep, so they see the tick's
//! final account state.

use crate::broker::{Broker, Order, Trade, TradeStatus};
use crate::graph::Graph;
use crate::graph::NodeId;
use chrono::NaiveDateTime;
use serde_json::json;

/// Read-only view of one finished tick.
pub struct ObsCtx<'a> {
    pub(crate) graph: &'a Graph,
    pub(crate) broker: &'a Broker,
    pub(crate) feed_nodes: &'a [NodeId],
    pub(crate) datetime: NaiveDateTime,
    pub(crate) tick: usize,
}

impl ObsCtx<'_> {
    pub fn datetime(&self) -> NaiveDateTime {
        self.datetime
    }

    pub fn tick(&self) -> usize {
        self.tick
    }

    pub fn cash(&self) -> f64 {
        self.broker.cash()
    }

    pub fn value(&self) -> f64 {
        self.broker.value()
    }

    pub fn value_of(&self, node: NodeId, ago: i32) -> f64 {
        self.graph.value(node, 0, ago)
    }

    pub fn feed_nodes(&self) -> &[NodeId] {
        self.feed_nodes
    }
}

pub trait Observer: Send {
    fn on_bar(&mut self, ctx: &ObsCtx<'_>);
}

pub trait Analyzer: Send {
    fn on_bar(&mut self, _ctx: &ObsCtx<'_>) {}

    fn notify_order(&mut self, _order: &Order) {}

    fn notify_trade(&mut self, _trade: &Trade) {}

    /// Summary of the whole run as JSON.
    fn analysis(&self) -> serde_json::Value;
}

// ── observers ────────────────────────────────────────────────────────

/// Records cash and account value per tick.
#[derive(Default)]
pub struct AccountObserver {
    pub cash: Vec<f64>,
    pub value: Vec<f64>,
}

impl Observer for AccountObserver {
    fn on_bar(&mut self, ctx: &ObsCtx<'_>) {
        self.cash.push(ctx.cash());
        self.value.push(ctx.value());
    }
}

/// Tracks drawdown from the running equity peak, in fractional terms.
#[derive(Default)]
pub struct DrawDownObserver {
    peak: f64,
    pub drawdown: Vec<f64>,
    pub max_drawdown: f64,
}

impl Observer for DrawDownObserver {
    fn on_bar(&mut self, ctx: &ObsCtx<'_>) {
        let value = ctx.value();
        if value > self.peak {
            self.peak = value;
        }
        let dd = if self.peak > 0.0 {
            (self.peak - value) / self.peak
        } else {
            0.0
        };
        self.drawdown.push(dd);
        if dd > self.max_drawdown {
            self.max_drawdown = dd;
        }
    }
}

// ── analyzers ────────────────────────────────────────────────────────

/// Win/loss statistics over closed trades.
#[derive(Default)]
pub struct TradeStats {
    pub total: usize,
    pub won: usize,
    pub lost: usize,
    pub pnl_net: f64,
    pub pnl_won: f64,
    pub pnl_lost: f64,
    pub best: f64,
    pub worst: f64,
}

impl Analyzer for TradeStats {
    fn notify_trade(&mut self, trade: &Trade) {
        if trade.status != TradeStatus::Closed {
            return;
        }
        self.total += 1;
        self.pnl_net += trade.pnl_comm;
        if trade.pnl_comm > 0.0 {
            self.won += 1;
            self.pnl_won += trade.pnl_comm;
        } else {
            self.lost += 1;
            self.pnl_lost += trade.pnl_comm;
        }
        if trade.pnl_comm > self.best {
            self.best = trade.pnl_comm;
        }
        if trade.pnl_comm < self.worst {
            self.worst = trade.pnl_comm;
        }
    }

    fn analysis(&self) -> serde_json::Value {
        json!({
            "total": self.total,
            "won": self.won,
            "lost": self.lost,
            "pnl_net": self.pnl_net,
            "pnl_won": self.pnl_won,
            "pnl_lost": self.pnl_lost,
            "best": self.best,
            "worst": self.worst,
        })
    }
}

/// Tick-over-tick account value returns.
#[derive(Default)]
pub struct ValueReturns {
    last: Option<f64>,
    pub returns: Vec<f64>,
}

impl Analyzer for ValueReturns {
    fn on_bar(&mut self, ctx: &ObsCtx<'_>) {
        let value = ctx.value();
        if let Some(last) = self.last {
            if last != 0.0 {
                self.returns.push(value / last - 1.0);
            }
        }
        self.last = Some(value);
    }

    fn analysis(&self) -> serde_json::Value {
        let total: f64 = self.returns.iter().map(|r| (1.0 + r).ln()).sum();
        json!({
            "ticks": self.returns.len(),
            "log_return": total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedId;
    use chrono::NaiveDate;

    fn closed_trade(pnl_comm: f64) -> Trade {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Trade {
            feed: FeedId(0),
            is_long: true,
            status: TradeStatus::Closed,
            size: 0.0,
            price: 0.0,
            value: 0.0,
            commission: 1.0,
            pnl: pnl_comm + 1.0,
            pnl_comm,
            opened: dt,
            closed: Some(dt),
            bar_open: 0,
            bar_close: Some(3),
            history: Vec::new(),
        }
    }

    #[test]
    fn trade_stats_split_wins_and_losses() {
        let mut stats = TradeStats::default();
        stats.notify_trade(&closed_trade(100.0));
        stats.notify_trade(&closed_trade(-40.0));
        stats.notify_trade(&closed_trade(60.0));
        assert_eq!(stats.total, 3);
        assert_eq!(stats.won, 2);
        assert_eq!(stats.lost, 1);
        assert_eq!(stats.pnl_net, 120.0);
        assert_eq!(stats.best, 100.0);
        assert_eq!(stats.worst, -40.0);

        let report = stats.analysis();
        assert_eq!(report["total"], 3);
        assert_eq!(report["pnl_net"], 120.0);
    }

    #[test]
    fn trade_stats_ignore_open_trades() {
        let mut stats = TradeStats::default();
        let mut trade = closed_trade(10.0);
        trade.status = TradeStatus::Open;
        stats.notify_trade(&trade);
        assert_eq!(stats.total, 0);
    }
}
