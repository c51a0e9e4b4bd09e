//! Strategy trait and the per-tick view it trades through.

use crate::broker::{BracketIds, Broker, Order, OrderId, OrderSide, OrderSpec, Position, Trade};
use crate::feed::{line, FeedId};
use crate::graph::{Graph, NodeId};
use chrono::NaiveDateTime;

/// Verdict of [`Strategy::on_start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Run,
    /// Do not run; the reason lands in the run summary. Parameter sweeps
    /// use this to drop degenerate combinations without erroring.
    Skip(String),
}

/// User trading logic, driven once per engine tick.
///
/// Dispatch follows the warm-up of the indicator graph: `prenext` while any
/// node is short of its minimum period, `nextstart` exactly once when the
/// last one fills up, `next` from then on. Order and trade notifications
/// arrive before the tick's dispatch, in the order the broker emitted them,
/// followed by the tick's account snapshot.
pub trait Strategy: Send {
    /// Runs before the first bar. Returning `Skip` abandons the run cleanly.
    fn on_start(&mut self) -> StartOutcome {
        StartOutcome::Run
    }

    /// Ticks before the graph is warmed up.
    fn prenext(&mut self, _ctx: &mut StrategyCtx<'_>) {}

    /// First fully warmed-up tick. Defaults to `next`.
    fn nextstart(&mut self, ctx: &mut StrategyCtx<'_>) {
        self.next(ctx);
    }

    fn next(&mut self, ctx: &mut StrategyCtx<'_>);

    fn notify_order(&mut self, _order: &Order) {}

    fn notify_trade(&mut self, _trade: &Trade) {}

    /// Account cash and total value for the tick.
    fn notify_cash_value(&mut self, _cash: f64, _value: f64) {}

    /// Fund-style account view: net asset value per share plus the share
    /// count. Shares move only on external cash flows, so they hold still
    /// for the length of a run.
    fn notify_fund(&mut self, _cash: f64, _value: f64, _fund_value: f64, _shares: f64) {}

    /// Runs after the last bar.
    fn on_stop(&mut self, _ctx: &mut StrategyCtx<'_>) {}
}

/// What a strategy sees and can do during one tick: read any graph line,
/// query the account, and route orders. Submissions meet price data on the
/// next bar.
pub struct StrategyCtx<'a> {
    pub(crate) graph: &'a Graph,
    pub(crate) broker: &'a mut Broker,
    pub(crate) feed_nodes: &'a [NodeId],
    pub(crate) datetime: NaiveDateTime,
    pub(crate) tick: usize,
}

impl StrategyCtx<'_> {
    pub fn datetime(&self) -> NaiveDateTime {
        self.datetime
    }

    pub fn tick(&self) -> usize {
        self.tick
    }

    // ── graph reads ──────────────────────────────────────────────────

    /// First line of `node` at relative offset `ago`.
    pub fn value_of(&self, node: NodeId, ago: i32) -> f64 {
        self.graph.value(node, 0, ago)
    }

    pub fn line_of(&self, node: NodeId, line: usize, ago: i32) -> f64 {
        self.graph.value(node, line, ago)
    }

    pub fn len_of(&self, node: NodeId) -> usize {
        self.graph.len_of(node)
    }

    fn feed_node(&self, feed: FeedId) -> NodeId {
        self.feed_nodes[feed.0]
    }

    pub fn open(&self, feed: FeedId, ago: i32) -> f64 {
        self.graph.value(self.feed_node(feed), line::OPEN, ago)
    }

    pub fn high(&self, feed: FeedId, ago: i32) -> f64 {
        self.graph.value(self.feed_node(feed), line::HIGH, ago)
    }

    pub fn low(&self, feed: FeedId, ago: i32) -> f64 {
        self.graph.value(self.feed_node(feed), line::LOW, ago)
    }

    pub fn close(&self, feed: FeedId, ago: i32) -> f64 {
        self.graph.value(self.feed_node(feed), line::CLOSE, ago)
    }

    pub fn volume(&self, feed: FeedId, ago: i32) -> f64 {
        self.graph.value(self.feed_node(feed), line::VOLUME, ago)
    }

    /// Bars the feed has delivered so far.
    pub fn bars(&self, feed: FeedId) -> usize {
        self.graph.len_of(self.feed_node(feed))
    }

    // ── account ──────────────────────────────────────────────────────

    pub fn cash(&self) -> f64 {
        self.broker.cash()
    }

    pub fn account_value(&self) -> f64 {
        self.broker.value()
    }

    pub fn position(&self, feed: FeedId) -> Position {
        self.broker.position(feed)
    }

    // ── order routing ────────────────────────────────────────────────

    pub fn submit(&mut self, spec: OrderSpec) -> OrderId {
        self.broker.submit(spec, self.datetime, self.tick)
    }

    /// Market buy.
    pub fn buy(&mut self, feed: FeedId, size: f64) -> OrderId {
        self.submit(OrderSpec::market(feed, OrderSide::Buy, size))
    }

    /// Market sell.
    pub fn sell(&mut self, feed: FeedId, size: f64) -> OrderId {
        self.submit(OrderSpec::market(feed, OrderSide::Sell, size))
    }

    /// Flatten the feed's position with a market order. `None` when flat.
    pub fn close_position(&mut self, feed: FeedId) -> Option<OrderId> {
        let pos = self.broker.position(feed);
        if pos.size == 0.0 {
            return None;
        }
        let side = if pos.size > 0.0 {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };
        Some(self.submit(OrderSpec::market(feed, side, pos.size.abs())))
    }

    pub fn buy_bracket(
        &mut self,
        feed: FeedId,
        size: f64,
        stop_price: f64,
        limit_price: f64,
    ) -> BracketIds {
        self.broker.submit_bracket(
            OrderSpec::market(feed, OrderSide::Buy, size),
            stop_price,
            limit_price,
            self.datetime,
            self.tick,
        )
    }

    pub fn sell_bracket(
        &mut self,
        feed: FeedId,
        size: f64,
        stop_price: f64,
        limit_price: f64,
    ) -> BracketIds {
        self.broker.submit_bracket(
            OrderSpec::market(feed, OrderSide::Sell, size),
            stop_price,
            limit_price,
            self.datetime,
            self.tick,
        )
    }

    pub fn cancel(&mut self, id: OrderId) -> bool {
        self.broker.cancel(id, self.tick)
    }
}
