//! Simulated broker: order queue, matching, slippage, fills, cash,
//! positions and round-trip trades.
//!
//! The engine drives the broker once per delivered bar. Orders submitted
//! during a strategy callback sit in a FIFO queue and meet price data for
//! the first time on the following bar, so nothing ever fills on information
//! the strategy could not have had. Every status transition emits a
//! notification clone which the engine hands back to the strategy before its
//! next callback.
//!
//! Cash accounting is scheme-driven (see [`CommissionInfo`]): stock fills
//! move their full traded value, futures fills move margin and settle profit
//! against the per-feed mark, which advances every bar in
//! [`Broker::mark_to_market`]. A fill that would leave cash negative is
//! refused whole with [`OrderStatus::Margin`].

pub mod commission;
pub mod filler;
pub mod matching;
pub mod order;
pub mod position;
pub mod slippage;
pub mod trade;

pub use commission::CommissionInfo;
pub use filler::{AllInFiller, BarVolumePercFiller, Filler, FixedSizeFiller};
pub use matching::{match_order, FillPoint, MatchOutcome};
pub use order::{
    ExecType, ExecutionBit, OcoId, Order, OrderExecuted, OrderId, OrderSide, OrderStatus,
};
pub use position::Position;
pub use slippage::SlippagePolicy;
pub use trade::{Trade, TradeEvent, TradeStatus};

use crate::feed::{Bar, FeedId};
use chrono::NaiveDateTime;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, VecDeque};

/// Everything the broker needs to know before the first bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrokerConfig {
    pub cash: f64,
    pub slippage: SlippagePolicy,
    /// Let market orders created during a bar fill at that bar's close.
    pub cheat_on_close: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            cash: 10_000.0,
            slippage: SlippagePolicy::default(),
            cheat_on_close: false,
        }
    }
}

/// Submission parameters for one order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderSpec {
    pub feed: FeedId,
    pub side: OrderSide,
    pub size: f64,
    pub exectype: ExecType,
    pub valid_until: Option<NaiveDateTime>,
    /// Join the one-cancels-other group of an existing order.
    pub oco: Option<OrderId>,
}

impl OrderSpec {
    pub fn new(feed: FeedId, side: OrderSide, size: f64, exectype: ExecType) -> Self {
        Self {
            feed,
            side,
            size,
            exectype,
            valid_until: None,
            oco: None,
        }
    }

    pub fn market(feed: FeedId, side: OrderSide, size: f64) -> Self {
        Self::new(feed, side, size, ExecType::Market)
    }

    pub fn limit(feed: FeedId, side: OrderSide, size: f64, price: f64) -> Self {
        Self::new(feed, side, size, ExecType::Limit { price })
    }

    pub fn stop(feed: FeedId, side: OrderSide, size: f64, price: f64) -> Self {
        Self::new(feed, side, size, ExecType::Stop { price })
    }

    pub fn stop_limit(feed: FeedId, side: OrderSide, size: f64, price: f64, limit: f64) -> Self {
        Self::new(feed, side, size, ExecType::StopLimit { price, limit })
    }

    pub fn at_close(feed: FeedId, side: OrderSide, size: f64) -> Self {
        Self::new(feed, side, size, ExecType::Close)
    }

    pub fn valid_until(mut self, datetime: NaiveDateTime) -> Self {
        self.valid_until = Some(datetime);
        self
    }

    pub fn oco_with(mut self, peer: OrderId) -> Self {
        self.oco = Some(peer);
        self
    }
}

/// Handles of a parent order and its two protective children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracketIds {
    pub parent: OrderId,
    pub stop: OrderId,
    pub take_profit: OrderId,
}

pub struct Broker {
    cash: f64,
    slippage: SlippagePolicy,
    cheat_on_close: bool,
    default_comminfo: CommissionInfo,
    comminfo: BTreeMap<FeedId, CommissionInfo>,
    filler: Box<dyn Filler>,
    /// Every order ever created; `OrderId` indexes into this.
    orders: Vec<Order>,
    /// Matchable orders in submission order.
    pending: Vec<OrderId>,
    /// Bracket children waiting for their parent to complete.
    dormant: BTreeMap<OrderId, Vec<OrderId>>,
    oco_groups: BTreeMap<OcoId, Vec<OrderId>>,
    positions: BTreeMap<FeedId, Position>,
    /// Last settled price per feed: valuation mark for stocks, settlement
    /// basis for futures.
    marks: BTreeMap<FeedId, f64>,
    open_trades: BTreeMap<FeedId, Trade>,
    closed_trades: Vec<Trade>,
    order_notices: VecDeque<Order>,
    trade_notices: VecDeque<Trade>,
    next_oco: u64,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            cash: config.cash,
            slippage: config.slippage,
            cheat_on_close: config.cheat_on_close,
            default_comminfo: CommissionInfo::default(),
            comminfo: BTreeMap::new(),
            filler: Box::new(AllInFiller),
            orders: Vec::new(),
            pending: Vec::new(),
            dormant: BTreeMap::new(),
            oco_groups: BTreeMap::new(),
            positions: BTreeMap::new(),
            marks: BTreeMap::new(),
            open_trades: BTreeMap::new(),
            closed_trades: Vec::new(),
            order_notices: VecDeque::new(),
            trade_notices: VecDeque::new(),
            next_oco: 0,
        }
    }

    pub fn with_cash(cash: f64) -> Self {
        Self::new(BrokerConfig {
            cash,
            ..BrokerConfig::default()
        })
    }

    // ── configuration ────────────────────────────────────────────────

    pub fn set_cash(&mut self, cash: f64) {
        self.cash = cash;
    }

    /// Default commission scheme for feeds without their own.
    pub fn set_commission(&mut self, info: CommissionInfo) {
        self.default_comminfo = info;
    }

    pub fn set_commission_for(&mut self, feed: FeedId, info: CommissionInfo) {
        self.comminfo.insert(feed, info);
    }

    pub fn set_slippage(&mut self, policy: SlippagePolicy) {
        self.slippage = policy;
    }

    pub fn set_filler(&mut self, filler: Box<dyn Filler>) {
        self.filler = filler;
    }

    pub fn cheats_on_close(&self) -> bool {
        self.cheat_on_close
    }

    // ── account state ────────────────────────────────────────────────

    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Cash plus every open position valued at its feed's mark.
    pub fn value(&self) -> f64 {
        let mut total = self.cash;
        for (feed, pos) in &self.positions {
            if pos.size != 0.0 {
                let mark = self.marks.get(feed).copied().unwrap_or(pos.price);
                total += self.comminfo_for(*feed).position_value(pos.size, mark);
            }
        }
        total
    }

    pub fn position(&self, feed: FeedId) -> Position {
        self.positions.get(&feed).copied().unwrap_or_default()
    }

    pub fn order(&self, id: OrderId) -> &Order {
        &self.orders[id.0 as usize]
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn closed_trades(&self) -> &[Trade] {
        &self.closed_trades
    }

    pub fn drain_order_notices(&mut self) -> Vec<Order> {
        self.order_notices.drain(..).collect()
    }

    pub fn drain_trade_notices(&mut self) -> Vec<Trade> {
        self.trade_notices.drain(..).collect()
    }

    // ── order entry ──────────────────────────────────────────────────

    /// Submit an order. Infallible by contract: a hopeless order comes back
    /// through notifications as `Rejected` rather than as an error.
    pub fn submit(&mut self, spec: OrderSpec, datetime: NaiveDateTime, tick: usize) -> OrderId {
        let id = self.create_order(&spec, datetime, tick, None);
        self.route(id, tick);
        id
    }

    /// Submit a parent plus a protective stop and take-profit on the other
    /// side, sized like the parent and grouped one-cancels-other. The
    /// children stay dormant until the parent completes.
    pub fn submit_bracket(
        &mut self,
        spec: OrderSpec,
        stop_price: f64,
        limit_price: f64,
        datetime: NaiveDateTime,
        tick: usize,
    ) -> BracketIds {
        let parent = self.create_order(&spec, datetime, tick, None);
        self.route(parent, tick);

        let child_side = spec.side.opposite();
        let stop_spec = OrderSpec::stop(spec.feed, child_side, spec.size, stop_price);
        let stop = self.create_order(&stop_spec, datetime, tick, Some(parent));
        let tp_spec =
            OrderSpec::limit(spec.feed, child_side, spec.size, limit_price).oco_with(stop);
        let take_profit = self.create_order(&tp_spec, datetime, tick, Some(parent));

        if self.orders[parent.0 as usize].status.is_terminal() {
            self.transition(stop, OrderStatus::Canceled);
            self.transition(take_profit, OrderStatus::Canceled);
        } else {
            self.transition(stop, OrderStatus::Submitted);
            self.transition(take_profit, OrderStatus::Submitted);
            self.dormant.insert(parent, vec![stop, take_profit]);
        }
        BracketIds {
            parent,
            stop,
            take_profit,
        }
    }

    /// Withdraw a working order. Idempotent: false when there was nothing
    /// left to cancel.
    pub fn cancel(&mut self, id: OrderId, tick: usize) -> bool {
        if id.0 as usize >= self.orders.len() || !self.orders[id.0 as usize].is_alive() {
            return false;
        }
        self.transition(id, OrderStatus::Canceled);
        self.on_terminal(id, tick);
        self.pending
            .retain(|p| self.orders[p.0 as usize].is_alive());
        true
    }

    fn create_order(
        &mut self,
        spec: &OrderSpec,
        datetime: NaiveDateTime,
        tick: usize,
        parent: Option<OrderId>,
    ) -> OrderId {
        let id = OrderId(self.orders.len() as u64);
        let size = spec.size.abs();
        self.orders.push(Order {
            id,
            feed: spec.feed,
            side: spec.side,
            size,
            exectype: spec.exectype,
            status: OrderStatus::Created,
            created: datetime,
            created_bar: tick,
            valid_until: spec.valid_until,
            parent,
            oco: None,
            triggered: false,
            activated_bar: tick,
            executed: OrderExecuted::new(size),
        });
        if let Some(peer) = spec.oco {
            self.join_oco(id, peer);
        }
        id
    }

    fn join_oco(&mut self, id: OrderId, peer: OrderId) {
        let gid = match self.orders[peer.0 as usize].oco {
            Some(gid) => gid,
            None => {
                let gid = OcoId(self.next_oco);
                self.next_oco += 1;
                self.orders[peer.0 as usize].oco = Some(gid);
                self.oco_groups.entry(gid).or_default().push(peer);
                gid
            }
        };
        self.orders[id.0 as usize].oco = Some(gid);
        self.oco_groups.entry(gid).or_default().push(id);
    }

    fn route(&mut self, id: OrderId, tick: usize) {
        self.transition(id, OrderStatus::Submitted);
        if self.orders[id.0 as usize].size <= 0.0 || !self.submission_plausible(id) {
            self.transition(id, OrderStatus::Rejected);
            self.on_terminal(id, tick);
            return;
        }
        self.transition(id, OrderStatus::Accepted);
        self.pending.push(id);
    }

    /// Coarse cash check at submission against the best price guess the
    /// order carries. Market orders without a mark yet pass and get the
    /// real check at fill time.
    fn submission_plausible(&self, id: OrderId) -> bool {
        let order = &self.orders[id.0 as usize];
        let price = match order.exectype {
            ExecType::Limit { price } | ExecType::Stop { price } => price,
            ExecType::StopLimit { limit, .. } => limit,
            ExecType::Market | ExecType::Close => match self.marks.get(&order.feed) {
                Some(&mark) => mark,
                None => return true,
            },
        };
        let info = self.comminfo_for(order.feed);
        let mut pos = self.position(order.feed);
        let (opened, _closed) = pos.update(order.side.sign() * order.size, price);
        info.operation_cost(opened, price) + info.commission(order.size, price) <= self.cash
    }

    fn transition(&mut self, id: OrderId, status: OrderStatus) {
        let order = &mut self.orders[id.0 as usize];
        order.status = status;
        self.order_notices.push_back(order.clone());
    }

    /// Cascades of a terminal transition: the one-cancels-other group goes
    /// down with its first terminal member, and bracket children either wake
    /// up (parent completed) or die with the parent.
    fn on_terminal(&mut self, id: OrderId, tick: usize) {
        if let Some(gid) = self.orders[id.0 as usize].oco {
            let members = self.oco_groups.get(&gid).cloned().unwrap_or_default();
            for member in members {
                if member != id && self.orders[member.0 as usize].is_alive() {
                    self.transition(member, OrderStatus::Canceled);
                    self.cancel_children(member);
                }
            }
        }
        if self.orders[id.0 as usize].status == OrderStatus::Completed {
            self.activate_children(id, tick);
        } else {
            self.cancel_children(id);
        }
    }

    fn cancel_children(&mut self, parent: OrderId) {
        if let Some(children) = self.dormant.remove(&parent) {
            for child in children {
                if self.orders[child.0 as usize].is_alive() {
                    self.transition(child, OrderStatus::Canceled);
                }
            }
        }
    }

    fn activate_children(&mut self, parent: OrderId, tick: usize) {
        if let Some(children) = self.dormant.remove(&parent) {
            for child in children {
                if self.orders[child.0 as usize].status == OrderStatus::Submitted {
                    // Eligible from the bar after the parent's fill.
                    self.orders[child.0 as usize].activated_bar = tick + 1;
                    self.transition(child, OrderStatus::Accepted);
                    self.pending.push(child);
                }
            }
        }
    }

    // ── per-bar processing ───────────────────────────────────────────

    /// Match the pending queue against one delivered bar of `feed`.
    ///
    /// `prev_close` and `new_period` feed the close-order rule; both refer
    /// to the feed's own stream. `tick` is the engine clock that gates
    /// activation and expiry; `feed_bar` is this bar's index in the feed's
    /// own stream and is what trades record, so a trade's bar span counts
    /// bars its feed actually delivered.
    pub fn process_bar(
        &mut self,
        feed: FeedId,
        bar: &Bar,
        prev_close: Option<f64>,
        new_period: bool,
        tick: usize,
        feed_bar: usize,
    ) {
        let queue = self.pending.clone();
        for id in queue {
            let idx = id.0 as usize;
            if !self.orders[idx].is_alive()
                || self.orders[idx].feed != feed
                || tick < self.orders[idx].activated_bar
            {
                continue;
            }
            if let Some(valid) = self.orders[idx].valid_until {
                if bar.datetime > valid {
                    self.transition(id, OrderStatus::Expired);
                    self.on_terminal(id, tick);
                    continue;
                }
            }
            match match_order(&self.orders[idx], bar, prev_close, new_period) {
                MatchOutcome::NoFill => {}
                MatchOutcome::Armed => {
                    self.orders[idx].triggered = true;
                }
                MatchOutcome::Fill {
                    price,
                    point,
                    limit_cap,
                } => {
                    self.orders[idx].triggered = true;
                    let doslip = match point {
                        FillPoint::Open => self.slippage.slip_open,
                        FillPoint::IntrabarTrigger => true,
                        FillPoint::IntrabarLimit | FillPoint::PrevClose => false,
                    };
                    let lim = limit_cap.is_some();
                    let slipped = match self.orders[idx].side {
                        OrderSide::Buy => {
                            let cap = limit_cap.map_or(bar.high, |l| bar.high.min(l));
                            self.slippage.buy(price, cap, lim, doslip)
                        }
                        OrderSide::Sell => {
                            let floor = limit_cap.map_or(bar.low, |l| bar.low.max(l));
                            self.slippage.sell(price, floor, lim, doslip)
                        }
                    };
                    let Some(price) = slipped else {
                        continue;
                    };
                    let remaining = self.orders[idx].remaining();
                    let qty = self
                        .filler
                        .fill_size(&self.orders[idx], bar, remaining)
                        .min(remaining);
                    if qty <= 0.0 {
                        continue;
                    }
                    let signed = self.orders[idx].side.sign() * qty;
                    self.execute_fill(id, bar.datetime, signed, price, tick, feed_bar);
                }
            }
        }
        self.pending
            .retain(|id| self.orders[id.0 as usize].is_alive());
    }

    /// Fill market orders created during this very tick at the bar's close.
    /// Runs after the strategy callback, only when configured.
    pub fn process_cheat_on_close(
        &mut self,
        feed: FeedId,
        bar: &Bar,
        tick: usize,
        feed_bar: usize,
    ) {
        if !self.cheat_on_close {
            return;
        }
        let queue = self.pending.clone();
        for id in queue {
            let idx = id.0 as usize;
            if !self.orders[idx].is_alive()
                || self.orders[idx].feed != feed
                || self.orders[idx].created_bar != tick
                || self.orders[idx].exectype != ExecType::Market
            {
                continue;
            }
            let remaining = self.orders[idx].remaining();
            let qty = self
                .filler
                .fill_size(&self.orders[idx], bar, remaining)
                .min(remaining);
            if qty <= 0.0 {
                continue;
            }
            let signed = self.orders[idx].side.sign() * qty;
            self.execute_fill(id, bar.datetime, signed, bar.close, tick, feed_bar);
        }
        self.pending
            .retain(|id| self.orders[id.0 as usize].is_alive());
    }

    /// Advance the feed's mark to the bar close: settles futures profit
    /// into cash, refreshes the valuation price for stocks.
    pub fn mark_to_market(&mut self, feed: FeedId, close: f64) {
        let pos = self.position(feed);
        if pos.size != 0.0 {
            if let Some(&mark) = self.marks.get(&feed) {
                self.cash += self.comminfo_for(feed).cash_adjust(pos.size, mark, close);
            }
        }
        self.marks.insert(feed, close);
    }

    /// Apply one fill: cash, position, trades, execution record, status.
    /// Refused whole when it would leave cash negative.
    fn execute_fill(
        &mut self,
        id: OrderId,
        datetime: NaiveDateTime,
        size: f64,
        price: f64,
        tick: usize,
        feed_bar: usize,
    ) {
        let feed = self.orders[id.0 as usize].feed;
        let info = self.comminfo_for(feed);
        let commission = info.commission(size, price);

        let old_pos = self.position(feed);
        let mut new_pos = old_pos;
        let (opened, closed) = new_pos.update(size, price);
        let mark = self.marks.get(&feed).copied().unwrap_or(price);
        let pnl = info.pnl(-closed, old_pos.price, price);

        let cash_after = self.cash + info.fill_cash_flow(opened, closed, price, mark) - commission;
        if cash_after < 0.0 {
            self.transition(id, OrderStatus::Margin);
            self.on_terminal(id, tick);
            return;
        }
        self.cash = cash_after;
        self.positions.insert(feed, new_pos);
        self.marks.insert(
            feed,
            info.settled_mark(old_pos.size + closed, mark, opened, price),
        );

        // Commission splits across the trade it closes and the one it opens.
        let close_comm = commission * (closed.abs() / size.abs());
        let open_comm = commission - close_comm;
        if closed != 0.0 {
            if let Some(trade) = self.open_trades.get_mut(&feed) {
                trade.update(datetime, feed_bar, closed, price, close_comm, pnl);
                if !trade.is_open() {
                    if let Some(done) = self.open_trades.remove(&feed) {
                        self.trade_notices.push_back(done.clone());
                        self.closed_trades.push(done);
                    }
                }
            }
        }
        if opened != 0.0 {
            match self.open_trades.entry(feed) {
                Entry::Occupied(mut entry) => {
                    entry
                        .get_mut()
                        .update(datetime, feed_bar, opened, price, open_comm, 0.0);
                }
                Entry::Vacant(entry) => {
                    let trade = Trade::open(feed, datetime, feed_bar, opened, price, open_comm);
                    self.trade_notices.push_back(trade.clone());
                    entry.insert(trade);
                }
            }
        }

        let bit = ExecutionBit {
            datetime,
            size,
            price,
            value: info.operation_cost(size, price),
            commission,
            opened,
            closed,
            pnl,
        };
        self.orders[id.0 as usize].executed.record(bit);
        if self.orders[id.0 as usize].remaining() <= 0.0 {
            self.transition(id, OrderStatus::Completed);
            self.on_terminal(id, tick);
        } else {
            self.transition(id, OrderStatus::Partial);
        }
    }

    fn comminfo_for(&self, feed: FeedId) -> CommissionInfo {
        self.comminfo.get(&feed).copied().unwrap_or(self.default_comminfo)
    }
}
