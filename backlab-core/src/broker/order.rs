//! Order types, lifecycle states and execution records.

use crate::feed::FeedId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Broker-assigned order handle, unique within a run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct OrderId(pub u64);

/// Handle of a one-cancels-other group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct OcoId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

/// Execution instruction. Prices ride along with the variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ExecType {
    /// Fill at the next bar's open.
    Market,
    /// Fill at the session close, detected one bar late.
    Close,
    /// Fill at `price` or better.
    Limit { price: f64 },
    /// Become a market order once `price` trades.
    Stop { price: f64 },
    /// Become a limit order at `limit` once `price` trades.
    StopLimit { price: f64, limit: f64 },
}

impl ExecType {
    /// The resting limit price, if this order has one.
    pub fn limit_price(&self) -> Option<f64> {
        match *self {
            ExecType::Limit { price } => Some(price),
            ExecType::StopLimit { limit, .. } => Some(limit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Built, not yet handed to the broker.
    Created,
    /// Handed to the broker, pre-acceptance.
    Submitted,
    /// In the pending queue, eligible for matching.
    Accepted,
    /// Some quantity filled, the rest still working.
    Partial,
    /// Fully filled.
    Completed,
    /// Withdrawn before completion.
    Canceled,
    /// Validity lapsed before completion.
    Expired,
    /// Rejected at fill time for insufficient cash.
    Margin,
    /// Rejected at submission.
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed
                | OrderStatus::Canceled
                | OrderStatus::Expired
                | OrderStatus::Margin
                | OrderStatus::Rejected
        )
    }

    /// Working at the broker: matchable or waiting to be.
    pub fn is_alive(self) -> bool {
        matches!(
            self,
            OrderStatus::Submitted | OrderStatus::Accepted | OrderStatus::Partial
        )
    }
}

/// One fill against one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionBit {
    pub datetime: NaiveDateTime,
    /// Signed quantity, positive for buys.
    pub size: f64,
    pub price: f64,
    /// Operation cost of this fill under the feed's commission scheme.
    pub value: f64,
    pub commission: f64,
    /// Signed portion that opened or extended the position.
    pub opened: f64,
    /// Signed portion that closed against the existing position.
    pub closed: f64,
    /// Profit realized by the closed portion.
    pub pnl: f64,
}

/// Running totals over an order's fills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderExecuted {
    /// Signed cumulative filled quantity.
    pub size: f64,
    /// Unfilled quantity, always nonnegative.
    pub remaining: f64,
    /// Volume-weighted average fill price.
    pub price: f64,
    pub value: f64,
    pub commission: f64,
    pub pnl: f64,
    pub bits: Vec<ExecutionBit>,
}

impl OrderExecuted {
    pub fn new(requested: f64) -> Self {
        Self {
            size: 0.0,
            remaining: requested,
            price: 0.0,
            value: 0.0,
            commission: 0.0,
            pnl: 0.0,
            bits: Vec::new(),
        }
    }

    pub fn record(&mut self, bit: ExecutionBit) {
        let filled = self.size.abs();
        let incoming = bit.size.abs();
        if filled + incoming > 0.0 {
            self.price = (self.price * filled + bit.price * incoming) / (filled + incoming);
        }
        self.size += bit.size;
        self.remaining = (self.remaining - incoming).max(0.0);
        self.value += bit.value;
        self.commission += bit.commission;
        self.pnl += bit.pnl;
        self.bits.push(bit);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub feed: FeedId,
    pub side: OrderSide,
    /// Requested quantity, always positive.
    pub size: f64,
    pub exectype: ExecType,
    pub status: OrderStatus,
    pub created: NaiveDateTime,
    /// Engine tick at submission.
    pub created_bar: usize,
    /// Good-til-date; `None` is good-til-canceled.
    pub valid_until: Option<NaiveDateTime>,
    /// Bracket parent, when this order is a protective child.
    pub parent: Option<OrderId>,
    /// One-cancels-other group membership.
    pub oco: Option<OcoId>,
    /// Stop leg of a stop-limit has traded; the order now rests as a limit.
    pub triggered: bool,
    /// First tick this order may match. Bracket children get the tick after
    /// their parent completes.
    pub activated_bar: usize,
    pub executed: OrderExecuted,
}

impl Order {
    pub fn is_buy(&self) -> bool {
        self.side == OrderSide::Buy
    }

    pub fn remaining(&self) -> f64 {
        self.executed.remaining
    }

    pub fn is_alive(&self) -> bool {
        self.status.is_alive()
    }
}
