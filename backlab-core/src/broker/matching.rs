//! Per-bar order matching rules.
//!
//! Pure functions from an order and one bar to a match outcome. Matching is
//! based on price penetration only; quantity, slippage and cash are layered
//! on by the broker. The rules assume the bar's open is its first trade and
//! make the conservative intrabar assumption everywhere else: an order fills
//! at its own price, never at a better one the bar might have touched later.
//!
//! A stop-limit arms the bar its stop level trades and may fill on the same
//! bar only along price paths a single OHLC bar can prove: a gap over the
//! stop rests the limit from the open; an intrabar trigger fills at the stop
//! when the limit stands at or beyond it, or at the limit when the bar
//! demonstrably traded back through it (a buy arms on the way up, so the
//! path back down to the limit is only certain when the bar closes below
//! its open and at or below the limit).

use super::order::{ExecType, Order, OrderSide};
use crate::feed::Bar;

/// Where in the bar a fill price comes from. Decides slippage treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPoint {
    /// At the bar's open, the only point where open-slippage applies.
    Open,
    /// At a stop's trigger price while the bar trades through it.
    IntrabarTrigger,
    /// Exactly at a resting limit price; never slipped.
    IntrabarLimit,
    /// At the previous bar's close; never slipped.
    PrevClose,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchOutcome {
    NoFill,
    /// Stop leg traded; the order rests as a limit from the next bar on.
    Armed,
    Fill {
        price: f64,
        point: FillPoint,
        /// Resting limit the slipped price must respect, when there is one.
        limit_cap: Option<f64>,
    },
}

/// Match one order against one bar.
///
/// `prev_close` is the close of the feed's previous bar and `new_period`
/// whether this bar opened a new session, both needed only by close orders.
pub fn match_order(
    order: &Order,
    bar: &Bar,
    prev_close: Option<f64>,
    new_period: bool,
) -> MatchOutcome {
    match order.exectype {
        ExecType::Market => MatchOutcome::Fill {
            price: bar.open,
            point: FillPoint::Open,
            limit_cap: None,
        },
        ExecType::Close => match prev_close {
            Some(price) if new_period => MatchOutcome::Fill {
                price,
                point: FillPoint::PrevClose,
                limit_cap: None,
            },
            _ => MatchOutcome::NoFill,
        },
        ExecType::Limit { price } => match_limit(order.side, price, bar),
        ExecType::Stop { price } => match_stop(order.side, price, bar),
        ExecType::StopLimit { price, limit } => {
            if order.triggered {
                match_limit(order.side, limit, bar)
            } else {
                match_stop_limit(order.side, price, limit, bar)
            }
        }
    }
}

fn match_limit(side: OrderSide, limit: f64, bar: &Bar) -> MatchOutcome {
    let (gap, touched) = match side {
        OrderSide::Buy => (bar.open <= limit, bar.low <= limit),
        OrderSide::Sell => (bar.open >= limit, bar.high >= limit),
    };
    if gap {
        MatchOutcome::Fill {
            price: bar.open,
            point: FillPoint::Open,
            limit_cap: Some(limit),
        }
    } else if touched {
        MatchOutcome::Fill {
            price: limit,
            point: FillPoint::IntrabarLimit,
            limit_cap: Some(limit),
        }
    } else {
        MatchOutcome::NoFill
    }
}

fn match_stop(side: OrderSide, trigger: f64, bar: &Bar) -> MatchOutcome {
    let (gap, touched) = match side {
        OrderSide::Buy => (bar.open >= trigger, bar.high >= trigger),
        OrderSide::Sell => (bar.open <= trigger, bar.low <= trigger),
    };
    if gap {
        MatchOutcome::Fill {
            price: bar.open,
            point: FillPoint::Open,
            limit_cap: None,
        }
    } else if touched {
        MatchOutcome::Fill {
            price: trigger,
            point: FillPoint::IntrabarTrigger,
            limit_cap: None,
        }
    } else {
        MatchOutcome::NoFill
    }
}

fn match_stop_limit(side: OrderSide, trigger: f64, limit: f64, bar: &Bar) -> MatchOutcome {
    let (gap, touched) = match side {
        OrderSide::Buy => (bar.open >= trigger, bar.high >= trigger),
        OrderSide::Sell => (bar.open <= trigger, bar.low <= trigger),
    };
    if gap {
        // Armed at the open: the whole bar is available to the limit.
        match match_limit(side, limit, bar) {
            MatchOutcome::NoFill => MatchOutcome::Armed,
            fill => fill,
        }
    } else if touched {
        let marketable = match side {
            OrderSide::Buy => limit >= trigger,
            OrderSide::Sell => limit <= trigger,
        };
        if marketable {
            return MatchOutcome::Fill {
                price: trigger,
                point: FillPoint::IntrabarTrigger,
                limit_cap: Some(limit),
            };
        }
        let retraced = match side {
            OrderSide::Buy => bar.close < bar.open && bar.close <= limit,
            OrderSide::Sell => bar.close > bar.open && bar.close >= limit,
        };
        if retraced {
            MatchOutcome::Fill {
                price: limit,
                point: FillPoint::IntrabarLimit,
                limit_cap: Some(limit),
            }
        } else {
            MatchOutcome::Armed
        }
    } else {
        MatchOutcome::NoFill
    }
}
