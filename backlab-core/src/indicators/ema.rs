//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * input[t] + (1 - alpha) * EMA[t-1]
//! Seed: EMA[period-1] = SMA of first `period` input values.
//! Wire with lookback: period - 1.

use crate::graph::{Ctx, Node};

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    alpha: f64,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            name: format!("ema_{period}"),
        }
    }
}

impl Node for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn nextstart(&mut self, ctx: &mut Ctx<'_>) {
        let sum: f64 = ctx.input_window(0, self.period).iter().sum();
        ctx.set(0, sum / self.period as f64);
    }

    fn next(&mut self, ctx: &mut Ctx<'_>) {
        let prev = ctx.own(0, -1);
        ctx.set(0, self.alpha * ctx.input(0, 0) + (1.0 - self.alpha) * prev);
    }
}
