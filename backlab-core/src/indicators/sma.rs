//! Simple Moving Average (SMA).
//!
//! Rolling mean of the input line over a lookback window.
//! Wire with lookback: period - 1 (first valid value at index period-1).

use crate::graph::{Ctx, Node};

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }

    // Resummed per call rather than kept as a running total, so the batch
    // pass stays bit-identical to the incremental one.
    fn compute(&self, ctx: &mut Ctx<'_>) {
        let sum: f64 = ctx.input_window(0, self.period).iter().sum();
        ctx.set(0, sum / self.period as f64);
    }
}

impl Node for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn next(&mut self, ctx: &mut Ctx<'_>) {
        self.compute(ctx);
    }
}
