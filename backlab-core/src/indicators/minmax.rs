//! Rolling extremes over a lookback window.
//!
//! `Highest` and `Lowest` track the maximum and minimum of the input line
//! over the last `period` values. Wire with lookback: period - 1.

use crate::graph::{Ctx, Node};

#[derive(Debug, Clone)]
pub struct Highest {
    period: usize,
    name: String,
}

impl Highest {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "Highest period must be >= 1");
        Self {
            period,
            name: format!("highest_{period}"),
        }
    }
}

impl Node for Highest {
    fn name(&self) -> &str {
        &self.name
    }

    fn next(&mut self, ctx: &mut Ctx<'_>) {
        let top = ctx
            .input_window(0, self.period)
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        ctx.set(0, top);
    }
}

#[derive(Debug, Clone)]
pub struct Lowest {
    period: usize,
    name: String,
}

impl Lowest {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "Lowest period must be >= 1");
        Self {
            period,
            name: format!("lowest_{period}"),
        }
    }
}

impl Node for Lowest {
    fn name(&self) -> &str {
        &self.name
    }

    fn next(&mut self, ctx: &mut Ctx<'_>) {
        let bottom = ctx
            .input_window(0, self.period)
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        ctx.set(0, bottom);
    }
}
