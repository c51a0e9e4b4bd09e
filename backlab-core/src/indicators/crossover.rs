//! Crossing of two lines.
//!
//! Emits +1.0 on the bar where the first input rises through the second
//! (at or below on the previous bar, strictly above now), -1.0 on the
//! mirrored downward cross, and 0.0 everywhere else. A bar sitting exactly
//! on the other line signals on the following bar, in whichever direction
//! it leaves the tie.
//!
//! Takes two inputs, each wired with lookback 1.

use crate::graph::{Ctx, Node};

#[derive(Debug, Clone, Default)]
pub struct CrossOver;

impl CrossOver {
    pub fn new() -> Self {
        Self
    }
}

impl Node for CrossOver {
    fn name(&self) -> &str {
        "crossover"
    }

    fn next(&mut self, ctx: &mut Ctx<'_>) {
        let up = ctx.input(0, -1) <= ctx.input(1, -1) && ctx.input(0, 0) > ctx.input(1, 0);
        let down = ctx.input(0, -1) >= ctx.input(1, -1) && ctx.input(0, 0) < ctx.input(1, 0);
        let signal = if up {
            1.0
        } else if down {
            -1.0
        } else {
            0.0
        };
        ctx.set(0, signal);
    }
}
