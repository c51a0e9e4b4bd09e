//! Adverse price slippage on simulated fills.

use serde::{Deserialize, Serialize};

/// Slippage applied to matched prices, always against the order.
///
/// `perc` and `fixed` stack: the slip is `price * perc + fixed`. The flags
/// say when slippage applies and what happens when the slipped price leaves
/// the bar: `slip_match` settles at the best price still inside the bar
/// (the limit included, when `slip_limit` allows it) and `slip_out` lets
/// the fill escape the bar entirely. With neither, the fill is refused and
/// the order keeps working.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlippagePolicy {
    /// Proportional slip per unit of price.
    pub perc: f64,
    /// Absolute slip in price units.
    pub fixed: f64,
    /// Slip fills taken at the bar's open.
    pub slip_open: bool,
    /// Clamp to the bar boundary instead of refusing the fill.
    pub slip_match: bool,
    /// Allow slipped prices outside the bar's range.
    pub slip_out: bool,
    /// Allow clamping onto a resting limit price.
    pub slip_limit: bool,
}

impl Default for SlippagePolicy {
    fn default() -> Self {
        Self {
            perc: 0.0,
            fixed: 0.0,
            slip_open: false,
            slip_match: true,
            slip_out: false,
            slip_limit: true,
        }
    }
}

impl SlippagePolicy {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn percentage(perc: f64) -> Self {
        Self {
            perc,
            ..Self::default()
        }
    }

    pub fn fixed(fixed: f64) -> Self {
        Self {
            fixed,
            ..Self::default()
        }
    }

    /// Slip a buy upward, bounded by `cap` (bar high, possibly tightened to
    /// a limit). `lim` marks a cap that includes a limit price.
    pub fn buy(&self, raw: f64, cap: f64, lim: bool, doslip: bool) -> Option<f64> {
        if !doslip {
            return Some(raw);
        }
        let slip = raw * self.perc + self.fixed;
        if slip == 0.0 {
            return Some(raw);
        }
        let slipped = raw + slip;
        if slipped <= cap {
            return Some(slipped);
        }
        if self.slip_out {
            return Some(slipped);
        }
        if self.slip_match && (!lim || self.slip_limit) {
            return Some(cap);
        }
        None
    }

    /// Slip a sell downward, bounded by `floor` (bar low, possibly raised to
    /// a limit).
    pub fn sell(&self, raw: f64, floor: f64, lim: bool, doslip: bool) -> Option<f64> {
        if !doslip {
            return Some(raw);
        }
        let slip = raw * self.perc + self.fixed;
        if slip == 0.0 {
            return Some(raw);
        }
        let slipped = raw - slip;
        if slipped >= floor {
            return Some(slipped);
        }
        if self.slip_out {
            return Some(slipped);
        }
        if self.slip_match && (!lim || self.slip_limit) {
            return Some(floor);
        }
        None
    }
}
