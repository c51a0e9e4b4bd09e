//! Fill-size policies: how much of an order one bar can absorb.

use super::order::Order;
use crate::feed::Bar;

/// Decides the quantity filled when an order matches a bar. Returns are
/// capped by the broker at the order's remaining size; returning zero
/// leaves the order working.
pub trait Filler: Send {
    fn fill_size(&self, order: &Order, bar: &Bar, remaining: f64) -> f64;
}

/// Everything at once, volume ignored. The default.
pub struct AllInFiller;

impl Filler for AllInFiller {
    fn fill_size(&self, _order: &Order, _bar: &Bar, remaining: f64) -> f64 {
        remaining
    }
}

/// At most `size` per bar, never more than the bar's volume.
pub struct FixedSizeFiller {
    pub size: f64,
}

impl Filler for FixedSizeFiller {
    fn fill_size(&self, _order: &Order, bar: &Bar, remaining: f64) -> f64 {
        remaining.min(self.size).min(bar.volume)
    }
}

/// A fraction of the bar's volume, `perc` in `0.0..=1.0`.
pub struct BarVolumePercFiller {
    pub perc: f64,
}

impl Filler for BarVolumePercFiller {
    fn fill_size(&self, _order: &Order, bar: &Bar, remaining: f64) -> f64 {
        remaining.min(bar.volume * self.perc)
    }
}
