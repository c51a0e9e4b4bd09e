//! Data feeds: bar sources, granularity, resampling and replaying.

pub mod bar;
pub mod resample;
pub mod timeframe;

pub use bar::{line, Bar, BarAction};
pub use resample::{Replayer, Resampler};
pub use timeframe::TimeFrame;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position of a feed in the engine, in registration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct FeedId(pub usize);

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("resample target {to:?}x{to_comp} must be coarser than source {from:?}x{from_comp}")]
    NotCoarser {
        from: TimeFrame,
        from_comp: u32,
        to: TimeFrame,
        to_comp: u32,
    },
    #[error("cannot resample a replaying source")]
    ReplayingSource,
}

/// A pull-based stream of bar actions in nondecreasing datetime order.
pub trait BarSource: Send {
    /// Called once before the first `load_next`.
    fn start(&mut self) {}

    /// Next action, or `None` when the stream is exhausted.
    fn load_next(&mut self) -> Option<BarAction>;

    fn timeframe(&self) -> TimeFrame;

    fn compression(&self) -> u32;

    /// Whether this source amends delivered bars in place.
    fn replays(&self) -> bool {
        false
    }
}

/// In-memory source over a prepared bar vector.
pub struct VecFeed {
    bars: Vec<Bar>,
    cursor: usize,
    timeframe: TimeFrame,
    compression: u32,
}

impl VecFeed {
    pub fn new(bars: Vec<Bar>, timeframe: TimeFrame, compression: u32) -> Self {
        debug_assert!(
            bars.windows(2).all(|w| w[0].datetime <= w[1].datetime),
            "bars must be in nondecreasing datetime order"
        );
        Self {
            bars,
            cursor: 0,
            timeframe,
            compression,
        }
    }

    pub fn daily(bars: Vec<Bar>) -> Self {
        Self::new(bars, TimeFrame::Days, 1)
    }
}

impl BarSource for VecFeed {
    fn load_next(&mut self) -> Option<BarAction> {
        let bar = *self.bars.get(self.cursor)?;
        self.cursor += 1;
        Some(BarAction::Append(bar))
    }

    fn timeframe(&self) -> TimeFrame {
        self.timeframe
    }

    fn compression(&self) -> u32 {
        self.compression
    }
}
