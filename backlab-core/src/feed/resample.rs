//! Timeframe conversion: resampling (finalized bars) and replaying
//! (progressive bars).
//!
//! Both wrap a finer source and group its bars by
//! [`TimeFrame::period_index`]. Aggregation is the usual one: first open,
//! running high/low, last close, summed volume, last open interest, and the
//! aggregate carries the datetime of the last sub-bar absorbed so far. Gaps
//! in the underlying stream simply close the pending aggregate as-is; no
//! bars are fabricated for empty periods.
//!
//! The difference is delivery. A [`Resampler`] stays silent until a period
//! boundary and then appends the finished bar, so downstream code only ever
//! sees final values. A [`Replayer`] forwards every sub-bar as a progressive
//! snapshot of the current period: the first sub-bar of a period appends,
//! the rest amend in place.

use super::bar::{Bar, BarAction};
use super::timeframe::TimeFrame;
use super::{BarSource, FeedError};

struct Bucket {
    period: i64,
    bar: Bar,
}

impl Bucket {
    fn open(period: i64, sub: Bar) -> Self {
        Self { period, bar: sub }
    }

    fn absorb(&mut self, sub: &Bar) {
        self.bar.high = self.bar.high.max(sub.high);
        self.bar.low = self.bar.low.min(sub.low);
        self.bar.close = sub.close;
        self.bar.volume += sub.volume;
        self.bar.openinterest = sub.openinterest;
        self.bar.datetime = sub.datetime;
    }
}

fn check_coarser<S: BarSource>(
    source: &S,
    timeframe: TimeFrame,
    compression: u32,
) -> Result<(), FeedError> {
    if source.replays() {
        return Err(FeedError::ReplayingSource);
    }
    let coarser = timeframe > source.timeframe()
        || (timeframe == source.timeframe() && compression > source.compression());
    if !coarser {
        return Err(FeedError::NotCoarser {
            from: source.timeframe(),
            from_comp: source.compression(),
            to: timeframe,
            to_comp: compression,
        });
    }
    Ok(())
}

/// Groups a finer stream into finalized coarser bars.
pub struct Resampler<S> {
    source: S,
    timeframe: TimeFrame,
    compression: u32,
    pending: Option<Bucket>,
}

impl<S: BarSource> Resampler<S> {
    pub fn new(source: S, timeframe: TimeFrame, compression: u32) -> Result<Self, FeedError> {
        check_coarser(&source, timeframe, compression)?;
        Ok(Self {
            source,
            timeframe,
            compression,
            pending: None,
        })
    }
}

impl<S: BarSource> BarSource for Resampler<S> {
    fn start(&mut self) {
        self.source.start();
    }

    fn load_next(&mut self) -> Option<BarAction> {
        loop {
            let Some(action) = self.source.load_next() else {
                // End of input finalizes whatever is pending.
                return self.pending.take().map(|b| BarAction::Append(b.bar));
            };
            debug_assert!(
                matches!(action, BarAction::Append(_)),
                "resampler input must deliver finalized bars"
            );
            let sub = *action.bar();
            let period = self.timeframe.period_index(sub.datetime, self.compression);
            match &mut self.pending {
                None => self.pending = Some(Bucket::open(period, sub)),
                Some(bucket) if bucket.period == period => bucket.absorb(&sub),
                Some(bucket) => {
                    let done = bucket.bar;
                    *bucket = Bucket::open(period, sub);
                    return Some(BarAction::Append(done));
                }
            }
        }
    }

    fn timeframe(&self) -> TimeFrame {
        self.timeframe
    }

    fn compression(&self) -> u32 {
        self.compression
    }
}

/// Forwards every sub-bar as a progressive snapshot of the coarser bar.
pub struct Replayer<S> {
    source: S,
    timeframe: TimeFrame,
    compression: u32,
    current: Option<Bucket>,
}

impl<S: BarSource> Replayer<S> {
    pub fn new(source: S, timeframe: TimeFrame, compression: u32) -> Result<Self, FeedError> {
        check_coarser(&source, timeframe, compression)?;
        Ok(Self {
            source,
            timeframe,
            compression,
            current: None,
        })
    }
}

impl<S: BarSource> BarSource for Replayer<S> {
    fn start(&mut self) {
        self.source.start();
    }

    fn load_next(&mut self) -> Option<BarAction> {
        let action = self.source.load_next()?;
        debug_assert!(
            matches!(action, BarAction::Append(_)),
            "replayer input must deliver finalized bars"
        );
        let sub = *action.bar();
        let period = self.timeframe.period_index(sub.datetime, self.compression);
        match &mut self.current {
            Some(bucket) if bucket.period == period => {
                bucket.absorb(&sub);
                Some(BarAction::Amend(bucket.bar))
            }
            current => {
                *current = Some(Bucket::open(period, sub));
                Some(BarAction::Append(sub))
            }
        }
    }

    fn timeframe(&self) -> TimeFrame {
        self.timeframe
    }

    fn compression(&self) -> u32 {
        self.compression
    }

    fn replays(&self) -> bool {
        true
    }
}
