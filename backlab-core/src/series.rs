//! Line buffers — append-only value storage with a movable cursor.
//!
//! Every feed column and every indicator output is a [`LineBuffer`]: a growing
//! `f64` sequence indexed relative to a cursor. Offset `0` is the current bar,
//! negative offsets walk back into history, and positive offsets are only
//! valid over storage that a batch pass has already produced ahead of the
//! cursor. Reading past either end is a programming error and panics; the
//! graph's minimum-period bookkeeping exists to make that unreachable.
//!
//! [`StampBuffer`] is the datetime twin used by feeds, with the same cursor
//! discipline.

use chrono::NaiveDateTime;

/// Append-only `f64` line with relative (ago) indexing.
///
/// Two ways of growing:
/// - `push`/`forward` extend storage and move the cursor together (stepwise
///   runs),
/// - `stage` extends storage while the cursor stays put, and `advance` later
///   walks the cursor over the staged values (batch runs).
#[derive(Debug, Clone, Default)]
pub struct LineBuffer {
    values: Vec<f64>,
    exposed: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            values: Vec::with_capacity(n),
            exposed: 0,
        }
    }

    /// Number of values at or behind the cursor (the visible history).
    pub fn len(&self) -> usize {
        self.exposed
    }

    pub fn is_empty(&self) -> bool {
        self.exposed == 0
    }

    /// Total storage length, including values staged ahead of the cursor.
    pub fn produced(&self) -> usize {
        self.values.len()
    }

    /// Extend by one NaN slot and move the cursor onto it.
    pub fn forward(&mut self) {
        debug_assert_eq!(
            self.exposed,
            self.values.len(),
            "forward on a buffer with staged data"
        );
        self.values.push(f64::NAN);
        self.exposed = self.values.len();
    }

    /// Extend by one slot holding `value` and move the cursor onto it.
    pub fn push(&mut self, value: f64) {
        self.forward();
        let last = self.values.len() - 1;
        self.values[last] = value;
    }

    /// Extend storage by one slot holding `value` without moving the cursor.
    pub fn stage(&mut self, value: f64) {
        self.values.push(value);
    }

    /// Grow storage to `n` NaN-filled slots without moving the cursor.
    pub fn grow_to(&mut self, n: usize) {
        if self.values.len() < n {
            self.values.resize(n, f64::NAN);
        }
    }

    /// Move the cursor one slot forward over already-produced storage.
    pub fn advance(&mut self) {
        assert!(
            self.exposed < self.values.len(),
            "advance past produced data (exposed {}, produced {})",
            self.exposed,
            self.values.len()
        );
        self.exposed += 1;
    }

    /// Value at relative offset `ago` (0 = current, negative = history).
    pub fn get(&self, ago: i32) -> f64 {
        self.values[self.index_of(ago)]
    }

    /// Write the value at relative offset `ago`.
    pub fn set(&mut self, ago: i32, value: f64) {
        let idx = self.index_of(ago);
        self.values[idx] = value;
    }

    /// Value at offset `ago` relative to absolute position `pos` instead of
    /// the cursor. Used by batch passes.
    pub fn at_offset(&self, pos: usize, ago: i32) -> f64 {
        let idx = pos as i64 + ago as i64;
        assert!(
            idx >= 0 && (idx as usize) < self.values.len(),
            "offset {ago} at position {pos} outside produced range {}",
            self.values.len()
        );
        self.values[idx as usize]
    }

    /// Write the slot at absolute position `pos`. The slot must exist.
    pub fn set_at(&mut self, pos: usize, value: f64) {
        assert!(
            pos < self.values.len(),
            "write at {pos} outside produced range {}",
            self.values.len()
        );
        self.values[pos] = value;
    }

    /// The last `size` values ending at the cursor, oldest first.
    pub fn window(&self, size: usize) -> &[f64] {
        assert!(
            size <= self.exposed,
            "window of {size} on a line of length {}",
            self.exposed
        );
        &self.values[self.exposed - size..self.exposed]
    }

    /// The `size` values ending at absolute position `pos`, oldest first.
    pub fn window_at(&self, pos: usize, size: usize) -> &[f64] {
        assert!(
            pos < self.values.len() && size <= pos + 1,
            "window of {size} ending at {pos} outside produced range {}",
            self.values.len()
        );
        &self.values[pos + 1 - size..pos + 1]
    }

    /// Full produced storage as a slice, cursor position ignored.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    fn index_of(&self, ago: i32) -> usize {
        assert!(self.exposed > 0, "relative read on an empty line");
        let idx = (self.exposed - 1) as i64 + ago as i64;
        assert!(
            idx >= 0 && (idx as usize) < self.values.len(),
            "offset {ago} outside line range (len {}, produced {})",
            self.exposed,
            self.values.len()
        );
        idx as usize
    }
}

/// Datetime line for a feed, mirroring [`LineBuffer`] cursor semantics.
#[derive(Debug, Clone, Default)]
pub struct StampBuffer {
    stamps: Vec<NaiveDateTime>,
    exposed: usize,
}

impl StampBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.exposed
    }

    pub fn is_empty(&self) -> bool {
        self.exposed == 0
    }

    pub fn push(&mut self, dt: NaiveDateTime) {
        debug_assert_eq!(self.exposed, self.stamps.len());
        self.stamps.push(dt);
        self.exposed = self.stamps.len();
    }

    pub fn stage(&mut self, dt: NaiveDateTime) {
        self.stamps.push(dt);
    }

    pub fn advance(&mut self) {
        assert!(self.exposed < self.stamps.len(), "advance past staged stamps");
        self.exposed += 1;
    }

    /// Rewrite the current stamp. Used when a replayer amends the open bar.
    pub fn amend(&mut self, dt: NaiveDateTime) {
        assert!(self.exposed > 0, "amend on an empty stamp line");
        self.stamps[self.exposed - 1] = dt;
    }

    pub fn get(&self, ago: i32) -> NaiveDateTime {
        assert!(self.exposed > 0, "relative read on an empty stamp line");
        let idx = (self.exposed - 1) as i64 + ago as i64;
        assert!(
            idx >= 0 && (idx as usize) < self.exposed,
            "stamp offset {ago} outside range (len {})",
            self.exposed
        );
        self.stamps[idx as usize]
    }

    pub fn as_slice(&self) -> &[NaiveDateTime] {
        &self.stamps
    }
}
