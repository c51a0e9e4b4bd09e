//! Indicator dataflow graph — nodes, wiring, minimum periods, dispatch.
//!
//! The graph is an arena of slots addressed by [`NodeId`]. Source slots hold
//! the lines of a data feed and are written by the engine; compute slots hold
//! a boxed [`Node`] plus its output lines. Wiring happens once, up front, and
//! construction order is dependency order: an input handle must already exist
//! when the consumer is added, so stepping slots left to right always sees
//! fully updated inputs.
//!
//! Each slot carries a minimum period, composed from its inputs:
//! `minperiod = max over inputs of (input minperiod + input lookback)`.
//! Until a node's line reaches that length the engine routes ticks to
//! `prenext`; the bar on which it is reached goes to `nextstart`; every later
//! bar goes to `next`. Values a node reads inside `next` are therefore always
//! produced, which is what keeps the buffer panics in `series` unreachable.

use crate::series::LineBuffer;
use thiserror::Error;

/// Handle to a slot in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// One wiring edge: a line of an upstream slot plus the extra history the
/// consumer reads beyond the current bar.
#[derive(Debug, Clone, Copy)]
pub struct Input {
    pub node: NodeId,
    pub line: usize,
    pub lookback: usize,
}

impl Input {
    pub fn new(node: NodeId, line: usize, lookback: usize) -> Self {
        Self {
            node,
            line,
            lookback,
        }
    }
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("input references unknown node {0}")]
    UnknownInput(usize),
    #[error("input line {line} out of range for node {node} ({lines} lines)")]
    UnknownLine {
        node: usize,
        line: usize,
        lines: usize,
    },
    #[error("compute node needs at least one input")]
    NoInputs,
}

/// A stepwise computation over input lines.
///
/// `next` runs once per bar once the minimum period is satisfied and must be
/// a pure function of the visible lines: replayed streams re-run it for the
/// same bar after in-place amendments, so it cannot fold hidden state across
/// calls. `once` is the batch pass; the default replays the stepwise methods
/// position by position, so an override is an optimization, never a semantic
/// change.
pub trait Node: Send {
    fn name(&self) -> &str;

    fn next(&mut self, ctx: &mut Ctx<'_>);

    /// First bar at the minimum period. Defaults to `next`.
    fn nextstart(&mut self, ctx: &mut Ctx<'_>) {
        self.next(ctx);
    }

    /// Bars before the minimum period. Defaults to leaving NaN.
    fn prenext(&mut self, _ctx: &mut Ctx<'_>) {}

    /// Number of output lines. Allocated by the graph at wiring time.
    fn lines(&self) -> usize {
        1
    }

    /// Batch-fill positions `start..end` of the output lines.
    fn once(&mut self, ctx: &mut Ctx<'_>, start: usize, end: usize) {
        for pos in start..end {
            ctx.seek(pos);
            let len = pos + 1;
            if len > ctx.minperiod() {
                self.next(ctx);
            } else if len == ctx.minperiod() {
                self.nextstart(ctx);
            } else {
                self.prenext(ctx);
            }
        }
    }
}

enum SlotBody {
    Source,
    Compute {
        node: Box<dyn Node>,
        inputs: Vec<Input>,
    },
}

struct Slot {
    body: SlotBody,
    lines: Vec<LineBuffer>,
    minperiod: usize,
    clock: NodeId,
}

/// View a stepping node gets of the world: read access to its inputs,
/// write access to its own lines.
///
/// In cursor mode reads resolve against each buffer's own cursor; in batch
/// mode (`seek`) they resolve against an absolute position shared by all
/// buffers of the clock domain.
pub struct Ctx<'a> {
    upstream: &'a [Slot],
    inputs: &'a [Input],
    lines: &'a mut [LineBuffer],
    minperiod: usize,
    pos: Option<usize>,
}

impl Ctx<'_> {
    /// Value of input `k` at relative offset `ago`.
    pub fn input(&self, k: usize, ago: i32) -> f64 {
        let buf = self.input_buf(k);
        match self.pos {
            None => buf.get(ago),
            Some(p) => buf.at_offset(p, ago),
        }
    }

    /// The last `size` values of input `k`, oldest first.
    pub fn input_window(&self, k: usize, size: usize) -> &[f64] {
        let buf = self.input_buf(k);
        match self.pos {
            None => buf.window(size),
            Some(p) => buf.window_at(p, size),
        }
    }

    /// Value of own line `line` at relative offset `ago`.
    pub fn own(&self, line: usize, ago: i32) -> f64 {
        match self.pos {
            None => self.lines[line].get(ago),
            Some(p) => self.lines[line].at_offset(p, ago),
        }
    }

    /// Write own line `line` at the current bar.
    pub fn set(&mut self, line: usize, value: f64) {
        match self.pos {
            None => self.lines[line].set(0, value),
            Some(p) => self.lines[line].set_at(p, value),
        }
    }

    /// Bars this node has seen, current one included.
    pub fn len(&self) -> usize {
        match self.pos {
            None => self.lines[0].len(),
            Some(p) => p + 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn minperiod(&self) -> usize {
        self.minperiod
    }

    pub(crate) fn seek(&mut self, pos: usize) {
        self.pos = Some(pos);
    }

    fn input_buf(&self, k: usize) -> &LineBuffer {
        let input = &self.inputs[k];
        &self.upstream[input.node.0].lines[input.line]
    }
}

/// The arena. Sources first by convention is not required; dependency order is.
#[derive(Default)]
pub struct Graph {
    slots: Vec<Slot>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source slot with `lines` buffers, written by the engine.
    pub fn add_source(&mut self, lines: usize) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Slot {
            body: SlotBody::Source,
            lines: (0..lines).map(|_| LineBuffer::new()).collect(),
            minperiod: 1,
            clock: id,
        });
        id
    }

    /// Add a compute node wired to already-existing slots.
    pub fn add_node(
        &mut self,
        node: Box<dyn Node>,
        inputs: Vec<Input>,
    ) -> Result<NodeId, GraphError> {
        if inputs.is_empty() {
            return Err(GraphError::NoInputs);
        }
        let mut minperiod = 1usize;
        for input in &inputs {
            let slot = self
                .slots
                .get(input.node.0)
                .ok_or(GraphError::UnknownInput(input.node.0))?;
            if input.line >= slot.lines.len() {
                return Err(GraphError::UnknownLine {
                    node: input.node.0,
                    line: input.line,
                    lines: slot.lines.len(),
                });
            }
            minperiod = minperiod.max(slot.minperiod + input.lookback);
        }
        let clock = self.slots[inputs[0].node.0].clock;
        let lines = (0..node.lines().max(1)).map(|_| LineBuffer::new()).collect();
        let id = NodeId(self.slots.len());
        self.slots.push(Slot {
            body: SlotBody::Compute { node, inputs },
            lines,
            minperiod,
            clock,
        });
        Ok(id)
    }

    pub fn node_count(&self) -> usize {
        self.slots.len()
    }

    pub fn minperiod(&self, id: NodeId) -> usize {
        self.slots[id.0].minperiod
    }

    /// Largest warm-up requirement across all compute slots.
    pub fn max_minperiod(&self) -> usize {
        self.slots.iter().map(|s| s.minperiod).max().unwrap_or(1)
    }

    /// The source slot that ultimately drives `id`.
    pub fn clock_of(&self, id: NodeId) -> NodeId {
        self.slots[id.0].clock
    }

    pub fn len_of(&self, id: NodeId) -> usize {
        self.slots[id.0].lines[0].len()
    }

    /// Read line `line` of slot `id` at relative offset `ago`.
    pub fn value(&self, id: NodeId, line: usize, ago: i32) -> f64 {
        self.slots[id.0].lines[line].get(ago)
    }

    /// Bars still missing before every slot reaches its minimum period.
    /// Zero or negative means fully warmed up; the engine keys the
    /// strategy's prenext/next transition off this.
    pub fn warmup_deficit(&self) -> i64 {
        self.slots
            .iter()
            .map(|s| s.minperiod as i64 - s.lines[0].len() as i64)
            .max()
            .unwrap_or(0)
    }

    pub fn warmed_up(&self) -> bool {
        self.warmup_deficit() <= 0
    }

    // ── source delivery (engine-facing) ──────────────────────────────

    /// Extend every line of a source by one NaN row and move its cursor.
    pub fn source_forward(&mut self, id: NodeId) {
        let slot = &mut self.slots[id.0];
        debug_assert!(matches!(slot.body, SlotBody::Source));
        for line in &mut slot.lines {
            line.forward();
        }
    }

    /// Write line `line` of a source at the current bar.
    pub fn source_set(&mut self, id: NodeId, line: usize, value: f64) {
        let slot = &mut self.slots[id.0];
        debug_assert!(matches!(slot.body, SlotBody::Source));
        slot.lines[line].set(0, value);
    }

    /// Stage one row of source values ahead of the cursor.
    pub fn source_stage(&mut self, id: NodeId, row: &[f64]) {
        let slot = &mut self.slots[id.0];
        debug_assert!(matches!(slot.body, SlotBody::Source));
        debug_assert_eq!(row.len(), slot.lines.len());
        for (line, &value) in slot.lines.iter_mut().zip(row) {
            line.stage(value);
        }
    }

    /// Move a source's cursor over one staged row.
    pub fn source_advance(&mut self, id: NodeId) {
        let slot = &mut self.slots[id.0];
        debug_assert!(matches!(slot.body, SlotBody::Source));
        for line in &mut slot.lines {
            line.advance();
        }
    }

    /// Number of staged rows on a source (cursor-independent).
    pub fn source_staged(&self, id: NodeId) -> usize {
        self.slots[id.0].lines[0].produced()
    }

    // ── dispatch ─────────────────────────────────────────────────────

    /// Step every compute slot once for this tick.
    ///
    /// A slot forwards and dispatches when its clock has outrun it; it
    /// re-dispatches in place (no forward) when its clock is listed in
    /// `amended`, which is how replayed sub-bars propagate.
    pub fn step_all(&mut self, amended: &[NodeId]) {
        for i in 0..self.slots.len() {
            let clock = self.slots[i].clock;
            let clock_len = self.slots[clock.0].lines[0].len();
            let own_len = self.slots[i].lines[0].len();

            let (before, rest) = self.slots.split_at_mut(i);
            let slot = &mut rest[0];
            let (node, inputs) = match &mut slot.body {
                SlotBody::Source => continue,
                SlotBody::Compute { node, inputs } => (node, inputs),
            };

            let rerun = clock_len == own_len && own_len > 0 && amended.contains(&clock);
            if clock_len > own_len {
                debug_assert_eq!(clock_len, own_len + 1, "clock outran node by more than one bar");
                for line in &mut slot.lines {
                    line.forward();
                }
            } else if !rerun {
                continue;
            }

            let mut ctx = Ctx {
                upstream: before,
                inputs,
                lines: &mut slot.lines,
                minperiod: slot.minperiod,
                pos: None,
            };
            let len = ctx.len();
            if len > slot.minperiod {
                node.next(&mut ctx);
            } else if len == slot.minperiod {
                node.nextstart(&mut ctx);
            } else {
                node.prenext(&mut ctx);
            }
        }
    }

    /// Batch-compute every compute slot over fully staged sources.
    ///
    /// Callers must have staged all sources of a single clock domain to the
    /// same length; slots grow their lines to the clock's staged length and
    /// run `once` over the whole range.
    pub fn run_batch(&mut self) {
        for i in 0..self.slots.len() {
            let clock = self.slots[i].clock;
            let total = self.slots[clock.0].lines[0].produced();

            let (before, rest) = self.slots.split_at_mut(i);
            let slot = &mut rest[0];
            let (node, inputs) = match &mut slot.body {
                SlotBody::Source => continue,
                SlotBody::Compute { node, inputs } => (node, inputs),
            };
            for line in &mut slot.lines {
                line.grow_to(total);
            }
            if total == 0 {
                continue;
            }
            let mut ctx = Ctx {
                upstream: before,
                inputs,
                lines: &mut slot.lines,
                minperiod: slot.minperiod,
                pos: Some(0),
            };
            node.once(&mut ctx, 0, total);
        }
    }

    /// Move every compute slot's cursor one row forward over batch output.
    pub fn advance_computed(&mut self) {
        for slot in &mut self.slots {
            if matches!(slot.body, SlotBody::Compute { .. }) {
                for line in &mut slot.lines {
                    line.advance();
                }
            }
        }
    }
}
