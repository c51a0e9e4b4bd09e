//! Built-in indicator nodes.
//!
//! Each indicator implements the `Node` trait from `graph` and produces one
//! output line driven by the clock of its first input. Indicators declare
//! their history need at wiring time through `Input::lookback` (an indicator
//! reading a window of `period` values is wired with `period - 1`), and the
//! graph composes minimum periods from there, so chained indicators warm up
//! correctly without any of them knowing what feeds them.

pub mod crossover;
pub mod ema;
pub mod minmax;
pub mod sma;

pub use crossover::CrossOver;
pub use ema::Ema;
pub use minmax::{Highest, Lowest};
pub use sma::Sma;

/// Run a single-input node incrementally over `closes`, collecting its
/// output from the first warmed-up bar on.
#[cfg(test)]
pub fn warm_values(
    node: Box<dyn crate::graph::Node>,
    lookback: usize,
    closes: &[f64],
) -> Vec<f64> {
    use crate::graph::{Graph, Input};

    let mut graph = Graph::new();
    let src = graph.add_source(1);
    let id = graph
        .add_node(node, vec![Input::new(src, 0, lookback)])
        .unwrap();
    let mut out = Vec::new();
    for &close in closes {
        graph.source_forward(src);
        graph.source_set(src, 0, close);
        graph.step_all(&[]);
        if graph.len_of(id) >= graph.minperiod(id) {
            out.push(graph.value(id, 0, 0));
        }
    }
    out
}

/// Same as [`warm_values`] but through the staged batch path.
#[cfg(test)]
pub fn batch_values(
    node: Box<dyn crate::graph::Node>,
    lookback: usize,
    closes: &[f64],
) -> Vec<f64> {
    use crate::graph::{Graph, Input};

    let mut graph = Graph::new();
    let src = graph.add_source(1);
    let id = graph
        .add_node(node, vec![Input::new(src, 0, lookback)])
        .unwrap();
    for &close in closes {
        graph.source_stage(src, &[close]);
    }
    graph.run_batch();
    let mut out = Vec::new();
    for _ in closes {
        graph.source_advance(src);
        graph.advance_computed();
        if graph.len_of(id) >= graph.minperiod(id) {
            out.push(graph.value(id, 0, 0));
        }
    }
    out
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
