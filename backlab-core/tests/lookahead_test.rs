//! Look-ahead contamination tests.
//!
//! Invariant: nothing computed at bar t may depend on data from bar t+1 or
//! later. Method: run on a truncated series (bars 0..120) and the full
//! series (bars 0..240) and assert the overlapping prefix is bit-identical.
//! Any difference means future data leaked backwards.
//!
//! Checked at two levels: raw indicator lines through the graph, and whole
//! engine runs (equity curve and fills) through a trading strategy,
//! including the vectorized mode whose staged buffers hold the entire
//! series up front.

use backlab_core::engine::{Engine, EquityPoint, RunMode};
use backlab_core::feed::{line, Bar, VecFeed};
use backlab_core::graph::{Graph, Input, Node};
use backlab_core::indicators::{CrossOver, Ema, Highest, Lowest, Sma};
use backlab_core::strategies::MaCross;
use chrono::NaiveDate;

/// Deterministic pseudo-random walk using a simple LCG.
fn lcg_bars(n: usize, seed: u64) -> Vec<Bar> {
    let base = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut state = seed;
    let mut price = 100.0_f64;
    (0..n)
        .map(|i| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let change = ((state >> 33) % 200) as f64 / 10.0 - 10.0;
            price = (price + change).max(10.0);
            let open = price - 0.5;
            let close = price + 0.3;
            Bar {
                datetime: base + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 2.0,
                low: open.min(close) - 2.0,
                close,
                volume: 1_000.0,
                openinterest: 0.0,
            }
        })
        .collect()
}

/// Push closes through a single-input node and record its full output line,
/// NaN warmup included.
fn indicator_line(node: Box<dyn Node>, lookback: usize, closes: &[f64]) -> Vec<u64> {
    let mut graph = Graph::new();
    let src = graph.add_source(1);
    let id = graph
        .add_node(node, vec![Input::new(src, 0, lookback)])
        .unwrap();
    let mut out = Vec::with_capacity(closes.len());
    for &close in closes {
        graph.source_forward(src);
        graph.source_set(src, 0, close);
        graph.step_all(&[]);
        out.push(graph.value(id, 0, 0).to_bits());
    }
    out
}

fn assert_prefix_identical(name: &str, truncated: &[u64], full: &[u64]) {
    assert_eq!(truncated.len(), full.len().min(truncated.len()));
    for (i, (t, f)) in truncated.iter().zip(full).enumerate() {
        assert_eq!(
            t, f,
            "{name}: bar {i} differs between truncated and full runs"
        );
    }
}

#[test]
fn indicator_lines_are_free_of_lookahead() {
    let closes: Vec<f64> = lcg_bars(240, 99).iter().map(|b| b.close).collect();
    let truncated = &closes[..120];

    let cases: Vec<(&str, fn() -> Box<dyn Node>, usize)> = vec![
        ("sma", || Box::new(Sma::new(7)), 6),
        ("ema", || Box::new(Ema::new(9)), 8),
        ("highest", || Box::new(Highest::new(5)), 4),
        ("lowest", || Box::new(Lowest::new(5)), 4),
    ];
    for (name, make, lookback) in cases {
        let t = indicator_line(make(), lookback, truncated);
        let f = indicator_line(make(), lookback, &closes);
        assert_prefix_identical(name, &t, &f);
    }
}

#[test]
fn chained_crossover_is_free_of_lookahead() {
    let closes: Vec<f64> = lcg_bars(240, 5).iter().map(|b| b.close).collect();

    let run = |closes: &[f64]| -> Vec<u64> {
        let mut graph = Graph::new();
        let src = graph.add_source(1);
        let fast = graph
            .add_node(Box::new(Sma::new(5)), vec![Input::new(src, 0, 4)])
            .unwrap();
        let slow = graph
            .add_node(Box::new(Sma::new(20)), vec![Input::new(src, 0, 19)])
            .unwrap();
        let cross = graph
            .add_node(
                Box::new(CrossOver::new()),
                vec![Input::new(fast, 0, 1), Input::new(slow, 0, 1)],
            )
            .unwrap();
        let mut out = Vec::with_capacity(closes.len());
        for &close in closes {
            graph.source_forward(src);
            graph.source_set(src, 0, close);
            graph.step_all(&[]);
            out.push(graph.value(cross, 0, 0).to_bits());
        }
        out
    };

    assert_prefix_identical("crossover", &run(&closes[..120]), &run(&closes));
}

fn equity_of(bars: Vec<Bar>, mode: RunMode) -> Vec<EquityPoint> {
    let mut engine = Engine::new();
    let feed = engine.add_feed(VecFeed::daily(bars));
    let src = engine.feed_node(feed);
    let fast = engine
        .add_node(Box::new(Sma::new(5)), vec![Input::new(src, line::CLOSE, 4)])
        .unwrap();
    let slow = engine
        .add_node(Box::new(Sma::new(15)), vec![Input::new(src, line::CLOSE, 14)])
        .unwrap();
    let signal = engine
        .add_node(
            Box::new(CrossOver::new()),
            vec![Input::new(fast, 0, 1), Input::new(slow, 0, 1)],
        )
        .unwrap();
    engine.set_mode(mode);
    let mut strategy = MaCross::new(feed, signal, 5, 15, 2.0);
    engine.run(&mut strategy).unwrap().equity
}

#[test]
fn equity_curve_is_free_of_lookahead() {
    let bars = lcg_bars(240, 42);
    let truncated = equity_of(bars[..120].to_vec(), RunMode::Incremental);
    let full = equity_of(bars, RunMode::Incremental);

    assert_eq!(truncated.len(), 120);
    for (i, (t, f)) in truncated.iter().zip(&full).enumerate() {
        assert_eq!(t.datetime, f.datetime, "tick {i}");
        assert_eq!(t.cash.to_bits(), f.cash.to_bits(), "cash at tick {i}");
        assert_eq!(t.value.to_bits(), f.value.to_bits(), "value at tick {i}");
    }
}

#[test]
fn vectorized_staging_does_not_leak_forward() {
    // The vectorized run holds all 240 bars in staged buffers from the
    // first tick; its prefix must still match an incremental run that has
    // never seen past bar 120.
    let bars = lcg_bars(240, 42);
    let truncated = equity_of(bars[..120].to_vec(), RunMode::Incremental);
    let full = equity_of(bars, RunMode::Vectorized);

    for (i, (t, f)) in truncated.iter().zip(&full).enumerate() {
        assert_eq!(t.cash.to_bits(), f.cash.to_bits(), "cash at tick {i}");
        assert_eq!(t.value.to_bits(), f.value.to_bits(), "value at tick {i}");
    }
}
