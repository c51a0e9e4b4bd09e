//! BackLab Core — line buffers, indicator graph, feeds, broker, event loop.
//!
//! This crate contains the heart of the backtesting engine:
//! - Append-only line buffers with relative (ago) indexing
//! - Indicator dataflow graph with composed minimum periods
//! - Bar feeds, resampling and replaying to coarser timeframes
//! - Broker simulation: order matching, slippage, commissions, positions,
//!   trades, OCO groups and bracket orders
//! - Timestamp-merge engine with incremental and vectorized run modes
//! - Strategy, observer and analyzer traits plus reference implementations

pub mod broker;
pub mod engine;
pub mod feed;
pub mod graph;
pub mod indicators;
pub mod observer;
pub mod series;
pub mod strategies;
pub mod strategy;
