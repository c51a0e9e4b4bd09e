//! BackLab Runner — backtest orchestration, sweeps, metrics, and exports.
//!
//! This crate builds on `backlab-core` to provide:
//! - Serializable run configuration with content-addressed run IDs
//! - Deterministic synthetic bar generation
//! - A single-backtest runner producing equity, trades, and metrics
//! - Parallel parameter sweeps with skip-aware result collection
//! - JSON, CSV, and Markdown artifact export

pub mod config;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod sweep;
pub mod synthetic;

pub use config::{
    BrokerSettings, CommissionSettings, ConfigError, FeedConfig, RunConfig, RunId,
    SlippageSettings, StrategyConfig,
};
pub use export::{
    export_equity_csv, export_json, export_trades_csv, generate_report, import_json,
    load_artifacts, save_artifacts,
};
pub use metrics::PerformanceMetrics;
pub use runner::{
    run_backtest_from_bars, run_single_backtest, BacktestResult, RunError, SCHEMA_VERSION,
};
pub use sweep::{sweep, ParamGrid, SweepOutcome};
pub use synthetic::generate_bars;
