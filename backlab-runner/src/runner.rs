//! Backtest runner — wires a config into an engine and runs it to metrics.
//!
//! Two entry points:
//! - `run_single_backtest()`: materializes bars from the config, then runs.
//!   Used by the CLI.
//! - `run_backtest_from_bars()`: takes pre-built bars. Used by sweeps to
//!   share one synthetic walk across a whole parameter grid.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use backlab_core::broker::{Order, Trade};
use backlab_core::engine::{Engine, EngineError, EquityPoint};
use backlab_core::feed::{line, Bar, VecFeed};
use backlab_core::graph::{GraphError, Input};
use backlab_core::indicators::{CrossOver, Sma};
use backlab_core::observer::{TradeStats, ValueReturns};
use backlab_core::strategies::{BuyHold, MaCross};
use backlab_core::strategy::Strategy;

use crate::config::{ConfigError, FeedConfig, RunConfig, RunId, StrategyConfig};
use crate::metrics::PerformanceMetrics;
use crate::synthetic::generate_bars;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: RunConfig,
    pub metrics: PerformanceMetrics,
    pub equity: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub orders: Vec<Order>,
    /// One JSON document per engine analyzer, in registration order.
    pub analyses: Vec<serde_json::Value>,
    pub ticks: usize,
    pub initial_cash: f64,
    pub final_value: f64,
    /// Reason the strategy declined to run, if it did.
    pub skipped: Option<String>,
}

/// Default schema version for deserializing older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run a single backtest from a validated config.
///
/// This is the high-level entry point used by the CLI. Synthetic feeds are
/// generated here; for pre-built bars use `run_backtest_from_bars()`.
pub fn run_single_backtest(config: &RunConfig) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let bars = match &config.feed {
        FeedConfig::Synthetic {
            seed,
            bars,
            start_price,
        } => generate_bars(*seed, *bars, *start_price),
        FeedConfig::Inline { bars } => bars.clone(),
    };
    run_backtest_from_bars(config, bars)
}

/// Run a backtest over pre-built bars.
///
/// The feed section of `config` only contributes to the run ID here; the
/// strategy, broker, and mode sections all still apply. Bars must arrive
/// in nondecreasing datetime order.
pub fn run_backtest_from_bars(
    config: &RunConfig,
    bars: Vec<Bar>,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    if bars.is_empty() {
        return Err(ConfigError::EmptyFeed.into());
    }

    let mut engine = Engine::new();
    engine.set_mode(config.mode);
    engine.set_broker(config.broker.build());
    engine.add_analyzer(Box::new(TradeStats::default()));
    engine.add_analyzer(Box::new(ValueReturns::default()));
    let feed = engine.add_feed(VecFeed::daily(bars));

    // Wire the strategy's indicator stack onto the feed.
    let mut strategy: Box<dyn Strategy> = match config.strategy {
        StrategyConfig::BuyHold { size } => Box::new(BuyHold::new(feed, size)),
        StrategyConfig::MaCross { fast, slow, size } => {
            let src = engine.feed_node(feed);
            let fast_ma = engine.add_node(
                Box::new(Sma::new(fast)),
                vec![Input::new(src, line::CLOSE, fast - 1)],
            )?;
            let slow_ma = engine.add_node(
                Box::new(Sma::new(slow)),
                vec![Input::new(src, line::CLOSE, slow - 1)],
            )?;
            let signal = engine.add_node(
                Box::new(CrossOver::new()),
                vec![Input::new(fast_ma, 0, 1), Input::new(slow_ma, 0, 1)],
            )?;
            Box::new(MaCross::new(feed, signal, fast, slow, size))
        }
    };

    let initial_cash = config.broker.cash;
    let summary = engine.run(strategy.as_mut())?;
    let metrics = PerformanceMetrics::compute(&summary.equity, &summary.trades, initial_cash);

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: config.run_id(),
        config: config.clone(),
        metrics,
        equity: summary.equity,
        trades: summary.trades,
        orders: summary.orders,
        analyses: summary.analyses,
        ticks: summary.ticks,
        initial_cash,
        final_value: summary.value,
        skipped: summary.skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerSettings;
    use backlab_core::engine::RunMode;
    use chrono::NaiveDate;

    fn daily_bar(day: u32, open: f64, close: f64) -> Bar {
        let datetime = NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Bar {
            datetime,
            open,
            high: open.max(close) + 1.0,
            low: open.min(close) - 1.0,
            close,
            volume: 1000.0,
            openinterest: 0.0,
        }
    }

    fn inline_config(bars: Vec<Bar>, strategy: StrategyConfig) -> RunConfig {
        RunConfig {
            feed: FeedConfig::Inline { bars },
            strategy,
            broker: BrokerSettings::default(),
            mode: RunMode::Incremental,
        }
    }

    #[test]
    fn buy_hold_fills_once_and_rides_the_close() {
        let bars = vec![
            daily_bar(1, 10.0, 11.0),
            daily_bar(2, 12.0, 13.0),
            daily_bar(3, 13.0, 15.0),
        ];
        let config = inline_config(bars, StrategyConfig::BuyHold { size: 1.0 });
        let result = run_single_backtest(&config).unwrap();

        assert_eq!(result.ticks, 3);
        assert_eq!(result.orders.len(), 1);
        assert_eq!(result.orders[0].executed.price, 12.0);
        // One unit bought at day 2's open, marked at day 3's close.
        assert_eq!(result.final_value, 10_000.0 - 12.0 + 15.0);
        assert_eq!(result.equity.len(), 3);
        assert!(result.skipped.is_none());
        assert_eq!(result.run_id, config.run_id());
    }

    #[test]
    fn analyses_arrive_in_registration_order() {
        let bars = vec![daily_bar(1, 10.0, 11.0), daily_bar(2, 11.0, 12.0)];
        let config = inline_config(bars, StrategyConfig::BuyHold { size: 1.0 });
        let result = run_single_backtest(&config).unwrap();

        assert_eq!(result.analyses.len(), 2);
        // TradeStats first, ValueReturns second.
        assert!(result.analyses[0].get("total").is_some());
        assert!(result.analyses[1].get("log_return").is_some());
    }

    #[test]
    fn inverted_crossover_is_skipped_not_failed() {
        let bars = vec![daily_bar(1, 10.0, 11.0), daily_bar(2, 11.0, 12.0)];
        let config = inline_config(
            bars,
            StrategyConfig::MaCross {
                fast: 30,
                slow: 10,
                size: 1.0,
            },
        );
        let result = run_single_backtest(&config).unwrap();

        assert!(result.skipped.is_some());
        assert_eq!(result.ticks, 0);
        assert!(result.equity.is_empty());
        assert_eq!(result.metrics.trade_count, 0);
        assert_eq!(result.metrics.total_return, 0.0);
    }

    #[test]
    fn invalid_config_fails_before_any_bar() {
        let mut config = inline_config(
            vec![daily_bar(1, 10.0, 11.0)],
            StrategyConfig::BuyHold { size: 1.0 },
        );
        config.broker.cash = -5.0;
        assert!(matches!(
            run_single_backtest(&config),
            Err(RunError::Config(ConfigError::NonPositiveCash(_)))
        ));
    }

    #[test]
    fn synthetic_runs_are_deterministic() {
        let config = RunConfig {
            feed: FeedConfig::Synthetic {
                seed: 11,
                bars: 120,
                start_price: 100.0,
            },
            strategy: StrategyConfig::MaCross {
                fast: 5,
                slow: 20,
                size: 3.0,
            },
            broker: BrokerSettings::default(),
            mode: RunMode::Incremental,
        };
        let a = run_single_backtest(&config).unwrap();
        let b = run_single_backtest(&config).unwrap();

        assert_eq!(a.run_id, b.run_id);
        assert_eq!(a.ticks, b.ticks);
        assert_eq!(a.trades.len(), b.trades.len());
        for (x, y) in a.equity.iter().zip(&b.equity) {
            assert_eq!(x.value.to_bits(), y.value.to_bits());
        }
    }

    #[test]
    fn modes_agree_on_a_synthetic_run() {
        let base = RunConfig {
            feed: FeedConfig::Synthetic {
                seed: 23,
                bars: 200,
                start_price: 50.0,
            },
            strategy: StrategyConfig::MaCross {
                fast: 10,
                slow: 30,
                size: 2.0,
            },
            broker: BrokerSettings::default(),
            mode: RunMode::Incremental,
        };
        let mut vectorized = base.clone();
        vectorized.mode = RunMode::Vectorized;

        let a = run_single_backtest(&base).unwrap();
        let b = run_single_backtest(&vectorized).unwrap();

        assert_eq!(a.ticks, b.ticks);
        assert_eq!(a.orders.len(), b.orders.len());
        for (x, y) in a.equity.iter().zip(&b.equity) {
            assert_eq!(x.datetime, y.datetime);
            assert_eq!(x.value.to_bits(), y.value.to_bits());
        }
    }
}
