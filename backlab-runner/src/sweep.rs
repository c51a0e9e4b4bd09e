//! Parameter sweeps: a grid of crossover configs run in parallel.
//!
//! Combinations are independent, so the grid fans out over rayon. A
//! combination the strategy declines at start (fast >= slow) is reported
//! as skipped instead of aborting the batch.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{ConfigError, FeedConfig, RunConfig, RunId, StrategyConfig};
use crate::runner::{run_backtest_from_bars, BacktestResult, RunError};
use crate::synthetic::generate_bars;

/// Cartesian grid of crossover parameters swept against one base config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParamGrid {
    pub fast_periods: Vec<usize>,
    pub slow_periods: Vec<usize>,

    /// Order size shared by every combination.
    #[serde(default = "default_size")]
    pub size: f64,
}

fn default_size() -> f64 {
    1.0
}

impl ParamGrid {
    /// Parses a grid from TOML.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Reads and parses a grid file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let toml_str = std::fs::read_to_string(path)?;
        Self::from_toml(&toml_str)
    }

    pub fn len(&self) -> usize {
        self.fast_periods.len() * self.slow_periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expands the grid against a base config. Every combination keeps the
    /// base's feed, broker, and mode; only the strategy changes. Inverted
    /// pairs stay in the batch and get reported as skipped by the sweep.
    pub fn configs(&self, base: &RunConfig) -> Vec<RunConfig> {
        let mut configs = Vec::with_capacity(self.len());
        for &fast in &self.fast_periods {
            for &slow in &self.slow_periods {
                let mut config = base.clone();
                config.strategy = StrategyConfig::MaCross {
                    fast,
                    slow,
                    size: self.size,
                };
                configs.push(config);
            }
        }
        configs
    }
}

/// Everything a finished sweep leaves behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepOutcome {
    /// Completed runs, in grid order.
    pub results: Vec<BacktestResult>,
    /// Declined combinations with the strategy's reason.
    pub skipped: Vec<(RunId, String)>,
}

impl SweepOutcome {
    /// The completed run with the highest Sharpe ratio.
    pub fn best(&self) -> Option<&BacktestResult> {
        self.results
            .iter()
            .max_by(|a, b| a.metrics.sharpe.total_cmp(&b.metrics.sharpe))
    }

    /// Completed runs sorted by descending Sharpe ratio.
    pub fn ranked(&self) -> Vec<&BacktestResult> {
        let mut ranked: Vec<&BacktestResult> = self.results.iter().collect();
        ranked.sort_by(|a, b| b.metrics.sharpe.total_cmp(&a.metrics.sharpe));
        ranked
    }
}

/// Run every combination of `grid` against `base` in parallel.
///
/// Bars are materialized once and shared across the grid, so a synthetic
/// sweep only pays for generation once. Result order matches grid order
/// regardless of scheduling.
pub fn sweep(grid: &ParamGrid, base: &RunConfig) -> Result<SweepOutcome, RunError> {
    base.validate()?;
    let bars = match &base.feed {
        FeedConfig::Synthetic {
            seed,
            bars,
            start_price,
        } => generate_bars(*seed, *bars, *start_price),
        FeedConfig::Inline { bars } => bars.clone(),
    };

    let configs = grid.configs(base);
    let runs: Vec<BacktestResult> = configs
        .par_iter()
        .map(|config| run_backtest_from_bars(config, bars.clone()))
        .collect::<Result<_, _>>()?;

    let mut results = Vec::new();
    let mut skipped = Vec::new();
    for run in runs {
        match &run.skipped {
            Some(reason) => skipped.push((run.run_id.clone(), reason.clone())),
            None => results.push(run),
        }
    }
    Ok(SweepOutcome { results, skipped })
}
