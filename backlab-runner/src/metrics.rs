//! Performance metrics — pure functions that compute run statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in,
//! scalar out. No dependencies on the runner or the engine loop.

use backlab_core::broker::Trade;
use backlab_core::engine::EquityPoint;
use serde::{Deserialize, Serialize};

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
}

impl PerformanceMetrics {
    /// Compute all metrics from a run's equity points and closed trades.
    ///
    /// The equity series starts at `initial_cash` before the first tick, so
    /// a fill on the opening bar still counts toward return and drawdown.
    pub fn compute(equity: &[EquityPoint], trades: &[Trade], initial_cash: f64) -> Self {
        let mut curve = Vec::with_capacity(equity.len() + 1);
        curve.push(initial_cash);
        curve.extend(equity.iter().map(|point| point.value));
        let trading_days = equity.len();
        Self {
            total_return: total_return(&curve),
            cagr: cagr(&curve, trading_days),
            sharpe: sharpe_ratio(&curve, 0.0),
            max_drawdown: max_drawdown(&curve),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            trade_count: trades.len(),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let initial = equity_curve[0];
    let final_eq = *equity_curve.last().unwrap();
    if initial <= 0.0 {
        return 0.0;
    }
    (final_eq - initial) / initial
}

/// Compound Annual Growth Rate.
///
/// Assumes 252 trading days per year. Returns 0.0 for degenerate curves.
pub fn cagr(equity_curve: &[f64], trading_days: usize) -> f64 {
    if equity_curve.len() < 2 || trading_days < 2 {
        return 0.0;
    }
    let initial = equity_curve[0];
    let final_eq = *equity_curve.last().unwrap();
    if initial <= 0.0 || final_eq <= 0.0 {
        return 0.0;
    }
    let years = trading_days as f64 / 252.0;
    if years <= 0.0 {
        return 0.0;
    }
    (final_eq / initial).powf(1.0 / years) - 1.0
}

/// Annualized Sharpe ratio from per-bar returns.
///
/// Returns 0.0 when the curve is too short or has no variance.
pub fn sharpe_ratio(equity_curve: &[f64], risk_free_rate: f64) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let bar_rf = risk_free_rate / 252.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - bar_rf).collect();
    let mean = mean_f64(&excess);
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * (252.0_f64).sqrt()
}

/// Maximum peak-to-trough drawdown as a fraction, zero or negative.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let mut peak = equity_curve[0];
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Fraction of closed trades with positive net profit.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.pnl_comm > 0.0).count();
    winners as f64 / trades.len() as f64
}

/// Gross profit over gross loss of closed trades, net of commission.
///
/// Capped at 100.0 when there are no losers; 0.0 when there are no trades.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades
        .iter()
        .filter(|t| t.pnl_comm > 0.0)
        .map(|t| t.pnl_comm)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.pnl_comm < 0.0)
        .map(|t| t.pnl_comm.abs())
        .sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Per-bar fractional returns of an equity curve.
pub fn bar_returns(equity_curve: &[f64]) -> Vec<f64> {
    if equity_curve.len() < 2 {
        return Vec::new();
    }
    equity_curve
        .windows(2)
        .map(|w| {
            if w[0] > 0.0 {
                (w[1] - w[0]) / w[0]
            } else {
                0.0
            }
        })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
