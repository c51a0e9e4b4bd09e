//! Reporting and export — JSON, CSV, and Markdown artifact generation.
//!
//! Provides three export formats for backtest results:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: trade tape and equity curve for external analysis tools
//! - **Markdown**: human-readable single-run reports
//!
//! All persisted artifacts include a `schema_version` field. Unknown
//! versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use backlab_core::broker::Trade;
use backlab_core::engine::EquityPoint;

use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export a closed-trade list as CSV.
///
/// Columns: feed, side, entry_price, opened, closed, bars_held, fills,
/// gross_pnl, commission, net_pnl. `bars_held` counts bars of the trade's
/// own feed; the full per-fill history lives in the JSON manifest.
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "feed",
        "side",
        "entry_price",
        "opened",
        "closed",
        "bars_held",
        "fills",
        "gross_pnl",
        "commission",
        "net_pnl",
    ])?;

    for t in trades {
        let side = if t.is_long { "long" } else { "short" }.to_string();
        wtr.write_record([
            &t.feed.0.to_string(),
            &side,
            &format!("{:.6}", t.price),
            &t.opened.to_string(),
            &t.closed.map(|dt| dt.to_string()).unwrap_or_default(),
            &t.bar_close
                .map(|bar| (bar - t.bar_open).to_string())
                .unwrap_or_default(),
            &t.history.len().to_string(),
            &format!("{:.2}", t.pnl),
            &format!("{:.2}", t.commission),
            &format!("{:.2}", t.pnl_comm),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export an equity curve as CSV with datetime, cash, and value columns.
pub fn export_equity_csv(equity: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["datetime", "cash", "value"])?;
    for point in equity {
        wtr.write_record([
            &point.datetime.to_string(),
            &format!("{:.2}", point.cash),
            &format!("{:.2}", point.value),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single backtest run.
///
/// Creates a directory named `{run_id_prefix}_{timestamp}/` under
/// `output_dir` containing:
/// - `manifest.json` — the full `BacktestResult`
/// - `trades.csv` — closed-trade tape
/// - `equity.csv` — per-tick equity curve
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let short_id = &result.run_id[..result.run_id.len().min(12)];
    let dirname = format!(
        "{}_{}",
        short_id,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let json = export_json(result)?;
    std::fs::write(run_dir.join("manifest.json"), &json)?;

    let trades_csv = export_trades_csv(&result.trades)?;
    std::fs::write(run_dir.join("trades.csv"), &trades_csv)?;

    let equity_csv = export_equity_csv(&result.equity)?;
    std::fs::write(run_dir.join("equity.csv"), &equity_csv)?;

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
///
/// Rejects unknown schema versions.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

/// Generate a Markdown report for a single backtest run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(1024);

    md.push_str("# Backtest Report\n\n");
    md.push_str(&format!(
        "Run `{}` — {} ticks\n\n",
        &result.run_id[..result.run_id.len().min(12)],
        result.ticks
    ));

    if let Some(reason) = &result.skipped {
        md.push_str(&format!("**Skipped**: {reason}\n"));
        return md;
    }

    md.push_str("| Metric | Value |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!(
        "| Total return | {} |\n",
        pct(result.metrics.total_return)
    ));
    md.push_str(&format!("| CAGR | {} |\n", pct(result.metrics.cagr)));
    md.push_str(&format!("| Sharpe | {:.3} |\n", result.metrics.sharpe));
    md.push_str(&format!(
        "| Max drawdown | {} |\n",
        pct(result.metrics.max_drawdown)
    ));
    md.push_str(&format!("| Win rate | {} |\n", pct(result.metrics.win_rate)));
    md.push_str(&format!(
        "| Profit factor | {:.2} |\n",
        result.metrics.profit_factor
    ));
    md.push_str(&format!("| Trades | {} |\n", result.metrics.trade_count));

    md.push_str(&format!(
        "\nFinal value {:.2} from initial {:.2}.\n",
        result.final_value, result.initial_cash
    ));
    md
}

fn pct(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BrokerSettings, FeedConfig, RunConfig, StrategyConfig};
    use crate::metrics::PerformanceMetrics;
    use backlab_core::broker::{TradeEvent, TradeStatus};
    use backlab_core::engine::RunMode;
    use backlab_core::feed::FeedId;
    use chrono::{NaiveDate, NaiveDateTime};

    fn dt(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample_result() -> BacktestResult {
        let config = RunConfig {
            feed: FeedConfig::Synthetic {
                seed: 1,
                bars: 3,
                start_price: 100.0,
            },
            strategy: StrategyConfig::BuyHold { size: 1.0 },
            broker: BrokerSettings::default(),
            mode: RunMode::Incremental,
        };
        let equity = vec![
            EquityPoint {
                datetime: dt(1),
                cash: 10_000.0,
                value: 10_000.0,
            },
            EquityPoint {
                datetime: dt(2),
                cash: 9_988.0,
                value: 10_001.0,
            },
        ];
        let trades = vec![Trade {
            feed: FeedId(0),
            is_long: true,
            status: TradeStatus::Closed,
            size: 0.0,
            price: 12.0,
            value: 0.0,
            commission: 1.0,
            pnl: 14.0,
            pnl_comm: 13.0,
            opened: dt(2),
            closed: Some(dt(3)),
            bar_open: 1,
            bar_close: Some(2),
            history: vec![
                TradeEvent {
                    datetime: dt(2),
                    bar: 1,
                    size: 1.0,
                    price: 12.0,
                    commission: 0.5,
                    pnl: 0.0,
                    position: 1.0,
                },
                TradeEvent {
                    datetime: dt(3),
                    bar: 2,
                    size: -1.0,
                    price: 26.0,
                    commission: 0.5,
                    pnl: 14.0,
                    position: 0.0,
                },
            ],
        }];
        BacktestResult {
            schema_version: SCHEMA_VERSION,
            run_id: config.run_id(),
            metrics: PerformanceMetrics::compute(&equity, &trades, 10_000.0),
            config,
            equity,
            trades,
            orders: Vec::new(),
            analyses: vec![serde_json::json!({"total": 1})],
            ticks: 2,
            initial_cash: 10_000.0,
            final_value: 10_001.0,
            skipped: None,
        }
    }

    #[test]
    fn json_roundtrip() {
        let result = sample_result();
        let json = export_json(&result).unwrap();
        let back = import_json(&json).unwrap();

        assert_eq!(back.run_id, result.run_id);
        assert_eq!(back.ticks, result.ticks);
        assert_eq!(back.trades.len(), 1);
        assert_eq!(back.trades[0].history, result.trades[0].history);
        assert_eq!(back.config, result.config);
    }

    #[test]
    fn json_rejects_unknown_version() {
        let mut value: serde_json::Value =
            serde_json::from_str(&export_json(&sample_result()).unwrap()).unwrap();
        value["schema_version"] = serde_json::json!(99);
        let err = import_json(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    #[test]
    fn json_defaults_missing_version() {
        let mut value: serde_json::Value =
            serde_json::from_str(&export_json(&sample_result()).unwrap()).unwrap();
        value.as_object_mut().unwrap().remove("schema_version");
        let back = import_json(&value.to_string()).unwrap();
        assert_eq!(back.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn csv_trades_columns_and_content() {
        let result = sample_result();
        let csv = export_trades_csv(&result.trades).unwrap();
        let mut lines = csv.lines();

        let header = lines.next().unwrap();
        assert_eq!(
            header,
            "feed,side,entry_price,opened,closed,bars_held,fills,gross_pnl,commission,net_pnl"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("0,long,12.000000,"));
        assert!(row.ends_with("1,2,14.00,1.00,13.00"));
    }

    #[test]
    fn csv_empty_trades_is_header_only() {
        let csv = export_trades_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn csv_equity_rows_per_tick() {
        let result = sample_result();
        let csv = export_equity_csv(&result.equity).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "datetime,cash,value");
        assert_eq!(lines[2], "2024-01-02 00:00:00,9988.00,10001.00");
    }

    #[test]
    fn markdown_report_has_metric_table() {
        let report = generate_report(&sample_result());
        assert!(report.starts_with("# Backtest Report"));
        assert!(report.contains("| Sharpe |"));
        assert!(report.contains("| Trades | 1 |"));
        assert!(report.contains("Final value 10001.00"));
    }

    #[test]
    fn markdown_report_names_the_skip() {
        let mut result = sample_result();
        result.skipped = Some("fast period not below slow".into());
        let report = generate_report(&result);
        assert!(report.contains("**Skipped**: fast period not below slow"));
        assert!(!report.contains("| Sharpe |"));
    }

    #[test]
    fn save_load_artifacts_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample_result();

        let run_dir = save_artifacts(&result, dir.path()).unwrap();
        assert!(run_dir.join("manifest.json").is_file());
        assert!(run_dir.join("trades.csv").is_file());
        assert!(run_dir.join("equity.csv").is_file());

        let back = load_artifacts(&run_dir).unwrap();
        assert_eq!(back.run_id, result.run_id);
        assert_eq!(back.equity.len(), 2);
    }
}
