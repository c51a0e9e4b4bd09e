//! BackLab CLI — run, sweep, and demo commands.
//!
//! Commands:
//! - `run` — execute a backtest from a TOML config file and save artifacts
//! - `sweep` — fan a period grid out over a shared feed and rank by Sharpe
//! - `demo` — synthetic end-to-end crossover run printing metrics

use anyhow::{bail, Result};
use backlab_runner::{
    generate_report, run_single_backtest, save_artifacts, sweep, BacktestResult, ParamGrid,
    RunConfig, StrategyConfig, SweepOutcome,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "backlab",
    about = "BackLab CLI — event-driven backtesting engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Output directory for run artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Also write a Markdown report into the run directory.
        #[arg(long, default_value_t = false)]
        report: bool,
    },
    /// Sweep crossover periods from a grid file and rank runs by Sharpe.
    Sweep {
        /// Base TOML config. Feed, broker, and mode come from here;
        /// the grid replaces the strategy section per combination.
        #[arg(long)]
        config: PathBuf,

        /// TOML grid file with fast_periods and slow_periods arrays.
        #[arg(long)]
        grid: PathBuf,

        /// How many ranked rows to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Save artifacts for the best run to this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Run a synthetic crossover backtest end to end and print metrics.
    Demo {
        /// Seed for the synthetic random walk.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Number of daily bars to generate.
        #[arg(long, default_value_t = 504)]
        bars: usize,

        /// Fast moving-average period.
        #[arg(long, default_value_t = 10)]
        fast: usize,

        /// Slow moving-average period.
        #[arg(long, default_value_t = 50)]
        slow: usize,

        /// Starting cash.
        #[arg(long, default_value_t = 100000.0)]
        cash: f64,

        /// Replay the run through the batch path instead of bar by bar.
        #[arg(long, default_value_t = false)]
        vectorized: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            output_dir,
            report,
        } => run_backtest_cmd(&config, &output_dir, report),
        Commands::Sweep {
            config,
            grid,
            top,
            output_dir,
        } => run_sweep_cmd(&config, &grid, top, output_dir),
        Commands::Demo {
            seed,
            bars,
            fast,
            slow,
            cash,
            vectorized,
        } => run_demo_cmd(seed, bars, fast, slow, cash, vectorized),
    }
}

fn run_backtest_cmd(config_path: &PathBuf, output_dir: &PathBuf, report: bool) -> Result<()> {
    let config = RunConfig::from_file(config_path)?;
    let result = run_single_backtest(&config)?;

    print_summary(&result);

    let run_dir = save_artifacts(&result, output_dir)?;
    if report {
        std::fs::write(run_dir.join("report.md"), generate_report(&result))?;
    }
    println!("Artifacts saved to: {}", run_dir.display());

    Ok(())
}

fn run_sweep_cmd(
    config_path: &PathBuf,
    grid_path: &PathBuf,
    top: usize,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let base = RunConfig::from_file(config_path)?;
    let grid = ParamGrid::from_file(grid_path)?;
    if grid.is_empty() {
        bail!("grid is empty: fast_periods and slow_periods must both be non-empty");
    }

    println!(
        "Sweeping {} combination(s): {} fast x {} slow",
        grid.len(),
        grid.fast_periods.len(),
        grid.slow_periods.len()
    );

    let outcome = sweep(&grid, &base)?;
    print_leaderboard(&outcome, top);

    if let (Some(dir), Some(best)) = (output_dir, outcome.best()) {
        let run_dir = save_artifacts(best, &dir)?;
        println!("Best run artifacts saved to: {}", run_dir.display());
    }

    Ok(())
}

fn run_demo_cmd(
    seed: u64,
    bars: usize,
    fast: usize,
    slow: usize,
    cash: f64,
    vectorized: bool,
) -> Result<()> {
    let mode = if vectorized { "VECTORIZED" } else { "INCREMENTAL" };

    // The demo drives the same TOML config path as `run`.
    let toml_str = format!(
        r#"mode = "{mode}"

[feed]
type = "SYNTHETIC"
seed = {seed}
bars = {bars}

[strategy]
type = "MA_CROSS"
fast = {fast}
slow = {slow}
size = 10.0

[broker]
cash = {cash}
"#
    );

    let config = RunConfig::from_toml(&toml_str)?;
    let result = run_single_backtest(&config)?;
    print_summary(&result);

    Ok(())
}

fn print_leaderboard(outcome: &SweepOutcome, top: usize) {
    println!();
    println!("=== Sweep Results ===");
    println!("Completed:      {}", outcome.results.len());
    println!("Skipped:        {}", outcome.skipped.len());

    if !outcome.results.is_empty() {
        println!();
        println!(
            "{:<5} {:>5} {:>5} {:>8} {:>9} {:>9} {:>7}",
            "Rank", "Fast", "Slow", "Sharpe", "Return", "MaxDD", "Trades"
        );
        println!("{}", "-".repeat(54));
        for (i, result) in outcome.ranked().iter().take(top).enumerate() {
            if let StrategyConfig::MaCross { fast, slow, .. } = result.config.strategy {
                println!(
                    "{:<5} {:>5} {:>5} {:>8.3} {:>8.2}% {:>8.2}% {:>7}",
                    i + 1,
                    fast,
                    slow,
                    result.metrics.sharpe,
                    result.metrics.total_return * 100.0,
                    result.metrics.max_drawdown * 100.0,
                    result.metrics.trade_count
                );
            }
        }
    }

    if !outcome.skipped.is_empty() {
        println!();
        println!("Skipped combinations:");
        for (run_id, reason) in &outcome.skipped {
            println!("  {}: {reason}", &run_id[..12]);
        }
    }
    println!();
}

fn print_summary(result: &BacktestResult) {
    println!();
    println!("=== Backtest Result ===");
    println!("Run ID:         {}", &result.run_id[..12]);
    println!("Ticks:          {}", result.ticks);
    println!("Trades:         {}", result.metrics.trade_count);
    if let (Some(first), Some(last)) = (result.equity.first(), result.equity.last()) {
        println!(
            "Period:         {} to {}",
            first.datetime.date(),
            last.datetime.date()
        );
    }
    if let Some(reason) = &result.skipped {
        println!();
        println!("Strategy declined to trade: {reason}");
        println!();
        return;
    }
    println!();
    println!("--- Performance ---");
    println!(
        "Total Return:   {:.2}%",
        result.metrics.total_return * 100.0
    );
    println!("CAGR:           {:.2}%", result.metrics.cagr * 100.0);
    println!("Sharpe:         {:.3}", result.metrics.sharpe);
    println!(
        "Max Drawdown:   {:.2}%",
        result.metrics.max_drawdown * 100.0
    );
    println!("Win Rate:       {:.1}%", result.metrics.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", result.metrics.profit_factor);
    println!(
        "Final Value:    {:.2} (started {:.2})",
        result.final_value, result.initial_cash
    );
    println!();
}
