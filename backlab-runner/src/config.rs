//! Serializable backtest configuration.

use backlab_core::broker::{Broker, BrokerConfig, CommissionInfo, SlippagePolicy};
use backlab_core::engine::RunMode;
use backlab_core::feed::Bar;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

/// Everything a config can get wrong, caught before the first bar.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("feed produces no bars")]
    EmptyFeed,
    #[error("start price must be positive, got {0}")]
    NonPositivePrice(f64),
    #[error("initial cash must be positive, got {0}")]
    NonPositiveCash(f64),
    #[error("order size must be positive, got {0}")]
    NonPositiveSize(f64),
    #[error("moving average periods must be nonzero")]
    ZeroPeriod,
    #[error("commission rate must be nonnegative, got {0}")]
    NegativeRate(f64),
    #[error("futures margin and multiplier must be positive")]
    InvalidFutures,
    #[error("slippage must be nonnegative, got {0}")]
    NegativeSlippage(f64),
}

/// Serializable configuration for a single backtest run.
///
/// This struct captures all parameters needed to reproduce a run: the bar
/// source, the strategy and its parameters, the broker settings, and the
/// engine mode. Two identical configs always produce the same [`RunId`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Where the bars come from
    pub feed: FeedConfig,

    /// Strategy and its parameters
    pub strategy: StrategyConfig,

    /// Broker settings (cash, commission, slippage)
    #[serde(default)]
    pub broker: BrokerSettings,

    /// How the engine computes node lines
    #[serde(default = "default_mode")]
    pub mode: RunMode,
}

fn default_mode() -> RunMode {
    RunMode::Incremental
}

impl RunConfig {
    /// Parses a config from TOML and validates it.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let toml_str = std::fs::read_to_string(path)?;
        Self::from_toml(&toml_str)
    }

    /// Computes a deterministic hash ID for this configuration.
    ///
    /// Two runs with identical configs share a RunId, which makes results
    /// content-addressable across sweeps and artifact directories.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).expect("RunConfig serialization failed");
        let hash = blake3::hash(json.as_bytes());
        format!("{}", hash.to_hex())
    }

    /// Rejects configs the engine or broker would refuse (or panic on)
    /// later. A fast > slow crossover is deliberately not an error here:
    /// the strategy declines it at start, which lets sweeps drop that
    /// combination without aborting the batch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.feed {
            FeedConfig::Synthetic {
                bars, start_price, ..
            } => {
                if *bars == 0 {
                    return Err(ConfigError::EmptyFeed);
                }
                if *start_price <= 0.0 {
                    return Err(ConfigError::NonPositivePrice(*start_price));
                }
            }
            FeedConfig::Inline { bars } => {
                if bars.is_empty() {
                    return Err(ConfigError::EmptyFeed);
                }
            }
        }
        match &self.strategy {
            StrategyConfig::BuyHold { size } => {
                if *size <= 0.0 {
                    return Err(ConfigError::NonPositiveSize(*size));
                }
            }
            StrategyConfig::MaCross { fast, slow, size } => {
                if *fast == 0 || *slow == 0 {
                    return Err(ConfigError::ZeroPeriod);
                }
                if *size <= 0.0 {
                    return Err(ConfigError::NonPositiveSize(*size));
                }
            }
        }
        self.broker.validate()
    }
}

/// Bar source configuration (serializable enum).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedConfig {
    /// Seeded random walk of daily bars.
    Synthetic {
        seed: u64,
        bars: usize,
        #[serde(default = "default_start_price")]
        start_price: f64,
    },

    /// Bars written out verbatim in the config file.
    Inline { bars: Vec<Bar> },
}

fn default_start_price() -> f64 {
    100.0
}

/// Strategy configuration (serializable enum).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyConfig {
    /// Buy at the first warmed-up bar and hold to the end.
    BuyHold { size: f64 },

    /// Fast/slow moving-average crossover: long above, flat below.
    MaCross { fast: usize, slow: usize, size: f64 },
}

/// Broker settings applied before the first bar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSettings {
    pub cash: f64,

    #[serde(default)]
    pub commission: CommissionSettings,

    #[serde(default)]
    pub slippage: SlippageSettings,

    /// Let market orders created during a bar fill at that bar's close.
    #[serde(default)]
    pub cheat_on_close: bool,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            cash: 10_000.0,
            commission: CommissionSettings::default(),
            slippage: SlippageSettings::default(),
            cheat_on_close: false,
        }
    }
}

impl BrokerSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.cash <= 0.0 {
            return Err(ConfigError::NonPositiveCash(self.cash));
        }
        match self.commission {
            CommissionSettings::None => {}
            CommissionSettings::Stocks { rate } => {
                if rate < 0.0 {
                    return Err(ConfigError::NegativeRate(rate));
                }
            }
            CommissionSettings::Futures { margin, mult, .. } => {
                if margin <= 0.0 || mult <= 0.0 {
                    return Err(ConfigError::InvalidFutures);
                }
            }
        }
        match self.slippage {
            SlippageSettings::None => {}
            SlippageSettings::Percentage { perc } => {
                if perc < 0.0 {
                    return Err(ConfigError::NegativeSlippage(perc));
                }
            }
            SlippageSettings::Fixed { fixed } => {
                if fixed < 0.0 {
                    return Err(ConfigError::NegativeSlippage(fixed));
                }
            }
        }
        Ok(())
    }

    /// Builds a broker from validated settings.
    pub fn build(&self) -> Broker {
        let mut broker = Broker::new(BrokerConfig {
            cash: self.cash,
            slippage: self.slippage.to_policy(),
            cheat_on_close: self.cheat_on_close,
        });
        broker.set_commission(self.commission.to_info());
        broker
    }
}

/// Commission scheme configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionSettings {
    /// No commission
    None,

    /// Percentage of traded value (0.001 = 10 bps)
    Stocks { rate: f64 },

    /// Fixed fee per contract, margin per contract, point multiplier
    Futures { commission: f64, margin: f64, mult: f64 },
}

impl Default for CommissionSettings {
    fn default() -> Self {
        Self::None
    }
}

impl CommissionSettings {
    pub fn to_info(self) -> CommissionInfo {
        match self {
            Self::None => CommissionInfo::default(),
            Self::Stocks { rate } => CommissionInfo::stocks(rate),
            Self::Futures {
                commission,
                margin,
                mult,
            } => CommissionInfo::futures(commission, margin, mult),
        }
    }
}

/// Slippage configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlippageSettings {
    /// No slippage (ideal case)
    None,

    /// Fraction of price, against the order (0.0005 = 5 bps)
    Percentage { perc: f64 },

    /// Absolute price offset per unit, against the order
    Fixed { fixed: f64 },
}

impl Default for SlippageSettings {
    fn default() -> Self {
        Self::None
    }
}

impl SlippageSettings {
    pub fn to_policy(self) -> SlippagePolicy {
        match self {
            Self::None => SlippagePolicy::none(),
            Self::Percentage { perc } => SlippagePolicy::percentage(perc),
            Self::Fixed { fixed } => SlippagePolicy::fixed(fixed),
        }
    }
}
