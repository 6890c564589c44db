use crate::error::ConfigError;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub simulation: Simulation,
    pub backtest: BacktestSettings,
    pub live: LiveSettings,
    pub strategies: Strategies,
    pub logging: Logging,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate()?;
        if self.backtest.yield_every == 0 {
            return Err(ConfigError::ValidationError(
                "backtest.yield_every must be at least 1".to_string(),
            ));
        }
        if self.backtest.max_window_bars < self.backtest.min_history_bars {
            return Err(ConfigError::ValidationError(
                "backtest.max_window_bars cannot be below min_history_bars".to_string(),
            ));
        }
        if self.live.market_open >= self.live.market_close {
            return Err(ConfigError::ValidationError(
                "live.market_open must be earlier than live.market_close".to_string(),
            ));
        }
        if self.live.utc_offset_minutes.unsigned_abs() >= 24 * 60 {
            return Err(ConfigError::ValidationError(
                "live.utc_offset_minutes must be within +/-1439".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameters of the paper execution engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Simulation {
    pub initial_capital: Decimal,
    /// Flat fee charged on every executed order.
    pub brokerage_per_trade: Decimal,
    /// Price degradation applied at execution, in percent (0.1 means 0.1%).
    pub slippage_pct: Decimal,
    pub max_positions: usize,
    /// Largest notional of a single entry as a fraction of initial capital.
    pub max_position_size: Decimal,
    /// Whether a SELL without an open position opens a short.
    pub allow_short: bool,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            initial_capital: dec!(100000),
            brokerage_per_trade: dec!(20),
            slippage_pct: dec!(0.1),
            max_positions: 10,
            max_position_size: dec!(0.2),
            allow_short: false,
        }
    }
}

impl Simulation {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capital <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "simulation.initial_capital must be positive".to_string(),
            ));
        }
        if self.brokerage_per_trade < Decimal::ZERO || self.slippage_pct < Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "brokerage and slippage cannot be negative".to_string(),
            ));
        }
        if self.slippage_pct >= dec!(100) {
            return Err(ConfigError::ValidationError(
                "simulation.slippage_pct must be below 100".to_string(),
            ));
        }
        if self.max_positions == 0 {
            return Err(ConfigError::ValidationError(
                "simulation.max_positions must be at least 1".to_string(),
            ));
        }
        if self.max_position_size <= Decimal::ZERO || self.max_position_size > Decimal::ONE {
            return Err(ConfigError::ValidationError(
                "simulation.max_position_size must be within (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Turns an aggregated signal into an order: sizing and protective levels.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskManagement {
    /// Stop-loss distance from the signal price, in percent.
    pub stop_loss_pct: Decimal,
    /// Target distance from the signal price, in percent.
    pub target_pct: Decimal,
    /// Share of available cash committed per entry, in percent.
    pub position_size_pct: Decimal,
    /// Whether a SELL signal without an open position may open a short.
    pub allow_short: bool,
}

/// Knobs of the historical replay loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    /// Bars of history a symbol needs before its strategies are evaluated.
    pub min_history_bars: usize,
    /// The loop yields to the runtime every this many timestamps.
    pub yield_every: usize,
    /// Progress is logged every this many percent.
    pub progress_log_pct: usize,
    /// Trailing bars handed to the strategies at each step.
    pub max_window_bars: usize,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            min_history_bars: 30,
            yield_every: 10,
            progress_log_pct: 10,
            max_window_bars: 300,
        }
    }
}

/// Polling and market-hours parameters for live sessions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LiveSettings {
    pub poll_interval_secs: u64,
    pub closed_market_poll_secs: u64,
    pub error_backoff_secs: u64,
    /// How many days of bars each poll requests.
    pub lookback_days: i64,
    pub enforce_market_hours: bool,
    pub market_open: NaiveTime,
    pub market_close: NaiveTime,
    /// Offset of the exchange's local time from UTC. Also defines calendar days for daily P&L.
    pub utc_offset_minutes: i32,
    pub holidays: Vec<NaiveDate>,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            closed_market_poll_secs: 60,
            error_backoff_secs: 60,
            lookback_days: 5,
            enforce_market_hours: true,
            market_open: NaiveTime::from_hms_opt(9, 15, 0).unwrap_or_default(),
            market_close: NaiveTime::from_hms_opt(15, 30, 0).unwrap_or_default(),
            utc_offset_minutes: 330,
            holidays: Vec::new(),
        }
    }
}

/// Contains the parameter sets for all available strategies.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Strategies {
    pub rsi: RsiParams,
    pub macd: MacdParams,
    pub supertrend: SuperTrendParams,
    pub bollinger: BollingerParams,
    pub adx: AdxParams,
    pub atr: AtrParams,
    pub renko: RenkoParams,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RsiParams {
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for RsiParams {
    fn default() -> Self {
        Self { period: 14, oversold: 30.0, overbought: 70.0 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MacdParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
    pub confidence: f64,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self { fast_period: 12, slow_period: 26, signal_period: 9, confidence: 0.7 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SuperTrendParams {
    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub confidence: f64,
}

impl Default for SuperTrendParams {
    fn default() -> Self {
        Self { atr_period: 7, atr_multiplier: 3.0, confidence: 0.8 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BollingerParams {
    pub period: usize,
    pub std_dev: f64,
    pub confidence: f64,
}

impl Default for BollingerParams {
    fn default() -> Self {
        Self { period: 20, std_dev: 2.0, confidence: 0.6 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdxParams {
    pub period: usize,
    /// ADX level above which a trend counts as strong.
    pub threshold: f64,
    /// SMA period deciding the trend's direction.
    pub trend_period: usize,
}

impl Default for AdxParams {
    fn default() -> Self {
        Self { period: 14, threshold: 25.0, trend_period: 20 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AtrParams {
    pub period: usize,
    /// Required ratio of current to previous ATR.
    pub expansion: f64,
    /// Minimum bar-over-bar close move, in percent.
    pub min_move_pct: f64,
    pub trend_period: usize,
}

impl Default for AtrParams {
    fn default() -> Self {
        Self { period: 14, expansion: 1.2, min_move_pct: 1.0, trend_period: 20 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenkoParams {
    /// Brick size is `ATR(atr_period) * atr_multiplier`.
    pub atr_period: usize,
    pub atr_multiplier: f64,
    /// Trailing bricks that must all agree.
    pub lookback: usize,
    pub min_consecutive: usize,
}

impl Default for RenkoParams {
    fn default() -> Self {
        Self { atr_period: 14, atr_multiplier: 1.0, lookback: 3, min_consecutive: 2 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "tradesim.log".to_string(),
        }
    }
}
