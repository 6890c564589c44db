use crate::error::ConfigError;
use crate::settings::{RiskManagement, Simulation};
use chrono::NaiveDate;
use core_types::{StrategyId, TradingMode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// The request that starts an automated trading session.
///
/// Accepted as-is from callers (CLI, JSON); nothing is started until
/// [`SessionConfig::validate`] passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub session_id: String,
    pub symbols: Vec<String>,
    pub initial_capital: Decimal,
    /// Stop-loss distance from entry, in percent.
    pub stop_loss_pct: Decimal,
    /// Target distance from entry, in percent.
    pub target_pct: Decimal,
    pub max_positions: usize,
    /// Share of available cash committed per entry, in percent.
    pub position_size_pct: Decimal,
    /// Strategy names; matched case-insensitively.
    pub strategies: Vec<String>,
    pub mode: TradingMode,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Bar resolution passed through to the price-bar source (e.g. "5" for 5 minutes).
    pub timeframe: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: "default".to_string(),
            symbols: Vec::new(),
            initial_capital: dec!(100000),
            stop_loss_pct: dec!(2),
            target_pct: dec!(4),
            max_positions: 5,
            position_size_pct: dec!(20),
            strategies: StrategyId::ALL.iter().map(|id| id.as_str().to_string()).collect(),
            mode: TradingMode::Historical,
            start_date: None,
            end_date: None,
            timeframe: "5".to_string(),
        }
    }
}

impl SessionConfig {
    /// Checks every field against the accepted ranges. Rejections are synchronous;
    /// an invalid request never creates a session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_id.trim().is_empty() {
            return invalid("session_id cannot be empty");
        }
        if self.symbols.is_empty() || self.symbols.iter().any(|s| s.trim().is_empty()) {
            return invalid("at least one non-empty symbol is required");
        }
        if self.initial_capital < dec!(10000) {
            return invalid("initial_capital must be at least 10000");
        }
        if self.stop_loss_pct < dec!(0.1) || self.stop_loss_pct > dec!(10) {
            return invalid("stop_loss_pct must be between 0.1 and 10");
        }
        if self.target_pct < dec!(0.5) || self.target_pct > dec!(20) {
            return invalid("target_pct must be between 0.5 and 20");
        }
        if !(1..=10).contains(&self.max_positions) {
            return invalid("max_positions must be between 1 and 10");
        }
        if self.position_size_pct < dec!(5) || self.position_size_pct > dec!(50) {
            return invalid("position_size_pct must be between 5 and 50");
        }
        if self.timeframe.trim().is_empty() {
            return invalid("timeframe cannot be empty");
        }
        self.strategy_ids()?;

        if self.mode == TradingMode::Historical {
            match (self.start_date, self.end_date) {
                (Some(start), Some(end)) if start > end => {
                    return invalid("start_date must not be after end_date");
                }
                (Some(_), Some(_)) => {}
                _ => return invalid("start_date and end_date are required for historical mode"),
            }
        }
        Ok(())
    }

    /// Resolves the requested strategy names, preserving order and dropping duplicates.
    pub fn strategy_ids(&self) -> Result<Vec<StrategyId>, ConfigError> {
        if self.strategies.is_empty() {
            return invalid("at least one strategy is required");
        }
        let mut ids = Vec::with_capacity(self.strategies.len());
        for name in &self.strategies {
            let id = name.parse::<StrategyId>().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "unknown strategy '{}'; available: {}",
                    name,
                    StrategyId::ALL.map(|id| id.as_str()).join(", ")
                ))
            })?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Execution parameters for this session: limits come from the request,
    /// frictions from the base configuration.
    pub fn simulation(&self, base: &Simulation) -> Simulation {
        Simulation {
            initial_capital: self.initial_capital,
            max_positions: self.max_positions,
            max_position_size: self.position_size_pct / dec!(100),
            ..base.clone()
        }
    }

    pub fn risk_management(&self, base: &Simulation) -> RiskManagement {
        RiskManagement {
            stop_loss_pct: self.stop_loss_pct,
            target_pct: self.target_pct,
            position_size_pct: self.position_size_pct,
            allow_short: base.allow_short,
        }
    }
}

fn invalid<T>(message: &str) -> Result<T, ConfigError> {
    Err(ConfigError::ValidationError(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn historical() -> SessionConfig {
        SessionConfig {
            symbols: vec!["NSE:SBIN-EQ".to_string()],
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 31),
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_default_request_with_dates_is_valid() {
        assert!(historical().validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let cases = [
            SessionConfig { initial_capital: dec!(5000), ..historical() },
            SessionConfig { stop_loss_pct: dec!(12), ..historical() },
            SessionConfig { target_pct: dec!(0.2), ..historical() },
            SessionConfig { max_positions: 0, ..historical() },
            SessionConfig { position_size_pct: dec!(60), ..historical() },
            SessionConfig { symbols: vec![], ..historical() },
        ];
        for case in cases {
            assert!(
                matches!(case.validate(), Err(ConfigError::ValidationError(_))),
                "expected rejection for {case:?}"
            );
        }
    }

    #[test]
    fn test_rejects_inverted_or_missing_dates() {
        let inverted = SessionConfig {
            start_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            ..historical()
        };
        assert!(inverted.validate().is_err());

        let missing = SessionConfig { end_date: None, ..historical() };
        assert!(missing.validate().is_err());

        let live = SessionConfig {
            mode: TradingMode::Live,
            start_date: None,
            end_date: None,
            ..historical()
        };
        assert!(live.validate().is_ok());
    }

    #[test]
    fn test_strategy_names_are_normalized() {
        let config = SessionConfig {
            strategies: vec!["rsi".into(), "Macd".into(), "RSI".into()],
            ..historical()
        };
        assert_eq!(config.strategy_ids().unwrap(), vec![StrategyId::Rsi, StrategyId::Macd]);

        let unknown = SessionConfig {
            strategies: vec!["RSI".into(), "ICHIMOKU".into()],
            ..historical()
        };
        assert!(unknown.validate().is_err());
    }

    #[test]
    fn test_session_overrides_position_limits() {
        let config = SessionConfig {
            max_positions: 3,
            position_size_pct: dec!(25),
            initial_capital: dec!(50000),
            ..historical()
        };
        let simulation = config.simulation(&Simulation::default());
        assert_eq!(simulation.max_positions, 3);
        assert_eq!(simulation.max_position_size, dec!(0.25));
        assert_eq!(simulation.initial_capital, dec!(50000));
        assert_eq!(simulation.brokerage_per_trade, dec!(20));
    }

    #[test]
    fn test_deserializes_partial_json_request() {
        let config: SessionConfig = serde_json::from_str(
            r#"{"symbols":["NSE:TCS-EQ"],"mode":"LIVE","strategies":["rsi","adx"]}"#,
        )
        .unwrap();
        assert_eq!(config.mode, TradingMode::Live);
        assert_eq!(config.session_id, "default");
        assert!(config.validate().is_ok());
    }
}
