use crate::error::StrategyError;
use crate::indicators::{self, Trend};
use crate::{vote, Strategy};
use configuration::RenkoParams;
use core_types::{Candle, OrderSide, SignalMetadata, StrategyId, StrategySignal};
use serde_json::json;

/// Renko brick runs. Votes only when the current bar completes a brick and the
/// trailing bricks all point the same way.
///
/// Brick size is the window's latest ATR times the configured multiplier, so the
/// grid adapts to volatility.
#[derive(Debug, Clone)]
pub struct Renko {
    params: RenkoParams,
}

impl Renko {
    pub fn new(params: RenkoParams) -> Result<Self, StrategyError> {
        if params.atr_period == 0 || params.lookback == 0 {
            return Err(StrategyError::InvalidParameters(
                "Renko atr_period and lookback cannot be zero".to_string(),
            ));
        }
        if params.atr_multiplier <= 0.0 {
            return Err(StrategyError::InvalidParameters(
                "Renko atr_multiplier must be positive".to_string(),
            ));
        }
        Ok(Self { params })
    }
}

impl Strategy for Renko {
    fn id(&self) -> StrategyId {
        StrategyId::Renko
    }

    fn min_bars(&self) -> usize {
        self.params.atr_period + self.params.lookback + 3
    }

    fn evaluate(&self, symbol: &str, bars: &[Candle]) -> Result<Option<StrategySignal>, StrategyError> {
        let (Some(bar), true) = (bars.last(), bars.len() >= self.min_bars()) else {
            return Ok(None);
        };
        let items = indicators::data_items(bars)?;
        let atr = indicators::atr(&items, self.params.atr_period)?;
        let brick_size = atr[atr.len() - 1] * self.params.atr_multiplier;
        if !(brick_size.is_finite() && brick_size > 0.0) {
            return Ok(None);
        }
        let bricks = indicators::renko(&indicators::closes(bars)?, brick_size)?;

        let Some(last) = bricks.last() else {
            return Ok(None);
        };
        if last.bar_index != bars.len() - 1 || bricks.len() < self.params.lookback {
            return Ok(None);
        }
        let recent = &bricks[bricks.len() - self.params.lookback..];
        if recent.iter().any(|brick| brick.trend != last.trend) {
            return Ok(None);
        }
        let consecutive = bricks.iter().rev().take_while(|brick| brick.trend == last.trend).count();
        if consecutive < self.params.min_consecutive {
            return Ok(None);
        }

        let side = match last.trend {
            Trend::Up => OrderSide::Buy,
            Trend::Down => OrderSide::Sell,
        };
        let metadata = SignalMetadata::from([
            ("brick_size".to_string(), json!(brick_size)),
            ("consecutive_bricks".to_string(), json!(consecutive)),
        ]);
        Ok(Some(vote(
            self.id(),
            symbol,
            side,
            bar,
            indicators::confidence(consecutive as f64 / 5.0)?,
            metadata,
        )))
    }
}
