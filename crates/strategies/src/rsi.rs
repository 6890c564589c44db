use crate::error::StrategyError;
use crate::indicators;
use crate::{vote, Strategy};
use configuration::RsiParams;
use core_types::{Candle, OrderSide, SignalMetadata, StrategyId, StrategySignal};
use serde_json::json;

/// RSI threshold crosses: into oversold is a BUY, into overbought a SELL.
///
/// Confidence grows with how far past the threshold the RSI lands.
#[derive(Debug, Clone)]
pub struct Rsi {
    params: RsiParams,
}

impl Rsi {
    pub fn new(params: RsiParams) -> Result<Self, StrategyError> {
        if params.period == 0 {
            return Err(StrategyError::InvalidParameters("RSI period cannot be zero".to_string()));
        }
        if !(0.0 < params.oversold && params.oversold < params.overbought && params.overbought < 100.0) {
            return Err(StrategyError::InvalidParameters(format!(
                "RSI thresholds must satisfy 0 < oversold < overbought < 100, got {} / {}",
                params.oversold, params.overbought
            )));
        }
        Ok(Self { params })
    }
}

impl Strategy for Rsi {
    fn id(&self) -> StrategyId {
        StrategyId::Rsi
    }

    fn min_bars(&self) -> usize {
        self.params.period + 2
    }

    fn evaluate(&self, symbol: &str, bars: &[Candle]) -> Result<Option<StrategySignal>, StrategyError> {
        let (Some(bar), true) = (bars.last(), bars.len() >= self.min_bars()) else {
            return Ok(None);
        };
        let series = indicators::rsi(&indicators::closes(bars)?, self.params.period)?;
        let (prev, cur) = (series[series.len() - 2], series[series.len() - 1]);

        let (side, raw_confidence) = if prev >= self.params.oversold && cur < self.params.oversold {
            (OrderSide::Buy, (self.params.oversold - cur) / self.params.oversold)
        } else if prev <= self.params.overbought && cur > self.params.overbought {
            (OrderSide::Sell, (cur - self.params.overbought) / (100.0 - self.params.overbought))
        } else {
            return Ok(None);
        };

        let metadata = SignalMetadata::from([
            ("rsi".to_string(), json!(cur)),
            ("previous_rsi".to_string(), json!(prev)),
        ]);
        Ok(Some(vote(
            self.id(),
            symbol,
            side,
            bar,
            indicators::confidence(raw_confidence)?,
            metadata,
        )))
    }
}
