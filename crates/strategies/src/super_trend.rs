use crate::error::StrategyError;
use crate::indicators::{self, Trend};
use crate::{vote, Strategy};
use configuration::SuperTrendParams;
use core_types::{Candle, OrderSide, SignalMetadata, StrategyId, StrategySignal};
use serde_json::json;

/// Supertrend direction flips. A flip to an uptrend is a BUY.
#[derive(Debug, Clone)]
pub struct SuperTrend {
    params: SuperTrendParams,
}

impl SuperTrend {
    pub fn new(params: SuperTrendParams) -> Result<Self, StrategyError> {
        if params.atr_period == 0 {
            return Err(StrategyError::InvalidParameters("ATR period cannot be zero".to_string()));
        }
        if params.atr_multiplier <= 0.0 {
            return Err(StrategyError::InvalidParameters(
                "ATR multiplier must be positive".to_string(),
            ));
        }
        Ok(Self { params })
    }
}

impl Strategy for SuperTrend {
    fn id(&self) -> StrategyId {
        StrategyId::Supertrend
    }

    fn min_bars(&self) -> usize {
        self.params.atr_period + 3
    }

    fn evaluate(&self, symbol: &str, bars: &[Candle]) -> Result<Option<StrategySignal>, StrategyError> {
        let (Some(bar), true) = (bars.last(), bars.len() >= self.min_bars()) else {
            return Ok(None);
        };
        let items = indicators::data_items(bars)?;
        let points = indicators::supertrend(&items, self.params.atr_period, self.params.atr_multiplier)?;
        let (prev, cur) = (points[points.len() - 2], points[points.len() - 1]);

        let side = match (prev.trend, cur.trend) {
            (Trend::Down, Trend::Up) => OrderSide::Buy,
            (Trend::Up, Trend::Down) => OrderSide::Sell,
            _ => return Ok(None),
        };

        let metadata = SignalMetadata::from([("supertrend".to_string(), json!(cur.value))]);
        Ok(Some(vote(
            self.id(),
            symbol,
            side,
            bar,
            indicators::confidence(self.params.confidence)?,
            metadata,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bars, replay};

    #[test]
    fn test_breakdown_flips_to_sell_once() {
        let mut closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        closes.extend((0..10).map(|i| 110.0 - i as f64 * 4.0));

        let signals = replay(&SuperTrend::new(SuperTrendParams::default()).unwrap(), &bars(&closes));
        assert_eq!(signals.len(), 1);
        assert!(signals[0].0 >= 20);
        assert_eq!(signals[0].1.side, OrderSide::Sell);
    }

    #[test]
    fn test_rejects_zero_period() {
        let params = SuperTrendParams { atr_period: 0, ..SuperTrendParams::default() };
        assert!(SuperTrend::new(params).is_err());
    }
}
