use crate::error::StrategyError;
use crate::indicators;
use crate::{vote, Strategy};
use configuration::AdxParams;
use core_types::{Candle, OrderSide, SignalMetadata, StrategyId, StrategySignal};
use serde_json::json;

/// ADX rising through its threshold marks the start of a strong trend. The
/// close against its SMA decides the direction.
#[derive(Debug, Clone)]
pub struct Adx {
    params: AdxParams,
}

impl Adx {
    pub fn new(params: AdxParams) -> Result<Self, StrategyError> {
        if params.period == 0 || params.trend_period == 0 {
            return Err(StrategyError::InvalidParameters("ADX periods cannot be zero".to_string()));
        }
        if !(0.0..100.0).contains(&params.threshold) {
            return Err(StrategyError::InvalidParameters(format!(
                "ADX threshold must be within [0, 100), got {}",
                params.threshold
            )));
        }
        Ok(Self { params })
    }
}

impl Strategy for Adx {
    fn id(&self) -> StrategyId {
        StrategyId::Adx
    }

    fn min_bars(&self) -> usize {
        (2 * self.params.period + 1).max(self.params.trend_period)
    }

    fn evaluate(&self, symbol: &str, bars: &[Candle]) -> Result<Option<StrategySignal>, StrategyError> {
        let (Some(bar), true) = (bars.last(), bars.len() >= self.min_bars()) else {
            return Ok(None);
        };
        let items = indicators::data_items(bars)?;
        let adx = indicators::adx(&items, self.params.period)?;
        let n = adx.len();
        let (Some(prev), Some(cur)) = (adx[n - 2], adx[n - 1]) else {
            return Ok(None);
        };
        if !(prev <= self.params.threshold && cur > self.params.threshold) {
            return Ok(None);
        }

        let closes = indicators::closes(bars)?;
        let sma = indicators::sma(&closes, self.params.trend_period)?[n - 1];
        let close = closes[n - 1];
        let side = if close > sma {
            OrderSide::Buy
        } else if close < sma {
            OrderSide::Sell
        } else {
            return Ok(None);
        };

        let metadata = SignalMetadata::from([
            ("adx".to_string(), json!(cur)),
            ("sma".to_string(), json!(sma)),
        ]);
        Ok(Some(vote(
            self.id(),
            symbol,
            side,
            bar,
            indicators::confidence((cur - self.params.threshold) / 50.0)?,
            metadata,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bars, replay};

    #[test]
    fn test_trend_emerging_from_chop_is_signalled_once() {
        let mut closes: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
        closes.extend((1..=20).map(|i| 101.0 + i as f64 * 2.0));

        let signals = replay(&Adx::new(AdxParams::default()).unwrap(), &bars(&closes));
        assert_eq!(signals.len(), 1);
        assert!(signals[0].0 >= 30);
        assert_eq!(signals[0].1.side, OrderSide::Buy);
        assert!(signals[0].1.metadata["adx"].as_f64().unwrap() > 25.0);
    }

    #[test]
    fn test_min_bars_covers_adx_warm_up() {
        let strategy = Adx::new(AdxParams::default()).unwrap();
        assert_eq!(strategy.min_bars(), 29);
    }
}
