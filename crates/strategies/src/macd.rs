use crate::error::StrategyError;
use crate::indicators;
use crate::{vote, Strategy};
use configuration::MacdParams;
use core_types::{Candle, OrderSide, SignalMetadata, StrategyId, StrategySignal};
use serde_json::json;

/// MACD line crossing its signal line. Upward cross is a BUY.
#[derive(Debug, Clone)]
pub struct Macd {
    params: MacdParams,
}

impl Macd {
    pub fn new(params: MacdParams) -> Result<Self, StrategyError> {
        if params.fast_period == 0 || params.signal_period == 0 {
            return Err(StrategyError::InvalidParameters("MACD periods cannot be zero".to_string()));
        }
        if params.fast_period >= params.slow_period {
            return Err(StrategyError::InvalidParameters(format!(
                "MACD fast period ({}) must be shorter than slow period ({})",
                params.fast_period, params.slow_period
            )));
        }
        Ok(Self { params })
    }
}

impl Strategy for Macd {
    fn id(&self) -> StrategyId {
        StrategyId::Macd
    }

    fn min_bars(&self) -> usize {
        self.params.slow_period + self.params.signal_period
    }

    fn evaluate(&self, symbol: &str, bars: &[Candle]) -> Result<Option<StrategySignal>, StrategyError> {
        let (Some(bar), true) = (bars.last(), bars.len() >= self.min_bars()) else {
            return Ok(None);
        };
        let series = indicators::macd(
            &indicators::closes(bars)?,
            self.params.fast_period,
            self.params.slow_period,
            self.params.signal_period,
        )?;
        let (prev, cur) = (&series[series.len() - 2], &series[series.len() - 1]);

        let side = if prev.macd <= prev.signal && cur.macd > cur.signal {
            OrderSide::Buy
        } else if prev.macd >= prev.signal && cur.macd < cur.signal {
            OrderSide::Sell
        } else {
            return Ok(None);
        };

        let metadata = SignalMetadata::from([
            ("macd".to_string(), json!(cur.macd)),
            ("signal".to_string(), json!(cur.signal)),
            ("histogram".to_string(), json!(cur.histogram)),
        ]);
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
    use rust_decimal_macros::dec;

    #[test]
    fn test_reversal_after_decline_crosses_up() {
        let mut closes: Vec<f64> = (0..60).map(|i| 130.0 - i as f64 * 0.5).collect();
        let bottom = closes[59];
        closes.extend((1..=10).map(|i| bottom + i as f64 * 2.0));

        let signals = replay(&Macd::new(MacdParams::default()).unwrap(), &bars(&closes));
        assert!(!signals.is_empty());
        assert!(signals.iter().all(|(_, s)| s.side == OrderSide::Buy));
        assert!(signals[0].0 >= 60);
        assert_eq!(signals[0].1.confidence, dec!(0.7));
    }

    #[test]
    fn test_rejects_fast_not_below_slow() {
        let params = MacdParams { fast_period: 26, slow_period: 12, ..MacdParams::default() };
        assert!(Macd::new(params).is_err());
    }
}
