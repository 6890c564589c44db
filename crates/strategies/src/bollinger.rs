use crate::error::StrategyError;
use crate::indicators;
use crate::{vote, Strategy};
use configuration::BollingerParams;
use core_types::{Candle, OrderSide, SignalMetadata, StrategyId, StrategySignal};
use serde_json::json;

/// Close crossing a Bollinger band edge: down through the lower band is a BUY,
/// up through the upper band a SELL.
#[derive(Debug, Clone)]
pub struct Bollinger {
    params: BollingerParams,
}

impl Bollinger {
    pub fn new(params: BollingerParams) -> Result<Self, StrategyError> {
        if params.period < 2 {
            return Err(StrategyError::InvalidParameters(
                "Bollinger period must be at least 2".to_string(),
            ));
        }
        if params.std_dev <= 0.0 {
            return Err(StrategyError::InvalidParameters(
                "Bollinger std_dev must be positive".to_string(),
            ));
        }
        Ok(Self { params })
    }
}

impl Strategy for Bollinger {
    fn id(&self) -> StrategyId {
        StrategyId::Bollinger
    }

    fn min_bars(&self) -> usize {
        self.params.period + 1
    }

    fn evaluate(&self, symbol: &str, bars: &[Candle]) -> Result<Option<StrategySignal>, StrategyError> {
        let (Some(bar), true) = (bars.last(), bars.len() >= self.min_bars()) else {
            return Ok(None);
        };
        let closes = indicators::closes(bars)?;
        let bands = indicators::bollinger(&closes, self.params.period, self.params.std_dev)?;
        let n = closes.len();
        let (prev_close, close) = (closes[n - 2], closes[n - 1]);
        let (prev, cur) = (&bands[n - 2], &bands[n - 1]);

        let side = if prev_close > prev.lower && close <= cur.lower {
            OrderSide::Buy
        } else if prev_close < prev.upper && close >= cur.upper {
            OrderSide::Sell
        } else {
            return Ok(None);
        };

        let metadata = SignalMetadata::from([
            ("upper".to_string(), json!(cur.upper)),
            ("middle".to_string(), json!(cur.average)),
            ("lower".to_string(), json!(cur.lower)),
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
