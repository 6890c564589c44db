use crate::error::StrategyError;
use crate::indicators;
use crate::{vote, Strategy};
use configuration::AtrParams;
use core_types::{Candle, OrderSide, SignalMetadata, StrategyId, StrategySignal};
use serde_json::json;

/// Volatility breakout: ATR expands sharply while the close moves decisively on
/// the trend side of its SMA.
#[derive(Debug, Clone)]
pub struct Atr {
    params: AtrParams,
}

impl Atr {
    pub fn new(params: AtrParams) -> Result<Self, StrategyError> {
        if params.period == 0 || params.trend_period == 0 {
            return Err(StrategyError::InvalidParameters("ATR periods cannot be zero".to_string()));
        }
        if params.expansion <= 1.0 {
            return Err(StrategyError::InvalidParameters(format!(
                "ATR expansion ratio must exceed 1, got {}",
                params.expansion
            )));
        }
        Ok(Self { params })
    }
}

impl Strategy for Atr {
    fn id(&self) -> StrategyId {
        StrategyId::Atr
    }

    fn min_bars(&self) -> usize {
        (self.params.period + 2).max(self.params.trend_period)
    }

    fn evaluate(&self, symbol: &str, bars: &[Candle]) -> Result<Option<StrategySignal>, StrategyError> {
        let (Some(bar), true) = (bars.last(), bars.len() >= self.min_bars()) else {
            return Ok(None);
        };
        let items = indicators::data_items(bars)?;
        let atr = indicators::atr(&items, self.params.period)?;
        let closes = indicators::closes(bars)?;
        let n = closes.len();
        let (prev_atr, cur_atr) = (atr[n - 2], atr[n - 1]);
        let (prev_close, close) = (closes[n - 2], closes[n - 1]);
        if prev_atr <= 0.0 || prev_close <= 0.0 || cur_atr <= self.params.expansion * prev_atr {
            return Ok(None);
        }

        let change = (close - prev_close) / prev_close;
        if change.abs() * 100.0 <= self.params.min_move_pct {
            return Ok(None);
        }
        let sma = indicators::sma(&closes, self.params.trend_period)?[n - 1];
        let side = if change > 0.0 && close > sma {
            OrderSide::Buy
        } else if change < 0.0 && close < sma {
            OrderSide::Sell
        } else {
            return Ok(None);
        };

        let metadata = SignalMetadata::from([
            ("atr".to_string(), json!(cur_atr)),
            ("previous_atr".to_string(), json!(prev_atr)),
            ("change_pct".to_string(), json!(change * 100.0)),
        ]);
        Ok(Some(vote(
            self.id(),
            symbol,
            side,
            bar,
            indicators::confidence(change.abs() * 10.0)?,
            metadata,
        )))
    }
}
