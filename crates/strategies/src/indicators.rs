//! Indicator series over a bar window.
//!
//! RSI, MACD, Bollinger Bands, ATR and SMA come from the `ta` crate. Supertrend,
//! ADX and Renko are not provided there and are computed here. Every function
//! returns one value per input bar so callers can compare the last two.

use crate::error::StrategyError;
use core_types::Candle;
use rust_decimal::prelude::*;
use ta::indicators::{
    AverageTrueRange, BollingerBands, BollingerBandsOutput, MovingAverageConvergenceDivergence,
    MovingAverageConvergenceDivergenceOutput, RelativeStrengthIndex, SimpleMovingAverage,
};
use ta::{Close, DataItem, High, Low, Next};

fn init_error(name: &str, e: ta::errors::TaError) -> StrategyError {
    StrategyError::InvalidParameters(format!("Failed to initialize {}: {:?}", name, e))
}

pub fn to_f64(value: Decimal, field: &str) -> Result<f64, StrategyError> {
    value
        .to_f64()
        .ok_or_else(|| StrategyError::IndicatorError(format!("Failed to convert {} to f64", field)))
}

/// Converts an indicator reading to a `Decimal` rounded to 4 places.
pub fn to_decimal(value: f64) -> Result<Decimal, StrategyError> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(4))
        .ok_or_else(|| StrategyError::IndicatorError(format!("Indicator value {} is not finite", value)))
}

/// Clamps a raw confidence into `[0, 1]`.
pub fn confidence(value: f64) -> Result<Decimal, StrategyError> {
    to_decimal(value.clamp(0.0, 1.0))
}

pub fn closes(bars: &[Candle]) -> Result<Vec<f64>, StrategyError> {
    bars.iter().map(|bar| to_f64(bar.close, "close")).collect()
}

/// Converts bars to `ta` data items. Malformed bars (e.g. low above high) are an error.
pub fn data_items(bars: &[Candle]) -> Result<Vec<DataItem>, StrategyError> {
    bars.iter()
        .map(|bar| {
            DataItem::builder()
                .open(to_f64(bar.open, "open")?)
                .high(to_f64(bar.high, "high")?)
                .low(to_f64(bar.low, "low")?)
                .close(to_f64(bar.close, "close")?)
                .volume(to_f64(bar.volume, "volume")?)
                .build()
                .map_err(|e| {
                    StrategyError::IndicatorError(format!(
                        "Malformed bar at {}: {:?}",
                        bar.timestamp, e
                    ))
                })
        })
        .collect()
}

pub fn rsi(closes: &[f64], period: usize) -> Result<Vec<f64>, StrategyError> {
    let mut rsi = RelativeStrengthIndex::new(period).map_err(|e| init_error("RSI", e))?;
    Ok(closes.iter().map(|close| rsi.next(*close)).collect())
}

pub fn macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Result<Vec<MovingAverageConvergenceDivergenceOutput>, StrategyError> {
    let mut macd = MovingAverageConvergenceDivergence::new(fast, slow, signal)
        .map_err(|e| init_error("MACD", e))?;
    Ok(closes.iter().map(|close| macd.next(*close)).collect())
}

pub fn bollinger(
    closes: &[f64],
    period: usize,
    std_dev: f64,
) -> Result<Vec<BollingerBandsOutput>, StrategyError> {
    let mut bands = BollingerBands::new(period, std_dev).map_err(|e| init_error("Bollinger Bands", e))?;
    Ok(closes.iter().map(|close| bands.next(*close)).collect())
}

pub fn atr(items: &[DataItem], period: usize) -> Result<Vec<f64>, StrategyError> {
    let mut atr = AverageTrueRange::new(period).map_err(|e| init_error("ATR", e))?;
    Ok(items.iter().map(|item| atr.next(item)).collect())
}

pub fn sma(values: &[f64], period: usize) -> Result<Vec<f64>, StrategyError> {
    let mut sma = SimpleMovingAverage::new(period).map_err(|e| init_error("SMA", e))?;
    Ok(values.iter().map(|value| sma.next(*value)).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupertrendPoint {
    pub value: f64,
    pub trend: Trend,
}

/// Supertrend with final bands that only ratchet in the trend's favour.
pub fn supertrend(
    items: &[DataItem],
    atr_period: usize,
    multiplier: f64,
) -> Result<Vec<SupertrendPoint>, StrategyError> {
    let atr = atr(items, atr_period)?;
    let mut points: Vec<SupertrendPoint> = Vec::with_capacity(items.len());
    let Some(first) = items.first() else {
        return Ok(points);
    };
    let hl2 = (first.high() + first.low()) / 2.0;
    let mut final_upper = hl2 + multiplier * atr[0];
    let mut final_lower = hl2 - multiplier * atr[0];
    let mut trend = Trend::Up;
    points.push(SupertrendPoint { value: final_lower, trend });

    for i in 1..items.len() {
        let item = &items[i];
        let prev_close = items[i - 1].close();
        let hl2 = (item.high() + item.low()) / 2.0;
        let basic_upper = hl2 + multiplier * atr[i];
        let basic_lower = hl2 - multiplier * atr[i];

        if basic_upper < final_upper || prev_close > final_upper {
            final_upper = basic_upper;
        }
        if basic_lower > final_lower || prev_close < final_lower {
            final_lower = basic_lower;
        }

        let close = item.close();
        trend = match trend {
            Trend::Up if close < final_lower => Trend::Down,
            Trend::Down if close > final_upper => Trend::Up,
            unchanged => unchanged,
        };
        let value = match trend {
            Trend::Up => final_lower,
            Trend::Down => final_upper,
        };
        points.push(SupertrendPoint { value, trend });
    }
    Ok(points)
}

/// Mean of the trailing `window` values ending at each index; `None` until the
/// window is fully populated.
fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            let sum = slice.iter().copied().sum::<Option<f64>>()?;
            Some(sum / window as f64)
        })
        .collect()
}

/// Average Directional Index using simple rolling means of true range,
/// directional movement, and DX. Undefined (`None`) for the first `2 * period - 1` bars.
pub fn adx(items: &[DataItem], period: usize) -> Result<Vec<Option<f64>>, StrategyError> {
    if period == 0 {
        return Err(StrategyError::InvalidParameters("ADX period cannot be zero".to_string()));
    }
    let mut true_range = Vec::with_capacity(items.len());
    let mut plus_dm = Vec::with_capacity(items.len());
    let mut minus_dm = Vec::with_capacity(items.len());

    for (i, item) in items.iter().enumerate() {
        if i == 0 {
            true_range.push(Some(item.high() - item.low()));
            plus_dm.push(None);
            minus_dm.push(None);
            continue;
        }
        let prev = &items[i - 1];
        let tr = (item.high() - item.low())
            .max((item.high() - prev.close()).abs())
            .max((item.low() - prev.close()).abs());
        let up = item.high() - prev.high();
        let down = prev.low() - item.low();
        true_range.push(Some(tr));
        plus_dm.push(Some(if up > down && up > 0.0 { up } else { 0.0 }));
        minus_dm.push(Some(if down > up && down > 0.0 { down } else { 0.0 }));
    }

    let atr = rolling_mean(&true_range, period);
    let plus = rolling_mean(&plus_dm, period);
    let minus = rolling_mean(&minus_dm, period);

    let dx: Vec<Option<f64>> = (0..items.len())
        .map(|i| {
            let (atr, plus, minus) = (atr[i]?, plus[i]?, minus[i]?);
            if atr <= 0.0 {
                return Some(0.0);
            }
            let plus_di = 100.0 * plus / atr;
            let minus_di = 100.0 * minus / atr;
            let sum = plus_di + minus_di;
            Some(if sum > 0.0 { 100.0 * (plus_di - minus_di).abs() / sum } else { 0.0 })
        })
        .collect();

    Ok(rolling_mean(&dx, period))
}

/// A Renko brick and the index of the bar that completed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Brick {
    pub bar_index: usize,
    pub trend: Trend,
}

/// Fixed-size Renko bricks built from closes. The first close anchors the grid.
pub fn renko(closes: &[f64], brick_size: f64) -> Result<Vec<Brick>, StrategyError> {
    if !(brick_size.is_finite() && brick_size > 0.0) {
        return Err(StrategyError::IndicatorError(format!(
            "Renko brick size must be positive, got {}",
            brick_size
        )));
    }
    let mut bricks = Vec::new();
    let Some(&anchor) = closes.first() else {
        return Ok(bricks);
    };
    let mut level = anchor;
    for (bar_index, &close) in closes.iter().enumerate().skip(1) {
        while close >= level + brick_size {
            level += brick_size;
            bricks.push(Brick { bar_index, trend: Trend::Up });
        }
        while close <= level - brick_size {
            level -= brick_size;
            bricks.push(Brick { bar_index, trend: Trend::Down });
        }
    }
    Ok(bricks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(high: f64, low: f64, close: f64) -> DataItem {
        DataItem::builder()
            .open(close)
            .high(high)
            .low(low)
            .close(close)
            .volume(1000.0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_rolling_mean_waits_for_full_window() {
        let values = [None, Some(1.0), Some(2.0), Some(3.0)];
        let means = rolling_mean(&values, 2);
        assert_eq!(means, vec![None, None, Some(1.5), Some(2.5)]);
    }

    #[test]
    fn test_adx_is_high_in_a_steady_trend() {
        let items: Vec<DataItem> = (0..40)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                item(base + 1.0, base - 1.0, base + 0.5)
            })
            .collect();
        let adx = adx(&items, 14).unwrap();
        assert!(adx[26].is_none());
        let last = adx[39].unwrap();
        assert!(last > 90.0, "adx was {last}");
    }

    #[test]
    fn test_renko_bricks_follow_moves() {
        let closes = [100.0, 102.1, 104.5, 101.9, 99.0];
        let bricks = renko(&closes, 2.0).unwrap();
        let trends: Vec<Trend> = bricks.iter().map(|b| b.trend).collect();
        assert_eq!(trends, vec![Trend::Up, Trend::Up, Trend::Down, Trend::Down]);
        assert_eq!(bricks[0].bar_index, 1);
        assert_eq!(bricks[3].bar_index, 4);
        assert!(renko(&closes, 0.0).is_err());
    }

    #[test]
    fn test_supertrend_flips_on_reversal() {
        let mut items: Vec<DataItem> = (0..20)
            .map(|i| {
                let base = 100.0 + i as f64;
                item(base + 0.5, base - 0.5, base)
            })
            .collect();
        items.extend((0..10).map(|i| {
            let base = 110.0 - i as f64 * 4.0;
            item(base + 0.5, base - 0.5, base)
        }));
        let points = supertrend(&items, 7, 3.0).unwrap();
        assert_eq!(points[19].trend, Trend::Up);
        assert_eq!(points.last().map(|p| p.trend), Some(Trend::Down));
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(confidence(1.7).unwrap(), Decimal::ONE);
        assert_eq!(confidence(-0.2).unwrap(), Decimal::ZERO);
    }
}
