use core_types::{AggregatedSignal, Candle, OrderSide, StrategySignal};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Weighted-majority vote over the generators' signals for one symbol at one bar.
///
/// A side wins only with strictly more votes than the other side and an average
/// confidence strictly above the threshold. The decision's confidence is
///
/// ```text
/// average_confidence(winner) * votes(winner) / (votes(buy) + votes(sell))
/// ```
///
/// computed in `Decimal`, so rational inputs give exact results.
#[derive(Debug, Clone)]
pub struct SignalAggregator {
    threshold: Decimal,
}

impl Default for SignalAggregator {
    fn default() -> Self {
        Self { threshold: dec!(0.3) }
    }
}

impl SignalAggregator {
    pub fn new(threshold: Decimal) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    /// Reduces `signals` to at most one decision quoted at `bar`'s close.
    /// Votes for other symbols are ignored.
    pub fn aggregate(
        &self,
        symbol: &str,
        bar: &Candle,
        signals: &[StrategySignal],
    ) -> Option<AggregatedSignal> {
        let (buys, sells): (Vec<&StrategySignal>, Vec<&StrategySignal>) = signals
            .iter()
            .filter(|signal| signal.symbol == symbol)
            .partition(|signal| signal.side == OrderSide::Buy);

        let (side, winners) = match buys.len().cmp(&sells.len()) {
            std::cmp::Ordering::Greater => (OrderSide::Buy, &buys),
            std::cmp::Ordering::Less => (OrderSide::Sell, &sells),
            std::cmp::Ordering::Equal => {
                if !buys.is_empty() {
                    tracing::debug!(symbol, votes = buys.len(), "tied vote; no decision");
                }
                return None;
            }
        };

        let total = Decimal::from(buys.len() + sells.len());
        let count = Decimal::from(winners.len());
        let average = winners.iter().map(|signal| signal.confidence).sum::<Decimal>() / count;
        if average <= self.threshold {
            tracing::debug!(symbol, %side, %average, "winning side below confidence floor");
            return None;
        }

        Some(AggregatedSignal {
            symbol: symbol.to_string(),
            side,
            price: bar.close,
            timestamp: bar.timestamp,
            confidence: average * count / total,
            buy_votes: buys.len(),
            sell_votes: sells.len(),
            buy_strategies: buys.iter().map(|signal| signal.strategy).collect(),
            sell_strategies: sells.iter().map(|signal| signal.strategy).collect(),
        })
    }
}
