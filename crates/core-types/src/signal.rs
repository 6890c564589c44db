use crate::enums::{OrderSide, StrategyId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Numeric and textual diagnostics attached to a vote (indicator values, band edges, ...).
pub type SignalMetadata = BTreeMap<String, serde_json::Value>;

/// A single generator's directional vote for one symbol at one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySignal {
    pub strategy: StrategyId,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Always within `[0, 1]`.
    pub confidence: Decimal,
    pub metadata: SignalMetadata,
}

/// The single decision reduced from all votes for a symbol at one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSignal {
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub confidence: Decimal,
    pub buy_votes: usize,
    pub sell_votes: usize,
    pub buy_strategies: Vec<StrategyId>,
    pub sell_strategies: Vec<StrategyId>,
}

impl AggregatedSignal {
    /// Strategies on the winning side.
    pub fn strategies(&self) -> &[StrategyId] {
        match self.side {
            OrderSide::Buy => &self.buy_strategies,
            OrderSide::Sell => &self.sell_strategies,
        }
    }

    /// The agreeing strategies joined for display, e.g. `"RSI, MACD"`.
    pub fn strategy_label(&self) -> String {
        self.strategies()
            .iter()
            .map(StrategyId::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
