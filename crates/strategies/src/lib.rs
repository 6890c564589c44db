//! # Tradesim Strategy Library
//!
//! Signal generators that turn a window of price bars into an optional
//! directional vote, and the aggregator that reduces those votes to a single
//! decision per symbol.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** Generators have no state between calls. The same window
//!   always produces the same vote, so a replay is reproducible bar for bar.
//! - **Event Driven:** A vote is emitted only when something changes between the
//!   previous and the current bar (a cross, a flip, a new brick). Steady states
//!   stay silent.
//! - **Strategy Agnostic Loop:** The backtester holds `Box<dyn Strategy>` values
//!   built by the factory and never knows which indicator sits behind them.
//!
//! ## Public API
//!
//! - `Strategy`: The trait every generator implements.
//! - `create_strategy` / `create_strategies`: Build generators from configured parameters.
//! - `SignalAggregator`: The weighted-majority vote.
//! - The concrete generators (`Rsi`, `Macd`, `SuperTrend`, `Bollinger`, `Adx`, `Atr`, `Renko`).

pub mod adx;
pub mod aggregator;
pub mod atr;
pub mod bollinger;
pub mod error;
pub mod factory;
pub mod indicators;
pub mod macd;
pub mod renko;
pub mod rsi;
pub mod super_trend;

pub use adx::Adx;
pub use aggregator::SignalAggregator;
pub use atr::Atr;
pub use bollinger::Bollinger;
pub use error::StrategyError;
pub use factory::{create_strategies, create_strategy};
pub use macd::Macd;
pub use renko::Renko;
pub use rsi::Rsi;
pub use super_trend::SuperTrend;

pub use core_types::enums::StrategyId;

use core_types::{Candle, OrderSide, SignalMetadata, StrategySignal};
use rust_decimal::Decimal;

/// The core trait that all signal generators implement.
///
/// `Send + Sync` lets a session's generators move into the spawned task that
/// drives the replay loop.
pub trait Strategy: Send + Sync {
    fn id(&self) -> StrategyId;

    /// Shortest window for which `evaluate` can compare the previous and the
    /// current bar. Shorter windows yield `Ok(None)`.
    fn min_bars(&self) -> usize;

    /// Evaluates the window ending at the current bar (the last element).
    ///
    /// * `Ok(Some(signal))` - an event occurred on the current bar.
    /// * `Ok(None)` - no event, or not enough data.
    /// * `Err(StrategyError)` - the window could not be evaluated.
    fn evaluate(&self, symbol: &str, bars: &[Candle]) -> Result<Option<StrategySignal>, StrategyError>;
}

/// Builds a vote quoted at the current bar's close.
pub(crate) fn vote(
    strategy: StrategyId,
    symbol: &str,
    side: OrderSide,
    bar: &Candle,
    confidence: Decimal,
    metadata: SignalMetadata,
) -> StrategySignal {
    StrategySignal {
        strategy,
        symbol: symbol.to_string(),
        side,
        price: bar.close,
        timestamp: bar.timestamp,
        confidence,
        metadata,
    }
}
