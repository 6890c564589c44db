use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side of the order
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
}

/// Lifecycle of an order. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Executed,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// The order side that opens a position of this side.
    pub fn entry_side(&self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Buy,
            PositionSide::Short => OrderSide::Sell,
        }
    }

    /// The order side that closes a position of this side.
    pub fn exit_side(&self) -> OrderSide {
        self.entry_side().opposite()
    }
}

impl From<OrderSide> for PositionSide {
    fn from(side: OrderSide) -> Self {
        match side {
            OrderSide::Buy => PositionSide::Long,
            OrderSide::Sell => PositionSide::Short,
        }
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    Target,
    SignalExit,
    AutoExit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingMode {
    Historical,
    Live,
}

/// Session state machine: `Initializing -> Running -> Completed | Failed | Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Initializing,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl SessionStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Stopped
        )
    }
}

/// Identifies one of the signal generators available to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyId {
    Rsi,
    Macd,
    Supertrend,
    Bollinger,
    Adx,
    Atr,
    Renko,
}

impl StrategyId {
    pub const ALL: [StrategyId; 7] = [
        StrategyId::Rsi,
        StrategyId::Macd,
        StrategyId::Supertrend,
        StrategyId::Bollinger,
        StrategyId::Adx,
        StrategyId::Atr,
        StrategyId::Renko,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::Rsi => "RSI",
            StrategyId::Macd => "MACD",
            StrategyId::Supertrend => "SUPERTREND",
            StrategyId::Bollinger => "BOLLINGER",
            StrategyId::Adx => "ADX",
            StrategyId::Atr => "ATR",
            StrategyId::Renko => "RENKO",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StrategyId::Rsi => "RSI(14) crossing the 30/70 oversold and overbought levels",
            StrategyId::Macd => "MACD(12, 26, 9) line crossing its signal line",
            StrategyId::Supertrend => "Supertrend(7, 3.0) direction flip",
            StrategyId::Bollinger => "Close crossing the Bollinger(20, 2) bands",
            StrategyId::Adx => "ADX(14) rising through 25 with SMA(20) direction",
            StrategyId::Atr => "ATR(14) expansion breakout on the trend side of SMA(20)",
            StrategyId::Renko => "New ATR-sized Renko brick confirming a run of bricks",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyId {
    type Err = CoreError;

    /// Parses a strategy name case-insensitively (`"rsi"`, `"RSI"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        StrategyId::ALL
            .into_iter()
            .find(|id| id.as_str() == upper)
            .ok_or(CoreError::UnknownStrategy(s.to_string()))
    }
}
