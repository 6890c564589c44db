//! # Tradesim Core Types
//!
//! The shared vocabulary of the simulator: orders and their lifecycle, positions
//! and their P&L formulas, price bars, and strategy signals.
//!
//! ## Architectural Principles
//!
//! - **Layer 0:** This crate depends on no other workspace crate. Every other crate
//!   speaks in these types.
//! - **Entities guard their own lifecycle:** an `Order` cannot leave a terminal
//!   state and a `Position` cannot be closed twice; both return a `CoreError` instead.
//!
//! ## Public API
//!
//! - `Order`, `OrderRequest`, `Position`, `PositionEntry`, `Candle`
//! - `StrategySignal`, `AggregatedSignal`
//! - All enums (`OrderSide`, `OrderStatus`, `PositionSide`, `ExitReason`, `StrategyId`, ...)

pub mod candle;
pub mod enums;
pub mod error;
pub mod order;
pub mod position;
pub mod signal;

// Re-export the core types to provide a clean public API.
pub use candle::Candle;
pub use enums::{
    ExitReason, OrderSide, OrderStatus, OrderType, PositionSide, SessionStatus, StrategyId,
    TradingMode,
};
pub use error::CoreError;
pub use order::{Order, OrderRequest};
pub use position::{Position, PositionEntry, PositionExit};
pub use signal::{AggregatedSignal, SignalMetadata, StrategySignal};
