//! # Tradesim Backtester
//!
//! This crate drives a trading session over time. It is the component that turns a
//! stream of price bars into orders, positions and, finally, a report.
//!
//! ## Architectural Principles
//!
//! - **One Owner Per Session:** An `AutoTrader` holds the only mutable copy of a
//!   session's portfolio, history and ledger. It is moved into the replay task and
//!   never shared, so two steps of the same session can never interleave.
//! - **Collaborators Behind Traits:** Price data and report persistence are reached
//!   through the async `PriceBarSource` and `ResultsSink` traits. The crate ships
//!   in-memory and JSON-file implementations.
//! - **Cooperative Replay:** The historical loop yields to the runtime every few
//!   timestamps and checks its cancellation signal between iterations.
//!
//! ## Public API
//!
//! - `AutoTrader`: Advances a session one timestamp at a time.
//! - `Backtester`: Historical replay and live polling around an `AutoTrader`.
//! - `SessionProgress`: The snapshot published while a session runs.
//! - `MarketHours`: The live-mode trading window.
//! - `PriceBarSource`, `ResultsSink` and their implementations.

pub mod error;
pub mod market_hours;
pub mod runner;
pub mod source;
pub mod trader;

pub use error::BacktestError;
pub use market_hours::MarketHours;
pub use runner::{Backtester, RunOutcome};
pub use source::{
    InMemoryBarSource, InMemorySink, JsonDirSource, JsonFileSink, PriceBarSource, ResultsSink,
};
pub use trader::{AutoTrader, SessionProgress};
