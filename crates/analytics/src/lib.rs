//! # Tradesim Analytics
//!
//! This crate turns a finished (or stopped) session into its results report. It
//! acts as the "unbiased judge" of the system.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** No I/O. The `SessionLedger` is fed by the replay loop and the
//!   `AnalyticsEngine` reads it together with the executor's `Portfolio`.
//! - **Closed Positions Only:** Trade statistics are derived strictly from closed
//!   positions. Open positions appear in the report but never in win/loss counts.
//! - **Flag, Don't Throw:** The accounting identities are checked when the report is
//!   built. A violation is logged and flagged in `ReportConsistency`; the report is
//!   still returned.
//!
//! ## Public API
//!
//! - `SessionLedger`: Daily equity curve and signal/trade bookkeeping for a session.
//! - `AnalyticsEngine`: Builds a `BacktestReport` from a portfolio and a ledger.
//! - `BacktestReport` and its sections.

pub mod engine;
pub mod error;
pub mod ledger;
pub mod report;

pub use engine::AnalyticsEngine;
pub use error::AnalyticsError;
pub use ledger::SessionLedger;
pub use report::{
    BacktestReport, DrawdownReport, EquityPoint, PortfolioReport, ReportConsistency,
    StrategyBreakdown, TradeRecord, TradeStatistics,
};
