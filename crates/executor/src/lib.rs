//! # Tradesim Executor Crate
//!
//! This crate provides the paper exchange and the portfolio ledger it drives.
//!
//! ## Architectural Principles
//!
//! - **Ledger vs. Rules:** The `Portfolio` is pure bookkeeping (cash, positions,
//!   brokerage) and derives every aggregate on demand. The `PaperExchange` owns a
//!   portfolio and decides whether an order may touch it: position limits,
//!   capital limits, slippage and brokerage all live there.
//! - **All-or-nothing orders:** Validation completes before the first mutation,
//!   so a rejected order leaves no trace on the ledger beyond its own record.
//! - **Rejections are values:** `place_order` returns `OrderOutcome::Rejected`
//!   with a reason; `ExecutorError` is reserved for broken invariants.
//!
//! ## Public API
//!
//! - `PaperExchange`: order placement, stop-loss/target sweep, liquidation.
//! - `Portfolio` and `PortfolioSummary`: the ledger and its snapshot.
//! - `OrderOutcome`, `ExecutorError`

// Declare the modules that constitute this crate.
pub mod error;
pub mod exchange;
pub mod portfolio;

// Re-export the key components to provide a clean, public-facing API.
pub use error::ExecutorError;
pub use exchange::{OrderOutcome, PaperExchange};
pub use portfolio::{Portfolio, PortfolioSummary};
