//! # Tradesim Risk
//!
//! Translates an aggregated trading decision into a concrete order: whether to
//! exit an opposing position, how many units to buy, and where the protective
//! stop-loss and target sit.
//!
//! ## Public API
//!
//! - `RiskManager`: the trait the trading loop talks to.
//! - `SimpleRiskManager`: fixed-fraction sizing with percentage stops.
//! - `RiskError`

pub mod error;
pub mod simple_manager;

pub use error::RiskError;
pub use simple_manager::SimpleRiskManager;

use core_types::{AggregatedSignal, OrderRequest};
use executor::Portfolio;

/// Decides what order, if any, an aggregated signal should produce.
pub trait RiskManager: Send + Sync {
    /// * `Ok(Some(request))` - an order to submit.
    /// * `Ok(None)` - the signal calls for no action (already positioned, or too small to size).
    fn evaluate_signal(
        &self,
        signal: &AggregatedSignal,
        portfolio: &Portfolio,
    ) -> Result<Option<OrderRequest>, RiskError>;
}
