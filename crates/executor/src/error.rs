use core_types::CoreError;
use thiserror::Error;

/// Broken ledger invariants. Ordinary order rejections are not errors; they are
/// reported through `OrderOutcome::Rejected`.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("A position is already open for symbol: {0}")]
    PositionExists(String),

    #[error("Position not found for symbol: {0}")]
    PositionNotFound(String),

    #[error("Invalid order quantity for closing position. Requested: {requested}, Available: {available}")]
    InvalidClosingQuantity { requested: String, available: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}
