use crate::enums::OrderStatus;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Order {order_id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Position {0} is already closed")]
    PositionAlreadyClosed(String),

    #[error("Cannot split {requested} units from a position holding {held}")]
    InvalidSplit { requested: Decimal, held: Decimal },

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
}
