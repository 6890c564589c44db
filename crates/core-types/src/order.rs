use crate::enums::{ExitReason, OrderSide, OrderStatus, OrderType};
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A request to trade, as produced by the risk layer or the stop-loss sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_order_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    /// Quote price before slippage.
    pub price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub target: Option<Decimal>,
    /// Label of the strategies that produced the request, stored on the position it opens.
    pub strategy: Option<String>,
    /// Set when the request closes a position.
    pub exit_reason: Option<ExitReason>,
}

impl OrderRequest {
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: Decimal, price: Decimal) -> Self {
        Self {
            client_order_id: Uuid::new_v4(),
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            price,
            stop_loss: None,
            target: None,
            strategy: None,
            exit_reason: None,
        }
    }

    pub fn with_protection(mut self, stop_loss: Option<Decimal>, target: Option<Decimal>) -> Self {
        self.stop_loss = stop_loss;
        self.target = target;
        self
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    pub fn with_exit_reason(mut self, reason: ExitReason) -> Self {
        self.exit_reason = Some(reason);
        self
    }
}

/// A single order and its execution outcome.
///
/// Created `Pending`; moves exactly once to `Executed`, `Rejected` or `Cancelled`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub executed_price: Option<Decimal>,
    pub executed_quantity: Option<Decimal>,
    pub executed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl Order {
    pub fn new(request: &OrderRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            order_id: request.client_order_id,
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            price: request.price,
            status: OrderStatus::Pending,
            created_at,
            executed_price: None,
            executed_quantity: None,
            executed_at: None,
            rejection_reason: None,
        }
    }

    pub fn execute(
        &mut self,
        price: Decimal,
        quantity: Decimal,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.transition(OrderStatus::Executed)?;
        self.executed_price = Some(price);
        self.executed_quantity = Some(quantity);
        self.executed_at = Some(at);
        Ok(())
    }

    pub fn reject(&mut self, reason: impl Into<String>) -> Result<(), CoreError> {
        self.transition(OrderStatus::Rejected)?;
        self.rejection_reason = Some(reason.into());
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), CoreError> {
        self.transition(OrderStatus::Cancelled)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&mut self, to: OrderStatus) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::InvalidTransition {
                order_id: self.order_id.to_string(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
