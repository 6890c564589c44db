use crate::enums::{ExitReason, PositionSide};
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything needed to open a position, supplied in one go so a position is
/// never observable in a partially-initialized state.
#[derive(Debug, Clone)]
pub struct PositionEntry {
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub time: DateTime<Utc>,
    pub stop_loss: Option<Decimal>,
    pub target: Option<Decimal>,
    pub strategy: Option<String>,
    pub brokerage: Decimal,
}

/// Exit details, present only once the position is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionExit {
    pub price: Decimal,
    pub time: DateTime<Utc>,
    pub reason: ExitReason,
    pub brokerage: Decimal,
    pub realized_pnl: Decimal,
}

/// An open or closed holding in a single symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub position_id: Uuid,
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub stop_loss: Option<Decimal>,
    pub target: Option<Decimal>,
    /// Last mark price.
    pub current_price: Decimal,
    pub strategy: Option<String>,
    /// Brokerage charged on the entry leg.
    pub entry_brokerage: Decimal,
    pub exit: Option<PositionExit>,
}

impl Position {
    pub fn open(entry: PositionEntry) -> Self {
        Self {
            position_id: Uuid::new_v4(),
            symbol: entry.symbol,
            side: entry.side,
            quantity: entry.quantity,
            entry_price: entry.price,
            entry_time: entry.time,
            stop_loss: entry.stop_loss,
            target: entry.target,
            current_price: entry.price,
            strategy: entry.strategy,
            entry_brokerage: entry.brokerage,
            exit: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.exit.is_none()
    }

    /// Capital committed at entry: `entry_price * quantity`.
    pub fn cost_basis(&self) -> Decimal {
        self.entry_price * self.quantity
    }

    /// Paper P&L at the current mark. Zero once closed.
    pub fn unrealized_pnl(&self) -> Decimal {
        if !self.is_open() {
            return Decimal::ZERO;
        }
        self.pnl_at(self.current_price)
    }

    /// Locked-in P&L. Zero while open.
    pub fn realized_pnl(&self) -> Decimal {
        self.exit.as_ref().map_or(Decimal::ZERO, |exit| exit.realized_pnl)
    }

    /// Realized P&L net of both legs' brokerage.
    pub fn net_pnl(&self) -> Decimal {
        match &self.exit {
            Some(exit) => exit.realized_pnl - self.entry_brokerage - exit.brokerage,
            None => Decimal::ZERO,
        }
    }

    fn pnl_at(&self, price: Decimal) -> Decimal {
        match self.side {
            PositionSide::Long => (price - self.entry_price) * self.quantity,
            PositionSide::Short => (self.entry_price - price) * self.quantity,
        }
    }

    pub fn update_price(&mut self, price: Decimal) {
        if self.is_open() {
            self.current_price = price;
        }
    }

    pub fn stop_loss_hit(&self, price: Decimal) -> bool {
        match (self.stop_loss, self.side) {
            (Some(stop), PositionSide::Long) => price <= stop,
            (Some(stop), PositionSide::Short) => price >= stop,
            (None, _) => false,
        }
    }

    pub fn target_hit(&self, price: Decimal) -> bool {
        match (self.target, self.side) {
            (Some(target), PositionSide::Long) => price >= target,
            (Some(target), PositionSide::Short) => price <= target,
            (None, _) => false,
        }
    }

    /// Closes the position, fixing its realized P&L. Returns that P&L.
    pub fn close(
        &mut self,
        price: Decimal,
        time: DateTime<Utc>,
        reason: ExitReason,
        brokerage: Decimal,
    ) -> Result<Decimal, CoreError> {
        if !self.is_open() {
            return Err(CoreError::PositionAlreadyClosed(self.position_id.to_string()));
        }
        let realized_pnl = self.pnl_at(price);
        self.current_price = price;
        self.exit = Some(PositionExit {
            price,
            time,
            reason,
            brokerage,
            realized_pnl,
        });
        Ok(realized_pnl)
    }

    /// Detaches `quantity` units into a new open position with the same entry,
    /// carrying a proportional share of the entry brokerage.
    pub fn split_off(&mut self, quantity: Decimal) -> Result<Position, CoreError> {
        if !self.is_open() {
            return Err(CoreError::PositionAlreadyClosed(self.position_id.to_string()));
        }
        if quantity <= Decimal::ZERO || quantity >= self.quantity {
            return Err(CoreError::InvalidSplit {
                requested: quantity,
                held: self.quantity,
            });
        }
        let brokerage_share = self.entry_brokerage * quantity / self.quantity;
        let mut part = self.clone();
        part.position_id = Uuid::new_v4();
        part.quantity = quantity;
        part.entry_brokerage = brokerage_share;

        self.quantity -= quantity;
        self.entry_brokerage -= brokerage_share;
        Ok(part)
    }

    /// Minutes between entry and exit, or until `now` while open.
    pub fn holding_minutes(&self, now: DateTime<Utc>) -> i64 {
        let end = self.exit.as_ref().map_or(now, |exit| exit.time);
        (end - self.entry_time).num_minutes()
    }
}
